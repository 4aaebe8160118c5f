//! The structured description of one flagged move.
//!
//! [`MistakeFeatures`] holds one closed level per categorical field;
//! [`CategoricalField`] enumerates those fields in their canonical order so
//! that downstream encoders can walk them uniformly.

use blunderscope_engine::{
    BoardComplexity, CastlingStatus, FeatureLevel, GamePhase, KingSafety, MaterialBalance,
    MistakeCategory, MistakeType, MoveType, PieceKind,
};
use serde::{Deserialize, Serialize};

use crate::game::PlayerColor;

/// Whether a field describes the situation or the move made in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldGroup {
    Context,
    Action,
}

/// Categorical attributes of a mistake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MistakeFeatures {
    pub mistake_type: MistakeType,
    pub mistake_category: MistakeCategory,
    pub game_phase: GamePhase,
    pub material_balance: MaterialBalance,
    pub board_complexity: BoardComplexity,
    pub king_self_safety: KingSafety,
    pub king_opponent_status: KingSafety,
    pub castling_status_self: CastlingStatus,
    pub piece_moved: PieceKind,
    pub move_type: MoveType,
    pub piece_was_attacked: bool,
    pub piece_was_defended: bool,
    pub piece_was_defending: bool,
    pub piece_was_pinned: bool,
}

macro_rules! categorical_fields {
    ($($variant:ident => $field:ident: $ty:ty, $group:ident;)+) => {
        /// A categorical field of [`MistakeFeatures`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum CategoricalField {
            $($variant,)+
        }

        impl CategoricalField {
            /// All fields in canonical order.
            pub const ALL: &[Self] = &[$(Self::$variant,)+];

            /// Field name as used in one-hot feature names.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($field),)+
                }
            }

            #[must_use]
            pub const fn group(self) -> FieldGroup {
                match self {
                    $(Self::$variant => FieldGroup::$group,)+
                }
            }

            /// Labels of every declared level, in declaration order.
            #[must_use]
            pub fn levels(self) -> Vec<&'static str> {
                match self {
                    $(Self::$variant => labels::<$ty>(),)+
                }
            }
        }

        impl MistakeFeatures {
            /// Index of this record's level within [`CategoricalField::levels`].
            #[must_use]
            pub fn level_index(&self, field: CategoricalField) -> usize {
                match field {
                    $(CategoricalField::$variant => self.$field.index(),)+
                }
            }

            /// Label of this record's level for `field`.
            #[must_use]
            pub fn level_label(&self, field: CategoricalField) -> &'static str {
                match field {
                    $(CategoricalField::$variant => self.$field.label(),)+
                }
            }
        }
    };
}

categorical_fields! {
    MistakeType => mistake_type: MistakeType, Action;
    MistakeCategory => mistake_category: MistakeCategory, Action;
    GamePhase => game_phase: GamePhase, Context;
    MaterialBalance => material_balance: MaterialBalance, Context;
    BoardComplexity => board_complexity: BoardComplexity, Context;
    KingSelfSafety => king_self_safety: KingSafety, Action;
    KingOpponentStatus => king_opponent_status: KingSafety, Action;
    CastlingStatusSelf => castling_status_self: CastlingStatus, Context;
    PieceMoved => piece_moved: PieceKind, Action;
    MoveType => move_type: MoveType, Action;
    PieceWasAttacked => piece_was_attacked: bool, Action;
    PieceWasDefended => piece_was_defended: bool, Action;
    PieceWasDefending => piece_was_defending: bool, Action;
    PieceWasPinned => piece_was_pinned: bool, Action;
}

fn labels<T: FeatureLevel>() -> Vec<&'static str> {
    T::ALL.iter().map(|level| level.label()).collect()
}

/// A mistake extracted from a game, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MistakeDraft {
    /// Full-move number of the position the move was played in.
    pub move_number: u32,
    pub color: PlayerColor,
    /// Position before the move, as FEN.
    pub fen_before: String,
    /// Move played, in UCI notation.
    pub move_played: String,
    /// Engine's preferred move, in UCI notation.
    pub best_move: String,
    /// Centipawn loss; never below the inaccuracy threshold.
    pub cpl: u32,
    pub features: MistakeFeatures,
}
