//! One-hot encoding of categorical mistake features.
//!
//! The encoder is fit once on a subject's whole pending population and then
//! shared, read-only, by every cluster so that column indices mean the same
//! thing in every per-cluster model.
//!
//! # Column Layout
//!
//! Columns follow [`CategoricalField::ALL`]; within a field, observed levels
//! follow their declaration order. A level never observed during fitting gets
//! no column, and a record carrying it encodes as all zeros for that field.
//!
//! ```
//! use blunderscope_analysis::encoder::OneHotEncoder;
//! # use blunderscope_engine::*;
//! # use blunderscope_evaluator::features::MistakeFeatures;
//! # let features = MistakeFeatures {
//! #     mistake_type: MistakeType::Blunder,
//! #     mistake_category: MistakeCategory::HangingPiece,
//! #     game_phase: GamePhase::Endgame,
//! #     material_balance: MaterialBalance::Equal,
//! #     board_complexity: BoardComplexity::Low,
//! #     king_self_safety: KingSafety::Safe,
//! #     king_opponent_status: KingSafety::Safe,
//! #     castling_status_self: CastlingStatus::CannotCastle,
//! #     piece_moved: PieceKind::Rook,
//! #     move_type: MoveType::Quiet,
//! #     piece_was_attacked: false,
//! #     piece_was_defended: false,
//! #     piece_was_defending: false,
//! #     piece_was_pinned: false,
//! # };
//!
//! let encoder = OneHotEncoder::fit(&[features])?;
//! // one observed level per field
//! assert_eq!(encoder.width(), 14);
//! assert_eq!(encoder.columns()[1].name, "mistake_category_Hanging_Piece");
//! assert!(encoder.encode(&features).iter().all(|&v| v == 1.0));
//! # Ok::<(), blunderscope_analysis::encoder::EncoderError>(())
//! ```

use std::collections::HashMap;

use blunderscope_evaluator::features::{CategoricalField, FieldGroup, MistakeFeatures};

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum EncoderError {
    #[display("cannot fit an encoder on an empty population")]
    EmptyPopulation,
}

/// One output column: a single level of a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedColumn {
    pub field: CategoricalField,
    /// Index into [`CategoricalField::levels`].
    pub level: usize,
    /// `<field>_<Level>`, e.g. `game_phase_Endgame`.
    pub name: String,
}

impl EncodedColumn {
    #[must_use]
    pub const fn group(&self) -> FieldGroup {
        self.field.group()
    }

    /// `game phase: Endgame` for `game_phase_Endgame`.
    #[must_use]
    pub fn label(&self) -> String {
        let levels = self.field.levels();
        let level = levels.get(self.level).copied().unwrap_or_default();
        format!("{}: {level}", self.field.name().replace('_', " "))
    }
}

#[derive(Debug, Clone)]
pub struct OneHotEncoder {
    columns: Vec<EncodedColumn>,
    index: HashMap<(CategoricalField, usize), usize>,
}

impl OneHotEncoder {
    /// Learns the observed levels of every field.
    pub fn fit(population: &[MistakeFeatures]) -> Result<Self, EncoderError> {
        if population.is_empty() {
            return Err(EncoderError::EmptyPopulation);
        }

        let mut columns = vec![];
        for &field in CategoricalField::ALL {
            let levels = field.levels();
            let mut seen = vec![false; levels.len()];
            for features in population {
                seen[features.level_index(field)] = true;
            }
            columns.extend(
                levels
                    .iter()
                    .zip(seen)
                    .enumerate()
                    .filter(|(_, (_, seen))| *seen)
                    .map(|(level, (label, _))| EncodedColumn {
                        field,
                        level,
                        name: format!("{}_{label}", field.name()),
                    }),
            );
        }
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, column)| ((column.field, column.level), i))
            .collect();
        tracing::debug!(
            rows = population.len(),
            columns = columns.len(),
            "one-hot encoder fitted"
        );
        Ok(Self { columns, index })
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn columns(&self) -> &[EncodedColumn] {
        &self.columns
    }

    /// Column index of `<field>_<level>`, if that level was observed.
    #[must_use]
    pub fn column_of(&self, field: CategoricalField, level: usize) -> Option<usize> {
        self.index.get(&(field, level)).copied()
    }

    #[must_use]
    pub fn encode(&self, features: &MistakeFeatures) -> Vec<f64> {
        let mut row = vec![0.0; self.width()];
        for &field in CategoricalField::ALL {
            if let Some(i) = self.column_of(field, features.level_index(field)) {
                row[i] = 1.0;
            }
        }
        row
    }

    #[must_use]
    pub fn encode_all<'a, I>(&self, population: I) -> Vec<Vec<f64>>
    where
        I: IntoIterator<Item = &'a MistakeFeatures>,
    {
        population.into_iter().map(|f| self.encode(f)).collect()
    }
}
