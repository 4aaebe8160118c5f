//! Mistake severity and category.

use chess::ChessMove;

use crate::Position;

/// Minimum centipawn loss recorded as a blunder.
pub const BLUNDER_CPL: u32 = 300;
/// Minimum centipawn loss recorded as a mistake.
pub const MISTAKE_CPL: u32 = 100;
/// Minimum centipawn loss recorded at all.
pub const INACCURACY_CPL: u32 = 50;
/// Gap between the best and second-best line above which a missed tactic is assumed.
pub const TACTIC_GAP_CP: i32 = 150;

feature_level! {
    /// Severity of a mistake, a monotone function of centipawn loss.
    pub enum MistakeType {
        Inaccuracy => "Inaccuracy",
        Mistake => "Mistake",
        Blunder => "Blunder",
    }
}

feature_level! {
    /// Coarse explanation of what went wrong.
    pub enum MistakeCategory {
        MissedTactic => "Missed_Tactic",
        HangingPiece => "Hanging_Piece",
        PositionalError => "Positional_Error",
    }
}

impl MistakeType {
    /// Classifies a centipawn loss. Returns `None` below the inaccuracy threshold.
    ///
    /// Thresholds are inclusive:
    ///
    /// ```
    /// use blunderscope_engine::MistakeType;
    ///
    /// assert_eq!(MistakeType::from_cpl(300), Some(MistakeType::Blunder));
    /// assert_eq!(MistakeType::from_cpl(100), Some(MistakeType::Mistake));
    /// assert_eq!(MistakeType::from_cpl(50), Some(MistakeType::Inaccuracy));
    /// assert_eq!(MistakeType::from_cpl(49), None);
    /// ```
    #[must_use]
    pub const fn from_cpl(cpl: u32) -> Option<Self> {
        if cpl >= BLUNDER_CPL {
            Some(Self::Blunder)
        } else if cpl >= MISTAKE_CPL {
            Some(Self::Mistake)
        } else if cpl >= INACCURACY_CPL {
            Some(Self::Inaccuracy)
        } else {
            None
        }
    }
}

impl MistakeCategory {
    /// Categorizes a played move, first match wins.
    ///
    /// # Arguments
    ///
    /// * `position` - Position before the move
    /// * `mv` - The move that was played
    /// * `best_gap` - Score gap between the best and second-best line, if two lines were available
    #[must_use]
    pub fn classify(position: &Position, mv: ChessMove, best_gap: Option<i32>) -> Self {
        if best_gap.is_some_and(|gap| gap > TACTIC_GAP_CP) {
            Self::MissedTactic
        } else if position.is_hanging_after(mv) {
            Self::HangingPiece
        } else {
            Self::PositionalError
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use super::*;

    #[test]
    fn test_threshold_boundaries() {
        assert_eq!(MistakeType::from_cpl(299), Some(MistakeType::Mistake));
        assert_eq!(MistakeType::from_cpl(300), Some(MistakeType::Blunder));
        assert_eq!(MistakeType::from_cpl(99), Some(MistakeType::Inaccuracy));
        assert_eq!(MistakeType::from_cpl(0), None);
        assert_eq!(MistakeType::from_cpl(10_000), Some(MistakeType::Blunder));
    }

    #[test]
    fn test_type_is_monotone() {
        let mut prev = None;
        for cpl in 0..1000 {
            let ty = MistakeType::from_cpl(cpl);
            assert!(ty >= prev, "non-monotone at {cpl}");
            prev = ty;
        }
    }

    #[test]
    fn test_classify_order() {
        // White queen d1 to d5 walks into the black pawn on e6.
        let position = Position::from_fen("4k3/8/4p3/8/8/8/8/3QK3 w - - 0 30").unwrap();
        let mv = ChessMove::from_str("d1d5").unwrap();
        assert_eq!(
            MistakeCategory::classify(&position, mv, Some(151)),
            MistakeCategory::MissedTactic
        );
        assert_eq!(
            MistakeCategory::classify(&position, mv, Some(150)),
            MistakeCategory::HangingPiece
        );

        let quiet = ChessMove::from_str("d1d2").unwrap();
        assert_eq!(
            MistakeCategory::classify(&position, quiet, None),
            MistakeCategory::PositionalError
        );
    }
}
