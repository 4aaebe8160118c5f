//! Evaluation oracle contract.
//!
//! An oracle ranks the best continuations of a position. Scores are relative
//! to the side to move and mate outcomes are folded onto a fixed large
//! magnitude so that all arithmetic stays in centipawns.

use std::{fmt, io};

use blunderscope_engine::Position;
use chess::ChessMove;

/// Centipawn magnitude standing in for a forced mate.
pub const MATE_SCORE: i32 = 10_000;

/// Raw engine score from the side to move's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Score {
    Centipawns(i32),
    /// Moves to mate; negative when the side to move is getting mated.
    Mate(i32),
}

impl Score {
    /// Folds the score onto a single centipawn scale.
    ///
    /// A faster mate scores higher than a slower one:
    ///
    /// ```
    /// use blunderscope_evaluator::oracle::Score;
    ///
    /// assert_eq!(Score::Centipawns(35).to_centipawns(), 35);
    /// assert_eq!(Score::Mate(1).to_centipawns(), 9_999);
    /// assert_eq!(Score::Mate(3).to_centipawns(), 9_997);
    /// assert_eq!(Score::Mate(-2).to_centipawns(), -9_998);
    /// assert_eq!(Score::Mate(0).to_centipawns(), -10_000);
    /// ```
    #[must_use]
    pub const fn to_centipawns(self) -> i32 {
        match self {
            Self::Centipawns(cp) => cp,
            Self::Mate(n) if n > 0 => MATE_SCORE - n,
            Self::Mate(n) => -MATE_SCORE - n,
        }
    }
}

/// One ranked principal variation: its first move and score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variation {
    pub mv: ChessMove,
    pub score: Score,
}

impl Variation {
    #[must_use]
    pub const fn new(mv: ChessMove, score: Score) -> Self {
        Self { mv, score }
    }

    #[must_use]
    pub const fn centipawns(&self) -> i32 {
        self.score.to_centipawns()
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum OracleError {
    #[display("failed to start engine `{program}`")]
    Spawn { program: String, source: io::Error },
    #[display("engine I/O failed")]
    #[from]
    Io(io::Error),
    #[display("engine closed its output while waiting for `{expected}`")]
    UnexpectedEof { expected: &'static str },
    #[display("engine process is not running")]
    NotRunning,
    #[display("engine returned no usable line")]
    NoVariation,
}

/// Ranks continuations of a position.
///
/// Implementations return at most `variations` lines, best first. Scores of
/// different calls must be comparable. Returning an empty list means no usable
/// line was found; callers treat it like [`OracleError::NoVariation`].
pub trait EvaluationOracle: fmt::Debug {
    fn evaluate(
        &mut self,
        position: &Position,
        variations: usize,
    ) -> Result<Vec<Variation>, OracleError>;
}

impl<O> EvaluationOracle for &mut O
where
    O: EvaluationOracle + ?Sized,
{
    fn evaluate(
        &mut self,
        position: &Position,
        variations: usize,
    ) -> Result<Vec<Variation>, OracleError> {
        (**self).evaluate(position, variations)
    }
}
