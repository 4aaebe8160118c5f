//! Chess semantics for mistake analysis.
//!
//! This crate turns a chess position into the closed, strongly-typed feature
//! levels used to describe a mistake. Every query is a pure function of an
//! immutable [`Position`] snapshot; hypothetical questions such as "would this
//! square be attacked if that piece were gone" are answered by passing an
//! alternative occupancy instead of mutating a shared board.
//!
//! # Modules
//!
//! - [`level`]: the [`FeatureLevel`] trait implemented by every categorical feature
//! - [`features`]: context and action levels (game phase, king safety, move type, ...)
//! - [`mistake`]: [`MistakeType`] and [`MistakeCategory`] with their fixed thresholds
//! - [`position`]: static board queries over a [`Position`]
//!
//! # Example
//!
//! ```
//! use blunderscope_engine::{GamePhase, MistakeType, Position};
//!
//! let position = Position::initial();
//! assert_eq!(position.game_phase(), GamePhase::Opening);
//! assert_eq!(MistakeType::from_cpl(300), Some(MistakeType::Blunder));
//! assert_eq!(MistakeType::from_cpl(299), Some(MistakeType::Mistake));
//! ```

pub use self::{features::*, level::FeatureLevel, mistake::*, position::*};

#[macro_use]
pub mod level;

pub mod features;
pub mod mistake;
pub mod position;

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("invalid FEN string: {fen}")]
pub struct InvalidFenError {
    pub fen: String,
}
