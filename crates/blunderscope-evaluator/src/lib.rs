//! Move feature extraction: from played games to structured mistake records.
//!
//! This crate implements the first stage of habit analysis:
//!
//! 1. **Game parsing** ([`game`]) - PGN or UCI move lists into a [`game::ParsedGame`]
//! 2. **Evaluation** ([`oracle`], [`uci`]) - ranked engine lines for a position,
//!    behind the [`oracle::EvaluationOracle`] trait
//! 3. **Extraction** ([`extractor`]) - centipawn loss, severity, category and the
//!    context/action features of each flagged move ([`features`])
//!
//! # Example
//!
//! ```rust,no_run
//! use blunderscope_evaluator::{
//!     extractor::extract_mistakes,
//!     game::ParsedGame,
//!     uci::{UciEngine, UciEngineConfig},
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let game = ParsedGame::from_pgn("[White \"alice\"]\n[Black \"bob\"]\n\n1. f3 e5 2. g4 Qh4# 0-1\n")?;
//! let color = game.player_color("alice").unwrap();
//! let mut engine = UciEngine::spawn(UciEngineConfig::default())?;
//! for mistake in extract_mistakes(&game, color, &mut engine) {
//!     println!("{} lost {} cp", mistake.move_played, mistake.cpl);
//! }
//! # Ok(())
//! # }
//! ```

pub mod extractor;
pub mod features;
pub mod game;
pub mod oracle;
pub mod uci;
