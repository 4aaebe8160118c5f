//! Habit discovery from a player's recorded mistakes.
//!
//! This crate groups a subject's mistakes into recurring "habits" and explains
//! each one with the feature levels that single it out.
//!
//! # Overview
//!
//! ## Ingest Workflow
//!
//! 1. **Fetch Games** ([`source::GameSource`]): a period of the subject's games
//! 2. **Extract Mistakes** ([`ingest::ingest_games`]): evaluate every move of
//!    the subject and keep the ones that lose enough centipawns
//! 3. **Archive** ([`store::GameArchive`]): store games and pending mistakes
//!
//! ## Analysis Workflow
//!
//! 1. **Cluster** ([`clustering::cluster_mistakes`]): Gower dissimilarity and
//!    HDBSCAN over all pending mistakes
//! 2. **Encode** ([`encoder::OneHotEncoder`]): one shared one-hot layout for the
//!    whole population
//! 3. **Find Triggers** ([`triggers::identify_triggers`]): sparse logistic model
//!    of each cluster against the rest
//! 4. **Summarize** ([`summary::summarize`]): counts, centipawn loss and most
//!    frequent levels per cluster
//! 5. **Explain and Persist** ([`pipeline::HabitPipeline`]): coaching text from
//!    a [`feedback::FeedbackService`], then save and link each habit
//!
//! # Examples
//!
//! ```no_run
//! use blunderscope_analysis::{
//!     config::AnalysisSettings,
//!     feedback::{FeedbackError, FeedbackRequest, FeedbackService},
//!     ingest::ingest_games,
//!     memory::MemoryStore,
//!     model::{Subject, SubjectId},
//!     pipeline::HabitPipeline,
//!     source::{ArchivePeriod, GameSource, GameSourceError, SourceGame},
//! };
//! use blunderscope_evaluator::uci::UciEngine;
//! # #[derive(Debug)]
//! # struct Archive;
//! # impl GameSource for Archive {
//! #     fn name(&self) -> &str { "archive" }
//! #     fn fetch_games(&self, _: &str, _: ArchivePeriod) -> Result<Vec<SourceGame>, GameSourceError> { Ok(vec![]) }
//! # }
//! # #[derive(Debug)]
//! # struct Coach;
//! # impl FeedbackService for Coach {
//! #     fn generate(&self, _: &FeedbackRequest) -> Result<String, FeedbackError> { Ok(String::new()) }
//! # }
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//!
//! let settings = AnalysisSettings::from_json_file("blunderscope.json")?;
//! let store = MemoryStore::new();
//! let subject = Subject {
//!     id: SubjectId(1),
//!     username: "alice".to_owned(),
//! };
//!
//! let mut engine = UciEngine::spawn(settings.engine.clone())?;
//! let period = ArchivePeriod::new(2024, 3).ok_or("bad period")?;
//! ingest_games(&Archive, &mut engine, &store, &subject, period);
//! engine.quit()?;
//!
//! let pipeline = HabitPipeline::new(&store, Coach, settings.pipeline);
//! let report = pipeline.run(subject.id)?;
//! println!("{} new habits", report.new_habits_found);
//! # Ok(())
//! # }
//! ```

pub mod clustering;
pub mod config;
pub mod encoder;
pub mod feedback;
pub mod ingest;
pub mod memory;
pub mod model;
pub mod pipeline;
pub mod retry;
pub mod source;
pub mod store;
pub mod summary;
pub mod triggers;

#[cfg(test)]
mod testing;
