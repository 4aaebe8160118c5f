//! Persistence contracts.
//!
//! The pipeline only talks to storage through [`HabitStore`] and
//! [`GameArchive`]. Implementations own durability and transactions;
//! [`MemoryStore`](crate::memory::MemoryStore) is the in-process reference.

use std::fmt;

use blunderscope_evaluator::{features::MistakeDraft, game::PlayerColor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{GameId, HabitId, MemberLink, MistakeId, MistakeRecord, NewHabit, SubjectId};

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum StoreError {
    #[display("habit `{name}` already exists for subject {subject}")]
    DuplicateHabitName { subject: SubjectId, name: String },
    #[display("unknown habit {_0}")]
    UnknownHabit(#[error(not(source))] HabitId),
    #[display("unknown mistake {_0}")]
    UnknownMistake(#[error(not(source))] MistakeId),
    #[display("storage backend failed: {message}")]
    Backend { message: String },
}

/// Durable state of habit analysis.
pub trait HabitStore: fmt::Debug {
    /// Deletes the subject's habits and unlinks their mistakes.
    fn clear_prior_analysis(&self, subject: SubjectId) -> Result<(), StoreError>;

    /// The subject's mistakes not linked to any habit, ascending by id.
    fn fetch_pending_mistakes(&self, subject: SubjectId)
    -> Result<Vec<MistakeRecord>, StoreError>;

    fn save_habit(&self, habit: &NewHabit) -> Result<HabitId, StoreError>;

    /// Links every mistake to `habit`, storing its confidence.
    ///
    /// Either all links are written or none. Repeating a call is a no-op.
    fn link_mistakes(&self, habit: HabitId, links: &[MemberLink]) -> Result<(), StoreError>;

    /// Removes a habit saved in the current run.
    fn discard_habit(&self, habit: HabitId) -> Result<(), StoreError>;
}

/// A game about to be stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGame {
    pub subject: SubjectId,
    /// Provider the game came from.
    pub source: String,
    /// Provider's identifier; unique per subject and source.
    pub source_game_id: String,
    pub color: PlayerColor,
    pub played_at: DateTime<Utc>,
    pub pgn: String,
}

/// Ids assigned to an archived game and its mistakes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedGame {
    pub game: GameId,
    /// In draft order.
    pub mistakes: Vec<MistakeId>,
}

/// Durable state of ingested games.
pub trait GameArchive: fmt::Debug {
    /// Whether the subject's game `source_game_id` from `source` is stored.
    fn contains_game(
        &self,
        subject: SubjectId,
        source: &str,
        source_game_id: &str,
    ) -> Result<bool, StoreError>;

    /// Stores a game together with its mistakes.
    ///
    /// Either the game and all drafts are written or nothing is, so a failed
    /// call can be repeated. Returns `None` if the game is already known.
    fn archive_game(
        &self,
        game: &NewGame,
        drafts: Vec<MistakeDraft>,
    ) -> Result<Option<ArchivedGame>, StoreError>;
}

impl<S> HabitStore for &S
where
    S: HabitStore + ?Sized,
{
    fn clear_prior_analysis(&self, subject: SubjectId) -> Result<(), StoreError> {
        (**self).clear_prior_analysis(subject)
    }

    fn fetch_pending_mistakes(
        &self,
        subject: SubjectId,
    ) -> Result<Vec<MistakeRecord>, StoreError> {
        (**self).fetch_pending_mistakes(subject)
    }

    fn save_habit(&self, habit: &NewHabit) -> Result<HabitId, StoreError> {
        (**self).save_habit(habit)
    }

    fn link_mistakes(&self, habit: HabitId, links: &[MemberLink]) -> Result<(), StoreError> {
        (**self).link_mistakes(habit, links)
    }

    fn discard_habit(&self, habit: HabitId) -> Result<(), StoreError> {
        (**self).discard_habit(habit)
    }
}
