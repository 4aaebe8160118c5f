//! Records exchanged with the persistence layer.

use std::collections::BTreeMap;

use blunderscope_evaluator::{
    features::{FieldGroup, MistakeDraft, MistakeFeatures},
    game::PlayerColor,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($($(#[$meta:meta])* $name:ident;)+) => {
        $(
            $(#[$meta])*
            #[derive(
                Debug,
                Clone,
                Copy,
                PartialEq,
                Eq,
                Hash,
                PartialOrd,
                Ord,
                Serialize,
                Deserialize,
                derive_more::Display,
            )]
            #[serde(transparent)]
            pub struct $name(pub u64);
        )+
    };
}

id_type! {
    /// Identity of a stored mistake.
    MistakeId;
    /// Identity of a stored habit.
    HabitId;
    /// Identity of a stored game.
    GameId;
    /// The player whose mistakes are analyzed.
    SubjectId;
}

/// A player as known to the game source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub username: String,
}

/// A persisted mistake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MistakeRecord {
    pub id: MistakeId,
    pub game_id: GameId,
    pub move_number: u32,
    pub color: PlayerColor,
    pub fen_before: String,
    pub move_played: String,
    pub best_move: String,
    pub cpl: u32,
    pub features: MistakeFeatures,
    /// Habit this mistake belongs to; `None` while pending.
    pub habit_id: Option<HabitId>,
    /// Membership confidence in `[0, 1]`, set together with `habit_id`.
    pub habit_confidence: Option<f64>,
}

impl MistakeRecord {
    /// Gives a freshly extracted draft its stored identity.
    #[must_use]
    pub fn from_draft(id: MistakeId, game_id: GameId, draft: MistakeDraft) -> Self {
        let MistakeDraft {
            move_number,
            color,
            fen_before,
            move_played,
            best_move,
            cpl,
            features,
        } = draft;
        Self {
            id,
            game_id,
            move_number,
            color,
            fen_before,
            move_played,
            best_move,
            cpl,
            features,
            habit_id: None,
            habit_confidence: None,
        }
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.habit_id.is_none()
    }
}

/// A one-hot feature level that co-occurs with habit membership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    /// One-hot column name, `<field>_<Level>`.
    pub feature: String,
    /// Human-readable form, `<field words>: <Level>`.
    pub label: String,
    pub group: FieldGroup,
    /// Fitted coefficient; always above the trigger floor.
    pub weight: f64,
}

/// Everything needed to store a habit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHabit {
    pub subject: SubjectId,
    /// Cluster label the habit was derived from.
    pub cluster_label: u32,
    pub name: String,
    /// Feature name to positive weight.
    pub triggers: BTreeMap<String, f64>,
    /// Mean membership probability of the cluster.
    pub confidence: f64,
    /// Member with the highest centipawn loss.
    pub representative: MistakeId,
    pub feedback: String,
    pub tip: String,
}

/// A stored habit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
    pub id: HabitId,
    #[serde(flatten)]
    pub details: NewHabit,
    pub created_at: DateTime<Utc>,
    pub remedied_at: Option<DateTime<Utc>>,
}

/// A cluster member to link to a habit, with its membership confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemberLink {
    pub mistake: MistakeId,
    pub confidence: f64,
}
