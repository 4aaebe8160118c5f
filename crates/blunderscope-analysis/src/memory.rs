//! In-memory storage backend.

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use blunderscope_evaluator::features::MistakeDraft;
use chrono::Utc;

use crate::{
    model::{
        GameId, Habit, HabitId, MemberLink, MistakeId, MistakeRecord, NewHabit, SubjectId,
    },
    store::{ArchivedGame, GameArchive, HabitStore, NewGame, StoreError},
};

/// Thread-safe [`HabitStore`] and [`GameArchive`] kept in memory.
///
/// Enforces the same constraints a relational backend would: habit names are
/// unique per subject, links must reference existing rows, and a game is only
/// stored once per subject and source.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    games: BTreeMap<GameId, NewGame>,
    mistakes: BTreeMap<MistakeId, MistakeRecord>,
    habits: BTreeMap<HabitId, Habit>,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn subject_of(&self, game: GameId) -> Option<SubjectId> {
        self.games.get(&game).map(|g| g.subject)
    }

    fn has_game(&self, subject: SubjectId, source: &str, source_game_id: &str) -> bool {
        self.games.values().any(|g| {
            g.subject == subject && g.source == source && g.source_game_id == source_game_id
        })
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // state is only mutated after all checks pass, so a poisoned lock
        // still holds consistent data
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn mistake(&self, id: MistakeId) -> Option<MistakeRecord> {
        self.lock().mistakes.get(&id).cloned()
    }

    /// All habits of `subject`, ascending by id.
    #[must_use]
    pub fn habits(&self, subject: SubjectId) -> Vec<Habit> {
        self.lock()
            .habits
            .values()
            .filter(|h| h.details.subject == subject)
            .cloned()
            .collect()
    }

    /// Mistakes linked to `habit`, ascending by id.
    #[must_use]
    pub fn habit_members(&self, habit: HabitId) -> Vec<MistakeRecord> {
        self.lock()
            .mistakes
            .values()
            .filter(|m| m.habit_id == Some(habit))
            .cloned()
            .collect()
    }
}

impl HabitStore for MemoryStore {
    fn clear_prior_analysis(&self, subject: SubjectId) -> Result<(), StoreError> {
        let mut state = self.lock();
        let cleared = state
            .habits
            .values()
            .filter(|habit| habit.details.subject == subject)
            .map(|habit| habit.id)
            .collect::<Vec<_>>();
        state
            .habits
            .retain(|_, habit| habit.details.subject != subject);
        for mistake in state.mistakes.values_mut() {
            if mistake.habit_id.is_some_and(|h| cleared.contains(&h)) {
                mistake.habit_id = None;
                mistake.habit_confidence = None;
            }
        }
        tracing::debug!(%subject, habits = cleared.len(), "prior analysis cleared");
        Ok(())
    }

    fn fetch_pending_mistakes(
        &self,
        subject: SubjectId,
    ) -> Result<Vec<MistakeRecord>, StoreError> {
        let state = self.lock();
        Ok(state
            .mistakes
            .values()
            .filter(|m| m.is_pending() && state.subject_of(m.game_id) == Some(subject))
            .cloned()
            .collect())
    }

    fn save_habit(&self, habit: &NewHabit) -> Result<HabitId, StoreError> {
        let mut state = self.lock();
        let duplicate = state
            .habits
            .values()
            .any(|h| h.details.subject == habit.subject && h.details.name == habit.name);
        if duplicate {
            return Err(StoreError::DuplicateHabitName {
                subject: habit.subject,
                name: habit.name.clone(),
            });
        }
        if !state.mistakes.contains_key(&habit.representative) {
            return Err(StoreError::UnknownMistake(habit.representative));
        }
        let id = HabitId(state.next_id());
        state.habits.insert(
            id,
            Habit {
                id,
                details: habit.clone(),
                created_at: Utc::now(),
                remedied_at: None,
            },
        );
        Ok(id)
    }

    fn link_mistakes(&self, habit: HabitId, links: &[MemberLink]) -> Result<(), StoreError> {
        let mut state = self.lock();
        if !state.habits.contains_key(&habit) {
            return Err(StoreError::UnknownHabit(habit));
        }
        if let Some(missing) = links
            .iter()
            .find(|link| !state.mistakes.contains_key(&link.mistake))
        {
            return Err(StoreError::UnknownMistake(missing.mistake));
        }
        for link in links {
            if let Some(mistake) = state.mistakes.get_mut(&link.mistake) {
                mistake.habit_id = Some(habit);
                mistake.habit_confidence = Some(link.confidence);
            }
        }
        Ok(())
    }

    fn discard_habit(&self, habit: HabitId) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.habits.remove(&habit).is_none() {
            return Err(StoreError::UnknownHabit(habit));
        }
        for mistake in state.mistakes.values_mut() {
            if mistake.habit_id == Some(habit) {
                mistake.habit_id = None;
                mistake.habit_confidence = None;
            }
        }
        Ok(())
    }
}

impl GameArchive for MemoryStore {
    fn contains_game(
        &self,
        subject: SubjectId,
        source: &str,
        source_game_id: &str,
    ) -> Result<bool, StoreError> {
        Ok(self.lock().has_game(subject, source, source_game_id))
    }

    fn archive_game(
        &self,
        game: &NewGame,
        drafts: Vec<MistakeDraft>,
    ) -> Result<Option<ArchivedGame>, StoreError> {
        let mut state = self.lock();
        if state.has_game(game.subject, &game.source, &game.source_game_id) {
            return Ok(None);
        }
        let game_id = GameId(state.next_id());
        state.games.insert(game_id, game.clone());
        let mut mistakes = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let id = MistakeId(state.next_id());
            state
                .mistakes
                .insert(id, MistakeRecord::from_draft(id, game_id, draft));
            mistakes.push(id);
        }
        Ok(Some(ArchivedGame {
            game: game_id,
            mistakes,
        }))
    }
}
