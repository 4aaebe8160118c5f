//! Ingest pass: fetch a subject's games, extract and store their mistakes.

use blunderscope_evaluator::{extractor, game::ParsedGame, oracle::EvaluationOracle};
use serde::Serialize;

use crate::{
    model::Subject,
    source::{ArchivePeriod, GameSource},
    store::{GameArchive, NewGame},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub games_fetched: usize,
    /// Games that were new and contained the subject.
    pub games_analyzed: usize,
    pub mistakes_inserted: usize,
}

/// Analyzes the subject's games of `period` that are not archived yet.
///
/// Nothing here aborts the pass: a failed fetch yields an empty report, and a
/// game that cannot be parsed, does not feature the subject or cannot be
/// stored is skipped. A game and its mistakes are archived together, so a
/// game that failed to store is analyzed again by the next pass.
pub fn ingest_games<S, O, A>(
    source: &S,
    oracle: &mut O,
    archive: &A,
    subject: &Subject,
    period: ArchivePeriod,
) -> IngestReport
where
    S: GameSource + ?Sized,
    O: EvaluationOracle + ?Sized,
    A: GameArchive + ?Sized,
{
    let span = tracing::info_span!("ingest", subject = %subject.id, %period);
    let _enter = span.enter();

    let games = match source.fetch_games(&subject.username, period) {
        Ok(games) => games,
        Err(err) => {
            tracing::warn!(%err, "no games fetched");
            return IngestReport::default();
        }
    };

    let mut report = IngestReport {
        games_fetched: games.len(),
        ..IngestReport::default()
    };
    for game in games {
        let parsed = match ParsedGame::from_pgn(&game.pgn) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(game = %game.id, %err, "skipping unreadable game");
                continue;
            }
        };
        let Some(color) = parsed.player_color(&subject.username) else {
            tracing::warn!(game = %game.id, "subject did not play this game");
            continue;
        };
        let played_at = match parsed.played_at() {
            Ok(played_at) => played_at,
            Err(err) => {
                tracing::warn!(game = %game.id, %err, "skipping game with bad date");
                continue;
            }
        };

        match archive.contains_game(subject.id, source.name(), &game.id) {
            Ok(false) => {}
            Ok(true) => {
                tracing::debug!(game = %game.id, "game already archived");
                continue;
            }
            Err(err) => {
                tracing::error!(game = %game.id, %err, "failed to look up game");
                continue;
            }
        }

        let drafts = extractor::extract_mistakes(&parsed, color, oracle);
        let new_game = NewGame {
            subject: subject.id,
            source: source.name().to_owned(),
            source_game_id: game.id,
            color,
            played_at,
            pgn: game.pgn,
        };
        match archive.archive_game(&new_game, drafts) {
            Ok(Some(archived)) => {
                report.games_analyzed += 1;
                report.mistakes_inserted += archived.mistakes.len();
            }
            Ok(None) => {
                tracing::debug!(game = %new_game.source_game_id, "game archived concurrently");
            }
            Err(err) => {
                tracing::error!(game = %new_game.source_game_id, %err, "failed to store game");
            }
        }
    }

    tracing::info!(
        fetched = report.games_fetched,
        analyzed = report.games_analyzed,
        mistakes = report.mistakes_inserted,
        "ingest finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use blunderscope_engine::{MistakeType, Position};
    use blunderscope_evaluator::features::MistakeDraft;

    use super::*;
    use crate::{
        memory::MemoryStore,
        model::SubjectId,
        source::{GameSourceError, SourceGame},
        store::{ArchivedGame, HabitStore as _, StoreError},
        testing::ScriptedOracle,
    };

    const HANGING_KNIGHT: &str = "4k3/8/3p4/8/3P4/5N2/8/4K3 w - - 0 30";

    #[derive(Debug)]
    struct FixedSource(Vec<SourceGame>);

    impl GameSource for FixedSource {
        fn name(&self) -> &str {
            "fixture"
        }

        fn fetch_games(
            &self,
            username: &str,
            period: ArchivePeriod,
        ) -> Result<Vec<SourceGame>, GameSourceError> {
            if self.0.is_empty() {
                return Err(GameSourceError::NotFound {
                    username: username.to_owned(),
                    period,
                });
            }
            Ok(self.0.clone())
        }
    }

    fn pgn(white: &str, black: &str) -> String {
        format!(
            "[White \"{white}\"]\n[Black \"{black}\"]\n[SetUp \"1\"]\n[FEN \"{HANGING_KNIGHT}\"]\n\n30. Ne5 dxe5 *\n"
        )
    }

    /// Delegates to a memory store after failing the first calls.
    #[derive(Debug, Default)]
    struct FlakyArchive {
        inner: MemoryStore,
        lookup_failures: Cell<u32>,
        write_failures: Cell<u32>,
    }

    fn fail_once_more(remaining: &Cell<u32>) -> Result<(), StoreError> {
        if remaining.get() == 0 {
            return Ok(());
        }
        remaining.set(remaining.get() - 1);
        Err(StoreError::Backend {
            message: "transient".to_owned(),
        })
    }

    impl GameArchive for FlakyArchive {
        fn contains_game(
            &self,
            subject: SubjectId,
            source: &str,
            source_game_id: &str,
        ) -> Result<bool, StoreError> {
            fail_once_more(&self.lookup_failures)?;
            self.inner.contains_game(subject, source, source_game_id)
        }

        fn archive_game(
            &self,
            game: &NewGame,
            drafts: Vec<MistakeDraft>,
        ) -> Result<Option<ArchivedGame>, StoreError> {
            fail_once_more(&self.write_failures)?;
            self.inner.archive_game(game, drafts)
        }
    }

    fn hanging_knight_oracle() -> ScriptedOracle {
        let start = Position::from_fen(HANGING_KNIGHT).unwrap();
        let after = start.play("f3e5".parse().unwrap());
        ScriptedOracle::default()
            .with(&start, &[("e1e2", 50), ("f3g5", 40)])
            .with(&after, &[("d6e5", 250)])
    }

    fn single_game() -> FixedSource {
        FixedSource(vec![SourceGame {
            id: "g1".to_owned(),
            pgn: pgn("alice", "bob"),
        }])
    }

    fn subject() -> Subject {
        Subject {
            id: SubjectId(7),
            username: "Alice".to_owned(),
        }
    }

    fn period() -> ArchivePeriod {
        ArchivePeriod::new(2024, 3).unwrap()
    }

    #[test]
    fn test_ingest() {
        let mut oracle = hanging_knight_oracle();
        let source = FixedSource(vec![
            SourceGame {
                id: "g1".to_owned(),
                pgn: pgn("alice", "bob"),
            },
            SourceGame {
                id: "g1".to_owned(),
                pgn: pgn("alice", "bob"),
            },
            SourceGame {
                id: "g2".to_owned(),
                pgn: pgn("carol", "bob"),
            },
            SourceGame {
                id: "g3".to_owned(),
                pgn: "1. e4 e5 2. Ke3 *".to_owned(),
            },
        ]);
        let store = MemoryStore::new();

        let report = ingest_games(&source, &mut oracle, &store, &subject(), period());
        assert_eq!(
            report,
            IngestReport {
                games_fetched: 4,
                games_analyzed: 1,
                mistakes_inserted: 1,
            }
        );
        let pending = store.fetch_pending_mistakes(SubjectId(7)).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].cpl, 300);
        assert_eq!(pending[0].features.mistake_type, MistakeType::Blunder);

        // already archived games are not analyzed again
        let again = ingest_games(&source, &mut oracle, &store, &subject(), period());
        assert_eq!(again.games_analyzed, 0);
        assert_eq!(store.fetch_pending_mistakes(SubjectId(7)).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_fetch_is_empty_report() {
        let mut oracle = ScriptedOracle::default();
        let report = ingest_games(
            &FixedSource(vec![]),
            &mut oracle,
            &MemoryStore::new(),
            &subject(),
            period(),
        );
        assert_eq!(report, IngestReport::default());
    }

    #[test]
    fn test_failed_write_is_retried_by_next_pass() {
        let mut oracle = hanging_knight_oracle();
        let archive = FlakyArchive {
            write_failures: Cell::new(1),
            ..FlakyArchive::default()
        };

        let first = ingest_games(&single_game(), &mut oracle, &archive, &subject(), period());
        assert_eq!(
            first,
            IngestReport {
                games_fetched: 1,
                games_analyzed: 0,
                mistakes_inserted: 0,
            }
        );
        assert!(!archive.inner.contains_game(SubjectId(7), "fixture", "g1").unwrap());

        let second = ingest_games(&single_game(), &mut oracle, &archive, &subject(), period());
        assert_eq!(
            second,
            IngestReport {
                games_fetched: 1,
                games_analyzed: 1,
                mistakes_inserted: 1,
            }
        );
        let pending = archive.inner.fetch_pending_mistakes(SubjectId(7)).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].cpl, 300);
    }

    #[test]
    fn test_failed_lookup_skips_game() {
        let mut oracle = hanging_knight_oracle();
        let archive = FlakyArchive {
            lookup_failures: Cell::new(1),
            ..FlakyArchive::default()
        };

        let first = ingest_games(&single_game(), &mut oracle, &archive, &subject(), period());
        assert_eq!(first.games_analyzed, 0);
        assert!(archive.inner.fetch_pending_mistakes(SubjectId(7)).unwrap().is_empty());

        let second = ingest_games(&single_game(), &mut oracle, &archive, &subject(), period());
        assert_eq!(second.games_analyzed, 1);
        assert_eq!(second.mistakes_inserted, 1);
    }
}
