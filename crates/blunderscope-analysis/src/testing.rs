//! Fixtures shared by the unit tests.

use std::{collections::HashMap, str::FromStr as _};

use blunderscope_engine::{
    BoardComplexity, CastlingStatus, GamePhase, KingSafety, MaterialBalance, MistakeCategory,
    MistakeType, MoveType, PieceKind, Position,
};
use blunderscope_evaluator::{
    features::{MistakeDraft, MistakeFeatures},
    game::PlayerColor,
    oracle::{EvaluationOracle, OracleError, Score, Variation},
};
use chess::ChessMove;
use chrono::DateTime;

use crate::{
    memory::MemoryStore,
    model::{GameId, MistakeId, MistakeRecord, SubjectId},
    store::{GameArchive as _, NewGame},
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A rook left hanging in a quiet endgame.
pub fn features() -> MistakeFeatures {
    MistakeFeatures {
        mistake_type: MistakeType::Blunder,
        mistake_category: MistakeCategory::HangingPiece,
        game_phase: GamePhase::Endgame,
        material_balance: MaterialBalance::Equal,
        board_complexity: BoardComplexity::Low,
        king_self_safety: KingSafety::Safe,
        king_opponent_status: KingSafety::Safe,
        castling_status_self: CastlingStatus::CannotCastle,
        piece_moved: PieceKind::Rook,
        move_type: MoveType::Quiet,
        piece_was_attacked: false,
        piece_was_defended: false,
        piece_was_defending: false,
        piece_was_pinned: false,
    }
}

pub fn draft(cpl: u32, move_number: u32) -> MistakeDraft {
    let mut features = features();
    features.mistake_type = MistakeType::from_cpl(cpl).unwrap_or(MistakeType::Inaccuracy);
    draft_with(cpl, move_number, features)
}

fn draft_with(cpl: u32, move_number: u32, features: MistakeFeatures) -> MistakeDraft {
    MistakeDraft {
        move_number,
        color: PlayerColor::White,
        fen_before: Position::initial().fen(),
        move_played: "e2e4".to_owned(),
        best_move: "d2d4".to_owned(),
        cpl,
        features,
    }
}

pub fn record(id: u64, cpl: u32, move_number: u32) -> MistakeRecord {
    MistakeRecord::from_draft(MistakeId(id), GameId(1), draft(cpl, move_number))
}

pub fn new_game(subject: SubjectId, source_game_id: &str) -> NewGame {
    NewGame {
        subject,
        source: "fixture".to_owned(),
        source_game_id: source_game_id.to_owned(),
        color: PlayerColor::White,
        played_at: DateTime::UNIX_EPOCH,
        pgn: String::new(),
    }
}

/// Five endgame rook blunders sharing every categorical level, followed by
/// twenty varied opening and middlegame mistakes.
pub fn habit_population() -> Vec<MistakeRecord> {
    let pattern = (0..5).map(|i| {
        let features = MistakeFeatures {
            mistake_type: MistakeType::Blunder,
            mistake_category: MistakeCategory::HangingPiece,
            game_phase: GamePhase::Endgame,
            material_balance: MaterialBalance::Losing,
            board_complexity: BoardComplexity::Low,
            king_self_safety: KingSafety::Safe,
            king_opponent_status: KingSafety::Exposed,
            castling_status_self: CastlingStatus::HasCastled,
            piece_moved: PieceKind::Rook,
            move_type: MoveType::Quiet,
            piece_was_attacked: false,
            piece_was_defended: false,
            piece_was_defending: false,
            piece_was_pinned: false,
        };
        draft_with(320 + 10 * i, 40 + i, features)
    });

    let noise = (0..20).map(|i: u32| {
        let (mistake_type, cpl) = if i % 2 == 0 {
            (MistakeType::Mistake, 110 + (i * 7) % 150)
        } else {
            (MistakeType::Inaccuracy, 55 + (i * 3) % 40)
        };
        let features = MistakeFeatures {
            mistake_type,
            mistake_category: if i % 3 == 0 {
                MistakeCategory::MissedTactic
            } else {
                MistakeCategory::PositionalError
            },
            game_phase: if i < 8 {
                GamePhase::Opening
            } else {
                GamePhase::Middlegame
            },
            material_balance: if i % 2 == 0 {
                MaterialBalance::Winning
            } else {
                MaterialBalance::Equal
            },
            board_complexity: if i % 4 == 0 {
                BoardComplexity::High
            } else {
                BoardComplexity::Medium
            },
            king_self_safety: if i % 5 == 0 {
                KingSafety::Exposed
            } else {
                KingSafety::Safe
            },
            king_opponent_status: KingSafety::Safe,
            castling_status_self: if i < 10 {
                CastlingStatus::CanCastle
            } else {
                CastlingStatus::CannotCastle
            },
            piece_moved: [
                PieceKind::Pawn,
                PieceKind::Knight,
                PieceKind::Bishop,
                PieceKind::Queen,
            ][i as usize % 4],
            move_type: [MoveType::Quiet, MoveType::Capture, MoveType::Check][i as usize % 3],
            piece_was_attacked: i % 2 == 1,
            piece_was_defended: (i / 2) % 2 == 1,
            piece_was_defending: i % 7 == 0,
            piece_was_pinned: false,
        };
        draft_with(cpl, 8 + i, features)
    });

    pattern
        .chain(noise)
        .zip(0..)
        .map(|(draft, id)| MistakeRecord::from_draft(MistakeId(id), GameId(1), draft))
        .collect()
}

/// Stores `records` as pending mistakes of one game; returns the new ids.
pub fn seed_store(
    store: &MemoryStore,
    subject: SubjectId,
    records: &[MistakeRecord],
) -> Vec<MistakeId> {
    let drafts = records
        .iter()
        .map(|r| MistakeDraft {
            move_number: r.move_number,
            color: r.color,
            fen_before: r.fen_before.clone(),
            move_played: r.move_played.clone(),
            best_move: r.best_move.clone(),
            cpl: r.cpl,
            features: r.features,
        })
        .collect();
    store
        .archive_game(&new_game(subject, "seed"), drafts)
        .unwrap()
        .unwrap()
        .mistakes
}

/// Answers from a fixed table keyed by FEN.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    lines: HashMap<String, Vec<Variation>>,
}

impl ScriptedOracle {
    pub fn with(mut self, position: &Position, lines: &[(&str, i32)]) -> Self {
        let lines = lines
            .iter()
            .map(|&(mv, cp)| {
                Variation::new(ChessMove::from_str(mv).unwrap(), Score::Centipawns(cp))
            })
            .collect();
        self.lines.insert(position.fen(), lines);
        self
    }
}

impl EvaluationOracle for ScriptedOracle {
    fn evaluate(
        &mut self,
        position: &Position,
        variations: usize,
    ) -> Result<Vec<Variation>, OracleError> {
        let mut lines = self.lines.get(&position.fen()).cloned().unwrap_or_default();
        lines.truncate(variations);
        Ok(lines)
    }
}
