//! Turns a played game into mistake records.
//!
//! # How It Works
//!
//! For every ply played by the subject while the game is still undecided:
//!
//! 1. Ask the oracle for the best [`CANDIDATE_LINES`] lines of the position.
//! 2. Score the played move: read it from the candidate lines when present,
//!    derive it directly when the move ends the game, otherwise evaluate the
//!    resulting position with a single line and negate it.
//! 3. `cpl = max(0, best - played)`; moves below the inaccuracy threshold are
//!    dropped.
//! 4. Categorize the mistake and compute the context and action features on
//!    the position before the move.
//!
//! Plies the oracle cannot evaluate are skipped with a warning; they never
//! abort the game.

use blunderscope_engine::{MistakeCategory, MistakeType, Position};
use chess::{BoardStatus, ChessMove};

use crate::{
    features::{MistakeDraft, MistakeFeatures},
    game::{ParsedGame, PlayerColor},
    oracle::{EvaluationOracle, MATE_SCORE, OracleError, Variation},
};

/// Number of ranked lines requested before each move.
pub const CANDIDATE_LINES: usize = 2;

/// Extracts every mistake `color` made in `game`.
///
/// # Arguments
///
/// * `game` - The game to analyze
/// * `color` - The subject's color; the opponent's moves are not evaluated
/// * `oracle` - Source of engine evaluations
///
/// # Returns
///
/// Mistake drafts in the order the moves were played.
pub fn extract_mistakes<O>(
    game: &ParsedGame,
    color: PlayerColor,
    oracle: &mut O,
) -> Vec<MistakeDraft>
where
    O: EvaluationOracle + ?Sized,
{
    let subject = chess::Color::from(color);
    let mut drafts = vec![];
    for (ply, (position, mv)) in game.plies().enumerate() {
        if position.status() != BoardStatus::Ongoing {
            break;
        }
        if position.side_to_move() != subject {
            continue;
        }
        match analyze_move(&position, mv, oracle) {
            Ok(Some(draft)) => drafts.push(draft),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(ply, mv = %mv, %err, "skipping ply without evaluation");
            }
        }
    }
    tracing::debug!(plies = game.moves().len(), mistakes = drafts.len(), "game analyzed");
    drafts
}

/// Evaluates one move. Returns `Ok(None)` when it is not a mistake.
pub fn analyze_move<O>(
    position: &Position,
    mv: ChessMove,
    oracle: &mut O,
) -> Result<Option<MistakeDraft>, OracleError>
where
    O: EvaluationOracle + ?Sized,
{
    let lines = oracle.evaluate(position, CANDIDATE_LINES)?;
    let best = *lines.first().ok_or(OracleError::NoVariation)?;
    let best_score = best.centipawns();
    let played_score = played_move_score(position, mv, &lines, oracle)?;

    let cpl = u32::try_from(best_score.saturating_sub(played_score)).unwrap_or(0);
    let Some(mistake_type) = MistakeType::from_cpl(cpl) else {
        return Ok(None);
    };
    let gap = lines.get(1).map(|second| best_score - second.centipawns());
    let mistake_category = MistakeCategory::classify(position, mv, gap);
    let Some(features) = move_features(position, mv, mistake_type, mistake_category) else {
        return Ok(None);
    };

    Ok(Some(MistakeDraft {
        move_number: position.fullmove_number(),
        color: position.side_to_move().into(),
        fen_before: position.fen(),
        move_played: mv.to_string(),
        best_move: best.mv.to_string(),
        cpl,
        features,
    }))
}

/// Score of the played move from the mover's point of view.
fn played_move_score<O>(
    position: &Position,
    mv: ChessMove,
    lines: &[Variation],
    oracle: &mut O,
) -> Result<i32, OracleError>
where
    O: EvaluationOracle + ?Sized,
{
    if let Some(line) = lines.iter().find(|line| line.mv == mv) {
        return Ok(line.centipawns());
    }
    let after = position.play(mv);
    match after.status() {
        BoardStatus::Checkmate => Ok(MATE_SCORE),
        BoardStatus::Stalemate => Ok(0),
        BoardStatus::Ongoing => {
            let reply = oracle.evaluate(&after, 1)?;
            let first = reply.first().ok_or(OracleError::NoVariation)?;
            Ok(-first.centipawns())
        }
    }
}

fn move_features(
    position: &Position,
    mv: ChessMove,
    mistake_type: MistakeType,
    mistake_category: MistakeCategory,
) -> Option<MistakeFeatures> {
    let us = position.side_to_move();
    let source = mv.get_source();
    let piece_moved = position.piece_kind_on(source)?;
    Some(MistakeFeatures {
        mistake_type,
        mistake_category,
        game_phase: position.game_phase(),
        material_balance: position.material_balance(us),
        board_complexity: position.board_complexity(),
        king_self_safety: position.king_safety(us),
        king_opponent_status: position.king_safety(!us),
        castling_status_self: position.castling_status(us),
        piece_moved,
        move_type: position.move_type(mv),
        piece_was_attacked: position.is_attacked_by(!us, source),
        piece_was_defended: position.is_attacked_by(us, source),
        piece_was_defending: position.is_defending(source),
        piece_was_pinned: position.is_pinned(source),
    })
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{HashMap, HashSet},
        io,
        str::FromStr as _,
    };

    use blunderscope_engine::{GamePhase, KingSafety, MoveType, PieceKind};

    use super::*;
    use crate::oracle::Score;

    /// Answers from a fixed table keyed by FEN and counts calls.
    #[derive(Debug, Default)]
    struct ScriptedOracle {
        lines: HashMap<String, Vec<Variation>>,
        broken: HashSet<String>,
        calls: Vec<(String, usize)>,
    }

    impl ScriptedOracle {
        fn with(mut self, position: &Position, lines: &[(&str, i32)]) -> Self {
            let lines = lines
                .iter()
                .map(|&(mv, cp)| Variation::new(mv_(mv), Score::Centipawns(cp)))
                .collect();
            self.lines.insert(position.fen(), lines);
            self
        }

        fn failing_on(mut self, position: &Position) -> Self {
            self.broken.insert(position.fen());
            self
        }
    }

    impl EvaluationOracle for ScriptedOracle {
        fn evaluate(
            &mut self,
            position: &Position,
            variations: usize,
        ) -> Result<Vec<Variation>, OracleError> {
            let fen = position.fen();
            self.calls.push((fen.clone(), variations));
            if self.broken.contains(&fen) {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "engine died").into());
            }
            let mut lines = self.lines.get(&fen).cloned().unwrap_or_default();
            lines.truncate(variations);
            Ok(lines)
        }
    }

    fn mv_(uci: &str) -> ChessMove {
        ChessMove::from_str(uci).unwrap()
    }

    const HANGING_KNIGHT: &str = "4k3/8/3p4/8/3P4/5N2/8/4K3 w - - 0 30";

    #[test]
    fn test_blunder_leaving_piece_en_prise() {
        let start = Position::from_fen(HANGING_KNIGHT).unwrap();
        let after = start.play(mv_("f3e5"));
        let mut oracle = ScriptedOracle::default()
            .with(&start, &[("e1e2", 50), ("f3g5", 40)])
            .with(&after, &[("d6e5", 250)]);
        let game = ParsedGame::from_uci_moves(HANGING_KNIGHT, ["f3e5", "d6e5"]).unwrap();

        let drafts = extract_mistakes(&game, PlayerColor::White, &mut oracle);
        assert_eq!(drafts.len(), 1);
        let draft = &drafts[0];
        assert_eq!(draft.cpl, 300);
        assert_eq!(draft.move_number, 30);
        assert_eq!(draft.color, PlayerColor::White);
        assert_eq!(draft.move_played, "f3e5");
        assert_eq!(draft.best_move, "e1e2");
        assert_eq!(draft.features.mistake_type, MistakeType::Blunder);
        assert_eq!(draft.features.mistake_category, MistakeCategory::HangingPiece);
        assert_eq!(draft.features.game_phase, GamePhase::Endgame);
        assert_eq!(draft.features.piece_moved, PieceKind::Knight);
        assert_eq!(draft.features.move_type, MoveType::Quiet);
        assert_eq!(draft.features.king_self_safety, KingSafety::Safe);
        assert!(!draft.features.piece_was_attacked);

        // the black reply is never evaluated for a white subject
        assert_eq!(oracle.calls, [(start.fen(), 2), (after.fen(), 1)]);
    }

    #[test]
    fn test_move_in_candidate_lines() {
        let start = Position::from_fen(HANGING_KNIGHT).unwrap();
        let mut oracle = ScriptedOracle::default().with(&start, &[("e1e2", 50), ("f3e5", -260)]);
        let game = ParsedGame::from_uci_moves(HANGING_KNIGHT, ["f3e5"]).unwrap();

        let drafts = extract_mistakes(&game, PlayerColor::White, &mut oracle);
        assert_eq!(drafts[0].cpl, 310);
        // gap 310 > 150 takes precedence over the hanging knight
        assert_eq!(drafts[0].features.mistake_category, MistakeCategory::MissedTactic);
        assert_eq!(oracle.calls.len(), 1);
    }

    #[test]
    fn test_small_loss_is_not_recorded() {
        let start = Position::from_fen(HANGING_KNIGHT).unwrap();
        let mut oracle = ScriptedOracle::default().with(&start, &[("e1e2", 50), ("f3g5", 1)]);
        let game = ParsedGame::from_uci_moves(HANGING_KNIGHT, ["f3g5"]).unwrap();
        assert!(extract_mistakes(&game, PlayerColor::White, &mut oracle).is_empty());
    }

    #[test]
    fn test_missing_evaluation_skips_ply() {
        let game = ParsedGame::from_uci_moves(HANGING_KNIGHT, ["f3e5", "d6e5", "e1e2"]).unwrap();
        let mut oracle = ScriptedOracle::default();
        assert!(extract_mistakes(&game, PlayerColor::White, &mut oracle).is_empty());
        // both white plies were attempted
        assert_eq!(oracle.calls.len(), 2);
    }

    #[test]
    fn test_failed_reevaluation_skips_only_that_ply() {
        let start = Position::from_fen(HANGING_KNIGHT).unwrap();
        let after = start.play(mv_("f3e5"));
        let later = after.play(mv_("d6e5"));
        let mut oracle = ScriptedOracle::default()
            .with(&start, &[("e1e2", 50), ("f3g5", 40)])
            .failing_on(&after)
            .with(&later, &[("e1d2", 0), ("e1e2", -120)]);
        let game =
            ParsedGame::from_uci_moves(HANGING_KNIGHT, ["f3e5", "d6e5", "e1e2"]).unwrap();

        assert!(matches!(
            analyze_move(&start, mv_("f3e5"), &mut oracle),
            Err(OracleError::Io(_))
        ));

        let drafts = extract_mistakes(&game, PlayerColor::White, &mut oracle);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].move_played, "e1e2");
        assert_eq!(drafts[0].cpl, 120);
        assert_eq!(drafts[0].move_number, 31);
    }

    #[test]
    fn test_mating_move_needs_no_reevaluation() {
        // Ra1-a8 is mate; the oracle only lists a slower win
        let fen = "6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 35";
        let start = Position::from_fen(fen).unwrap();
        let mut oracle = ScriptedOracle::default().with(&start, &[("g1f2", 500)]);
        let game = ParsedGame::from_uci_moves(fen, ["a1a8"]).unwrap();
        assert!(extract_mistakes(&game, PlayerColor::White, &mut oracle).is_empty());
        assert_eq!(oracle.calls.len(), 1);
    }

    #[test]
    fn test_opponent_color() {
        let start = Position::from_fen(HANGING_KNIGHT).unwrap();
        let after = start.play(mv_("f3e5"));
        let mut oracle = ScriptedOracle::default().with(&after, &[("d6e5", 250), ("e8e7", 0)]);
        let game = ParsedGame::from_uci_moves(HANGING_KNIGHT, ["f3e5", "e8e7"]).unwrap();
        let drafts = extract_mistakes(&game, PlayerColor::Black, &mut oracle);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].color, PlayerColor::Black);
        assert_eq!(drafts[0].cpl, 250);
        assert_eq!(drafts[0].features.mistake_category, MistakeCategory::MissedTactic);
        assert_eq!(drafts[0].move_number, 30);
    }
}
