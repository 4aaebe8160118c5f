//! Evaluation oracle backed by an external UCI engine process.
//!
//! The engine is spawned explicitly with [`UciEngine::spawn`] and shut down
//! with [`UciEngine::quit`] (or on drop). Each evaluation sets `MultiPV`,
//! sends the position as FEN, searches for a fixed time, and keeps the last
//! reported line of every rank until `bestmove` arrives.
//!
//! ```no_run
//! use blunderscope_engine::Position;
//! use blunderscope_evaluator::{
//!     oracle::EvaluationOracle,
//!     uci::{UciEngine, UciEngineConfig},
//! };
//!
//! let mut engine = UciEngine::spawn(UciEngineConfig::default())?;
//! let lines = engine.evaluate(&Position::initial(), 2)?;
//! println!("best line: {:?}", lines.first());
//! engine.quit()?;
//! # Ok::<(), blunderscope_evaluator::oracle::OracleError>(())
//! ```

use std::{
    io::{BufRead, BufReader, Write},
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
    str::FromStr as _,
};

use blunderscope_engine::Position;
use chess::ChessMove;
use serde::{Deserialize, Serialize};

use crate::oracle::{EvaluationOracle, OracleError, Score, Variation};

/// How to launch and drive the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UciEngineConfig {
    /// Executable name or path.
    pub program: String,
    /// Search time per evaluation.
    pub movetime_ms: u64,
    pub threads: Option<u32>,
    pub hash_mb: Option<u32>,
}

impl Default for UciEngineConfig {
    fn default() -> Self {
        Self {
            program: "stockfish".to_owned(),
            movetime_ms: 100,
            threads: None,
            hash_mb: None,
        }
    }
}

/// A running UCI engine.
#[derive(Debug)]
pub struct UciEngine {
    config: UciEngineConfig,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    closed: bool,
}

impl UciEngine {
    /// Starts the engine and completes the UCI handshake.
    pub fn spawn(config: UciEngineConfig) -> Result<Self, OracleError> {
        let mut child = Command::new(&config.program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| OracleError::Spawn {
                program: config.program.clone(),
                source,
            })?;
        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            return Err(OracleError::NotRunning);
        };

        let mut engine = Self {
            config,
            child,
            stdin,
            stdout: BufReader::new(stdout),
            closed: false,
        };
        engine.send("uci")?;
        engine.wait_for("uciok")?;
        if let Some(threads) = engine.config.threads {
            engine.send(&format!("setoption name Threads value {threads}"))?;
        }
        if let Some(hash) = engine.config.hash_mb {
            engine.send(&format!("setoption name Hash value {hash}"))?;
        }
        engine.send("isready")?;
        engine.wait_for("readyok")?;
        tracing::debug!(program = %engine.config.program, "engine ready");
        Ok(engine)
    }

    /// Sends `quit` and waits for the process to exit.
    pub fn quit(mut self) -> Result<(), OracleError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), OracleError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let sent = self.send("quit");
        if sent.is_err() {
            let _ = self.child.kill();
        }
        self.child.wait()?;
        sent
    }

    fn send(&mut self, command: &str) -> Result<(), OracleError> {
        tracing::trace!(command, "uci >");
        writeln!(self.stdin, "{command}")?;
        self.stdin.flush()?;
        Ok(())
    }

    fn read_line(&mut self, expected: &'static str) -> Result<String, OracleError> {
        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Err(OracleError::UnexpectedEof { expected });
        }
        Ok(line.trim_end().to_owned())
    }

    fn wait_for(&mut self, token: &'static str) -> Result<(), OracleError> {
        loop {
            let line = self.read_line(token)?;
            if line.split_whitespace().next() == Some(token) {
                return Ok(());
            }
        }
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            tracing::warn!(%err, "engine did not shut down cleanly");
        }
    }
}

impl EvaluationOracle for UciEngine {
    fn evaluate(
        &mut self,
        position: &Position,
        variations: usize,
    ) -> Result<Vec<Variation>, OracleError> {
        if self.closed {
            return Err(OracleError::NotRunning);
        }
        let k = variations.max(1);
        self.send(&format!("setoption name MultiPV value {k}"))?;
        self.send(&format!("position fen {}", position.fen()))?;
        self.send(&format!("go movetime {}", self.config.movetime_ms))?;

        let mut lines = vec![None; k];
        loop {
            let line = self.read_line("bestmove")?;
            if line.starts_with("bestmove") {
                break;
            }
            let Some(info) = parse_info_line(&line) else {
                continue;
            };
            let Some(slot) = info.multipv.checked_sub(1).and_then(|i| lines.get_mut(i)) else {
                continue;
            };
            match ChessMove::from_str(&info.first_move) {
                Ok(mv) if position.is_legal(mv) => *slot = Some(Variation::new(mv, info.score)),
                _ => tracing::trace!(line = %line, "ignoring line with unusable move"),
            }
        }
        Ok(lines.into_iter().flatten().collect())
    }
}

/// The parts of a UCI `info` line needed to rank a variation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoLine {
    /// 1-based rank; 1 when the engine omits it.
    pub multipv: usize,
    pub score: Score,
    /// First move of the principal variation, in UCI notation.
    pub first_move: String,
}

/// Parses an `info` line carrying a score and a principal variation.
///
/// Returns `None` for any other output (`info string`, `info depth` without
/// `pv`, `bestmove`, malformed numbers, ...).
///
/// ```
/// use blunderscope_evaluator::{oracle::Score, uci::parse_info_line};
///
/// let info = parse_info_line(
///     "info depth 18 seldepth 24 multipv 2 score cp -35 nodes 120 pv e7e5 g1f3",
/// )
/// .unwrap();
/// assert_eq!(info.multipv, 2);
/// assert_eq!(info.score, Score::Centipawns(-35));
/// assert_eq!(info.first_move, "e7e5");
/// ```
#[must_use]
pub fn parse_info_line(line: &str) -> Option<InfoLine> {
    let mut tokens = line.split_whitespace();
    if tokens.next()? != "info" {
        return None;
    }

    let mut multipv = 1;
    let mut score = None;
    let mut first_move = None;
    while let Some(token) = tokens.next() {
        match token {
            "multipv" => multipv = tokens.next()?.parse().ok()?,
            "score" => {
                let kind = tokens.next()?;
                let value = tokens.next()?.parse().ok()?;
                score = match kind {
                    "cp" => Some(Score::Centipawns(value)),
                    "mate" => Some(Score::Mate(value)),
                    _ => return None,
                };
            }
            "pv" => {
                first_move = Some(tokens.next()?.to_owned());
                break;
            }
            // free text until end of line
            "string" => return None,
            _ => {}
        }
    }

    Some(InfoLine {
        multipv,
        score: score?,
        first_move: first_move?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mate_line() {
        let info = parse_info_line("info depth 30 score mate -3 pv h7h8 g1h1").unwrap();
        assert_eq!(info.multipv, 1);
        assert_eq!(info.score, Score::Mate(-3));
        assert_eq!(info.score.to_centipawns(), -9_997);
    }

    #[test]
    fn test_parse_bounds_and_extra_fields() {
        let info = parse_info_line(
            "info depth 12 multipv 1 score cp 24 lowerbound nodes 5000 nps 1000 hashfull 3 tbhits 0 time 5 pv d2d4",
        )
        .unwrap();
        assert_eq!(info.score, Score::Centipawns(24));
        assert_eq!(info.first_move, "d2d4");
    }

    #[test]
    fn test_parse_rejects_other_output() {
        assert_eq!(parse_info_line("bestmove e2e4 ponder e7e5"), None);
        assert_eq!(parse_info_line("info depth 5 currmove e2e4 currmovenumber 1"), None);
        assert_eq!(parse_info_line("info string NNUE evaluation enabled"), None);
        assert_eq!(parse_info_line("info depth 3 score cp 20"), None);
        assert_eq!(parse_info_line("info multipv x score cp 20 pv e2e4"), None);
        assert_eq!(parse_info_line(""), None);
    }

    #[test]
    fn test_config_defaults_from_partial_json() {
        let config: UciEngineConfig = serde_json::from_str(r#"{"movetime_ms": 250}"#).unwrap();
        assert_eq!(config.program, "stockfish");
        assert_eq!(config.movetime_ms, 250);
        assert_eq!(config.threads, None);
    }

    #[test]
    fn test_spawn_missing_program() {
        let config = UciEngineConfig {
            program: "blunderscope-no-such-engine".to_owned(),
            ..UciEngineConfig::default()
        };
        assert!(matches!(
            UciEngine::spawn(config),
            Err(OracleError::Spawn { .. })
        ));
    }
}
