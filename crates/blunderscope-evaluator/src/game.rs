//! Parsed games: headers, starting position and the moves played.

use std::{collections::BTreeMap, io, str::FromStr as _};

use blunderscope_engine::{InvalidFenError, Position};
use chess::{ChessMove, Color};
use chrono::{DateTime, NaiveDateTime, Utc};
use pgn_reader::{BufferedReader, RawHeader, SanPlus, Skip, Visitor};
use serde::{Deserialize, Serialize};

const DEFAULT_DATE: &str = "1970.01.01";
const DEFAULT_TIME: &str = "00:00:00";
const DATE_TIME_FORMAT: &str = "%Y.%m.%d %H:%M:%S";

/// Color a player had in a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "lowercase")]
pub enum PlayerColor {
    #[display("white")]
    White,
    #[display("black")]
    Black,
}

impl From<Color> for PlayerColor {
    fn from(color: Color) -> Self {
        match color {
            Color::White => Self::White,
            Color::Black => Self::Black,
        }
    }
}

impl From<PlayerColor> for Color {
    fn from(color: PlayerColor) -> Self {
        match color {
            PlayerColor::White => Self::White,
            PlayerColor::Black => Self::Black,
        }
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum GameParseError {
    #[display("failed to read PGN input")]
    #[from]
    Io(io::Error),
    #[display("PGN input contains no game")]
    Empty,
    #[display("invalid starting position")]
    #[from]
    InvalidStart(InvalidFenError),
    #[display("illegal or unreadable move `{notation}` at ply {ply}")]
    IllegalMove { ply: usize, notation: String },
    #[display("invalid game date `{value}`")]
    InvalidDate { value: String },
}

/// A game as a starting position plus the sequence of legal moves played.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedGame {
    headers: BTreeMap<String, String>,
    start: Position,
    moves: Vec<ChessMove>,
}

impl ParsedGame {
    /// Parses the first game of a PGN document.
    ///
    /// SAN moves are resolved against the running position, side variations
    /// are skipped, and a `FEN` header, when present, sets the starting
    /// position.
    ///
    /// # Examples
    ///
    /// ```
    /// use blunderscope_evaluator::game::{ParsedGame, PlayerColor};
    ///
    /// let pgn = r#"[White "alice"]
    /// [Black "Bob"]
    /// [UTCDate "2024.03.05"]
    /// [UTCTime "18:30:00"]
    ///
    /// 1. e4 e5 2. Nf3 (2. f4 exf4) Nc6 3. Bb5 a6 1-0
    /// "#;
    /// let game = ParsedGame::from_pgn(pgn).unwrap();
    /// assert_eq!(game.moves().len(), 6);
    /// assert_eq!(game.player_color("bob"), Some(PlayerColor::Black));
    /// assert_eq!(game.played_at().unwrap().to_rfc3339(), "2024-03-05T18:30:00+00:00");
    /// ```
    pub fn from_pgn(pgn: &str) -> Result<Self, GameParseError> {
        let mut reader = BufferedReader::new_cursor(pgn.as_bytes());
        let mut collector = PgnCollector::default();
        let raw = reader
            .read_game(&mut collector)?
            .ok_or(GameParseError::Empty)?;

        let start = match raw.headers.get("FEN") {
            Some(fen) => Position::from_fen(fen)?,
            None => Position::initial(),
        };

        let mut position = start;
        let mut moves = Vec::with_capacity(raw.sans.len());
        for (ply, san) in raw.sans.iter().enumerate() {
            let mv = ChessMove::from_san(position.board(), san)
                .ok()
                .filter(|&mv| position.is_legal(mv))
                .ok_or_else(|| GameParseError::IllegalMove {
                    ply,
                    notation: san.clone(),
                })?;
            position = position.play(mv);
            moves.push(mv);
        }

        Ok(Self {
            headers: raw.headers,
            start,
            moves,
        })
    }

    /// Builds a game from a starting FEN and moves in UCI notation.
    pub fn from_uci_moves<I, S>(start_fen: &str, moves: I) -> Result<Self, GameParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let start = Position::from_fen(start_fen)?;
        let mut position = start;
        let mut parsed = vec![];
        for (ply, notation) in moves.into_iter().enumerate() {
            let notation = notation.as_ref();
            let mv = ChessMove::from_str(notation)
                .ok()
                .filter(|&mv| position.is_legal(mv))
                .ok_or_else(|| GameParseError::IllegalMove {
                    ply,
                    notation: notation.to_owned(),
                })?;
            position = position.play(mv);
            parsed.push(mv);
        }
        Ok(Self {
            headers: BTreeMap::new(),
            start,
            moves: parsed,
        })
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_owned(), value.to_owned());
        self
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn start(&self) -> &Position {
        &self.start
    }

    #[must_use]
    pub fn moves(&self) -> &[ChessMove] {
        &self.moves
    }

    /// Every position before each move, paired with that move.
    pub fn plies(&self) -> impl Iterator<Item = (Position, ChessMove)> + '_ {
        self.moves.iter().scan(self.start, |position, &mv| {
            let before = *position;
            *position = position.play(mv);
            Some((before, mv))
        })
    }

    /// The color `username` played, matched case-insensitively against the
    /// `White` and `Black` headers.
    #[must_use]
    pub fn player_color(&self, username: &str) -> Option<PlayerColor> {
        let plays = |header| {
            self.header(header)
                .is_some_and(|name| name.eq_ignore_ascii_case(username))
        };
        if plays("White") {
            Some(PlayerColor::White)
        } else if plays("Black") {
            Some(PlayerColor::Black)
        } else {
            None
        }
    }

    /// Start time from the `UTCDate`/`UTCTime` headers, defaulting to the Unix epoch.
    pub fn played_at(&self) -> Result<DateTime<Utc>, GameParseError> {
        let date = self.header("UTCDate").unwrap_or(DEFAULT_DATE);
        let time = self.header("UTCTime").unwrap_or(DEFAULT_TIME);
        let value = format!("{date} {time}");
        NaiveDateTime::parse_from_str(&value, DATE_TIME_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(|_| GameParseError::InvalidDate { value })
    }
}

#[derive(Debug, Default)]
struct RawGame {
    headers: BTreeMap<String, String>,
    sans: Vec<String>,
}

#[derive(Debug, Default)]
struct PgnCollector {
    game: RawGame,
}

impl Visitor for PgnCollector {
    type Result = RawGame;

    fn begin_game(&mut self) {
        self.game = RawGame::default();
    }

    fn header(&mut self, key: &[u8], value: RawHeader<'_>) {
        self.game.headers.insert(
            String::from_utf8_lossy(key).into_owned(),
            value.decode_utf8_lossy().into_owned(),
        );
    }

    fn san(&mut self, san_plus: SanPlus) {
        self.game.sans.push(san_plus.san.to_string());
    }

    fn begin_variation(&mut self) -> Skip {
        Skip(true)
    }

    fn end_game(&mut self) -> Self::Result {
        std::mem::take(&mut self.game)
    }
}
