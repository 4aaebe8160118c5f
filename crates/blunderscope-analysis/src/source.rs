//! Game source contract: where a subject's games come from.

use std::fmt;

use chrono::{Datelike as _, NaiveDate};
use serde::{Deserialize, Serialize};

/// A calendar month of games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArchivePeriod {
    pub year: i32,
    /// 1-based month.
    pub month: u32,
}

impl ArchivePeriod {
    /// Returns `None` for an invalid month.
    #[must_use]
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    /// The month containing `date`.
    #[must_use]
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for ArchivePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}/{:02}", self.year, self.month)
    }
}

/// One game as delivered by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceGame {
    /// Provider's identifier for the game.
    pub id: String,
    pub pgn: String,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum GameSourceError {
    #[display("no games archived for {username} in {period}")]
    NotFound {
        username: String,
        period: ArchivePeriod,
    },
    #[display("game source unavailable: {message}")]
    Unavailable { message: String },
}

/// Supplies a subject's games for a period.
pub trait GameSource: fmt::Debug {
    /// Provider name stored with each game.
    fn name(&self) -> &str;

    fn fetch_games(
        &self,
        username: &str,
        period: ArchivePeriod,
    ) -> Result<Vec<SourceGame>, GameSourceError>;
}
