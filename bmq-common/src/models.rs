//! Score models shared by the store, the round engine and the HTTP layer

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest display name accepted for a leaderboard entry (in characters)
pub const MAX_NAME_LEN: usize = 64;

/// Life budget for a game
///
/// On the wire and in the database this is an integer where `-1` means
/// unlimited. `Limited(0)` only ever appears as the running count of an
/// exhausted game; it is rejected as a starting value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Lives {
    Unlimited,
    Limited(u32),
}

impl Lives {
    /// Raw value used for unlimited lives
    pub const UNLIMITED: i64 = -1;

    /// Parse a starting life budget
    pub fn from_raw(raw: i64) -> Result<Self> {
        match raw {
            Self::UNLIMITED => Ok(Lives::Unlimited),
            n if n >= 1 && n <= i64::from(u32::MAX) => Ok(Lives::Limited(n as u32)),
            n => Err(Error::InvalidInput(format!(
                "lives must be -1 (unlimited) or a positive integer, got {}",
                n
            ))),
        }
    }

    pub fn as_raw(self) -> i64 {
        match self {
            Lives::Unlimited => Self::UNLIMITED,
            Lives::Limited(n) => i64::from(n),
        }
    }

    /// Remove one life. No-op for unlimited budgets.
    pub fn lose_one(&mut self) {
        if let Lives::Limited(n) = self {
            *n = n.saturating_sub(1);
        }
    }

    pub fn is_exhausted(self) -> bool {
        matches!(self, Lives::Limited(0))
    }

    pub fn is_unlimited(self) -> bool {
        matches!(self, Lives::Unlimited)
    }
}

impl TryFrom<i64> for Lives {
    type Error = Error;

    fn try_from(raw: i64) -> Result<Self> {
        Lives::from_raw(raw)
    }
}

impl From<Lives> for i64 {
    fn from(lives: Lives) -> i64 {
        lives.as_raw()
    }
}

impl fmt::Display for Lives {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lives::Unlimited => write!(f, "unlimited"),
            Lives::Limited(n) => write!(f, "{}", n),
        }
    }
}

/// Difficulty label derived from the clip duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
    Custom,
}

impl Difficulty {
    pub fn from_duration(duration_secs: u32) -> Self {
        match duration_secs {
            20 => Difficulty::Easy,
            10 => Difficulty::Normal,
            5 => Difficulty::Hard,
            _ => Difficulty::Custom,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Normal => "Normal",
            Difficulty::Hard => "Hard",
            Difficulty::Custom => "Custom",
        }
    }
}

/// A validated score waiting to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScore {
    /// Display name, already trimmed
    pub name: String,
    pub score: u32,
    /// Starting life budget of the game that produced this score
    pub lives: Lives,
    /// Clip duration in seconds
    pub duration: u32,
}

impl NewScore {
    /// Validate and normalize a score submission
    ///
    /// The name is trimmed; blank or over-long names are rejected.
    pub fn new(name: &str, score: i64, lives: i64, duration: i64) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("name must not be empty".to_string()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(Error::InvalidInput(format!(
                "name must be at most {} characters",
                MAX_NAME_LEN
            )));
        }
        let score = u32::try_from(score)
            .map_err(|_| Error::InvalidInput(format!("score must be a non-negative integer, got {}", score)))?;
        let lives = Lives::from_raw(lives)?;
        let duration = match u32::try_from(duration) {
            Ok(d) if d > 0 => d,
            _ => {
                return Err(Error::InvalidInput(format!(
                    "duration must be a positive number of seconds, got {}",
                    duration
                )))
            }
        };

        Ok(Self {
            name: name.to_string(),
            score,
            lives,
            duration,
        })
    }
}

/// A stored leaderboard row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreEntry {
    /// Insertion-ordered row id
    pub id: i64,
    pub name: String,
    pub score: u32,
    pub lives: Lives,
    pub duration: u32,
    pub created_at: DateTime<Utc>,
}

impl ScoreEntry {
    pub fn difficulty(&self) -> Difficulty {
        Difficulty::from_duration(self.duration)
    }
}

/// Optional leaderboard filters; `None` matches everything
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreFilter {
    pub lives: Option<Lives>,
    pub duration: Option<u32>,
}

impl ScoreFilter {
    pub fn matches(&self, entry: &ScoreEntry) -> bool {
        self.lives.map_or(true, |l| l == entry.lives)
            && self.duration.map_or(true, |d| d == entry.duration)
    }
}
