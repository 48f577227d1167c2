//! Style labels and guess matching

use serde::{Deserialize, Serialize};
use std::fmt;

/// A dance-style label as it appears in the catalog
///
/// A label may carry several acceptable names separated by commas, e.g.
/// `"cha-cha, cha cha, chacha"`. The first entry is the name revealed to
/// players.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleLabel(String);

impl StyleLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Acceptable names, trimmed, blanks dropped
    pub fn synonyms(&self) -> impl Iterator<Item = &str> {
        self.0.split(',').map(str::trim).filter(|s| !s.is_empty())
    }

    /// Name shown when the answer is revealed
    pub fn primary(&self) -> &str {
        self.synonyms().next().unwrap_or_else(|| self.0.trim())
    }

    /// True iff `guess` equals one of the synonyms, ignoring case and
    /// surrounding whitespace
    pub fn accepts(&self, guess: &str) -> bool {
        let guess = normalize(guess);
        if guess.is_empty() {
            return false;
        }
        self.synonyms().any(|s| normalize(s) == guess)
    }
}

impl fmt::Display for StyleLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StyleLabel {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StyleLabel {
    fn from(s: String) -> Self {
        Self(s)
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}
