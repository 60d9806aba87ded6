//! Shared primitive types used across the entire pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A stable, unique customer identifier, opaque to the engine.
pub type CustomerId = String;

/// The canonical run identifier.
pub type RunId = String;

/// Number of ordinal bins every dimension is scored into.
pub const SCORE_BINS: u8 = 5;

/// An ordinal RFM score in `1..=5`.
///
/// Constructed only through [`Score::new`], so any `Score` in hand is
/// already inside the grid the segment table covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Score(u8);

impl Score {
    pub const MIN: Score = Score(1);
    pub const MAX: Score = Score(SCORE_BINS);

    pub fn new(value: u8) -> Option<Self> {
        (1..=SCORE_BINS).contains(&value).then_some(Score(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// 0-based bin index (score 1 → 0).
    pub fn index(self) -> usize {
        (self.0 - 1) as usize
    }

    /// Score for a 0-based ascending bin. Bins past the top clamp to 5.
    pub(crate) fn ascending(bin: usize) -> Self {
        Score((bin.min(SCORE_BINS as usize - 1) + 1) as u8)
    }

    /// Score for a 0-based ascending bin, labeled in reverse (bin 0 → 5).
    pub(crate) fn descending(bin: usize) -> Self {
        Score(SCORE_BINS - bin.min(SCORE_BINS as usize - 1) as u8)
    }
}

impl TryFrom<u8> for Score {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Score::new(value).ok_or_else(|| format!("score {value} outside 1..={SCORE_BINS}"))
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> u8 {
        score.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The three RFM dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Recency,
    Frequency,
    Monetary,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::Recency, Dimension::Frequency, Dimension::Monetary];

    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Recency   => "recency",
            Dimension::Frequency => "frequency",
            Dimension::Monetary  => "monetary",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_rejects_out_of_range() {
        assert!(Score::new(0).is_none());
        assert!(Score::new(6).is_none());
        assert_eq!(Score::new(3).map(Score::get), Some(3));
    }

    #[test]
    fn descending_labels_bin_zero_highest() {
        assert_eq!(Score::descending(0), Score::MAX);
        assert_eq!(Score::descending(4), Score::MIN);
        assert_eq!(Score::ascending(0), Score::MIN);
        assert_eq!(Score::ascending(4), Score::MAX);
    }

    #[test]
    fn score_deserialize_validates_range() {
        let ok: Score = serde_json::from_str("4").unwrap();
        assert_eq!(ok.get(), 4);
        assert!(serde_json::from_str::<Score>("9").is_err());
    }
}
