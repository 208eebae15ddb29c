//! Race timing values (minutes / seconds / hundredths)

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Accepts "1'02.34", "1:02.34", "1 02 34", "62.34" and a few sloppy
/// variants seen in source documents.
static TIMING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*(?:(\d{1,2})\s*[':.\s])?\s*(\d{1,2})\s*[".,\s]\s*(\d{1,2})\s*$"#)
        .unwrap()
});

/// An elapsed race time, either cumulative from the start or the delta
/// for a single leg/lap.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Timing {
    pub minutes: u32,
    pub seconds: u32,
    pub hundredths: u32,
}

impl Timing {
    /// Create a timing from explicit components
    pub fn new(minutes: u32, seconds: u32, hundredths: u32) -> Self {
        Timing {
            minutes,
            seconds,
            hundredths,
        }
        .normalized()
    }

    /// Build from a total number of hundredths of a second
    pub fn from_hundredths(total: u32) -> Self {
        Timing {
            minutes: total / 6000,
            seconds: (total % 6000) / 100,
            hundredths: total % 100,
        }
    }

    /// Total hundredths of a second
    pub fn to_hundredths(self) -> u32 {
        self.minutes * 6000 + self.seconds * 100 + self.hundredths
    }

    /// Check whether this is a zero timing (missing or placeholder)
    pub fn is_zero(self) -> bool {
        self.to_hundredths() == 0
    }

    /// Carry overflowing seconds/hundredths into the higher unit
    fn normalized(self) -> Self {
        Self::from_hundredths(self.to_hundredths())
    }

    /// Parse a timing string, defaulting to zero on malformed input.
    ///
    /// A malformed timing is a recoverable condition: the row is still
    /// staged, only its timing degrades to zero (and gets logged).
    pub fn parse(text: &str) -> Self {
        if text.trim().is_empty() {
            return Timing::default();
        }
        match TIMING_RE.captures(text) {
            Some(caps) => {
                let minutes = caps
                    .get(1)
                    .and_then(|m| m.as_str().parse().ok())
                    .unwrap_or(0);
                let seconds = caps[2].parse().unwrap_or(0);
                let hundredths = caps[3].parse().unwrap_or(0);
                Timing::new(minutes, seconds, hundredths)
            }
            None => {
                log::warn!("malformed timing '{}', defaulting to zero", text);
                Timing::default()
            }
        }
    }

    /// Parse an optional timing field; `None` and blank both yield `None`
    pub fn parse_opt(text: Option<&str>) -> Option<Self> {
        let text = text?;
        if text.trim().is_empty() {
            return None;
        }
        Some(Self::parse(text))
    }

    /// Checked subtraction; `None` when `other` is larger than `self`
    pub fn checked_sub(self, other: Timing) -> Option<Timing> {
        self.to_hundredths()
            .checked_sub(other.to_hundredths())
            .map(Timing::from_hundredths)
    }

    /// Saturating addition of two timings
    pub fn add(self, other: Timing) -> Timing {
        Timing::from_hundredths(self.to_hundredths().saturating_add(other.to_hundredths()))
    }
}

impl std::fmt::Display for Timing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}'{:02}.{:02}", self.minutes, self.seconds, self.hundredths)
    }
}
