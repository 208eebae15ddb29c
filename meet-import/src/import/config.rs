//! Season-scoped import configuration

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// One age bracket of the season's category table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRange {
    /// Category code as used in program keys ("M40", "U25", ...)
    pub code: String,
    pub age_begin: u32,
    pub age_end: u32,
    /// Relay-only categories are never selected for individual results
    #[serde(default)]
    pub relay: bool,
    /// Catch-all/undivided categories are never selected by inference
    #[serde(default)]
    pub undivided: bool,
}

impl CategoryRange {
    /// Check whether an age falls inside this bracket
    pub fn contains(&self, age: u32) -> bool {
        age >= self.age_begin && age <= self.age_end
    }
}

/// Import configuration for one season: identifier, the reference date
/// ages are computed against, and the ordered category table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonConfig {
    pub season_id: i64,
    /// Date the season's ages are computed against
    pub reference_date: NaiveDate,
    /// Category ranges, in selection order
    #[serde(default)]
    pub categories: Vec<CategoryRange>,
}

impl SeasonConfig {
    /// Load from a TOML string
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse season config TOML")
    }

    /// Load from a TOML file on disk
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read season config {}", path.display()))?;
        Self::from_toml_str(&text)
    }

    /// Year ages are computed against
    pub fn reference_year(&self) -> i64 {
        i64::from(self.reference_date.year())
    }

    /// Check whether a code names a known category of this season
    pub fn has_category(&self, code: &str) -> bool {
        self.categories.iter().any(|c| c.code == code)
    }

    /// First non-relay, non-undivided category containing the given age
    pub fn category_for_age(&self, age: u32) -> Option<&CategoryRange> {
        self.categories
            .iter()
            .find(|c| !c.relay && !c.undivided && c.contains(age))
    }
}
