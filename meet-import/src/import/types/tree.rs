//! Input record tree produced by the upstream document parser.
//!
//! The tree arrives already parsed: scalar header fields for the meeting,
//! ordered session descriptors and ordered result sections. Section titles
//! are kept for audit but the event/category/gender codes they encode are
//! supplied pre-split by the parser.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Root of the parsed record tree for one meeting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordTree {
    /// Meeting description/title
    pub name: String,
    /// Meeting code, when the source supplies one
    #[serde(default)]
    pub code: Option<String>,
    /// Venue city name
    #[serde(default)]
    pub venue_city: Option<String>,
    /// Pool/venue name
    #[serde(default)]
    pub pool_name: Option<String>,
    /// Pool length in meters (25 or 50, typically)
    #[serde(default)]
    pub pool_length: Option<u32>,
    /// First day of the meeting
    #[serde(default)]
    pub date_begin: Option<NaiveDate>,
    /// Last day of the meeting
    #[serde(default)]
    pub date_end: Option<NaiveDate>,
    /// Ordered session descriptors
    #[serde(default)]
    pub sessions: Vec<SessionSpec>,
    /// Ordered result sections
    #[serde(default)]
    pub sections: Vec<SectionSpec>,
}

impl RecordTree {
    /// Parse a record tree from the upstream parser's JSON output
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        use anyhow::Context;
        serde_json::from_str(json).context("Failed to parse record tree JSON")
    }
}

/// One scheduled session of the meeting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSpec {
    /// 1-based session ordinal
    pub order: u32,
    /// Scheduled day
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Scheduled start time ("08:30")
    #[serde(default)]
    pub scheduled_time: Option<String>,
    /// Free-form session description
    #[serde(default)]
    pub description: Option<String>,
}

/// One section of results: a single event/category/gender block,
/// or a meeting-wide team ranking when `ranking` is set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionSpec {
    /// Raw section title, kept for audit
    #[serde(default)]
    pub title: String,
    /// Event type code ("100SL", "4X50MI", ...)
    #[serde(default)]
    pub event_code: String,
    /// Category code as printed in the source; may be empty or unmappable
    #[serde(default)]
    pub category_code: String,
    /// Gender code ("M", "F", "X"); may be empty for relay sections
    #[serde(default)]
    pub gender_code: String,
    /// Session ordinal this section belongs to
    #[serde(default = "default_session_order")]
    pub session_order: u32,
    /// True for overall team ranking/statistics sections
    #[serde(default)]
    pub ranking: bool,
    /// True when the section holds relay results
    #[serde(default)]
    pub relay: bool,
    /// Ordered result lines
    #[serde(default)]
    pub lines: Vec<ResultLine>,
}

fn default_session_order() -> u32 {
    1
}

impl Default for SectionSpec {
    fn default() -> Self {
        SectionSpec {
            title: String::new(),
            event_code: String::new(),
            category_code: String::new(),
            gender_code: String::new(),
            session_order: default_session_order(),
            ranking: false,
            relay: false,
            lines: Vec::new(),
        }
    }
}

/// One result line: a swimmer or a relay team, with nested splits
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultLine {
    /// Swimmer complete name, or relay/team name for relay and ranking lines
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub year_of_birth: Option<i64>,
    /// Gender code when the line records one
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub team_name: Option<String>,
    /// Final cumulative timing as printed ("1'02.34")
    #[serde(default)]
    pub timing: Option<String>,
    /// Rank within the section, when present
    #[serde(default)]
    pub rank: Option<u32>,
    /// Standard/championship points
    #[serde(default)]
    pub score: Option<f64>,
    /// Per-distance split fields
    #[serde(default)]
    pub laps: Vec<LapSpec>,
    /// Relay legs, one per swimmer (relay sections only)
    #[serde(default)]
    pub legs: Vec<RelayLegSpec>,
}

/// One split line: cumulative and/or delta timing at a given distance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LapSpec {
    /// Distance from start, in meters
    pub distance: u32,
    /// Cumulative ("from start") timing, when printed
    #[serde(default)]
    pub timing: Option<String>,
    /// Delta ("this lap only") timing, when printed
    #[serde(default)]
    pub delta: Option<String>,
}

/// One relay leg: the swimmer and the leg's own timings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayLegSpec {
    /// 1-based leg order inside the relay
    pub order: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub year_of_birth: Option<i64>,
    #[serde(default)]
    pub gender: Option<String>,
    /// Leg distance in meters (its sub-segments live in the line's laps)
    #[serde(default)]
    pub length: u32,
    /// Cumulative timing at the end of this leg
    #[serde(default)]
    pub timing: Option<String>,
    /// Delta timing for this leg alone
    #[serde(default)]
    pub delta: Option<String>,
}
