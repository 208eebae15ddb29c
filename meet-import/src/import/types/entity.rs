//! Catalog of the staged entity types and their persistence traits

use serde::{Deserialize, Serialize};

/// Columns never written by a diff: identity, optimistic-lock counter
/// and row timestamps.
const PROTECTED: &[&str] = &["id", "lock_version", "created_at", "updated_at"];

/// Calendar rows keep `updated_at` writable so the freshness marker of
/// the schedule advances on every import that touches the meeting.
const PROTECTED_CALENDAR: &[&str] = &["id", "lock_version", "created_at"];

/// One of the entity types the engine stages and commits
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum EntityType {
    Meeting,
    Calendar,
    City,
    Pool,
    Session,
    Team,
    TeamAffiliation,
    Swimmer,
    Badge,
    Event,
    Program,
    IndividualResult,
    Lap,
    RelayResult,
    RelaySwimmer,
    RelayLap,
    TeamScore,
}

impl EntityType {
    /// Fixed commit phase order.
    ///
    /// Each phase fully resolves one entity type before the next begins,
    /// because later phases bind to earlier ones by key.
    pub const COMMIT_PHASES: [EntityType; 17] = [
        EntityType::Meeting,
        EntityType::Calendar,
        EntityType::City,
        EntityType::Pool,
        EntityType::Session,
        EntityType::Team,
        EntityType::TeamAffiliation,
        EntityType::Swimmer,
        EntityType::Badge,
        EntityType::Event,
        EntityType::Program,
        EntityType::IndividualResult,
        EntityType::Lap,
        EntityType::RelayResult,
        EntityType::RelaySwimmer,
        EntityType::RelayLap,
        EntityType::TeamScore,
    ];

    /// Destination table name in the replay dialect
    pub fn table_name(self) -> &'static str {
        match self {
            EntityType::Meeting => "meetings",
            EntityType::Calendar => "calendars",
            EntityType::City => "cities",
            EntityType::Pool => "swimming_pools",
            EntityType::Session => "meeting_sessions",
            EntityType::Team => "teams",
            EntityType::TeamAffiliation => "team_affiliations",
            EntityType::Swimmer => "swimmers",
            EntityType::Badge => "badges",
            EntityType::Event => "meeting_events",
            EntityType::Program => "meeting_programs",
            EntityType::IndividualResult => "meeting_individual_results",
            EntityType::Lap => "laps",
            EntityType::RelayResult => "meeting_relay_results",
            EntityType::RelaySwimmer => "meeting_relay_swimmers",
            EntityType::RelayLap => "relay_laps",
            EntityType::TeamScore => "meeting_team_scores",
        }
    }

    /// Columns excluded from diffs and replay payloads
    pub fn protected_columns(self) -> &'static [&'static str] {
        match self {
            EntityType::Calendar => PROTECTED_CALENDAR,
            _ => PROTECTED,
        }
    }

    /// Check whether a column is protected for this entity type
    pub fn is_protected(self, column: &str) -> bool {
        self.protected_columns().contains(&column)
    }

    /// Entity types addressed by ordinal position rather than composite key
    pub fn is_ordinal(self) -> bool {
        matches!(self, EntityType::Session)
    }

    /// Entity types forced through the update path even on an empty diff
    pub fn forces_update(self) -> bool {
        matches!(self, EntityType::Calendar)
    }

    /// Columns that must be present and non-blank for an insert to validate
    pub fn required_columns(self) -> &'static [&'static str] {
        match self {
            EntityType::Meeting => &["description", "code"],
            EntityType::Calendar => &["meeting_code"],
            EntityType::City => &["name"],
            EntityType::Pool => &["name"],
            EntityType::Session => &["session_order"],
            EntityType::Team => &["name"],
            EntityType::TeamAffiliation => &["name", "season_id"],
            EntityType::Swimmer => &["complete_name", "last_name"],
            EntityType::Badge => &["season_id"],
            EntityType::Event => &["event_code"],
            EntityType::Program => &["category_code", "gender_code"],
            EntityType::IndividualResult => &[],
            EntityType::Lap => &["distance"],
            EntityType::RelayResult => &[],
            EntityType::RelaySwimmer => &["relay_order"],
            EntityType::RelayLap => &["distance"],
            EntityType::TeamScore => &[],
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            EntityType::Meeting => "meeting",
            EntityType::Calendar => "calendar",
            EntityType::City => "city",
            EntityType::Pool => "pool",
            EntityType::Session => "session",
            EntityType::Team => "team",
            EntityType::TeamAffiliation => "team_affiliation",
            EntityType::Swimmer => "swimmer",
            EntityType::Badge => "badge",
            EntityType::Event => "event",
            EntityType::Program => "program",
            EntityType::IndividualResult => "individual_result",
            EntityType::Lap => "lap",
            EntityType::RelayResult => "relay_result",
            EntityType::RelaySwimmer => "relay_swimmer",
            EntityType::RelayLap => "relay_lap",
            EntityType::TeamScore => "team_score",
        };
        write!(f, "{}", label)
    }
}
