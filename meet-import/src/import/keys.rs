//! Deterministic composite key derivation.
//!
//! Entities reference each other only through these keys until commit
//! assigns real identifiers. All derivations are pure and total; the one
//! degradation point is the swimmer key, which falls back to a wildcard
//! search pattern when a segment is still unknown.

/// Wildcard standing in for an unknown swimmer-key segment
const WILDCARD: &str = "%";

/// Uppercase, trim and squeeze internal whitespace
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// A derived swimmer key: complete, or a partial search pattern when
/// year/gender/team are not all known at resolution time.
///
/// Partial keys may be used to look up an already-cached complete key,
/// but must never be cached as if they were complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwimmerKey {
    Complete(String),
    Partial(String),
}

impl SwimmerKey {
    pub fn is_complete(&self) -> bool {
        matches!(self, SwimmerKey::Complete(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            SwimmerKey::Complete(s) | SwimmerKey::Partial(s) => s,
        }
    }

    /// Match a complete key against this key's wildcard pattern
    pub fn matches(&self, key: &str) -> bool {
        match self {
            SwimmerKey::Complete(s) => s == key,
            SwimmerKey::Partial(pattern) => pattern_matches(pattern, key),
        }
    }
}

/// Minimal `%`-wildcard matcher (each `%` spans any run of characters)
pub fn pattern_matches(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split(WILDCARD).collect();
    let mut rest = text;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == parts.len() - 1 && !pattern.ends_with(WILDCARD) {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(at) => rest = &rest[at + part.len()..],
                None => return false,
            }
        }
    }
    true
}

/// `"{name}-{year_of_birth}-{gender_code}-{team_name}"`, degrading to a
/// wildcard pattern for each missing segment
pub fn swimmer_key(
    name: &str,
    year_of_birth: Option<i64>,
    gender_code: Option<&str>,
    team_name: Option<&str>,
) -> SwimmerKey {
    let name = normalize(name);
    let year = year_of_birth.map(|y| y.to_string());
    let gender = gender_code
        .map(normalize)
        .filter(|g| !g.is_empty());
    let team = team_name.map(normalize).filter(|t| !t.is_empty());

    let complete = year.is_some() && gender.is_some() && team.is_some();
    let key = format!(
        "{}-{}-{}-{}",
        name,
        year.as_deref().unwrap_or(WILDCARD),
        gender.as_deref().unwrap_or(WILDCARD),
        team.as_deref().unwrap_or(WILDCARD),
    );
    if complete {
        SwimmerKey::Complete(key)
    } else {
        SwimmerKey::Partial(key)
    }
}

/// Normalized team name
pub fn team_key(name: &str) -> String {
    normalize(name)
}

/// `"{session_order}-{event_type_code}"`
pub fn event_key(session_order: u32, event_code: &str) -> String {
    format!("{}-{}", session_order, normalize(event_code))
}

/// `"{event_key}-{category_code}-{gender_code}"`
pub fn program_key(event_key: &str, category_code: &str, gender_code: &str) -> String {
    format!(
        "{}-{}-{}",
        event_key,
        normalize(category_code),
        normalize(gender_code)
    )
}

/// `"{program_key}/{swimmer_key}"`
pub fn individual_result_key(program_key: &str, swimmer_key: &str) -> String {
    format!("{}/{}", program_key, swimmer_key)
}

/// `"{program_key}/{team_key}"`
pub fn relay_result_key(program_key: &str, team_key: &str) -> String {
    format!("{}/{}", program_key, team_key)
}

/// `"{swimmer_key}@{team_key}"`
pub fn badge_key(swimmer_key: &str, team_key: &str) -> String {
    format!("{}@{}", swimmer_key, team_key)
}

/// `"{result_key}:{distance}"`
pub fn lap_key(result_key: &str, distance: u32) -> String {
    format!("{}:{}", result_key, distance)
}

/// `"{relay_key}#{order}"`
pub fn relay_swimmer_key(relay_key: &str, order: u32) -> String {
    format!("{}#{}", relay_key, order)
}

/// Zero-padded ordinal for position-indexed session slots
pub fn session_key(order: u32) -> String {
    format!("{:03}", order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swimmer_key_complete() {
        let key = swimmer_key("ROSSI MARIO", Some(1975), Some("M"), Some("ASD NUOTO X"));
        assert!(key.is_complete());
        assert_eq!(key.as_str(), "ROSSI MARIO-1975-M-ASD NUOTO X");
    }

    #[test]
    fn test_swimmer_key_partial_when_team_unknown() {
        let key = swimmer_key("ROSSI MARIO", Some(1975), Some("M"), None);
        assert!(!key.is_complete());
        assert_eq!(key.as_str(), "ROSSI MARIO-1975-M-%");
        assert!(key.matches("ROSSI MARIO-1975-M-ASD NUOTO X"));
        assert!(!key.matches("ROSSI MARIO-1976-M-ASD NUOTO X"));
    }

    #[test]
    fn test_swimmer_key_is_deterministic() {
        let a = swimmer_key(" rossi  mario ", Some(1975), Some("m"), Some("asd nuoto x"));
        let b = swimmer_key("ROSSI MARIO", Some(1975), Some("M"), Some("ASD NUOTO X"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_event_and_program_keys() {
        let ek = event_key(2, "100sl");
        assert_eq!(ek, "2-100SL");
        let pk = program_key(&ek, "M40", "F");
        assert_eq!(pk, "2-100SL-M40-F");
        assert_eq!(
            individual_result_key(&pk, "ROSSI MARIO-1975-M-ASD NUOTO X"),
            "2-100SL-M40-F/ROSSI MARIO-1975-M-ASD NUOTO X"
        );
    }

    #[test]
    fn test_session_key_orders_lexicographically() {
        assert!(session_key(2) < session_key(10));
    }
}
