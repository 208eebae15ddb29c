//! Category and gender inference fallbacks

use crate::import::config::{CategoryRange, SeasonConfig};

/// Mixed-gender code used when resolved relay legs disagree
pub const GENDER_MIXED: &str = "X";

/// Infer a swimmer's category from year of birth and the season's
/// reference date: first non-relay, non-undivided range containing
/// `reference_year - year_of_birth`.
pub fn category_for_year(season: &SeasonConfig, year_of_birth: i64) -> Option<&CategoryRange> {
    let age = season.reference_year().checked_sub(year_of_birth)?;
    let age = u32::try_from(age).ok()?;
    season.category_for_age(age)
}

/// Infer a relay line's gender from the already-resolved legs.
///
/// Unanimous genders win; disagreement means a mixed relay; no resolved
/// leg at all defers the decision (the caller skips the line rather
/// than guessing).
pub fn infer_relay_gender<'a>(resolved: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut genders: Vec<&str> = resolved
        .into_iter()
        .filter(|g| !g.trim().is_empty())
        .collect();
    genders.dedup();
    match genders.as_slice() {
        [] => None,
        [only] => Some((*only).to_string()),
        _ => {
            if genders.iter().all(|g| *g == genders[0]) {
                Some(genders[0].to_string())
            } else {
                Some(GENDER_MIXED.to_string())
            }
        }
    }
}
