//! Fuzzy-match seam between the solver and the persisted store.
//!
//! The engine only consumes this contract; ranking quality is the
//! finder's business. [`FuzzyFinder`] is the default implementation,
//! scoring scoped store rows with a skim-style matcher.

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use crate::import::types::{EntityType, Row, Value};
use crate::storage::MeetStore;

/// Result of one fuzzy lookup: the best match (when good enough) plus
/// every scored candidate in rank order, kept for operator review.
#[derive(Debug, Clone, Default)]
pub struct FinderResult {
    pub best: Option<Row>,
    pub alternatives: Vec<Row>,
}

impl FinderResult {
    /// A lookup that found nothing
    pub fn none() -> Self {
        Self::default()
    }
}

/// Find-by-similarity capability over the persisted store
pub trait EntityFinder {
    /// Search `entity` rows within `scope` for the best match of `query`
    fn find(&self, entity: EntityType, scope: &[(&str, Value)], query: &str) -> FinderResult;
}

/// Attribute the finder scores a given entity type by
fn name_attribute(entity: EntityType) -> &'static str {
    match entity {
        EntityType::Meeting => "description",
        EntityType::Swimmer => "complete_name",
        _ => "name",
    }
}

/// Default finder: skim fuzzy scoring over scoped store rows
pub struct FuzzyFinder<'a> {
    store: &'a dyn MeetStore,
    matcher: SkimMatcherV2,
    /// Minimum score for a candidate to be adopted as `best`
    min_score: i64,
}

impl<'a> FuzzyFinder<'a> {
    pub fn new(store: &'a dyn MeetStore) -> Self {
        FuzzyFinder {
            store,
            matcher: SkimMatcherV2::default(),
            min_score: 60,
        }
    }

    pub fn with_min_score(mut self, min_score: i64) -> Self {
        self.min_score = min_score;
        self
    }
}

impl EntityFinder for FuzzyFinder<'_> {
    fn find(&self, entity: EntityType, scope: &[(&str, Value)], query: &str) -> FinderResult {
        let query = query.trim();
        if query.is_empty() {
            return FinderResult::none();
        }
        let attribute = name_attribute(entity);
        let mut scored: Vec<(i64, Row)> = self
            .store
            .find_all(entity, scope)
            .into_iter()
            .filter_map(|row| {
                let name = row.get(attribute).and_then(Value::as_str)?;
                let score = self.matcher.fuzzy_match(name, query)?;
                Some((score, row))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let best = scored
            .first()
            .filter(|(score, _)| *score >= self.min_score)
            .map(|(_, row)| row.clone());
        let alternatives = scored.into_iter().map(|(_, row)| row).collect();
        FinderResult { best, alternatives }
    }
}

/// Finder that never matches; used in tests exercising the
/// synthesize-new-candidate path.
pub struct NullFinder;

impl EntityFinder for NullFinder {
    fn find(&self, _entity: EntityType, _scope: &[(&str, Value)], _query: &str) -> FinderResult {
        FinderResult::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_best_match_ranked_first_with_alternatives() {
        let mut store = MemoryStore::new();
        store.seed(
            EntityType::Team,
            row(&[("name", "ASD NUOTO X".into()), ("season_id", Value::Int(192))]),
        );
        store.seed(
            EntityType::Team,
            row(&[("name", "CIRCOLO NUOTO Y".into()), ("season_id", Value::Int(192))]),
        );

        let finder = FuzzyFinder::new(&store);
        let result = finder.find(
            EntityType::Team,
            &[("season_id", Value::Int(192))],
            "ASD NUOTO X",
        );
        let best = result.best.expect("should match");
        assert_eq!(best.get("name"), Some(&Value::Str("ASD NUOTO X".into())));
        assert!(!result.alternatives.is_empty());
    }

    #[test]
    fn test_scope_filters_candidates() {
        let mut store = MemoryStore::new();
        store.seed(
            EntityType::Team,
            row(&[("name", "ASD NUOTO X".into()), ("season_id", Value::Int(191))]),
        );
        let finder = FuzzyFinder::new(&store);
        let result = finder.find(
            EntityType::Team,
            &[("season_id", Value::Int(192))],
            "ASD NUOTO X",
        );
        assert!(result.best.is_none());
        assert!(result.alternatives.is_empty());
    }
}
