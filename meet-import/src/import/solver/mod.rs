//! Resolver: turns a parsed record tree into a fully staged entity store.
//!
//! Pure with respect to the persisted store (read-only lookups only);
//! all staging happens in the in-memory [`EntityStore`], which the
//! committer later consumes. Resolution may be re-run freely before
//! committing.

pub mod inference;
pub mod names;
pub mod timing;

use anyhow::{Result, bail};

use super::config::SeasonConfig;
use super::keys::{self, SwimmerKey};
use super::store::EntityStore;
use super::types::{
    EntityType, LapSpec, RecordTree, ResultLine, Row, SectionSpec, SessionSpec, StagedEntity,
    Timing, Value,
};
use crate::services::matching::EntityFinder;
use crate::services::progress::{ProgressSink, ProgressUpdate, publish_best_effort};
use crate::storage::MeetStore;
use timing::LapSplit;

/// Topic the solver publishes progress on
const PROGRESS_TOPIC: &str = "import/solve";

/// Outcome summary of one resolution pass
#[derive(Debug, Default)]
pub struct SolveReport {
    pub sections: usize,
    pub lines_staged: usize,
    pub lines_skipped: usize,
    /// One message per skipped line or degraded value
    pub warnings: Vec<String>,
}

impl SolveReport {
    fn skip(&mut self, reason: String) {
        log::warn!("skipping line: {}", reason);
        self.lines_skipped += 1;
        self.warnings.push(reason);
    }
}

/// Per-entity-type find-or-prepare procedures over one record tree.
///
/// Lookup ladder for every type: staging cache by derived key, then an
/// exact persisted-store probe, then the fuzzy finder, then a freshly
/// synthesized candidate. Associations whose identifiers are still
/// unknown are recorded as bindings, never resolved eagerly.
pub struct Solver<'a> {
    store: &'a dyn MeetStore,
    finder: &'a dyn EntityFinder,
    progress: &'a dyn ProgressSink,
    season: &'a SeasonConfig,
    cache: EntityStore,
    report: SolveReport,
    meeting_key: Option<String>,
    pool_key: Option<String>,
}

impl<'a> Solver<'a> {
    pub fn new(
        store: &'a dyn MeetStore,
        finder: &'a dyn EntityFinder,
        progress: &'a dyn ProgressSink,
        season: &'a SeasonConfig,
    ) -> Self {
        Solver {
            store,
            finder,
            progress,
            season,
            cache: EntityStore::new(),
            report: SolveReport::default(),
            meeting_key: None,
            pool_key: None,
        }
    }

    /// Resolve the whole record tree into the staging cache
    pub fn solve(&mut self, tree: &RecordTree) -> Result<()> {
        let meeting_key = self.find_or_prepare_meeting(tree)?;
        self.meeting_key = Some(meeting_key.clone());
        self.find_or_prepare_calendar(tree, &meeting_key);

        if let Some(city) = tree.venue_city.as_deref().filter(|c| !c.trim().is_empty()) {
            self.find_or_prepare_city(city);
        }
        if let Some(pool) = tree.pool_name.as_deref().filter(|p| !p.trim().is_empty()) {
            let key = self.find_or_prepare_pool(pool, tree);
            self.pool_key = Some(key);
        }

        if tree.sessions.is_empty() {
            // Sections default to session 1; make sure the slot exists
            self.find_or_prepare_session(&SessionSpec {
                order: 1,
                date: tree.date_begin,
                ..SessionSpec::default()
            });
        }
        for session in &tree.sessions {
            self.find_or_prepare_session(session);
        }

        let total = tree.sections.len();
        for (index, section) in tree.sections.iter().enumerate() {
            let label = if section.title.is_empty() {
                &section.event_code
            } else {
                &section.title
            };
            publish_best_effort(
                self.progress,
                PROGRESS_TOPIC,
                &ProgressUpdate {
                    message: label,
                    current: index + 1,
                    total,
                },
            );
            self.solve_section(section);
            self.report.sections += 1;
        }
        log::debug!(
            "solve complete: {} entities staged, {} lines skipped",
            self.cache.total(),
            self.report.lines_skipped
        );
        Ok(())
    }

    /// The staging cache, for review or commit
    pub fn staging(&self) -> &EntityStore {
        &self.cache
    }

    /// Consume the solver, yielding the staging cache and the report
    pub fn finish(self) -> (EntityStore, SolveReport) {
        (self.cache, self.report)
    }

    // ---- root entities -------------------------------------------------

    fn find_or_prepare_meeting(&mut self, tree: &RecordTree) -> Result<String> {
        if tree.name.trim().is_empty() {
            bail!("record tree has no meeting name");
        }
        let code = tree
            .code
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| names::coded_name(&tree.name, 20));
        let key = code.clone();
        if self.cache.contains(EntityType::Meeting, &key) {
            return Ok(key);
        }

        let season = Value::Int(self.season.season_id);
        let staged = if let Some(row) = self.store.find_first(
            EntityType::Meeting,
            &[("code", code.as_str().into()), ("season_id", season.clone())],
        ) {
            StagedEntity::from_store(row)
        } else {
            let found =
                self.finder
                    .find(EntityType::Meeting, &[("season_id", season)], &tree.name);
            match found.best {
                Some(best) => StagedEntity::from_match(best, found.alternatives),
                None => {
                    let mut row = Row::new();
                    row.insert("description".into(), Value::Str(tree.name.trim().into()));
                    row.insert("code".into(), Value::Str(code.clone()));
                    row.insert("season_id".into(), Value::Int(self.season.season_id));
                    if let Some(date) = tree.date_begin {
                        row.insert("header_date".into(), Value::Str(date.to_string()));
                    }
                    StagedEntity::fresh(row)
                }
            }
        };
        self.cache.insert(EntityType::Meeting, key.clone(), staged);
        Ok(key)
    }

    fn find_or_prepare_calendar(&mut self, tree: &RecordTree, meeting_key: &str) {
        if self.cache.contains(EntityType::Calendar, meeting_key) {
            return;
        }
        let mut row = Row::new();
        row.insert("meeting_code".into(), Value::Str(meeting_key.into()));
        row.insert("season_id".into(), Value::Int(self.season.season_id));
        if let Some(date) = tree.date_begin {
            row.insert("scheduled_date".into(), Value::Str(date.to_string()));
        }
        let mut staged = StagedEntity::fresh(row);
        staged.bind("meeting_id", EntityType::Meeting, meeting_key);
        self.cache.insert(EntityType::Calendar, meeting_key, staged);
    }

    fn find_or_prepare_city(&mut self, name: &str) -> String {
        let key = keys::normalize(name);
        if self.cache.contains(EntityType::City, &key) {
            return key;
        }
        let staged = if let Some(row) = self
            .store
            .find_first(EntityType::City, &[("name", key.as_str().into())])
        {
            StagedEntity::from_store(row)
        } else {
            let found = self.finder.find(EntityType::City, &[], name);
            match found.best {
                Some(best) => StagedEntity::from_match(best, found.alternatives),
                None => {
                    let mut row = Row::new();
                    row.insert("name".into(), Value::Str(key.clone()));
                    StagedEntity::fresh(row)
                }
            }
        };
        self.cache.insert(EntityType::City, key.clone(), staged);
        key
    }

    fn find_or_prepare_pool(&mut self, name: &str, tree: &RecordTree) -> String {
        let key = keys::normalize(name);
        if self.cache.contains(EntityType::Pool, &key) {
            return key;
        }
        let staged = if let Some(row) = self
            .store
            .find_first(EntityType::Pool, &[("name", key.as_str().into())])
        {
            StagedEntity::from_store(row)
        } else {
            let found = self.finder.find(EntityType::Pool, &[], name);
            match found.best {
                Some(best) => StagedEntity::from_match(best, found.alternatives),
                None => {
                    let mut row = Row::new();
                    row.insert("name".into(), Value::Str(key.clone()));
                    row.insert(
                        "nick_name".into(),
                        Value::Str(names::coded_name(name, 30)),
                    );
                    if let Some(length) = tree.pool_length {
                        row.insert("pool_length".into(), Value::Int(i64::from(length)));
                    }
                    StagedEntity::fresh(row)
                }
            }
        };
        let mut staged = staged;
        if let Some(city) = tree.venue_city.as_deref().filter(|c| !c.trim().is_empty()) {
            staged.bind("city_id", EntityType::City, keys::normalize(city));
        }
        self.cache.insert(EntityType::Pool, key.clone(), staged);
        key
    }

    fn find_or_prepare_session(&mut self, spec: &SessionSpec) -> String {
        let key = keys::session_key(spec.order);
        if self.cache.contains(EntityType::Session, &key) {
            return key;
        }
        let mut row = Row::new();
        row.insert("session_order".into(), Value::Int(i64::from(spec.order)));
        if let Some(date) = spec.date {
            row.insert("scheduled_date".into(), Value::Str(date.to_string()));
        }
        if let Some(time) = spec.scheduled_time.as_deref().filter(|t| !t.is_empty()) {
            row.insert("begin_time".into(), Value::Str(time.into()));
        }
        if let Some(description) = spec.description.as_deref().filter(|d| !d.is_empty()) {
            row.insert("description".into(), Value::Str(description.into()));
        }
        let mut staged = StagedEntity::fresh(row);
        if let Some(meeting_key) = self.meeting_key.clone() {
            staged.bind("meeting_id", EntityType::Meeting, meeting_key);
        }
        if let Some(pool_key) = self.pool_key.clone() {
            staged.bind("swimming_pool_id", EntityType::Pool, pool_key);
        }
        self.cache.insert(EntityType::Session, key.clone(), staged);
        key
    }

    // ---- teams and swimmers --------------------------------------------

    fn find_or_prepare_team(&mut self, display_name: &str) -> String {
        let key = keys::team_key(display_name);
        if self.cache.contains(EntityType::Team, &key) {
            return key;
        }
        let staged = if let Some(row) = self
            .store
            .find_first(EntityType::Team, &[("name", key.as_str().into())])
        {
            StagedEntity::from_store(row)
        } else {
            let found = self.finder.find(EntityType::Team, &[], display_name);
            match found.best {
                Some(best) => StagedEntity::from_match(best, found.alternatives),
                None => {
                    let mut row = Row::new();
                    row.insert("name".into(), Value::Str(key.clone()));
                    row.insert(
                        "editable_name".into(),
                        Value::Str(display_name.trim().into()),
                    );
                    StagedEntity::fresh(row)
                }
            }
        };
        self.cache.insert(EntityType::Team, key.clone(), staged);
        key
    }

    fn find_or_prepare_affiliation(&mut self, team_key: &str) -> String {
        if self.cache.contains(EntityType::TeamAffiliation, team_key) {
            return team_key.to_string();
        }
        let name = self
            .cache
            .get(EntityType::Team, team_key)
            .and_then(|t| t.get_str("name"))
            .unwrap_or(team_key)
            .to_string();
        let mut row = Row::new();
        row.insert("name".into(), Value::Str(name));
        row.insert("season_id".into(), Value::Int(self.season.season_id));
        let mut staged = StagedEntity::fresh(row);
        staged.bind("team_id", EntityType::Team, team_key);
        self.cache
            .insert(EntityType::TeamAffiliation, team_key, staged);
        team_key.to_string()
    }

    /// Find or stage a swimmer, returning its staging key.
    ///
    /// When year/gender/team are not all known the derived key degrades
    /// to a wildcard pattern: an already-cached complete key matching the
    /// pattern is reused, a later complete derivation promotes a cached
    /// degraded entry, and a line with not even a year of birth defers
    /// (returns `None`).
    fn find_or_prepare_swimmer(
        &mut self,
        name: &str,
        year_of_birth: Option<i64>,
        gender: Option<&str>,
        team_name: Option<&str>,
    ) -> Option<String> {
        if name.trim().is_empty() {
            return None;
        }
        let key = keys::swimmer_key(name, year_of_birth, gender, team_name);
        if self.cache.contains(EntityType::Swimmer, key.as_str()) {
            return Some(key.as_str().to_string());
        }

        match &key {
            SwimmerKey::Complete(complete) => {
                // A degraded entry staged earlier (gender or team unknown
                // at the time) gets promoted to the complete key, fixing
                // up every binding that referenced it. The segments that
                // completed the key are merged into the cached row, since
                // the degraded staging could not have carried them.
                let predecessor = self.cache.find_key_where(EntityType::Swimmer, |cached| {
                    cached.contains('%') && keys::pattern_matches(cached, complete)
                });
                if let Some(old_key) = predecessor {
                    self.cache
                        .promote(EntityType::Swimmer, &old_key, complete);
                    if let Some(staged) = self.cache.get_mut(EntityType::Swimmer, complete) {
                        if let Some(g) = gender.filter(|g| !g.trim().is_empty()) {
                            if staged.get("gender_code").is_none_or(Value::is_blank) {
                                staged.set("gender_code", Value::Str(keys::normalize(g)));
                            }
                        }
                        if let Some(year) = year_of_birth {
                            if staged.get("year_of_birth").is_none_or(Value::is_blank) {
                                staged.set("year_of_birth", Value::Int(year));
                            }
                        }
                    }
                    return Some(complete.clone());
                }
                let staged = self.lookup_or_synthesize_swimmer(name, year_of_birth, gender);
                self.cache
                    .insert(EntityType::Swimmer, complete.clone(), staged);
                Some(complete.clone())
            }
            SwimmerKey::Partial(_) => {
                // Reuse an already-cached complete identity matching the
                // pattern, if any.
                if let Some(cached) = self
                    .cache
                    .find_key_where(EntityType::Swimmer, |k| key.matches(k))
                {
                    return Some(cached);
                }
                // Without a year of birth there is not enough identity to
                // stage anything: defer, the caller skips this line.
                year_of_birth?;
                let staged = self.lookup_or_synthesize_swimmer(name, year_of_birth, gender);
                self.cache
                    .insert(EntityType::Swimmer, key.as_str(), staged);
                Some(key.as_str().to_string())
            }
        }
    }

    fn lookup_or_synthesize_swimmer(
        &self,
        name: &str,
        year_of_birth: Option<i64>,
        gender: Option<&str>,
    ) -> StagedEntity {
        let complete_name = keys::normalize(name);
        let mut scope: Vec<(&str, Value)> = Vec::new();
        if let Some(year) = year_of_birth {
            scope.push(("year_of_birth", Value::Int(year)));
        }
        if let Some(g) = gender.filter(|g| !g.trim().is_empty()) {
            scope.push(("gender_code", Value::Str(keys::normalize(g))));
        }

        let mut exact = scope.clone();
        exact.push(("complete_name", Value::Str(complete_name.clone())));
        if let Some(row) = self.store.find_first(EntityType::Swimmer, &exact) {
            return StagedEntity::from_store(row);
        }

        let found = self.finder.find(EntityType::Swimmer, &scope, name);
        match found.best {
            Some(best) => StagedEntity::from_match(best, found.alternatives),
            None => {
                let (last_name, first_name) = names::tokenize_name(name);
                let mut row = Row::new();
                row.insert("complete_name".into(), Value::Str(complete_name));
                row.insert("last_name".into(), Value::Str(last_name));
                row.insert("first_name".into(), Value::Str(first_name));
                if let Some(year) = year_of_birth {
                    row.insert("year_of_birth".into(), Value::Int(year));
                }
                if let Some(g) = gender.filter(|g| !g.trim().is_empty()) {
                    row.insert("gender_code".into(), Value::Str(keys::normalize(g)));
                }
                StagedEntity::fresh(row)
            }
        }
    }

    fn find_or_prepare_badge(&mut self, swimmer_key: &str, team_key: &str) -> String {
        let key = keys::badge_key(swimmer_key, team_key);
        if self.cache.contains(EntityType::Badge, &key) {
            return key;
        }
        let mut row = Row::new();
        row.insert("season_id".into(), Value::Int(self.season.season_id));
        let mut staged = StagedEntity::fresh(row);
        staged.bind("swimmer_id", EntityType::Swimmer, swimmer_key);
        staged.bind("team_id", EntityType::Team, team_key);
        staged.bind("team_affiliation_id", EntityType::TeamAffiliation, team_key);
        self.cache.insert(EntityType::Badge, key.clone(), staged);
        key
    }

    // ---- events and programs -------------------------------------------

    fn find_or_prepare_event(&mut self, section: &SectionSpec) -> String {
        let key = keys::event_key(section.session_order, &section.event_code);
        if self.cache.contains(EntityType::Event, &key) {
            return key;
        }
        let order = self.cache.count(EntityType::Event) as i64 + 1;
        let mut row = Row::new();
        row.insert(
            "event_code".into(),
            Value::Str(keys::normalize(&section.event_code)),
        );
        row.insert("event_order".into(), Value::Int(order));
        let mut staged = StagedEntity::fresh(row);
        staged.bind(
            "meeting_session_id",
            EntityType::Session,
            keys::session_key(section.session_order),
        );
        self.cache.insert(EntityType::Event, key.clone(), staged);
        key
    }

    fn find_or_prepare_program(
        &mut self,
        event_key: &str,
        category_code: &str,
        gender_code: &str,
    ) -> String {
        let key = keys::program_key(event_key, category_code, gender_code);
        if self.cache.contains(EntityType::Program, &key) {
            return key;
        }
        let mut row = Row::new();
        row.insert(
            "category_code".into(),
            Value::Str(keys::normalize(category_code)),
        );
        row.insert(
            "gender_code".into(),
            Value::Str(keys::normalize(gender_code)),
        );
        let mut staged = StagedEntity::fresh(row);
        staged.bind("meeting_event_id", EntityType::Event, event_key);
        self.cache.insert(EntityType::Program, key.clone(), staged);
        key
    }

    // ---- sections ------------------------------------------------------

    fn solve_section(&mut self, section: &SectionSpec) {
        for line in &section.lines {
            let outcome = if section.ranking {
                self.stage_team_score(line)
            } else if section.relay || !line.legs.is_empty() {
                self.stage_relay_line(section, line)
            } else {
                self.stage_individual_line(section, line)
            };
            match outcome {
                Ok(()) => self.report.lines_staged += 1,
                Err(reason) => self.report.skip(reason),
            }
        }
    }

    /// Category code for a section line: the printed label when the
    /// season knows it, otherwise inferred from the year of birth.
    fn resolve_category(
        &self,
        section: &SectionSpec,
        year_of_birth: Option<i64>,
    ) -> Result<String, String> {
        let printed = section.category_code.trim();
        if !printed.is_empty() && self.season.has_category(&keys::normalize(printed)) {
            return Ok(keys::normalize(printed));
        }
        if let Some(year) = year_of_birth {
            if let Some(range) = inference::category_for_year(self.season, year) {
                return Ok(range.code.clone());
            }
        }
        Err(format!(
            "category undeterminable for '{}' in section '{}'",
            printed, section.event_code
        ))
    }

    fn stage_individual_line(
        &mut self,
        section: &SectionSpec,
        line: &ResultLine,
    ) -> Result<(), String> {
        let gender = line
            .gender
            .as_deref()
            .filter(|g| !g.trim().is_empty())
            .unwrap_or(section.gender_code.trim());
        if gender.is_empty() {
            return Err(format!("line '{}' has no gender", line.name));
        }
        let team_name = line
            .team_name
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| format!("line '{}' has no team", line.name))?;
        let category = self.resolve_category(section, line.year_of_birth)?;

        let swimmer_key = self
            .find_or_prepare_swimmer(&line.name, line.year_of_birth, Some(gender), Some(team_name))
            .ok_or_else(|| format!("swimmer identity incomplete for '{}'", line.name))?;
        let team_key = self.find_or_prepare_team(team_name);
        self.find_or_prepare_affiliation(&team_key);
        let badge_key = self.find_or_prepare_badge(&swimmer_key, &team_key);
        let event_key = self.find_or_prepare_event(section);
        let program_key = self.find_or_prepare_program(&event_key, &category, gender);

        let result_key = keys::individual_result_key(&program_key, &swimmer_key);
        if !self.cache.contains(EntityType::IndividualResult, &result_key) {
            let timing = Timing::parse(line.timing.as_deref().unwrap_or(""));
            let mut row = Row::new();
            if let Some(rank) = line.rank {
                row.insert("rank".into(), Value::Int(i64::from(rank)));
            }
            if let Some(score) = line.score {
                row.insert("standard_points".into(), Value::Float(score));
            }
            insert_timing(&mut row, "", timing);
            let mut staged = StagedEntity::fresh(row);
            staged.bind("meeting_program_id", EntityType::Program, &program_key);
            staged.bind("swimmer_id", EntityType::Swimmer, &swimmer_key);
            staged.bind("team_id", EntityType::Team, &team_key);
            staged.bind("badge_id", EntityType::Badge, &badge_key);
            self.cache
                .insert(EntityType::IndividualResult, result_key.clone(), staged);
        }

        for split in timing::reconstruct(&line.laps) {
            self.stage_lap(&result_key, &swimmer_key, &team_key, split);
        }
        Ok(())
    }

    fn stage_lap(&mut self, result_key: &str, swimmer_key: &str, team_key: &str, split: LapSplit) {
        let key = keys::lap_key(result_key, split.distance);
        if self.cache.contains(EntityType::Lap, &key) {
            return;
        }
        let mut row = Row::new();
        row.insert("distance".into(), Value::Int(i64::from(split.distance)));
        insert_timing(&mut row, "", split.delta);
        insert_timing(&mut row, "_from_start", split.cumulative);
        let mut staged = StagedEntity::fresh(row);
        staged.bind(
            "meeting_individual_result_id",
            EntityType::IndividualResult,
            result_key,
        );
        staged.bind("swimmer_id", EntityType::Swimmer, swimmer_key);
        staged.bind("team_id", EntityType::Team, team_key);
        self.cache.insert(EntityType::Lap, key, staged);
    }

    fn stage_relay_line(
        &mut self,
        section: &SectionSpec,
        line: &ResultLine,
    ) -> Result<(), String> {
        let team_name = line
            .team_name
            .as_deref()
            .or(Some(line.name.as_str()))
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| "relay line has no team".to_string())?;

        let gender = {
            let printed = section.gender_code.trim();
            if printed.is_empty() {
                let leg_genders: Vec<String> = line
                    .legs
                    .iter()
                    .filter_map(|leg| self.leg_gender(leg))
                    .collect();
                inference::infer_relay_gender(leg_genders.iter().map(String::as_str))
                    .ok_or_else(|| {
                        format!("relay gender unresolved for team '{}'", team_name)
                    })?
            } else {
                printed.to_string()
            }
        };

        let printed_category = keys::normalize(section.category_code.trim());
        if printed_category.is_empty() || !self.season.has_category(&printed_category) {
            return Err(format!(
                "relay category '{}' unknown in section '{}'",
                section.category_code, section.event_code
            ));
        }

        let team_key = self.find_or_prepare_team(team_name);
        self.find_or_prepare_affiliation(&team_key);
        let event_key = self.find_or_prepare_event(section);
        let program_key = self.find_or_prepare_program(&event_key, &printed_category, &gender);

        let relay_key = keys::relay_result_key(&program_key, &team_key);
        if !self.cache.contains(EntityType::RelayResult, &relay_key) {
            let timing = Timing::parse(line.timing.as_deref().unwrap_or(""));
            let mut row = Row::new();
            if let Some(rank) = line.rank {
                row.insert("rank".into(), Value::Int(i64::from(rank)));
            }
            if let Some(score) = line.score {
                row.insert("standard_points".into(), Value::Float(score));
            }
            insert_timing(&mut row, "", timing);
            let mut staged = StagedEntity::fresh(row);
            staged.bind("meeting_program_id", EntityType::Program, &program_key);
            staged.bind("team_id", EntityType::Team, &team_key);
            staged.bind("team_affiliation_id", EntityType::TeamAffiliation, &team_key);
            self.cache
                .insert(EntityType::RelayResult, relay_key.clone(), staged);
        }

        // Leg deltas come from the legs themselves; finer per-distance
        // sub-segments from the line's laps.
        let leg_specs: Vec<LapSpec> = {
            let mut end = 0;
            line.legs
                .iter()
                .map(|leg| {
                    end += leg.length;
                    LapSpec {
                        distance: end,
                        timing: leg.timing.clone(),
                        delta: leg.delta.clone(),
                    }
                })
                .collect()
        };
        let leg_splits = timing::reconstruct(&leg_specs);
        let sub_splits = timing::reconstruct(&line.laps);

        let mut leg_start = 0;
        for leg in &line.legs {
            let leg_end = leg_start + leg.length;
            let swimmer_key = self.find_or_prepare_swimmer(
                &leg.name,
                leg.year_of_birth,
                leg.gender.as_deref(),
                Some(team_name),
            );
            match &swimmer_key {
                Some(swimmer_key) => {
                    let badge_key = self.find_or_prepare_badge(swimmer_key, &team_key);
                    let split = leg_splits.iter().find(|s| s.distance == leg_end);
                    self.stage_relay_swimmer(&relay_key, swimmer_key, &badge_key, leg, split);
                }
                None => {
                    log::warn!(
                        "relay leg {} of '{}' has no resolvable swimmer, leg skipped",
                        leg.order,
                        team_name
                    );
                }
            }
            for sub in timing::leg_subsplits(&sub_splits, leg_start, leg_end) {
                self.stage_relay_lap(&relay_key, &team_key, swimmer_key.as_deref(), sub);
            }
            leg_start = leg_end;
        }
        Ok(())
    }

    /// Gender of one relay leg: the recorded one, or the gender of an
    /// already-cached swimmer matching name and year of birth
    fn leg_gender(&self, leg: &crate::import::types::RelayLegSpec) -> Option<String> {
        if let Some(g) = leg.gender.as_deref().filter(|g| !g.trim().is_empty()) {
            return Some(keys::normalize(g));
        }
        let pattern = keys::swimmer_key(&leg.name, leg.year_of_birth, None, None);
        let cached = self
            .cache
            .find_key_where(EntityType::Swimmer, |k| pattern.matches(k))?;
        self.cache
            .get(EntityType::Swimmer, &cached)?
            .get_str("gender_code")
            .map(str::to_string)
    }

    fn stage_relay_swimmer(
        &mut self,
        relay_key: &str,
        swimmer_key: &str,
        badge_key: &str,
        leg: &crate::import::types::RelayLegSpec,
        split: Option<&LapSplit>,
    ) {
        let key = keys::relay_swimmer_key(relay_key, leg.order);
        if self.cache.contains(EntityType::RelaySwimmer, &key) {
            return;
        }
        let mut row = Row::new();
        row.insert("relay_order".into(), Value::Int(i64::from(leg.order)));
        if let Some(split) = split {
            insert_timing(&mut row, "", split.delta);
        }
        let mut staged = StagedEntity::fresh(row);
        staged.bind("meeting_relay_result_id", EntityType::RelayResult, relay_key);
        staged.bind("swimmer_id", EntityType::Swimmer, swimmer_key);
        staged.bind("badge_id", EntityType::Badge, badge_key);
        self.cache.insert(EntityType::RelaySwimmer, key, staged);
    }

    fn stage_relay_lap(
        &mut self,
        relay_key: &str,
        team_key: &str,
        swimmer_key: Option<&str>,
        split: LapSplit,
    ) {
        let key = keys::lap_key(relay_key, split.distance);
        if self.cache.contains(EntityType::RelayLap, &key) {
            return;
        }
        let mut row = Row::new();
        row.insert("distance".into(), Value::Int(i64::from(split.distance)));
        insert_timing(&mut row, "", split.delta);
        insert_timing(&mut row, "_from_start", split.cumulative);
        let mut staged = StagedEntity::fresh(row);
        staged.bind("meeting_relay_result_id", EntityType::RelayResult, relay_key);
        staged.bind("team_id", EntityType::Team, team_key);
        if let Some(swimmer_key) = swimmer_key {
            staged.bind("swimmer_id", EntityType::Swimmer, swimmer_key);
        }
        self.cache.insert(EntityType::RelayLap, key, staged);
    }

    fn stage_team_score(&mut self, line: &ResultLine) -> Result<(), String> {
        let team_name = line
            .team_name
            .as_deref()
            .or(Some(line.name.as_str()))
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| "ranking line has no team".to_string())?;
        let team_key = self.find_or_prepare_team(team_name);
        self.find_or_prepare_affiliation(&team_key);

        if self.cache.contains(EntityType::TeamScore, &team_key) {
            return Ok(());
        }
        let mut row = Row::new();
        if let Some(rank) = line.rank {
            row.insert("rank".into(), Value::Int(i64::from(rank)));
        }
        if let Some(score) = line.score {
            row.insert("season_points".into(), Value::Float(score));
        }
        let mut staged = StagedEntity::fresh(row);
        if let Some(meeting_key) = self.meeting_key.clone() {
            staged.bind("meeting_id", EntityType::Meeting, meeting_key);
        }
        staged.bind("team_id", EntityType::Team, &team_key);
        staged.bind("team_affiliation_id", EntityType::TeamAffiliation, &team_key);
        self.cache.insert(EntityType::TeamScore, team_key, staged);
        Ok(())
    }
}

/// Write a timing's three components into a row, with an optional
/// column-name suffix for the cumulative variants
fn insert_timing(row: &mut Row, suffix: &str, timing: Timing) {
    row.insert(
        format!("minutes{}", suffix),
        Value::Int(i64::from(timing.minutes)),
    );
    row.insert(
        format!("seconds{}", suffix),
        Value::Int(i64::from(timing.seconds)),
    );
    row.insert(
        format!("hundredths{}", suffix),
        Value::Int(i64::from(timing.hundredths)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::types::RelayLegSpec;
    use crate::services::matching::NullFinder;
    use crate::services::progress::NullSink;
    use crate::storage::MemoryStore;

    fn season() -> SeasonConfig {
        SeasonConfig::from_toml_str(
            r#"
            season_id = 192
            reference_date = "2019-10-01"

            [[categories]]
            code = "M40"
            age_begin = 40
            age_end = 44

            [[categories]]
            code = "M100-119"
            age_begin = 25
            age_end = 59
            relay = true
            "#,
        )
        .unwrap()
    }

    fn individual_tree() -> RecordTree {
        RecordTree::from_json(
            r#"{
                "name": "Campionato Regionale",
                "sessions": [{"order": 1}],
                "sections": [{
                    "event_code": "100SL",
                    "gender_code": "M",
                    "lines": [{
                        "name": "ROSSI MARIO",
                        "year_of_birth": 1975,
                        "team_name": "ASD NUOTO X",
                        "timing": "1'02.34",
                        "rank": 1,
                        "laps": [
                            {"distance": 50, "timing": "0'31.10"},
                            {"distance": 100, "timing": "1'02.34"}
                        ]
                    }]
                }]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_individual_line_stages_full_chain() {
        let store = MemoryStore::new();
        let season = season();
        let mut solver = Solver::new(&store, &NullFinder, &NullSink, &season);
        solver.solve(&individual_tree()).unwrap();
        let (cache, report) = solver.finish();

        assert_eq!(report.lines_staged, 1);
        assert_eq!(report.lines_skipped, 0);
        let swimmer = cache
            .get(EntityType::Swimmer, "ROSSI MARIO-1975-M-ASD NUOTO X")
            .expect("swimmer staged under complete key");
        assert_eq!(swimmer.get_str("last_name"), Some("ROSSI"));
        assert_eq!(swimmer.get_str("first_name"), Some("MARIO"));
        assert!(!swimmer.is_persisted());

        // Category inferred from year of birth (2019 - 1975 = 44 -> M40)
        assert!(cache.contains(EntityType::Program, "1-100SL-M40-M"));
        assert_eq!(cache.count(EntityType::IndividualResult), 1);
        assert_eq!(cache.count(EntityType::Lap), 2);
    }

    #[test]
    fn test_line_without_category_is_skipped() {
        let store = MemoryStore::new();
        let season = season();
        let mut tree = individual_tree();
        tree.sections[0].lines[0].year_of_birth = None;
        let mut solver = Solver::new(&store, &NullFinder, &NullSink, &season);
        solver.solve(&tree).unwrap();
        let (cache, report) = solver.finish();

        assert_eq!(report.lines_skipped, 1);
        assert_eq!(cache.count(EntityType::IndividualResult), 0);
        // The meeting scaffolding is still staged
        assert_eq!(cache.count(EntityType::Meeting), 1);
    }

    #[test]
    fn test_resolution_is_idempotent_within_a_run() {
        let store = MemoryStore::new();
        let season = season();
        let tree = individual_tree();
        let mut solver = Solver::new(&store, &NullFinder, &NullSink, &season);
        solver.solve(&tree).unwrap();
        let first_total = solver.staging().total();
        solver.solve(&tree).unwrap();
        assert_eq!(solver.staging().total(), first_total);
    }

    #[test]
    fn test_persisted_swimmer_is_adopted_not_duplicated() {
        let mut store = MemoryStore::new();
        let mut row = Row::new();
        row.insert("complete_name".into(), Value::Str("ROSSI MARIO".into()));
        row.insert("last_name".into(), Value::Str("ROSSI".into()));
        row.insert("year_of_birth".into(), Value::Int(1975));
        row.insert("gender_code".into(), Value::Str("M".into()));
        let id = store.seed(EntityType::Swimmer, row);

        let season = season();
        let mut solver = Solver::new(&store, &NullFinder, &NullSink, &season);
        solver.solve(&individual_tree()).unwrap();
        let (cache, _) = solver.finish();
        let swimmer = cache
            .get(EntityType::Swimmer, "ROSSI MARIO-1975-M-ASD NUOTO X")
            .unwrap();
        assert_eq!(swimmer.persisted_id, Some(id));
    }

    #[test]
    fn test_degraded_swimmer_promoted_and_completed_by_later_line() {
        let store = MemoryStore::new();
        let season = season();
        // The relay leg carries no gender, so the swimmer first stages
        // under a wildcard key; the individual line afterwards supplies
        // the gender and completes the identity.
        let tree = RecordTree::from_json(
            r#"{
                "name": "Meeting",
                "sections": [
                    {
                        "event_code": "4X50SL",
                        "category_code": "M100-119",
                        "gender_code": "M",
                        "relay": true,
                        "lines": [{
                            "name": "ASD NUOTO X",
                            "timing": "2'05.00",
                            "legs": [{
                                "order": 1,
                                "name": "ROSSI MARIO",
                                "year_of_birth": 1975,
                                "length": 50,
                                "timing": "0'30.00"
                            }]
                        }]
                    },
                    {
                        "event_code": "100SL",
                        "gender_code": "M",
                        "lines": [{
                            "name": "ROSSI MARIO",
                            "year_of_birth": 1975,
                            "team_name": "ASD NUOTO X",
                            "timing": "1'02.34"
                        }]
                    }
                ]
            }"#,
        )
        .unwrap();
        let mut solver = Solver::new(&store, &NullFinder, &NullSink, &season);
        solver.solve(&tree).unwrap();
        let (cache, report) = solver.finish();
        assert_eq!(report.lines_skipped, 0);

        // One identity, cached only under the complete key, with the
        // late-arriving gender merged in
        assert_eq!(cache.count(EntityType::Swimmer), 1);
        let complete = "ROSSI MARIO-1975-M-ASD NUOTO X";
        let swimmer = cache
            .get(EntityType::Swimmer, complete)
            .expect("promoted to complete key");
        assert_eq!(swimmer.get_str("gender_code"), Some("M"));
        assert_eq!(swimmer.get("year_of_birth"), Some(&Value::Int(1975)));

        // The relay swimmer staged against the degraded key now points
        // at the promoted one
        let (_, relay_swimmer) = cache
            .iter(EntityType::RelaySwimmer)
            .next()
            .expect("relay swimmer staged");
        assert_eq!(relay_swimmer.bindings["swimmer_id"].key, complete);
    }

    #[test]
    fn test_relay_gender_inferred_from_legs() {
        let store = MemoryStore::new();
        let season = season();
        let tree = RecordTree {
            name: "Meeting".into(),
            sections: vec![SectionSpec {
                event_code: "4X50SL".into(),
                category_code: "M100-119".into(),
                relay: true,
                lines: vec![ResultLine {
                    name: "ASD NUOTO X".into(),
                    timing: Some("2'05.00".into()),
                    legs: vec![
                        RelayLegSpec {
                            order: 1,
                            name: "ROSSI MARIO".into(),
                            year_of_birth: Some(1975),
                            gender: Some("M".into()),
                            length: 50,
                            timing: Some("0'30.00".into()),
                            ..RelayLegSpec::default()
                        },
                        RelayLegSpec {
                            order: 2,
                            name: "BIANCHI ANNA".into(),
                            year_of_birth: Some(1980),
                            gender: Some("F".into()),
                            length: 50,
                            timing: Some("1'02.00".into()),
                            ..RelayLegSpec::default()
                        },
                    ],
                    ..ResultLine::default()
                }],
                ..SectionSpec::default()
            }],
            ..RecordTree::default()
        };
        let mut solver = Solver::new(&store, &NullFinder, &NullSink, &season);
        solver.solve(&tree).unwrap();
        let (cache, report) = solver.finish();

        assert_eq!(report.lines_skipped, 0);
        // Disagreeing leg genders resolve to the mixed code
        assert!(cache.contains(EntityType::Program, "1-4X50SL-M100-119-X"));
        assert_eq!(cache.count(EntityType::RelaySwimmer), 2);
    }
}
