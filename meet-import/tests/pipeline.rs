//! End-to-end pipeline tests: record tree -> solver -> committer over
//! the in-memory store, including second-run convergence.

use meet_import::import::types::{EntityType, Value};
use meet_import::import::{Committer, Operation, Solver};
use meet_import::services::{NullFinder, NullSink};
use meet_import::storage::{MeetStore, MemoryStore};
use meet_import::{EntityStore, SeasonConfig};

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

/// A small but complete meeting: one individual section with laps, one
/// relay with mixed-gender legs, one team ranking.
fn tree() -> meet_import::import::types::RecordTree {
    meet_import::import::types::RecordTree::from_json(
        r#"{
            "name": "Campionato Regionale Master",
            "code": "regmaster",
            "venue_city": "Bologna",
            "pool_name": "Stadio del Nuoto",
            "pool_length": 25,
            "date_begin": "2019-11-10",
            "sessions": [{"order": 1, "date": "2019-11-10"}],
            "sections": [
                {
                    "event_code": "100SL",
                    "gender_code": "M",
                    "lines": [{
                        "name": "ROSSI MARIO",
                        "year_of_birth": 1975,
                        "team_name": "ASD Nuoto X",
                        "timing": "1'02.34",
                        "rank": 1,
                        "score": 750.5,
                        "laps": [
                            {"distance": 50, "timing": "0'31.10"},
                            {"distance": 100, "timing": "1'02.34"}
                        ]
                    }]
                },
                {
                    "event_code": "4X50SL",
                    "category_code": "M100-119",
                    "relay": true,
                    "lines": [{
                        "name": "ASD Nuoto X",
                        "timing": "2'05.00",
                        "rank": 1,
                        "legs": [
                            {
                                "order": 1,
                                "name": "ROSSI MARIO",
                                "year_of_birth": 1975,
                                "gender": "M",
                                "length": 50,
                                "timing": "0'30.00"
                            },
                            {
                                "order": 2,
                                "name": "BIANCHI ANNA",
                                "year_of_birth": 1980,
                                "gender": "F",
                                "length": 50,
                                "timing": "1'02.00"
                            }
                        ]
                    }]
                },
                {
                    "event_code": "RANKING",
                    "ranking": true,
                    "lines": [{
                        "name": "ASD Nuoto X",
                        "rank": 1,
                        "score": 150.0
                    }]
                }
            ]
        }"#,
    )
    .unwrap()
}

fn solve(store: &MemoryStore, season: &SeasonConfig) -> EntityStore {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut solver = Solver::new(store, &NullFinder, &NullSink, season);
    solver.solve(&tree()).unwrap();
    let (cache, report) = solver.finish();
    assert_eq!(report.lines_skipped, 0, "warnings: {:?}", report.warnings);
    cache
}

#[test]
fn test_first_run_persists_the_whole_graph() {
    let mut store = MemoryStore::new();
    let season = season();
    let mut cache = solve(&store, &season);
    let outcome = Committer::new(&mut store).commit(&mut cache).unwrap();

    assert_eq!(outcome.insert_count(), 22);
    assert_eq!(outcome.update_count(), 0);

    assert_eq!(store.count(EntityType::Meeting), 1);
    assert_eq!(store.count(EntityType::Calendar), 1);
    assert_eq!(store.count(EntityType::City), 1);
    assert_eq!(store.count(EntityType::Pool), 1);
    assert_eq!(store.count(EntityType::Session), 1);
    assert_eq!(store.count(EntityType::Team), 1);
    assert_eq!(store.count(EntityType::TeamAffiliation), 1);
    assert_eq!(store.count(EntityType::Swimmer), 2);
    assert_eq!(store.count(EntityType::Badge), 2);
    assert_eq!(store.count(EntityType::Event), 2);
    assert_eq!(store.count(EntityType::Program), 2);
    assert_eq!(store.count(EntityType::IndividualResult), 1);
    assert_eq!(store.count(EntityType::Lap), 2);
    assert_eq!(store.count(EntityType::RelayResult), 1);
    assert_eq!(store.count(EntityType::RelaySwimmer), 2);
    assert_eq!(store.count(EntityType::TeamScore), 1);

    // Mixed-gender relay legs land under the mixed program
    let program = store
        .find_first(
            EntityType::Program,
            &[("gender_code", Value::Str("X".into()))],
        )
        .expect("mixed relay program persisted");
    assert_eq!(program.get("category_code"), Some(&Value::Str("M100-119".into())));

    // The individual result carries rank, points, and the final timing
    let result = store.find_first(EntityType::IndividualResult, &[]).unwrap();
    assert_eq!(result.get("rank"), Some(&Value::Int(1)));
    assert_eq!(result.get("minutes"), Some(&Value::Int(1)));
    assert_eq!(result.get("seconds"), Some(&Value::Int(2)));
    assert_eq!(result.get("hundredths"), Some(&Value::Int(34)));

    // Second lap carries delta and cumulative reconstruction
    let lap = store
        .find_first(EntityType::Lap, &[("distance", Value::Int(100))])
        .unwrap();
    assert_eq!(lap.get("seconds"), Some(&Value::Int(31)));
    assert_eq!(lap.get("hundredths"), Some(&Value::Int(24)));
    assert_eq!(lap.get("minutes_from_start"), Some(&Value::Int(1)));
    assert_eq!(lap.get("seconds_from_start"), Some(&Value::Int(2)));
}

#[test]
fn test_replay_log_is_an_executable_batch() {
    let mut store = MemoryStore::new();
    let season = season();
    let mut cache = solve(&store, &season);
    let outcome = Committer::new(&mut store).commit(&mut cache).unwrap();

    let statements = outcome.log.statements();
    assert_eq!(statements.first().map(String::as_str), Some("BEGIN TRANSACTION;"));
    assert_eq!(statements.last().map(String::as_str), Some("COMMIT;"));
    assert_eq!(outcome.log.statement_count(), 22);

    let script = outcome.log.to_script();
    assert!(script.contains("INSERT INTO meetings "));
    assert!(script.contains("INSERT INTO swimmers "));
    assert!(script.contains("'ROSSI MARIO'"));
    // Every insert carries the timestamp pair
    for statement in statements.iter().filter(|s| s.starts_with("INSERT")) {
        assert!(statement.contains("created_at"), "{}", statement);
        assert!(statement.ends_with(");"), "{}", statement);
    }
}

#[test]
fn test_second_run_converges_to_the_calendar_freshness_update() {
    let mut store = MemoryStore::new();
    let season = season();

    let mut cache = solve(&store, &season);
    Committer::new(&mut store).commit(&mut cache).unwrap();
    let swimmer_total = store.count(EntityType::Swimmer);

    // Same tree again over the now-populated store
    let mut cache = solve(&store, &season);
    let outcome = Committer::new(&mut store).commit(&mut cache).unwrap();

    assert_eq!(outcome.insert_count(), 0);
    // The calendar row alone is forced through the update path to
    // advance its freshness marker
    assert_eq!(outcome.update_count(), 1);
    assert_eq!(outcome.records[0].entity, EntityType::Calendar);
    assert_eq!(outcome.records[0].operation, Operation::Update);
    assert_eq!(outcome.log.statement_count(), 1);
    assert!(outcome.records[0].statement.starts_with("UPDATE calendars SET"));
    assert!(outcome.records[0]
        .statement
        .contains("updated_at=CURRENT_TIMESTAMP"));

    // No duplicated rows anywhere
    assert_eq!(store.count(EntityType::Swimmer), swimmer_total);
    assert_eq!(store.count(EntityType::Meeting), 1);
    assert_eq!(store.count(EntityType::IndividualResult), 1);
    assert_eq!(store.count(EntityType::RelayResult), 1);
    assert_eq!(store.count(EntityType::Lap), 2);
    assert_eq!(store.count(EntityType::TeamScore), 1);
}

#[test]
fn test_rollback_leaves_the_store_untouched() {
    let mut store = MemoryStore::new();
    let season = season();
    let mut cache = solve(&store, &season);

    // Corrupt one staged entity so insert validation fails mid-run
    let key = cache.keys(EntityType::Team)[0].clone();
    if let Some(team) = cache.get_mut(EntityType::Team, &key) {
        team.row.remove("name");
    }

    let err = Committer::new(&mut store).commit(&mut cache).unwrap_err();
    assert!(format!("{:#}", err).contains("validation"));
    for entity in EntityType::COMMIT_PHASES {
        assert_eq!(store.count(entity), 0, "{} leaked past rollback", entity);
    }
}
