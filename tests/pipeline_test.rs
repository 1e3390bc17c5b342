//! The two pipeline stages end to end: generate scenarios, persist them,
//! reload them, replay the batch and persist the reports.

use airtraffic_lib::airport::demo_airport;
use airtraffic_lib::io;
use airtraffic_lib::scenario::{self, Scenario, ScenarioParams, ScenarioReport};
use airtraffic_lib::sim::SimParams;

#[test]
fn generate_save_load_replay_report() {
    let dir = tempfile::tempdir().unwrap();
    let airport = demo_airport();
    io::ensure_data_directories(dir.path()).unwrap();

    // Stage 1: generate and persist two single-departure scenarios.
    let params = ScenarioParams {
        departures: 1,
        arrivals: 0,
        seed: 11,
        ..ScenarioParams::default()
    };
    for id in 0..2 {
        let mut scenario = scenario::generate(&airport, id, "pipeline", params);
        // Keep the replay short: south gates avoid the runway crossing.
        scenario.flights[0].gate = "G1".to_string();
        io::save_json(dir.path(), &scenario).unwrap();
    }

    // Stage 2: reload from disk and replay the batch.
    let files = io::list_files::<Scenario>(dir.path(), "json").unwrap();
    assert_eq!(files.len(), 2);
    let scenarios: Vec<Scenario> = files
        .iter()
        .map(|path| io::load_json(path).unwrap())
        .collect();

    let reports = scenario::run_batch(&airport, &scenarios, SimParams {
        tick_millis: 1000,
        iterations: 600,
        frame_interval: 10,
    });
    assert_eq!(reports.len(), 2);

    for report in &reports {
        assert_eq!(report.completed, 1, "report: {:?}", report);
        assert_eq!(report.failed, 0);
        assert!(report.total_steps > 0);
        io::save_json(dir.path(), report).unwrap();
        io::save_bin(dir.path(), report).unwrap();
    }

    // The reports round-trip from disk with the same outcome counts.
    let report_files = io::list_files::<ScenarioReport>(dir.path(), "json").unwrap();
    assert_eq!(report_files.len(), 2);
    for path in &report_files {
        let loaded: ScenarioReport = io::load_json(path).unwrap();
        assert_eq!(loaded.completed, 1);
        assert_eq!(loaded.tag, "pipeline");
    }
}

#[test]
fn mixed_scenario_replay_reports_every_flight() {
    let airport = demo_airport();
    let params = ScenarioParams {
        departures: 1,
        arrivals: 1,
        seed: 5,
        ..ScenarioParams::default()
    };
    let mut scenario = scenario::generate(&airport, 0, "mixed", params);
    for flight in scenario.flights.iter_mut() {
        flight.gate = "G1".to_string();
    }

    let report = scenario::run_scenario(&airport, &scenario, SimParams {
        tick_millis: 1000,
        iterations: 1200,
        frame_interval: 10,
    });

    assert_eq!(report.flights.len(), 2);
    assert_eq!(report.completed, 2, "report: {:?}", report);
    let arrival = report
        .flights
        .iter()
        .find(|f| f.kind == airtraffic_lib::flight::FlightKind::Arrival)
        .unwrap();
    assert_eq!(arrival.parked_at.as_deref(), Some("G1"));
    let departure = report
        .flights
        .iter()
        .find(|f| f.kind == airtraffic_lib::flight::FlightKind::Departure)
        .unwrap();
    assert!(departure.airborne);
}
