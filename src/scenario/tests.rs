#[cfg(test)]
mod units {
    use crate::airport::demo_airport;
    use crate::flight::FlightKind;
    use crate::scenario::{self, ScenarioParams};
    use crate::sim::SimParams;

    fn small_params() -> ScenarioParams {
        ScenarioParams {
            departures: 3,
            arrivals: 2,
            seed: 42,
            ..ScenarioParams::default()
        }
    }

    #[test]
    fn generation_is_reproducible_for_the_same_seed_and_id() {
        let airport = demo_airport();
        let a = scenario::generate(&airport, 1, "repro", small_params());
        let b = scenario::generate(&airport, 1, "repro", small_params());

        assert_eq!(a.flights.len(), b.flights.len());
        for (x, y) in a.flights.iter().zip(b.flights.iter()) {
            assert_eq!(x.call_sign, y.call_sign);
            assert_eq!(x.gate, y.gate);
            assert_eq!(x.offset_secs, y.offset_secs);
        }
    }

    #[test]
    fn different_scenario_ids_draw_different_samples() {
        let airport = demo_airport();
        let a = scenario::generate(&airport, 1, "t", small_params());
        let b = scenario::generate(&airport, 2, "t", small_params());

        let same = a
            .flights
            .iter()
            .zip(b.flights.iter())
            .all(|(x, y)| x.gate == y.gate && x.offset_secs == y.offset_secs);
        assert!(!same, "two scenario ids produced identical fleets");
    }

    #[test]
    fn generated_fleet_has_the_requested_shape() {
        let airport = demo_airport();
        let s = scenario::generate(&airport, 0, "shape", small_params());

        assert_eq!(s.flights.len(), 5);
        let departures = s.flights.iter().filter(|f| f.kind == FlightKind::Departure);
        let arrivals = s.flights.iter().filter(|f| f.kind == FlightKind::Arrival);
        assert_eq!(departures.count(), 3);
        assert_eq!(arrivals.count(), 2);
        for flight in &s.flights {
            assert!(airport.stands.iter().any(|st| st.name == flight.gate));
            assert_eq!(flight.runway, "09");
        }
    }

    #[test]
    fn single_departure_scenario_replays_to_completion() {
        let airport = demo_airport();
        let params = ScenarioParams {
            departures: 1,
            arrivals: 0,
            seed: 3,
            ..ScenarioParams::default()
        };
        let mut s = scenario::generate(&airport, 0, "solo", params);
        // Pin the gate so the run cannot draw the runway-crossing stand.
        s.flights[0].gate = "G1".to_string();

        let report = scenario::run_scenario(&airport, &s, SimParams {
            tick_millis: 1000,
            iterations: 600,
            frame_interval: 10,
        });

        assert_eq!(report.completed, 1, "report: {:?}", report);
        assert_eq!(report.failed, 0);
        assert_eq!(report.stalled, 0);
        assert!(report.transmissions > 5);
        assert!(report.flights[0].airborne);
    }

    #[test]
    fn batch_replays_scenarios_independently() {
        let airport = demo_airport();
        let params = ScenarioParams {
            departures: 1,
            arrivals: 0,
            seed: 9,
            ..ScenarioParams::default()
        };
        let mut scenarios = vec![
            scenario::generate(&airport, 0, "batch", params),
            scenario::generate(&airport, 1, "batch", params),
        ];
        for s in scenarios.iter_mut() {
            s.flights[0].gate = "G2".to_string();
        }

        let reports = scenario::run_batch(&airport, &scenarios, SimParams {
            tick_millis: 1000,
            iterations: 600,
            frame_interval: 10,
        });

        assert_eq!(reports.len(), 2);
        for report in &reports {
            assert_eq!(report.completed, 1, "report: {:?}", report);
        }
    }
}
