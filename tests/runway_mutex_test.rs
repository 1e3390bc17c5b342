//! Runway contention between an arrival on final and a departure whose
//! taxi route must cross the same runway before lining up on it.
//!
//! The departure starts at the north stand, so its route crosses 09/27 at
//! X1 and then enters at A1. The arrival is established on final when the
//! departure begins to taxi. A correct world serialises them: the crossing
//! is granted only after the lander has touched down and vacated, the
//! line-up only once the crossing has released the runway, and at no tick
//! do two aircraft occupy the strip together.

use airtraffic_lib::aircraft::AltitudeKind;
use airtraffic_lib::airport::{Runway, demo_airport};
use airtraffic_lib::clock::SimTime;
use airtraffic_lib::comms::IntentBody;
use airtraffic_lib::controller::{ControllerConfig, DeskController};
use airtraffic_lib::flight::{Flight, FlightPlan};
use airtraffic_lib::sim::{SimParams, TrafficSim};
use std::rc::Rc;
use std::time::Duration;

fn plan(gate: &str) -> FlightPlan {
    FlightPlan {
        departure_icao: "TSTA".to_string(),
        arrival_icao: "TSTA".to_string(),
        departure_runway: "09".to_string(),
        arrival_runway: "09".to_string(),
        departure_gate: gate.to_string(),
        arrival_gate: gate.to_string(),
        departure_time: SimTime::ZERO,
    }
}

/// True while the aircraft is physically on the runway strip.
fn on_strip(airport: &airtraffic_lib::airport::Airport, flight: &Flight) -> bool {
    let runway = &airport.runways[0];
    let end = &runway.end1;
    let location = flight.aircraft.location();
    let along = Runway::along_track_m(end, location);
    let cross = Runway::cross_track_m(end, location);
    flight.aircraft.altitude().kind == AltitudeKind::Ground
        && cross < 25.0
        && (-50.0..=runway.length_m + 50.0).contains(&along)
}

#[test]
fn crossing_departure_and_landing_arrival_share_one_runway() {
    let airport = Rc::new(demo_airport());
    let desk = DeskController::new(Rc::clone(&airport), "09", ControllerConfig::default());
    let mut sim = TrafficSim::new(Rc::clone(&airport), SimParams {
        tick_millis: 1000,
        iterations: 900,
        frame_interval: 10,
    })
    .with_controller(desk);

    let arrival_id = sim.add_arrival("ARR1", plan("G1"), 10_500.0, 2500.0).unwrap();
    let departure_id = sim.add_departure("DEP1", plan("N1")).unwrap();

    let mut touchdown_tick: Option<u64> = None;
    let mut vacated_tick: Option<u64> = None;
    let mut exclusion_violations = 0u64;

    for _ in 0..900 {
        sim.tick();

        let arrival = sim.flights().iter().find(|f| f.id == arrival_id).unwrap();
        let departure = sim.flights().iter().find(|f| f.id == departure_id).unwrap();
        assert!(arrival.failure().is_none(), "{:?}", arrival.failure());
        assert!(departure.failure().is_none(), "{:?}", departure.failure());

        let step = sim.step_count();
        if touchdown_tick.is_none()
            && arrival.aircraft.altitude().kind == AltitudeKind::Ground
        {
            touchdown_tick = Some(step);
        }
        if touchdown_tick.is_some() && vacated_tick.is_none() && !on_strip(&airport, arrival) {
            vacated_tick = Some(step);
        }

        if on_strip(&airport, arrival) && on_strip(&airport, departure) {
            exclusion_violations += 1;
        }

        if sim.is_idle() {
            break;
        }
    }

    assert_eq!(exclusion_violations, 0, "two aircraft held the strip at once");

    let touchdown = touchdown_tick.expect("arrival never touched down") as f64;
    let vacated = vacated_tick.expect("arrival never vacated") as f64;

    // Pull the controller's grants out of the transcript.
    let transcript = sim.radio().transcript();
    let sent_at = |matcher: &dyn Fn(&IntentBody) -> bool| -> Option<f64> {
        transcript
            .iter()
            .find(|tx| matcher(&tx.intent.body))
            .map(|tx| tx.sent_at.as_secs_f64())
    };

    let landing_granted = sent_at(&|b| matches!(b, IntentBody::ClearedForLanding { .. }))
        .expect("no landing clearance");
    let cross_granted = sent_at(&|b| matches!(b, IntentBody::RunwayCrossClearance { .. }))
        .expect("no crossing clearance");
    let lineup_granted = sent_at(&|b| matches!(b, IntentBody::LineUpApproval { .. }))
        .expect("no line-up approval");
    let takeoff_granted = sent_at(&|b| matches!(b, IntentBody::ClearedForTakeoff { .. }))
        .expect("no takeoff clearance");

    // The lander was cleared long before the departure reached the
    // crossing, so the crossing had to wait out the landing.
    assert!(landing_granted < cross_granted);
    assert!(
        cross_granted >= touchdown,
        "crossing granted at {} before touchdown at {}",
        cross_granted,
        touchdown
    );
    assert!(
        cross_granted + 1.0 >= vacated,
        "crossing granted at {} before the lander vacated at {}",
        cross_granted,
        vacated
    );

    // The line-up waited for the crossing to release the runway, and the
    // takeoff clearance followed the line-up.
    let cross_hold = ControllerConfig::default().cross_duration.as_secs_f64();
    assert!(
        lineup_granted >= cross_granted + cross_hold,
        "line-up at {} during the crossing window starting {}",
        lineup_granted,
        cross_granted
    );
    assert!(takeoff_granted > lineup_granted);

    // Both flights reported holding short, at the crossing and the entry.
    let reported_edges: Vec<String> = transcript
        .iter()
        .filter_map(|tx| match &tx.intent.body {
            IntentBody::ReportHoldingShort { edge, .. } => Some(edge.clone()),
            _ => None,
        })
        .collect();
    assert!(reported_edges.contains(&"X1".to_string()), "{:?}", reported_edges);
    assert!(reported_edges.contains(&"A1".to_string()), "{:?}", reported_edges);

    // End state: the lander is parked at its gate, the departure airborne.
    let arrival = sim.flights().iter().find(|f| f.id == arrival_id).unwrap();
    let departure = sim.flights().iter().find(|f| f.id == departure_id).unwrap();
    assert!(arrival.is_complete(), "arrival status: {}", arrival.status_string());
    assert_eq!(arrival.aircraft.parked_at(), Some("G1"));
    assert!(departure.is_complete(), "departure status: {}", departure.status_string());
    assert!(departure.aircraft.altitude().is_airborne());
}

/// Two departures from the south gates: the second line-up waits until the
/// first is airborne.
#[test]
fn successive_departures_take_the_runway_in_turn() {
    let airport = Rc::new(demo_airport());
    let desk = DeskController::new(Rc::clone(&airport), "09", ControllerConfig::default());
    let mut sim = TrafficSim::new(Rc::clone(&airport), SimParams {
        tick_millis: 1000,
        iterations: 900,
        frame_interval: 10,
    })
    .with_controller(desk);

    let mut first_plan = plan("G1");
    first_plan.departure_time = SimTime::ZERO;
    let mut second_plan = plan("G2");
    second_plan.departure_time = SimTime::ZERO + Duration::from_secs(60);

    sim.add_departure("DEP1", first_plan).unwrap();
    sim.add_departure("DEP2", second_plan).unwrap();

    sim.run();

    for flight in sim.flights() {
        assert!(flight.failure().is_none(), "{:?}", flight.failure());
        assert!(flight.is_complete(), "status: {}", flight.status_string());
        assert!(flight.aircraft.altitude().is_airborne());
    }

    // Line-ups were granted one at a time, in request order.
    let lineups: Vec<(f64, u32)> = sim
        .radio()
        .transcript()
        .iter()
        .filter(|tx| matches!(tx.intent.body, IntentBody::LineUpApproval { .. }))
        .map(|tx| (tx.sent_at.as_secs_f64(), tx.intent.subject.0))
        .collect();
    assert_eq!(lineups.len(), 2);
    assert!(lineups[0].0 < lineups[1].0);

    let takeoffs: Vec<f64> = sim
        .radio()
        .transcript()
        .iter()
        .filter(|tx| matches!(tx.intent.body, IntentBody::ClearedForTakeoff { .. }))
        .map(|tx| tx.sent_at.as_secs_f64())
        .collect();
    assert_eq!(takeoffs.len(), 2);
    // The second takeoff clearance comes well after the first, once the
    // leader has lifted off and released the runway.
    assert!(takeoffs[1] > takeoffs[0] + 20.0);
}
