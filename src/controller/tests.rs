#[cfg(test)]
mod units {
    use crate::aircraft::Aircraft;
    use crate::airport::demo_airport;
    use crate::clock::SimTime;
    use crate::comms::{Intent, IntentBody, RadioNet, Transmission};
    use crate::controller::{ControllerConfig, DeskController};
    use crate::flight::{Flight, FlightId, FlightKind, FlightPlan};
    use std::rc::Rc;
    use std::time::Duration;

    fn plan() -> FlightPlan {
        FlightPlan {
            departure_icao: "TSTA".to_string(),
            arrival_icao: "TSTB".to_string(),
            departure_runway: "09".to_string(),
            arrival_runway: "09".to_string(),
            departure_gate: "G1".to_string(),
            arrival_gate: "G1".to_string(),
            departure_time: SimTime::ZERO,
        }
    }

    fn desk(airport: &Rc<crate::airport::Airport>) -> DeskController {
        DeskController::new(Rc::clone(airport), "09", ControllerConfig::default())
    }

    fn call(subject: FlightId, khz: u32, body: IntentBody) -> Transmission {
        Transmission {
            khz,
            sent_at: SimTime::ZERO,
            intent: Intent::pilot(subject, body),
        }
    }

    #[test]
    fn replies_wait_for_the_think_time() {
        let airport = Rc::new(demo_airport());
        let mut desk = desk(&airport);
        let mut radio = RadioNet::new();
        let flights: Vec<Flight> = Vec::new();
        let delivery = airport.frequencies.clearance_delivery_khz;

        desk.observe(SimTime::ZERO, &call(FlightId(1), delivery, IntentBody::IfrRequest));

        desk.poll(SimTime::from_secs(1), &flights, &mut radio);
        assert_eq!(radio.pending_count(), 0);

        desk.poll(SimTime::from_secs(2), &flights, &mut radio);
        let queued = radio.take_queued();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].khz, delivery);
        assert!(matches!(
            queued[0].intent.body,
            IntentBody::IfrClearanceReply { .. }
        ));
    }

    #[test]
    fn entry_boundary_report_triggers_the_tower_handoff() {
        let airport = Rc::new(demo_airport());
        let mut desk = desk(&airport);
        let mut radio = RadioNet::new();
        let flights: Vec<Flight> = Vec::new();
        let ground = airport.frequencies.ground_khz;

        desk.observe(
            SimTime::ZERO,
            &call(FlightId(1), ground, IntentBody::ReportHoldingShort {
                runway: "09".to_string(),
                edge: "A1".to_string(),
            }),
        );
        desk.poll(SimTime::from_secs(2), &flights, &mut radio);

        let queued = radio.take_queued();
        assert_eq!(queued.len(), 1);
        assert!(matches!(queued[0].intent.body, IntentBody::SwitchToTower { .. }));
        // The entry report is not a crossing request.
        assert_eq!(desk.holding_count(), 0);
    }

    #[test]
    fn crossing_reports_queue_on_the_runway_mutex() {
        let airport = Rc::new(demo_airport());
        let config = ControllerConfig {
            cross_duration: Duration::from_secs(30),
            ..ControllerConfig::default()
        };
        let mut desk = DeskController::new(Rc::clone(&airport), "09", config);
        let mut radio = RadioNet::new();
        let flights: Vec<Flight> = Vec::new();
        let ground = airport.frequencies.ground_khz;

        for id in [1, 2] {
            desk.observe(
                SimTime::ZERO,
                &call(FlightId(id), ground, IntentBody::ReportHoldingShort {
                    runway: "09".to_string(),
                    edge: "X1".to_string(),
                }),
            );
        }

        desk.poll(SimTime::from_secs(1), &flights, &mut radio);
        let queued = radio.take_queued();
        // One crossing granted, one still holding short.
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].intent.subject, FlightId(1));
        assert!(matches!(
            queued[0].intent.body,
            IntentBody::RunwayCrossClearance { .. }
        ));
        assert!(desk.runway_busy());
        assert_eq!(desk.holding_count(), 1);

        // Before the crossing timer expires, nothing more is granted.
        desk.poll(SimTime::from_secs(20), &flights, &mut radio);
        assert_eq!(radio.pending_count(), 0);

        // After expiry the second crossing gets the runway.
        desk.poll(SimTime::from_secs(31), &flights, &mut radio);
        let queued = radio.take_queued();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].intent.subject, FlightId(2));
    }

    #[test]
    fn push_approval_carries_a_path_off_the_stand() {
        let airport = Rc::new(demo_airport());
        let mut desk = desk(&airport);
        let mut radio = RadioNet::new();
        let gate = airport.stand_or_err("G1").unwrap().location;
        let flights = vec![Flight::new(
            FlightId(1),
            "TST1",
            FlightKind::Departure,
            plan(),
            Aircraft::at_gate(gate),
        )];
        let ground = airport.frequencies.ground_khz;

        desk.observe(
            SimTime::ZERO,
            &call(FlightId(1), ground, IntentBody::PushAndStartRequest),
        );
        desk.poll(SimTime::from_secs(2), &flights, &mut radio);

        let queued = radio.take_queued();
        assert_eq!(queued.len(), 1);
        match &queued[0].intent.body {
            IntentBody::PushAndStartApproval { approval } => match &approval.payload {
                crate::flight::ClearancePayload::PushAndStart { pushback_path } => {
                    assert_eq!(pushback_path.len(), 2);
                    assert_eq!(pushback_path[0], gate);
                }
                other => panic!("unexpected payload {:?}", other),
            },
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn departure_taxi_reply_routes_to_the_runway_entry() {
        let airport = Rc::new(demo_airport());
        let mut desk = desk(&airport);
        let mut radio = RadioNet::new();
        let gate = airport.stand_or_err("G1").unwrap().location;
        let flights = vec![Flight::new(
            FlightId(1),
            "TST1",
            FlightKind::Departure,
            plan(),
            Aircraft::at_gate(gate),
        )];

        desk.observe(
            SimTime::ZERO,
            &call(
                FlightId(1),
                airport.frequencies.ground_khz,
                IntentBody::DepartureTaxiRequest,
            ),
        );
        desk.poll(SimTime::from_secs(2), &flights, &mut radio);

        let queued = radio.take_queued();
        match &queued[0].intent.body {
            IntentBody::DepartureTaxiReply { clearance } => match &clearance.payload {
                crate::flight::ClearancePayload::DepartureTaxi {
                    taxi_path,
                    departure_runway,
                } => {
                    assert_eq!(departure_runway, "09");
                    assert!(taxi_path.edges.last().unwrap().is_hold_short());
                }
                other => panic!("unexpected payload {:?}", other),
            },
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn lineup_then_takeoff_clearance_flow() {
        let airport = Rc::new(demo_airport());
        let mut desk = desk(&airport);
        let mut radio = RadioNet::new();
        let flights: Vec<Flight> = Vec::new();
        let tower = airport.tower_khz();

        desk.observe(
            SimTime::ZERO,
            &call(FlightId(5), tower, IntentBody::CheckInWithTower {
                runway: String::new(),
                edge: "A1".to_string(),
            }),
        );
        desk.poll(SimTime::from_secs(1), &flights, &mut radio);
        let queued = radio.take_queued();
        assert!(matches!(queued[0].intent.body, IntentBody::LineUpApproval { .. }));
        assert!(desk.runway_busy());

        desk.observe(
            SimTime::from_secs(3),
            &call(FlightId(5), tower, IntentBody::LineUpReadback {
                runway: "09".to_string(),
            }),
        );
        desk.poll(SimTime::from_secs(5), &flights, &mut radio);
        let queued = radio.take_queued();
        assert!(matches!(
            queued[0].intent.body,
            IntentBody::ClearedForTakeoff { .. }
        ));
    }

    #[test]
    fn forget_flight_frees_a_wedged_runway() {
        let airport = Rc::new(demo_airport());
        let mut desk = desk(&airport);
        let mut radio = RadioNet::new();
        let flights: Vec<Flight> = Vec::new();

        desk.observe(
            SimTime::ZERO,
            &call(FlightId(9), airport.tower_khz(), IntentBody::CheckInWithTower {
                runway: String::new(),
                edge: "A1".to_string(),
            }),
        );
        desk.poll(SimTime::from_secs(1), &flights, &mut radio);
        assert!(desk.runway_busy());

        desk.forget_flight(FlightId(9));
        assert!(!desk.runway_busy());
    }
}
