#[cfg(test)]
mod units {
    use crate::aircraft::Aircraft;
    use crate::airport::demo_airport;
    use crate::clock::SimTime;
    use crate::comms::{Intent, IntentBody, RadioNet};
    use crate::flight::{
        Clearance, ClearanceKind, ClearancePayload, Flight, FlightId, FlightKind, FlightPlan,
    };
    use crate::pilot;
    use std::rc::Rc;

    fn departure_plan() -> FlightPlan {
        FlightPlan {
            departure_icao: "TSTA".to_string(),
            arrival_icao: "TSTB".to_string(),
            departure_runway: "09".to_string(),
            arrival_runway: "09".to_string(),
            departure_gate: "G1".to_string(),
            arrival_gate: "G2".to_string(),
            departure_time: SimTime::ZERO,
        }
    }

    fn departure_flight(airport: &Rc<crate::airport::Airport>) -> Flight {
        let plan = departure_plan();
        let gate = airport.stand_or_err(&plan.departure_gate).unwrap().location;
        let mut flight = Flight::new(
            FlightId(1),
            "TST1",
            FlightKind::Departure,
            plan,
            Aircraft::at_gate(gate),
        );
        pilot::install_departure(&mut flight, airport).unwrap();
        flight
    }

    fn deliver(flight: &mut Flight, id: u64, body: IntentBody) {
        let mut intent = Intent::controller(flight.id, body);
        intent.id = id;
        pilot::handle_transmission(flight, &intent);
    }

    #[test]
    fn receiver_ignores_calls_for_other_flights() {
        let airport = Rc::new(demo_airport());
        let mut flight = departure_flight(&airport);

        let mut intent = Intent::controller(FlightId(99), IntentBody::SwitchToTower {
            tower_khz: 118_700,
        });
        intent.id = 11;
        pilot::handle_transmission(&mut flight, &intent);

        assert_eq!(flight.caches.departure_tower_khz, 0);
        assert_eq!(flight.last_received_intent_id, 0);
    }

    #[test]
    fn receiver_ignores_pilot_direction_traffic() {
        let airport = Rc::new(demo_airport());
        let mut flight = departure_flight(&airport);

        let mut intent = Intent::pilot(flight.id, IntentBody::IfrRequest);
        intent.id = 11;
        pilot::handle_transmission(&mut flight, &intent);

        assert_eq!(flight.last_received_intent_id, 0);
    }

    #[test]
    fn receiver_stores_clearances_and_records_the_intent_id() {
        let airport = Rc::new(demo_airport());
        let mut flight = departure_flight(&airport);

        let flight_id = flight.id;
        deliver(
            &mut flight,
            21,
            IntentBody::IfrClearanceReply {
                clearance: Clearance::new(flight_id, ClearancePayload::Ifr {
                    initial_heading: 210.0,
                }),
            },
        );

        assert!(flight.clearances.has_unconsumed(ClearanceKind::Ifr));
        assert_eq!(flight.last_received_intent_id, 21);
    }

    #[test]
    fn receiver_caches_handoff_frequencies() {
        let airport = Rc::new(demo_airport());
        let mut flight = departure_flight(&airport);

        deliver(&mut flight, 5, IntentBody::SwitchToTower { tower_khz: 118_700 });
        assert_eq!(flight.caches.departure_tower_khz, 118_700);

        let flight_id = flight.id;
        deliver(
            &mut flight,
            6,
            IntentBody::ClearedForTakeoff {
                clearance: Clearance::new(flight_id, ClearancePayload::Takeoff {
                    runway: "09".to_string(),
                    initial_heading: 210.0,
                    departure_khz: 124_350,
                }),
            },
        );
        assert_eq!(flight.caches.departure_khz, 124_350);
        assert!(flight.clearances.has_unconsumed(ClearanceKind::Takeoff));

        deliver(
            &mut flight,
            7,
            IntentBody::ClearedForLanding {
                clearance: Clearance::new(flight_id, ClearancePayload::Landing {
                    runway: "09".to_string(),
                    ground_khz: 121_900,
                }),
            },
        );
        assert_eq!(flight.caches.arrival_ground_khz, 121_900);
    }

    #[test]
    fn receiver_marks_ifr_readback_correct() {
        let airport = Rc::new(demo_airport());
        let mut flight = departure_flight(&airport);

        let flight_id = flight.id;
        deliver(
            &mut flight,
            8,
            IntentBody::IfrClearanceReply {
                clearance: Clearance::new(flight_id, ClearancePayload::Ifr {
                    initial_heading: 210.0,
                }),
            },
        );
        assert!(!flight.clearances.find(ClearanceKind::Ifr).unwrap().readback_correct);

        deliver(&mut flight, 9, IntentBody::IfrReadbackCorrect);
        assert!(flight.clearances.find(ClearanceKind::Ifr).unwrap().readback_correct);
    }

    #[test]
    fn install_departure_rejects_unknown_geometry() {
        let airport = Rc::new(demo_airport());
        let mut plan = departure_plan();
        plan.departure_runway = "36".to_string();
        let mut flight = Flight::new(
            FlightId(1),
            "TST1",
            FlightKind::Departure,
            plan,
            Aircraft::at_gate(airport.stands[0].location),
        );

        assert!(pilot::install_departure(&mut flight, &airport).is_err());
        assert!(!flight.is_active());
    }

    #[test]
    fn departure_script_walks_the_clearance_dialogue() {
        let airport = Rc::new(demo_airport());
        let mut flight = departure_flight(&airport);
        let mut radio = RadioNet::new();
        assert!(flight.is_active());

        // Tick zero: pre-start delay is zero, so the script tunes delivery
        // and calls for the IFR clearance within the first tick.
        flight.advance(SimTime::ZERO, &mut radio);
        assert_eq!(
            flight.aircraft.frequency_khz(),
            airport.frequencies.clearance_delivery_khz
        );
        let queued = radio.take_queued();
        assert!(
            queued
                .iter()
                .any(|tx| matches!(tx.intent.body, IntentBody::IfrRequest)),
            "expected an IFR request, got {:?}",
            queued.iter().map(|tx| &tx.intent.body).collect::<Vec<_>>()
        );

        // Clearance arrives; the read-back acknowledges its intent id.
        let flight_id = flight.id;
        deliver(
            &mut flight,
            41,
            IntentBody::IfrClearanceReply {
                clearance: Clearance::new(flight_id, ClearancePayload::Ifr {
                    initial_heading: 210.0,
                }),
            },
        );
        flight.advance(SimTime::from_secs(1), &mut radio);
        let queued = radio.take_queued();
        let readback = queued
            .iter()
            .find(|tx| matches!(tx.intent.body, IntentBody::IfrReadback))
            .expect("expected an IFR read-back");
        assert_eq!(readback.intent.reply_to, Some(41));

        // Read-back confirmed: the script acknowledges the ground handoff
        // and idles five seconds before calling for pushback.
        deliver(&mut flight, 42, IntentBody::IfrReadbackCorrect);
        flight.advance(SimTime::from_secs(2), &mut radio);
        let queued = radio.take_queued();
        assert!(
            queued
                .iter()
                .any(|tx| matches!(tx.intent.body, IntentBody::HandoffReadback { .. }))
        );

        for secs in 3..=7 {
            flight.advance(SimTime::from_secs(secs), &mut radio);
        }
        assert_eq!(flight.aircraft.frequency_khz(), airport.frequencies.ground_khz);
        let queued = radio.take_queued();
        assert!(
            queued
                .iter()
                .any(|tx| matches!(tx.intent.body, IntentBody::PushAndStartRequest)),
            "expected a push-and-start request"
        );
        assert!(flight.failure().is_none());
    }

    #[test]
    fn arrival_script_reports_final_after_configuring() {
        let airport = Rc::new(demo_airport());
        let end09 = airport.end_or_err("09").unwrap();
        let spawn = crate::geo::point_at_distance(end09.threshold, 270.0, 8000.0);
        let mut plan = departure_plan();
        plan.arrival_gate = "G1".to_string();
        let mut aircraft = Aircraft::on_final(spawn, end09.heading, 2500.0, 145.0);
        aircraft.set_vertical_speed_fpm(-1000.0);
        let mut flight = Flight::new(FlightId(2), "TST2", FlightKind::Arrival, plan, aircraft);
        pilot::install_arrival(&mut flight, &airport).unwrap();

        let mut radio = RadioNet::new();
        for secs in 0..=31 {
            flight.advance(SimTime::from_secs(secs), &mut radio);
        }

        assert_eq!(flight.aircraft.frequency_khz(), airport.frequencies.tower_khz);
        let transcript = radio.transcript();
        assert!(
            transcript
                .iter()
                .any(|tx| matches!(tx.intent.body, IntentBody::ReportFinal { .. })),
            "expected a final report"
        );
        // Landing configuration ran on the way in.
        assert!(flight.aircraft.gear_state() > 0.99);
        assert!((flight.aircraft.flap_state() - 0.15).abs() < 1e-9);
        assert!(flight.failure().is_none());
    }
}
