//! # Pilot Module - Flight Scripts and the Comm Receiver
//!
//! The AI pilot is one large maneuver tree per flight, composed entirely
//! out of engine primitives. This module builds the two top-level scripts
//! (the departure cycle and the final-to-gate arrival), the hold-short
//! subtrees they share, and the communication receiver that turns incoming
//! controller transmissions into clearance-store entries.
//!
//! Everything a closure needs at fire time is either carried in the
//! [`FlightCtx`] or captured by value at build time; late-bound data such
//! as a cleared taxi route always arrives through a deferred node whose
//! factory dereferences the store after the matching await.
//!
//! ## Submodules
//!
//! - [`tests`]: Unit tests for the receiver and the script builders

pub mod tests;

use crate::aircraft::{AltitudeKind, LightBits};
use crate::airport::{Airport, TaxiEdge, TaxiPath};
use crate::comms::{Direction, Intent, IntentBody};
use crate::error::SimError;
use crate::flight::{ClearanceKind, ClearancePayload, Flight, FlightCtx, FlightId, FlightPlan};
use crate::geo::{self, GeoPoint};
use crate::maneuver::factory::{HoldShortHook, TaxiType};
use crate::maneuver::{ManeuverArena, ManeuverId, ManeuverTag};
use log::{debug, info, warn};
use std::rc::Rc;
use std::time::Duration;

/// Pre-start idle before the planned off-block time, seconds.
const PRE_START_LEAD_SECS: u64 = 180;

/// Applies one received transmission to the flight.
///
/// Only controller-to-pilot calls addressed to this flight are considered.
/// Clearance-bearing intents append to the store; handoffs update the
/// cached frequencies; in every handled case the intent id is recorded for
/// read-back assembly.
pub fn handle_transmission(flight: &mut Flight, intent: &Intent) {
    if intent.direction != Direction::ControllerToPilot || intent.subject != flight.id {
        return;
    }

    info!("{} handling transmission id {}", flight.call_sign, intent.id);
    flight.last_received_intent_id = intent.id;

    match &intent.body {
        IntentBody::IfrReadbackCorrect => {
            flight.clearances.mark_readback_correct(ClearanceKind::Ifr);
        }
        IntentBody::SwitchToTower { tower_khz } => {
            flight.caches.departure_tower_khz = *tower_khz;
        }
        IntentBody::ClearedForTakeoff { clearance } => {
            if let ClearancePayload::Takeoff { departure_khz, .. } = &clearance.payload {
                flight.caches.departure_khz = *departure_khz;
            }
            flight.clearances.add(clearance.clone());
        }
        IntentBody::ClearedForLanding { clearance } => {
            if let ClearancePayload::Landing { ground_khz, .. } = &clearance.payload {
                flight.caches.arrival_ground_khz = *ground_khz;
            }
            flight.clearances.add(clearance.clone());
        }
        body => {
            if let Some(clearance) = body.carried_clearance() {
                flight.clearances.add(clearance.clone());
            }
        }
    }
}

/// Installs the full departure cycle as the flight's root maneuver.
pub fn install_departure(flight: &mut Flight, airport: &Rc<Airport>) -> Result<(), SimError> {
    airport.end_or_err(&flight.plan.departure_runway)?;
    airport.stand_or_err(&flight.plan.departure_gate)?;

    let id = flight.id;
    let plan = flight.plan.clone();
    let airport = Rc::clone(airport);
    flight.install_root(move |arena| flight_cycle(arena, id, &plan, &airport));
    Ok(())
}

/// Installs the final-to-gate arrival script as the flight's root maneuver.
pub fn install_arrival(flight: &mut Flight, airport: &Rc<Airport>) -> Result<(), SimError> {
    airport.end_or_err(&flight.plan.arrival_runway)?;
    airport.stand_or_err(&flight.plan.arrival_gate)?;

    let id = flight.id;
    let plan = flight.plan.clone();
    let airport = Rc::clone(airport);
    flight.install_root(move |arena| final_to_gate(arena, id, &plan, &airport));
    Ok(())
}

/// True at or below `feet` above the field. On the surface the height is
/// zero, so a touched-down aircraft satisfies every gate; the landing
/// sequence must keep draining even when a coarse tick puts the wheels
/// down mid-flare.
fn at_or_below_agl(ctx: &FlightCtx<'_>, feet: f64) -> bool {
    let alt = ctx.aircraft.altitude();
    match alt.kind {
        AltitudeKind::Ground => true,
        AltitudeKind::Agl => alt.feet <= feet,
        AltitudeKind::Msl => false,
    }
}

/// True when `point` is more than 45 degrees off the nose.
fn is_point_behind(ctx: &FlightCtx<'_>, point: GeoPoint) -> bool {
    let to_point = geo::heading_from_points(ctx.aircraft.location(), point);
    geo::turn_degrees(ctx.aircraft.attitude().heading, to_point).abs() >= 45.0
}

/// Pitch animation shorthand: every script trims pitch the same way.
fn pitch_anim(arena: &mut ManeuverArena, from: f64, to: f64, duration: Duration) -> ManeuverId {
    arena.animation("", from, to, duration, |ctx, value, _p| {
        let attitude = ctx.aircraft.attitude().with_pitch(value);
        ctx.aircraft.set_attitude(attitude);
    })
}

fn vertical_speed_anim(
    arena: &mut ManeuverArena,
    from: f64,
    to: f64,
    duration: Duration,
) -> ManeuverId {
    arena.animation("", from, to, duration, |ctx, value, _p| {
        ctx.aircraft.set_vertical_speed_fpm(value);
    })
}

fn ground_speed_anim(
    arena: &mut ManeuverArena,
    from: f64,
    to: f64,
    duration: Duration,
) -> ManeuverId {
    arena.animation("", from, to, duration, |ctx, value, _p| {
        ctx.aircraft.set_ground_speed_kt(value);
    })
}

fn flap_anim(arena: &mut ManeuverArena, from: f64, to: f64, duration: Duration) -> ManeuverId {
    arena.animation("", from, to, duration, |ctx, value, _p| {
        ctx.aircraft.set_flap_state(value);
    })
}

/// The whole departure, gate to airborne turn.
fn flight_cycle(
    arena: &mut ManeuverArena,
    id: FlightId,
    plan: &FlightPlan,
    airport: &Rc<Airport>,
) -> ManeuverId {
    let pre_start = plan
        .departure_time
        .since_epoch()
        .saturating_sub(Duration::from_secs(PRE_START_LEAD_SECS));

    let steps = vec![
        arena.delay(pre_start),
        departure_await_ifr_clearance(arena, id, plan, airport),
        departure_await_pushback(arena, id, airport),
        departure_pushback_and_start(arena, id),
        departure_await_taxi(arena, id),
        departure_taxi(arena, id, plan, airport),
        departure_await_takeoff(arena, id),
        departure_takeoff(arena, id, plan, airport),
    ];
    arena.sequence(ManeuverTag::Flight, "", steps)
}

/// IFR clearance on delivery: request, await, read back, wait for the
/// readback-correct confirmation, then acknowledge the handoff to ground.
fn departure_await_ifr_clearance(
    arena: &mut ManeuverArena,
    id: FlightId,
    plan: &FlightPlan,
    airport: &Rc<Airport>,
) -> ManeuverId {
    let gate = airport
        .stand_or_err(&plan.departure_gate)
        .map(|s| s.location)
        .unwrap_or_default();
    let delivery_khz = airport.clearance_delivery_at(gate);
    let ground_khz = airport.ground_at(gate);

    let readback = arena.deferred(ManeuverTag::Unspecified, "ifr readback", move |arena, ctx| {
        ctx.clearances.find_or_err(ClearanceKind::Ifr, ctx.call_sign)?;
        let intent = Intent::pilot_reply(id, ctx.last_received_intent_id, IntentBody::IfrReadback);
        Ok(arena.transmit_intent(intent))
    });
    let readback_confirmed = arena.await_if(
        ManeuverTag::Unspecified,
        "readback correct",
        |ctx: &FlightCtx<'_>| {
            ctx.clearances
                .find(ClearanceKind::Ifr)
                .is_some_and(|c| c.readback_correct)
        },
    );
    let handoff = arena.deferred(ManeuverTag::Unspecified, "", move |arena, ctx| {
        let intent = Intent::pilot_reply(
            id,
            ctx.last_received_intent_id,
            IntentBody::HandoffReadback {
                next_khz: ground_khz,
            },
        );
        Ok(arena.transmit_intent(intent))
    });
    let settle = arena.deferred(ManeuverTag::Unspecified, "", |arena, _ctx| {
        Ok(arena.delay(Duration::from_secs(5)))
    });

    let steps = vec![
        arena.tune_com_radio(delivery_khz),
        arena.transmit_intent(Intent::pilot(id, IntentBody::IfrRequest)),
        arena.await_clearance(ClearanceKind::Ifr),
        readback,
        readback_confirmed,
        handoff,
        settle,
    ];
    arena.sequence(ManeuverTag::DepartureAwaitIfrClearance, "", steps)
}

fn departure_await_pushback(
    arena: &mut ManeuverArena,
    id: FlightId,
    airport: &Rc<Airport>,
) -> ManeuverId {
    let ground_khz = airport.frequencies.ground_khz;

    let readback = arena.deferred(ManeuverTag::Unspecified, "", move |arena, ctx| {
        ctx.clearances
            .find_or_err(ClearanceKind::PushAndStart, ctx.call_sign)?;
        let intent = Intent::pilot_reply(
            id,
            ctx.last_received_intent_id,
            IntentBody::PushAndStartReadback,
        );
        Ok(arena.transmit_intent(intent))
    });
    let settle = arena.deferred(ManeuverTag::Unspecified, "", |arena, _ctx| {
        Ok(arena.delay(Duration::from_secs(5)))
    });

    let steps = vec![
        arena.tune_com_radio(ground_khz),
        arena.transmit_intent(Intent::pilot(id, IntentBody::PushAndStartRequest)),
        arena.await_clearance(ClearanceKind::PushAndStart),
        readback,
        settle,
    ];
    arena.sequence(ManeuverTag::DepartureAwaitPushback, "", steps)
}

/// Beacon on, engines turning, then the tail-first push along the path the
/// approval carried. The whole body is deferred because the pushback path
/// does not exist until the approval arrives.
fn departure_pushback_and_start(arena: &mut ManeuverArena, _id: FlightId) -> ManeuverId {
    arena.deferred(
        ManeuverTag::DeparturePushbackAndStart,
        "pushback",
        move |arena, ctx| {
            let approval = ctx
                .clearances
                .find_or_err(ClearanceKind::PushAndStart, ctx.call_sign)?;
            let ClearancePayload::PushAndStart { pushback_path } = &approval.payload else {
                return Err(SimError::MissingClearance {
                    call_sign: ctx.call_sign.to_string(),
                    kind: ClearanceKind::PushAndStart,
                });
            };
            let path = taxi_path_from_points(pushback_path);
            for edge in &path.edges {
                debug!(
                    "{} pushback edge ({:.6},{:.6})->({:.6},{:.6})",
                    ctx.call_sign,
                    edge.node1.latitude,
                    edge.node1.longitude,
                    edge.node2.latitude,
                    edge.node2.longitude
                );
            }

            let steps = vec![
                arena.switch_lights(LightBits::BEACON),
                arena.delay(Duration::from_secs(10)),
                arena.switch_lights(LightBits::BEACON_NAV),
                arena.delay(Duration::from_secs(5)),
                arena.taxi_by_path(
                    ManeuverTag::DeparturePushbackAndStart,
                    &path,
                    TaxiType::Pushback,
                    None,
                ),
            ];
            Ok(arena.sequence(ManeuverTag::DeparturePushbackAndStart, "", steps))
        },
    )
}

fn taxi_path_from_points(points: &[GeoPoint]) -> TaxiPath {
    let edges = points
        .windows(2)
        .enumerate()
        .map(|(i, pair)| TaxiEdge::new(i as u32, "", pair[0], pair[1]))
        .collect();
    TaxiPath::new(edges)
}

/// Flaps to the takeoff detent, then the taxi request exchange.
fn departure_await_taxi(arena: &mut ManeuverArena, id: FlightId) -> ManeuverId {
    let flaps_to_takeoff = flap_anim(arena, 0.0, 0.15, Duration::from_secs(3));
    let readback = arena.deferred(ManeuverTag::Unspecified, "", move |arena, ctx| {
        ctx.clearances
            .find_or_err(ClearanceKind::DepartureTaxi, ctx.call_sign)?;
        let intent = Intent::pilot_reply(
            id,
            ctx.last_received_intent_id,
            IntentBody::DepartureTaxiReadback,
        );
        Ok(arena.transmit_intent(intent))
    });
    let settle = arena.deferred(ManeuverTag::Unspecified, "", |arena, _ctx| {
        Ok(arena.delay(Duration::from_secs(10)))
    });

    let steps = vec![
        arena.delay(Duration::from_secs(5)),
        flaps_to_takeoff,
        arena.delay(Duration::from_secs(5)),
        arena.transmit_intent(Intent::pilot(id, IntentBody::DepartureTaxiRequest)),
        arena.await_clearance(ClearanceKind::DepartureTaxi),
        readback,
        settle,
    ];
    arena.sequence(ManeuverTag::DepartureAwaitTaxi, "", steps)
}

/// Taxi out on the cleared route with line-up geometry appended past the
/// hold-short point. Deferred until the taxi clearance is on file.
fn departure_taxi(
    arena: &mut ManeuverArena,
    id: FlightId,
    plan: &FlightPlan,
    airport: &Rc<Airport>,
) -> ManeuverId {
    let airport = Rc::clone(airport);
    let own_runway = plan.departure_runway.clone();

    arena.deferred(ManeuverTag::DepartureTaxi, "taxi out", move |arena, ctx| {
        let clearance = ctx
            .clearances
            .find_or_err(ClearanceKind::DepartureTaxi, ctx.call_sign)?;
        let ClearancePayload::DepartureTaxi {
            taxi_path,
            departure_runway,
        } = &clearance.payload
        else {
            return Err(SimError::MissingClearance {
                call_sign: ctx.call_sign.to_string(),
                kind: ClearanceKind::DepartureTaxi,
            });
        };

        let mut path = taxi_path.clone();
        let end = airport.end_or_err(departure_runway)?;
        // Line-up geometry: from the hold-short point onto the centerline,
        // then two short legs down the runway heading.
        if let Some(entry) = path.end() {
            let along = crate::airport::Runway::along_track_m(end, entry).max(0.0);
            let centerline = geo::point_at_distance(end.threshold, end.heading, along);
            path.append_edge_to(geo::point_at_distance(centerline, end.heading, 30.0));
            path.append_edge_to(geo::point_at_distance(centerline, end.heading, 60.0));
        }

        let hook = hold_short_hook(id, Rc::clone(&airport), own_runway.clone());
        let steps = vec![
            arena.delay(Duration::from_secs(10)),
            arena.switch_lights(LightBits::BEACON_TAXI),
            arena.delay(Duration::from_secs(5)),
            arena.taxi_by_path(ManeuverTag::DepartureTaxi, &path, TaxiType::Normal, Some(hook)),
        ];
        Ok(arena.sequence(ManeuverTag::DepartureTaxi, "", steps))
    })
}

/// Decides at each hold-short boundary whether this is the line-up point
/// for our own departure runway or a crossing of someone else's.
fn hold_short_hook(id: FlightId, airport: Rc<Airport>, own_runway: String) -> HoldShortHook {
    Rc::new(move |arena: &mut ManeuverArena, edge: &TaxiEdge| {
        let own = airport
            .runway_with_end(&own_runway)
            .ok()
            .is_some_and(|runway| edge.active_zones.departure.has(runway));
        if own {
            departure_await_lineup(arena, id, &own_runway, edge)
        } else {
            await_cross_runway(arena, id, &airport, edge)
        }
    })
}

/// Line up and wait: report the hold, take the tower handoff, check in,
/// await line-up approval, read it back and light up.
fn departure_await_lineup(
    arena: &mut ManeuverArena,
    id: FlightId,
    runway: &str,
    edge: &TaxiEdge,
) -> ManeuverId {
    let runway = runway.to_string();
    let edge_name = edge.name.clone();

    let report = arena.transmit_intent(Intent::pilot(id, IntentBody::ReportHoldingShort {
        runway: runway.clone(),
        edge: edge_name.clone(),
    }));
    let tower_known = arena.await_if(
        ManeuverTag::Unspecified,
        "tower handoff",
        |ctx: &FlightCtx<'_>| ctx.caches.departure_tower_khz > 0,
    );
    let handoff_readback = arena.deferred(ManeuverTag::Unspecified, "", move |arena, ctx| {
        let intent = Intent::pilot_reply(
            id,
            ctx.last_received_intent_id,
            IntentBody::HandoffReadback {
                next_khz: ctx.caches.departure_tower_khz,
            },
        );
        Ok(arena.transmit_intent(intent))
    });
    let retune = arena.instant_action(|ctx| {
        let khz = ctx.caches.departure_tower_khz;
        ctx.aircraft.set_frequency_khz(khz);
    });
    let check_in = arena.transmit_intent(Intent::pilot(id, IntentBody::CheckInWithTower {
        runway: String::new(),
        edge: edge_name,
    }));
    let lineup_runway = runway.clone();
    let lineup_readback = arena.deferred(ManeuverTag::Unspecified, "", move |arena, ctx| {
        ctx.clearances
            .find_or_err(ClearanceKind::Lineup, ctx.call_sign)?;
        let intent = Intent::pilot_reply(id, ctx.last_received_intent_id, IntentBody::LineUpReadback {
            runway: lineup_runway.clone(),
        });
        Ok(arena.transmit_intent(intent))
    });

    let steps = vec![
        report,
        tower_known,
        handoff_readback,
        retune,
        check_in,
        arena.await_clearance(ClearanceKind::Lineup),
        lineup_readback,
        arena.switch_lights(LightBits::BEACON_LANDING_NAV_STROBE),
        arena.delay(Duration::from_secs(5)),
    ];
    arena.sequence(ManeuverTag::DepartureLineUpAndWait, "", steps)
}

/// Hold short of a runway that is not ours: report, await the crossing
/// clearance, affirm.
fn await_cross_runway(
    arena: &mut ManeuverArena,
    id: FlightId,
    airport: &Airport,
    edge: &TaxiEdge,
) -> ManeuverId {
    let runway_name = airport
        .active_zone_runway(edge)
        .map(|r| r.end1.name.clone())
        .unwrap_or_default();

    let report = arena.transmit_intent(Intent::pilot(id, IntentBody::ReportHoldingShort {
        runway: runway_name,
        edge: edge.name.clone(),
    }));
    let affirm = arena.deferred(ManeuverTag::Unspecified, "", move |arena, ctx| {
        ctx.clearances
            .find_or_err(ClearanceKind::RunwayCross, ctx.call_sign)?;
        let intent =
            Intent::pilot_reply(id, ctx.last_received_intent_id, IntentBody::Affirmation);
        Ok(arena.transmit_intent(intent))
    });

    let steps = vec![
        report,
        arena.await_clearance(ClearanceKind::RunwayCross),
        affirm,
    ];
    arena.sequence(ManeuverTag::TaxiHoldShort, "", steps)
}

fn departure_await_takeoff(arena: &mut ManeuverArena, id: FlightId) -> ManeuverId {
    let readback = arena.deferred(ManeuverTag::Unspecified, "", move |arena, ctx| {
        ctx.clearances
            .find_or_err(ClearanceKind::Takeoff, ctx.call_sign)?;
        let intent = Intent::pilot_reply(
            id,
            ctx.last_received_intent_id,
            IntentBody::TakeoffReadback {
                departure_khz: ctx.caches.departure_khz,
            },
        );
        Ok(arena.transmit_intent(intent))
    });

    let steps = vec![
        arena.await_clearance(ClearanceKind::Takeoff),
        readback,
        arena.delay(Duration::from_secs(5)),
    ];
    arena.sequence(ManeuverTag::DepartureAwaitTakeOff, "", steps)
}

/// The takeoff roll and initial climb: staged parallel animations for
/// speed, rotation, climb, gear and the turn to the assigned heading.
fn departure_takeoff(
    arena: &mut ManeuverArena,
    _id: FlightId,
    _plan: &FlightPlan,
    airport: &Rc<Airport>,
) -> ManeuverId {
    let airport = Rc::clone(airport);

    arena.deferred(ManeuverTag::DepartureTakeOffRoll, "takeoff", move |arena, ctx| {
        let clearance = ctx
            .clearances
            .find_or_err(ClearanceKind::Takeoff, ctx.call_sign)?;
        let ClearancePayload::Takeoff {
            runway,
            initial_heading,
            ..
        } = &clearance.payload
        else {
            return Err(SimError::MissingClearance {
                call_sign: ctx.call_sign.to_string(),
                kind: ClearanceKind::Takeoff,
            });
        };
        let runway_heading = airport.end_or_err(runway)?.heading;
        let assigned_heading = *initial_heading;

        let snap_to_centerline = arena.instant_action(move |ctx| {
            let attitude = ctx.aircraft.attitude().with_heading(runway_heading);
            ctx.aircraft.set_attitude(attitude);
        });

        let roll = ground_speed_anim(arena, 0.0, 140.0, Duration::from_secs(20));
        let accelerate = ground_speed_anim(arena, 140.0, 180.0, Duration::from_secs(30));
        let speed_leg = arena.sequence(ManeuverTag::Unspecified, "", vec![roll, accelerate]);

        let rotate1 = pitch_anim(arena, 0.0, 8.5, Duration::from_secs(3));
        let rotate2 = pitch_anim(arena, 8.5, 15.0, Duration::from_secs(6));
        let rotate_delay = arena.delay(Duration::from_secs(20));
        let rotate_leg =
            arena.sequence(ManeuverTag::Unspecified, "", vec![rotate_delay, rotate1, rotate2]);

        let lift = vertical_speed_anim(arena, 0.0, 2500.0, Duration::from_secs(10));
        let lift_delay = arena.delay(Duration::from_secs(23));
        let lift_leg = arena.sequence(ManeuverTag::Unspecified, "", vec![lift_delay, lift]);

        let gear_up = arena.animation("", 1.0, 0.0, Duration::from_secs(8), |ctx, value, _p| {
            ctx.aircraft.set_gear_state(value);
        });
        let gear_delay = arena.delay(Duration::from_secs(25));
        let gear_leg = arena.sequence(ManeuverTag::Unspecified, "", vec![gear_delay, gear_up]);

        let turn = arena.airborne_turn(runway_heading, assigned_heading);
        let turn_delay = arena.delay(Duration::from_secs(32));
        let turn_leg = arena.sequence(ManeuverTag::Unspecified, "", vec![turn_delay, turn]);

        let airborne = arena.parallel(ManeuverTag::Unspecified, "", vec![
            speed_leg, rotate_leg, lift_leg, gear_leg, turn_leg,
        ]);
        Ok(arena.sequence(ManeuverTag::Unspecified, "", vec![snap_to_centerline, airborne]))
    })
}

/// The arrival: final approach, landing, then the deferred taxi to gate.
fn final_to_gate(
    arena: &mut ManeuverArena,
    id: FlightId,
    plan: &FlightPlan,
    airport: &Rc<Airport>,
) -> ManeuverId {
    let steps = vec![
        arrival_final(arena, id, plan, airport),
        arrival_landing(arena),
        arrival_taxi_to_gate(arena, id, plan, airport),
    ];
    arena.sequence(ManeuverTag::ArrivalApproach, "", steps)
}

/// Configure for landing, report final and stage the last flap setting
/// against the landing-clearance exchange.
fn arrival_final(
    arena: &mut ManeuverArena,
    id: FlightId,
    plan: &FlightPlan,
    airport: &Rc<Airport>,
) -> ManeuverId {
    let tower_khz = airport.tower_khz();
    let runway = plan.arrival_runway.clone();

    let flaps15 = flap_anim(arena, 0.0, 0.15, Duration::from_secs(7));
    let gear_down = arena.animation("", 0.0, 1.0, Duration::from_secs(10), |ctx, value, _p| {
        ctx.aircraft.set_gear_state(value);
    });
    let trim_level = pitch_anim(arena, -2.0, 0.0, Duration::from_secs(3));
    let configure = arena.sequence(ManeuverTag::Unspecified, "", vec![
        flaps15, gear_down, trim_level,
    ]);

    let flaps40_flap = flap_anim(arena, 0.15, 0.4, Duration::from_secs(10));
    let flaps40_pitch = pitch_anim(arena, 0.0, 1.5, Duration::from_secs(5));
    let flaps40 = arena.parallel(ManeuverTag::Unspecified, "", vec![flaps40_flap, flaps40_pitch]);
    let flaps40_delay = arena.delay(Duration::from_secs(20));
    let flaps40_leg = arena.sequence(ManeuverTag::Unspecified, "", vec![flaps40_delay, flaps40]);

    let landing_readback = arena.deferred(ManeuverTag::Unspecified, "", move |arena, ctx| {
        let clearance = ctx
            .clearances
            .find_or_err(ClearanceKind::Landing, ctx.call_sign)?;
        let ClearancePayload::Landing { ground_khz, .. } = &clearance.payload else {
            return Err(SimError::MissingClearance {
                call_sign: ctx.call_sign.to_string(),
                kind: ClearanceKind::Landing,
            });
        };
        let intent = Intent::pilot_reply(
            id,
            ctx.last_received_intent_id,
            IntentBody::LandingReadback {
                ground_khz: *ground_khz,
            },
        );
        Ok(arena.transmit_intent(intent))
    });
    let clearance_wait = arena.await_clearance(ClearanceKind::Landing);
    let clearance_leg = arena.sequence(ManeuverTag::Unspecified, "", vec![
        clearance_wait,
        landing_readback,
    ]);

    let last_stage = arena.parallel(ManeuverTag::Unspecified, "", vec![flaps40_leg, clearance_leg]);

    let steps = vec![
        arena.delay(Duration::from_secs(10)),
        configure,
        arena.tune_com_radio(tower_khz),
        arena.transmit_intent(Intent::pilot(id, IntentBody::ReportFinal { runway })),
        last_stage,
    ];
    arena.sequence(ManeuverTag::ArrivalApproach, "", steps)
}

/// Pre-flare, flare and the landing roll, each gated on an altitude await.
fn arrival_landing(arena: &mut ManeuverArena) -> ManeuverId {
    let below_55 = arena.await_if(ManeuverTag::Unspecified, "", |ctx: &FlightCtx<'_>| {
        at_or_below_agl(ctx, 55.0)
    });
    let pre_flare_pitch = pitch_anim(arena, 1.5, 3.0, Duration::from_millis(3500));
    let pre_flare_vs = vertical_speed_anim(arena, -1000.0, -500.0, Duration::from_millis(3500));
    let pre_flare = arena.parallel(ManeuverTag::ArrivalLanding, "", vec![
        pre_flare_pitch,
        pre_flare_vs,
    ]);

    let below_20 = arena.await_if(ManeuverTag::Unspecified, "", |ctx: &FlightCtx<'_>| {
        at_or_below_agl(ctx, 20.0)
    });
    let flare_pitch = pitch_anim(arena, 3.0, 5.5, Duration::from_secs(3));
    let flare_speed = ground_speed_anim(arena, 145.0, 135.0, Duration::from_secs(3));
    let sink_arrest = vertical_speed_anim(arena, -500.0, -50.0, Duration::from_secs(2));
    let settle = vertical_speed_anim(arena, -50.0, -100.0, Duration::from_secs(1));
    let sink_leg = arena.sequence(ManeuverTag::Unspecified, "", vec![sink_arrest, settle]);
    let flare = arena.parallel(ManeuverTag::ArrivalLanding, "", vec![
        flare_pitch,
        flare_speed,
        sink_leg,
    ]);

    let on_ground = arena.await_if(ManeuverTag::Unspecified, "", |ctx: &FlightCtx<'_>| {
        ctx.aircraft.altitude().kind == AltitudeKind::Ground
    });
    let spoilers = arena.animation("", 0.0, 1.0, Duration::from_secs(1), |ctx, value, _p| {
        ctx.aircraft.set_spoiler_state(value);
    });
    let derotate = pitch_anim(arena, 5.5, 0.0, Duration::from_secs(6));
    let decelerate = ground_speed_anim(arena, 135.0, 30.0, Duration::from_secs(20));
    let rollout = arena.parallel(ManeuverTag::ArrivalLandingRoll, "", vec![
        spoilers, derotate, decelerate,
    ]);

    let steps = vec![below_55, pre_flare, below_20, flare, on_ground, rollout];
    arena.sequence(ManeuverTag::ArrivalLanding, "", steps)
}

/// Vacate, check in with ground, take the arrival taxi clearance and taxi
/// to the gate. Built deferred because the exit route depends on where the
/// roll-out actually stopped.
fn arrival_taxi_to_gate(
    arena: &mut ManeuverArena,
    id: FlightId,
    plan: &FlightPlan,
    airport: &Rc<Airport>,
) -> ManeuverId {
    let airport = Rc::clone(airport);
    let runway_name = plan.arrival_runway.clone();
    let gate_name = plan.arrival_gate.clone();

    arena.deferred(ManeuverTag::ArrivalTaxi, "taxi in", move |arena, ctx| {
        let end = airport.end_or_err(&runway_name)?.clone();
        let gate = airport.stand_or_err(&gate_name)?.clone();

        info!(
            "{} landed runway {} looking for exit path",
            ctx.call_sign, end.name
        );
        let exit_path = airport
            .taxi_net
            .find_exit_path(&end, gate.location, ctx.aircraft.location());

        let (exit_runway, exit_first_end, exit_name) = match &exit_path {
            Some(path) => {
                let name = format!("{}", path);
                info!(
                    "{} will exit runway {} via {} for gate {}",
                    ctx.call_sign, end.name, name, gate.name
                );
                (
                    arena.taxi_by_path(
                        ManeuverTag::ArrivalTaxi,
                        path,
                        TaxiType::HighSpeed,
                        None,
                    ),
                    // The far end of the turn-off proper, past any leading
                    // roll segment.
                    path.edges
                        .iter()
                        .find(|e| !e.name.is_empty())
                        .or(path.edges.first())
                        .map(|e| e.node2),
                    name,
                )
            }
            None => {
                // Recovery, not an error: no exit ahead of the roll-out
                // point, so place the aircraft at its gate directly.
                warn!(
                    "{} found no exit path from runway {}, teleporting to gate {}",
                    ctx.call_sign, end.name, gate.name
                );
                let gate_for_park = gate.clone();
                (
                    arena.instant_action(move |ctx| {
                        ctx.aircraft.set_location(gate_for_park.location);
                        ctx.aircraft.park(&gate_for_park.name);
                    }),
                    None,
                    String::new(),
                )
            }
        };

        let ground_khz = airport.ground_at(gate.location);
        let flaps_zero = flap_anim(arena, 0.4, 0.0, Duration::from_secs(30));
        let spoilers_down =
            arena.animation("", 1.0, 0.0, Duration::from_secs(1), |ctx, value, _p| {
                ctx.aircraft.set_spoiler_state(value);
            });

        // Radio leg: once the exit turn is behind the nose, check in with
        // ground and read the arrival taxi clearance back.
        let clear_of_runway = arena.await_if(
            ManeuverTag::Unspecified,
            "clear of runway",
            move |ctx: &FlightCtx<'_>| match exit_first_end {
                Some(point) => is_point_behind(ctx, point),
                None => true,
            },
        );
        let check_in = arena.deferred(ManeuverTag::Unspecified, "", {
            let end_name = end.name.clone();
            let exit_name = exit_name.clone();
            move |arena, _ctx| {
                let intent = Intent::pilot(id, IntentBody::ArrivalCheckInWithGround {
                    runway: end_name,
                    exit: exit_name,
                });
                Ok(arena.transmit_intent(intent))
            }
        });
        let taxi_readback = arena.deferred(ManeuverTag::Unspecified, "", move |arena, ctx| {
            ctx.clearances
                .find_or_err(ClearanceKind::ArrivalTaxi, ctx.call_sign)?;
            let intent = Intent::pilot_reply(
                id,
                ctx.last_received_intent_id,
                IntentBody::ArrivalTaxiReadback,
            );
            Ok(arena.transmit_intent(intent))
        });
        let radio_steps = vec![
            clear_of_runway,
            arena.delay(Duration::from_secs(3)),
            arena.tune_com_radio(ground_khz),
            check_in,
            arena.await_clearance(ClearanceKind::ArrivalTaxi),
            taxi_readback,
        ];
        let radio_leg = arena.sequence(ManeuverTag::Unspecified, "", radio_steps);

        // Motion leg: vacate, taxi lights, then the cleared route with
        // crossing hold-shorts honoured.
        let airport_for_hook = Rc::clone(&airport);
        let gate_for_park = gate.clone();
        let cleared_taxi = arena.deferred(ManeuverTag::Unspecified, "", move |arena, ctx| {
            let clearance = ctx
                .clearances
                .find_or_err(ClearanceKind::ArrivalTaxi, ctx.call_sign)?;
            let ClearancePayload::ArrivalTaxi { taxi_path } = &clearance.payload else {
                return Err(SimError::MissingClearance {
                    call_sign: ctx.call_sign.to_string(),
                    kind: ClearanceKind::ArrivalTaxi,
                });
            };
            let path = taxi_path.clone();
            let hook: HoldShortHook = {
                let airport = Rc::clone(&airport_for_hook);
                Rc::new(move |arena: &mut ManeuverArena, edge: &TaxiEdge| {
                    await_cross_runway(arena, id, &airport, edge)
                })
            };
            let taxi =
                arena.taxi_by_path(ManeuverTag::ArrivalTaxi, &path, TaxiType::Normal, Some(hook));
            let park = arena.instant_action(move |ctx| {
                ctx.aircraft.park(&gate_for_park.name);
            });
            Ok(arena.sequence(ManeuverTag::Unspecified, "", vec![taxi, park]))
        });
        let motion_steps = vec![
            exit_runway,
            arena.switch_lights(LightBits::BEACON_TAXI_NAV),
            arena.await_clearance(ClearanceKind::ArrivalTaxi),
            cleared_taxi,
        ];
        let motion_leg = arena.sequence(ManeuverTag::Unspecified, "", motion_steps);

        let vacate_stage = arena.parallel(ManeuverTag::Unspecified, "", vec![
            flaps_zero,
            spoilers_down,
            radio_leg,
            motion_leg,
        ]);

        let steps = vec![
            arena.instant_action(|ctx| ctx.aircraft.set_ground_speed_kt(0.0)),
            vacate_stage,
            arena.delay(Duration::from_secs(5)),
            arena.switch_lights(LightBits::NONE),
        ];
        Ok(arena.sequence(ManeuverTag::ArrivalTaxi, "", steps))
    })
}
