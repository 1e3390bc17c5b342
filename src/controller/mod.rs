//! # Controller Module - Deterministic Clearance Desk
//!
//! A scripted stand-in for the controller side of the radio. Real
//! controller decision-making is outside this crate's scope; what the
//! traffic loop needs is a deterministic counterpart that answers pilot
//! calls after a fixed reply delay and serialises use of the single active
//! runway. The runway mutex here reproduces the sequencing the original
//! multi-actor fixtures exercise: one occupant at a time, FIFO among
//! waiting line-ups, crossings and landings.
//!
//! Every reply goes out on the frequency the request arrived on, so the
//! desk behaves like whichever position (delivery, ground or tower) the
//! pilot called.
//!
//! ## Submodules
//!
//! - [`tests`]: Unit tests for reply scheduling and the mutex

pub mod tests;

use crate::airport::{Airport, Runway};
use crate::aircraft::AltitudeKind;
use crate::clock::SimTime;
use crate::comms::{Intent, IntentBody, RadioNet, Transmission};
use crate::flight::{Clearance, ClearancePayload, Flight, FlightId};
use crate::geo::{self, GeoPoint};
use log::{debug, warn};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

/// Tuning knobs for the desk.
#[derive(Debug, Clone, Copy)]
pub struct ControllerConfig {
    /// Think time between hearing a call and keying the reply
    pub reply_delay: Duration,
    /// How long a granted crossing keeps the runway
    pub cross_duration: Duration,
    /// Heading issued with IFR and takeoff clearances
    pub initial_heading: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            reply_delay: Duration::from_secs(2),
            cross_duration: Duration::from_secs(45),
            initial_heading: 210.0,
        }
    }
}

/// Who holds the runway right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Occupant {
    /// Lined up or rolling; released once airborne
    Departure(FlightId),
    /// Crossing traffic; released on a timer
    Crossing(FlightId, SimTime),
    /// Cleared to land; released once down and clear of the strip
    Landing(FlightId),
}

/// A queued request for the runway, FIFO.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RunwayRequest {
    Cross { flight: FlightId, khz: u32 },
    Lineup { flight: FlightId, khz: u32 },
    Landing { flight: FlightId, khz: u32 },
}

/// A reply not yet due. Payloads that depend on live aircraft state are
/// computed at fire time, not at schedule time.
enum ReplyJob {
    Fixed { khz: u32, intent: Intent },
    PushApproval { flight: FlightId, khz: u32 },
    DepartureTaxi { flight: FlightId, khz: u32 },
    ArrivalTaxi { flight: FlightId, khz: u32 },
}

struct Pending {
    due: SimTime,
    job: ReplyJob,
}

/// The deterministic clearance desk plus runway mutex.
pub struct DeskController {
    airport: Rc<Airport>,
    config: ControllerConfig,
    active_runway: String,
    pending: Vec<Pending>,
    occupant: Option<Occupant>,
    queue: VecDeque<RunwayRequest>,
}

impl DeskController {
    pub fn new(airport: Rc<Airport>, active_runway: &str, config: ControllerConfig) -> Self {
        DeskController {
            airport,
            config,
            active_runway: active_runway.to_string(),
            pending: Vec::new(),
            occupant: None,
            queue: VecDeque::new(),
        }
    }

    /// Feeds one pilot transmission into the desk.
    pub fn observe(&mut self, now: SimTime, tx: &Transmission) {
        let flight = tx.intent.subject;
        let khz = tx.khz;
        let due = now + self.config.reply_delay;

        match &tx.intent.body {
            IntentBody::IfrRequest => {
                let clearance = Clearance::new(flight, ClearancePayload::Ifr {
                    initial_heading: self.config.initial_heading,
                });
                self.push_fixed(due, khz, Intent::controller(flight, IntentBody::IfrClearanceReply {
                    clearance,
                }));
            }
            IntentBody::IfrReadback => {
                self.push_fixed(
                    due,
                    khz,
                    Intent::controller(flight, IntentBody::IfrReadbackCorrect),
                );
            }
            IntentBody::PushAndStartRequest => {
                self.pending.push(Pending {
                    due,
                    job: ReplyJob::PushApproval { flight, khz },
                });
            }
            IntentBody::DepartureTaxiRequest => {
                self.pending.push(Pending {
                    due,
                    job: ReplyJob::DepartureTaxi { flight, khz },
                });
            }
            IntentBody::ReportHoldingShort { edge, .. } => {
                if self.is_lineup_boundary(edge) {
                    // Ground's answer to a departure at the runway entry is
                    // the tower handoff; line-up comes after check-in.
                    self.push_fixed(
                        due,
                        khz,
                        Intent::controller(flight, IntentBody::SwitchToTower {
                            tower_khz: self.airport.tower_khz(),
                        }),
                    );
                } else {
                    self.queue.push_back(RunwayRequest::Cross { flight, khz });
                }
            }
            IntentBody::CheckInWithTower { .. } => {
                self.queue.push_back(RunwayRequest::Lineup { flight, khz });
            }
            IntentBody::LineUpReadback { .. } => {
                // Already lined up under our reservation; takeoff clearance
                // follows after the think time.
                let clearance = Clearance::new(flight, ClearancePayload::Takeoff {
                    runway: self.active_runway.clone(),
                    initial_heading: self.config.initial_heading,
                    departure_khz: self.airport.frequencies.departure_khz,
                });
                self.push_fixed(
                    due,
                    khz,
                    Intent::controller(flight, IntentBody::ClearedForTakeoff { clearance }),
                );
            }
            IntentBody::ReportFinal { .. } => {
                self.queue.push_back(RunwayRequest::Landing { flight, khz });
            }
            IntentBody::ArrivalCheckInWithGround { .. } => {
                self.pending.push(Pending {
                    due,
                    job: ReplyJob::ArrivalTaxi { flight, khz },
                });
            }
            _ => {}
        }
    }

    /// Fires due replies, updates runway occupancy and grants the next
    /// queued request when the runway is free. Called once per tick.
    pub fn poll(&mut self, now: SimTime, flights: &[Flight], radio: &mut RadioNet) {
        self.fire_due_replies(now, flights, radio);
        self.release_runway_if_clear(now, flights);
        self.grant_next_request(now, flights, radio);
    }

    fn push_fixed(&mut self, due: SimTime, khz: u32, intent: Intent) {
        self.pending.push(Pending {
            due,
            job: ReplyJob::Fixed { khz, intent },
        });
    }

    fn is_lineup_boundary(&self, edge_name: &str) -> bool {
        let Ok(runway) = self.airport.runway_with_end(&self.active_runway) else {
            return false;
        };
        self.airport
            .taxi_net
            .edges
            .iter()
            .any(|e| e.name == edge_name && e.active_zones.departure.has(runway))
    }

    fn find_flight<'a>(flights: &'a [Flight], id: FlightId) -> Option<&'a Flight> {
        flights.iter().find(|f| f.id == id)
    }

    fn fire_due_replies(&mut self, now: SimTime, flights: &[Flight], radio: &mut RadioNet) {
        let due: Vec<Pending> = {
            let mut rest = Vec::new();
            let mut ready = Vec::new();
            for pending in self.pending.drain(..) {
                if pending.due <= now {
                    ready.push(pending);
                } else {
                    rest.push(pending);
                }
            }
            self.pending = rest;
            ready
        };

        for pending in due {
            match pending.job {
                ReplyJob::Fixed { khz, intent } => {
                    radio.transmit(khz, intent, now);
                }
                ReplyJob::PushApproval { flight, khz } => {
                    if let Some(intent) = self.build_push_approval(flights, flight) {
                        radio.transmit(khz, intent, now);
                    }
                }
                ReplyJob::DepartureTaxi { flight, khz } => {
                    if let Some(intent) = self.build_departure_taxi(flights, flight) {
                        radio.transmit(khz, intent, now);
                    }
                }
                ReplyJob::ArrivalTaxi { flight, khz } => {
                    if let Some(intent) = self.build_arrival_taxi(flights, flight) {
                        radio.transmit(khz, intent, now);
                    }
                }
            }
        }
    }

    /// Pushback straight back from the stand onto the stand's link node.
    fn build_push_approval(&self, flights: &[Flight], id: FlightId) -> Option<Intent> {
        let flight = Self::find_flight(flights, id)?;
        let here = flight.aircraft.location();
        let link = self.nearest_link_node(here)?;
        let clearance = Clearance::new(id, ClearancePayload::PushAndStart {
            pushback_path: vec![here, link],
        });
        Some(Intent::controller(id, IntentBody::PushAndStartApproval {
            approval: clearance,
        }))
    }

    /// The far endpoint of the taxi edge serving this position.
    fn nearest_link_node(&self, here: GeoPoint) -> Option<GeoPoint> {
        self.airport
            .taxi_net
            .edges
            .iter()
            .filter_map(|edge| {
                if geo::distance_metres(edge.node1, here) < 20.0 {
                    Some((geo::distance_metres(edge.node1, here), edge.node2))
                } else if geo::distance_metres(edge.node2, here) < 20.0 {
                    Some((geo::distance_metres(edge.node2, here), edge.node1))
                } else {
                    None
                }
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, node)| node)
    }

    /// The runway-entry boundary edge for the active runway.
    fn lineup_edge(&self) -> Option<&crate::airport::TaxiEdge> {
        let runway = self.airport.runway_with_end(&self.active_runway).ok()?;
        self.airport
            .taxi_net
            .edges
            .iter()
            .find(|e| e.active_zones.departure.has(runway))
    }

    fn build_departure_taxi(&self, flights: &[Flight], id: FlightId) -> Option<Intent> {
        let flight = Self::find_flight(flights, id)?;
        let entry = self.lineup_edge()?.node2;
        let path = self
            .airport
            .taxi_net
            .find_path(flight.aircraft.location(), entry)?;
        debug!("taxi clearance for {}: {}", flight.call_sign, path);

        let clearance = Clearance::new(id, ClearancePayload::DepartureTaxi {
            taxi_path: path,
            departure_runway: self.active_runway.clone(),
        });
        Some(Intent::controller(id, IntentBody::DepartureTaxiReply {
            clearance,
        }))
    }

    fn build_arrival_taxi(&self, flights: &[Flight], id: FlightId) -> Option<Intent> {
        let flight = Self::find_flight(flights, id)?;
        let gate = self
            .airport
            .stand_or_err(&flight.plan.arrival_gate)
            .ok()?
            .location;
        let path = self
            .airport
            .taxi_net
            .find_path(flight.aircraft.location(), gate)?;

        let clearance = Clearance::new(id, ClearancePayload::ArrivalTaxi { taxi_path: path });
        Some(Intent::controller(id, IntentBody::ArrivalTaxiReply {
            clearance,
        }))
    }

    fn runway(&self) -> Option<&Runway> {
        self.airport.runway_with_end(&self.active_runway).ok()
    }

    fn release_runway_if_clear(&mut self, now: SimTime, flights: &[Flight]) {
        let Some(occupant) = self.occupant else {
            return;
        };
        let released = match occupant {
            Occupant::Departure(id) => Self::find_flight(flights, id)
                .map(|f| f.aircraft.altitude().is_airborne())
                .unwrap_or(true),
            Occupant::Crossing(_, until) => now >= until,
            Occupant::Landing(id) => match (Self::find_flight(flights, id), self.runway()) {
                (Some(flight), Some(runway)) => {
                    let end = runway.end_named(&self.active_runway).unwrap_or(&runway.end1);
                    flight.aircraft.altitude().kind == AltitudeKind::Ground
                        && Runway::cross_track_m(end, flight.aircraft.location()) > 50.0
                }
                _ => true,
            },
        };
        if released {
            debug!("runway {} released by {:?}", self.active_runway, occupant);
            self.occupant = None;
        }
    }

    fn grant_next_request(&mut self, now: SimTime, flights: &[Flight], radio: &mut RadioNet) {
        if self.occupant.is_some() {
            return;
        }
        let Some(request) = self.queue.pop_front() else {
            return;
        };

        match request {
            RunwayRequest::Cross { flight, khz } => {
                let clearance = Clearance::new(flight, ClearancePayload::RunwayCross {
                    runway: self.active_runway.clone(),
                });
                radio.transmit(
                    khz,
                    Intent::controller(flight, IntentBody::RunwayCrossClearance { clearance }),
                    now,
                );
                self.occupant = Some(Occupant::Crossing(flight, now + self.config.cross_duration));
            }
            RunwayRequest::Lineup { flight, khz } => {
                let clearance = Clearance::new(flight, ClearancePayload::Lineup {
                    runway: self.active_runway.clone(),
                });
                radio.transmit(
                    khz,
                    Intent::controller(flight, IntentBody::LineUpApproval {
                        approval: clearance,
                    }),
                    now,
                );
                self.occupant = Some(Occupant::Departure(flight));
            }
            RunwayRequest::Landing { flight, khz } => {
                let clearance = Clearance::new(flight, ClearancePayload::Landing {
                    runway: self.active_runway.clone(),
                    ground_khz: self.airport.frequencies.ground_khz,
                });
                radio.transmit(
                    khz,
                    Intent::controller(flight, IntentBody::ClearedForLanding { clearance }),
                    now,
                );
                self.occupant = Some(Occupant::Landing(flight));
            }
        }

        if self.occupant.is_some() && !self.queue.is_empty() {
            debug!(
                "runway {} granted, {} request(s) still holding",
                self.active_runway,
                self.queue.len()
            );
        }
    }

    /// Requests still waiting for the runway.
    pub fn holding_count(&self) -> usize {
        self.queue.len()
    }

    /// True while some flight holds the runway.
    pub fn runway_busy(&self) -> bool {
        self.occupant.is_some()
    }

    /// Drops state tied to a flight that no longer exists. Keeps a crashed
    /// or completed flight from wedging the mutex forever.
    pub fn forget_flight(&mut self, id: FlightId) {
        if matches!(
            self.occupant,
            Some(Occupant::Departure(f) | Occupant::Crossing(f, _) | Occupant::Landing(f)) if f == id
        ) {
            warn!("runway {} occupant {} vanished", self.active_runway, id);
            self.occupant = None;
        }
        self.queue.retain(|r| {
            !matches!(
                r,
                RunwayRequest::Cross { flight, .. }
                | RunwayRequest::Lineup { flight, .. }
                | RunwayRequest::Landing { flight, .. } if *flight == id
            )
        });
    }
}
