//! # Sim Module - The Traffic Advance Loop
//!
//! Owns the clock, the fleet, the radio net and the optional controller
//! desk, and advances the whole world by discrete ticks. Each tick:
//!
//! 1. Transmissions queued on the previous tick are delivered: controller
//!    calls go to every flight tuned to the frequency, pilot calls go to
//!    the desk. This gives radio traffic its one-tick propagation delay.
//! 2. The desk fires due replies and works the runway mutex.
//! 3. Each aircraft integrates its accumulating parameters.
//! 4. Each flight pushes the tick timestamp through its maneuver root.
//!
//! Everything is single-threaded and deterministic; the only concurrency
//! in the crate is between independent simulations in a batch run. A
//! snapshot of the fleet is sent over an optional channel every
//! `frame_interval` ticks, and a disconnected receiver never stalls the
//! loop.
//!
//! ## Submodules
//!
//! - [`tests`]: End-to-end departure and arrival cycles on the demo field


use crate::aircraft::{Aircraft, Altitude};
use crate::airport::Airport;
use crate::clock::{SimClock, SimTime};
use crate::comms::{Direction, RadioNet};
use crate::controller::DeskController;
use crate::error::SimError;
use crate::flight::{Flight, FlightId, FlightKind, FlightPlan};
use crate::geo::GeoPoint;
use crate::pilot;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use std::sync::mpsc;
use std::time::Duration;

/// Loop configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SimParams {
    /// Tick size in milliseconds
    pub tick_millis: u64,
    /// Maximum number of ticks to run
    pub iterations: usize,
    /// Snapshot every N ticks
    pub frame_interval: usize,
}

impl Default for SimParams {
    fn default() -> Self {
        SimParams {
            tick_millis: 1000,
            iterations: 1200,
            frame_interval: 5,
        }
    }
}

/// Per-flight state captured in a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightState {
    pub call_sign: String,
    pub location: GeoPoint,
    pub altitude: Altitude,
    pub heading: f64,
    pub ground_speed_kt: f64,
    pub status: String,
    pub parked_at: Option<String>,
    pub failed: bool,
}

/// A consistent view of the whole fleet at one tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub step: u64,
    pub timestamp: SimTime,
    pub flights: Vec<FlightState>,
}

/// The world: clock, fleet, radio and desk.
pub struct TrafficSim {
    clock: SimClock,
    params: SimParams,
    airport: Rc<Airport>,
    flights: Vec<Flight>,
    radio: RadioNet,
    controller: Option<DeskController>,
    frame_sender: Option<mpsc::Sender<SimSnapshot>>,
    next_flight_id: u32,
}

impl TrafficSim {
    pub fn new(airport: Rc<Airport>, params: SimParams) -> Self {
        TrafficSim {
            clock: SimClock::new(Duration::from_millis(params.tick_millis)),
            params,
            airport,
            flights: Vec::new(),
            radio: RadioNet::new(),
            controller: None,
            frame_sender: None,
            next_flight_id: 1,
        }
    }

    /// Attaches the clearance desk. Without one, pilots wait forever on
    /// their first clearance; that is occasionally what a test wants.
    pub fn with_controller(mut self, controller: DeskController) -> Self {
        self.controller = Some(controller);
        self
    }

    /// Attaches a snapshot consumer.
    pub fn with_frame_sender(mut self, tx: mpsc::Sender<SimSnapshot>) -> Self {
        self.frame_sender = Some(tx);
        self
    }

    pub fn airport(&self) -> &Rc<Airport> {
        &self.airport
    }

    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    pub fn step_count(&self) -> u64 {
        self.clock.step_count()
    }

    pub fn flights(&self) -> &[Flight] {
        &self.flights
    }

    pub fn radio(&self) -> &RadioNet {
        &self.radio
    }

    fn allocate_id(&mut self) -> FlightId {
        let id = FlightId(self.next_flight_id);
        self.next_flight_id += 1;
        id
    }

    /// Adds a departure standing at its gate with the full flight cycle
    /// installed.
    pub fn add_departure(&mut self, call_sign: &str, plan: FlightPlan) -> Result<FlightId, SimError> {
        let gate = self.airport.stand_or_err(&plan.departure_gate)?.location;
        let id = self.allocate_id();
        let mut flight = Flight::new(id, call_sign, FlightKind::Departure, plan, Aircraft::at_gate(gate));
        pilot::install_departure(&mut flight, &self.airport)?;
        info!("{} spawned at gate {}", call_sign, flight.plan.departure_gate);
        self.flights.push(flight);
        Ok(id)
    }

    /// Adds an arrival established on final, `final_distance_m` out from
    /// the threshold at `feet_agl`, descending.
    pub fn add_arrival(
        &mut self,
        call_sign: &str,
        plan: FlightPlan,
        final_distance_m: f64,
        feet_agl: f64,
    ) -> Result<FlightId, SimError> {
        let end = self.airport.end_or_err(&plan.arrival_runway)?;
        let reciprocal = crate::geo::normalize_heading(end.heading + 180.0);
        let spawn = crate::geo::point_at_distance(end.threshold, reciprocal, final_distance_m);
        let mut aircraft = Aircraft::on_final(spawn, end.heading, feet_agl, 145.0);
        aircraft.set_vertical_speed_fpm(-1000.0);

        let id = self.allocate_id();
        let mut flight = Flight::new(id, call_sign, FlightKind::Arrival, plan, aircraft);
        pilot::install_arrival(&mut flight, &self.airport)?;
        info!("{} spawned on final, {:.0} m out", call_sign, final_distance_m);
        self.flights.push(flight);
        Ok(id)
    }

    /// True when nothing remains to advance.
    pub fn is_idle(&self) -> bool {
        self.radio.pending_count() == 0 && self.flights.iter().all(|f| !f.is_active())
    }

    /// One tick of the world at the current clock time.
    pub fn tick(&mut self) {
        let t = self.clock.now();

        // Deliver last tick's radio traffic.
        for tx in self.radio.take_queued() {
            match tx.intent.direction {
                Direction::ControllerToPilot => {
                    for flight in self.flights.iter_mut() {
                        if flight.aircraft.frequency_khz() == tx.khz {
                            pilot::handle_transmission(flight, &tx.intent);
                        }
                    }
                }
                Direction::PilotToController => {
                    if let Some(controller) = self.controller.as_mut() {
                        controller.observe(t, &tx);
                    }
                }
            }
        }

        if let Some(controller) = self.controller.as_mut() {
            controller.poll(t, &self.flights, &mut self.radio);
        }

        for flight in self.flights.iter_mut() {
            flight.aircraft.integrate_to(t);
        }

        let radio = &mut self.radio;
        let mut failed: Vec<FlightId> = Vec::new();
        for flight in self.flights.iter_mut() {
            let had_failure = flight.failure().is_some();
            flight.advance(t, radio);
            if !had_failure && flight.failure().is_some() {
                failed.push(flight.id);
            }
        }
        for id in failed {
            warn!("flight {} failed, clearing controller state", id);
            if let Some(controller) = self.controller.as_mut() {
                controller.forget_flight(id);
            }
        }

        if self.clock.step_count() % self.params.frame_interval as u64 == 0 {
            self.send_frame();
        }

        self.clock.advance();
    }

    /// Runs until the iteration limit or until the world goes idle.
    pub fn run(&mut self) {
        for _ in 0..self.params.iterations {
            self.tick();
            if self.is_idle() {
                info!("world idle after {} ticks", self.clock.step_count());
                break;
            }
        }
    }

    /// A fleet snapshot at the current instant.
    pub fn snapshot(&self) -> SimSnapshot {
        SimSnapshot {
            step: self.clock.step_count(),
            timestamp: self.clock.now(),
            flights: self
                .flights
                .iter()
                .map(|f| FlightState {
                    call_sign: f.call_sign.clone(),
                    location: f.aircraft.location(),
                    altitude: f.aircraft.altitude(),
                    heading: f.aircraft.attitude().heading,
                    ground_speed_kt: f.aircraft.ground_speed_kt(),
                    status: f.status_string(),
                    parked_at: f.aircraft.parked_at().map(str::to_string),
                    failed: f.failure().is_some(),
                })
                .collect(),
        }
    }

    fn send_frame(&self) {
        if let Some(sender) = &self.frame_sender {
            // A gone receiver is not an error; the loop never blocks on io.
            if sender.send(self.snapshot()).is_err() {
                warn!("snapshot receiver disconnected");
            }
        }
    }
}
