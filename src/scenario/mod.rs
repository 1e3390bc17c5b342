//! # Scenario Module - Fleet Generation and Batch Runs
//!
//! A scenario is a reproducible traffic sample: a tagged list of flight
//! specs drawn from a seeded RNG. Generation is stage one of the pipeline;
//! stage two replays scenarios through the deterministic traffic loop and
//! reduces each run to a [`ScenarioReport`]. Independent scenarios fan out
//! across a rayon pool; each simulation itself stays single-threaded.
//!
//! ## Submodules
//!
//! - [`tests`]: Unit tests for seeded generation and scenario replay

pub mod tests;

use crate::airport::Airport;
use crate::clock::SimTime;
use crate::controller::{ControllerConfig, DeskController};
use crate::flight::{FlightKind, FlightPlan};
use crate::sim::{SimParams, TrafficSim};
use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal, Uniform};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Knobs for scenario generation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScenarioParams {
    pub departures: usize,
    pub arrivals: usize,
    /// Base RNG seed; each scenario id offsets it
    pub seed: u64,
    /// Nominal spacing between consecutive departures, seconds
    pub departure_spacing_secs: u64,
    /// Standard deviation of the spacing jitter, seconds
    pub spacing_jitter_secs: f64,
    /// Distance from the threshold at which the first arrival spawns
    pub arrival_final_distance_m: f64,
    pub arrival_altitude_ft: f64,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        ScenarioParams {
            departures: 2,
            arrivals: 1,
            seed: 7,
            departure_spacing_secs: 240,
            spacing_jitter_secs: 20.0,
            arrival_final_distance_m: 10_500.0,
            arrival_altitude_ft: 2500.0,
        }
    }
}

/// One flight in a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightSpec {
    pub call_sign: String,
    pub kind: FlightKind,
    pub gate: String,
    pub runway: String,
    /// Departure: planned off-block offset. Arrival: how far down the
    /// stream of inbound traffic this flight is, in seconds behind the
    /// first.
    pub offset_secs: u64,
}

/// A reproducible traffic sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub id: usize,
    pub tag: String,
    pub params: ScenarioParams,
    pub flights: Vec<FlightSpec>,
    pub created_at: u64,
}

/// Outcome of one flight in a replayed scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightOutcome {
    pub call_sign: String,
    pub kind: FlightKind,
    pub completed: bool,
    pub failed: bool,
    pub airborne: bool,
    pub parked_at: Option<String>,
}

/// Reduction of one scenario run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub scenario_id: usize,
    pub tag: String,
    pub total_steps: u64,
    pub transmissions: usize,
    pub completed: usize,
    pub failed: usize,
    pub stalled: usize,
    pub flights: Vec<FlightOutcome>,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Generates one scenario from the seeded RNG.
///
/// Departures cycle through the airport's stands; offsets follow the
/// nominal spacing with normal jitter, clamped non-negative. The same
/// (params, id) pair always yields the same scenario.
pub fn generate(airport: &Airport, id: usize, tag: &str, params: ScenarioParams) -> Scenario {
    let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(id as u64));
    let jitter = Normal::new(0.0, params.spacing_jitter_secs.max(0.01))
        .expect("jitter sigma is positive");
    let runway = airport.runways[0].end1.name.clone();
    let stand_pick = Uniform::new(0, airport.stands.len()).expect("airport has stands");

    let mut flights = Vec::with_capacity(params.departures + params.arrivals);
    for i in 0..params.departures {
        let nominal = (i as u64) * params.departure_spacing_secs;
        let offset = (nominal as f64 + jitter.sample(&mut rng)).max(0.0) as u64;
        flights.push(FlightSpec {
            call_sign: format!("SKY{}", 100 + i),
            kind: FlightKind::Departure,
            gate: airport.stands[stand_pick.sample(&mut rng)].name.clone(),
            runway: runway.clone(),
            offset_secs: offset,
        });
    }
    for i in 0..params.arrivals {
        let nominal = (i as u64) * params.departure_spacing_secs;
        let offset = (nominal as f64 + jitter.sample(&mut rng)).max(0.0) as u64;
        flights.push(FlightSpec {
            call_sign: format!("SKY{}", 500 + i),
            kind: FlightKind::Arrival,
            gate: airport.stands[stand_pick.sample(&mut rng)].name.clone(),
            runway: runway.clone(),
            offset_secs: offset,
        });
    }

    Scenario {
        id,
        tag: tag.to_string(),
        params,
        flights,
        created_at: unix_now(),
    }
}

/// Replays one scenario through the traffic loop and reduces it.
///
/// Arrivals are staged onto the final approach by converting their offset
/// into extra spawn distance, so later inbounds are simply further out.
pub fn run_scenario(airport: &Airport, scenario: &Scenario, sim_params: SimParams) -> ScenarioReport {
    let airport = Rc::new(airport.clone());
    let runway = scenario
        .flights
        .first()
        .map(|f| f.runway.clone())
        .unwrap_or_else(|| airport.runways[0].end1.name.clone());
    let desk = DeskController::new(Rc::clone(&airport), &runway, ControllerConfig::default());
    let mut sim = TrafficSim::new(Rc::clone(&airport), sim_params).with_controller(desk);

    for spec in &scenario.flights {
        let plan = FlightPlan {
            departure_icao: airport.icao.clone(),
            arrival_icao: airport.icao.clone(),
            departure_runway: spec.runway.clone(),
            arrival_runway: spec.runway.clone(),
            departure_gate: spec.gate.clone(),
            arrival_gate: spec.gate.clone(),
            departure_time: SimTime::ZERO + Duration::from_secs(spec.offset_secs),
        };
        let added = match spec.kind {
            FlightKind::Departure => sim.add_departure(&spec.call_sign, plan),
            FlightKind::Arrival => {
                // 75 m/s of final approach per second of offset.
                let distance =
                    scenario.params.arrival_final_distance_m + spec.offset_secs as f64 * 75.0;
                sim.add_arrival(
                    &spec.call_sign,
                    plan,
                    distance,
                    scenario.params.arrival_altitude_ft,
                )
            }
        };
        if let Err(err) = added {
            info!("{} skipped: {}", spec.call_sign, err);
        }
    }

    sim.run();

    let flights: Vec<FlightOutcome> = sim
        .flights()
        .iter()
        .map(|f| FlightOutcome {
            call_sign: f.call_sign.clone(),
            kind: f.kind,
            completed: f.is_complete(),
            failed: f.failure().is_some(),
            airborne: f.aircraft.altitude().is_airborne(),
            parked_at: f.aircraft.parked_at().map(str::to_string),
        })
        .collect();

    let completed = flights.iter().filter(|f| f.completed).count();
    let failed = flights.iter().filter(|f| f.failed).count();
    ScenarioReport {
        scenario_id: scenario.id,
        tag: scenario.tag.clone(),
        total_steps: sim.step_count(),
        transmissions: sim.radio().transcript().len(),
        completed,
        failed,
        stalled: flights.len() - completed - failed,
        flights,
    }
}

/// Replays independent scenarios across the rayon pool.
pub fn run_batch(
    airport: &Airport,
    scenarios: &[Scenario],
    sim_params: SimParams,
) -> Vec<ScenarioReport> {
    scenarios
        .par_iter()
        .map(|scenario| run_scenario(airport, scenario, sim_params))
        .collect()
}
