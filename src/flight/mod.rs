//! # Flight Module - Flight Records and Clearances
//!
//! One [`Flight`] per aircraft in the simulation: its plan, its aircraft
//! actuator state, its clearance store and its maneuver tree. The flight is
//! the unit of advancement; the traffic loop calls [`Flight::advance`] once
//! per tick and the flight pushes the timestamp through its root maneuver.
//!
//! The [`ClearanceStore`] is the append-only set pilot scripts await on.
//! Readers see a monotone view: records are never removed, only appended or
//! marked. What happens when the same clearance kind arrives twice is a
//! configuration point ([`DuplicatePolicy`]); by default the store
//! accumulates, which matches how the radio actually behaves.
//!
//! [`FlightCtx`] is the service view handed to every maneuver closure:
//! an explicit flight handle plus mutable access to the actuators, the
//! store, the pilot's cached frequencies and the radio. Maneuvers never
//! capture any of this; it arrives as an argument on every tick.
//!
//! ## Submodules
//!
//! - [`tests`]: Unit tests for the clearance store and flight lifecycle


use crate::aircraft::Aircraft;
use crate::clock::SimTime;
use crate::airport::TaxiPath;
use crate::comms::{Intent, RadioNet};
use crate::error::SimError;
use crate::geo::GeoPoint;
use crate::maneuver::{ManeuverArena, ManeuverId, ManeuverState};
use log::error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque flight handle used by callbacks and intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlightId(pub u32);

impl fmt::Display for FlightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Whether this flight starts at a gate or on final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlightKind {
    Departure,
    Arrival,
}

/// The filed plan, reduced to what the scripts consult.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightPlan {
    pub departure_icao: String,
    pub arrival_icao: String,
    pub departure_runway: String,
    pub arrival_runway: String,
    pub departure_gate: String,
    pub arrival_gate: String,
    /// Planned off-block time
    pub departure_time: SimTime,
}

/// Kinds of controller authorisation a pilot can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClearanceKind {
    Ifr,
    PushAndStart,
    DepartureTaxi,
    RunwayCross,
    Lineup,
    Takeoff,
    Landing,
    ArrivalTaxi,
}

/// Clearance payloads, one variant per kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClearancePayload {
    Ifr {
        initial_heading: f64,
    },
    PushAndStart {
        pushback_path: Vec<GeoPoint>,
    },
    DepartureTaxi {
        taxi_path: TaxiPath,
        departure_runway: String,
    },
    RunwayCross {
        runway: String,
    },
    Lineup {
        runway: String,
    },
    Takeoff {
        runway: String,
        initial_heading: f64,
        departure_khz: u32,
    },
    Landing {
        runway: String,
        ground_khz: u32,
    },
    ArrivalTaxi {
        taxi_path: TaxiPath,
    },
}

impl ClearancePayload {
    pub fn kind(&self) -> ClearanceKind {
        match self {
            ClearancePayload::Ifr { .. } => ClearanceKind::Ifr,
            ClearancePayload::PushAndStart { .. } => ClearanceKind::PushAndStart,
            ClearancePayload::DepartureTaxi { .. } => ClearanceKind::DepartureTaxi,
            ClearancePayload::RunwayCross { .. } => ClearanceKind::RunwayCross,
            ClearancePayload::Lineup { .. } => ClearanceKind::Lineup,
            ClearancePayload::Takeoff { .. } => ClearanceKind::Takeoff,
            ClearancePayload::Landing { .. } => ClearanceKind::Landing,
            ClearancePayload::ArrivalTaxi { .. } => ClearanceKind::ArrivalTaxi,
        }
    }
}

/// A controller-issued authorisation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clearance {
    pub issued_to: FlightId,
    pub payload: ClearancePayload,
    /// Set once the controller confirms the pilot's read-back
    pub readback_correct: bool,
}

impl Clearance {
    pub fn new(issued_to: FlightId, payload: ClearancePayload) -> Self {
        Clearance {
            issued_to,
            payload,
            readback_correct: false,
        }
    }

    pub fn kind(&self) -> ClearanceKind {
        self.payload.kind()
    }
}

/// What to do when a clearance of an already-present kind arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DuplicatePolicy {
    /// Keep every record, newest wins on lookup. This is what the source
    /// radio traffic actually produces.
    #[default]
    Accumulate,
    /// Replace the newest unconsumed record of the same kind.
    Overwrite,
}

#[derive(Debug, Clone)]
struct StoredClearance {
    clearance: Clearance,
    consumed: bool,
}

/// Append-only per-flight clearance set.
#[derive(Debug, Default)]
pub struct ClearanceStore {
    records: Vec<StoredClearance>,
    policy: DuplicatePolicy,
}

impl ClearanceStore {
    pub fn new(policy: DuplicatePolicy) -> Self {
        ClearanceStore {
            records: Vec::new(),
            policy,
        }
    }

    pub fn add(&mut self, clearance: Clearance) {
        if self.policy == DuplicatePolicy::Overwrite {
            let kind = clearance.kind();
            if let Some(existing) = self
                .records
                .iter_mut()
                .rev()
                .find(|r| !r.consumed && r.clearance.kind() == kind)
            {
                existing.clearance = clearance;
                return;
            }
        }
        self.records.push(StoredClearance {
            clearance,
            consumed: false,
        });
    }

    /// The predicate behind `await_clearance`.
    pub fn has_unconsumed(&self, kind: ClearanceKind) -> bool {
        self.records
            .iter()
            .any(|r| !r.consumed && r.clearance.kind() == kind)
    }

    /// Newest unconsumed clearance of `kind`.
    pub fn find(&self, kind: ClearanceKind) -> Option<&Clearance> {
        self.records
            .iter()
            .rev()
            .find(|r| !r.consumed && r.clearance.kind() == kind)
            .map(|r| &r.clearance)
    }

    /// Lookup that treats absence as a script-ordering bug. Deferred bodies
    /// use this after an `await_clearance` earlier in the sequence.
    pub fn find_or_err(&self, kind: ClearanceKind, call_sign: &str) -> Result<&Clearance, SimError> {
        self.find(kind).ok_or_else(|| SimError::MissingClearance {
            call_sign: call_sign.to_string(),
            kind,
        })
    }

    /// Marks the newest unconsumed record of `kind` as consumed.
    pub fn consume(&mut self, kind: ClearanceKind) {
        if let Some(record) = self
            .records
            .iter_mut()
            .rev()
            .find(|r| !r.consumed && r.clearance.kind() == kind)
        {
            record.consumed = true;
        }
    }

    /// Records a readback-correct confirmation on the newest record of
    /// `kind`.
    pub fn mark_readback_correct(&mut self, kind: ClearanceKind) {
        if let Some(record) = self
            .records
            .iter_mut()
            .rev()
            .find(|r| r.clearance.kind() == kind)
        {
            record.clearance.readback_correct = true;
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Frequencies the comm receiver caches for later phases.
#[derive(Debug, Default, Clone, Copy)]
pub struct PilotCaches {
    pub departure_tower_khz: u32,
    pub departure_khz: u32,
    pub arrival_ground_khz: u32,
}

/// The service view every maneuver closure receives.
///
/// Holds disjoint mutable borrows of the flight's own state plus the shared
/// radio net. Rebuilt each tick, so `now` is always the tick timestamp.
pub struct FlightCtx<'a> {
    pub flight_id: FlightId,
    pub call_sign: &'a str,
    pub now: SimTime,
    pub last_received_intent_id: u64,
    pub aircraft: &'a mut Aircraft,
    pub clearances: &'a mut ClearanceStore,
    pub caches: &'a mut PilotCaches,
    pub radio: &'a mut RadioNet,
}

impl FlightCtx<'_> {
    /// Sends `intent` on the currently tuned COM frequency.
    pub fn transmit(&mut self, intent: Intent) -> u64 {
        let khz = self.aircraft.frequency_khz();
        self.radio.transmit(khz, intent, self.now)
    }
}

/// A flight: identity, plan, aircraft, clearances and the maneuver tree.
pub struct Flight {
    pub id: FlightId,
    pub call_sign: String,
    pub kind: FlightKind,
    pub plan: FlightPlan,
    pub aircraft: Aircraft,
    pub clearances: ClearanceStore,
    pub caches: PilotCaches,
    pub last_received_intent_id: u64,
    arena: ManeuverArena,
    root: Option<ManeuverId>,
    failure: Option<SimError>,
}

impl Flight {
    pub fn new(
        id: FlightId,
        call_sign: &str,
        kind: FlightKind,
        plan: FlightPlan,
        aircraft: Aircraft,
    ) -> Self {
        Flight {
            id,
            call_sign: call_sign.to_string(),
            kind,
            plan,
            aircraft,
            clearances: ClearanceStore::default(),
            caches: PilotCaches::default(),
            last_received_intent_id: 0,
            arena: ManeuverArena::new(),
            root: None,
            failure: None,
        }
    }

    /// Builds and installs the root maneuver tree.
    pub fn install_root(&mut self, build: impl FnOnce(&mut ManeuverArena) -> ManeuverId) {
        let root = build(&mut self.arena);
        self.root = Some(root);
    }

    pub fn arena(&self) -> &ManeuverArena {
        &self.arena
    }

    pub fn root(&self) -> Option<ManeuverId> {
        self.root
    }

    pub fn failure(&self) -> Option<&SimError> {
        self.failure.as_ref()
    }

    /// True while the flight still has a live tree to advance.
    pub fn is_active(&self) -> bool {
        match self.root {
            Some(root) => self.arena.state(root) != ManeuverState::Finished,
            None => false,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.root, Some(root) if self.arena.state(root) == ManeuverState::Finished)
    }

    /// Diagnostic status of the tree, in the engine's bracket notation.
    pub fn status_string(&self) -> String {
        match self.root {
            Some(root) => self.arena.status_string(root),
            None => "-".to_string(),
        }
    }

    /// Pushes the tick timestamp through the root maneuver.
    ///
    /// A script error (the only source is a missing-clearance dereference)
    /// is fatal for this flight: the failure is recorded, the tree is
    /// dropped wholesale, and the aircraft keeps whatever actuator state
    /// was last written.
    pub fn advance(&mut self, t: SimTime, radio: &mut RadioNet) {
        let Some(root) = self.root else {
            return;
        };
        if self.arena.state(root) == ManeuverState::Finished || self.failure.is_some() {
            return;
        }

        let mut ctx = FlightCtx {
            flight_id: self.id,
            call_sign: &self.call_sign,
            now: t,
            last_received_intent_id: self.last_received_intent_id,
            aircraft: &mut self.aircraft,
            clearances: &mut self.clearances,
            caches: &mut self.caches,
            radio,
        };

        if let Err(err) = self.arena.progress_to(root, t, &mut ctx) {
            error!("{} maneuver tree dropped: {}", self.call_sign, err);
            self.failure = Some(err);
            self.root = None;
        }
    }
}
