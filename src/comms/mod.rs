//! # Comms Module - Intents and the Radio Net
//!
//! Radio traffic between pilots and controllers. An [`Intent`] is the typed
//! envelope of one transmission; the [`RadioNet`] queues transmissions per
//! frequency and hands them to the traffic loop, which delivers them on the
//! following tick boundary. Transmission is fire and forget: read-backs are
//! separate intents the scripts emit explicitly.
//!
//! Intent ids are assigned by the radio net at transmit time, so the id a
//! pilot acknowledges in a read-back is exactly the id the controller sent.
//!
//! ## Submodules
//!
//! - [`tests`]: Unit tests for id assignment and queue behaviour


use crate::clock::SimTime;
use crate::flight::{Clearance, FlightId};
use serde::{Deserialize, Serialize};

/// Which way a transmission travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    PilotToController,
    ControllerToPilot,
}

/// Typed content of a transmission.
///
/// Controller variants may carry a [`Clearance`]; pilot variants carry the
/// values a human read-back would repeat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IntentBody {
    // Controller to pilot
    IfrClearanceReply { clearance: Clearance },
    IfrReadbackCorrect,
    PushAndStartApproval { approval: Clearance },
    DepartureTaxiReply { clearance: Clearance },
    RunwayCrossClearance { clearance: Clearance },
    SwitchToTower { tower_khz: u32 },
    LineUpApproval { approval: Clearance },
    ClearedForTakeoff { clearance: Clearance },
    ClearedForLanding { clearance: Clearance },
    ArrivalTaxiReply { clearance: Clearance },

    // Pilot to controller
    IfrRequest,
    IfrReadback,
    HandoffReadback { next_khz: u32 },
    PushAndStartRequest,
    PushAndStartReadback,
    DepartureTaxiRequest,
    DepartureTaxiReadback,
    ReportHoldingShort { runway: String, edge: String },
    CheckInWithTower { runway: String, edge: String },
    LineUpReadback { runway: String },
    TakeoffReadback { departure_khz: u32 },
    ReportFinal { runway: String },
    LandingReadback { ground_khz: u32 },
    ArrivalCheckInWithGround { runway: String, exit: String },
    ArrivalTaxiReadback,
    Affirmation,
}

impl IntentBody {
    /// The clearance this intent delivers, if it delivers one.
    pub fn carried_clearance(&self) -> Option<&Clearance> {
        match self {
            IntentBody::IfrClearanceReply { clearance }
            | IntentBody::DepartureTaxiReply { clearance }
            | IntentBody::RunwayCrossClearance { clearance }
            | IntentBody::ClearedForTakeoff { clearance }
            | IntentBody::ClearedForLanding { clearance }
            | IntentBody::ArrivalTaxiReply { clearance } => Some(clearance),
            IntentBody::PushAndStartApproval { approval }
            | IntentBody::LineUpApproval { approval } => Some(approval),
            _ => None,
        }
    }
}

/// One radio call: an id, a direction, the flight it concerns and a body.
///
/// `reply_to` carries the id of the transmission being acknowledged, which
/// is how read-backs are correlated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub id: u64,
    pub direction: Direction,
    pub subject: FlightId,
    pub reply_to: Option<u64>,
    pub body: IntentBody,
}

impl Intent {
    pub fn pilot(subject: FlightId, body: IntentBody) -> Self {
        Intent {
            id: 0,
            direction: Direction::PilotToController,
            subject,
            reply_to: None,
            body,
        }
    }

    pub fn pilot_reply(subject: FlightId, reply_to: u64, body: IntentBody) -> Self {
        Intent {
            id: 0,
            direction: Direction::PilotToController,
            subject,
            reply_to: Some(reply_to),
            body,
        }
    }

    pub fn controller(subject: FlightId, body: IntentBody) -> Self {
        Intent {
            id: 0,
            direction: Direction::ControllerToPilot,
            subject,
            reply_to: None,
            body,
        }
    }
}

/// A queued radio call on a concrete frequency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transmission {
    pub khz: u32,
    pub sent_at: SimTime,
    pub intent: Intent,
}

/// Frequency-keyed transmission queues plus a full transcript.
///
/// The net does no routing itself. The traffic loop drains the queue once
/// per tick and delivers each call to every station tuned to its frequency,
/// which gives the one-tick propagation delay the engine specifies.
#[derive(Debug)]
pub struct RadioNet {
    queued: Vec<Transmission>,
    transcript: Vec<Transmission>,
    next_intent_id: u64,
}

impl Default for RadioNet {
    fn default() -> Self {
        RadioNet::new()
    }
}

impl RadioNet {
    pub fn new() -> Self {
        RadioNet {
            queued: Vec::new(),
            transcript: Vec::new(),
            next_intent_id: 1,
        }
    }

    /// Enqueues a call on `khz`, assigning the intent id. Returns the id.
    pub fn transmit(&mut self, khz: u32, mut intent: Intent, now: SimTime) -> u64 {
        intent.id = self.next_intent_id;
        self.next_intent_id += 1;

        let id = intent.id;
        let tx = Transmission {
            khz,
            sent_at: now,
            intent,
        };
        self.transcript.push(tx.clone());
        self.queued.push(tx);
        id
    }

    /// Takes every pending call, leaving the queue empty. Order of
    /// transmission is preserved.
    pub fn take_queued(&mut self) -> Vec<Transmission> {
        std::mem::take(&mut self.queued)
    }

    pub fn pending_count(&self) -> usize {
        self.queued.len()
    }

    /// Every call ever made, in transmission order.
    pub fn transcript(&self) -> &[Transmission] {
        &self.transcript
    }
}
