//! # Maneuver Module - The Tick-Driven Behaviour Engine
//!
//! The core of the crate: a tree-structured, externally clocked engine that
//! composes primitive time-based actions into nested sequential, parallel,
//! racing, deferred and gated behaviours. An AI pilot is, in effect, one
//! large tree built out of these nodes; the traffic loop advances the whole
//! fleet by pushing a timestamp into every root once per tick.
//!
//! ## Architecture
//!
//! Instead of a virtual class hierarchy, a maneuver is a single record with
//! a tagged union for its kind and the shared lifecycle fields (state,
//! timestamps, child links) on the record itself. All nodes of a tree live
//! in one [`ManeuverArena`]; parent, child and sibling links are arena
//! indices, ownership is uniquely the arena's, and destruction is wholesale
//! when the owning flight ends. This removes the cyclic-reference hazards
//! that proxy nodes and callback captures would otherwise create.
//!
//! Callbacks are message-style: every closure receives an explicit
//! [`FlightCtx`] service view as an argument. Nothing in a tree holds a
//! reference to the flight that owns it.
//!
//! ## Lifecycle
//!
//! States move only forward: `NotStarted → InProgress → Finished`, with
//! `Cancelled` as a second terminal state entered only by the losing
//! children of a [`ManeuverKind::Race`]. `start_ts` is stamped on the first
//! transition, `finish_ts` on the terminal one, and a terminal node ignores
//! further ticks entirely.
//!
//! ## Submodules
//!
//! - [`progress`]: The per-kind tick rules behind `progress_to`
//! - [`factory`]: Named constructors for every node kind, including the
//!   domain composites (taxi, airborne turn, radio operations)
//! - [`tests`]: Unit tests for the engine invariants

pub mod factory;
pub mod progress;

use crate::clock::SimTime;
use crate::error::SimError;
use crate::flight::FlightCtx;
use std::fmt;
use std::time::Duration;

/// Index of a node inside its [`ManeuverArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ManeuverId(u32);

impl ManeuverId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Lifecycle state. Transitions are monotone and terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ManeuverState {
    NotStarted,
    InProgress,
    Finished,
    /// Lost a race. Terminal like `Finished`, but the node's effects were
    /// abandoned rather than completed.
    Cancelled,
}

impl ManeuverState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ManeuverState::Finished | ManeuverState::Cancelled)
    }
}

/// Classification tag used for logging and queries. No control effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManeuverTag {
    Flight,
    DepartureAwaitIfrClearance,
    DepartureAwaitPushback,
    DeparturePushbackAndStart,
    DepartureAwaitTaxi,
    DepartureTaxi,
    DepartureLineUpAndWait,
    DepartureAwaitTakeOff,
    DepartureTakeOffRoll,
    ArrivalApproach,
    ArrivalLanding,
    ArrivalLandingRoll,
    ArrivalTaxi,
    TaxiHoldShort,
    Animation,
    Unspecified,
}

impl fmt::Display for ManeuverTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Per-animation gate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemaphoreState {
    Open,
    Closed,
}

/// Pure mapping from endpoints and progress to the animated value.
pub type FormulaFn = Box<dyn Fn(f64, f64, f64) -> f64>;
/// Writes the animated value through the actuator view.
pub type ApplyFn = Box<dyn FnMut(&mut FlightCtx<'_>, f64, f64)>;
/// Consulted once per tick before the animation advances.
pub type SemaphoreFn = Box<dyn FnMut(&mut FlightCtx<'_>, SemaphoreState, Duration) -> SemaphoreState>;
/// Await condition.
pub type PredicateFn = Box<dyn Fn(&FlightCtx<'_>) -> bool>;
/// One-shot side effect.
pub type ActionFn = Box<dyn FnOnce(&mut FlightCtx<'_>)>;
/// Late-bound subtree constructor for [`ManeuverKind::Deferred`].
pub type DeferredFactoryFn =
    Box<dyn FnOnce(&mut ManeuverArena, &mut FlightCtx<'_>) -> Result<ManeuverId, SimError>>;

/// State of a scalar animation node.
///
/// The value runs from `start_value` to `end_value` over `duration` of
/// open-gate time. While the semaphore reports `Closed`, elapsed time
/// accrues into `closed_total` instead of progressing the value, so the
/// animation pauses in place rather than jumping when the gate reopens.
pub struct Animation {
    pub(crate) start_value: f64,
    pub(crate) end_value: f64,
    pub(crate) duration: Duration,
    pub(crate) formula: FormulaFn,
    pub(crate) apply: ApplyFn,
    pub(crate) semaphore: Option<SemaphoreFn>,
    pub(crate) last_semaphore_state: SemaphoreState,
    pub(crate) closed_total: Duration,
    pub(crate) last_elapsed: Duration,
}

/// The tagged union over primitive maneuver kinds.
pub enum ManeuverKind {
    /// Children strictly in order, at most one in flight. Zero-duration
    /// children cascade within a single tick.
    Sequential { in_progress_child: Option<ManeuverId> },
    /// Every non-terminal child advances each tick; finished when all are.
    Parallel,
    /// First child to finish wins; the rest are cancelled on that tick.
    Race,
    /// Scalar value over time with an optional per-tick gate.
    Animation(Animation),
    /// Holds until its predicate is true; finishes the same tick.
    Await {
        is_ready: PredicateFn,
        last_logged_secs: u64,
    },
    /// Runs a closure exactly once, then is immediately finished.
    InstantAction { action: Option<ActionFn> },
    /// Proxy that builds its body on first tick and mirrors it afterwards.
    Deferred {
        factory: Option<DeferredFactoryFn>,
        inner: Option<ManeuverId>,
    },
}

/// One node: the kind plus the shared lifecycle fields.
pub struct Maneuver {
    pub(crate) kind: ManeuverKind,
    tag: ManeuverTag,
    label: String,
    pub(crate) state: ManeuverState,
    pub(crate) start_ts: Option<SimTime>,
    pub(crate) finish_ts: Option<SimTime>,
    pub(crate) first_child: Option<ManeuverId>,
    pub(crate) next_sibling: Option<ManeuverId>,
    pub(crate) parent: Option<ManeuverId>,
}

/// Owns every node of the trees built into it.
///
/// Allocation is append-only; ids stay valid for the arena's lifetime.
/// Dropping the arena drops every tree wholesale, which is the engine's
/// only form of cancellation besides losing a race.
#[derive(Default)]
pub struct ManeuverArena {
    nodes: Vec<Maneuver>,
}

impl ManeuverArena {
    pub fn new() -> Self {
        ManeuverArena { nodes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn alloc(&mut self, tag: ManeuverTag, label: &str, kind: ManeuverKind) -> ManeuverId {
        let id = ManeuverId(self.nodes.len() as u32);
        self.nodes.push(Maneuver {
            kind,
            tag,
            label: label.to_string(),
            state: ManeuverState::NotStarted,
            start_ts: None,
            finish_ts: None,
            first_child: None,
            next_sibling: None,
            parent: None,
        });
        id
    }

    pub(crate) fn node(&self, id: ManeuverId) -> &Maneuver {
        &self.nodes[id.index()]
    }

    pub(crate) fn node_mut(&mut self, id: ManeuverId) -> &mut Maneuver {
        &mut self.nodes[id.index()]
    }

    /// Links `children` under `parent` in declaration order.
    pub(crate) fn adopt(&mut self, parent: ManeuverId, children: &[ManeuverId]) {
        self.node_mut(parent).first_child = children.first().copied();
        for pair in children.windows(2) {
            self.node_mut(pair[0]).next_sibling = Some(pair[1]);
        }
        if let Some(last) = children.last() {
            self.node_mut(*last).next_sibling = None;
        }
        for child in children {
            self.node_mut(*child).parent = Some(parent);
        }
    }

    pub fn state(&self, id: ManeuverId) -> ManeuverState {
        self.node(id).state
    }

    pub fn tag(&self, id: ManeuverId) -> ManeuverTag {
        self.node(id).tag
    }

    pub fn label(&self, id: ManeuverId) -> &str {
        &self.node(id).label
    }

    pub fn start_ts(&self, id: ManeuverId) -> Option<SimTime> {
        self.node(id).start_ts
    }

    pub fn finish_ts(&self, id: ManeuverId) -> Option<SimTime> {
        self.node(id).finish_ts
    }

    pub fn first_child(&self, id: ManeuverId) -> Option<ManeuverId> {
        self.node(id).first_child
    }

    pub fn next_sibling(&self, id: ManeuverId) -> Option<ManeuverId> {
        self.node(id).next_sibling
    }

    pub fn parent(&self, id: ManeuverId) -> Option<ManeuverId> {
        self.node(id).parent
    }

    /// True for proxy nodes whose body is built lazily.
    pub fn is_proxy(&self, id: ManeuverId) -> bool {
        matches!(self.node(id).kind, ManeuverKind::Deferred { .. })
    }

    /// The constructed body of a proxy, once it exists.
    pub fn unproxy(&self, id: ManeuverId) -> Option<ManeuverId> {
        match self.node(id).kind {
            ManeuverKind::Deferred { inner, .. } => inner,
            _ => None,
        }
    }

    /// Children of `id` in declaration order.
    pub fn children(&self, id: ManeuverId) -> Vec<ManeuverId> {
        let mut out = Vec::new();
        let mut cursor = self.first_child(id);
        while let Some(child) = cursor {
            out.push(child);
            cursor = self.next_sibling(child);
        }
        out
    }

    /// Diagnostic rendering of a subtree.
    ///
    /// Sequential nodes append their in-flight child in brackets, parallel
    /// and race nodes list children pipe-separated in parentheses, and a
    /// proxy forwards to its body once built.
    pub fn status_string(&self, id: ManeuverId) -> String {
        let node = self.node(id);
        let base = if node.label.is_empty() {
            node.tag.to_string()
        } else {
            node.label.clone()
        };

        match &node.kind {
            ManeuverKind::Sequential { in_progress_child } => match in_progress_child {
                Some(child) => format!("{}[{}]", base, self.status_string(*child)),
                None => base,
            },
            ManeuverKind::Parallel | ManeuverKind::Race => {
                let parts: Vec<String> = self
                    .children(id)
                    .into_iter()
                    .map(|c| self.status_string(c))
                    .collect();
                format!("{}({})", base, parts.join("|"))
            }
            ManeuverKind::Deferred { inner, .. } => match inner {
                Some(body) => self.status_string(*body),
                None => "defer".to_string(),
            },
            _ => base,
        }
    }
}
