//! Named constructors for every maneuver kind.
//!
//! The factory is the only way client code builds nodes; allocation into
//! the arena and child linking stay hidden here. The lower half of the file
//! holds the domain composites (radio operations, taxi, airborne turn),
//! which are themselves just compositions of the primitives above them.

use super::*;
use crate::aircraft::LightBits;
use crate::airport::{TaxiEdge, TaxiPath};
use crate::comms::Intent;
use crate::error::SimError;
use crate::flight::{ClearanceKind, FlightCtx};
use crate::geo;
use std::rc::Rc;
use std::time::Duration;

const KNOTS_TO_MPS: f64 = 0.514_444;
/// Standard-rate turn, degrees per second.
const TURN_RATE_DEG_S: f64 = 3.0;

/// Ground movement profile of a taxi composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxiType {
    /// Tail-first push from the gate
    Pushback,
    Normal,
    /// Runway vacation after landing
    HighSpeed,
}

impl TaxiType {
    pub fn speed_kt(&self) -> f64 {
        match self {
            TaxiType::Pushback => 4.0,
            TaxiType::Normal => 15.0,
            TaxiType::HighSpeed => 30.0,
        }
    }
}

/// Hook invoked when a taxi reaches a hold-short edge; produces the
/// sub-maneuver that must finish before the taxi resumes.
pub type HoldShortHook = Rc<dyn Fn(&mut ManeuverArena, &TaxiEdge) -> ManeuverId>;

impl ManeuverArena {
    /// A sequential composite over `children`, in order.
    pub fn sequence(
        &mut self,
        tag: ManeuverTag,
        label: &str,
        children: Vec<ManeuverId>,
    ) -> ManeuverId {
        let id = self.alloc(
            tag,
            label,
            ManeuverKind::Sequential {
                in_progress_child: None,
            },
        );
        self.adopt(id, &children);
        id
    }

    /// A parallel composite over `children`.
    pub fn parallel(
        &mut self,
        tag: ManeuverTag,
        label: &str,
        children: Vec<ManeuverId>,
    ) -> ManeuverId {
        let id = self.alloc(tag, label, ManeuverKind::Parallel);
        self.adopt(id, &children);
        id
    }

    /// A first-to-finish composite; losers are cancelled. Compose an await
    /// with a delay here to give the await a deadline.
    pub fn race(&mut self, tag: ManeuverTag, label: &str, children: Vec<ManeuverId>) -> ManeuverId {
        let id = self.alloc(tag, label, ManeuverKind::Race);
        self.adopt(id, &children);
        id
    }

    /// A scalar animation with the default linear formula.
    pub fn animation(
        &mut self,
        label: &str,
        start_value: f64,
        end_value: f64,
        duration: Duration,
        apply: impl FnMut(&mut FlightCtx<'_>, f64, f64) + 'static,
    ) -> ManeuverId {
        self.animation_with(
            label,
            start_value,
            end_value,
            duration,
            |from, to, progress| from + (to - from) * progress,
            apply,
            None,
        )
    }

    /// A gated scalar animation; the semaphore is consulted once per tick
    /// and closed time accrues to the pause bucket.
    pub fn animation_gated(
        &mut self,
        label: &str,
        start_value: f64,
        end_value: f64,
        duration: Duration,
        apply: impl FnMut(&mut FlightCtx<'_>, f64, f64) + 'static,
        semaphore: impl FnMut(&mut FlightCtx<'_>, SemaphoreState, Duration) -> SemaphoreState + 'static,
    ) -> ManeuverId {
        self.animation_with(
            label,
            start_value,
            end_value,
            duration,
            |from, to, progress| from + (to - from) * progress,
            apply,
            Some(Box::new(semaphore)),
        )
    }

    fn animation_with(
        &mut self,
        label: &str,
        start_value: f64,
        end_value: f64,
        duration: Duration,
        formula: impl Fn(f64, f64, f64) -> f64 + 'static,
        apply: impl FnMut(&mut FlightCtx<'_>, f64, f64) + 'static,
        semaphore: Option<SemaphoreFn>,
    ) -> ManeuverId {
        self.alloc(
            ManeuverTag::Animation,
            label,
            ManeuverKind::Animation(Animation {
                start_value,
                end_value,
                duration,
                formula: Box::new(formula),
                apply: Box::new(apply),
                semaphore,
                last_semaphore_state: SemaphoreState::Open,
                closed_total: Duration::ZERO,
                last_elapsed: Duration::ZERO,
            }),
        )
    }

    /// A pure wait: the degenerate animation with equal endpoints and an
    /// empty apply.
    pub fn delay(&mut self, duration: Duration) -> ManeuverId {
        self.animation("", 0.0, 0.0, duration, |_ctx, _value, _progress| {})
    }

    /// Holds until `is_ready` returns true.
    pub fn await_if(
        &mut self,
        tag: ManeuverTag,
        label: &str,
        is_ready: impl Fn(&FlightCtx<'_>) -> bool + 'static,
    ) -> ManeuverId {
        self.alloc(
            tag,
            label,
            ManeuverKind::Await {
                is_ready: Box::new(is_ready),
                last_logged_secs: 0,
            },
        )
    }

    /// Runs `action` exactly once on its first tick.
    pub fn instant_action(&mut self, action: impl FnOnce(&mut FlightCtx<'_>) + 'static) -> ManeuverId {
        self.alloc(
            ManeuverTag::Unspecified,
            "",
            ManeuverKind::InstantAction {
                action: Some(Box::new(action)),
            },
        )
    }

    /// A proxy whose body is built by `factory` on the proxy's first tick.
    /// Use when a subtree's inputs are produced by earlier siblings.
    pub fn deferred(
        &mut self,
        tag: ManeuverTag,
        label: &str,
        factory: impl FnOnce(&mut ManeuverArena, &mut FlightCtx<'_>) -> Result<ManeuverId, SimError>
        + 'static,
    ) -> ManeuverId {
        self.alloc(
            tag,
            label,
            ManeuverKind::Deferred {
                factory: Some(Box::new(factory)),
                inner: None,
            },
        )
    }

    /// Tunes the COM radio to `khz`.
    pub fn tune_com_radio(&mut self, khz: u32) -> ManeuverId {
        self.instant_action(move |ctx| ctx.aircraft.set_frequency_khz(khz))
    }

    /// Hands `intent` to the currently tuned frequency. Fire and forget.
    pub fn transmit_intent(&mut self, intent: Intent) -> ManeuverId {
        self.instant_action(move |ctx| {
            ctx.transmit(intent);
        })
    }

    /// Holds until the flight's store has an unconsumed clearance of
    /// `kind`. Labelled, so long waits show up in the log.
    pub fn await_clearance(&mut self, kind: ClearanceKind) -> ManeuverId {
        self.await_if(
            ManeuverTag::Unspecified,
            &format!("{:?} clearance", kind),
            move |ctx| ctx.clearances.has_unconsumed(kind),
        )
    }

    /// Switches the exterior lights to `lights`.
    pub fn switch_lights(&mut self, lights: LightBits) -> ManeuverId {
        self.instant_action(move |ctx| ctx.aircraft.set_lights(lights))
    }

    /// Heading animation along the shortest arc at standard rate.
    pub fn airborne_turn(&mut self, from_heading: f64, to_heading: f64) -> ManeuverId {
        let turn = geo::turn_degrees(from_heading, to_heading);
        let duration = Duration::from_secs_f64((turn.abs() / TURN_RATE_DEG_S).max(0.001));
        self.animation("", from_heading, from_heading + turn, duration, |ctx, value, _p| {
            let attitude = ctx.aircraft.attitude().with_heading(value);
            ctx.aircraft.set_attitude(attitude);
        })
    }

    /// Ground motion along `path`: a sequence of per-edge heading snaps and
    /// location animations at the profile speed.
    ///
    /// When an edge is a hold-short boundary and a hook is given, the taxi
    /// stops (speed zero) and defers to the hook's sub-maneuver before
    /// entering that edge; the hook decides whether that means lining up or
    /// waiting for a crossing clearance. The engine itself carries no
    /// airspace logic here.
    pub fn taxi_by_path(
        &mut self,
        tag: ManeuverTag,
        path: &TaxiPath,
        taxi_type: TaxiType,
        on_hold_short: Option<HoldShortHook>,
    ) -> ManeuverId {
        let speed_kt = taxi_type.speed_kt();
        let mut steps: Vec<ManeuverId> = Vec::new();
        let mut inside_zone = false;

        for edge in &path.edges {
            // The hook fires on the boundary edge entering an active zone,
            // not again on each in-zone edge.
            if edge.is_hold_short() && !inside_zone {
                if let Some(hook) = &on_hold_short {
                    steps.push(self.instant_action(|ctx| ctx.aircraft.set_ground_speed_kt(0.0)));
                    let hook = Rc::clone(hook);
                    let boundary = edge.clone();
                    let label = boundary.name.clone();
                    steps.push(self.deferred(
                        ManeuverTag::TaxiHoldShort,
                        &label,
                        move |arena, _ctx| Ok(hook(arena, &boundary)),
                    ));
                }
            }
            inside_zone = edge.is_hold_short();

            let length = edge.length_m();
            if length < 0.5 {
                continue;
            }
            let travel_heading = edge.heading();
            let nose_heading = match taxi_type {
                // Tail-first: the nose points against the direction of travel.
                TaxiType::Pushback => geo::normalize_heading(travel_heading + 180.0),
                _ => travel_heading,
            };
            let (node1, node2) = (edge.node1, edge.node2);
            let duration =
                Duration::from_secs_f64((length / (speed_kt * KNOTS_TO_MPS)).max(0.001));

            steps.push(self.instant_action(move |ctx| {
                let attitude = ctx.aircraft.attitude().with_heading(nose_heading);
                ctx.aircraft.set_attitude(attitude);
                ctx.aircraft.set_ground_speed_kt(speed_kt);
            }));
            steps.push(self.animation("", 0.0, 1.0, duration, move |ctx, value, _p| {
                ctx.aircraft.set_location(geo::lerp(node1, node2, value));
            }));
        }

        steps.push(self.instant_action(|ctx| ctx.aircraft.set_ground_speed_kt(0.0)));
        self.sequence(tag, "", steps)
    }
}
