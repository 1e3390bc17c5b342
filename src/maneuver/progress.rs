//! Per-kind tick rules for the maneuver engine.
//!
//! `progress_to` is the single entry point the clock driver uses. Each kind
//! has its own advance rule; all of them share the lifecycle discipline of
//! the base record: stamp `start_ts` on the first tick, never touch a
//! terminal node, stamp `finish_ts` exactly once on the terminal tick.

use super::*;
use crate::clock::SimTime;
use crate::error::SimError;
use crate::flight::FlightCtx;
use log::debug;

/// Copyable dispatch key so the borrow of the node ends before recursion.
#[derive(Clone, Copy)]
enum KindTag {
    Sequential,
    Parallel,
    Race,
    Animation,
    Await,
    InstantAction,
    Deferred,
}

impl ManeuverArena {
    /// Advances the subtree rooted at `id` to timestamp `t`.
    ///
    /// A no-op on terminal nodes. The only error source is a deferred
    /// factory dereferencing a clearance that is not on file, which is a
    /// script bug and aborts the whole tree.
    pub fn progress_to(
        &mut self,
        id: ManeuverId,
        t: SimTime,
        ctx: &mut FlightCtx<'_>,
    ) -> Result<(), SimError> {
        if self.node(id).state.is_terminal() {
            return Ok(());
        }

        let tag = match &self.node(id).kind {
            ManeuverKind::Sequential { .. } => KindTag::Sequential,
            ManeuverKind::Parallel => KindTag::Parallel,
            ManeuverKind::Race => KindTag::Race,
            ManeuverKind::Animation(_) => KindTag::Animation,
            ManeuverKind::Await { .. } => KindTag::Await,
            ManeuverKind::InstantAction { .. } => KindTag::InstantAction,
            ManeuverKind::Deferred { .. } => KindTag::Deferred,
        };

        match tag {
            KindTag::Sequential => self.progress_sequential(id, t, ctx),
            KindTag::Parallel => self.progress_parallel(id, t, ctx),
            KindTag::Race => self.progress_race(id, t, ctx),
            KindTag::Animation => {
                self.progress_animation(id, t, ctx);
                Ok(())
            }
            KindTag::Await => {
                self.progress_await(id, t, ctx);
                Ok(())
            }
            KindTag::InstantAction => {
                self.progress_instant(id, t, ctx);
                Ok(())
            }
            KindTag::Deferred => self.progress_deferred(id, t, ctx),
        }
    }

    /// Stamps the `NotStarted -> InProgress` transition.
    fn ensure_started(&mut self, id: ManeuverId, t: SimTime) {
        let node = self.node_mut(id);
        if node.state == ManeuverState::NotStarted {
            node.start_ts = Some(t);
            node.state = ManeuverState::InProgress;
        }
    }

    fn finish(&mut self, id: ManeuverId, t: SimTime) {
        let node = self.node_mut(id);
        node.state = ManeuverState::Finished;
        node.finish_ts = Some(t);
    }

    /// Strict in-order advancement with zero-duration cascade: a child that
    /// finishes within this tick immediately yields to its next sibling, so
    /// a chain of instant steps completes in one tick.
    fn progress_sequential(
        &mut self,
        id: ManeuverId,
        t: SimTime,
        ctx: &mut FlightCtx<'_>,
    ) -> Result<(), SimError> {
        if self.node(id).state == ManeuverState::NotStarted {
            let first = self.node(id).first_child;
            self.ensure_started(id, t);
            match &mut self.node_mut(id).kind {
                ManeuverKind::Sequential { in_progress_child } => *in_progress_child = first,
                _ => unreachable!("progress_sequential on a non-sequential node"),
            }
        }

        let mut current = match &self.node(id).kind {
            ManeuverKind::Sequential { in_progress_child } => *in_progress_child,
            _ => unreachable!("progress_sequential on a non-sequential node"),
        };

        loop {
            let Some(child) = current else {
                self.finish(id, t);
                break;
            };

            if !self.node(child).state.is_terminal() {
                self.progress_to(child, t, ctx)?;
                if !self.node(child).state.is_terminal() {
                    break;
                }
            }
            current = self.node(child).next_sibling;
        }

        if let ManeuverKind::Sequential { in_progress_child } = &mut self.node_mut(id).kind {
            *in_progress_child = current;
        }
        Ok(())
    }

    /// Advances every non-terminal child; apply effects land in declaration
    /// order within the tick. `finish_ts` is stamped only on the tick the
    /// last child finishes.
    fn progress_parallel(
        &mut self,
        id: ManeuverId,
        t: SimTime,
        ctx: &mut FlightCtx<'_>,
    ) -> Result<(), SimError> {
        self.ensure_started(id, t);

        let mut all_finished = true;
        let mut cursor = self.node(id).first_child;
        while let Some(child) = cursor {
            if !self.node(child).state.is_terminal() {
                self.progress_to(child, t, ctx)?;
                if !self.node(child).state.is_terminal() {
                    all_finished = false;
                }
            }
            cursor = self.node(child).next_sibling;
        }

        if all_finished {
            self.finish(id, t);
        }
        Ok(())
    }

    /// First child to finish wins; every other child is cancelled on the
    /// winning tick and children after the winner are not advanced that
    /// tick, keeping the outcome deterministic in declaration order.
    fn progress_race(
        &mut self,
        id: ManeuverId,
        t: SimTime,
        ctx: &mut FlightCtx<'_>,
    ) -> Result<(), SimError> {
        self.ensure_started(id, t);

        let mut winner = None;
        let mut cursor = self.node(id).first_child;
        while let Some(child) = cursor {
            if winner.is_none() {
                if !self.node(child).state.is_terminal() {
                    self.progress_to(child, t, ctx)?;
                }
                if self.node(child).state == ManeuverState::Finished {
                    winner = Some(child);
                }
            }
            cursor = self.node(child).next_sibling;
        }

        if let Some(winner) = winner {
            let mut cursor = self.node(id).first_child;
            while let Some(child) = cursor {
                if child != winner {
                    self.cancel(child, t);
                }
                cursor = self.node(child).next_sibling;
            }
            self.finish(id, t);
        }
        Ok(())
    }

    /// Marks a subtree cancelled. Terminal nodes are left untouched; a
    /// never-started node gets both stamps at the cancellation tick so the
    /// "terminal implies stamped" invariant holds uniformly.
    pub(crate) fn cancel(&mut self, id: ManeuverId, t: SimTime) {
        if self.node(id).state.is_terminal() {
            return;
        }

        {
            let node = self.node_mut(id);
            if node.start_ts.is_none() {
                node.start_ts = Some(t);
            }
            node.state = ManeuverState::Cancelled;
            node.finish_ts = Some(t);
        }

        let mut cursor = self.node(id).first_child;
        while let Some(child) = cursor {
            self.cancel(child, t);
            cursor = self.node(child).next_sibling;
        }
        if let Some(inner) = self.unproxy(id) {
            self.cancel(inner, t);
        }
    }

    /// The gated animation rule.
    ///
    /// Elapsed time is measured from `start_ts`; the delta since the
    /// previous tick accrues to the pause bucket whenever the semaphore is
    /// closed, and the effective elapsed time (elapsed minus pause bucket)
    /// drives progress. The gate therefore pauses the value in place
    /// without rewinding it.
    fn progress_animation(&mut self, id: ManeuverId, t: SimTime, ctx: &mut FlightCtx<'_>) {
        self.ensure_started(id, t);

        let node = self.node_mut(id);
        let start = node.start_ts.unwrap_or(t);
        let elapsed = t - start;

        let ManeuverKind::Animation(anim) = &mut node.kind else {
            unreachable!("progress_animation on a non-animation node");
        };

        let delta = elapsed.saturating_sub(anim.last_elapsed);
        anim.last_elapsed = elapsed;

        let gate = match &mut anim.semaphore {
            Some(semaphore) => semaphore(ctx, anim.last_semaphore_state, anim.closed_total),
            None => SemaphoreState::Open,
        };
        anim.last_semaphore_state = gate;
        if gate == SemaphoreState::Closed {
            anim.closed_total += delta;
            return;
        }

        let effective = elapsed.saturating_sub(anim.closed_total);
        let progress = if anim.duration.is_zero() {
            1.0
        } else {
            (effective.as_secs_f64() / anim.duration.as_secs_f64()).min(1.0)
        };
        let value = (anim.formula)(anim.start_value, anim.end_value, progress);
        (anim.apply)(ctx, value, progress);
        let done = effective >= anim.duration;

        if done {
            node.state = ManeuverState::Finished;
            node.finish_ts = Some(t);
        }
    }

    /// Finishes on the first tick the predicate holds, including the tick
    /// the await starts on. Labelled awaits report their wait at
    /// second-grained intervals.
    fn progress_await(&mut self, id: ManeuverId, t: SimTime, ctx: &mut FlightCtx<'_>) {
        self.ensure_started(id, t);

        let node = self.node_mut(id);
        let start = node.start_ts.unwrap_or(t);
        let elapsed = t - start;

        let ManeuverKind::Await {
            is_ready,
            last_logged_secs,
        } = &mut node.kind
        else {
            unreachable!("progress_await on a non-await node");
        };

        let ready = is_ready(ctx);

        if !node.label.is_empty() {
            if ready {
                debug!(
                    "{} AWAIT [{}] finished in {} ms",
                    ctx.call_sign,
                    node.label,
                    elapsed.as_millis()
                );
            } else if elapsed.as_secs() > *last_logged_secs {
                *last_logged_secs = elapsed.as_secs();
                debug!(
                    "{} AWAIT [{}] in progress for {} s",
                    ctx.call_sign,
                    node.label,
                    elapsed.as_secs()
                );
            }
        }

        if ready {
            node.state = ManeuverState::Finished;
            node.finish_ts = Some(t);
        }
    }

    /// Runs the closure exactly once and finishes on the same tick.
    fn progress_instant(&mut self, id: ManeuverId, t: SimTime, ctx: &mut FlightCtx<'_>) {
        let action = match &mut self.node_mut(id).kind {
            ManeuverKind::InstantAction { action } => action.take(),
            _ => unreachable!("progress_instant on a non-instant node"),
        };

        {
            let node = self.node_mut(id);
            node.start_ts = Some(t);
            node.state = ManeuverState::Finished;
            node.finish_ts = Some(t);
        }

        if let Some(action) = action {
            action(ctx);
        }
    }

    /// Builds the body on the first tick, then forwards every tick to it
    /// and mirrors its state. The factory runs at most once, and the body
    /// advances within the same tick it is built, so a proxy resolving to
    /// an instant step costs no extra tick.
    fn progress_deferred(
        &mut self,
        id: ManeuverId,
        t: SimTime,
        ctx: &mut FlightCtx<'_>,
    ) -> Result<(), SimError> {
        if self.node(id).state == ManeuverState::NotStarted {
            let factory = match &mut self.node_mut(id).kind {
                ManeuverKind::Deferred { factory, .. } => factory.take(),
                _ => unreachable!("progress_deferred on a non-deferred node"),
            };
            self.ensure_started(id, t);

            let Some(factory) = factory else {
                return Ok(());
            };
            debug!("{} deferred [{}] building body", ctx.call_sign, self.node(id).label);
            let body = factory(self, ctx)?;
            self.node_mut(body).parent = Some(id);
            if let ManeuverKind::Deferred { inner, .. } = &mut self.node_mut(id).kind {
                *inner = Some(body);
            }
        }

        let Some(body) = self.unproxy(id) else {
            return Ok(());
        };
        self.progress_to(body, t, ctx)?;

        let mirrored = self.node(body).state;
        let node = self.node_mut(id);
        node.state = mirrored;
        if mirrored.is_terminal() {
            node.finish_ts = Some(t);
        }
        Ok(())
    }
}
