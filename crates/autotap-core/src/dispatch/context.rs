//! Per-tick state handed to predicates, actions and function bodies.

use crate::context::Context;
use crate::error::Result;
use crate::frame::Frame;
use crate::geometry::{Point, Rect};
use crate::vision::image::Located;

use super::Dispatcher;

/// How a tick ended.
#[derive(Debug)]
pub(crate) enum TickOutcome<T> {
    /// Stop the loop with this value.
    Finished(Option<T>),
    /// Something was done; capture again without sleeping.
    Acted,
    /// Nothing matched; sleep before the next capture.
    Idle,
}

/// View of one dispatcher tick.
///
/// The frame is pinned for the whole tick: every recognition call made
/// through [`DispatcherContext::context`] sees the same capture.
pub struct DispatcherContext<'c, T = ()> {
    ctx: &'c Context,
    frame: Frame,
    tick: u64,
    acted: bool,
    finished: Option<Option<T>>,
}

impl<'c, T> DispatcherContext<'c, T> {
    pub(crate) fn new(ctx: &'c Context, frame: Frame, tick: u64) -> Self {
        Self {
            ctx,
            frame,
            tick,
            acted: false,
            finished: None,
        }
    }

    #[must_use]
    pub fn context(&self) -> &'c Context {
        self.ctx
    }

    /// The frame captured for this tick.
    #[must_use]
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Zero-based tick counter.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// True only on the first tick of a run.
    #[must_use]
    pub fn beginning(&self) -> bool {
        self.tick == 0
    }

    /// Stop the run after this tick, without a value.
    pub fn finish(&mut self) {
        if self.finished.is_none() {
            self.finished = Some(None);
        }
    }

    /// Stop the run after this tick, returning `value`.
    pub fn finish_with(&mut self, value: T) {
        self.finished = Some(Some(value));
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }

    /// Record that this tick did something, so the next capture happens
    /// without the idle sleep. Clicks mark this automatically.
    pub fn mark_acted(&mut self) {
        self.acted = true;
    }

    /// Click the last recognition hit.
    pub fn click(&mut self) -> Result<()> {
        self.ctx.device().click()?;
        self.acted = true;
        Ok(())
    }

    pub fn click_at(&mut self, point: Point) -> Result<()> {
        self.ctx.device().click_point(point)?;
        self.acted = true;
        Ok(())
    }

    pub fn click_rect(&mut self, rect: Rect) -> Result<()> {
        self.click_at(rect.center())
    }

    pub fn click_hit(&mut self, hit: &impl Located) -> Result<()> {
        self.click_rect(hit.rect())
    }

    /// Evaluate `sub`'s rules once against this tick's frame.
    ///
    /// Returns whether one of them matched. A `finish` inside `sub` ends
    /// only `sub`'s own evaluation, never this run.
    pub fn expand<U: Clone>(&mut self, sub: &mut Dispatcher<'_, U>) -> Result<bool> {
        let outcome = sub.tick(self.ctx, self.frame.clone(), self.tick)?;
        let matched = !matches!(outcome, TickOutcome::Idle);
        if matched {
            self.acted = true;
        }
        Ok(matched)
    }

    pub(crate) fn set_finished(&mut self, value: Option<T>) {
        if self.finished.is_none() {
            self.finished = Some(value);
        }
    }

    pub(crate) fn outcome(self) -> TickOutcome<T> {
        match self.finished {
            Some(value) => TickOutcome::Finished(value),
            None if self.acted => TickOutcome::Acted,
            None => TickOutcome::Idle,
        }
    }
}
