//! Polling rule dispatcher.
//!
//! A dispatcher replaces hand-written "capture, check, click, sleep" loops.
//! Each tick:
//!
//! 1. checks the interrupt flag (and the optional timeout);
//! 2. captures one fresh frame and pins it in a `manual` scope, so every
//!    rule sees the same image;
//! 3. evaluates rules top to bottom; the first match runs its action;
//! 4. stops if that rule is a `finish` rule or the action called
//!    [`DispatcherContext::finish`];
//! 5. captures again immediately after a match, or sleeps the dispatch
//!    interval when nothing matched.
//!
//! ```ignore
//! Dispatcher::new("acquire_card")
//!     .click(ctx.predicates().contains("受け取る"))
//!     .log("Claim reward")
//!     .click(&skip_button)
//!     .until(&home_icon, ())
//!     .run(&ctx)?;
//! ```
//!
//! Runs have no timeout unless [`Dispatcher::timeout`] is set.

mod context;
mod rule;

use std::time::Duration;

use tracing::{debug, info, info_span};

pub use context::DispatcherContext;
pub use rule::Target;

use context::TickOutcome;
use rule::{Action, NestedRun, Predicate, Rule};

use crate::context::{Context, ScreenshotMode};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::geometry::{Point, Rect};
use crate::timing::Countdown;

/// Ordered rule set evaluated against a live frame.
///
/// `T` is the value a terminal rule returns from [`Dispatcher::run`].
pub struct Dispatcher<'a, T = ()> {
    name: String,
    rules: Vec<Rule<'a, T>>,
    interval: Option<Duration>,
    timeout: Option<Duration>,
}

impl<'a> Dispatcher<'a, ()> {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_result(name)
    }
}

impl<'a, T: Clone> Dispatcher<'a, T> {
    /// A dispatcher whose terminal rules return a `T`.
    pub fn with_result(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
            interval: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Idle sleep between ticks. Defaults to `timing.dispatch_interval_ms`.
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Fail with [`Error::Timeout`] if no terminal rule matches in time.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn push(mut self, rule: Rule<'a, T>) -> Self {
        self.rules.push(rule);
        self
    }

    /// When `target` is visible, click its center.
    #[must_use]
    pub fn click(self, target: impl Into<Target>) -> Self {
        self.push(Rule::new(
            Predicate::Target(target.into()),
            Action::ClickMatch,
        ))
    }

    /// When `target` is visible, click a fixed point.
    #[must_use]
    pub fn click_at(self, target: impl Into<Target>, point: Point) -> Self {
        self.push(Rule::new(
            Predicate::Target(target.into()),
            Action::ClickPoint(point),
        ))
    }

    /// Unconditionally tap the screen center. Usually the last rule.
    #[must_use]
    pub fn click_center(self) -> Self {
        self.click(Target::Center)
    }

    /// When `target` is visible, stop and return `result`.
    #[must_use]
    pub fn until(self, target: impl Into<Target>, result: T) -> Self {
        let mut rule = Rule::new(Predicate::Target(target.into()), Action::Nothing);
        rule.finish = true;
        rule.result = Some(result);
        self.push(rule)
    }

    /// When `target` is visible, run `action` with the located rectangle.
    #[must_use]
    pub fn on(
        self,
        target: impl Into<Target>,
        action: impl FnMut(&mut DispatcherContext<'_, T>, Rect) -> Result<()> + 'a,
    ) -> Self {
        self.push(Rule::new(
            Predicate::Target(target.into()),
            Action::Custom(Box::new(action)),
        ))
    }

    /// Custom predicate and action. The predicate returns the rectangle it
    /// located, or `None` for no match.
    #[must_use]
    pub fn when(
        self,
        predicate: impl FnMut(&DispatcherContext<'_, T>) -> Result<Option<Rect>> + 'a,
        action: impl FnMut(&mut DispatcherContext<'_, T>, Rect) -> Result<()> + 'a,
    ) -> Self {
        self.push(Rule::new(
            Predicate::Custom(Box::new(predicate)),
            Action::Custom(Box::new(action)),
        ))
    }

    /// When `target` is visible, run `sub` to completion before the next
    /// tick of this dispatcher.
    #[must_use]
    pub fn run_nested<U: Clone + 'a>(self, target: impl Into<Target>, sub: Dispatcher<'a, U>) -> Self {
        self.push(Rule::new(
            Predicate::Target(target.into()),
            Action::Nested(Box::new(sub)),
        ))
    }

    /// Splice `sub`'s rules in at this position.
    #[must_use]
    pub fn expand(mut self, sub: Dispatcher<'a, T>) -> Self {
        self.rules.extend(sub.rules);
        self
    }

    /// Make the most recently added rule terminal.
    #[must_use]
    pub fn finish(mut self) -> Self {
        if let Some(rule) = self.rules.last_mut() {
            rule.finish = true;
        }
        self
    }

    /// Log `message` at info level whenever the most recently added rule
    /// fires.
    #[must_use]
    pub fn log(mut self, message: impl Into<String>) -> Self {
        if let Some(rule) = self.rules.last_mut() {
            rule.log = Some(message.into());
        }
        self
    }

    /// Poll until a terminal rule fires.
    ///
    /// Returns the terminal rule's result, or the value passed to
    /// [`DispatcherContext::finish_with`].
    pub fn run(&mut self, ctx: &Context) -> Result<Option<T>> {
        let interval = self
            .interval
            .unwrap_or(ctx.config().timing.dispatch_interval());
        let name = self.name.clone();
        poll(ctx, &name, interval, self.timeout, |ctx, frame, tick| {
            self.tick(ctx, frame, tick)
        })
    }

    /// Evaluate the rules once against `frame`.
    pub(crate) fn tick(&mut self, ctx: &Context, frame: Frame, tick: u64) -> Result<TickOutcome<T>> {
        let _pin = ctx.manual_context(ScreenshotMode::Manual);
        ctx.use_frame(Some(frame.clone()))?;
        let mut dc = DispatcherContext::new(ctx, frame, tick);

        for (index, rule) in self.rules.iter_mut().enumerate() {
            let Some(rect) = rule.predicate.evaluate(&dc)? else {
                continue;
            };
            match &rule.log {
                Some(message) => info!(dispatcher = %self.name, "{}", message),
                None => debug!(
                    dispatcher = %self.name,
                    rule = index,
                    target = %rule.predicate.describe(),
                    %rect,
                    "rule matched"
                ),
            }
            rule.action.perform(&mut dc, rect)?;
            dc.mark_acted();
            if rule.finish {
                dc.set_finished(rule.result.clone());
            }
            break;
        }
        Ok(dc.outcome())
    }
}

impl<T: Clone> NestedRun for Dispatcher<'_, T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn run_nested(&mut self, ctx: &Context) -> Result<()> {
        self.run(ctx).map(|_| ())
    }
}

impl<T> std::fmt::Debug for Dispatcher<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.name)
            .field("rules", &self.rules.len())
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Function-style dispatcher: the body runs once per tick.
///
/// ```ignore
/// FnDispatcher::new("skip_commu").run(&ctx, |dc| {
///     if dc.beginning() {
///         dc.click_at(Point::new(360, 640))?;
///     } else if dc.context().image().find(&home)?.is_some() {
///         dc.finish();
///     }
///     Ok(())
/// })?;
/// ```
#[derive(Debug, Clone)]
pub struct FnDispatcher {
    name: String,
    interval: Option<Duration>,
    timeout: Option<Duration>,
}

impl FnDispatcher {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interval: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run `body` every tick until it calls `finish`.
    pub fn run(
        &self,
        ctx: &Context,
        body: impl FnMut(&mut DispatcherContext<'_, ()>) -> Result<()>,
    ) -> Result<()> {
        self.run_returning(ctx, body).map(|_| ())
    }

    /// Like [`FnDispatcher::run`], returning the value given to
    /// [`DispatcherContext::finish_with`].
    pub fn run_returning<R>(
        &self,
        ctx: &Context,
        mut body: impl FnMut(&mut DispatcherContext<'_, R>) -> Result<()>,
    ) -> Result<Option<R>> {
        let interval = self
            .interval
            .unwrap_or(ctx.config().timing.dispatch_interval());
        poll(ctx, &self.name, interval, self.timeout, |ctx, frame, tick| {
            let _pin = ctx.manual_context(ScreenshotMode::Manual);
            ctx.use_frame(Some(frame.clone()))?;
            let mut dc = DispatcherContext::new(ctx, frame, tick);
            body(&mut dc)?;
            Ok(dc.outcome())
        })
    }
}

/// Shorthand for `FnDispatcher::new(name).run(ctx, body)`.
pub fn run_fn(
    ctx: &Context,
    name: &str,
    body: impl FnMut(&mut DispatcherContext<'_, ()>) -> Result<()>,
) -> Result<()> {
    FnDispatcher::new(name).run(ctx, body)
}

/// The shared capture/evaluate/sleep loop.
fn poll<R>(
    ctx: &Context,
    name: &str,
    interval: Duration,
    timeout: Option<Duration>,
    mut tick: impl FnMut(&Context, Frame, u64) -> Result<TickOutcome<R>>,
) -> Result<Option<R>> {
    let span = info_span!("dispatcher", name);
    let _enter = span.enter();
    let _scope = ctx.manual_context(ScreenshotMode::Auto);
    let deadline = timeout.map(Countdown::started);

    let mut count = 0u64;
    loop {
        ctx.check_interrupt()?;
        if let Some(deadline) = &deadline {
            if deadline.expired() {
                return Err(Error::timeout(
                    format!("dispatcher '{}'", name),
                    deadline.elapsed(),
                ));
            }
        }

        let frame = ctx.frame()?;
        match tick(ctx, frame, count)? {
            TickOutcome::Finished(value) => {
                debug!(ticks = count + 1, "dispatcher finished");
                return Ok(value);
            }
            TickOutcome::Acted => {}
            TickOutcome::Idle => ctx.sleep(interval)?,
        }
        count += 1;
    }
}
