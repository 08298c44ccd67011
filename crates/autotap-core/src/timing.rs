//! Small timing helpers for polling loops.

use std::time::{Duration, Instant};

use crate::context::Interrupt;
use crate::error::Result;

/// A deadline that starts when first armed.
#[derive(Debug, Clone, Copy)]
pub struct Countdown {
    duration: Duration,
    started: Option<Instant>,
}

impl Countdown {
    /// A countdown that has not been started yet.
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            started: None,
        }
    }

    /// A countdown already running from now.
    #[must_use]
    pub fn started(duration: Duration) -> Self {
        let mut countdown = Self::new(duration);
        countdown.start();
        countdown
    }

    /// Start if not yet running. Restarting requires [`Countdown::reset`].
    pub fn start(&mut self) {
        self.started.get_or_insert_with(Instant::now);
    }

    /// Stop; the next [`Countdown::start`] begins a fresh period.
    pub fn reset(&mut self) {
        self.started = None;
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.is_some()
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.map(|s| s.elapsed()).unwrap_or_default()
    }

    /// True once a started countdown has run its full duration.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.started.is_some() && self.elapsed() >= self.duration
    }

    #[must_use]
    pub fn remaining(&self) -> Duration {
        match self.started {
            Some(_) => self.duration.saturating_sub(self.elapsed()),
            None => self.duration,
        }
    }
}

/// Paces a loop to at most one iteration per period.
#[derive(Debug, Clone)]
pub struct Interval {
    period: Duration,
    last: Option<Instant>,
}

impl Interval {
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self { period, last: None }
    }

    /// Sleep out the rest of the current period.
    ///
    /// The first call returns immediately. Interruptible.
    pub fn wait(&mut self, interrupt: &Interrupt) -> Result<()> {
        if let Some(last) = self.last {
            let remaining = self.period.saturating_sub(last.elapsed());
            interrupt.sleep(remaining)?;
        } else {
            interrupt.check()?;
        }
        self.last = Some(Instant::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unstarted_countdown_never_expires() {
        let countdown = Countdown::new(Duration::ZERO);
        assert!(!countdown.expired());
        assert_eq!(countdown.remaining(), Duration::ZERO);
    }

    #[test]
    fn zero_countdown_expires_once_started() {
        let mut countdown = Countdown::new(Duration::ZERO);
        countdown.start();
        assert!(countdown.expired());
        countdown.reset();
        assert!(!countdown.is_started());
    }

    #[test]
    fn start_is_idempotent() {
        let mut countdown = Countdown::started(Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(5));
        let before = countdown.elapsed();
        countdown.start();
        assert!(countdown.elapsed() >= before);
        assert!(!countdown.expired());
    }

    #[test]
    fn interval_paces_iterations() {
        let interrupt = Interrupt::new();
        let mut interval = Interval::new(Duration::from_millis(20));
        let start = Instant::now();
        for _ in 0..3 {
            interval.wait(&interrupt).unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn interval_is_interruptible() {
        let interrupt = Interrupt::new();
        let mut interval = Interval::new(Duration::from_secs(30));
        interval.wait(&interrupt).unwrap();
        interrupt.set();
        assert!(interval.wait(&interrupt).unwrap_err().is_cancellation());
    }
}
