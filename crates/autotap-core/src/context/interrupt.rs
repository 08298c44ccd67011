//! Cooperative cancellation flag.
//!
//! Setting the flag wakes any thread blocked in [`Interrupt::sleep`]
//! immediately. Long-running loops observe it at their next check point and
//! unwind with [`Error::Interrupted`].

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct State {
    flag: Mutex<bool>,
    wake: Condvar,
}

/// A shareable interrupt flag.
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    state: Arc<State>,
}

static GLOBAL: OnceLock<Interrupt> = OnceLock::new();

impl Interrupt {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide flag, for hosts with a single automation run.
    pub fn global() -> Interrupt {
        GLOBAL.get_or_init(Interrupt::new).clone()
    }

    /// Request cancellation and wake all sleepers.
    pub fn set(&self) {
        let mut flag = self.state.flag.lock();
        *flag = true;
        self.state.wake.notify_all();
    }

    pub fn clear(&self) {
        *self.state.flag.lock() = false;
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        *self.state.flag.lock()
    }

    /// Fail with [`Error::Interrupted`] if the flag is set.
    pub fn check(&self) -> Result<()> {
        if self.is_set() {
            return Err(Error::Interrupted);
        }
        Ok(())
    }

    /// Sleep for `duration` unless the flag is raised first.
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        let mut flag = self.state.flag.lock();
        if !*flag && !duration.is_zero() {
            self.state
                .wake
                .wait_while_for(&mut flag, |raised| !*raised, duration);
        }
        if *flag {
            return Err(Error::Interrupted);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Instant;

    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let a = Interrupt::new();
        let b = a.clone();
        assert!(a.check().is_ok());
        b.set();
        assert!(a.is_set());
        assert!(a.check().unwrap_err().is_cancellation());
        a.clear();
        assert!(!b.is_set());
    }

    #[test]
    fn global_flag_is_shared_process_wide() {
        let a = Interrupt::global();
        let b = Interrupt::global();
        assert!(!a.is_set());
        b.set();
        assert!(a.is_set());
        assert!(!Interrupt::new().is_set());
        a.clear();
        assert!(!Interrupt::global().is_set());
    }

    #[test]
    fn sleep_completes_when_not_interrupted() {
        let interrupt = Interrupt::new();
        let start = Instant::now();
        interrupt.sleep(Duration::from_millis(20)).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn set_wakes_sleeper_early() {
        let interrupt = Interrupt::new();
        let remote = interrupt.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            remote.set();
        });

        let start = Instant::now();
        let err = interrupt.sleep(Duration::from_secs(10)).unwrap_err();
        assert!(matches!(err, Error::Interrupted));
        assert!(start.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn sleep_fails_fast_when_already_set() {
        let interrupt = Interrupt::new();
        interrupt.set();
        let start = Instant::now();
        assert!(interrupt.sleep(Duration::from_secs(10)).is_err());
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
