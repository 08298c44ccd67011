//! Perception and dispatch core for autotap.
//!
//! This crate turns screenshots of a remote screen into ranked hits and
//! drives "read the latest frame, decide, act" loops against it. The device
//! transport, the OCR model and task logic are supplied by the host.
//!
//! # Modules
//!
//! - [`context`]: execution context, scope stack and interrupt flag
//! - [`recognition`]: scope-aware image, text and colour lookups
//! - [`vision`]: recognition primitives over explicit frames
//! - [`dispatch`]: polling rule dispatcher
//! - [`device`]: the device capability the core drives
//! - [`config`]: tunable thresholds, offsets and intervals
//! - [`error`]: error taxonomy with actionable suggestions
//!
//! # Screenshot Modes
//!
//! Every recognition call reads its frame through the current scope:
//!
//! | Mode | Frame per read | Typical use |
//! |------|----------------|-------------|
//! | **auto** | fresh capture | waits, dispatchers |
//! | **manual** | cached until replaced | several checks on one capture |
//! | **manual-inherit** | parent's frame once, then cached | helpers called from a manual scope |
//!
//! Successful `find`/`expect` calls remember their rectangle as the *last
//! hit*; `ctx.device().click()` with no arguments taps its center.

pub mod config;
pub mod context;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod recognition;
pub mod timing;
pub mod vision;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use context::{Context, ContextBuilder, Interrupt, ScopeGuard, ScreenshotMode};
pub use device::{Device, DeviceHandle};
pub use dispatch::{run_fn, Dispatcher, DispatcherContext, FnDispatcher, Target};
pub use error::{Error, ErrorCode, Result};
pub use frame::Frame;
pub use geometry::{Point, Rect, Size};
