//! Device capability used by the core.
//!
//! The core never talks to a transport directly. Hosts implement [`Device`]
//! for their backend (ADB, a window capture API, a replay directory) and hand
//! it to [`crate::Context::builder`].

use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::geometry::{Point, Rect, Size};

/// Input and capture operations on a target screen.
pub trait Device: Send {
    /// Capture the current screen.
    fn screenshot(&mut self) -> Result<Frame>;

    fn click(&mut self, point: Point) -> Result<()>;

    /// Drag from `from` to `to`. `None` lets the backend pick a duration.
    fn swipe(&mut self, from: Point, to: Point, duration: Option<Duration>) -> Result<()>;

    /// Identifier of the foreground application.
    fn current_package(&mut self) -> Result<String>;

    fn launch_app(&mut self, package: &str) -> Result<()>;

    fn screen_size(&mut self) -> Result<Size>;
}

/// Shared handle to the device plus the last recognition hit.
///
/// The last hit is what a zero-argument [`DeviceHandle::click`] targets.
pub struct DeviceHandle {
    device: Mutex<Box<dyn Device>>,
    last_hit: Mutex<Option<Rect>>,
}

impl DeviceHandle {
    pub fn new(device: Box<dyn Device>) -> Self {
        Self {
            device: Mutex::new(device),
            last_hit: Mutex::new(None),
        }
    }

    pub(crate) fn capture(&self) -> Result<Frame> {
        let frame = self.device.lock().screenshot()?;
        debug!(frame = frame.id(), size = %frame.size(), "captured frame");
        Ok(frame)
    }

    /// Click the center of the most recent recognition hit.
    pub fn click(&self) -> Result<()> {
        let rect = self.last_hit().ok_or_else(|| {
            Error::invalid_input("no previous recognition result to click")
        })?;
        self.click_rect(rect)
    }

    pub fn click_point(&self, point: Point) -> Result<()> {
        debug!(%point, "click");
        self.device.lock().click(point)
    }

    /// Click the center of `rect`.
    pub fn click_rect(&self, rect: Rect) -> Result<()> {
        self.click_point(rect.center())
    }

    /// Click the center of the screen.
    pub fn click_center(&self) -> Result<()> {
        let size = self.screen_size()?;
        self.click_rect(Rect::new(0, 0, size.width, size.height))
    }

    pub fn swipe(&self, from: Point, to: Point, duration: Option<Duration>) -> Result<()> {
        debug!(%from, %to, ?duration, "swipe");
        self.device.lock().swipe(from, to, duration)
    }

    pub fn current_package(&self) -> Result<String> {
        self.device.lock().current_package()
    }

    pub fn launch_app(&self, package: &str) -> Result<()> {
        debug!(package, "launch app");
        self.device.lock().launch_app(package)
    }

    pub fn screen_size(&self) -> Result<Size> {
        self.device.lock().screen_size()
    }

    #[must_use]
    pub fn last_hit(&self) -> Option<Rect> {
        *self.last_hit.lock()
    }

    pub fn set_last_hit(&self, rect: Rect) {
        *self.last_hit.lock() = Some(rect);
    }

    pub fn clear_last_hit(&self) {
        *self.last_hit.lock() = None;
    }
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("last_hit", &self.last_hit())
            .finish_non_exhaustive()
    }
}
