//! Replay device: serves captured frames from disk and records input.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use autotap_core::{Device, Error, Frame, Point, Result, Size};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

/// One input event, tagged with the frame that was on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplayEvent {
    Click { frame: usize, point: Point },
    Swipe { frame: usize, from: Point, to: Point },
    Launch { frame: usize, package: String },
}

/// What a replay run did, shared between the device and the caller.
#[derive(Debug, Default)]
pub struct ReplayLog {
    served: usize,
    last: Option<Frame>,
    events: Vec<ReplayEvent>,
}

impl ReplayLog {
    /// Number of captures served.
    pub fn served(&self) -> usize {
        self.served
    }

    /// The most recently served frame.
    pub fn last_frame(&self) -> Option<&Frame> {
        self.last.as_ref()
    }

    pub fn events(&self) -> &[ReplayEvent] {
        &self.events
    }
}

/// [`Device`] backed by an ordered list of frames; one frame per capture.
pub struct ReplayDevice {
    frames: VecDeque<Frame>,
    hold_last: bool,
    log: Arc<Mutex<ReplayLog>>,
}

impl ReplayDevice {
    pub fn new(frames: Vec<Frame>, hold_last: bool) -> Self {
        Self {
            frames: frames.into(),
            hold_last,
            log: Arc::new(Mutex::new(ReplayLog::default())),
        }
    }

    /// Read every image in `dir`, in file-name order.
    pub fn open_dir(dir: &Path, hold_last: bool) -> anyhow::Result<Self> {
        let paths = frame_paths(dir)?;
        if paths.is_empty() {
            anyhow::bail!("no frames found in {}", dir.display());
        }
        let frames = paths
            .iter()
            .map(|path| {
                Frame::open(path).with_context(|| format!("failed to read {}", path.display()))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        info!(dir = %dir.display(), frames = frames.len(), "loaded replay frames");
        Ok(Self::new(frames, hold_last))
    }

    pub fn log(&self) -> Arc<Mutex<ReplayLog>> {
        Arc::clone(&self.log)
    }

    fn current_index(&self) -> usize {
        self.log.lock().served.saturating_sub(1)
    }

    fn record(&self, event: ReplayEvent) {
        debug!(?event, "replay input");
        self.log.lock().events.push(event);
    }
}

impl Device for ReplayDevice {
    fn screenshot(&mut self) -> Result<Frame> {
        let mut log = self.log.lock();
        let frame = match self.frames.pop_front() {
            Some(frame) => frame,
            None if self.hold_last => log
                .last
                .clone()
                .ok_or_else(|| Error::device("replay has no frames"))?,
            None => {
                return Err(Error::device(format!(
                    "replay exhausted after {} frames",
                    log.served
                )))
            }
        };
        log.served += 1;
        log.last = Some(frame.clone());
        Ok(frame)
    }

    fn click(&mut self, point: Point) -> Result<()> {
        let frame = self.current_index();
        self.record(ReplayEvent::Click { frame, point });
        Ok(())
    }

    fn swipe(&mut self, from: Point, to: Point, _duration: Option<Duration>) -> Result<()> {
        let frame = self.current_index();
        self.record(ReplayEvent::Swipe { frame, from, to });
        Ok(())
    }

    fn current_package(&mut self) -> Result<String> {
        Ok("replay".to_string())
    }

    fn launch_app(&mut self, package: &str) -> Result<()> {
        let frame = self.current_index();
        self.record(ReplayEvent::Launch {
            frame,
            package: package.to_string(),
        });
        Ok(())
    }

    fn screen_size(&mut self) -> Result<Size> {
        let log = self.log.lock();
        log.last
            .as_ref()
            .or_else(|| self.frames.front())
            .map(Frame::size)
            .ok_or_else(|| Error::device("replay has no frames"))
    }
}

/// Image files directly inside `dir`, sorted by file name.
fn frame_paths(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))?
    {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg" | "bmp"))
            .unwrap_or(false);
        if path.is_file() && is_image {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
