//! Scope stack governing when a new screenshot is taken.
//!
//! Each scope carries a [`ScreenshotMode`]. Only the top scope is current;
//! every recognition call resolves its frame through it.
//!
//! | Mode | Read behaviour |
//! |------|----------------|
//! | `auto` | every read captures a fresh frame and caches it |
//! | `manual` | returns the cached frame, fails if none was supplied |
//! | `manual-inherit` | first read consumes the parent's frame, then `manual` |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::frame::Frame;

/// Frame acquisition policy of a scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScreenshotMode {
    #[default]
    Auto,
    Manual,
    ManualInherit,
}

impl fmt::Display for ScreenshotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScreenshotMode::Auto => write!(f, "auto"),
            ScreenshotMode::Manual => write!(f, "manual"),
            ScreenshotMode::ManualInherit => write!(f, "manual-inherit"),
        }
    }
}

impl FromStr for ScreenshotMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(ScreenshotMode::Auto),
            "manual" => Ok(ScreenshotMode::Manual),
            "manual-inherit" => Ok(ScreenshotMode::ManualInherit),
            other => Err(Error::invalid_input(format!(
                "unsupported screenshot mode '{}', expected auto, manual or manual-inherit",
                other
            ))),
        }
    }
}

impl ScreenshotMode {
    #[must_use]
    pub fn is_manual(&self) -> bool {
        !matches!(self, ScreenshotMode::Auto)
    }
}

/// One entry of the scope stack.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    mode: ScreenshotMode,
    frame: Option<Frame>,
    inherited: Option<Frame>,
}

impl Scope {
    #[must_use]
    pub fn new(mode: ScreenshotMode) -> Self {
        Self {
            mode,
            frame: None,
            inherited: None,
        }
    }

    #[must_use]
    pub fn mode(&self) -> ScreenshotMode {
        self.mode
    }

    /// The cached frame, without triggering any capture.
    #[must_use]
    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    /// Whether a one-shot inherited frame is still pending.
    #[must_use]
    pub fn has_inherited(&self) -> bool {
        self.inherited.is_some()
    }
}

/// LIFO stack of scopes.
#[derive(Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Push a new scope and return the resulting depth.
    ///
    /// A `manual-inherit` scope snapshots the parent's cached frame, if any,
    /// as its one-shot inherited frame.
    pub fn push(&mut self, mode: ScreenshotMode) -> usize {
        let mut scope = Scope::new(mode);
        if mode == ScreenshotMode::ManualInherit {
            scope.inherited = self.scopes.last().and_then(|parent| parent.frame.clone());
        }
        self.scopes.push(scope);
        self.scopes.len()
    }

    pub fn pop(&mut self) -> Result<Scope> {
        self.scopes.pop().ok_or(Error::NoActiveScope)
    }

    pub fn current(&self) -> Result<&Scope> {
        self.scopes.last().ok_or(Error::NoActiveScope)
    }

    fn current_mut(&mut self) -> Result<&mut Scope> {
        self.scopes.last_mut().ok_or(Error::NoActiveScope)
    }

    /// Read the current scope's frame according to its mode.
    ///
    /// `capture` is only invoked in `auto` mode.
    pub fn read(&mut self, capture: impl FnOnce() -> Result<Frame>) -> Result<Frame> {
        let scope = self.current_mut()?;
        match scope.mode {
            ScreenshotMode::Auto => {
                let frame = capture()?;
                scope.frame = Some(frame.clone());
                Ok(frame)
            }
            ScreenshotMode::ManualInherit if scope.inherited.is_some() => scope
                .inherited
                .take()
                .ok_or(Error::NoFrameAvailable { mode: scope.mode }),
            ScreenshotMode::Manual | ScreenshotMode::ManualInherit => scope
                .frame
                .clone()
                .ok_or(Error::NoFrameAvailable { mode: scope.mode }),
        }
    }

    /// Install `frame` as the current scope's frame.
    pub fn install(&mut self, frame: Frame) -> Result<()> {
        self.current_mut()?.frame = Some(frame);
        Ok(())
    }

    /// Consume the pending inherited frame, if any.
    pub fn take_inherited(&mut self) -> Result<Option<Frame>> {
        Ok(self.current_mut()?.inherited.take())
    }
}
