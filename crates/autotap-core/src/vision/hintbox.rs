//! Named regions defined against a reference resolution.

use serde::{Deserialize, Serialize};

use crate::geometry::{Rect, Size};

/// Resolution hint boxes are authored against unless stated otherwise.
pub const DEFAULT_SOURCE_RESOLUTION: Size = Size::new(720, 1280);

/// A screen region where an element is expected to appear.
///
/// Coordinates are corners in `source_resolution` pixel space and get
/// scaled to the actual frame size before use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_source_resolution")]
    pub source_resolution: Size,
}

fn default_source_resolution() -> Size {
    DEFAULT_SOURCE_RESOLUTION
}

impl HintBox {
    #[must_use]
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            name: None,
            description: None,
            source_resolution: DEFAULT_SOURCE_RESOLUTION,
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_source_resolution(mut self, resolution: Size) -> Self {
        self.source_resolution = resolution;
        self
    }

    /// The region in source-resolution coordinates.
    #[must_use]
    pub fn rect(&self) -> Rect {
        Rect::from_corners(self.x1, self.y1, self.x2, self.y2)
    }

    /// The region scaled to a frame of size `frame`.
    #[must_use]
    pub fn rect_for(&self, frame: Size) -> Rect {
        let src = self.source_resolution;
        if src == frame || src.is_empty() {
            return self.rect();
        }
        let sx = f64::from(frame.width) / f64::from(src.width);
        let sy = f64::from(frame.height) / f64::from(src.height);
        let scale = |v: i32, s: f64| (f64::from(v) * s).round() as i32;
        Rect::from_corners(
            scale(self.x1, sx),
            scale(self.y1, sy),
            scale(self.x2, sx),
            scale(self.y2, sy),
        )
    }
}
