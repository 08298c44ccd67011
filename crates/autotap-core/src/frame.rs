//! Captured screen frames.
//!
//! A [`Frame`] is an immutable pixel buffer shared by reference counting.
//! Recognition never mutates a frame in place; crops produce new frames with
//! their own storage so that a crop taken in one scope can never alias a
//! buffer owned by another.
//!
//! Pixels are stored as 8-bit RGB, origin top-left. Every frame gets a
//! process-unique `id` so logs can tell captures apart.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use image::{DynamicImage, RgbImage};

use crate::error::{Error, Result};
use crate::geometry::{Rect, Size};

static NEXT_FRAME_ID: AtomicU64 = AtomicU64::new(1);

/// One captured screen image.
#[derive(Clone)]
pub struct Frame {
    id: u64,
    pixels: Arc<RgbImage>,
}

impl Frame {
    pub fn new(pixels: RgbImage) -> Self {
        Self {
            id: NEXT_FRAME_ID.fetch_add(1, Ordering::Relaxed),
            pixels: Arc::new(pixels),
        }
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self::new(image.to_rgb8())
    }

    /// Load a frame from an image file (PNG, JPEG, ...).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let image = image::open(path.as_ref())?;
        Ok(Self::from_dynamic(image))
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    /// The whole frame as a rectangle at the origin.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width(), self.height())
    }

    #[must_use]
    pub fn as_image(&self) -> &RgbImage {
        &self.pixels
    }

    /// RGB value at the given position, or `None` when out of bounds.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        (x < self.width() && y < self.height()).then(|| self.pixels.get_pixel(x, y).0)
    }

    /// Whether both handles point at the same capture.
    #[must_use]
    pub fn same_as(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }

    /// Copy the region under `rect` into a new frame.
    ///
    /// The rectangle is clamped to the frame first; a rectangle that falls
    /// entirely outside is rejected.
    pub fn crop(&self, rect: Rect) -> Result<Frame> {
        let clamped = rect.clamp_to(self.size()).ok_or_else(|| {
            Error::invalid_input(format!(
                "crop region {} lies outside the {} frame",
                rect,
                self.size()
            ))
        })?;
        let view = image::imageops::crop_imm(
            self.pixels.as_ref(),
            clamped.x as u32,
            clamped.y as u32,
            clamped.width,
            clamped.height,
        );
        Ok(Frame::new(view.to_image()))
    }

    /// Write the frame to disk; the format follows the file extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.pixels.save(path.as_ref())?;
        Ok(())
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("size", &self.size())
            .finish()
    }
}

impl From<RgbImage> for Frame {
    fn from(pixels: RgbImage) -> Self {
        Frame::new(pixels)
    }
}
