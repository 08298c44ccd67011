//! Test helpers: synthetic frames, a scripted device and a colour-keyed OCR
//! engine.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use image::{Rgb, RgbImage};
use parking_lot::Mutex;

use crate::config::Config;
use crate::context::Context;
use crate::device::Device;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::geometry::{Point, Rect, Size};
use crate::vision::ocr::{OcrEngine, OcrLanguage, TextBox};

pub(crate) const RED: [u8; 3] = [220, 30, 30];
pub(crate) const GREEN: [u8; 3] = [30, 180, 60];
pub(crate) const BLUE: [u8; 3] = [40, 60, 210];

pub(crate) fn solid_frame(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
    Frame::new(RgbImage::from_pixel(width, height, Rgb(rgb)))
}

/// Paint `rect` (clamped to the image) with a solid colour.
pub(crate) fn fill_rect(image: &mut RgbImage, rect: Rect, rgb: [u8; 3]) {
    let Some(area) = rect.clamp_to(Size::new(image.width(), image.height())) else {
        return;
    };
    for y in area.y..area.bottom() {
        for x in area.x..area.right() {
            image.put_pixel(x as u32, y as u32, Rgb(rgb));
        }
    }
}

/// White frame with solid colour blocks standing in for text.
pub(crate) fn text_frame(width: u32, height: u32, blocks: &[(Rect, [u8; 3])]) -> Frame {
    let mut image = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    for (rect, rgb) in blocks {
        fill_rect(&mut image, *rect, *rgb);
    }
    Frame::new(image)
}

/// Deterministic high-variance pixels, distinct per seed.
pub(crate) fn pattern_image(width: u32, height: u32, seed: u64) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let mut v = u64::from(x).wrapping_mul(0x9E37_79B9_7F4A_7C15)
            ^ u64::from(y).wrapping_mul(0xC2B2_AE3D_27D4_EB4F)
            ^ seed.wrapping_add(1).wrapping_mul(0x1656_67B1_9E37_79F9);
        v ^= v >> 29;
        v = v.wrapping_mul(0xBF58_476D_1CE4_E5B9);
        v ^= v >> 32;
        Rgb([v as u8, (v >> 8) as u8, (v >> 16) as u8])
    })
}

pub(crate) fn paste(image: &mut RgbImage, patch: &RgbImage, x: u32, y: u32) {
    image::imageops::replace(image, patch, i64::from(x), i64::from(y));
}

/// Fast timings so polling tests finish quickly.
pub(crate) fn test_context(device: MockDevice, ocr: Option<BlockOcr>) -> Context {
    let mut config = Config::default();
    config.timing.dispatch_interval_ms = 5;
    config.timing.wait_interval_ms = 5;
    config.timing.wait_timeout_ms = 300;

    let mut builder = Context::builder(device).config(config);
    if let Some(engine) = ocr {
        builder = builder.ocr_engine(OcrLanguage::Japanese, Arc::new(engine));
    }
    builder.build().expect("test context")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MockEvent {
    Screenshot,
    Click(Point),
    Swipe(Point, Point),
    Launch(String),
}

/// Device serving a scripted frame sequence; the last frame repeats.
pub(crate) struct MockDevice {
    frames: VecDeque<Frame>,
    last: Option<Frame>,
    events: Arc<Mutex<Vec<MockEvent>>>,
}

/// Test-side view of what a [`MockDevice`] was asked to do.
#[derive(Clone)]
pub(crate) struct MockProbe {
    events: Arc<Mutex<Vec<MockEvent>>>,
}

impl MockDevice {
    pub(crate) fn new(frames: Vec<Frame>) -> (Self, MockProbe) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let device = Self {
            frames: frames.into(),
            last: None,
            events: Arc::clone(&events),
        };
        (device, MockProbe { events })
    }

    fn record(&self, event: MockEvent) {
        self.events.lock().push(event);
    }
}

impl Device for MockDevice {
    fn screenshot(&mut self) -> Result<Frame> {
        if let Some(next) = self.frames.pop_front() {
            self.last = Some(next);
        }
        let frame = self
            .last
            .clone()
            .ok_or_else(|| Error::device("no scripted frames"))?;
        self.record(MockEvent::Screenshot);
        Ok(frame)
    }

    fn click(&mut self, point: Point) -> Result<()> {
        self.record(MockEvent::Click(point));
        Ok(())
    }

    fn swipe(&mut self, from: Point, to: Point, _duration: Option<Duration>) -> Result<()> {
        self.record(MockEvent::Swipe(from, to));
        Ok(())
    }

    fn current_package(&mut self) -> Result<String> {
        Ok("com.example.game".to_string())
    }

    fn launch_app(&mut self, package: &str) -> Result<()> {
        self.record(MockEvent::Launch(package.to_string()));
        Ok(())
    }

    fn screen_size(&mut self) -> Result<Size> {
        self.last
            .as_ref()
            .or_else(|| self.frames.front())
            .map(Frame::size)
            .ok_or_else(|| Error::device("no scripted frames"))
    }
}

impl MockProbe {
    pub(crate) fn events(&self) -> Vec<MockEvent> {
        self.events.lock().clone()
    }

    pub(crate) fn clicks(&self) -> Vec<Point> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                MockEvent::Click(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn screenshots(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, MockEvent::Screenshot))
            .count()
    }
}

/// OCR engine that "reads" solid colour blocks as fixed strings.
///
/// Each configured colour maps to one text line whose box is the bounding
/// box of all pixels of that colour. Input sizes are recorded so tests can
/// check cropping and padding.
pub(crate) struct BlockOcr {
    blocks: Vec<([u8; 3], String)>,
    inputs: Arc<Mutex<Vec<Size>>>,
}

impl BlockOcr {
    pub(crate) fn new(blocks: &[([u8; 3], &str)]) -> Self {
        Self {
            blocks: blocks
                .iter()
                .map(|(rgb, text)| (*rgb, (*text).to_string()))
                .collect(),
            inputs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn inputs(&self) -> Arc<Mutex<Vec<Size>>> {
        Arc::clone(&self.inputs)
    }
}

impl OcrEngine for BlockOcr {
    fn recognize(&self, image: &RgbImage) -> Result<Vec<TextBox>> {
        self.inputs.lock().push(Size::new(image.width(), image.height()));

        let mut boxes = Vec::new();
        for (rgb, text) in &self.blocks {
            let mut corners: Option<(u32, u32, u32, u32)> = None;
            for (x, y, px) in image.enumerate_pixels() {
                if px.0 != *rgb {
                    continue;
                }
                corners = Some(match corners {
                    None => (x, y, x, y),
                    Some((x1, y1, x2, y2)) => (x1.min(x), y1.min(y), x2.max(x), y2.max(y)),
                });
            }
            if let Some((x1, y1, x2, y2)) = corners {
                let (x1, y1) = (x1 as i32, y1 as i32);
                let (x2, y2) = (x2 as i32 + 1, y2 as i32 + 1);
                boxes.push(TextBox {
                    text: text.clone(),
                    quad: [
                        Point::new(x1, y1),
                        Point::new(x2, y1),
                        Point::new(x2, y2),
                        Point::new(x1, y2),
                    ],
                    confidence: 0.99,
                });
            }
        }
        boxes.sort_by_key(|b| (b.quad[0].y, b.quad[0].x));
        Ok(boxes)
    }
}
