//! OCR pipeline over explicit frames.
//!
//! The engine itself is a collaborator behind [`OcrEngine`]. This module
//! owns everything around it:
//!
//! 1. crop the frame to the search rectangle;
//! 2. pad small crops to the engine's minimum input size (centred, never
//!    rescaled), since detectors miss text on tiny inputs;
//! 3. NFKC-normalize recognized text so full-width digits and compatibility
//!    forms compare equal to their ASCII spellings;
//! 4. map each box back to frame coordinates and clamp it to the crop.

mod pattern;

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use image::{Rgb as Pixel, RgbImage};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

pub use pattern::{EqualsOptions, PredicateCache, StringMatcher, TextPattern};

use crate::config::OcrConfig;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::geometry::{Point, Rect, Size};
use crate::vision::hintbox::HintBox;
use crate::vision::image::Located;

/// Recognition language; each has its own engine instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OcrLanguage {
    #[default]
    #[serde(rename = "ja")]
    Japanese,
    #[serde(rename = "en")]
    English,
}

impl fmt::Display for OcrLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OcrLanguage::Japanese => write!(f, "ja"),
            OcrLanguage::English => write!(f, "en"),
        }
    }
}

/// One line of text as reported by an engine, in input-image coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBox {
    pub text: String,
    /// Corner points, clockwise from top-left.
    pub quad: [Point; 4],
    pub confidence: f32,
}

/// Text detection and recognition backend.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &RgbImage) -> Result<Vec<TextBox>>;
}

/// One recognized line in frame coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrResult {
    pub text: String,
    pub rect: Rect,
    pub confidence: f32,
}

impl OcrResult {
    /// Every match of `re` in the text.
    #[must_use]
    pub fn regex(&self, re: &Regex) -> Vec<String> {
        re.find_iter(&self.text).map(|m| m.as_str().to_string()).collect()
    }

    /// Every run of ASCII digits in the text, parsed.
    #[must_use]
    pub fn numbers(&self) -> Vec<i64> {
        self.text
            .split(|c: char| !c.is_ascii_digit())
            .filter(|run| !run.is_empty())
            .filter_map(|run| run.parse().ok())
            .collect()
    }
}

impl Located for OcrResult {
    fn rect(&self) -> Rect {
        self.rect
    }
}

impl fmt::Display for OcrResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.text, self.rect)
    }
}

/// Ordered list of OCR results.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OcrResultList(Vec<OcrResult>);

impl OcrResultList {
    #[must_use]
    pub fn first(&self) -> Option<&OcrResult> {
        self.0.first()
    }

    /// Results whose text satisfies `pattern`, in order.
    #[must_use]
    pub fn filter(&self, pattern: &TextPattern) -> OcrResultList {
        OcrResultList(
            self.0
                .iter()
                .filter(|r| pattern.is_match(&r.text))
                .cloned()
                .collect(),
        )
    }

    /// First result whose text satisfies `pattern`.
    #[must_use]
    pub fn find(&self, pattern: &TextPattern) -> Option<&OcrResult> {
        self.0.iter().find(|r| pattern.is_match(&r.text))
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|r| r.text.as_str())
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<OcrResult> {
        self.0
    }
}

impl Deref for OcrResultList {
    type Target = [OcrResult];

    fn deref(&self) -> &[OcrResult] {
        &self.0
    }
}

impl From<Vec<OcrResult>> for OcrResultList {
    fn from(results: Vec<OcrResult>) -> Self {
        OcrResultList(results)
    }
}

impl IntoIterator for OcrResultList {
    type Item = OcrResult;
    type IntoIter = std::vec::IntoIter<OcrResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// NFKC-normalize recognized text.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.nfkc().collect()
}

/// Pad `image` to at least `min` on each axis, centring the original.
///
/// Returns the padded image and the offset of the original inside it.
#[must_use]
pub fn pad_to(image: &RgbImage, min: Size, fill: [u8; 3]) -> (RgbImage, (u32, u32)) {
    let (w, h) = image.dimensions();
    if w >= min.width && h >= min.height {
        return (image.clone(), (0, 0));
    }
    let pw = w.max(min.width);
    let ph = h.max(min.height);
    let ox = (pw - w) / 2;
    let oy = (ph - h) / 2;
    let mut padded = RgbImage::from_pixel(pw, ph, Pixel(fill));
    image::imageops::replace(&mut padded, image, i64::from(ox), i64::from(oy));
    (padded, (ox, oy))
}

/// OCR bound to one engine and the OCR settings.
#[derive(Clone)]
pub struct TextSearch {
    engine: Arc<dyn OcrEngine>,
    config: OcrConfig,
}

impl TextSearch {
    pub fn new(engine: Arc<dyn OcrEngine>, config: OcrConfig) -> Self {
        Self { engine, config }
    }

    /// Recognize all text, optionally inside `rect`.
    pub fn ocr(&self, frame: &Frame, rect: Option<Rect>) -> Result<OcrResultList> {
        let area = match rect {
            Some(rect) => rect.clamp_to(frame.size()).ok_or_else(|| {
                Error::invalid_input(format!(
                    "OCR region {} lies outside the {} frame",
                    rect,
                    frame.size()
                ))
            })?,
            None => frame.bounds(),
        };
        let crop = if area == frame.bounds() {
            frame.clone()
        } else {
            frame.crop(area)?
        };

        let (input, (ox, oy)) = if self.config.pad {
            pad_to(crop.as_image(), self.config.min_size, self.config.pad_color)
        } else {
            (crop.as_image().clone(), (0, 0))
        };

        let boxes = self.engine.recognize(&input)?;
        let local_bounds = Rect::new(0, 0, area.width, area.height);
        let results: Vec<OcrResult> = boxes
            .into_iter()
            .filter_map(|b| {
                let rect = Rect::bounding(&b.quad)?
                    .translate(-(ox as i32), -(oy as i32))
                    .intersect(&local_bounds)?
                    .translate(area.x, area.y);
                Some(OcrResult {
                    text: normalize_text(&b.text),
                    rect,
                    confidence: b.confidence,
                })
            })
            .collect();

        debug!(
            frame = frame.id(),
            region = %area,
            padded = %Size::new(input.width(), input.height()),
            lines = results.len(),
            "ocr"
        );
        Ok(OcrResultList(results))
    }

    /// First line matching `pattern`.
    ///
    /// With a hint box, only the hinted region is read first; the whole of
    /// `rect` (or the frame) is read only if that finds nothing.
    pub fn find(
        &self,
        frame: &Frame,
        pattern: &TextPattern,
        hint: Option<&HintBox>,
        rect: Option<Rect>,
    ) -> Result<Option<OcrResult>> {
        if let Some(hint) = hint {
            let hinted = hint.rect_for(frame.size());
            if hinted.clamp_to(frame.size()).is_some() {
                if let Some(hit) = self.ocr(frame, Some(hinted))?.find(pattern) {
                    return Ok(Some(hit.clone()));
                }
                debug!(hint = ?hint.name, %pattern, "hint box miss, searching full region");
            }
        }
        Ok(self.ocr(frame, rect)?.find(pattern).cloned())
    }

    /// One slot per pattern: the first line matching it, if any.
    ///
    /// The hint region is read first; the full region is read once, only
    /// if some slot is still empty.
    pub fn find_all(
        &self,
        frame: &Frame,
        patterns: &[TextPattern],
        hint: Option<&HintBox>,
        rect: Option<Rect>,
    ) -> Result<Vec<Option<OcrResult>>> {
        let mut slots: Vec<Option<OcrResult>> = vec![None; patterns.len()];
        if let Some(hint) = hint {
            let hinted = hint.rect_for(frame.size());
            if hinted.clamp_to(frame.size()).is_some() {
                let lines = self.ocr(frame, Some(hinted))?;
                for (slot, pattern) in slots.iter_mut().zip(patterns) {
                    *slot = lines.find(pattern).cloned();
                }
            }
        }
        if slots.iter().any(Option::is_none) {
            let lines = self.ocr(frame, rect)?;
            for (slot, pattern) in slots.iter_mut().zip(patterns) {
                if slot.is_none() {
                    *slot = lines.find(pattern).cloned();
                }
            }
        }
        Ok(slots)
    }

    /// Like [`TextSearch::find`], failing with `TextNotFound`.
    pub fn expect(
        &self,
        frame: &Frame,
        pattern: &TextPattern,
        hint: Option<&HintBox>,
        rect: Option<Rect>,
    ) -> Result<OcrResult> {
        self.find(frame, pattern, hint, rect)?
            .ok_or_else(|| Error::TextNotFound {
                pattern: pattern.to_string(),
                frame: frame.clone(),
            })
    }
}

impl fmt::Debug for TextSearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextSearch")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{text_frame, BlockOcr, GREEN, RED};

    fn search(engine: BlockOcr, pad: bool) -> TextSearch {
        let config = OcrConfig {
            pad,
            ..OcrConfig::default()
        };
        TextSearch::new(Arc::new(engine), config)
    }

    #[test]
    fn normalizes_full_width_text() {
        assert_eq!(normalize_text("ＯＫ１２３"), "OK123");
        assert_eq!(normalize_text("ｽｷｯﾌﾟ"), "スキップ");
    }

    #[test]
    fn pad_centres_small_images() {
        let image = RgbImage::from_pixel(10, 700, Pixel([0, 0, 0]));
        let (padded, offset) = pad_to(&image, Size::new(631, 631), [255, 255, 255]);
        assert_eq!(padded.dimensions(), (631, 700));
        assert_eq!(offset, (310, 0));
        assert_eq!(padded.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(padded.get_pixel(310, 0).0, [0, 0, 0]);
    }

    #[test]
    fn large_images_are_not_padded() {
        let image = RgbImage::new(700, 700);
        let (padded, offset) = pad_to(&image, Size::new(631, 631), [255, 255, 255]);
        assert_eq!(padded.dimensions(), (700, 700));
        assert_eq!(offset, (0, 0));
    }

    #[test]
    fn rect_ocr_reports_frame_coordinates() {
        let frame = text_frame(400, 300, &[(Rect::new(220, 140, 40, 12), RED)]);
        let engine = BlockOcr::new(&[(RED, "ＯＫ")]);
        let inputs = engine.inputs();
        let search = search(engine, true);

        let lines = search.ocr(&frame, Some(Rect::new(200, 100, 100, 100))).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "OK");
        assert_eq!(lines[0].rect, Rect::new(220, 140, 40, 12));
        assert_eq!(inputs.lock().as_slice(), &[Size::new(631, 631)]);
    }

    #[test]
    fn unpadded_ocr_sees_raw_crop() {
        let frame = text_frame(400, 300, &[(Rect::new(220, 140, 40, 12), RED)]);
        let engine = BlockOcr::new(&[(RED, "OK")]);
        let inputs = engine.inputs();
        let search = search(engine, false);

        let lines = search.ocr(&frame, Some(Rect::new(200, 100, 100, 100))).unwrap();
        assert_eq!(lines[0].rect, Rect::new(220, 140, 40, 12));
        assert_eq!(inputs.lock().as_slice(), &[Size::new(100, 100)]);
    }

    #[test]
    fn boxes_are_clamped_to_the_search_rect() {
        let frame = text_frame(400, 300, &[(Rect::new(180, 140, 40, 12), RED)]);
        let search = search(BlockOcr::new(&[(RED, "OK")]), true);

        let lines = search.ocr(&frame, Some(Rect::new(200, 100, 100, 100))).unwrap();
        assert_eq!(lines[0].rect, Rect::new(200, 140, 20, 12));
    }

    #[test]
    fn hint_box_is_tried_first() {
        let frame = text_frame(
            720,
            1280,
            &[
                (Rect::new(50, 50, 30, 10), RED),
                (Rect::new(500, 900, 30, 10), GREEN),
            ],
        );
        let engine = BlockOcr::new(&[(RED, "OK"), (GREEN, "OK")]);
        let inputs = engine.inputs();
        let search = search(engine, false);
        let hint = HintBox::new(480, 880, 560, 930).named("lower_ok");

        let hit = search
            .find(&frame, &TextPattern::from("OK"), Some(&hint), None)
            .unwrap()
            .unwrap();
        assert_eq!(hit.rect, Rect::new(500, 900, 30, 10));
        assert_eq!(inputs.lock().len(), 1);
    }

    #[test]
    fn hint_box_miss_falls_back_to_full_frame() {
        let frame = text_frame(720, 1280, &[(Rect::new(50, 50, 30, 10), RED)]);
        let engine = BlockOcr::new(&[(RED, "OK")]);
        let inputs = engine.inputs();
        let search = search(engine, false);
        let hint = HintBox::new(480, 880, 560, 930);

        let hit = search
            .find(&frame, &TextPattern::from("OK"), Some(&hint), None)
            .unwrap()
            .unwrap();
        assert_eq!(hit.rect, Rect::new(50, 50, 30, 10));
        assert_eq!(inputs.lock().len(), 2);
    }

    #[test]
    fn find_all_returns_one_slot_per_pattern() {
        let frame = text_frame(300, 200, &[(Rect::new(10, 10, 20, 10), RED)]);
        let search = search(BlockOcr::new(&[(RED, "Start")]), false);

        let slots = search
            .find_all(
                &frame,
                &[TextPattern::from("Start"), TextPattern::from("Cancel")],
                None,
                None,
            )
            .unwrap();
        assert_eq!(slots.len(), 2);
        assert!(slots[0].is_some());
        assert!(slots[1].is_none());
    }

    #[test]
    fn find_all_falls_back_only_for_missing_slots() {
        let frame = text_frame(
            300,
            200,
            &[
                (Rect::new(10, 10, 20, 10), RED),
                (Rect::new(200, 150, 20, 10), GREEN),
            ],
        );
        let engine = BlockOcr::new(&[(RED, "Start"), (GREEN, "Cancel")]);
        let inputs = engine.inputs();
        let search = search(engine, false);
        let hint = HintBox::new(0, 0, 100, 100).with_source_resolution(Size::new(300, 200));

        let slots = search
            .find_all(&frame, &["Start".into()], Some(&hint), None)
            .unwrap();
        assert!(slots[0].is_some());
        assert_eq!(inputs.lock().len(), 1);

        let slots = search
            .find_all(&frame, &["Start".into(), "Cancel".into()], Some(&hint), None)
            .unwrap();
        assert_eq!(slots[1].as_ref().map(|r| r.rect), Some(Rect::new(200, 150, 20, 10)));
        assert_eq!(inputs.lock().len(), 3);
    }

    #[test]
    fn expect_reports_pattern() {
        let frame = text_frame(100, 100, &[]);
        let search = search(BlockOcr::new(&[]), false);
        let err = search
            .expect(&frame, &StringMatcher::contains("OK").into(), None, None)
            .unwrap_err();
        assert!(matches!(err, Error::TextNotFound { ref pattern, .. } if pattern == "contains('OK')"));
    }

    #[test]
    fn result_helpers() {
        let result = OcrResult {
            text: "PT 120 / 3500".into(),
            rect: Rect::new(0, 0, 1, 1),
            confidence: 0.9,
        };
        assert_eq!(result.numbers(), vec![120, 3500]);
        let re = Regex::new(r"\d+").unwrap();
        assert_eq!(result.regex(&re), vec!["120", "3500"]);

        let list = OcrResultList::from(vec![result.clone()]);
        assert_eq!(list.first(), Some(&result));
        assert!(list.filter(&TextPattern::from("nope")).is_empty());
        assert_eq!(list.texts().collect::<Vec<_>>(), vec!["PT 120 / 3500"]);
    }
}
