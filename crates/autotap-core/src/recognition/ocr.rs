use std::time::Duration;

use crate::context::Context;
use crate::error::Result;
use crate::frame::Frame;
use crate::geometry::Rect;
use crate::vision::hintbox::HintBox;
use crate::vision::ocr::{OcrLanguage, OcrResult, OcrResultList, TextPattern};

/// Text recognition in the current scope.
#[derive(Debug, Clone)]
pub struct TextRecognizer<'a> {
    ctx: &'a Context,
    language: OcrLanguage,
    hint: Option<HintBox>,
    rect: Option<Rect>,
    timeout: Option<Duration>,
    interval: Option<Duration>,
}

impl<'a> TextRecognizer<'a> {
    pub(crate) fn new(ctx: &'a Context, language: OcrLanguage) -> Self {
        Self {
            ctx,
            language,
            hint: None,
            rect: None,
            timeout: None,
            interval: None,
        }
    }

    /// Restrict reading to `rect`, in frame coordinates.
    #[must_use]
    pub fn rect(mut self, rect: Rect) -> Self {
        self.rect = Some(rect);
        self
    }

    /// Try this region first before reading the whole search area.
    #[must_use]
    pub fn hint(mut self, hint: HintBox) -> Self {
        self.hint = Some(hint);
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    fn frame(&self) -> Result<Frame> {
        self.ctx.check_interrupt()?;
        self.ctx.frame()
    }

    fn timing(&self) -> (Duration, Duration) {
        let timing = self.ctx.config().timing;
        (
            self.timeout.unwrap_or(timing.wait_timeout()),
            self.interval.unwrap_or(timing.wait_interval()),
        )
    }

    /// Every recognized line, in engine order.
    pub fn ocr(&self) -> Result<OcrResultList> {
        let search = self.ctx.text_search(self.language)?;
        let frame = self.frame()?;
        search.ocr(&frame, self.rect)
    }

    pub fn find(&self, pattern: impl Into<TextPattern>) -> Result<Option<OcrResult>> {
        self.find_pattern(&pattern.into())
    }

    pub(crate) fn find_pattern(&self, pattern: &TextPattern) -> Result<Option<OcrResult>> {
        let search = self.ctx.text_search(self.language)?;
        let frame = self.frame()?;
        let hit = search.find(&frame, pattern, self.hint.as_ref(), self.rect)?;
        if let Some(hit) = &hit {
            self.ctx.device().set_last_hit(hit.rect);
        }
        Ok(hit)
    }

    /// One slot per pattern, from a single capture.
    pub fn find_all(&self, patterns: &[TextPattern]) -> Result<Vec<Option<OcrResult>>> {
        let search = self.ctx.text_search(self.language)?;
        let frame = self.frame()?;
        search.find_all(&frame, patterns, self.hint.as_ref(), self.rect)
    }

    pub fn expect(&self, pattern: impl Into<TextPattern>) -> Result<OcrResult> {
        let search = self.ctx.text_search(self.language)?;
        let frame = self.frame()?;
        let hit = search.expect(&frame, &pattern.into(), self.hint.as_ref(), self.rect)?;
        self.ctx.device().set_last_hit(hit.rect);
        Ok(hit)
    }

    /// Poll until a line matches. `Ok(None)` on timeout.
    pub fn wait_for(&self, pattern: impl Into<TextPattern>) -> Result<Option<OcrResult>> {
        let pattern = pattern.into();
        let (timeout, interval) = self.timing();
        self.ctx
            .wait_until(&pattern.to_string(), timeout, interval, || {
                self.find_pattern(&pattern)
            })
    }

    pub fn expect_wait(&self, pattern: impl Into<TextPattern>) -> Result<OcrResult> {
        let pattern = pattern.into();
        let (timeout, interval) = self.timing();
        self.ctx
            .expect_within(&pattern.to_string(), timeout, interval, || {
                self.find_pattern(&pattern)
            })
    }
}
