use std::time::Duration;

use crate::context::Context;
use crate::error::Result;
use crate::frame::Frame;
use crate::vision::image::{
    CropResult, Located, MultipleTemplateMatchResult, TemplateMatchResult,
};
use crate::vision::template::Template;

/// Template recognition in the current scope.
///
/// `find*` calls default to the configured `default_threshold`; `count` and
/// `expect` default to the stricter `strict_threshold`.
#[derive(Debug, Clone, Copy)]
pub struct ImageRecognizer<'a> {
    ctx: &'a Context,
    threshold: Option<f32>,
    timeout: Option<Duration>,
    interval: Option<Duration>,
}

impl<'a> ImageRecognizer<'a> {
    pub(crate) fn new(ctx: &'a Context) -> Self {
        Self {
            ctx,
            threshold: None,
            timeout: None,
            interval: None,
        }
    }

    /// Override the score threshold for every call on this recognizer.
    #[must_use]
    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Bound for `wait_for*` and `expect_wait*`.
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

    fn default_threshold(&self) -> f32 {
        self.threshold
            .unwrap_or(self.ctx.config().matching.default_threshold)
    }

    fn strict_threshold(&self) -> f32 {
        self.threshold
            .unwrap_or(self.ctx.config().matching.strict_threshold)
    }

    fn frame(&self) -> Result<Frame> {
        self.ctx.check_interrupt()?;
        self.ctx.frame()
    }

    fn remember<T: Located>(&self, hit: Option<T>) -> Option<T> {
        if let Some(hit) = &hit {
            self.ctx.device().set_last_hit(hit.rect());
        }
        hit
    }

    fn timing(&self) -> (Duration, Duration) {
        let timing = self.ctx.config().timing;
        (
            self.timeout.unwrap_or(timing.wait_timeout()),
            self.interval.unwrap_or(timing.wait_interval()),
        )
    }

    /// Raw hits, best first, no dedup.
    pub fn template_match(
        &self,
        template: &Template,
        max_results: Option<usize>,
    ) -> Result<Vec<TemplateMatchResult>> {
        let frame = self.frame()?;
        self.ctx
            .templates()
            .template_match(&frame, template, self.default_threshold(), max_results)
    }

    pub fn find(&self, template: &Template) -> Result<Option<TemplateMatchResult>> {
        let frame = self.frame()?;
        let hit = self
            .ctx
            .templates()
            .find(&frame, template, self.default_threshold())?;
        Ok(self.remember(hit))
    }

    pub fn find_all(&self, template: &Template) -> Result<Vec<TemplateMatchResult>> {
        let frame = self.frame()?;
        self.ctx
            .templates()
            .find_all(&frame, template, self.default_threshold())
    }

    /// First template, in slice order, that is present.
    pub fn find_any(&self, templates: &[Template]) -> Result<Option<MultipleTemplateMatchResult>> {
        let frame = self.frame()?;
        let hit = self
            .ctx
            .templates()
            .find_any(&frame, templates, self.default_threshold())?;
        Ok(self.remember(hit))
    }

    pub fn find_all_multi(&self, templates: &[Template]) -> Result<Vec<MultipleTemplateMatchResult>> {
        let frame = self.frame()?;
        self.ctx
            .templates()
            .find_all_multi(&frame, templates, self.default_threshold())
    }

    pub fn find_all_crop(&self, template: &Template) -> Result<Vec<CropResult>> {
        let frame = self.frame()?;
        self.ctx
            .templates()
            .find_all_crop(&frame, template, self.default_threshold())
    }

    pub fn count(&self, template: &Template) -> Result<usize> {
        let frame = self.frame()?;
        self.ctx
            .templates()
            .count(&frame, template, self.strict_threshold())
    }

    pub fn expect(&self, template: &Template) -> Result<TemplateMatchResult> {
        let frame = self.frame()?;
        let hit = self
            .ctx
            .templates()
            .expect(&frame, template, self.strict_threshold())?;
        self.ctx.device().set_last_hit(hit.rect());
        Ok(hit)
    }

    /// Poll until `template` appears. `Ok(None)` on timeout.
    pub fn wait_for(&self, template: &Template) -> Result<Option<TemplateMatchResult>> {
        let (timeout, interval) = self.timing();
        self.ctx
            .wait_until(template.name(), timeout, interval, || self.find(template))
    }

    /// Poll until any of `templates` appears.
    pub fn wait_for_any(
        &self,
        templates: &[Template],
    ) -> Result<Option<MultipleTemplateMatchResult>> {
        let (timeout, interval) = self.timing();
        let what = describe_any(templates);
        self.ctx
            .wait_until(&what, timeout, interval, || self.find_any(templates))
    }

    /// Poll until `template` appears, failing with `Timeout`.
    pub fn expect_wait(&self, template: &Template) -> Result<TemplateMatchResult> {
        let (timeout, interval) = self.timing();
        self.ctx
            .expect_within(template.name(), timeout, interval, || self.find(template))
    }

    pub fn expect_wait_any(&self, templates: &[Template]) -> Result<MultipleTemplateMatchResult> {
        let (timeout, interval) = self.timing();
        let what = describe_any(templates);
        self.ctx
            .expect_within(&what, timeout, interval, || self.find_any(templates))
    }
}

fn describe_any(templates: &[Template]) -> String {
    let names: Vec<&str> = templates.iter().map(Template::name).collect();
    format!("any of [{}]", names.join(", "))
}
