//! Template search over explicit frames.
//!
//! Every function here takes the frame to search as an argument. The
//! scope-aware wrappers live in [`crate::recognition`].
//!
//! Results are ordered by descending score. Near-duplicate hits (two
//! positions within the dedup offset of each other) collapse to the
//! best-scoring one.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::config::DedupPolicy;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::geometry::{Point, Rect, Size};
use crate::vision::matcher::TemplateMatcher;
use crate::vision::template::Template;

/// Anything that occupies a rectangle of the frame.
pub trait Located {
    fn rect(&self) -> Rect;

    fn center(&self) -> Point {
        self.rect().center()
    }
}

/// One template hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TemplateMatchResult {
    pub score: f32,
    /// Top-left corner.
    pub position: Point,
    pub size: Size,
}

impl TemplateMatchResult {
    #[must_use]
    pub fn right_bottom(&self) -> Point {
        self.rect().right_bottom()
    }
}

impl Located for TemplateMatchResult {
    fn rect(&self) -> Rect {
        Rect::from_parts(self.position, self.size)
    }
}

/// A hit from a multi-template search, tagged with the template's index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MultipleTemplateMatchResult {
    pub score: f32,
    pub position: Point,
    pub size: Size,
    pub index: usize,
}

impl MultipleTemplateMatchResult {
    fn tagged(hit: TemplateMatchResult, index: usize) -> Self {
        Self {
            score: hit.score,
            position: hit.position,
            size: hit.size,
            index,
        }
    }
}

impl Located for MultipleTemplateMatchResult {
    fn rect(&self) -> Rect {
        Rect::from_parts(self.position, self.size)
    }
}

/// A hit together with the pixels it covers.
#[derive(Debug, Clone)]
pub struct CropResult {
    pub score: f32,
    pub position: Point,
    pub size: Size,
    pub image: Frame,
}

impl Located for CropResult {
    fn rect(&self) -> Rect {
        Rect::from_parts(self.position, self.size)
    }
}

/// Template search bound to a matcher and a dedup policy.
#[derive(Clone)]
pub struct TemplateSearch {
    matcher: Arc<dyn TemplateMatcher>,
    dedup: DedupPolicy,
}

impl TemplateSearch {
    pub fn new(matcher: Arc<dyn TemplateMatcher>, dedup: DedupPolicy) -> Self {
        Self { matcher, dedup }
    }

    #[must_use]
    pub fn dedup_policy(&self) -> DedupPolicy {
        self.dedup
    }

    /// Raw hits at or above `threshold`, best first, without dedup.
    ///
    /// `max_results` truncates after sorting.
    pub fn template_match(
        &self,
        frame: &Frame,
        template: &Template,
        threshold: f32,
        max_results: Option<usize>,
    ) -> Result<Vec<TemplateMatchResult>> {
        let mask = template.mask_mode().mask().map(|m| m.as_image());
        let raw = self
            .matcher
            .match_template(frame.as_image(), template.rgb(), mask, threshold)?;
        let size = template.size();
        let mut hits: Vec<TemplateMatchResult> = raw
            .into_iter()
            .map(|m| TemplateMatchResult {
                score: m.score,
                position: Point::new(m.x as i32, m.y as i32),
                size,
            })
            .collect();
        sort_by_score(&mut hits, |h| h.score);
        if let Some(limit) = max_results {
            hits.truncate(limit);
        }
        debug!(
            template = template.name(),
            frame = frame.id(),
            threshold,
            hits = hits.len(),
            best = hits.first().map(|h| h.score),
            "template match"
        );
        Ok(hits)
    }

    /// Best deduplicated hit, if any.
    pub fn find(
        &self,
        frame: &Frame,
        template: &Template,
        threshold: f32,
    ) -> Result<Option<TemplateMatchResult>> {
        Ok(self.find_all(frame, template, threshold)?.into_iter().next())
    }

    /// All deduplicated hits, best first.
    pub fn find_all(
        &self,
        frame: &Frame,
        template: &Template,
        threshold: f32,
    ) -> Result<Vec<TemplateMatchResult>> {
        let hits = self.template_match(frame, template, threshold, None)?;
        Ok(self.remove_duplicates(hits, |h| h.position))
    }

    /// First template, in slice order, that is present at all.
    pub fn find_any(
        &self,
        frame: &Frame,
        templates: &[Template],
        threshold: f32,
    ) -> Result<Option<MultipleTemplateMatchResult>> {
        for (index, template) in templates.iter().enumerate() {
            if let Some(hit) = self.find(frame, template, threshold)? {
                return Ok(Some(MultipleTemplateMatchResult::tagged(hit, index)));
            }
        }
        Ok(None)
    }

    /// Every hit of every template.
    ///
    /// Hits are grouped by template index; each group is best first.
    pub fn find_all_multi(
        &self,
        frame: &Frame,
        templates: &[Template],
        threshold: f32,
    ) -> Result<Vec<MultipleTemplateMatchResult>> {
        let mut out = Vec::new();
        for (index, template) in templates.iter().enumerate() {
            out.extend(
                self.find_all(frame, template, threshold)?
                    .into_iter()
                    .map(|hit| MultipleTemplateMatchResult::tagged(hit, index)),
            );
        }
        Ok(out)
    }

    pub fn count(&self, frame: &Frame, template: &Template, threshold: f32) -> Result<usize> {
        Ok(self.find_all(frame, template, threshold)?.len())
    }

    /// Like [`TemplateSearch::find`], failing with `TemplateNotFound`.
    pub fn expect(
        &self,
        frame: &Frame,
        template: &Template,
        threshold: f32,
    ) -> Result<TemplateMatchResult> {
        self.find(frame, template, threshold)?
            .ok_or_else(|| Error::TemplateNotFound {
                template: template.name().to_string(),
                frame: frame.clone(),
            })
    }

    /// All deduplicated hits with the covered pixels copied out.
    pub fn find_all_crop(
        &self,
        frame: &Frame,
        template: &Template,
        threshold: f32,
    ) -> Result<Vec<CropResult>> {
        self.find_all(frame, template, threshold)?
            .into_iter()
            .map(|hit| {
                Ok(CropResult {
                    score: hit.score,
                    position: hit.position,
                    size: hit.size,
                    image: frame.crop(hit.rect())?,
                })
            })
            .collect()
    }

    /// Collapse clusters of nearby hits to their best member.
    ///
    /// Input must already be sorted best first; the first hit of each
    /// cluster is kept.
    fn remove_duplicates<T>(&self, sorted: Vec<T>, position: impl Fn(&T) -> Point) -> Vec<T> {
        let mut kept: Vec<T> = Vec::with_capacity(sorted.len());
        for hit in sorted {
            let p = position(&hit);
            if !kept
                .iter()
                .any(|k| self.dedup.is_duplicate(position(k), p))
            {
                kept.push(hit);
            }
        }
        kept
    }
}

impl std::fmt::Debug for TemplateSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateSearch")
            .field("dedup", &self.dedup)
            .finish_non_exhaustive()
    }
}

fn sort_by_score<T>(items: &mut [T], score: impl Fn(&T) -> f32) {
    items.sort_by(|a, b| score(b).total_cmp(&score(a)));
}

#[cfg(test)]
mod tests {
    use image::RgbImage;

    use super::*;
    use crate::config::DedupAxis;
    use crate::vision::matcher::{CorrelationMatcher, RawMatch};

    use crate::test_support::{paste, pattern_image};

    /// Matcher returning a fixed list regardless of input.
    struct Scripted(Vec<RawMatch>);

    impl TemplateMatcher for Scripted {
        fn match_template(
            &self,
            _image: &RgbImage,
            _template: &RgbImage,
            _mask: Option<&image::GrayImage>,
            threshold: f32,
        ) -> Result<Vec<RawMatch>> {
            Ok(self
                .0
                .iter()
                .copied()
                .filter(|m| m.score >= threshold)
                .collect())
        }
    }

    fn raw(x: u32, y: u32, score: f32) -> RawMatch {
        RawMatch { x, y, score }
    }

    fn scripted(hits: Vec<RawMatch>, axis: DedupAxis) -> TemplateSearch {
        TemplateSearch::new(
            Arc::new(Scripted(hits)),
            DedupPolicy { offset: 10, axis },
        )
    }

    fn frame_and_template() -> (Frame, Template) {
        (
            Frame::new(RgbImage::new(100, 100)),
            Template::from_rgb("t", RgbImage::new(8, 8)),
        )
    }

    #[test]
    fn template_match_sorts_and_truncates() {
        let search = scripted(
            vec![raw(0, 0, 0.85), raw(50, 0, 0.95), raw(80, 0, 0.9)],
            DedupAxis::Horizontal,
        );
        let (frame, template) = frame_and_template();

        let hits = search.template_match(&frame, &template, 0.8, Some(2)).unwrap();
        let scores: Vec<f32> = hits.iter().map(|h| h.score).collect();
        assert_eq!(scores, vec![0.95, 0.9]);
    }

    #[test]
    fn dedup_keeps_best_of_cluster() {
        let search = scripted(
            vec![raw(20, 0, 0.85), raw(25, 0, 0.97), raw(60, 0, 0.9)],
            DedupAxis::Horizontal,
        );
        let (frame, template) = frame_and_template();

        let hits = search.find_all(&frame, &template, 0.8).unwrap();
        let xs: Vec<i32> = hits.iter().map(|h| h.position.x).collect();
        assert_eq!(xs, vec![25, 60]);
    }

    #[test]
    fn correlation_hits_collapse_when_close() {
        let template = pattern_image(12, 12, 7);
        let mut worn = template.clone();
        for (x, y) in [(3, 3), (3, 4), (4, 3), (4, 4)] {
            let px = worn.get_pixel_mut(x, y);
            px.0 = [255 - px.0[0], 255 - px.0[1], 255 - px.0[2]];
        }

        let mut image = RgbImage::from_pixel(100, 60, image::Rgb([255, 255, 255]));
        paste(&mut image, &template, 20, 5);
        // Five pixels right of the first copy, well below it.
        paste(&mut image, &worn, 25, 40);
        paste(&mut image, &worn, 70, 20);
        let frame = Frame::new(image);
        let template = Template::from_rgb("t", template);

        let horizontal = TemplateSearch::new(
            Arc::new(CorrelationMatcher),
            DedupPolicy {
                offset: 10,
                axis: DedupAxis::Horizontal,
            },
        );
        let hits = horizontal.find_all(&frame, &template, 0.8).unwrap();
        let positions: Vec<Point> = hits.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![Point::new(20, 5), Point::new(70, 20)]);
        assert!(hits[0].score > hits[1].score);

        let both = TemplateSearch::new(
            Arc::new(CorrelationMatcher),
            DedupPolicy {
                offset: 10,
                axis: DedupAxis::Both,
            },
        );
        let hits = both.find_all(&frame, &template, 0.8).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].position, Point::new(20, 5));
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn horizontal_dedup_ignores_vertical_distance() {
        let hits = vec![raw(20, 0, 0.9), raw(22, 80, 0.85)];
        let (frame, template) = frame_and_template();

        let horizontal = scripted(hits.clone(), DedupAxis::Horizontal);
        assert_eq!(horizontal.count(&frame, &template, 0.8).unwrap(), 1);

        let both = scripted(hits, DedupAxis::Both);
        assert_eq!(both.count(&frame, &template, 0.8).unwrap(), 2);
    }

    #[test]
    fn find_any_prefers_slice_order() {
        let template = pattern_image(6, 6, 11);
        let other = pattern_image(6, 6, 12);
        let mut image = RgbImage::from_pixel(40, 20, image::Rgb([255, 255, 255]));
        paste(&mut image, &template, 3, 3);
        paste(&mut image, &other, 25, 10);
        let frame = Frame::new(image);
        let search = TemplateSearch::new(Arc::new(CorrelationMatcher), DedupPolicy::default());

        let templates = [
            Template::from_rgb("absent", pattern_image(6, 6, 99)),
            Template::from_rgb("other", other),
            Template::from_rgb("first", template),
        ];
        let hit = search.find_any(&frame, &templates, 0.95).unwrap().unwrap();
        assert_eq!(hit.index, 1);
        assert_eq!(hit.position, Point::new(25, 10));
    }

    #[test]
    fn expect_reports_template_and_frame() {
        let search = scripted(vec![], DedupAxis::Horizontal);
        let (frame, template) = frame_and_template();
        let err = search.expect(&frame, &template, 0.9).unwrap_err();
        match err {
            Error::TemplateNotFound {
                template: name,
                frame: f,
            } => {
                assert_eq!(name, "t");
                assert!(f.same_as(&frame));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn find_all_crop_copies_hit_region() {
        let template = pattern_image(5, 4, 21);
        let mut image = RgbImage::from_pixel(30, 30, image::Rgb([255, 255, 255]));
        paste(&mut image, &template, 10, 12);
        let frame = Frame::new(image);
        let search = TemplateSearch::new(Arc::new(CorrelationMatcher), DedupPolicy::default());

        let crops = search
            .find_all_crop(&frame, &Template::from_rgb("t", template.clone()), 0.95)
            .unwrap();
        assert_eq!(crops.len(), 1);
        assert_eq!(crops[0].image.size(), Size::new(5, 4));
        assert_eq!(crops[0].image.as_image(), &template);
    }

    #[test]
    fn find_all_multi_groups_by_index() {
        let search = scripted(vec![raw(0, 0, 0.9), raw(40, 0, 0.95)], DedupAxis::Horizontal);
        let (frame, template) = frame_and_template();
        let hits = search
            .find_all_multi(&frame, &[template.clone(), template], 0.8)
            .unwrap();
        let tagged: Vec<(usize, i32)> = hits.iter().map(|h| (h.index, h.position.x)).collect();
        assert_eq!(tagged, vec![(0, 40), (0, 0), (1, 40), (1, 0)]);
    }

    #[test]
    fn located_rect_and_center() {
        let hit = TemplateMatchResult {
            score: 0.9,
            position: Point::new(10, 20),
            size: Size::new(30, 40),
        };
        assert_eq!(hit.rect(), Rect::new(10, 20, 30, 40));
        assert_eq!(hit.right_bottom(), Point::new(40, 60));
        assert_eq!(hit.center(), Point::new(25, 40));
    }
}
