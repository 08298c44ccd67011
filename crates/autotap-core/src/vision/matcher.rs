//! Normalized cross-correlation backend.
//!
//! [`TemplateMatcher`] is the seam between recognition and the numeric
//! kernel. [`CorrelationMatcher`] is a portable CPU implementation; hosts
//! with a GPU or SIMD library can plug their own.
//!
//! Scores follow the usual OpenCV conventions:
//!
//! - without a mask, zero-mean normalized correlation (`TM_CCOEFF_NORMED`);
//! - with a mask, normalized cross-correlation over masked pixels only
//!   (`TM_CCORR_NORMED`), since mean subtraction is ill-defined there.

use image::{GrayImage, RgbImage};

use crate::error::{Error, Result};

/// One candidate location reported by a matcher.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawMatch {
    pub x: u32,
    pub y: u32,
    pub score: f32,
}

/// Sliding-window template correlation.
pub trait TemplateMatcher: Send + Sync {
    /// Every top-left position whose score is at least `threshold`.
    ///
    /// `mask`, when given, has the template's dimensions; non-zero pixels
    /// take part in the score. A template larger than the image yields no
    /// matches.
    fn match_template(
        &self,
        image: &RgbImage,
        template: &RgbImage,
        mask: Option<&GrayImage>,
        threshold: f32,
    ) -> Result<Vec<RawMatch>>;
}

/// Portable exhaustive correlation.
///
/// Cost is proportional to image area times template area. Fine for
/// region-restricted searches and tests; full-screen searches with large
/// templates want an accelerated matcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrelationMatcher;

const EPSILON: f64 = 1e-9;

impl TemplateMatcher for CorrelationMatcher {
    fn match_template(
        &self,
        image: &RgbImage,
        template: &RgbImage,
        mask: Option<&GrayImage>,
        threshold: f32,
    ) -> Result<Vec<RawMatch>> {
        let (tw, th) = template.dimensions();
        let (iw, ih) = image.dimensions();
        if tw == 0 || th == 0 {
            return Err(Error::invalid_input("template is empty"));
        }
        if tw > iw || th > ih {
            return Ok(Vec::new());
        }

        let kernel = match mask {
            Some(mask) => {
                if mask.dimensions() != template.dimensions() {
                    return Err(Error::invalid_input(format!(
                        "mask is {}x{} but template is {}x{}",
                        mask.width(),
                        mask.height(),
                        tw,
                        th
                    )));
                }
                Kernel::masked(template, mask)?
            }
            None => Kernel::plain(template),
        };

        let mut matches = Vec::new();
        for y in 0..=(ih - th) {
            for x in 0..=(iw - tw) {
                let score = kernel.score(image, x, y) as f32;
                if score >= threshold {
                    matches.push(RawMatch { x, y, score });
                }
            }
        }
        Ok(matches)
    }
}

/// Precomputed template statistics.
enum Kernel {
    /// Mean-subtracted template values per sample, with template energy.
    Plain {
        samples: Vec<(u32, u32, [f64; 3])>,
        energy: f64,
        mean: [f64; 3],
    },
    /// Raw template values of masked samples, with template energy.
    Masked {
        samples: Vec<(u32, u32, [f64; 3])>,
        energy: f64,
    },
}

impl Kernel {
    fn plain(template: &RgbImage) -> Self {
        let n = f64::from(template.width()) * f64::from(template.height());
        let mut mean = [0.0; 3];
        for px in template.pixels() {
            for c in 0..3 {
                mean[c] += f64::from(px.0[c]);
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut energy = 0.0;
        let samples = template
            .enumerate_pixels()
            .map(|(x, y, px)| {
                let mut centered = [0.0; 3];
                for c in 0..3 {
                    centered[c] = f64::from(px.0[c]) - mean[c];
                    energy += centered[c] * centered[c];
                }
                (x, y, centered)
            })
            .collect();

        Kernel::Plain {
            samples,
            energy,
            mean,
        }
    }

    fn masked(template: &RgbImage, mask: &GrayImage) -> Result<Self> {
        let mut energy = 0.0;
        let samples: Vec<_> = template
            .enumerate_pixels()
            .filter(|(x, y, _)| mask.get_pixel(*x, *y).0[0] != 0)
            .map(|(x, y, px)| {
                let values = [
                    f64::from(px.0[0]),
                    f64::from(px.0[1]),
                    f64::from(px.0[2]),
                ];
                energy += values.iter().map(|v| v * v).sum::<f64>();
                (x, y, values)
            })
            .collect();
        if samples.is_empty() {
            return Err(Error::invalid_input("mask selects no template pixels"));
        }
        Ok(Kernel::Masked { samples, energy })
    }

    fn score(&self, image: &RgbImage, ox: u32, oy: u32) -> f64 {
        match self {
            Kernel::Plain {
                samples,
                energy,
                mean,
            } => {
                let n = samples.len() as f64;
                let mut sum = [0.0; 3];
                let mut sum_sq = 0.0;
                let mut cross = 0.0;
                for (x, y, t) in samples {
                    let px = image.get_pixel(ox + x, oy + y).0;
                    for c in 0..3 {
                        let v = f64::from(px[c]);
                        sum[c] += v;
                        sum_sq += v * v;
                        cross += t[c] * v;
                    }
                }
                let window_energy = sum_sq - sum.iter().map(|s| s * s / n).sum::<f64>();
                if *energy < EPSILON || window_energy < EPSILON {
                    // Flat template or flat window: correlation is undefined.
                    // Treat two flat patches of the same colour as a match.
                    let both_flat = *energy < EPSILON && window_energy < EPSILON;
                    let same_colour = (0..3).all(|c| (sum[c] / n - mean[c]).abs() < 0.5);
                    return if both_flat && same_colour { 1.0 } else { 0.0 };
                }
                (cross / (energy * window_energy).sqrt()).clamp(-1.0, 1.0)
            }
            Kernel::Masked { samples, energy } => {
                let mut cross = 0.0;
                let mut window_energy = 0.0;
                for (x, y, t) in samples {
                    let px = image.get_pixel(ox + x, oy + y).0;
                    for c in 0..3 {
                        let v = f64::from(px[c]);
                        cross += t[c] * v;
                        window_energy += v * v;
                    }
                }
                let denom = (energy * window_energy).sqrt();
                if denom < EPSILON {
                    return if *energy < EPSILON && window_energy < EPSILON {
                        1.0
                    } else {
                        0.0
                    };
                }
                (cross / denom).clamp(0.0, 1.0)
            }
        }
    }
}
