//! Tunable constants for recognition and polling.
//!
//! The defaults were tuned against one target application's frame timing
//! and UI layout. They can be replaced from a JSON file and then overridden
//! per variable from the environment:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `AUTOTAP_DEDUP_OFFSET` | `matching.dedup.offset` |
//! | `AUTOTAP_DEDUP_AXIS` | `matching.dedup.axis` (`horizontal`, `vertical`, `both`) |
//! | `AUTOTAP_DISPATCH_INTERVAL_MS` | `timing.dispatch_interval_ms` |
//! | `AUTOTAP_WAIT_TIMEOUT_MS` | `timing.wait_timeout_ms` |
//! | `AUTOTAP_WAIT_INTERVAL_MS` | `timing.wait_interval_ms` |
//!
//! Empty variables are ignored.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::{Point, Size};

/// Which axes the deduplication offset applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupAxis {
    /// Hits whose x positions differ by less than the offset are the same
    /// element, regardless of y. Suits vertically stacked UI.
    #[default]
    Horizontal,
    /// Same as `Horizontal` with the axes swapped.
    Vertical,
    /// Hits must be within the offset on both axes.
    Both,
}

impl FromStr for DedupAxis {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "horizontal" | "x" => Ok(DedupAxis::Horizontal),
            "vertical" | "y" => Ok(DedupAxis::Vertical),
            "both" | "xy" => Ok(DedupAxis::Both),
            other => Err(Error::Config(format!(
                "unknown dedup axis '{}', expected horizontal, vertical or both",
                other
            ))),
        }
    }
}

impl fmt::Display for DedupAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DedupAxis::Horizontal => write!(f, "horizontal"),
            DedupAxis::Vertical => write!(f, "vertical"),
            DedupAxis::Both => write!(f, "both"),
        }
    }
}

/// Pixel tolerance under which two template hits count as one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DedupPolicy {
    pub offset: u32,
    pub axis: DedupAxis,
}

impl Default for DedupPolicy {
    fn default() -> Self {
        Self {
            offset: 10,
            axis: DedupAxis::Horizontal,
        }
    }
}

impl DedupPolicy {
    /// Whether hits at `a` and `b` are the same physical element.
    #[must_use]
    pub fn is_duplicate(&self, a: Point, b: Point) -> bool {
        let dx = a.x.abs_diff(b.x);
        let dy = a.y.abs_diff(b.y);
        match self.axis {
            DedupAxis::Horizontal => dx < self.offset,
            DedupAxis::Vertical => dy < self.offset,
            DedupAxis::Both => dx < self.offset && dy < self.offset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchingConfig {
    /// Threshold for `find`, `find_all` and waits.
    pub default_threshold: f32,
    /// Threshold for `count` and `expect`.
    pub strict_threshold: f32,
    pub dedup: DedupPolicy,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            default_threshold: 0.8,
            strict_threshold: 0.9,
            dedup: DedupPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OcrConfig {
    /// Pad small crops before recognition.
    pub pad: bool,
    /// Minimum working size crops are padded up to.
    pub min_size: Size,
    /// RGB fill used for the padding border.
    pub pad_color: [u8; 3],
    /// Minimum similarity (0-100) for the fuzzy predicate.
    pub fuzzy_ratio: f64,
    /// Maximum number of cached text predicates.
    pub predicate_cache_capacity: usize,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            pad: true,
            min_size: Size::new(631, 631),
            pad_color: [255, 255, 255],
            fuzzy_ratio: 90.0,
            predicate_cache_capacity: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    /// Sleep between dispatcher ticks when no rule matched.
    pub dispatch_interval_ms: u64,
    /// Default timeout for `wait_for` style helpers.
    pub wait_timeout_ms: u64,
    /// Default polling interval for `wait_for` style helpers.
    pub wait_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            dispatch_interval_ms: 200,
            wait_timeout_ms: 120_000,
            wait_interval_ms: 400,
        }
    }
}

impl TimingConfig {
    #[must_use]
    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_millis(self.dispatch_interval_ms)
    }

    #[must_use]
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    #[must_use]
    pub fn wait_interval(&self) -> Duration {
        Duration::from_millis(self.wait_interval_ms)
    }
}

/// Complete configuration for a [`Context`](crate::context::Context).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub matching: MatchingConfig,
    pub ocr: OcrConfig,
    pub timing: TimingConfig,
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Apply `AUTOTAP_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("AUTOTAP_DEDUP_OFFSET") {
            self.matching.dedup.offset = parse_number("AUTOTAP_DEDUP_OFFSET", &v)?;
        }
        if let Some(v) = get("AUTOTAP_DEDUP_AXIS") {
            self.matching.dedup.axis = v.parse()?;
        }
        if let Some(v) = get("AUTOTAP_DISPATCH_INTERVAL_MS") {
            self.timing.dispatch_interval_ms = parse_number("AUTOTAP_DISPATCH_INTERVAL_MS", &v)?;
        }
        if let Some(v) = get("AUTOTAP_WAIT_TIMEOUT_MS") {
            self.timing.wait_timeout_ms = parse_number("AUTOTAP_WAIT_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("AUTOTAP_WAIT_INTERVAL_MS") {
            self.timing.wait_interval_ms = parse_number("AUTOTAP_WAIT_INTERVAL_MS", &v)?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Reject out-of-range thresholds and a zero-sized predicate cache.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("matching.default_threshold", self.matching.default_threshold),
            ("matching.strict_threshold", self.matching.strict_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!(
                    "{} must be within 0..=1, got {}",
                    name, value
                )));
            }
        }
        if !(0.0..=100.0).contains(&self.ocr.fuzzy_ratio) {
            return Err(Error::Config(format!(
                "ocr.fuzzy_ratio must be within 0..=100, got {}",
                self.ocr.fuzzy_ratio
            )));
        }
        if self.ocr.predicate_cache_capacity == 0 {
            return Err(Error::Config(
                "ocr.predicate_cache_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} must be a non-negative integer, got '{}'", name, value)))
}
