//! Exact and near colour lookup.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::geometry::{Point, Rect};

/// An RGB colour, written `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb(pub [u8; 3]);

impl FromStr for Rgb {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let hex = s.trim().strip_prefix('#').unwrap_or(s.trim());
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(Error::invalid_input(format!(
                "colour '{}' is not in #RRGGBB form",
                s
            )));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| Error::invalid_input(format!("colour '{}' has a bad hex digit", s)))
        };
        Ok(Rgb([channel(0)?, channel(2)?, channel(4)?]))
    }
}

impl TryFrom<String> for Rgb {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Rgb> for String {
    fn from(rgb: Rgb) -> Self {
        rgb.to_string()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{:02X}{:02X}{:02X}", r, g, b)
    }
}

impl Rgb {
    /// Whether every channel is within `tolerance` of `other`.
    #[must_use]
    pub fn near(&self, other: [u8; 3], tolerance: u8) -> bool {
        self.0
            .iter()
            .zip(other.iter())
            .all(|(a, b)| a.abs_diff(*b) <= tolerance)
    }
}

/// First pixel, in row-major order, matching `color` within `tolerance`.
///
/// `rect` restricts the scan; parts outside the frame are ignored.
pub fn find_rgb(frame: &Frame, color: Rgb, rect: Option<Rect>, tolerance: u8) -> Option<Point> {
    let area = match rect {
        Some(rect) => rect.clamp_to(frame.size())?,
        None => frame.bounds(),
    };
    let image = frame.as_image();
    for y in area.y..area.bottom() {
        for x in area.x..area.right() {
            if color.near(image.get_pixel(x as u32, y as u32).0, tolerance) {
                return Some(Point::new(x, y));
            }
        }
    }
    None
}
