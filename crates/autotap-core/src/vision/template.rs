//! Template images and masks.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, GrayImage, Luma, RgbImage};

use crate::error::{Error, Result};
use crate::geometry::Size;

/// Pixels strictly above this value count as "on" when binarizing.
const BINARIZE_THRESHOLD: u8 = 127;

/// Binary mask: non-zero pixels take part in matching.
#[derive(Clone)]
pub struct Mask(Arc<GrayImage>);

impl Mask {
    /// Binarize a grayscale image.
    pub fn from_luma(image: &GrayImage) -> Self {
        let binary = GrayImage::from_fn(image.width(), image.height(), |x, y| {
            if image.get_pixel(x, y).0[0] > BINARIZE_THRESHOLD {
                Luma([255])
            } else {
                Luma([0])
            }
        });
        Mask(Arc::new(binary))
    }

    pub fn from_dynamic(image: &DynamicImage) -> Self {
        Self::from_luma(&image.to_luma8())
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_dynamic(&image::open(path.as_ref())?))
    }

    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(self.0.width(), self.0.height())
    }

    #[must_use]
    pub fn as_image(&self) -> &GrayImage {
        &self.0
    }
}

impl fmt::Debug for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mask({})", self.size())
    }
}

/// Which pixels of the template take part in matching.
///
/// An explicit mask and alpha-derived transparency are mutually exclusive.
#[derive(Debug, Clone, Default)]
pub enum MaskMode {
    #[default]
    None,
    Explicit(Mask),
    /// Derived from the template's alpha channel.
    Transparent(Mask),
}

impl MaskMode {
    #[must_use]
    pub fn mask(&self) -> Option<&Mask> {
        match self {
            MaskMode::None => None,
            MaskMode::Explicit(mask) | MaskMode::Transparent(mask) => Some(mask),
        }
    }
}

struct Pixels {
    rgb: RgbImage,
    alpha: Option<GrayImage>,
}

/// A named template image.
///
/// Cheap to clone; pixel data is shared.
#[derive(Clone)]
pub struct Template {
    name: Arc<str>,
    path: Option<Arc<PathBuf>>,
    pixels: Arc<Pixels>,
    mask: MaskMode,
}

impl Template {
    /// Load a template from disk. The name is the file stem.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mut template = Self::from_image(name, &image);
        template.path = Some(Arc::new(path.to_path_buf()));
        Ok(template)
    }

    /// Build a template from a decoded image, keeping its alpha channel.
    pub fn from_image(name: impl Into<String>, image: &DynamicImage) -> Self {
        let name: String = name.into();
        let alpha = image.color().has_alpha().then(|| {
            let rgba = image.to_rgba8();
            GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
                Luma([rgba.get_pixel(x, y).0[3]])
            })
        });
        Self {
            name: Arc::from(name),
            path: None,
            pixels: Arc::new(Pixels {
                rgb: image.to_rgb8(),
                alpha,
            }),
            mask: MaskMode::None,
        }
    }

    pub fn from_rgb(name: impl Into<String>, rgb: RgbImage) -> Self {
        let name: String = name.into();
        Self {
            name: Arc::from(name),
            path: None,
            pixels: Arc::new(Pixels { rgb, alpha: None }),
            mask: MaskMode::None,
        }
    }

    /// Attach an explicit mask of the same size as the template.
    pub fn with_mask(mut self, mask: Mask) -> Result<Self> {
        if mask.size() != self.size() {
            return Err(Error::invalid_input(format!(
                "mask size {} does not match template '{}' size {}",
                mask.size(),
                self.name,
                self.size()
            )));
        }
        self.mask = MaskMode::Explicit(mask);
        Ok(self)
    }

    /// Match only the opaque pixels of the template.
    pub fn transparent(mut self) -> Result<Self> {
        let alpha = self.pixels.alpha.as_ref().ok_or_else(|| {
            Error::invalid_input(format!(
                "template '{}' has no alpha channel to derive a mask from",
                self.name
            ))
        })?;
        self.mask = MaskMode::Transparent(Mask::from_luma(alpha));
        Ok(self)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref().map(PathBuf::as_path)
    }

    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(self.pixels.rgb.width(), self.pixels.rgb.height())
    }

    #[must_use]
    pub fn rgb(&self) -> &RgbImage {
        &self.pixels.rgb
    }

    #[must_use]
    pub fn has_alpha(&self) -> bool {
        self.pixels.alpha.is_some()
    }

    #[must_use]
    pub fn mask_mode(&self) -> &MaskMode {
        &self.mask
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name)
            .field("size", &self.size())
            .field("mask", &self.mask)
            .finish()
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
