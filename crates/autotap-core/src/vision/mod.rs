//! Recognition primitives over explicit frames.
//!
//! Nothing in this module knows about scopes or devices; callers pass the
//! frame in. See [`crate::recognition`] for the scope-aware facade.

pub mod color;
pub mod hintbox;
pub mod image;
pub mod matcher;
pub mod ocr;
pub mod template;

pub use self::color::Rgb;
pub use self::hintbox::HintBox;
pub use self::image::{
    CropResult, Located, MultipleTemplateMatchResult, TemplateMatchResult, TemplateSearch,
};
pub use self::matcher::{CorrelationMatcher, RawMatch, TemplateMatcher};
pub use self::ocr::{
    OcrEngine, OcrLanguage, OcrResult, OcrResultList, StringMatcher, TextBox, TextPattern,
    TextSearch,
};
pub use self::template::{Mask, MaskMode, Template};
