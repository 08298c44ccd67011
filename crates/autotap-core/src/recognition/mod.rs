//! Scope-aware recognition facade.
//!
//! Each recognizer borrows the [`Context`](crate::Context), checks the
//! interrupt flag, resolves the frame through the current scope and then
//! delegates to [`crate::vision`]. Successful `find`/`expect`/`wait` calls
//! record their rectangle as the device's last hit, so a following
//! zero-argument [`DeviceHandle::click`](crate::device::DeviceHandle::click)
//! lands on it.
//!
//! Recognizers are cheap builders:
//!
//! ```ignore
//! ctx.image().threshold(0.9).find(&icon)?;
//! ctx.ocr().rect(Rect::new(0, 0, 720, 200)).find(ctx.predicates().contains("OK"))?;
//! ctx.color().tolerance(4).find_rgb("#FF4081")?;
//! ```

mod color;
mod image;
mod ocr;

pub use self::color::ColorRecognizer;
pub use self::image::ImageRecognizer;
pub use self::ocr::TextRecognizer;
