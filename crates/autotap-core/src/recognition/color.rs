use crate::context::Context;
use crate::error::Result;
use crate::geometry::{Point, Rect};
use crate::vision::color::{self, Rgb};

/// Colour lookup in the current scope.
#[derive(Debug, Clone, Copy)]
pub struct ColorRecognizer<'a> {
    ctx: &'a Context,
    rect: Option<Rect>,
    tolerance: u8,
}

impl<'a> ColorRecognizer<'a> {
    pub(crate) fn new(ctx: &'a Context) -> Self {
        Self {
            ctx,
            rect: None,
            tolerance: 0,
        }
    }

    #[must_use]
    pub fn rect(mut self, rect: Rect) -> Self {
        self.rect = Some(rect);
        self
    }

    /// Per-channel tolerance; `0` means exact.
    #[must_use]
    pub fn tolerance(mut self, tolerance: u8) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// First pixel of colour `hex` (`#RRGGBB`), scanning row by row.
    pub fn find_rgb(&self, hex: &str) -> Result<Option<Point>> {
        let color: Rgb = hex.parse()?;
        self.find(color)
    }

    pub fn find(&self, color: Rgb) -> Result<Option<Point>> {
        self.ctx.check_interrupt()?;
        let frame = self.ctx.frame()?;
        Ok(color::find_rgb(&frame, color, self.rect, self.tolerance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ScreenshotMode;
    use crate::error::Error;
    use crate::test_support::{test_context, text_frame, MockDevice, RED};

    #[test]
    fn finds_colour_in_current_frame() {
        let frame = text_frame(50, 50, &[(Rect::new(30, 12, 4, 4), RED)]);
        let (device, _probe) = MockDevice::new(vec![frame]);
        let ctx = test_context(device, None);
        let _scope = ctx.manual_context(ScreenshotMode::Auto);

        let hex = Rgb(RED).to_string();
        assert_eq!(ctx.color().find_rgb(&hex).unwrap(), Some(Point::new(30, 12)));
        assert_eq!(
            ctx.color().rect(Rect::new(0, 0, 20, 50)).find_rgb(&hex).unwrap(),
            None
        );
    }

    #[test]
    fn bad_hex_is_invalid_input() {
        let (device, probe) = MockDevice::new(vec![text_frame(4, 4, &[])]);
        let ctx = test_context(device, None);
        let _scope = ctx.manual_context(ScreenshotMode::Auto);
        let err = ctx.color().find_rgb("red").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(probe.screenshots(), 0);
    }
}
