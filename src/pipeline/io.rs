//! Injected capabilities: frame capture and synthetic input dispatch.
//!
//! The engine never captures or clicks by itself; callers supply these as
//! synchronous capabilities. Both may block for as long as the underlying
//! transport needs.

use super::error::IoError;
use crate::vision::base;
use crate::vision::types::Rect;
use image::RgbImage;

/// Supplies the current screen pixels, optionally cropped to a rectangle.
pub trait FrameSource {
    fn capture(&mut self) -> Result<RgbImage, IoError>;

    /// Capture clipped to `region`. The default captures the whole frame
    /// and crops; sources with native region capture can override.
    fn capture_region(&mut self, region: Rect) -> Result<RgbImage, IoError> {
        let frame = self.capture()?;
        let clipped = base::resolve_roi(&frame, Some(region));
        Ok(base::crop_to_roi(&frame, clipped))
    }
}

impl<T: FrameSource + ?Sized> FrameSource for &mut T {
    fn capture(&mut self) -> Result<RgbImage, IoError> {
        (**self).capture()
    }

    fn capture_region(&mut self, region: Rect) -> Result<RgbImage, IoError> {
        (**self).capture_region(region)
    }
}

/// Adapter turning a capture closure into a [`FrameSource`].
pub struct FrameFn<F>(pub F);

impl<F> FrameSource for FrameFn<F>
where
    F: FnMut() -> Result<RgbImage, IoError>,
{
    fn capture(&mut self) -> Result<RgbImage, IoError> {
        (self.0)()
    }
}

/// Dispatches synthetic pointer input at screen coordinates.
pub trait InputSink {
    fn move_to(&mut self, x: i32, y: i32) -> Result<(), IoError>;
    fn click(&mut self, x: i32, y: i32) -> Result<(), IoError>;
    fn drag_to(&mut self, x: i32, y: i32) -> Result<(), IoError>;
}

impl<T: InputSink + ?Sized> InputSink for &mut T {
    fn move_to(&mut self, x: i32, y: i32) -> Result<(), IoError> {
        (**self).move_to(x, y)
    }

    fn click(&mut self, x: i32, y: i32) -> Result<(), IoError> {
        (**self).click(x, y)
    }

    fn drag_to(&mut self, x: i32, y: i32) -> Result<(), IoError> {
        (**self).drag_to(x, y)
    }
}

/// Input sink that logs and discards every event. Useful for dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullInput;

impl InputSink for NullInput {
    fn move_to(&mut self, x: i32, y: i32) -> Result<(), IoError> {
        log::debug!("null input: move_to({x}, {y})");
        Ok(())
    }

    fn click(&mut self, x: i32, y: i32) -> Result<(), IoError> {
        log::debug!("null input: click({x}, {y})");
        Ok(())
    }

    fn drag_to(&mut self, x: i32, y: i32) -> Result<(), IoError> {
        log::debug!("null input: drag_to({x}, {y})");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_adapter_is_a_frame_source() {
        let mut source = FrameFn(|| Ok(RgbImage::new(16, 8)));
        let frame = source.capture().unwrap();
        assert_eq!((frame.width(), frame.height()), (16, 8));
    }

    #[test]
    fn region_capture_clips_to_frame_extents() {
        let mut source = FrameFn(|| {
            Ok(RgbImage::from_fn(20, 20, |x, y| {
                image::Rgb([x as u8, y as u8, 0])
            }))
        });
        let sub = source.capture_region(Rect::new(15, 15, 10, 10)).unwrap();
        assert_eq!((sub.width(), sub.height()), (5, 5));
        assert_eq!(sub.get_pixel(0, 0), &image::Rgb([15, 15, 0]));
    }

    #[test]
    fn capture_errors_surface_to_the_caller() {
        let mut source = FrameFn(|| Err(IoError::capture("screen gone")));
        let err = source.capture().unwrap_err();
        assert!(err.to_string().contains("screen gone"));
    }
}
