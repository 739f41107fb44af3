/// Drawing surface dimensions.
///
/// `width`/`height` are logical pixels; the device surface is
/// `logical * pixel_ratio` physical pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Canvas {
    pub width: f32,
    pub height: f32,
    pub pixel_ratio: f32,
}

impl Canvas {
    #[inline]
    pub const fn new(width: f32, height: f32, pixel_ratio: f32) -> Self {
        Self { width, height, pixel_ratio }
    }

    /// Builds a canvas from a physical surface size and a pixel ratio.
    pub fn from_physical(width: u32, height: u32, pixel_ratio: f32) -> Self {
        let ratio = if pixel_ratio > 0.0 && pixel_ratio.is_finite() { pixel_ratio } else { 1.0 };
        Self::new(width as f32 / ratio, height as f32 / ratio, ratio)
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0.0
            && self.height > 0.0
            && self.pixel_ratio > 0.0
            && self.width.is_finite()
            && self.height.is_finite()
    }

    /// Physical surface size, rounded to whole pixels (at least 1×1).
    pub fn physical_size(self) -> (u32, u32) {
        (
            ((self.width * self.pixel_ratio).round() as u32).max(1),
            ((self.height * self.pixel_ratio).round() as u32).max(1),
        )
    }

    /// Maps logical coordinates to clip space: `ndc = pos * projection + (-1, 1)`.
    ///
    /// The Y component is negative because logical +Y points down.
    pub fn projection(self) -> [f32; 2] {
        [2.0 / self.width.max(1.0), -2.0 / self.height.max(1.0)]
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new(1280.0, 720.0, 1.0)
    }
}
