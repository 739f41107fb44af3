//! Logical clip rect → device scissor rect.
//!
//! Each edge is mapped independently with `floor(coord * ratio + 255/512)`,
//! the same rounding rasterizers apply to vertex positions, so a clip edge and
//! a quad edge at the same logical coordinate land on the same pixel.

use crate::coords::Rect;

/// Scissor rect in device pixels. Offsets may be negative before clamping.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ScissorRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl ScissorRect {
    #[inline]
    pub fn is_empty(self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Clamps to a `(width, height)` surface, as `(x, y, w, h)` for wgpu.
    pub fn clamp_to(self, surface: (u32, u32)) -> (u32, u32, u32, u32) {
        let (sw, sh) = (surface.0 as i64, surface.1 as i64);
        let x0 = (self.x as i64).clamp(0, sw);
        let y0 = (self.y as i64).clamp(0, sh);
        let x1 = (self.x as i64 + self.width as i64).clamp(x0, sw);
        let y1 = (self.y as i64 + self.height as i64).clamp(y0, sh);
        (x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32)
    }
}

#[inline]
pub fn round_edge(coord: f32, pixel_ratio: f32) -> i32 {
    (coord * pixel_ratio + 255.0 / 512.0).floor() as i32
}

/// Maps a logical rect to device pixels without any origin flip.
pub fn compute_scissor(x: f32, y: f32, w: f32, h: f32, pixel_ratio: f32) -> ScissorRect {
    let sx = round_edge(x, pixel_ratio);
    let ex = round_edge(x + w, pixel_ratio);
    let sy = round_edge(y, pixel_ratio);
    let ey = round_edge(y + h, pixel_ratio);
    ScissorRect { x: sx, y: sy, width: ex - sx, height: ey - sy }
}

#[inline]
pub fn scissor_for(rect: Rect, pixel_ratio: f32) -> ScissorRect {
    compute_scissor(rect.origin.x, rect.origin.y, rect.size.x, rect.size.y, pixel_ratio)
}

/// Moves a top-left-origin rect to a bottom-left-origin framebuffer of
/// `canvas_height` device pixels.
#[inline]
pub fn flip_y(rect: ScissorRect, canvas_height: i32) -> ScissorRect {
    ScissorRect { y: canvas_height - (rect.y + rect.height), ..rect }
}
