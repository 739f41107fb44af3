/// Linear premultiplied RGBA color.
///
/// Invariant: `r`, `g`, `b` are already multiplied by `a`.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Color {
    pub r: f32, // premultiplied
    pub g: f32, // premultiplied
    pub b: f32, // premultiplied
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };
    pub const TRANSPARENT: Color = Color { r: 0.0, g: 0.0, b: 0.0, a: 0.0 };

    /// Creates a premultiplied color from premultiplied components.
    #[inline]
    pub const fn from_premul(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Creates a premultiplied color from straight alpha components.
    #[inline]
    pub fn from_straight(r: f32, g: f32, b: f32, a: f32) -> Self {
        let a = a.clamp(0.0, 1.0);
        Self {
            r: r.clamp(0.0, 1.0) * a,
            g: g.clamp(0.0, 1.0) * a,
            b: b.clamp(0.0, 1.0) * a,
            a,
        }
    }

    /// Creates a color from a straight-alpha `0xAARRGGBB` literal.
    pub fn from_argb(argb: u32) -> Self {
        let [a, r, g, b] = argb.to_be_bytes();
        Self::from_straight(
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            a as f32 / 255.0,
        )
    }

    /// Multiplies all channels by `alpha`, keeping premultiplication intact.
    #[inline]
    pub fn scale_alpha(self, alpha: f32) -> Self {
        let k = alpha.clamp(0.0, 1.0);
        Self { r: self.r * k, g: self.g * k, b: self.b * k, a: self.a * k }
    }

    #[inline]
    pub fn is_opaque(self) -> bool {
        self.a >= 1.0
    }

    /// Packs to `[r, g, b, a]` unorm bytes stored little-endian in a `u32`,
    /// matching `wgpu::VertexFormat::Unorm8x4`.
    pub fn pack(self) -> u32 {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
        u32::from_le_bytes([q(self.r), q(self.g), q(self.b), q(self.a)])
    }

    /// Inverse of [`pack`](Self::pack), up to 8-bit quantization.
    pub fn unpack(packed: u32) -> Self {
        let [r, g, b, a] = packed.to_le_bytes();
        Self::from_premul(
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            a as f32 / 255.0,
        )
    }

    /// Clear value for a wgpu render pass.
    pub fn to_wgpu(self) -> wgpu::Color {
        wgpu::Color {
            r: self.r as f64,
            g: self.g as f64,
            b: self.b as f64,
            a: self.a as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_argb_premultiplies() {
        let c = Color::from_argb(0x80ff0000);
        assert!((c.a - 128.0 / 255.0).abs() < 1e-6);
        assert!((c.r - c.a).abs() < 1e-6);
        assert_eq!(c.g, 0.0);
    }

    #[test]
    fn pack_layout_is_rgba_bytes() {
        let packed = Color::from_premul(1.0, 0.0, 0.0, 1.0).pack();
        assert_eq!(packed.to_le_bytes(), [255, 0, 0, 255]);
    }

    #[test]
    fn pack_unpack_is_stable_after_quantization() {
        let c = Color::from_straight(0.2, 0.4, 0.6, 0.5);
        let once = Color::unpack(c.pack());
        assert_eq!(Color::unpack(once.pack()), once);
    }

    #[test]
    fn scale_alpha_keeps_premultiplication() {
        let c = Color::WHITE.scale_alpha(0.25);
        assert_eq!(c, Color::from_premul(0.25, 0.25, 0.25, 0.25));
    }
}
