use super::target::TargetId;

/// Handle of a bitmap registered with a backend.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TextureId(pub u32);

/// What a quad samples from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureSource {
    /// 1×1 opaque white; the quad shows its vertex colors only.
    White,
    Image(TextureId),
    /// Output of an offscreen pass recorded earlier in the same frame.
    Target(TargetId),
}

impl TextureSource {
    #[inline]
    pub fn is_white(self) -> bool {
        matches!(self, TextureSource::White)
    }
}

/// Premultiplied RGBA8 pixels, row-major, tightly packed.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    /// False when every pixel is known to be opaque.
    pub has_alpha: bool,
}

impl Bitmap {
    /// Wraps premultiplied pixels. Returns `None` when the buffer length does
    /// not match `width * height * 4`.
    pub fn from_premul(width: u32, height: u32, pixels: Vec<u8>, has_alpha: bool) -> Option<Self> {
        if width == 0 || height == 0 || pixels.len() != width as usize * height as usize * 4 {
            return None;
        }
        Some(Self { width, height, pixels, has_alpha })
    }

    /// Builds a bitmap from straight-alpha RGBA8 pixels, premultiplying in place.
    pub fn from_straight(width: u32, height: u32, mut pixels: Vec<u8>) -> Option<Self> {
        let mut has_alpha = false;
        for px in pixels.chunks_exact_mut(4) {
            let a = px[3] as u16;
            if a != 255 {
                has_alpha = true;
                for c in &mut px[..3] {
                    *c = ((*c as u16 * a + 127) / 255) as u8;
                }
            }
        }
        Self::from_premul(width, height, pixels, has_alpha)
    }

    /// Single-color bitmap.
    pub fn solid(width: u32, height: u32, rgba_premul: [u8; 4]) -> Self {
        let pixels = rgba_premul.repeat(width.max(1) as usize * height.max(1) as usize);
        Self {
            width: width.max(1),
            height: height.max(1),
            pixels,
            has_alpha: rgba_premul[3] != 255,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_straight_premultiplies_and_detects_alpha() {
        let bmp = Bitmap::from_straight(2, 1, vec![255, 0, 0, 255, 200, 100, 50, 128]).unwrap();
        assert!(bmp.has_alpha);
        assert_eq!(&bmp.pixels[..4], &[255, 0, 0, 255]);
        assert_eq!(&bmp.pixels[4..], &[100, 50, 25, 128]);
    }

    #[test]
    fn opaque_bitmap_has_no_alpha() {
        let bmp = Bitmap::from_straight(1, 1, vec![1, 2, 3, 255]).unwrap();
        assert!(!bmp.has_alpha);
    }

    #[test]
    fn mismatched_length_is_rejected() {
        assert!(Bitmap::from_premul(2, 2, vec![0; 12], false).is_none());
        assert!(Bitmap::from_premul(0, 2, vec![], false).is_none());
    }
}
