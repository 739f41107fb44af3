use super::{Rect, Vec2};

/// 2D affine transform in logical pixels.
///
/// Maps a local point `(x, y)` to `(px + ta·x + tb·y, py + tc·x + td·y)`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Affine {
    pub ta: f32,
    pub tb: f32,
    pub tc: f32,
    pub td: f32,
    pub px: f32,
    pub py: f32,
}

impl Affine {
    pub const IDENTITY: Affine = Affine { ta: 1.0, tb: 0.0, tc: 0.0, td: 1.0, px: 0.0, py: 0.0 };

    #[inline]
    pub const fn translate(x: f32, y: f32) -> Self {
        Self { ta: 1.0, tb: 0.0, tc: 0.0, td: 1.0, px: x, py: y }
    }

    /// Local transform of an element: scale and rotate around `pivot`
    /// (local units), then translate to `position`.
    pub fn from_local(position: Vec2, scale: f32, rotation: f32, pivot: Vec2) -> Self {
        if rotation == 0.0 && scale == 1.0 {
            return Self::translate(position.x, position.y);
        }
        let (sin, cos) = rotation.sin_cos();
        let ta = cos * scale;
        let tb = -sin * scale;
        let tc = sin * scale;
        let td = cos * scale;
        Self {
            ta,
            tb,
            tc,
            td,
            px: position.x + pivot.x - (ta * pivot.x + tb * pivot.y),
            py: position.y + pivot.y - (tc * pivot.x + td * pivot.y),
        }
    }

    /// Returns `self ∘ local`: first `local`, then `self`.
    pub fn then(self, local: Affine) -> Affine {
        Affine {
            ta: self.ta * local.ta + self.tb * local.tc,
            tb: self.ta * local.tb + self.tb * local.td,
            tc: self.tc * local.ta + self.td * local.tc,
            td: self.tc * local.tb + self.td * local.td,
            px: self.px + self.ta * local.px + self.tb * local.py,
            py: self.py + self.tc * local.px + self.td * local.py,
        }
    }

    #[inline]
    pub fn apply(self, p: Vec2) -> Vec2 {
        Vec2::new(
            self.px + self.ta * p.x + self.tb * p.y,
            self.py + self.tc * p.x + self.td * p.y,
        )
    }

    /// True when the transform keeps rectangles axis-aligned.
    #[inline]
    pub fn is_axis_aligned(self) -> bool {
        self.tb == 0.0 && self.tc == 0.0
    }

    /// Axis-aligned bounds of the local rect `(0, 0, w, h)` after transformation.
    pub fn bounds(self, w: f32, h: f32) -> Rect {
        let corners = [
            self.apply(Vec2::new(0.0, 0.0)),
            self.apply(Vec2::new(w, 0.0)),
            self.apply(Vec2::new(w, h)),
            self.apply(Vec2::new(0.0, h)),
        ];
        let mut min = corners[0];
        let mut max = corners[0];
        for c in &corners[1..] {
            min = Vec2::new(min.x.min(c.x), min.y.min(c.y));
            max = Vec2::new(max.x.max(c.x), max.y.max(c.y));
        }
        Rect::from_edges(min.x, min.y, max.x, max.y)
    }
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}
