use super::Vec2;

/// Axis-aligned rectangle in logical pixels (top-left origin).
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub origin: Vec2,
    pub size: Vec2,
}

impl Rect {
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            origin: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    /// Builds a rect from its left/top/right/bottom edges.
    #[inline]
    pub fn from_edges(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self::new(left, top, right - left, bottom - top)
    }

    #[inline]
    pub fn right(self) -> f32 {
        self.origin.x + self.size.x
    }

    #[inline]
    pub fn bottom(self) -> f32 {
        self.origin.y + self.size.y
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.size.x <= 0.0 || self.size.y <= 0.0
    }

    /// Intersection of two clip rects.
    ///
    /// Disjoint rects yield a zero-area rect at the overlap origin rather than
    /// `None`: an empty clip still has to suppress drawing.
    pub fn clip(self, other: Rect) -> Rect {
        let x0 = self.origin.x.max(other.origin.x);
        let y0 = self.origin.y.max(other.origin.y);
        let x1 = self.right().min(other.right()).max(x0);
        let y1 = self.bottom().min(other.bottom()).max(y0);
        Rect::from_edges(x0, y0, x1, y1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(x: f32, y: f32, w: f32, h: f32) -> Rect { Rect::new(x, y, w, h) }

    // ── edges ─────────────────────────────────────────────────────────────

    #[test]
    fn from_edges_computes_size() {
        assert_eq!(Rect::from_edges(10.0, 10.0, 110.0, 60.0), r(10.0, 10.0, 100.0, 50.0));
    }

    #[test]
    fn right_and_bottom() {
        let rect = r(1.0, 2.0, 10.0, 20.0);
        assert_eq!(rect.right(), 11.0);
        assert_eq!(rect.bottom(), 22.0);
    }

    // ── clip ──────────────────────────────────────────────────────────────

    #[test]
    fn clip_overlapping() {
        let a = r(0.0, 0.0, 10.0, 10.0);
        let b = r(5.0, 5.0, 10.0, 10.0);
        assert_eq!(a.clip(b), r(5.0, 5.0, 5.0, 5.0));
    }

    #[test]
    fn clip_contained() {
        let outer = r(0.0, 0.0, 100.0, 100.0);
        let inner = r(10.0, 10.0, 20.0, 20.0);
        assert_eq!(outer.clip(inner), inner);
    }

    #[test]
    fn clip_disjoint_is_empty() {
        let a = r(0.0, 0.0, 5.0, 5.0);
        let b = r(20.0, 20.0, 5.0, 5.0);
        assert!(a.clip(b).is_empty());
    }

    // ── is_empty ──────────────────────────────────────────────────────────

    #[test]
    fn is_empty_zero_size() {
        assert!(r(0.0, 0.0, 0.0, 5.0).is_empty());
        assert!(r(0.0, 0.0, 5.0, 0.0).is_empty());
        assert!(!r(0.0, 0.0, 1.0, 1.0).is_empty());
    }
}
