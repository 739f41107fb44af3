use core::cmp::Ordering;

/// Stacking layer among siblings. Higher values paint on top.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default, Ord, PartialOrd)]
pub struct ZIndex(pub i32);

/// Paint order of a child within its parent.
///
/// Ordering rules:
/// 1) `z`: ascending (back-to-front)
/// 2) `order`: ascending (insertion order for equal z)
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct PaintKey {
    pub z: ZIndex,
    pub order: u32,
}

impl PaintKey {
    #[inline]
    pub const fn new(z: ZIndex, order: u32) -> Self {
        Self { z, order }
    }
}

impl Ord for PaintKey {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.z.cmp(&other.z).then(self.order.cmp(&other.order))
    }
}

impl PartialOrd for PaintKey {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn z_wins_over_insertion_order() {
        let back = PaintKey::new(ZIndex(-1), 10);
        let front = PaintKey::new(ZIndex(0), 0);
        assert!(back < front);
    }

    #[test]
    fn equal_z_keeps_insertion_order() {
        assert!(PaintKey::new(ZIndex(2), 1) < PaintKey::new(ZIndex(2), 2));
    }
}
