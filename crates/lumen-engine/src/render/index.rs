//! Shared quad index buffer.
//!
//! Every quad is drawn as two triangles `{4i, 4i+1, 4i+2}` and
//! `{4i, 4i+2, 4i+3}`; the buffer is generated once for the maximum quad
//! count and never changes.

/// Largest vertex index a 16-bit index buffer can address, plus one.
pub const U16_VERTEX_LIMIT: usize = 65_536;

/// Quads addressable with 16-bit indices.
pub const U16_MAX_QUADS: usize = U16_VERTEX_LIMIT / 4;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum IndexFormat {
    U16,
    U32,
}

impl IndexFormat {
    pub fn to_wgpu(self) -> wgpu::IndexFormat {
        match self {
            IndexFormat::U16 => wgpu::IndexFormat::Uint16,
            IndexFormat::U32 => wgpu::IndexFormat::Uint32,
        }
    }
}

/// Index width and quad capacity chosen at init.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct IndexPlan {
    pub format: IndexFormat,
    pub max_quads: usize,
}

impl IndexPlan {
    /// 32-bit indices only when both needed and supported; otherwise the quad
    /// count is capped to what 16-bit indices can address.
    pub fn select(max_quads: usize, supports_u32: bool) -> Self {
        let max_quads = max_quads.max(1);
        if max_quads * 4 <= U16_VERTEX_LIMIT {
            return Self { format: IndexFormat::U16, max_quads };
        }
        if supports_u32 {
            Self { format: IndexFormat::U32, max_quads }
        } else {
            Self { format: IndexFormat::U16, max_quads: U16_MAX_QUADS }
        }
    }

    /// Index buffer contents as raw bytes in the plan's format.
    pub fn build_bytes(&self) -> Vec<u8> {
        match self.format {
            IndexFormat::U16 => {
                let idx: Vec<u16> = quad_indices(self.max_quads).map(|i| i as u16).collect();
                bytemuck::cast_slice(&idx).to_vec()
            }
            IndexFormat::U32 => {
                let idx: Vec<u32> = quad_indices(self.max_quads).collect();
                bytemuck::cast_slice(&idx).to_vec()
            }
        }
    }

    /// Index-buffer range covering `count` quads starting at quad `first`.
    #[inline]
    pub fn index_range(first: u32, count: u32) -> core::ops::Range<u32> {
        first * 6..(first + count) * 6
    }
}

/// The six indices of every quad below `max_quads`, in order.
pub fn quad_indices(max_quads: usize) -> impl Iterator<Item = u32> {
    (0..max_quads as u32).flat_map(|i| {
        let j = i * 4;
        [j, j + 1, j + 2, j, j + 2, j + 3]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── generation ────────────────────────────────────────────────────────

    #[test]
    fn six_indices_per_quad() {
        let idx: Vec<u32> = quad_indices(3).collect();
        assert_eq!(idx.len(), 18);
        assert_eq!(&idx[..6], &[0, 1, 2, 0, 2, 3]);
        assert_eq!(&idx[12..], &[8, 9, 10, 8, 10, 11]);
    }

    #[test]
    fn every_quad_follows_the_pattern() {
        let idx: Vec<u32> = quad_indices(100).collect();
        for (i, chunk) in idx.chunks_exact(6).enumerate() {
            let j = i as u32 * 4;
            assert_eq!(chunk, &[j, j + 1, j + 2, j, j + 2, j + 3]);
        }
    }

    #[test]
    fn u16_bytes_are_two_per_index() {
        let plan = IndexPlan::select(10, false);
        assert_eq!(plan.build_bytes().len(), 10 * 6 * 2);
    }

    // ── selection ─────────────────────────────────────────────────────────

    #[test]
    fn small_lists_use_u16() {
        assert_eq!(IndexPlan::select(10_000, true).format, IndexFormat::U16);
        assert_eq!(IndexPlan::select(U16_MAX_QUADS, true).format, IndexFormat::U16);
    }

    #[test]
    fn large_lists_use_u32_when_supported() {
        let plan = IndexPlan::select(20_000, true);
        assert_eq!(plan, IndexPlan { format: IndexFormat::U32, max_quads: 20_000 });
    }

    #[test]
    fn large_lists_are_capped_without_u32() {
        let plan = IndexPlan::select(20_000, false);
        assert_eq!(plan, IndexPlan { format: IndexFormat::U16, max_quads: 16_384 });
    }

    #[test]
    fn index_range_is_six_per_quad() {
        assert_eq!(IndexPlan::index_range(2, 3), 12..30);
    }
}
