//! Fixed-capacity quad storage.
//!
//! Each quad occupies one 80-byte slot: four [`QuadVertex`] records in the
//! order top-left, top-right, bottom-right, bottom-left. The byte view is
//! uploaded to the device verbatim; per-quad metadata stays on the CPU.

use bytemuck::{Pod, Zeroable};

use crate::coords::{Affine, Vec2};
use crate::paint::Color;

use super::RenderError;
use super::target::TargetId;
use super::texture::TextureSource;

/// Bytes per quad in the device buffer.
pub const QUAD_STRIDE: usize = 80;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
    /// Premultiplied `[r, g, b, a]` unorm bytes, little-endian.
    pub color: u32,
}

const _: () = assert!(core::mem::size_of::<QuadVertex>() * 4 == QUAD_STRIDE);

impl QuadVertex {
    const ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x2, // pos
        1 => Float32x2, // uv
        2 => Unorm8x4   // color
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: core::mem::size_of::<QuadVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// Texture sub-rectangle in normalized coordinates.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct UvRect {
    pub u0: f32,
    pub v0: f32,
    pub u1: f32,
    pub v1: f32,
}

impl UvRect {
    pub const FULL: UvRect = UvRect { u0: 0.0, v0: 0.0, u1: 1.0, v1: 1.0 };

    #[inline]
    pub fn is_full(self) -> bool {
        self == Self::FULL
    }
}

impl Default for UvRect {
    fn default() -> Self {
        Self::FULL
    }
}

/// Everything needed to emit one quad.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct QuadParams {
    /// Local → target transform.
    pub context: Affine,
    /// Accumulated alpha.
    pub alpha: f32,
    pub size: Vec2,
    pub uv: UvRect,
    /// Top-left, top-right, bottom-right, bottom-left.
    pub colors: [Color; 4],
}

impl QuadParams {
    pub fn solid(context: Affine, size: Vec2, color: Color) -> Self {
        Self {
            context,
            alpha: 1.0,
            size,
            uv: UvRect::FULL,
            colors: [color; 4],
        }
    }
}

/// CPU-side metadata kept next to each slot.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct QuadMeta {
    pub texture: TextureSource,
    pub context: Affine,
    pub size: Vec2,
    pub uv: UvRect,
    /// Alpha-scaled corner colors.
    pub colors: [Color; 4],
    pub white: bool,
    pub simple_tex_coords: bool,
    pub target: Option<TargetId>,
}

pub struct QuadList {
    vertices: Vec<QuadVertex>,
    meta: Vec<QuadMeta>,
    capacity: usize,
}

impl QuadList {
    pub fn with_capacity(max_quads: usize) -> Self {
        let capacity = max_quads.max(1);
        Self {
            vertices: vec![QuadVertex::zeroed(); capacity * 4],
            meta: Vec::with_capacity(capacity),
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.meta.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.meta.is_empty()
    }

    /// Forgets all quads; slots are overwritten by the next frame.
    pub fn clear(&mut self) {
        self.meta.clear();
    }

    /// Appends a quad and returns its index.
    pub fn add(
        &mut self,
        texture: TextureSource,
        params: &QuadParams,
        target: Option<TargetId>,
    ) -> Result<usize, RenderError> {
        let index = self.meta.len();
        if index >= self.capacity {
            return Err(RenderError::BufferExhausted { capacity: self.capacity });
        }

        let colors = params.colors.map(|c| c.scale_alpha(params.alpha));
        let ctx = params.context;
        let (w, h) = (params.size.x, params.size.y);
        let uv = params.uv;
        let corners = [
            (Vec2::new(0.0, 0.0), [uv.u0, uv.v0]),
            (Vec2::new(w, 0.0), [uv.u1, uv.v0]),
            (Vec2::new(w, h), [uv.u1, uv.v1]),
            (Vec2::new(0.0, h), [uv.u0, uv.v1]),
        ];

        let slot = &mut self.vertices[index * 4..index * 4 + 4];
        for (i, (local, tex)) in corners.into_iter().enumerate() {
            let p = ctx.apply(local);
            slot[i] = QuadVertex {
                pos: [p.x, p.y],
                uv: tex,
                color: colors[i].pack(),
            };
        }

        self.meta.push(QuadMeta {
            texture,
            context: ctx,
            size: params.size,
            uv,
            colors,
            white: texture.is_white(),
            simple_tex_coords: uv.is_full(),
            target,
        });
        Ok(index)
    }

    #[inline]
    pub fn meta(&self, index: usize) -> Option<&QuadMeta> {
        self.meta.get(index)
    }

    #[inline]
    pub fn metas(&self) -> &[QuadMeta] {
        &self.meta
    }

    /// Bytes of all quads added this frame, `len() * QUAD_STRIDE` long.
    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices[..self.meta.len() * 4])
    }

    /// Reads a quad's vertices back from the byte view.
    pub fn vertices(&self, index: usize) -> Option<[QuadVertex; 4]> {
        if index >= self.meta.len() {
            return None;
        }
        let bytes = self.bytes();
        let base = index * QUAD_STRIDE;
        let vertex = core::mem::size_of::<QuadVertex>();
        Some(core::array::from_fn(|i| {
            let off = base + i * vertex;
            bytemuck::pod_read_unaligned(&bytes[off..off + vertex])
        }))
    }

    /// Replaces the storage with a larger one. Existing quads are dropped.
    pub fn grow(&mut self, max_quads: usize) {
        if max_quads <= self.capacity {
            return;
        }
        *self = Self::with_capacity(max_quads);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(x: f32, y: f32) -> QuadParams {
        QuadParams::solid(Affine::translate(x, y), Vec2::new(10.0, 20.0), Color::WHITE)
    }

    // ── layout ────────────────────────────────────────────────────────────

    #[test]
    fn stride_is_eighty_bytes() {
        let mut list = QuadList::with_capacity(4);
        list.add(TextureSource::White, &params(0.0, 0.0), None).unwrap();
        list.add(TextureSource::White, &params(1.0, 1.0), None).unwrap();
        assert_eq!(list.bytes().len(), 2 * QUAD_STRIDE);
    }

    #[test]
    fn attributes_read_back_at_their_offsets() {
        let mut list = QuadList::with_capacity(4);
        let p = QuadParams {
            context: Affine::translate(5.0, 7.0),
            alpha: 0.5,
            size: Vec2::new(10.0, 20.0),
            uv: UvRect { u0: 0.25, v0: 0.0, u1: 0.75, v1: 0.5 },
            colors: [
                Color::from_premul(1.0, 0.0, 0.0, 1.0),
                Color::WHITE,
                Color::WHITE,
                Color::WHITE,
            ],
        };
        list.add(TextureSource::White, &params(0.0, 0.0), None).unwrap();
        list.add(TextureSource::White, &p, None).unwrap();

        let bytes = list.bytes();
        let base = QUAD_STRIDE;
        let f32_at = |off: usize| f32::from_le_bytes(bytes[off..off + 4].try_into().unwrap());
        // Bottom-right vertex: third record, 20 bytes each.
        assert_eq!(f32_at(base + 40), 15.0);
        assert_eq!(f32_at(base + 44), 27.0);
        assert_eq!(f32_at(base + 48), 0.75);
        assert_eq!(f32_at(base + 52), 0.5);
        // Top-left color: alpha-scaled red.
        assert_eq!(&bytes[base + 16..base + 20], &[128, 0, 0, 128]);

        let v = list.vertices(1).unwrap();
        assert_eq!(v[0].pos, [5.0, 7.0]);
        assert_eq!(v[1].uv, [0.75, 0.0]);
        assert_eq!(v[3].pos, [5.0, 27.0]);
    }

    // ── metadata ──────────────────────────────────────────────────────────

    #[test]
    fn metadata_flags() {
        let mut list = QuadList::with_capacity(4);
        let mut p = params(0.0, 0.0);
        list.add(TextureSource::White, &p, None).unwrap();
        p.uv = UvRect { u0: 0.0, v0: 0.0, u1: 0.5, v1: 0.5 };
        list.add(TextureSource::Target(TargetId(3)), &p, Some(TargetId(1))).unwrap();

        let a = list.meta(0).unwrap();
        assert!(a.white && a.simple_tex_coords && a.target.is_none());
        let b = list.meta(1).unwrap();
        assert!(!b.white && !b.simple_tex_coords);
        assert_eq!(b.target, Some(TargetId(1)));
    }

    // ── capacity ──────────────────────────────────────────────────────────

    #[test]
    fn add_past_capacity_fails() {
        let mut list = QuadList::with_capacity(1);
        list.add(TextureSource::White, &params(0.0, 0.0), None).unwrap();
        let err = list.add(TextureSource::White, &params(0.0, 0.0), None).unwrap_err();
        assert_eq!(err, RenderError::BufferExhausted { capacity: 1 });
    }

    #[test]
    fn clear_reuses_slots() {
        let mut list = QuadList::with_capacity(1);
        list.add(TextureSource::White, &params(0.0, 0.0), None).unwrap();
        list.clear();
        assert!(list.is_empty());
        assert_eq!(list.add(TextureSource::White, &params(3.0, 3.0), None).unwrap(), 0);
        assert_eq!(list.vertices(0).unwrap()[0].pos, [3.0, 3.0]);
    }

    #[test]
    fn grow_increases_capacity() {
        let mut list = QuadList::with_capacity(2);
        list.grow(8);
        assert_eq!(list.capacity(), 8);
        list.grow(4);
        assert_eq!(list.capacity(), 8);
    }
}
