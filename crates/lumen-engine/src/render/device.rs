//! Low-level device seam driven by [`GpuExecutor`](super::GpuExecutor).
//!
//! The executor owns the state machine (which program, target, scissor and
//! texture are bound); a device only translates individual commands into API
//! calls. This keeps the wgpu code free of batching logic and lets tests
//! drive the executor with a recording double.

use crate::paint::Color;

use super::RenderError;
use super::index::IndexPlan;
use super::program::{ProgramKind, Uniforms};
use super::scissor::ScissorRect;
use super::target::{TargetId, TargetInfo};
use super::texture::{Bitmap, TextureId, TextureSource};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DeviceCaps {
    /// 32-bit index buffers are available.
    pub u32_indices: bool,
    /// The main framebuffer has its origin at the bottom-left, so scissor
    /// rects on it must be flipped.
    pub main_target_bottom_left: bool,
}

/// Per-frame parameters handed to [`RenderDevice::begin_frame`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FrameSetup {
    /// Number of operations, i.e. the upper bound on uniform uploads.
    pub operations: usize,
    /// Main framebuffer size in device pixels.
    pub surface: (u32, u32),
}

pub trait RenderDevice {
    fn caps(&self) -> DeviceCaps;

    /// Bumped whenever the underlying device is replaced; device resources
    /// created under an older generation are gone.
    fn generation(&self) -> u64;

    fn is_lost(&self) -> bool;

    /// (Re)creates buffers, pipelines and the index buffer. Idempotent.
    fn init(&mut self, plan: IndexPlan) -> Result<(), RenderError>;

    /// Starts a frame with premultiplied-alpha blending and no depth test.
    fn begin_frame(&mut self, frame: FrameSetup) -> Result<(), RenderError>;

    /// Replaces the vertex buffer contents with this frame's quads.
    fn upload_quads(&mut self, bytes: &[u8]);

    /// Makes storage for `target` available at `size` device pixels.
    /// Storage is keyed by the target's owner and survives across frames.
    fn prepare_target(&mut self, target: &TargetInfo, size: (u32, u32)) -> Result<(), RenderError>;

    /// Redirects drawing to `target` (`None` = main), optionally clearing it.
    fn bind_target(&mut self, target: Option<TargetId>, viewport: (u32, u32), clear: Option<Color>);

    /// `None` disables scissoring.
    fn set_scissor(&mut self, rect: Option<ScissorRect>);

    fn use_program(&mut self, kind: ProgramKind);

    fn stop_program(&mut self, kind: ProgramKind);

    fn set_uniforms(&mut self, uniforms: &Uniforms);

    fn bind_texture(&mut self, texture: TextureSource) -> Result<(), RenderError>;

    /// Draws `count` quads starting at quad `first` of the shared index buffer.
    fn draw_quads(&mut self, first: u32, count: u32);

    fn end_frame(&mut self) -> Result<(), RenderError>;

    fn upload_texture(&mut self, id: TextureId, bitmap: &Bitmap) -> Result<(), RenderError>;

    fn release_texture(&mut self, id: TextureId);

    /// Releases every device resource. Idempotent.
    fn destroy(&mut self);
}
