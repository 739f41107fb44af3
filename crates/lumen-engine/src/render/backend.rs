use crate::coords::Canvas;
use crate::paint::Color;

use super::RenderError;
use super::state::RenderState;
use super::target::TargetInfo;
use super::texture::{Bitmap, TextureId};

/// Counters for one executed frame.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct FrameStats {
    pub quads: usize,
    pub operations: usize,
    pub draw_calls: usize,
    pub program_switches: usize,
    pub target_binds: usize,
    /// Operations or texture runs dropped because a target or texture was unavailable.
    pub skipped: usize,
}

/// A render executor: turns a finished [`RenderState`] into pixels.
pub trait RenderBackend {
    /// Largest quad list this backend can draw in one frame.
    fn max_quads(&self) -> usize;

    /// True when the cached contents of `target` may be sampled without
    /// re-recording the owner's subtree.
    fn is_render_texture_reusable(&self, target: &TargetInfo) -> bool;

    fn upload_texture(&mut self, id: TextureId, bitmap: &Bitmap) -> Result<(), RenderError>;

    fn release_texture(&mut self, id: TextureId);

    fn execute(&mut self, state: &RenderState) -> Result<FrameStats, RenderError>;

    fn on_resize_canvas(&mut self, canvas: Canvas);

    /// Main target clear color; `None` keeps previous contents.
    fn set_clear_color(&mut self, color: Option<Color>);

    /// Releases backend resources. Idempotent.
    fn destroy(&mut self);
}
