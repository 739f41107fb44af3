use crate::coords::Canvas;
use crate::paint::Color;
use crate::scene::{SceneTree, record_scene};

use super::RenderError;
use super::backend::{FrameStats, RenderBackend};
use super::state::RenderState;
use super::texture::{Bitmap, TextureId};

/// Renderer configuration.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Initial quad list capacity. Grows on demand up to the backend limit.
    pub max_quads: usize,

    /// Main target clear color (premultiplied). `None` leaves previous
    /// contents in place.
    pub clear_color: Option<Color>,

    /// Logical → device pixel scale.
    pub pixel_ratio: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            max_quads: 10_000,
            clear_color: None,
            pixel_ratio: 1.0,
        }
    }
}

/// Drives one frame: scene traversal into the render state, then execution
/// on the backend.
pub struct Renderer<B: RenderBackend> {
    state: RenderState,
    backend: B,
    canvas: Canvas,
    next_texture: u32,
}

impl<B: RenderBackend> Renderer<B> {
    /// `width`/`height` are the logical canvas size.
    pub fn new(config: RendererConfig, width: f32, height: f32, mut backend: B) -> Self {
        let canvas = Canvas::new(width, height, config.pixel_ratio);
        let max_quads = config.max_quads.min(backend.max_quads());
        if max_quads < config.max_quads {
            log::warn!(
                "requested {} quads; backend supports {max_quads}",
                config.max_quads
            );
        }
        backend.on_resize_canvas(canvas);
        backend.set_clear_color(config.clear_color);
        Self {
            state: RenderState::new(max_quads),
            backend,
            canvas,
            next_texture: 1,
        }
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Render state of the last frame.
    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn register_texture(&mut self, bitmap: &Bitmap) -> Result<TextureId, RenderError> {
        let id = TextureId(self.next_texture);
        self.backend.upload_texture(id, bitmap)?;
        self.next_texture += 1;
        Ok(id)
    }

    pub fn release_texture(&mut self, id: TextureId) {
        self.backend.release_texture(id);
    }

    /// Records and executes one frame.
    ///
    /// On `BufferExhausted` the quad list is enlarged and the scene is flagged
    /// for redraw, so the next call can succeed.
    pub fn render(&mut self, scene: &mut SceneTree) -> Result<FrameStats, RenderError> {
        scene.prepare_frame();
        self.state.begin_frame(self.canvas);

        if let Err(err) = record_scene(scene, &mut self.state, &self.backend) {
            if let RenderError::BufferExhausted { capacity } = err {
                self.grow(capacity);
            }
            scene.request_render();
            return Err(err);
        }
        self.state.finish_frame();

        let stats = self.backend.execute(&self.state)?;
        scene.mark_rendered();
        log::trace!("frame: {stats:?}");
        Ok(stats)
    }

    /// Like [`render`](Self::render), but retries within the same frame
    /// while the quad list can still grow. Hosts that hold an acquired
    /// surface use this so an exhausted list does not cost a frame.
    pub fn render_or_grow(&mut self, scene: &mut SceneTree) -> Result<FrameStats, RenderError> {
        loop {
            let capacity = self.state.capacity();
            match self.render(scene) {
                Err(RenderError::BufferExhausted { .. }) if self.state.capacity() > capacity => {}
                other => return other,
            }
        }
    }

    fn grow(&mut self, capacity: usize) {
        let limit = self.backend.max_quads();
        let next = capacity.saturating_mul(2).min(limit);
        if next > capacity {
            log::warn!("quad list full at {capacity}; growing to {next}");
            self.state.grow(next);
        } else {
            log::error!("quad list full at backend limit {limit}");
        }
    }

    /// Applies a new canvas size or pixel ratio.
    pub fn on_resize_canvas(&mut self, canvas: Canvas) {
        if !canvas.is_valid() {
            return;
        }
        self.canvas = canvas;
        self.backend.on_resize_canvas(canvas);
    }

    pub fn destroy(&mut self) {
        self.backend.destroy();
    }
}
