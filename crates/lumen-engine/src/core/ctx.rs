use std::time::Duration;

use winit::window::{Window, WindowId};

use crate::device::{Gpu, SurfaceErrorAction};
use crate::render::{GpuExecutor, RenderError, Renderer, WgpuDevice};
use crate::scene::SceneTree;
use crate::window::RuntimeCtx;

use super::app::AppControl;

/// Quad renderer bound to a window's GPU device.
pub type WindowRenderer = Renderer<GpuExecutor<WgpuDevice>>;

/// Per-window handles and immutable window metadata.
pub struct WindowCtx<'a> {
    pub id: WindowId,
    pub window: &'a Window,
}

impl<'a> WindowCtx<'a> {
    /// Returns the logical window size as `(width, height)` in logical pixels.
    pub fn logical_size(&self) -> (f32, f32) {
        let phys = self.window.inner_size();
        let scale = self.window.scale_factor();
        let logi: winit::dpi::LogicalSize<f64> = phys.to_logical(scale);
        (logi.width as f32, logi.height as f32)
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }
}

/// Per-frame context passed to `core::App::on_frame`.
///
/// Lifetimes:
/// - `'a` is the duration of the callback invocation
/// - `'w` is the window-borrow lifetime carried by `Gpu<'w>`
pub struct FrameCtx<'a, 'w> {
    pub window: WindowCtx<'a>,
    pub gpu: &'a mut Gpu<'w>,
    pub renderer: &'a mut WindowRenderer,
    /// Time since the previous frame of this window.
    pub dt: Duration,
    pub runtime: &'a mut RuntimeCtx,
    /// The surface was resized or reconfigured since the last presented frame.
    pub(crate) surface_invalidated: bool,
}

impl<'a, 'w> FrameCtx<'a, 'w> {
    /// Renders `scene` into the window and presents it.
    ///
    /// Unchanged scenes skip the GPU entirely. Surface errors reconfigure or
    /// skip the frame; a lost device is recreated and the scene is flagged so
    /// the next frame redraws it.
    pub fn render(&mut self, scene: &mut SceneTree) -> AppControl {
        if self.surface_invalidated {
            scene.request_render();
        }
        if !scene.needs_render() {
            return AppControl::Continue;
        }

        let frame = match self.gpu.begin_frame() {
            Ok(f) => f,
            Err(err) => {
                let action = self.gpu.handle_surface_error(err.clone());
                if action == SurfaceErrorAction::Fatal {
                    log::error!("surface error is fatal: {err}");
                    return AppControl::Exit;
                }
                scene.request_render();
                self.window.request_redraw();
                return AppControl::Continue;
            }
        };

        self.renderer
            .backend_mut()
            .device_mut()
            .attach_frame(frame.view.clone());

        let result = self.renderer.render_or_grow(scene);
        if result.is_ok() {
            self.window.window.pre_present_notify();
            self.gpu.present(frame);
        } else {
            // Nothing was submitted for this image; dropping it discards it.
            self.renderer.backend_mut().device_mut().detach_frame();
            drop(frame);
        }

        match result {
            Ok(_) => {
                self.surface_invalidated = false;
                AppControl::Continue
            }
            Err(RenderError::DeviceLost) => self.recover_device(scene),
            Err(err) => {
                log::warn!("frame dropped: {err}");
                self.window.request_redraw();
                AppControl::Continue
            }
        }
    }

    fn recover_device(&mut self, scene: &mut SceneTree) -> AppControl {
        match self.gpu.recreate_device() {
            Ok((device, queue)) => {
                self.renderer.backend_mut().device_mut().replace_device(device, queue);
                scene.request_render();
                self.window.request_redraw();
                AppControl::Continue
            }
            Err(err) => {
                log::error!("could not recreate gpu device: {err:#}");
                AppControl::Exit
            }
        }
    }
}
