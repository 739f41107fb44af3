use anyhow::{Context, Result};
use ouroboros::self_referencing;
use std::collections::HashMap;
use std::time::Instant;

use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::coords::Canvas;
use crate::core::{App as CoreApp, AppControl, FrameCtx, WindowCtx, WindowRenderer};
use crate::device::{Gpu, GpuInit};
use crate::render::{GpuExecutor, Renderer, RendererConfig};

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,

    /// Renderer settings for the window. The pixel ratio is taken from the
    /// window's scale factor.
    pub renderer: RendererConfig,

    /// Request a redraw after every event-loop pass. When off, frames are
    /// driven by window events and [`WindowCtx::request_redraw`].
    pub continuous_redraw: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "lumen".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
            renderer: RendererConfig::default(),
            continuous_redraw: true,
        }
    }
}

/// Window commands queued by the app during a frame; applied once
/// `on_frame` returns.
#[derive(Default)]
pub struct RuntimeCtx {
    commands: Vec<Command>,
}

impl RuntimeCtx {
    pub fn create_window(&mut self, config: RuntimeConfig) {
        self.commands.push(Command::CreateWindow(config));
    }

    pub fn close_window(&mut self, id: WindowId) {
        self.commands.push(Command::CloseWindow(id));
    }

    pub fn exit(&mut self) {
        self.commands.push(Command::Exit);
    }
}

enum Command {
    CreateWindow(RuntimeConfig),
    CloseWindow(WindowId),
    Exit,
}

/// Event loop host: one `Gpu` and one quad renderer per window.
pub struct Runtime;

impl Runtime {
    pub fn run<A>(initial: RuntimeConfig, gpu_init: GpuInit, app: A) -> Result<()>
    where
        A: 'static + CoreApp,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(initial, gpu_init, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        Ok(())
    }
}

#[self_referencing]
struct WindowEntry {
    renderer: Option<WindowRenderer>,
    last_frame: Instant,
    surface_invalidated: bool,
    continuous_redraw: bool,

    window: Window,

    #[borrows(window)]
    #[covariant]
    gpu: Gpu<'this>,
}

fn window_canvas(window: &Window, size: PhysicalSize<u32>) -> Canvas {
    Canvas::from_physical(size.width, size.height, window.scale_factor() as f32)
}

struct AppState<A>
where
    A: CoreApp + 'static,
{
    initial: RuntimeConfig,
    gpu_init: GpuInit,
    app: A,

    windows: HashMap<WindowId, WindowEntry>,
    exit_requested: bool,
}

impl<A> AppState<A>
where
    A: CoreApp + 'static,
{
    fn new(initial: RuntimeConfig, gpu_init: GpuInit, app: A) -> Self {
        Self {
            initial,
            gpu_init,
            app,
            windows: HashMap::new(),
            exit_requested: false,
        }
    }

    fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    fn create_window_entry(
        &mut self,
        event_loop: &ActiveEventLoop,
        config: RuntimeConfig,
    ) -> Result<WindowId> {
        let attrs = Window::default_attributes()
            .with_title(config.title)
            .with_inner_size(config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let id = window.id();
        let gpu_init = self.gpu_init.clone();

        let mut entry = WindowEntryTryBuilder {
            renderer: None,
            last_frame: Instant::now(),
            surface_invalidated: true,
            continuous_redraw: config.continuous_redraw,
            window,
            gpu_builder: |w| pollster::block_on(Gpu::new(w, gpu_init)),
        }
        .try_build()
        .context("GPU initialization failed for window")?;

        let renderer_config = config.renderer;
        entry.with_mut(|fields| {
            let canvas = window_canvas(fields.window, fields.gpu.size());
            let config = RendererConfig { pixel_ratio: canvas.pixel_ratio, ..renderer_config.clone() };
            let backend = GpuExecutor::new(fields.gpu.render_device());
            *fields.renderer = Some(Renderer::new(config, canvas.width, canvas.height, backend));
        });

        self.windows.insert(id, entry);
        Ok(id)
    }

    fn destroy_window_entry(&mut self, id: WindowId) {
        if let Some(mut entry) = self.windows.remove(&id) {
            entry.with_renderer_mut(|renderer| {
                if let Some(renderer) = renderer {
                    renderer.destroy();
                }
            });
        }
    }

    fn apply_commands(&mut self, event_loop: &ActiveEventLoop, mut ctx: RuntimeCtx) {
        for cmd in ctx.commands.drain(..) {
            match cmd {
                Command::CreateWindow(cfg) => {
                    if let Err(e) = self.create_window_entry(event_loop, cfg) {
                        log::error!("failed to create window: {e:#}");
                        self.request_exit();
                    }
                }
                Command::CloseWindow(id) => self.destroy_window_entry(id),
                Command::Exit => self.request_exit(),
            }
        }

        if self.windows.is_empty() {
            self.request_exit();
        }

        if self.exit_requested {
            event_loop.exit();
        }
    }

    fn resize_window(&mut self, id: WindowId, new_size: PhysicalSize<u32>) {
        let Some(entry) = self.windows.get_mut(&id) else {
            return;
        };
        entry.with_mut(|fields| {
            fields.gpu.resize(new_size);
            if new_size.width > 0 && new_size.height > 0 {
                if let Some(renderer) = fields.renderer.as_mut() {
                    renderer.on_resize_canvas(window_canvas(fields.window, new_size));
                }
            }
            *fields.surface_invalidated = true;
            fields.window.request_redraw();
        });
    }
}

impl<A> ApplicationHandler for AppState<A>
where
    A: CoreApp + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if !self.windows.is_empty() {
            return;
        }

        if let Err(e) = self.create_window_entry(event_loop, self.initial.clone()) {
            log::error!("failed to create initial window: {e:#}");
            self.request_exit();
            event_loop.exit();
            return;
        }

        for entry in self.windows.values() {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        event_loop.set_control_flow(ControlFlow::Wait);

        // Unchanged scenes are skipped by the renderer, so polling is cheap.
        for entry in self.windows.values() {
            if *entry.borrow_continuous_redraw() {
                entry.with_window(|w| w.request_redraw());
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        if !self.windows.contains_key(&window_id) {
            return;
        }

        if self.app.on_window_event(window_id, &event) == AppControl::Exit {
            self.request_exit();
            event_loop.exit();
            return;
        }

        match &event {
            WindowEvent::CloseRequested => {
                self.destroy_window_entry(window_id);
                if self.windows.is_empty() {
                    self.request_exit();
                    event_loop.exit();
                }
            }

            WindowEvent::Resized(new_size) => self.resize_window(window_id, *new_size),

            WindowEvent::ScaleFactorChanged { .. } => {
                let size = self.windows.get(&window_id).map(|e| e.with_window(|w| w.inner_size()));
                if let Some(size) = size {
                    self.resize_window(window_id, size);
                }
            }

            WindowEvent::RedrawRequested => {
                let mut runtime_ctx = RuntimeCtx::default();
                let mut app_control = AppControl::Continue;

                let (app, windows) = (&mut self.app, &mut self.windows);
                if let Some(entry) = windows.get_mut(&window_id) {
                    entry.with_mut(|fields| {
                        let Some(renderer) = fields.renderer.as_mut() else {
                            return;
                        };
                        let now = Instant::now();
                        let dt = now - *fields.last_frame;
                        *fields.last_frame = now;

                        let mut ctx = FrameCtx {
                            window: WindowCtx { id: window_id, window: fields.window },
                            gpu: fields.gpu,
                            renderer,
                            dt,
                            runtime: &mut runtime_ctx,
                            surface_invalidated: *fields.surface_invalidated,
                        };

                        app_control = app.on_frame(&mut ctx);
                        *fields.surface_invalidated = ctx.surface_invalidated;
                    });
                }

                if app_control == AppControl::Exit {
                    runtime_ctx.exit();
                }

                self.apply_commands(event_loop, runtime_ctx);
            }

            _ => {}
        }

        if self.exit_requested {
            event_loop.exit();
        }
    }
}
