//! Lumen studio: a small scene exercising the renderer, either in a window
//! or rendered once to a PNG by the software backend.
//!
//! Images given on the command line are decoded in the background and
//! appear in a row along the bottom of the scene once ready.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use lumen_engine::core::{App, AppControl, FrameCtx};
use lumen_engine::coords::Vec2;
use lumen_engine::decode::{DecodeConfig, DecodeEvent, DecodeService, DecodeSource, RequestId};
use lumen_engine::device::GpuInit;
use lumen_engine::logging::{LoggingConfig, init_logging};
use lumen_engine::paint::Color;
use lumen_engine::render::{
    Bitmap, Program, RadialProgram, RenderBackend, Renderer, RendererConfig, SoftwareExecutor,
    TextureId, TiltProgram,
};
use lumen_engine::scene::{Element, ElementId, SceneTree, ZIndex};
use lumen_engine::window::{Runtime, RuntimeConfig};

const WIDTH: f32 = 960.0;
const HEIGHT: f32 = 600.0;

/// Lumen studio demo scene.
#[derive(Parser, Debug)]
#[command(name = "lumen-studio")]
#[command(about = "Renders the lumen demo scene", long_about = None)]
struct Cli {
    /// Render one frame with the software backend and write it as PNG
    #[arg(long, value_name = "PATH")]
    software: Option<PathBuf>,

    /// Images to decode and show in the gallery row
    images: Vec<PathBuf>,
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());
    let cli = Cli::parse();

    match cli.software {
        Some(out) => render_to_png(&out, &cli.images),
        None => {
            let studio = Studio::new(&cli.images);
            let config = RuntimeConfig {
                title: "Lumen Studio".to_string(),
                initial_size: winit::dpi::LogicalSize::new(WIDTH as f64, HEIGHT as f64),
                renderer: RendererConfig {
                    clear_color: Some(Color::from_argb(0xff1b1d23)),
                    ..RendererConfig::default()
                },
                continuous_redraw: true,
            };
            Runtime::run(config, GpuInit::default(), studio)
        }
    }
}

// ── scene ─────────────────────────────────────────────────────────────────

struct DemoScene {
    tree: SceneTree,
    card: ElementId,
    halo: ElementId,
    gallery: ElementId,
    checker: Option<TextureId>,
    checker_slot: ElementId,
}

impl DemoScene {
    fn build() -> Result<Self> {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let missing = || anyhow::anyhow!("scene insert failed");

        // Backdrop with a vertical gradient.
        tree.insert(
            root,
            Element::rect(0.0, 0.0, WIDTH, HEIGHT, Color::WHITE).with_vertical_gradient(
                Color::from_argb(0xff23263a),
                Color::from_argb(0xff101117),
            ),
        )
        .ok_or_else(missing)?;

        // Clipped strip: the wide child is cut at the strip's edges.
        let strip = tree
            .insert(
                root,
                Element::rect(40.0, 40.0, 400.0, 60.0, Color::from_argb(0xff30344a))
                    .with_clipping(true),
            )
            .ok_or_else(missing)?;
        for i in 0..6 {
            let color = if i % 2 == 0 { 0xffe8a33d } else { 0xff3dade8 };
            tree.insert(
                strip,
                Element::rect(-40.0 + i as f32 * 90.0, 10.0, 80.0, 40.0, Color::from_argb(color)),
            )
            .ok_or_else(missing)?;
        }

        // Tilted card rendered through an offscreen target.
        let mut tilt = TiltProgram::default();
        tilt.set_light_y(-0.6);
        tilt.set_light_z(0.8);
        let card = tree
            .insert(
                root,
                Element::rect(520.0, 60.0, 320.0, 200.0, Color::from_argb(0xff5b6cf0))
                    .with_render_to_texture(true)
                    .with_program(Program::Tilt(tilt)),
            )
            .ok_or_else(missing)?;
        tree.insert(card, Element::rect(20.0, 20.0, 120.0, 24.0, Color::WHITE))
            .ok_or_else(missing)?;
        tree.insert(
            card,
            Element::rect(20.0, 60.0, 280.0, 110.0, Color::from_straight(1.0, 1.0, 1.0, 0.25)),
        )
        .ok_or_else(missing)?;

        // Radial halo: a full-canvas gradient masked to a disc.
        let halo = tree
            .insert(
                root,
                Element::rect(60.0, 150.0, 360.0, 260.0, Color::WHITE)
                    .with_vertical_gradient(
                        Color::from_argb(0xffe83d6b),
                        Color::from_argb(0xff3de8b0),
                    )
                    .with_program(Program::Radial(RadialProgram::new(0.35, 4.0))),
            )
            .ok_or_else(missing)?;

        // Slot for a procedural texture, filled once the renderer exists.
        let checker_slot = tree
            .insert(root, Element::new().with_position(Vec2::new(520.0, 300.0)))
            .ok_or_else(missing)?;

        let gallery = tree
            .insert(
                root,
                Element::new()
                    .with_position(Vec2::new(40.0, 440.0))
                    .with_z_index(ZIndex(10)),
            )
            .ok_or_else(missing)?;

        Ok(Self { tree, card, halo, gallery, checker: None, checker_slot })
    }

    /// Registers the procedural texture with the renderer and shows it.
    fn attach_textures<B: RenderBackend>(&mut self, renderer: &mut Renderer<B>) -> Result<()> {
        if self.checker.is_some() {
            return Ok(());
        }
        let id = renderer.register_texture(&checker(64, 8))?;
        self.checker = Some(id);
        self.tree
            .insert(self.checker_slot, Element::image(0.0, 0.0, 160.0, 160.0, id))
            .context("scene insert failed")?;
        self.tree
            .insert(
                self.checker_slot,
                Element::image(180.0, 0.0, 160.0, 160.0, id)
                    .with_rotation(0.3)
                    .with_alpha(0.6),
            )
            .context("scene insert failed")?;
        Ok(())
    }

    fn animate(&mut self, t: f32) {
        if let Some(Program::Tilt(tilt)) =
            self.tree.get_mut(self.card).and_then(|e| e.program_mut())
        {
            tilt.set_rx(0.35 * (t * 0.8).sin());
            tilt.set_ry(0.45 * (t * 0.6).cos());
        }
        if let Some(Program::Radial(radial)) =
            self.tree.get_mut(self.halo).and_then(|e| e.program_mut())
        {
            radial.set_radius(0.3 + 0.08 * (t * 1.3).sin());
        }
    }

    fn add_image<B: RenderBackend>(
        &mut self,
        renderer: &mut Renderer<B>,
        index: usize,
        bitmap: &Bitmap,
    ) -> Result<()> {
        let id = renderer.register_texture(bitmap)?;
        let h = 120.0;
        let w = h * bitmap.width as f32 / bitmap.height.max(1) as f32;
        self.tree
            .insert(self.gallery, Element::image(index as f32 * 140.0, 0.0, w.min(130.0), h, id))
            .context("scene insert failed")?;
        Ok(())
    }
}

/// Opaque two-tone checkerboard.
fn checker(size: u32, cell: u32) -> Bitmap {
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let on = ((x / cell) + (y / cell)) % 2 == 0;
            pixels.extend_from_slice(if on { &[235, 235, 240, 255] } else { &[60, 64, 90, 255] });
        }
    }
    Bitmap::from_straight(size, size, pixels).unwrap_or_else(|| Bitmap::solid(size, size, [255; 4]))
}

// ── window app ────────────────────────────────────────────────────────────

struct Studio {
    scene: Option<DemoScene>,
    decode: DecodeService,
    requests: Vec<RequestId>,
    time: f32,
}

impl Studio {
    fn new(images: &[PathBuf]) -> Self {
        let mut decode = DecodeService::new(DecodeConfig::default());
        let requests = images
            .iter()
            .enumerate()
            .map(|(i, path)| {
                let id = RequestId(i as u64);
                decode.request(id, DecodeSource::Path(path.clone()));
                id
            })
            .collect();
        Self { scene: None, decode, requests, time: 0.0 }
    }
}

impl App for Studio {
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if self.scene.is_none() {
            match DemoScene::build() {
                Ok(scene) => self.scene = Some(scene),
                Err(err) => {
                    log::error!("{err:#}");
                    return AppControl::Exit;
                }
            }
        }
        let Some(scene) = self.scene.as_mut() else {
            return AppControl::Exit;
        };

        if let Err(err) = scene.attach_textures(ctx.renderer) {
            log::error!("texture upload failed: {err:#}");
        }

        for event in self.decode.poll() {
            let slot = self.requests.iter().position(|id| *id == event.id());
            match (event, slot) {
                (DecodeEvent::Ready { bitmap, .. }, Some(slot)) => {
                    if let Err(err) = scene.add_image(ctx.renderer, slot, &bitmap) {
                        log::warn!("image {slot} not shown: {err:#}");
                    }
                }
                (DecodeEvent::Failed { id, kind, message }, _) => {
                    log::warn!("decode {id:?} failed ({kind:?}): {message}");
                }
                _ => {}
            }
        }

        self.time += ctx.dt.as_secs_f32();
        scene.animate(self.time);
        ctx.render(&mut scene.tree)
    }
}

// ── software path ─────────────────────────────────────────────────────────

fn render_to_png(out: &PathBuf, images: &[PathBuf]) -> Result<()> {
    let config = RendererConfig {
        clear_color: Some(Color::from_argb(0xff1b1d23)),
        ..RendererConfig::default()
    };
    let mut renderer = Renderer::new(config, WIDTH, HEIGHT, SoftwareExecutor::new());
    let mut scene = DemoScene::build()?;
    scene.attach_textures(&mut renderer)?;

    if !images.is_empty() {
        let mut decode = DecodeService::new(DecodeConfig::default());
        for (i, path) in images.iter().enumerate() {
            decode.request(RequestId(i as u64), DecodeSource::Path(path.clone()));
        }
        while decode.pending() > 0 {
            for event in decode.poll() {
                match event {
                    DecodeEvent::Ready { id, bitmap, .. } => {
                        scene.add_image(&mut renderer, id.0 as usize, &bitmap)?;
                    }
                    DecodeEvent::Failed { id, kind, message } => {
                        log::warn!("decode {id:?} failed ({kind:?}): {message}");
                    }
                }
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
    }

    scene.animate(0.0);
    let stats = renderer.render(&mut scene.tree)?;
    log::info!("rendered {} quads in {} operations", stats.quads, stats.operations);
    renderer.backend().save_png(out)?;
    log::info!("wrote {}", out.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── cli ───────────────────────────────────────────────────────────────

    #[test]
    fn window_mode_takes_positional_images() {
        let cli = Cli::try_parse_from(["lumen-studio", "a.png", "b.jpg"]).unwrap();
        assert!(cli.software.is_none());
        assert_eq!(cli.images, vec![PathBuf::from("a.png"), PathBuf::from("b.jpg")]);
    }

    #[test]
    fn software_flag_takes_output_path() {
        let cli = Cli::try_parse_from(["lumen-studio", "--software", "out.png", "a.png"]).unwrap();
        assert_eq!(cli.software, Some(PathBuf::from("out.png")));
        assert_eq!(cli.images, vec![PathBuf::from("a.png")]);
    }

    #[test]
    fn software_flag_needs_a_path() {
        assert!(Cli::try_parse_from(["lumen-studio", "--software"]).is_err());
        assert!(Cli::try_parse_from(["lumen-studio", "--bogus"]).is_err());
    }
}
