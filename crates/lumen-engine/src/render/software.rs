//! Immediate-mode executor on a `tiny-skia` pixmap.
//!
//! Quads are filled one at a time in operation order. There is no upload,
//! no program switching and no cross-frame target cache: offscreen targets
//! are fresh pixmaps every frame. Scissor masks use the same edge rounding as
//! the GPU path, so clip edges land on the same device pixels.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use tiny_skia::{
    FillRule, FilterQuality, GradientStop, IntSize, LinearGradient, Mask, Paint, PathBuilder,
    Pattern, Pixmap, Point, Shader, SpreadMode, Transform,
};

use crate::coords::{Canvas, Rect};
use crate::paint::Color;

use super::RenderError;
use super::backend::{FrameStats, RenderBackend};
use super::program::DrawProgram;
use super::quad_list::QuadMeta;
use super::scissor::scissor_for;
use super::state::RenderState;
use super::target::{TargetId, TargetInfo};
use super::texture::{Bitmap, TextureId, TextureSource};

const MAX_QUADS: usize = 1 << 20;

pub struct SoftwareExecutor {
    canvas: Canvas,
    clear_color: Option<Color>,
    main: Option<Pixmap>,
    textures: HashMap<TextureId, Pixmap>,
    /// Offscreen pixmaps of the current frame.
    targets: HashMap<TargetId, Pixmap>,
    destroyed: bool,
    warned_program: bool,
    warned_unknown_texture: bool,
}

impl Default for SoftwareExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareExecutor {
    pub fn new() -> Self {
        Self {
            canvas: Canvas::default(),
            clear_color: None,
            main: None,
            textures: HashMap::new(),
            targets: HashMap::new(),
            destroyed: false,
            warned_program: false,
            warned_unknown_texture: false,
        }
    }

    /// Main target as of the last frame.
    pub fn pixmap(&self) -> Option<&Pixmap> {
        self.main.as_ref()
    }

    /// Premultiplied `[r, g, b, a]` of a main target pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let px = self.main.as_ref()?.pixel(x, y)?;
        Some([px.red(), px.green(), px.blue(), px.alpha()])
    }

    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let pixmap = self.main.as_ref().context("nothing rendered yet")?;
        pixmap.encode_png().context("failed to encode frame as PNG")
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.encode_png()?;
        std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
    }

    fn ensure_main(&mut self) -> Result<(), RenderError> {
        let (w, h) = self.canvas.physical_size();
        if self.main.as_ref().is_some_and(|p| p.width() == w && p.height() == h) {
            return Ok(());
        }
        let pixmap = Pixmap::new(w, h).ok_or(RenderError::TargetAllocation { width: w, height: h })?;
        self.main = Some(pixmap);
        Ok(())
    }

    fn allocate_targets(&mut self, state: &RenderState) -> HashSet<TargetId> {
        self.targets.clear();
        let mut failed = HashSet::new();
        for target in state.targets() {
            let (w, h) = target.physical_size(self.canvas);
            match Pixmap::new(w, h) {
                Some(pixmap) => {
                    self.targets.insert(target.id, pixmap);
                }
                None => {
                    log::warn!("{}; skipping target {:?}", RenderError::TargetAllocation { width: w, height: h }, target.id);
                    failed.insert(target.id);
                }
            }
        }
        failed
    }

    fn put_back(&mut self, target: Option<TargetId>, pixmap: Pixmap) {
        match target {
            None => self.main = Some(pixmap),
            Some(id) => {
                self.targets.insert(id, pixmap);
            }
        }
    }

    fn source(&mut self, texture: TextureSource) -> Option<Option<&Pixmap>> {
        match texture {
            TextureSource::White => Some(None),
            TextureSource::Image(id) => match self.textures.get(&id) {
                Some(pixmap) => Some(Some(pixmap)),
                None => {
                    if !self.warned_unknown_texture {
                        log::warn!("{}; draw skipped", RenderError::UnknownTexture(id));
                        self.warned_unknown_texture = true;
                    }
                    None
                }
            },
            TextureSource::Target(id) => self.targets.get(&id).map(Some),
        }
    }
}

fn to_skia(color: Color) -> tiny_skia::Color {
    if color.a <= 0.0 {
        return tiny_skia::Color::TRANSPARENT;
    }
    let a = color.a.min(1.0);
    let un = |c: f32| (c / a).clamp(0.0, 1.0);
    tiny_skia::Color::from_rgba(un(color.r), un(color.g), un(color.b), a)
        .unwrap_or(tiny_skia::Color::TRANSPARENT)
}

fn average(colors: &[Color; 4]) -> Color {
    let sum = colors.iter().fold([0.0f32; 4], |acc, c| [acc[0] + c.r, acc[1] + c.g, acc[2] + c.b, acc[3] + c.a]);
    Color::from_premul(sum[0] / 4.0, sum[1] / 4.0, sum[2] / 4.0, sum[3] / 4.0)
}

/// Corner colors as a shader in the quad's local space. Two-tone vertical or
/// horizontal gradients are exact; anything else falls back to the average.
fn color_shader(meta: &QuadMeta) -> Shader<'static> {
    let [tl, tr, br, bl] = meta.colors;
    if tl == tr && tr == br && br == bl {
        return Shader::SolidColor(to_skia(tl));
    }
    let gradient = |end: Point, from: Color, to: Color| {
        LinearGradient::new(
            Point::from_xy(0.0, 0.0),
            end,
            vec![GradientStop::new(0.0, to_skia(from)), GradientStop::new(1.0, to_skia(to))],
            SpreadMode::Pad,
            Transform::identity(),
        )
    };
    let shader = if tl == tr && bl == br {
        gradient(Point::from_xy(0.0, meta.size.y), tl, bl)
    } else if tl == bl && tr == br {
        gradient(Point::from_xy(meta.size.x, 0.0), tl, tr)
    } else {
        None
    };
    shader.unwrap_or_else(|| Shader::SolidColor(to_skia(average(&meta.colors))))
}

fn draw_quad(dest: &mut Pixmap, meta: &QuadMeta, source: Option<&Pixmap>, pixel_ratio: f32, mask: Option<&Mask>) {
    let Some(rect) = tiny_skia::Rect::from_xywh(0.0, 0.0, meta.size.x, meta.size.y) else {
        return;
    };
    let c = meta.context;
    let transform = Transform::from_row(c.ta, c.tc, c.tb, c.td, c.px, c.py).post_scale(pixel_ratio, pixel_ratio);

    let mut paint = Paint {
        anti_alias: !c.is_axis_aligned(),
        ..Paint::default()
    };
    match source {
        None => paint.shader = color_shader(meta),
        Some(texture) => {
            let uv = meta.uv;
            let (tw, th) = (texture.width() as f32, texture.height() as f32);
            let sx = meta.size.x / ((uv.u1 - uv.u0) * tw);
            let sy = meta.size.y / ((uv.v1 - uv.v0) * th);
            if !sx.is_finite() || !sy.is_finite() {
                return;
            }
            // Texel space → quad-local space.
            let texel_to_local = Transform::from_row(sx, 0.0, 0.0, sy, -uv.u0 * tw * sx, -uv.v0 * th * sy);
            // Patterns carry opacity only; corner tints are not applied.
            let opacity = average(&meta.colors).a;
            paint.shader = Pattern::new(
                texture.as_ref(),
                SpreadMode::Pad,
                FilterQuality::Bilinear,
                opacity,
                texel_to_local,
            );
        }
    }
    dest.fill_rect(rect, &paint, transform, mask);
}

/// Clip mask for `area` on a `size` surface, or `None` when nothing is visible.
fn scissor_mask(area: Rect, pixel_ratio: f32, size: (u32, u32)) -> Option<Mask> {
    let (x, y, w, h) = scissor_for(area, pixel_ratio).clamp_to(size);
    if w == 0 || h == 0 {
        return None;
    }
    let mut mask = Mask::new(size.0, size.1)?;
    let rect = tiny_skia::Rect::from_xywh(x as f32, y as f32, w as f32, h as f32)?;
    mask.fill_path(&PathBuilder::from_rect(rect), FillRule::Winding, false, Transform::identity());
    Some(mask)
}

impl RenderBackend for SoftwareExecutor {
    fn max_quads(&self) -> usize {
        MAX_QUADS
    }

    fn is_render_texture_reusable(&self, _target: &TargetInfo) -> bool {
        false
    }

    fn upload_texture(&mut self, id: TextureId, bitmap: &Bitmap) -> Result<(), RenderError> {
        let size = IntSize::from_wh(bitmap.width, bitmap.height);
        let pixmap = size
            .and_then(|size| Pixmap::from_vec(bitmap.pixels.clone(), size))
            .ok_or(RenderError::TargetAllocation { width: bitmap.width, height: bitmap.height })?;
        self.textures.insert(id, pixmap);
        Ok(())
    }

    fn release_texture(&mut self, id: TextureId) {
        self.textures.remove(&id);
    }

    fn execute(&mut self, state: &RenderState) -> Result<FrameStats, RenderError> {
        if self.destroyed {
            return Err(RenderError::DeviceLost);
        }
        self.ensure_main()?;
        if let (Some(main), Some(color)) = (self.main.as_mut(), self.clear_color) {
            main.fill(to_skia(color));
        }
        let failed = self.allocate_targets(state);
        let ratio = self.canvas.pixel_ratio;

        let mut stats = FrameStats {
            quads: state.len(),
            operations: state.operations().len(),
            ..FrameStats::default()
        };

        for op in state.operations() {
            if op.count == 0 {
                continue;
            }
            if op.target.is_some_and(|t| failed.contains(&t)) {
                stats.skipped += 1;
                continue;
            }
            if !op.program.is_default() && !self.warned_program {
                log::warn!("{:?} program has no software rendition; using the default program", op.program.kind());
                self.warned_program = true;
            }

            // Take the destination out so sources can be borrowed alongside it.
            let dest = match op.target {
                None => self.main.take(),
                Some(id) => self.targets.remove(&id),
            };
            let Some(mut dest) = dest else {
                stats.skipped += 1;
                continue;
            };

            let mask = match op.scissor {
                Some(area) => match scissor_mask(area, ratio, (dest.width(), dest.height())) {
                    Some(mask) => Some(mask),
                    None => {
                        self.put_back(op.target, dest);
                        continue;
                    }
                },
                None => None,
            };

            for meta in &state.quads().metas()[op.start..op.end()] {
                let source = match meta.texture {
                    TextureSource::Target(id) if failed.contains(&id) => None,
                    texture => self.source(texture),
                };
                match source {
                    Some(source) => {
                        draw_quad(&mut dest, meta, source, ratio, mask.as_ref());
                        stats.draw_calls += 1;
                    }
                    None => stats.skipped += 1,
                }
            }
            self.put_back(op.target, dest);
        }

        log::trace!("software frame: {stats:?}");
        Ok(stats)
    }

    fn on_resize_canvas(&mut self, canvas: Canvas) {
        self.canvas = canvas;
    }

    fn set_clear_color(&mut self, color: Option<Color>) {
        self.clear_color = color;
    }

    fn destroy(&mut self) {
        self.destroyed = true;
        self.main = None;
        self.textures.clear();
        self.targets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Vec2;
    use crate::render::{Program, RadialProgram, Renderer, RendererConfig};
    use crate::scene::{Element, ElementId, SceneTree};

    const BLUE: [u8; 4] = [0, 0, 255, 255];
    const RED: [u8; 4] = [255, 0, 0, 255];
    const GREEN: [u8; 4] = [0, 255, 0, 255];

    fn red() -> Color {
        Color::from_straight(1.0, 0.0, 0.0, 1.0)
    }

    fn green() -> Color {
        Color::from_straight(0.0, 1.0, 0.0, 1.0)
    }

    fn renderer(pixel_ratio: f32) -> Renderer<SoftwareExecutor> {
        let config = RendererConfig {
            max_quads: 64,
            clear_color: Some(Color::from_straight(0.0, 0.0, 1.0, 1.0)),
            pixel_ratio,
        };
        Renderer::new(config, 64.0, 64.0, SoftwareExecutor::new())
    }

    fn close(a: [u8; 4], b: [u8; 4]) -> bool {
        a.iter().zip(b).all(|(x, y)| (*x as i16 - y as i16).abs() <= 2)
    }

    fn px(r: &Renderer<SoftwareExecutor>, x: u32, y: u32) -> [u8; 4] {
        r.backend().pixel(x, y).unwrap()
    }

    // ── solid quads ───────────────────────────────────────────────────────

    #[test]
    fn solid_rect_lands_on_its_pixels() {
        let mut r = renderer(1.0);
        let mut tree = SceneTree::new();
        tree.insert(tree.root(), Element::rect(10.0, 10.0, 20.0, 20.0, red())).unwrap();
        r.render(&mut tree).unwrap();

        assert_eq!(px(&r, 10, 10), RED);
        assert_eq!(px(&r, 29, 29), RED);
        assert_eq!(px(&r, 30, 30), BLUE);
        assert_eq!(px(&r, 9, 15), BLUE);
    }

    #[test]
    fn pixel_ratio_scales_output() {
        let mut r = renderer(2.0);
        let mut tree = SceneTree::new();
        tree.insert(tree.root(), Element::rect(10.0, 10.0, 5.0, 5.0, red())).unwrap();
        r.render(&mut tree).unwrap();

        assert_eq!(r.backend().pixmap().map(|p| p.width()), Some(128));
        assert_eq!(px(&r, 20, 20), RED);
        assert_eq!(px(&r, 29, 29), RED);
        assert_eq!(px(&r, 30, 30), BLUE);
    }

    #[test]
    fn alpha_blends_premultiplied() {
        let mut r = renderer(1.0);
        let mut tree = SceneTree::new();
        tree.insert(tree.root(), Element::rect(0.0, 0.0, 8.0, 8.0, red()).with_alpha(0.5)).unwrap();
        r.render(&mut tree).unwrap();
        assert!(close(px(&r, 4, 4), [128, 0, 127, 255]));
    }

    #[test]
    fn vertical_gradient_runs_top_to_bottom() {
        let mut r = renderer(1.0);
        let mut tree = SceneTree::new();
        tree.insert(
            tree.root(),
            Element::rect(0.0, 0.0, 10.0, 40.0, Color::WHITE).with_vertical_gradient(red(), green()),
        )
        .unwrap();
        r.render(&mut tree).unwrap();

        let top = px(&r, 5, 0);
        let bottom = px(&r, 5, 39);
        assert!(top[0] > 240 && top[1] < 15);
        assert!(bottom[1] > 240 && bottom[0] < 15);
    }

    // ── clipping ──────────────────────────────────────────────────────────

    #[test]
    fn clipping_masks_children() {
        let mut r = renderer(1.0);
        let mut tree = SceneTree::new();
        let clip = tree
            .insert(
                tree.root(),
                Element::new()
                    .with_position(Vec2::new(4.0, 4.0))
                    .with_size(Vec2::new(10.0, 10.0))
                    .with_clipping(true),
            )
            .unwrap();
        tree.insert(clip, Element::rect(0.0, 0.0, 40.0, 40.0, red())).unwrap();
        r.render(&mut tree).unwrap();

        assert_eq!(px(&r, 4, 4), RED);
        assert_eq!(px(&r, 13, 13), RED);
        assert_eq!(px(&r, 14, 14), BLUE);
        assert_eq!(px(&r, 30, 30), BLUE);
    }

    #[test]
    fn fully_clipped_operation_draws_nothing() {
        let mut r = renderer(1.0);
        let mut tree = SceneTree::new();
        let clip = tree
            .insert(tree.root(), Element::new().with_size(Vec2::new(0.0, 0.0)).with_clipping(true))
            .unwrap();
        tree.insert(clip, Element::rect(0.0, 0.0, 40.0, 40.0, red())).unwrap();
        r.render(&mut tree).unwrap();
        assert_eq!(px(&r, 1, 1), BLUE);
    }

    // ── textures and targets ──────────────────────────────────────────────

    #[test]
    fn texture_is_stretched_over_the_quad() {
        let mut r = renderer(1.0);
        let bmp = Bitmap::from_premul(2, 1, [RED, BLUE].concat(), false).unwrap();
        let tex = r.register_texture(&bmp).unwrap();
        let mut tree = SceneTree::new();
        tree.insert(tree.root(), Element::image(0.0, 20.0, 20.0, 10.0, tex)).unwrap();
        r.render(&mut tree).unwrap();

        assert!(close(px(&r, 2, 25), RED));
        assert!(close(px(&r, 17, 25), BLUE));
    }

    #[test]
    fn offscreen_subtree_is_composited_at_owner_position() {
        let mut r = renderer(1.0);
        let mut tree = SceneTree::new();
        let card = tree
            .insert(tree.root(), Element::rect(20.0, 20.0, 16.0, 16.0, green()).with_render_to_texture(true))
            .unwrap();
        tree.insert(card, Element::rect(4.0, 4.0, 4.0, 4.0, red())).unwrap();
        let stats = r.render(&mut tree).unwrap();

        assert_eq!(stats.skipped, 0);
        assert!(close(px(&r, 21, 21), GREEN));
        assert!(close(px(&r, 26, 26), RED));
        assert_eq!(px(&r, 40, 40), BLUE);
    }

    #[test]
    fn targets_are_never_reusable() {
        let ex = SoftwareExecutor::new();
        let info = TargetInfo {
            id: TargetId(0),
            owner: ElementId::from_raw(1),
            width: 8.0,
            height: 8.0,
            dirty: false,
            recorded: true,
        };
        assert!(!ex.is_render_texture_reusable(&info));
    }

    #[test]
    fn parameterized_program_falls_back_to_default() {
        let mut r = renderer(1.0);
        let mut tree = SceneTree::new();
        tree.insert(
            tree.root(),
            Element::rect(0.0, 0.0, 8.0, 8.0, red()).with_program(Program::Radial(RadialProgram::new(2.0, 1.0))),
        )
        .unwrap();
        r.render(&mut tree).unwrap();
        assert_eq!(px(&r, 7, 7), RED);
    }

    // ── output ────────────────────────────────────────────────────────────

    #[test]
    fn encodes_png() {
        let mut r = renderer(1.0);
        let mut tree = SceneTree::new();
        r.render(&mut tree).unwrap();
        let png = r.backend().encode_png().unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn destroyed_executor_refuses_frames() {
        let mut r = renderer(1.0);
        r.destroy();
        let mut tree = SceneTree::new();
        assert_eq!(r.render(&mut tree), Err(RenderError::DeviceLost));
    }
}
