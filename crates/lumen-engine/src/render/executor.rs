//! Draw-call executor for GPU devices.
//!
//! Per frame: start the device frame, bind and clear the main target, upload
//! the whole quad buffer once, then walk the operations in order. Program,
//! target, scissor and texture bindings are tracked here so redundant
//! device calls are skipped.

use std::collections::{HashMap, HashSet};

use crate::coords::Canvas;
use crate::paint::Color;
use crate::scene::ElementId;

use super::RenderError;
use super::backend::{FrameStats, RenderBackend};
use super::device::{FrameSetup, RenderDevice};
use super::index::{IndexPlan, U16_MAX_QUADS};
use super::operation::QuadOperation;
use super::program::{DrawProgram, Program, ProgramKind};
use super::scissor::{ScissorRect, flip_y, scissor_for};
use super::state::RenderState;
use super::target::{TargetId, TargetInfo};
use super::texture::{Bitmap, TextureId, TextureSource};

/// Quad cap for devices with 32-bit indices.
const U32_MAX_QUADS: usize = 1 << 20;

pub struct GpuExecutor<D: RenderDevice> {
    device: D,
    clear_color: Option<Color>,

    canvas: Canvas,
    projection: [f32; 2],
    /// Main framebuffer height in device pixels.
    canvas_height: i32,

    plan: Option<IndexPlan>,
    ready_generation: Option<u64>,
    destroyed: bool,

    /// CPU copies, re-uploaded when the device is replaced.
    textures: HashMap<TextureId, Bitmap>,

    // Bound state; valid within one frame.
    bound_program: Option<ProgramKind>,
    bound_target: Option<Option<TargetId>>,
    bound_scissor: Option<Option<ScissorRect>>,
    bound_texture: Option<TextureSource>,
    cleared: HashSet<Option<TargetId>>,
    failed_targets: HashSet<TargetId>,

    /// Device size of each owner's target as last rendered.
    cached_targets: HashMap<ElementId, (u32, u32)>,

    warned_unknown_texture: bool,
}

impl<D: RenderDevice> GpuExecutor<D> {
    pub fn new(device: D) -> Self {
        let canvas = Canvas::default();
        Self {
            device,
            clear_color: None,
            canvas,
            projection: canvas.projection(),
            canvas_height: canvas.physical_size().1 as i32,
            plan: None,
            ready_generation: None,
            destroyed: false,
            textures: HashMap::new(),
            bound_program: None,
            bound_target: None,
            bound_scissor: None,
            bound_texture: None,
            cleared: HashSet::new(),
            failed_targets: HashSet::new(),
            cached_targets: HashMap::new(),
            warned_unknown_texture: false,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn projection(&self) -> [f32; 2] {
        self.projection
    }

    /// Runs device init when first used, after a device replacement, or when
    /// the quad capacity changed.
    fn ensure_ready(&mut self, max_quads: usize) -> Result<(), RenderError> {
        if self.destroyed {
            return Err(RenderError::DeviceLost);
        }
        if self.device.is_lost() {
            if self.ready_generation.take().is_some() {
                log::error!("render device lost; waiting for a replacement");
                self.forget_device_state();
            }
            return Err(RenderError::DeviceLost);
        }

        let generation = self.device.generation();
        let plan = IndexPlan::select(max_quads, self.device.caps().u32_indices);
        let replaced = self.ready_generation != Some(generation);
        if !replaced && self.plan == Some(plan) {
            return Ok(());
        }

        log::debug!("initializing render device: {plan:?} (generation {generation})");
        self.device.init(plan)?;
        self.plan = Some(plan);

        if replaced {
            self.forget_device_state();
            for (id, bitmap) in &self.textures {
                self.device.upload_texture(*id, bitmap)?;
            }
            self.ready_generation = Some(generation);
        }
        Ok(())
    }

    fn forget_device_state(&mut self) {
        self.cached_targets.clear();
        self.bound_program = None;
        self.bound_target = None;
        self.bound_scissor = None;
        self.bound_texture = None;
    }

    fn reset(&mut self, state: &RenderState) -> Result<(), RenderError> {
        self.device.begin_frame(FrameSetup {
            operations: state.operations().len(),
            surface: self.canvas.physical_size(),
        })?;

        self.stop_program();
        self.bound_target = None;
        self.bound_scissor = None;
        self.bound_texture = None;
        self.cleared.clear();
        self.failed_targets.clear();

        self.bind_target(state, None);
        self.device.upload_quads(state.quads().bytes());
        Ok(())
    }

    /// Allocates this frame's targets. Recorded targets that no operation
    /// draws into are cleared here, since their storage may still hold the
    /// previous frame's pixels.
    fn prepare_targets(&mut self, state: &RenderState) {
        let drawn: HashSet<TargetId> = state
            .operations()
            .iter()
            .filter(|op| op.count > 0 || op.program.draws_empty())
            .filter_map(|op| op.target)
            .collect();

        for target in state.targets() {
            let size = target.physical_size(self.canvas);
            if let Err(err) = self.device.prepare_target(target, size) {
                log::warn!("{err}; skipping operations that use target {:?}", target.id);
                self.failed_targets.insert(target.id);
                continue;
            }
            if target.recorded && !drawn.contains(&target.id) {
                self.bind_target(state, Some(target.id));
            }
        }
    }

    fn run_operation(&mut self, state: &RenderState, op: &QuadOperation, stats: &mut FrameStats) {
        if op.count == 0 && !op.program.draws_empty() {
            return;
        }
        if op.target.is_some_and(|t| self.failed_targets.contains(&t)) {
            stats.skipped += 1;
            return;
        }

        if self.bind_target(state, op.target) {
            stats.target_binds += 1;
        }
        self.apply_scissor(op);
        if self.use_program(&op.program, state, op) {
            stats.program_switches += 1;
        }

        for run in op.texture_runs(state.quads()) {
            if let TextureSource::Target(t) = run.texture {
                if self.failed_targets.contains(&t) {
                    stats.skipped += 1;
                    continue;
                }
            }
            if self.bound_texture != Some(run.texture) {
                if let Err(err) = self.device.bind_texture(run.texture) {
                    if !self.warned_unknown_texture {
                        log::warn!("{err}; draw skipped");
                        self.warned_unknown_texture = true;
                    }
                    self.bound_texture = None;
                    stats.skipped += 1;
                    continue;
                }
                self.bound_texture = Some(run.texture);
            }
            self.device.draw_quads(run.start as u32, run.count as u32);
            stats.draw_calls += 1;
        }
    }

    /// Returns true when the binding changed.
    fn bind_target(&mut self, state: &RenderState, target: Option<TargetId>) -> bool {
        if self.bound_target == Some(target) {
            return false;
        }

        let (viewport, first_clear) = match target.and_then(|id| state.target_info(id)) {
            Some(info) => (info.physical_size(self.canvas), Some(Color::TRANSPARENT)),
            None => (self.canvas.physical_size(), self.clear_color),
        };
        let clear = if self.cleared.insert(target) { first_clear } else { None };

        log::trace!("bind target {target:?} viewport {viewport:?}");
        self.device.bind_target(target, viewport, clear);
        self.bound_target = Some(target);
        self.bound_scissor = None;
        self.bound_texture = None;
        true
    }

    fn apply_scissor(&mut self, op: &QuadOperation) {
        let rect = op.scissor.map(|area| {
            let rect = scissor_for(area, self.canvas.pixel_ratio);
            if op.target.is_none() && self.device.caps().main_target_bottom_left {
                flip_y(rect, self.canvas_height)
            } else {
                rect
            }
        });
        if self.bound_scissor == Some(rect) {
            return;
        }
        self.device.set_scissor(rect);
        self.bound_scissor = Some(rect);
    }

    /// Binds `program` if needed, then always uploads its uniforms for `op`.
    /// Returns true when the device program changed.
    fn use_program(&mut self, program: &Program, state: &RenderState, op: &QuadOperation) -> bool {
        let switched = !program.has_same_program(self.bound_program);
        if switched {
            if let Some(prev) = self.bound_program.take() {
                self.device.stop_program(prev);
            }
            log::debug!("use program {:?}", program.kind());
            program.use_program(&mut self.device);
            self.bound_program = Some(program.kind());
        }

        let projection = self.projection_for(state, op.target);
        let uniforms = program.setup_uniforms(op, projection);
        self.device.set_uniforms(&uniforms);
        switched
    }

    fn stop_program(&mut self) {
        if let Some(kind) = self.bound_program.take() {
            self.device.stop_program(kind);
        }
    }

    fn projection_for(&self, state: &RenderState, target: Option<TargetId>) -> [f32; 2] {
        match target.and_then(|id| state.target_info(id)) {
            None => self.projection,
            Some(info) => {
                let sy = 2.0 / info.height.max(1.0);
                // Bottom-left-origin devices render targets upside down so
                // sampling with top-left UVs comes out upright.
                let y = if self.device.caps().main_target_bottom_left { sy } else { -sy };
                [2.0 / info.width.max(1.0), y]
            }
        }
    }

    fn remember_targets(&mut self, state: &RenderState) {
        let live: HashSet<ElementId> = state.targets().iter().map(|t| t.owner).collect();
        self.cached_targets.retain(|owner, _| live.contains(owner));
        for target in state.targets() {
            if self.failed_targets.contains(&target.id) {
                self.cached_targets.remove(&target.owner);
            } else {
                self.cached_targets.insert(target.owner, target.physical_size(self.canvas));
            }
        }
    }
}

impl<D: RenderDevice> RenderBackend for GpuExecutor<D> {
    fn max_quads(&self) -> usize {
        if self.device.caps().u32_indices { U32_MAX_QUADS } else { U16_MAX_QUADS }
    }

    fn is_render_texture_reusable(&self, target: &TargetInfo) -> bool {
        !target.dirty
            && !self.destroyed
            && !self.device.is_lost()
            && self.ready_generation == Some(self.device.generation())
            && self.cached_targets.get(&target.owner) == Some(&target.physical_size(self.canvas))
    }

    fn upload_texture(&mut self, id: TextureId, bitmap: &Bitmap) -> Result<(), RenderError> {
        if self.ready_generation.is_some() && !self.device.is_lost() {
            self.device.upload_texture(id, bitmap)?;
        }
        self.textures.insert(id, bitmap.clone());
        Ok(())
    }

    fn release_texture(&mut self, id: TextureId) {
        if self.textures.remove(&id).is_some() && self.ready_generation.is_some() {
            self.device.release_texture(id);
        }
    }

    fn execute(&mut self, state: &RenderState) -> Result<FrameStats, RenderError> {
        self.ensure_ready(state.capacity())?;
        self.reset(state)?;
        self.prepare_targets(state);

        let mut stats = FrameStats {
            quads: state.len(),
            operations: state.operations().len(),
            ..FrameStats::default()
        };
        for op in state.operations() {
            self.run_operation(state, op, &mut stats);
        }

        self.device.end_frame()?;
        self.remember_targets(state);
        Ok(stats)
    }

    fn on_resize_canvas(&mut self, canvas: Canvas) {
        self.canvas = canvas;
        self.projection = canvas.projection();
        self.canvas_height = canvas.physical_size().1 as i32;
        // Target device sizes depend on the pixel ratio.
        self.cached_targets.clear();
    }

    fn set_clear_color(&mut self, color: Option<Color>) {
        self.clear_color = color;
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.device.destroy();
        self.destroyed = true;
        self.ready_generation = None;
        self.plan = None;
        self.textures.clear();
        self.forget_device_state();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{Affine, Rect, Vec2};
    use crate::render::device::recording::{Call, RecordingDevice};
    use crate::render::operation::ProgramOwner;
    use crate::render::program::{RadialProgram, TiltProgram, Uniforms};
    use crate::render::quad_list::QuadParams;
    use crate::render::state::ProgramBinding;

    fn quad() -> QuadParams {
        QuadParams::solid(Affine::IDENTITY, Vec2::new(10.0, 10.0), Color::WHITE)
    }

    fn canvas() -> Canvas {
        Canvas::new(800.0, 600.0, 1.0)
    }

    fn executor(device: RecordingDevice) -> GpuExecutor<RecordingDevice> {
        let mut ex = GpuExecutor::new(device);
        ex.set_clear_color(Some(Color::from_premul(0.0, 0.0, 0.5, 1.0)));
        ex.on_resize_canvas(canvas());
        ex
    }

    fn state() -> RenderState {
        let mut s = RenderState::new(64);
        s.begin_frame(canvas());
        s
    }

    fn owner(raw: u32) -> ProgramOwner {
        ProgramOwner {
            element: ElementId::from_raw(raw),
            context: Affine::IDENTITY,
            size: Vec2::new(10.0, 10.0),
            pivot: Vec2::new(0.5, 0.5),
        }
    }

    fn draws(calls: &[Call]) -> Vec<(u32, u32)> {
        calls
            .iter()
            .filter_map(|c| match c {
                Call::Draw { first, count } => Some((*first, *count)),
                _ => None,
            })
            .collect()
    }

    // ── frame protocol ────────────────────────────────────────────────────

    #[test]
    fn frame_starts_with_clear_and_single_upload() {
        let mut s = state();
        for _ in 0..3 {
            s.add_quad(TextureSource::White, &quad()).unwrap();
        }
        s.finish_frame();

        let mut ex = executor(RecordingDevice::new());
        let stats = ex.execute(&s).unwrap();
        let calls = ex.device_mut().take();

        assert_eq!(calls[0], Call::Init(IndexPlan::select(64, true)));
        assert!(matches!(calls[1], Call::BeginFrame(FrameSetup { operations: 1, surface: (800, 600) })));
        assert_eq!(
            calls[2],
            Call::BindTarget {
                target: None,
                viewport: (800, 600),
                clear: Some(Color::from_premul(0.0, 0.0, 0.5, 1.0)),
            }
        );
        assert_eq!(calls[3], Call::UploadQuads(3 * 80));
        assert_eq!(calls.iter().filter(|c| matches!(c, Call::UploadQuads(_))).count(), 1);
        assert_eq!(draws(&calls), vec![(0, 3)]);
        assert_eq!(calls.last(), Some(&Call::EndFrame));
        assert_eq!((stats.operations, stats.draw_calls), (1, 1));
    }

    #[test]
    fn init_runs_once() {
        let mut s = state();
        s.add_quad(TextureSource::White, &quad()).unwrap();
        s.finish_frame();

        let mut ex = executor(RecordingDevice::new());
        ex.execute(&s).unwrap();
        ex.device_mut().take();
        ex.execute(&s).unwrap();
        let calls = ex.device_mut().take();
        assert!(!calls.iter().any(|c| matches!(c, Call::Init(_))));
    }

    #[test]
    fn no_clear_without_clear_color() {
        let mut s = state();
        s.finish_frame();
        let mut ex = GpuExecutor::new(RecordingDevice::new());
        ex.on_resize_canvas(canvas());
        ex.execute(&s).unwrap();
        let calls = ex.device_mut().take();
        assert!(calls.contains(&Call::BindTarget { target: None, viewport: (800, 600), clear: None }));
    }

    // ── programs ──────────────────────────────────────────────────────────

    #[test]
    fn program_switches_only_on_change_but_uniforms_every_operation() {
        let mut s = state();
        s.add_quad(TextureSource::White, &quad()).unwrap();
        s.set_scissor(Some(Rect::new(0.0, 0.0, 100.0, 100.0)));
        s.add_quad(TextureSource::White, &quad()).unwrap();
        s.set_program(ProgramBinding::new(
            Program::Radial(RadialProgram::new(30.0, 5.0)),
            Some(owner(1)),
        ));
        s.add_quad(TextureSource::White, &quad()).unwrap();
        s.finish_frame();

        let mut ex = executor(RecordingDevice::new());
        let stats = ex.execute(&s).unwrap();
        let calls = ex.device_mut().take();

        let uses: Vec<_> = calls
            .iter()
            .filter(|c| matches!(c, Call::UseProgram(_) | Call::StopProgram(_)))
            .cloned()
            .collect();
        assert_eq!(
            uses,
            vec![
                Call::UseProgram(ProgramKind::Default),
                Call::StopProgram(ProgramKind::Default),
                Call::UseProgram(ProgramKind::Radial),
            ]
        );
        let uniforms = calls.iter().filter(|c| matches!(c, Call::SetUniforms(_))).count();
        assert_eq!(uniforms, 3);
        assert_eq!(stats.program_switches, 2);
    }

    #[test]
    fn bound_program_is_stopped_on_next_frame_reset() {
        let mut s = state();
        s.set_program(ProgramBinding::new(Program::Tilt(TiltProgram::default()), Some(owner(1))));
        s.add_quad(TextureSource::White, &quad()).unwrap();
        s.finish_frame();

        let mut ex = executor(RecordingDevice::new());
        ex.execute(&s).unwrap();
        ex.device_mut().take();
        ex.execute(&s).unwrap();
        let calls = ex.device_mut().take();
        assert_eq!(calls[1], Call::StopProgram(ProgramKind::Tilt));
    }

    #[test]
    fn main_target_uses_canvas_projection() {
        let mut s = state();
        s.add_quad(TextureSource::White, &quad()).unwrap();
        s.finish_frame();
        let mut ex = executor(RecordingDevice::new());
        ex.execute(&s).unwrap();
        let calls = ex.device_mut().take();
        let projection = calls.iter().find_map(|c| match c {
            Call::SetUniforms(u) => Some(u.projection()),
            _ => None,
        });
        assert_eq!(projection, Some([2.0 / 800.0, -2.0 / 600.0]));
    }

    // ── scissor ───────────────────────────────────────────────────────────

    #[test]
    fn scissor_is_not_flipped_on_top_left_devices() {
        let mut s = state();
        s.set_scissor(Some(Rect::new(10.0, 10.0, 100.0, 50.0)));
        s.add_quad(TextureSource::White, &quad()).unwrap();
        s.finish_frame();
        let mut ex = executor(RecordingDevice::new());
        ex.execute(&s).unwrap();
        let calls = ex.device_mut().take();
        assert!(calls.contains(&Call::SetScissor(Some(ScissorRect { x: 10, y: 10, width: 100, height: 50 }))));
    }

    #[test]
    fn scissor_flips_on_bottom_left_main_target_only() {
        let mut s = state();
        s.set_scissor(Some(Rect::new(10.0, 10.0, 100.0, 50.0)));
        s.add_quad(TextureSource::White, &quad()).unwrap();
        s.push_target(ElementId::from_raw(5), Vec2::new(200.0, 200.0), true);
        s.set_scissor(Some(Rect::new(10.0, 10.0, 100.0, 50.0)));
        s.add_quad(TextureSource::White, &quad()).unwrap();
        s.pop_target();
        s.finish_frame();

        let mut ex = executor(RecordingDevice::bottom_left());
        ex.execute(&s).unwrap();
        let scissors: Vec<_> = ex
            .device_mut()
            .take()
            .into_iter()
            .filter_map(|c| match c {
                Call::SetScissor(r) => r,
                _ => None,
            })
            .collect();
        assert_eq!(
            scissors,
            vec![
                ScissorRect { x: 10, y: 600 - 60, width: 100, height: 50 },
                ScissorRect { x: 10, y: 10, width: 100, height: 50 },
            ]
        );
    }

    #[test]
    fn unchanged_scissor_is_not_reapplied() {
        let mut s = state();
        s.add_quad(TextureSource::White, &quad()).unwrap();
        s.set_program(ProgramBinding::new(Program::Radial(RadialProgram::new(3.0, 1.0)), Some(owner(1))));
        s.add_quad(TextureSource::White, &quad()).unwrap();
        s.finish_frame();
        let mut ex = executor(RecordingDevice::new());
        ex.execute(&s).unwrap();
        let calls = ex.device_mut().take();
        assert_eq!(calls.iter().filter(|c| matches!(c, Call::SetScissor(_))).count(), 1);
    }

    // ── targets ───────────────────────────────────────────────────────────

    fn offscreen_state() -> (RenderState, TargetId) {
        let mut s = state();
        s.add_quad(TextureSource::White, &quad()).unwrap();
        let id = s.push_target(ElementId::from_raw(7), Vec2::new(64.0, 32.0), true);
        s.add_quad(TextureSource::White, &quad()).unwrap();
        s.add_quad(TextureSource::White, &quad()).unwrap();
        s.pop_target();
        s.add_quad(TextureSource::Target(id), &quad()).unwrap();
        s.finish_frame();
        (s, id)
    }

    #[test]
    fn offscreen_pass_runs_before_sampling_quad() {
        let (s, id) = offscreen_state();
        let mut ex = executor(RecordingDevice::new());
        ex.execute(&s).unwrap();
        let calls = ex.device_mut().take();

        let bind_rt = calls
            .iter()
            .position(|c| matches!(c, Call::BindTarget { target: Some(_), .. }))
            .unwrap();
        let sample = calls.iter().position(|c| *c == Call::BindTexture(TextureSource::Target(id))).unwrap();
        let rt_draw = calls.iter().position(|c| *c == Call::Draw { first: 1, count: 2 }).unwrap();
        assert!(bind_rt < rt_draw && rt_draw < sample);

        assert!(calls.contains(&Call::BindTarget {
            target: Some(id),
            viewport: (64, 32),
            clear: Some(Color::TRANSPARENT),
        }));
        // Returning to main does not clear it again.
        assert!(calls.contains(&Call::BindTarget { target: None, viewport: (800, 600), clear: None }));
        assert_eq!(draws(&calls), vec![(0, 1), (1, 2), (3, 1)]);
    }

    #[test]
    fn empty_recorded_target_is_cleared_before_sampling() {
        let mut s = state();
        let id = s.push_target(ElementId::from_raw(7), Vec2::new(64.0, 32.0), true);
        s.pop_target();
        s.add_quad(TextureSource::Target(id), &quad()).unwrap();
        s.finish_frame();

        let mut ex = executor(RecordingDevice::new());
        ex.execute(&s).unwrap();
        let calls = ex.device_mut().take();

        let clear = calls
            .iter()
            .position(|c| {
                *c == Call::BindTarget {
                    target: Some(id),
                    viewport: (64, 32),
                    clear: Some(Color::TRANSPARENT),
                }
            })
            .expect("empty target cleared");
        let sample = calls.iter().position(|c| *c == Call::BindTexture(TextureSource::Target(id))).unwrap();
        assert!(clear < sample);
        assert_eq!(draws(&calls), vec![(0, 1)]);
    }

    #[test]
    fn reused_target_is_not_cleared() {
        let mut s = state();
        let id = s.reuse_target(ElementId::from_raw(7), Vec2::new(64.0, 32.0));
        s.add_quad(TextureSource::Target(id), &quad()).unwrap();
        s.finish_frame();

        let mut ex = executor(RecordingDevice::new());
        ex.execute(&s).unwrap();
        let calls = ex.device_mut().take();
        assert!(!calls.iter().any(|c| matches!(c, Call::BindTarget { target: Some(_), .. })));
    }

    #[test]
    fn offscreen_projection_is_target_sized() {
        let (s, _) = offscreen_state();
        let mut ex = executor(RecordingDevice::new());
        ex.execute(&s).unwrap();
        let projections: Vec<_> = ex
            .device_mut()
            .take()
            .into_iter()
            .filter_map(|c| match c {
                Call::SetUniforms(Uniforms::Default(u)) => Some(u.projection),
                _ => None,
            })
            .collect();
        assert_eq!(projections[1], [2.0 / 64.0, -2.0 / 32.0]);
    }

    #[test]
    fn failed_target_skips_its_operations_and_samplers() {
        let (s, _) = offscreen_state();
        let mut device = RecordingDevice::new();
        device.failing_owners.insert(ElementId::from_raw(7));
        let mut ex = executor(device);
        let stats = ex.execute(&s).unwrap();
        let calls = ex.device_mut().take();
        assert_eq!(draws(&calls), vec![(0, 1)]);
        assert_eq!(stats.skipped, 2);
    }

    #[test]
    fn target_reusable_after_clean_render() {
        let (s, _) = offscreen_state();
        let mut ex = executor(RecordingDevice::new());
        let candidate = |dirty| TargetInfo {
            id: TargetId(0),
            owner: ElementId::from_raw(7),
            width: 64.0,
            height: 32.0,
            dirty,
            recorded: false,
        };
        assert!(!ex.is_render_texture_reusable(&candidate(false)));
        ex.execute(&s).unwrap();
        assert!(ex.is_render_texture_reusable(&candidate(false)));
        assert!(!ex.is_render_texture_reusable(&candidate(true)));

        let mut resized = candidate(false);
        resized.width = 65.0;
        assert!(!ex.is_render_texture_reusable(&resized));

        ex.on_resize_canvas(Canvas::new(800.0, 600.0, 2.0));
        assert!(!ex.is_render_texture_reusable(&candidate(false)));
    }

    // ── textures ──────────────────────────────────────────────────────────

    #[test]
    fn unknown_texture_is_skipped() {
        let mut s = state();
        s.add_quad(TextureSource::Image(TextureId(42)), &quad()).unwrap();
        s.add_quad(TextureSource::White, &quad()).unwrap();
        s.finish_frame();
        let mut ex = executor(RecordingDevice::new());
        let stats = ex.execute(&s).unwrap();
        assert_eq!(draws(&ex.device_mut().take()), vec![(1, 1)]);
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn textures_bind_once_per_run() {
        let bmp = Bitmap::solid(1, 1, [255, 0, 0, 255]);
        let mut s = state();
        for tex in [TextureSource::Image(TextureId(1)), TextureSource::Image(TextureId(1)), TextureSource::White] {
            s.add_quad(tex, &quad()).unwrap();
        }
        s.finish_frame();
        let mut ex = executor(RecordingDevice::new());
        ex.upload_texture(TextureId(1), &bmp).unwrap();
        ex.execute(&s).unwrap();
        let calls = ex.device_mut().take();
        assert!(calls.contains(&Call::UploadTexture(TextureId(1))));
        assert_eq!(draws(&calls), vec![(0, 2), (2, 1)]);
    }

    // ── device lifecycle ──────────────────────────────────────────────────

    #[test]
    fn lost_device_reports_and_recovers_after_replacement() {
        let bmp = Bitmap::solid(1, 1, [0, 0, 0, 255]);
        let (s, _) = offscreen_state();
        let mut ex = executor(RecordingDevice::new());
        ex.upload_texture(TextureId(3), &bmp).unwrap();
        ex.execute(&s).unwrap();

        let cached = TargetInfo {
            id: TargetId(0),
            owner: ElementId::from_raw(7),
            width: 64.0,
            height: 32.0,
            dirty: false,
            recorded: false,
        };
        assert!(ex.is_render_texture_reusable(&cached));

        ex.device_mut().lost = true;
        assert_eq!(ex.execute(&s), Err(RenderError::DeviceLost));
        assert!(!ex.is_render_texture_reusable(&cached));

        ex.device_mut().lost = false;
        ex.device_mut().generation += 1;
        ex.device_mut().take();
        ex.execute(&s).unwrap();
        let calls = ex.device_mut().take();
        assert!(matches!(calls[0], Call::Init(_)));
        assert_eq!(calls[1], Call::UploadTexture(TextureId(3)));
    }

    #[test]
    fn growing_capacity_reinitializes_buffers() {
        let mut ex = executor(RecordingDevice::new());
        let mut s = state();
        s.finish_frame();
        ex.execute(&s).unwrap();
        s.grow(128);
        s.begin_frame(canvas());
        s.finish_frame();
        ex.device_mut().take();
        ex.execute(&s).unwrap();
        let calls = ex.device_mut().take();
        assert_eq!(calls[0], Call::Init(IndexPlan::select(128, true)));
    }

    #[test]
    fn destroy_is_idempotent() {
        let mut ex = executor(RecordingDevice::new());
        ex.destroy();
        ex.destroy();
        let destroys = ex.device_mut().take().into_iter().filter(|c| *c == Call::Destroy).count();
        assert_eq!(destroys, 1);
        let mut s = state();
        s.finish_frame();
        assert_eq!(ex.execute(&s), Err(RenderError::DeviceLost));
    }

    #[test]
    fn max_quads_follows_index_width() {
        let mut device = RecordingDevice::new();
        device.caps.u32_indices = false;
        assert_eq!(executor(device).max_quads(), 16_384);
    }
}
