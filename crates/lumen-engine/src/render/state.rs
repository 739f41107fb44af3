//! Per-frame render state.
//!
//! Collects quads in paint order and groups consecutive quads that share
//! program, target and scissor into [`QuadOperation`]s. Executors consume the
//! finished quad list and operation list; nothing here touches a device.

use crate::coords::{Canvas, Rect, Vec2};
use crate::scene::ElementId;

use super::RenderError;
use super::operation::{ProgramOwner, QuadOperation};
use super::program::{DrawProgram, Program};
use super::quad_list::{QuadList, QuadParams};
use super::target::{TargetId, TargetInfo};
use super::texture::TextureSource;

/// Program in effect plus the element feeding its uniforms.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgramBinding {
    pub program: Program,
    pub owner: Option<ProgramOwner>,
}

impl ProgramBinding {
    pub fn new(program: Program, owner: Option<ProgramOwner>) -> Self {
        if program.use_default() {
            return Self::default();
        }
        Self { program, owner }
    }

    /// Batching identity: the default program batches with itself regardless
    /// of owner, parameterized programs only with quads of the same owner.
    fn batches_with(&self, op: &QuadOperation) -> bool {
        match (&self.program, &op.program) {
            (Program::Default, Program::Default) => true,
            (Program::Default, _) | (_, Program::Default) => false,
            (a, b) => {
                a.kind() == b.kind()
                    && self.owner.map(|o| o.element) == op.owner.map(|o| o.element)
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Saved {
    binding: ProgramBinding,
    target: Option<TargetId>,
    scissor: Option<Rect>,
}

pub struct RenderState {
    quads: QuadList,
    operations: Vec<QuadOperation>,
    targets: Vec<TargetInfo>,
    canvas: Canvas,

    binding: ProgramBinding,
    target: Option<TargetId>,
    scissor: Option<Rect>,
    stack: Vec<Saved>,

    /// Last operation is still accepting quads.
    open: bool,
}

impl RenderState {
    pub fn new(max_quads: usize) -> Self {
        Self {
            quads: QuadList::with_capacity(max_quads),
            operations: Vec::new(),
            targets: Vec::new(),
            canvas: Canvas::default(),
            binding: ProgramBinding::default(),
            target: None,
            scissor: None,
            stack: Vec::new(),
            open: false,
        }
    }

    /// Resets the quad cursor, operations and target arena.
    pub fn begin_frame(&mut self, canvas: Canvas) {
        self.quads.clear();
        self.operations.clear();
        self.targets.clear();
        self.canvas = canvas;
        self.binding = ProgramBinding::default();
        self.target = None;
        self.scissor = None;
        self.stack.clear();
        self.open = false;
    }

    /// Appends one quad, extending the open operation or starting a new one.
    pub fn add_quad(&mut self, texture: TextureSource, params: &QuadParams) -> Result<(), RenderError> {
        let index = self.quads.add(texture, params, self.target)?;

        if self.open {
            if let Some(op) = self.operations.last_mut() {
                if op.target == self.target
                    && op.scissor == self.scissor
                    && self.binding.batches_with(op)
                    && op.end() == index
                {
                    op.count += 1;
                    return Ok(());
                }
            }
        }

        self.operations.push(QuadOperation {
            start: index,
            count: 1,
            program: self.binding.program.clone(),
            owner: self.binding.owner,
            target: self.target,
            scissor: self.scissor,
            render_size: self.render_size(),
        });
        self.open = true;
        Ok(())
    }

    /// Closes the trailing operation.
    pub fn finish_frame(&mut self) {
        self.open = false;
        if !self.stack.is_empty() {
            log::warn!("finish_frame with {} unbalanced push_target", self.stack.len());
            self.stack.clear();
        }
    }

    /// Replaces the active program; returns the previous binding for restoring.
    pub fn set_program(&mut self, binding: ProgramBinding) -> ProgramBinding {
        std::mem::replace(&mut self.binding, binding)
    }

    /// Replaces the active clip rect (logical, target-relative); returns the previous one.
    pub fn set_scissor(&mut self, scissor: Option<Rect>) -> Option<Rect> {
        std::mem::replace(&mut self.scissor, scissor)
    }

    #[inline]
    pub fn scissor(&self) -> Option<Rect> {
        self.scissor
    }

    #[inline]
    pub fn program(&self) -> &ProgramBinding {
        &self.binding
    }

    /// Id the next registered target will get.
    #[inline]
    pub fn next_target_id(&self) -> TargetId {
        TargetId(self.targets.len() as u32)
    }

    /// Starts recording into a new offscreen target owned by `owner`.
    ///
    /// Program and scissor reset to defaults until [`pop_target`](Self::pop_target).
    pub fn push_target(&mut self, owner: ElementId, size: Vec2, dirty: bool) -> TargetId {
        let id = self.register_target(owner, size, dirty, true);
        self.stack.push(Saved {
            binding: std::mem::take(&mut self.binding),
            target: self.target,
            scissor: self.scissor.take(),
        });
        self.target = Some(id);
        id
    }

    pub fn pop_target(&mut self) {
        match self.stack.pop() {
            Some(saved) => {
                self.binding = saved.binding;
                self.target = saved.target;
                self.scissor = saved.scissor;
            }
            None => log::warn!("pop_target without matching push_target"),
        }
    }

    /// Registers a target whose cached contents are sampled without
    /// re-recording its subtree.
    pub fn reuse_target(&mut self, owner: ElementId, size: Vec2) -> TargetId {
        self.register_target(owner, size, false, false)
    }

    fn register_target(&mut self, owner: ElementId, size: Vec2, dirty: bool, recorded: bool) -> TargetId {
        let id = self.next_target_id();
        self.targets.push(TargetInfo {
            id,
            owner,
            width: size.x,
            height: size.y,
            dirty,
            recorded,
        });
        id
    }

    fn render_size(&self) -> Vec2 {
        match self.target.and_then(|id| self.target_info(id)) {
            Some(t) => Vec2::new(t.width, t.height),
            None => Vec2::new(self.canvas.width, self.canvas.height),
        }
    }

    #[inline]
    pub fn current_target(&self) -> Option<TargetId> {
        self.target
    }

    pub fn target_info(&self, id: TargetId) -> Option<&TargetInfo> {
        self.targets.get(id.0 as usize)
    }

    #[inline]
    pub fn targets(&self) -> &[TargetInfo] {
        &self.targets
    }

    #[inline]
    pub fn quads(&self) -> &QuadList {
        &self.quads
    }

    #[inline]
    pub fn operations(&self) -> &[QuadOperation] {
        &self.operations
    }

    #[inline]
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.quads.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.quads.capacity()
    }

    /// Enlarges the quad list; takes effect from the next `begin_frame`.
    pub fn grow(&mut self, max_quads: usize) {
        self.quads.grow(max_quads);
        self.operations.clear();
        self.targets.clear();
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Affine;
    use crate::paint::Color;
    use crate::render::program::{ProgramKind, RadialProgram};
    use crate::render::texture::TextureId;

    fn quad() -> QuadParams {
        QuadParams::solid(Affine::IDENTITY, Vec2::new(10.0, 10.0), Color::WHITE)
    }

    fn state() -> RenderState {
        let mut s = RenderState::new(64);
        s.begin_frame(Canvas::new(800.0, 600.0, 1.0));
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

    fn radial(raw: u32) -> ProgramBinding {
        ProgramBinding::new(Program::Radial(RadialProgram::new(20.0, 4.0)), Some(owner(raw)))
    }

    // ── batching ──────────────────────────────────────────────────────────

    #[test]
    fn uniform_quads_form_one_operation() {
        let mut s = state();
        for _ in 0..10 {
            s.add_quad(TextureSource::White, &quad()).unwrap();
        }
        s.finish_frame();
        assert_eq!(s.operations().len(), 1);
        assert_eq!((s.operations()[0].start, s.operations()[0].count), (0, 10));
    }

    #[test]
    fn texture_changes_do_not_split_operations() {
        let mut s = state();
        s.add_quad(TextureSource::White, &quad()).unwrap();
        s.add_quad(TextureSource::Image(TextureId(4)), &quad()).unwrap();
        s.finish_frame();
        assert_eq!(s.operations().len(), 1);
    }

    #[test]
    fn n_boundaries_give_n_plus_one_operations() {
        let mut s = state();
        let clips = [None, Some(Rect::new(0.0, 0.0, 50.0, 50.0)), None, Some(Rect::new(5.0, 5.0, 5.0, 5.0))];
        for clip in clips {
            s.set_scissor(clip);
            for _ in 0..3 {
                s.add_quad(TextureSource::White, &quad()).unwrap();
            }
        }
        s.finish_frame();
        assert_eq!(s.operations().len(), clips.len());
        assert!(s.operations().iter().all(|op| op.count == 3));
    }

    #[test]
    fn state_change_without_quads_emits_nothing() {
        let mut s = state();
        s.add_quad(TextureSource::White, &quad()).unwrap();
        let prev = s.set_scissor(Some(Rect::new(0.0, 0.0, 1.0, 1.0)));
        s.set_scissor(prev);
        s.add_quad(TextureSource::White, &quad()).unwrap();
        s.finish_frame();
        assert_eq!(s.operations().len(), 1);
    }

    // ── program identity ──────────────────────────────────────────────────

    #[test]
    fn default_program_ignores_owner() {
        let mut s = state();
        s.set_program(ProgramBinding::new(Program::Default, Some(owner(1))));
        s.add_quad(TextureSource::White, &quad()).unwrap();
        s.set_program(ProgramBinding::new(Program::Default, Some(owner(2))));
        s.add_quad(TextureSource::White, &quad()).unwrap();
        s.finish_frame();
        assert_eq!(s.operations().len(), 1);
    }

    #[test]
    fn parameterized_program_splits_per_owner() {
        let mut s = state();
        s.set_program(radial(1));
        s.add_quad(TextureSource::White, &quad()).unwrap();
        s.add_quad(TextureSource::White, &quad()).unwrap();
        s.set_program(radial(2));
        s.add_quad(TextureSource::White, &quad()).unwrap();
        s.finish_frame();
        let ops = s.operations();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].program.kind(), ProgramKind::Radial);
        assert_eq!(ops[1].owner.map(|o| o.element), Some(ElementId::from_raw(2)));
    }

    #[test]
    fn neutral_program_binds_as_default() {
        let b = ProgramBinding::new(Program::Radial(RadialProgram::default()), Some(owner(1)));
        assert!(b.program.is_default());
        assert!(b.owner.is_none());
    }

    // ── targets ───────────────────────────────────────────────────────────

    #[test]
    fn push_target_resets_and_pop_restores() {
        let mut s = state();
        let clip = Some(Rect::new(0.0, 0.0, 100.0, 100.0));
        s.set_scissor(clip);
        s.set_program(radial(1));

        let id = s.push_target(ElementId::from_raw(9), Vec2::new(64.0, 32.0), true);
        assert_eq!(s.current_target(), Some(id));
        assert_eq!(s.scissor(), None);
        assert!(s.program().program.is_default());
        s.add_quad(TextureSource::White, &quad()).unwrap();
        s.pop_target();

        assert_eq!(s.current_target(), None);
        assert_eq!(s.scissor(), clip);
        assert_eq!(s.program().program.kind(), ProgramKind::Radial);

        s.add_quad(TextureSource::Target(id), &quad()).unwrap();
        s.finish_frame();
        let ops = s.operations();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].target, Some(id));
        assert_eq!(ops[0].render_size, Vec2::new(64.0, 32.0));
        assert_eq!(ops[1].render_size, Vec2::new(800.0, 600.0));
        assert_eq!(s.quads().meta(0).unwrap().target, Some(id));
    }

    #[test]
    fn reused_target_is_not_recorded() {
        let mut s = state();
        let id = s.reuse_target(ElementId::from_raw(3), Vec2::new(8.0, 8.0));
        let info = s.target_info(id).unwrap();
        assert!(!info.recorded && !info.dirty);
        assert_eq!(s.current_target(), None);
    }

    // ── capacity ──────────────────────────────────────────────────────────

    #[test]
    fn exhaustion_surfaces_error() {
        let mut s = RenderState::new(2);
        s.begin_frame(Canvas::default());
        s.add_quad(TextureSource::White, &quad()).unwrap();
        s.add_quad(TextureSource::White, &quad()).unwrap();
        assert_eq!(
            s.add_quad(TextureSource::White, &quad()),
            Err(RenderError::BufferExhausted { capacity: 2 })
        );
    }

    #[test]
    fn begin_frame_resets_everything() {
        let mut s = state();
        s.push_target(ElementId::from_raw(1), Vec2::new(4.0, 4.0), true);
        s.add_quad(TextureSource::White, &quad()).unwrap();
        s.begin_frame(Canvas::default());
        assert!(s.is_empty());
        assert!(s.operations().is_empty());
        assert!(s.targets().is_empty());
        assert_eq!(s.current_target(), None);
    }
}
