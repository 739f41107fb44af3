use crate::coords::{Affine, Rect, Vec2};
use crate::scene::ElementId;

use super::program::Program;
use super::quad_list::QuadList;
use super::target::TargetId;
use super::texture::TextureSource;

/// Element whose properties feed a parameterized program's uniforms.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ProgramOwner {
    pub element: ElementId,
    /// Owner's render context (relative to the current target).
    pub context: Affine,
    /// Layout size.
    pub size: Vec2,
    /// Pivot as a fraction of the layout size.
    pub pivot: Vec2,
}

impl ProgramOwner {
    /// Maps a point in owner-local units into target coordinates.
    #[inline]
    pub fn target_coords(&self, local: Vec2) -> Vec2 {
        self.context.apply(local)
    }
}

/// Run of consecutive quads sharing program, target and scissor.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadOperation {
    pub start: usize,
    pub count: usize,
    pub program: Program,
    /// `None` for the default program.
    pub owner: Option<ProgramOwner>,
    /// `None` is the main framebuffer.
    pub target: Option<TargetId>,
    /// Clip rect in logical target coordinates.
    pub scissor: Option<Rect>,
    /// Logical size of the surface being drawn to.
    pub render_size: Vec2,
}

impl QuadOperation {
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.count
    }

    #[inline]
    pub fn render_width(&self) -> f32 {
        self.render_size.x
    }

    /// Splits the operation into runs of consecutive quads sampling the same texture.
    pub fn texture_runs<'a>(&self, quads: &'a QuadList) -> TextureRuns<'a> {
        TextureRuns {
            quads,
            next: self.start,
            end: self.end().min(quads.len()),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TextureRun {
    pub texture: TextureSource,
    pub start: usize,
    pub count: usize,
}

pub struct TextureRuns<'a> {
    quads: &'a QuadList,
    next: usize,
    end: usize,
}

impl Iterator for TextureRuns<'_> {
    type Item = TextureRun;

    fn next(&mut self) -> Option<TextureRun> {
        if self.next >= self.end {
            return None;
        }
        let metas = self.quads.metas();
        let start = self.next;
        let texture = metas[start].texture;
        let mut end = start + 1;
        while end < self.end && metas[end].texture == texture {
            end += 1;
        }
        self.next = end;
        Some(TextureRun { texture, start, count: end - start })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::Color;
    use crate::render::quad_list::QuadParams;
    use crate::render::texture::TextureId;

    #[test]
    fn runs_split_on_texture_change() {
        let mut list = QuadList::with_capacity(8);
        let p = QuadParams::solid(Affine::IDENTITY, Vec2::new(1.0, 1.0), Color::WHITE);
        for tex in [
            TextureSource::White,
            TextureSource::White,
            TextureSource::Image(TextureId(1)),
            TextureSource::White,
        ] {
            list.add(tex, &p, None).unwrap();
        }
        let op = QuadOperation {
            start: 0,
            count: 4,
            program: Program::Default,
            owner: None,
            target: None,
            scissor: None,
            render_size: Vec2::new(100.0, 100.0),
        };
        let runs: Vec<_> = op.texture_runs(&list).map(|r| (r.start, r.count)).collect();
        assert_eq!(runs, vec![(0, 2), (2, 1), (3, 1)]);
    }
}
