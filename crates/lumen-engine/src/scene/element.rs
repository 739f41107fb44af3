use crate::coords::{Affine, Vec2};
use crate::paint::Color;
use crate::render::{Program, TextureId, UvRect};

use super::ZIndex;

/// Arena handle of an element in a [`SceneTree`](super::SceneTree).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ElementId(u32);

impl ElementId {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// What an element draws for itself.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub enum Content {
    /// Nothing; only children are drawn.
    #[default]
    None,
    /// Solid quad in the element's colors.
    Rect,
    /// Texture (or a sub-rect of it) tinted by the element's colors.
    Texture { id: TextureId, uv: UvRect },
}

/// Visual node of the scene.
///
/// Setters flag the element dirty; the tree turns that into a redraw request
/// at the next frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    position: Vec2,
    size: Vec2,
    scale: f32,
    rotation: f32,
    /// Fraction of the size.
    pivot: Vec2,
    alpha: f32,
    visible: bool,
    z_index: ZIndex,
    content: Content,
    /// Top-left, top-right, bottom-right, bottom-left.
    colors: [Color; 4],
    clipping: bool,
    render_to_texture: bool,
    program: Option<Program>,
    dirty: bool,
}

impl Default for Element {
    fn default() -> Self {
        Self {
            position: Vec2::zero(),
            size: Vec2::zero(),
            scale: 1.0,
            rotation: 0.0,
            pivot: Vec2::new(0.5, 0.5),
            alpha: 1.0,
            visible: true,
            z_index: ZIndex::default(),
            content: Content::None,
            colors: [Color::WHITE; 4],
            clipping: false,
            render_to_texture: false,
            program: None,
            dirty: true,
        }
    }
}

macro_rules! prop {
    ($get:ident, $set:ident, $with:ident, $ty:ty) => {
        #[inline]
        pub fn $get(&self) -> $ty {
            self.$get
        }

        pub fn $set(&mut self, v: $ty) {
            if self.$get != v {
                self.$get = v;
                self.dirty = true;
            }
        }

        pub fn $with(mut self, v: $ty) -> Self {
            self.$get = v;
            self
        }
    };
}

impl Element {
    pub fn new() -> Self {
        Self::default()
    }

    /// Solid rectangle at `(x, y)` of size `w × h`.
    pub fn rect(x: f32, y: f32, w: f32, h: f32, color: Color) -> Self {
        Self {
            position: Vec2::new(x, y),
            size: Vec2::new(w, h),
            content: Content::Rect,
            colors: [color; 4],
            ..Self::default()
        }
    }

    /// Textured quad showing the whole texture.
    pub fn image(x: f32, y: f32, w: f32, h: f32, texture: TextureId) -> Self {
        Self {
            position: Vec2::new(x, y),
            size: Vec2::new(w, h),
            content: Content::Texture { id: texture, uv: UvRect::FULL },
            ..Self::default()
        }
    }

    prop!(position, set_position, with_position, Vec2);
    prop!(size, set_size, with_size, Vec2);
    prop!(scale, set_scale, with_scale, f32);
    prop!(rotation, set_rotation, with_rotation, f32);
    prop!(pivot, set_pivot, with_pivot, Vec2);
    prop!(alpha, set_alpha, with_alpha, f32);
    prop!(visible, set_visible, with_visible, bool);
    prop!(z_index, set_z_index, with_z_index, ZIndex);
    prop!(content, set_content, with_content, Content);
    prop!(colors, set_colors, with_colors, [Color; 4]);
    prop!(clipping, set_clipping, with_clipping, bool);
    prop!(render_to_texture, set_render_to_texture, with_render_to_texture, bool);

    pub fn set_color(&mut self, color: Color) {
        self.set_colors([color; 4]);
    }

    pub fn with_color(self, color: Color) -> Self {
        self.with_colors([color; 4])
    }

    /// Vertical gradient: `top` on the upper corners, `bottom` on the lower ones.
    pub fn with_vertical_gradient(self, top: Color, bottom: Color) -> Self {
        self.with_colors([top, top, bottom, bottom])
    }

    #[inline]
    pub fn program(&self) -> Option<&Program> {
        self.program.as_ref()
    }

    /// Mutable access to the attached program. Parameter changes made through
    /// the program's setters are picked up at the next frame.
    #[inline]
    pub fn program_mut(&mut self) -> Option<&mut Program> {
        self.program.as_mut()
    }

    pub fn set_program(&mut self, program: Option<Program>) {
        self.program = program;
        self.dirty = true;
    }

    pub fn with_program(mut self, program: Program) -> Self {
        self.program = Some(program);
        self
    }

    /// Transform from element-local space into the parent's space.
    pub fn local_transform(&self) -> Affine {
        let pivot = Vec2::new(self.pivot.x * self.size.x, self.pivot.y * self.size.y);
        Affine::from_local(self.position, self.scale, self.rotation, pivot)
    }

    /// Draws nothing itself and nothing below it.
    #[inline]
    pub fn is_hidden(&self) -> bool {
        !self.visible || self.alpha <= 0.0
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Folds pending program parameter changes into the dirty flag.
    pub(crate) fn pull_program_dirty(&mut self) -> bool {
        if let Some(program) = self.program.as_mut() {
            if program.take_dirty() {
                self.dirty = true;
            }
        }
        self.dirty
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RadialProgram;

    #[test]
    fn setters_mark_dirty_only_on_change() {
        let mut e = Element::rect(0.0, 0.0, 10.0, 10.0, Color::WHITE);
        e.clear_dirty();
        e.set_alpha(1.0);
        assert!(!e.is_dirty());
        e.set_alpha(0.5);
        assert!(e.is_dirty());
    }

    #[test]
    fn program_changes_reach_the_element() {
        let mut e = Element::new().with_program(Program::Radial(RadialProgram::default()));
        e.clear_dirty();
        if let Some(Program::Radial(p)) = e.program_mut() {
            p.set_radius(12.0);
        }
        assert!(!e.is_dirty());
        assert!(e.pull_program_dirty());
    }

    #[test]
    fn local_transform_rotates_around_pivot() {
        let e = Element::rect(10.0, 20.0, 100.0, 50.0, Color::WHITE).with_rotation(core::f32::consts::PI);
        let center = e.local_transform().apply(Vec2::new(50.0, 25.0));
        assert!((center.x - 60.0).abs() < 1e-4 && (center.y - 45.0).abs() < 1e-4);
    }

    #[test]
    fn hidden_when_invisible_or_transparent() {
        assert!(Element::new().with_visible(false).is_hidden());
        assert!(Element::new().with_alpha(0.0).is_hidden());
        assert!(!Element::new().is_hidden());
    }
}
