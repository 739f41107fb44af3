use super::super::operation::QuadOperation;
use super::{DrawProgram, ProgramKind, RadialUniforms, Uniforms};

/// Circular mask centered on the render surface.
///
/// Pixels inside `radius` keep their color; outside, alpha falls off linearly
/// over `cutoff` logical pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct RadialProgram {
    radius: f32,
    cutoff: f32,
    dirty: bool,
}

impl Default for RadialProgram {
    fn default() -> Self {
        Self { radius: 0.0, cutoff: 1.0, dirty: false }
    }
}

impl RadialProgram {
    pub fn new(radius: f32, cutoff: f32) -> Self {
        Self { radius, cutoff, dirty: true }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn set_radius(&mut self, v: f32) {
        self.radius = v;
        self.dirty = true;
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    pub fn set_cutoff(&mut self, v: f32) {
        self.cutoff = v;
        self.dirty = true;
    }

    pub(crate) fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

impl DrawProgram for RadialProgram {
    fn kind(&self) -> ProgramKind {
        ProgramKind::Radial
    }

    fn use_default(&self) -> bool {
        self.radius == 0.0
    }

    fn setup_uniforms(&self, op: &QuadOperation, projection: [f32; 2]) -> Uniforms {
        let width = op.render_width().max(1.0);
        Uniforms::Radial(RadialUniforms {
            projection,
            // Half a pixel in, for a crisper edge.
            radius: 2.0 * (self.radius - 0.5) / width,
            cutoff: 0.5 * width / self.cutoff,
        })
    }
}
