//! Draw programs.
//!
//! A program is a shading routine plus a per-operation uniform setup step.
//! Programs are attached to elements; every quad in an element's subtree is
//! drawn with the nearest attached program unless it reports
//! [`use_default`](DrawProgram::use_default).

mod radial;
mod tilt;
mod uniforms;

pub use radial::RadialProgram;
pub use tilt::TiltProgram;
pub use uniforms::{DefaultUniforms, RadialUniforms, TiltUniforms, Uniforms, UNIFORM_SLOT};

use super::device::RenderDevice;
use super::operation::QuadOperation;

/// Device-side program identity.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ProgramKind {
    Default,
    Tilt,
    Radial,
}

impl ProgramKind {
    pub const ALL: [ProgramKind; 3] = [ProgramKind::Default, ProgramKind::Tilt, ProgramKind::Radial];
}

pub trait DrawProgram {
    fn kind(&self) -> ProgramKind;

    /// Uniform values for `op`, given the projection of its target.
    fn setup_uniforms(&self, op: &QuadOperation, projection: [f32; 2]) -> Uniforms;

    /// Parameters make this program indistinguishable from the default one.
    fn use_default(&self) -> bool {
        false
    }

    /// Operations without quads still need a draw call.
    fn draws_empty(&self) -> bool {
        false
    }

    fn has_same_program(&self, bound: Option<ProgramKind>) -> bool {
        bound == Some(self.kind())
    }

    fn use_program(&self, device: &mut dyn RenderDevice) {
        device.use_program(self.kind());
    }

    fn stop_program(&self, device: &mut dyn RenderDevice) {
        device.stop_program(self.kind());
    }
}

/// Program attached to an element.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Program {
    #[default]
    Default,
    Tilt(TiltProgram),
    Radial(RadialProgram),
}

impl Program {
    /// Returns and clears the "parameters changed" flag.
    pub fn take_dirty(&mut self) -> bool {
        match self {
            Program::Default => false,
            Program::Tilt(p) => p.take_dirty(),
            Program::Radial(p) => p.take_dirty(),
        }
    }

    /// Program that actually draws: parameterized programs in their
    /// neutral configuration collapse to the default.
    pub fn effective(&self) -> Program {
        if self.use_default() { Program::Default } else { self.clone() }
    }

    #[inline]
    pub fn is_default(&self) -> bool {
        matches!(self, Program::Default)
    }
}

impl DrawProgram for Program {
    fn kind(&self) -> ProgramKind {
        match self {
            Program::Default => ProgramKind::Default,
            Program::Tilt(p) => p.kind(),
            Program::Radial(p) => p.kind(),
        }
    }

    fn setup_uniforms(&self, op: &QuadOperation, projection: [f32; 2]) -> Uniforms {
        match self {
            Program::Default => Uniforms::default_for(projection),
            Program::Tilt(p) => p.setup_uniforms(op, projection),
            Program::Radial(p) => p.setup_uniforms(op, projection),
        }
    }

    fn use_default(&self) -> bool {
        match self {
            Program::Default => true,
            Program::Tilt(p) => p.use_default(),
            Program::Radial(p) => p.use_default(),
        }
    }

    fn draws_empty(&self) -> bool {
        match self {
            Program::Default => false,
            Program::Tilt(p) => p.draws_empty(),
            Program::Radial(p) => p.draws_empty(),
        }
    }
}
