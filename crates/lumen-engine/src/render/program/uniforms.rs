use bytemuck::{Pod, Zeroable};

use super::ProgramKind;

/// Every uniform block fits in one slot of the per-frame uniform ring.
pub const UNIFORM_SLOT: usize = 256;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct DefaultUniforms {
    pub projection: [f32; 2],
    pub _pad: [f32; 2], // 16-byte alignment
}

/// Mirrors `Uniforms` in `tilt.wgsl`; `vec3` members share their 16-byte
/// slot with the following scalar.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct TiltUniforms {
    pub projection: [f32; 2],
    pub _pad: [f32; 2],
    pub pivot: [f32; 3],
    pub z: f32,
    pub rot: [f32; 3],
    pub light_y: f32,
    pub light_z: f32,
    pub strength: f32,
    pub ambient: f32,
    pub fudge: f32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct RadialUniforms {
    pub projection: [f32; 2],
    /// Radius in clip-space units.
    pub radius: f32,
    /// Falloff scale: clip-space distance → fraction of the cutoff band.
    pub cutoff: f32,
}

const _: () = assert!(core::mem::size_of::<TiltUniforms>() == 64);
const _: () = assert!(core::mem::size_of::<TiltUniforms>() <= UNIFORM_SLOT);

/// Uniform values for one operation.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Uniforms {
    Default(DefaultUniforms),
    Tilt(TiltUniforms),
    Radial(RadialUniforms),
}

impl Uniforms {
    pub fn default_for(projection: [f32; 2]) -> Self {
        Uniforms::Default(DefaultUniforms { projection, _pad: [0.0; 2] })
    }

    pub fn kind(&self) -> ProgramKind {
        match self {
            Uniforms::Default(_) => ProgramKind::Default,
            Uniforms::Tilt(_) => ProgramKind::Tilt,
            Uniforms::Radial(_) => ProgramKind::Radial,
        }
    }

    pub fn projection(&self) -> [f32; 2] {
        match self {
            Uniforms::Default(u) => u.projection,
            Uniforms::Tilt(u) => u.projection,
            Uniforms::Radial(u) => u.projection,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Uniforms::Default(u) => bytemuck::bytes_of(u),
            Uniforms::Tilt(u) => bytemuck::bytes_of(u),
            Uniforms::Radial(u) => bytemuck::bytes_of(u),
        }
    }
}
