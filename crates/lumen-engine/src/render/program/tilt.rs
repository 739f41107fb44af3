use crate::coords::Vec2;

use super::super::operation::QuadOperation;
use super::{DrawProgram, ProgramKind, TiltUniforms, Uniforms};

/// Pseudo-3D tilt with a point light.
///
/// Rotates the owner's quads around `rx`/`ry` about a pivot, applies a
/// perspective divide scaled by `fudge`, and shades by distance to the light.
#[derive(Debug, Clone, PartialEq)]
pub struct TiltProgram {
    rx: f32,
    ry: f32,
    z: f32,
    /// Explicit pivot overrides, stored with a +1 bias.
    pivot_x: Option<f32>,
    pivot_y: Option<f32>,
    pivot_z: f32,
    light_y: f32,
    light_z: f32,
    strength: f32,
    ambient: f32,
    fudge: f32,
    dirty: bool,
}

impl Default for TiltProgram {
    fn default() -> Self {
        Self {
            rx: 0.0,
            ry: 0.0,
            z: 0.0,
            pivot_x: None,
            pivot_y: None,
            pivot_z: 0.0,
            light_y: 0.0,
            light_z: 0.0,
            strength: 0.5,
            ambient: 0.5,
            fudge: 0.4,
            dirty: false,
        }
    }
}

macro_rules! setter {
    ($set:ident, $get:ident, $field:ident) => {
        pub fn $set(&mut self, v: f32) {
            self.$field = v;
            self.dirty = true;
        }

        #[inline]
        pub fn $get(&self) -> f32 {
            self.$field
        }
    };
}

impl TiltProgram {
    /// Parameters that make the program draw exactly like the default one.
    pub fn neutral() -> Self {
        Self { strength: 0.0, ambient: 1.0, ..Self::default() }
    }

    setter!(set_rx, rx, rx);
    setter!(set_ry, ry, ry);
    setter!(set_z, z, z);
    setter!(set_pivot_z, pivot_z, pivot_z);
    setter!(set_light_y, light_y, light_y);
    setter!(set_light_z, light_z, light_z);
    setter!(set_strength, strength, strength);
    setter!(set_ambient, ambient, ambient);
    setter!(set_fudge, fudge, fudge);

    pub fn set_pivot_x(&mut self, v: f32) {
        self.pivot_x = Some(v + 1.0);
        self.dirty = true;
    }

    pub fn set_pivot_y(&mut self, v: f32) {
        self.pivot_y = Some(v + 1.0);
        self.dirty = true;
    }

    /// Stored (biased) pivot override.
    pub fn pivot_x(&self) -> Option<f32> {
        self.pivot_x
    }

    pub fn pivot_y(&self) -> Option<f32> {
        self.pivot_y
    }

    pub(crate) fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

impl DrawProgram for TiltProgram {
    fn kind(&self) -> ProgramKind {
        ProgramKind::Tilt
    }

    fn use_default(&self) -> bool {
        self.rx == 0.0 && self.ry == 0.0 && self.z == 0.0 && self.strength == 0.0 && self.ambient == 1.0
    }

    fn setup_uniforms(&self, op: &QuadOperation, projection: [f32; 2]) -> Uniforms {
        let (pivot, rz) = match op.owner {
            Some(owner) => {
                let local = Vec2::new(
                    self.pivot_x.unwrap_or(owner.pivot.x * owner.size.x),
                    self.pivot_y.unwrap_or(owner.pivot.y * owner.size.y),
                );
                let coords = owner.target_coords(local);
                // Counter the owner's own rotation so tilt axes follow its frame.
                (coords, -owner.context.tc.atan2(owner.context.ta))
            }
            None => (Vec2::zero(), 0.0),
        };

        Uniforms::Tilt(TiltUniforms {
            projection,
            _pad: [0.0; 2],
            pivot: [pivot.x, pivot.y, self.pivot_z],
            z: self.z,
            rot: [self.rx, self.ry, rz],
            light_y: self.light_y,
            light_z: self.light_z,
            strength: self.strength,
            ambient: self.ambient,
            fudge: self.fudge,
        })
    }
}
