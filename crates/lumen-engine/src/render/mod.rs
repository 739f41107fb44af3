//! Quad rendering subsystem.
//!
//! The scene is recorded into a [`RenderState`] (one quad per visible leaf,
//! grouped into [`QuadOperation`]s) and handed to a [`RenderBackend`]:
//! - [`GpuExecutor`] drives a [`RenderDevice`] such as [`WgpuDevice`]
//! - [`SoftwareExecutor`] rasterizes onto a `tiny-skia` pixmap
//!
//! Convention:
//! - quad geometry is in logical pixels (top-left origin, +Y down)
//! - programs convert to clip space with a per-target projection vector

pub mod backend;
pub mod device;
pub mod error;
pub mod executor;
pub mod gpu;
pub mod index;
pub mod operation;
pub mod program;
pub mod quad_list;
pub mod renderer;
pub mod scissor;
pub mod software;
pub mod state;
pub mod target;
pub mod texture;

pub use backend::{FrameStats, RenderBackend};
pub use device::{DeviceCaps, FrameSetup, RenderDevice};
pub use error::RenderError;
pub use executor::GpuExecutor;
pub use gpu::WgpuDevice;
pub use index::{IndexFormat, IndexPlan};
pub use operation::{ProgramOwner, QuadOperation};
pub use program::{DrawProgram, Program, ProgramKind, RadialProgram, TiltProgram, Uniforms};
pub use quad_list::{QUAD_STRIDE, QuadList, QuadParams, QuadVertex, UvRect};
pub use renderer::{Renderer, RendererConfig};
pub use scissor::{ScissorRect, compute_scissor};
pub use software::SoftwareExecutor;
pub use state::{ProgramBinding, RenderState};
pub use target::{TargetId, TargetInfo};
pub use texture::{Bitmap, TextureId, TextureSource};
