use thiserror::Error;

use super::program::ProgramKind;
use super::texture::TextureId;

/// Errors surfaced by the render core and its executors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// The quad list is full; the frame is abandoned.
    #[error("quad list exhausted (capacity {capacity} quads)")]
    BufferExhausted { capacity: usize },

    /// An offscreen target could not be allocated; operations using it are skipped.
    #[error("failed to allocate {width}x{height} render target")]
    TargetAllocation { width: u32, height: u32 },

    /// A draw program failed to build on the device.
    #[error("{kind:?} program failed to compile: {message}")]
    ProgramCompile { kind: ProgramKind, message: String },

    /// The device was lost and could not be re-initialized.
    #[error("render device lost")]
    DeviceLost,

    /// A quad referenced a texture the backend does not know.
    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureId),
}
