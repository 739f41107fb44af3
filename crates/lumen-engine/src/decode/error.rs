use std::path::PathBuf;

use thiserror::Error;

/// Coarse failure class reported with [`DecodeEvent::Failed`](super::DecodeEvent::Failed).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DecodeErrorKind {
    /// The source could not be read.
    Io,
    /// The bytes are not a supported image.
    Parse,
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse image data: {0}")]
    Parse(#[from] image::ImageError),

    #[error("decoded image has an invalid size ({width}x{height})")]
    InvalidSize { width: u32, height: u32 },
}

impl DecodeError {
    pub fn kind(&self) -> DecodeErrorKind {
        match self {
            DecodeError::Io { .. } => DecodeErrorKind::Io,
            DecodeError::Parse(_) | DecodeError::InvalidSize { .. } => DecodeErrorKind::Parse,
        }
    }
}
