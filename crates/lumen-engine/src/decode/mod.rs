//! Background image decoding.
//!
//! Decoding runs on worker threads; the host polls for results once per frame
//! and registers finished bitmaps with the renderer. A canceled request never
//! reports back.

mod error;
mod service;

pub use error::{DecodeError, DecodeErrorKind};
pub use service::{DecodeConfig, DecodeEvent, DecodeService, DecodeSource, RequestId};
