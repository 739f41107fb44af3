//! Coordinate and geometry types shared by the scene and the renderers.
//!
//! Canonical CPU space:
//! - Logical pixels (DPI-aware)
//! - Origin top-left
//! - +X right, +Y down
//!
//! Conversion to device pixels happens only at the executor boundary, using
//! the canvas pixel ratio.

mod affine;
mod canvas;
mod rect;
mod vec2;

pub use affine::Affine;
pub use canvas::Canvas;
pub use rect::Rect;
pub use vec2::Vec2;
