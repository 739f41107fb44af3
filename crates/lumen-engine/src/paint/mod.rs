//! Color model shared between the scene and the renderers.
//!
//! Colors are linear premultiplied RGBA. Vertex colors travel to the device
//! packed as four unorm bytes.

pub mod color;

pub use color::Color;
