//! Lumen engine crate.
//!
//! A retained-mode 2D quad renderer:
//! - [`scene`] holds the element tree
//! - [`render`] records it into quad operations and executes them on a GPU
//!   device or the software rasterizer
//! - [`decode`] turns encoded images into bitmaps off the render thread
//! - [`window`] and [`device`] host the GPU path in a `winit` window

pub mod coords;
pub mod core;
pub mod decode;
pub mod device;
pub mod logging;
pub mod paint;
pub mod render;
pub mod scene;
pub mod window;
