//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and Windows, and gives each window a GPU
//! context and a quad renderer.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig, RuntimeCtx};
