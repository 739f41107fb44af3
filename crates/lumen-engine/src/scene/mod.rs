//! Retained element tree.
//!
//! Responsibilities:
//! - own elements in an arena addressed by [`ElementId`]
//! - provide deterministic paint order (z-index + insertion order)
//! - track changes so unchanged frames and offscreen subtrees can be skipped
//! - walk the tree into a [`RenderState`](crate::render::RenderState)

mod element;
mod order;
mod traverse;
mod tree;

pub use element::{Content, Element, ElementId};
pub use order::{PaintKey, ZIndex};
pub use traverse::record_scene;
pub use tree::SceneTree;
