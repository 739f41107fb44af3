use crate::coords::Canvas;
use crate::scene::ElementId;

/// Per-frame index of an offscreen render target.
///
/// Ids are only meaningful within the frame that produced them; backends
/// that keep device storage across frames key it by [`TargetInfo::owner`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TargetId(pub u32);

/// Offscreen target requested by a render-to-texture element.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TargetInfo {
    pub id: TargetId,
    /// Element whose subtree renders into this target.
    pub owner: ElementId,
    /// Logical size.
    pub width: f32,
    pub height: f32,
    /// The owner's subtree changed since the target was last rendered.
    pub dirty: bool,
    /// Subtree was recorded this frame. False when the cached texture is
    /// sampled as-is.
    pub recorded: bool,
}

impl TargetInfo {
    /// Device size for the given canvas pixel ratio (at least 1×1).
    pub fn physical_size(&self, canvas: Canvas) -> (u32, u32) {
        (
            ((self.width * canvas.pixel_ratio).round() as u32).max(1),
            ((self.height * canvas.pixel_ratio).round() as u32).max(1),
        )
    }
}
