//! Paint-order walk of the scene feeding a [`RenderState`].
//!
//! Uses an explicit work stack: each visited element pushes its restore
//! actions first and its children (reversed) on top, so restores run after the
//! whole subtree has been recorded.

use crate::coords::{Affine, Rect};
use crate::paint::Color;
use crate::render::{
    ProgramBinding, ProgramOwner, QuadParams, RenderBackend, RenderError, RenderState, TargetId,
    TargetInfo, TextureSource, UvRect,
};

use super::{Content, Element, ElementId, SceneTree};

enum Work {
    Visit { id: ElementId, parent: Affine, alpha: f32 },
    RestoreProgram(ProgramBinding),
    RestoreScissor(Option<Rect>),
    /// Close an offscreen pass and draw its result into the enclosing target.
    FinishTarget { owner: ElementId, target: TargetId, context: Affine, alpha: f32 },
}

/// Records every visible element of `tree` into `state`.
///
/// `state` must be between `begin_frame` and `finish_frame`.
pub fn record_scene<B: RenderBackend + ?Sized>(
    tree: &SceneTree,
    state: &mut RenderState,
    backend: &B,
) -> Result<(), RenderError> {
    let mut stack = vec![Work::Visit { id: tree.root(), parent: Affine::IDENTITY, alpha: 1.0 }];

    while let Some(work) = stack.pop() {
        match work {
            Work::Visit { id, parent, alpha } => {
                visit(tree, state, backend, &mut stack, id, parent, alpha)?;
            }
            Work::RestoreProgram(binding) => {
                state.set_program(binding);
            }
            Work::RestoreScissor(scissor) => {
                state.set_scissor(scissor);
            }
            Work::FinishTarget { owner, target, context, alpha } => {
                state.pop_target();
                if let Some(element) = tree.get(owner) {
                    draw_target(state, element, owner, target, context, alpha)?;
                }
            }
        }
    }
    Ok(())
}

fn visit<B: RenderBackend + ?Sized>(
    tree: &SceneTree,
    state: &mut RenderState,
    backend: &B,
    stack: &mut Vec<Work>,
    id: ElementId,
    parent: Affine,
    parent_alpha: f32,
) -> Result<(), RenderError> {
    let Some(element) = tree.get(id) else { return Ok(()) };
    if element.is_hidden() {
        return Ok(());
    }

    let context = parent.then(element.local_transform());
    let alpha = parent_alpha * element.alpha();

    if element.render_to_texture() && id != tree.root() {
        return visit_offscreen(tree, state, backend, stack, id, element, context, alpha);
    }

    if let Some(program) = element.program() {
        let owner = owner_of(id, element, context);
        let prev = state.set_program(ProgramBinding::new(program.clone(), Some(owner)));
        stack.push(Work::RestoreProgram(prev));
    }

    draw_content(state, element, context, alpha)?;

    if element.clipping() {
        if !context.is_axis_aligned() {
            log::debug!("clipping {id:?} under rotation uses its bounding box");
        }
        let bounds = context.bounds(element.size().x, element.size().y);
        let clip = match state.scissor() {
            Some(current) => current.clip(bounds),
            None => bounds,
        };
        let prev = state.set_scissor(Some(clip));
        stack.push(Work::RestoreScissor(prev));
    }

    push_children(tree, stack, id, context, alpha);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn visit_offscreen<B: RenderBackend + ?Sized>(
    tree: &SceneTree,
    state: &mut RenderState,
    backend: &B,
    stack: &mut Vec<Work>,
    id: ElementId,
    element: &Element,
    context: Affine,
    alpha: f32,
) -> Result<(), RenderError> {
    let size = element.size();
    if size.x <= 0.0 || size.y <= 0.0 {
        return Ok(());
    }

    let candidate = TargetInfo {
        id: state.next_target_id(),
        owner: id,
        width: size.x,
        height: size.y,
        dirty: tree.subtree_dirty(id),
        recorded: false,
    };

    if backend.is_render_texture_reusable(&candidate) {
        log::trace!("reusing offscreen target of {id:?}");
        let target = state.reuse_target(id, size);
        return draw_target(state, element, id, target, context, alpha);
    }

    let target = state.push_target(id, size, candidate.dirty);
    stack.push(Work::FinishTarget { owner: id, target, context, alpha });

    // Inside the target the owner sits at the origin, fully opaque; its own
    // transform and alpha apply when the result is drawn.
    draw_content(state, element, Affine::IDENTITY, 1.0)?;
    push_children(tree, stack, id, Affine::IDENTITY, 1.0);
    Ok(())
}

fn push_children(tree: &SceneTree, stack: &mut Vec<Work>, id: ElementId, context: Affine, alpha: f32) {
    for child in tree.children(id).into_iter().rev() {
        stack.push(Work::Visit { id: child, parent: context, alpha });
    }
}

fn draw_content(
    state: &mut RenderState,
    element: &Element,
    context: Affine,
    alpha: f32,
) -> Result<(), RenderError> {
    let size = element.size();
    if size.x <= 0.0 || size.y <= 0.0 {
        return Ok(());
    }
    let (texture, uv) = match element.content() {
        Content::None => return Ok(()),
        Content::Rect => (TextureSource::White, UvRect::FULL),
        Content::Texture { id, uv } => (TextureSource::Image(id), uv),
    };
    state.add_quad(
        texture,
        &QuadParams { context, alpha, size, uv, colors: element.colors() },
    )
}

/// Quad sampling an offscreen target, drawn with the owner's program.
fn draw_target(
    state: &mut RenderState,
    element: &Element,
    id: ElementId,
    target: TargetId,
    context: Affine,
    alpha: f32,
) -> Result<(), RenderError> {
    let prev = element
        .program()
        .map(|program| state.set_program(ProgramBinding::new(program.clone(), Some(owner_of(id, element, context)))));

    let result = state.add_quad(
        TextureSource::Target(target),
        &QuadParams {
            context,
            alpha,
            size: element.size(),
            uv: UvRect::FULL,
            colors: [Color::WHITE; 4],
        },
    );

    if let Some(prev) = prev {
        state.set_program(prev);
    }
    result
}

fn owner_of(id: ElementId, element: &Element, context: Affine) -> ProgramOwner {
    ProgramOwner {
        element: id,
        context,
        size: element.size(),
        pivot: element.pivot(),
    }
}
