use super::{Element, ElementId, PaintKey};

#[derive(Debug)]
struct Node {
    element: Element,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    /// Insertion order among siblings.
    order: u32,
    /// The element or one of its descendants changed since the last render.
    subtree_dirty: bool,
}

/// Element arena with a single root.
///
/// The root is a plain container covering the canvas; everything visible is
/// inserted beneath it.
#[derive(Debug)]
pub struct SceneTree {
    nodes: Vec<Option<Node>>,
    free: Vec<u32>,
    root: ElementId,
    next_order: u32,
    /// An element was added or removed since the last render.
    structure_changed: bool,
}

impl Default for SceneTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneTree {
    pub fn new() -> Self {
        let root = Node {
            element: Element::new(),
            parent: None,
            children: Vec::new(),
            order: 0,
            subtree_dirty: true,
        };
        Self {
            nodes: vec![Some(root)],
            free: Vec::new(),
            root: ElementId::from_raw(0),
            next_order: 1,
            structure_changed: true,
        }
    }

    #[inline]
    pub fn root(&self) -> ElementId {
        self.root
    }

    /// Adds `element` as the last child of `parent`. Returns `None` when the
    /// parent does not exist.
    pub fn insert(&mut self, parent: ElementId, element: Element) -> Option<ElementId> {
        self.node(parent)?;

        let node = Node {
            element,
            parent: Some(parent),
            children: Vec::new(),
            order: self.next_order,
            subtree_dirty: true,
        };
        self.next_order = self.next_order.wrapping_add(1);

        let id = match self.free.pop() {
            Some(raw) => {
                self.nodes[raw as usize] = Some(node);
                ElementId::from_raw(raw)
            }
            None => {
                self.nodes.push(Some(node));
                ElementId::from_raw(self.nodes.len() as u32 - 1)
            }
        };

        if let Some(p) = self.node_mut(parent) {
            p.children.push(id);
        }
        self.structure_changed = true;
        Some(id)
    }

    /// Removes an element and its whole subtree. The root cannot be removed.
    pub fn remove(&mut self, id: ElementId) -> bool {
        if id == self.root || self.node(id).is_none() {
            return false;
        }

        if let Some(parent) = self.node(id).and_then(|n| n.parent) {
            if let Some(p) = self.node_mut(parent) {
                p.children.retain(|c| *c != id);
                p.element.mark_dirty();
            }
        }

        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(cur.index()).and_then(Option::take) {
                stack.extend(node.children);
                self.free.push(cur.raw());
            }
        }
        self.structure_changed = true;
        true
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.node(id).map(|n| &n.element)
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.node_mut(id).map(|n| &mut n.element)
    }

    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.node(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// Children in paint order (z-index, then insertion order).
    pub fn children(&self, id: ElementId) -> Vec<ElementId> {
        let Some(node) = self.node(id) else { return Vec::new() };
        let mut keyed: Vec<(PaintKey, ElementId)> = node
            .children
            .iter()
            .filter_map(|c| {
                let child = self.node(*c)?;
                Some((PaintKey::new(child.element.z_index(), child.order), *c))
            })
            .collect();
        keyed.sort_by_key(|(key, _)| *key);
        keyed.into_iter().map(|(_, c)| c).collect()
    }

    /// Collects pending changes ahead of a frame.
    ///
    /// Pulls program parameter changes into their elements and marks every
    /// ancestor of a changed element. Returns true when the frame needs to be
    /// redrawn.
    pub fn prepare_frame(&mut self) -> bool {
        let mut changed = Vec::new();
        for (i, slot) in self.nodes.iter_mut().enumerate() {
            if let Some(node) = slot {
                node.subtree_dirty = false;
                if node.element.pull_program_dirty() {
                    changed.push(ElementId::from_raw(i as u32));
                }
            }
        }

        for id in &changed {
            let mut cur = Some(*id);
            while let Some(c) = cur {
                let Some(node) = self.node_mut(c) else { break };
                if node.subtree_dirty {
                    break;
                }
                node.subtree_dirty = true;
                cur = node.parent;
            }
        }

        self.structure_changed || !changed.is_empty()
    }

    /// True when `id` or a descendant changed. Valid after [`prepare_frame`](Self::prepare_frame).
    pub fn subtree_dirty(&self, id: ElementId) -> bool {
        self.node(id).is_some_and(|n| n.subtree_dirty)
    }

    /// True when something changed since the last successful render.
    pub fn needs_render(&self) -> bool {
        self.structure_changed
            || self.nodes.iter().flatten().any(|n| n.subtree_dirty || n.element.is_dirty())
    }

    /// Clears all change tracking after a frame was rendered.
    pub fn mark_rendered(&mut self) {
        for node in self.nodes.iter_mut().flatten() {
            node.element.clear_dirty();
            node.subtree_dirty = false;
        }
        self.structure_changed = false;
    }

    /// Forces a redraw of everything on the next frame.
    pub fn request_render(&mut self) {
        if let Some(root) = self.node_mut(self.root) {
            root.element.mark_dirty();
        }
        self.structure_changed = true;
    }

    fn node(&self, id: ElementId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: ElementId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index()).and_then(Option::as_mut)
    }
}
