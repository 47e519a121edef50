//! The node arena: tree structure, transforms, bounds, hit testing and
//! pointer dispatch.

use crate::bitmap::Bitmap;
use crate::error::SceneError;
use crate::event::{EventKind, ListenerId, UiEvent};
use crate::graphics::Graphics;
use crate::node::{Node, NodeId, NodeKind};
use crate::text_node::TextNode;
use common::{Matrix, Point, Rect, Size};
use gpu::TextureKey;
use slotmap::SlotMap;
use std::fmt;
use std::rc::Rc;
use text::{TextStyle, TextSystem};
use tracing::debug;

/// Owns every node. A node has at most one parent; parents own the order
/// of their children, which is also paint order.
pub struct Scene {
    nodes: SlotMap<NodeId, Node>,
    root: NodeId,
    text: Rc<TextSystem>,
    default_text_style: TextStyle,
    released_textures: Vec<TextureKey>,
}

impl Scene {
    pub fn new(text: Rc<TextSystem>) -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::new("root", NodeKind::Container));
        Self {
            nodes,
            root,
            text,
            default_text_style: TextStyle::default(),
            released_textures: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn text_system(&self) -> &Rc<TextSystem> {
        &self.text
    }

    /// Style given to text nodes created without one.
    pub fn set_default_text_style(&mut self, style: TextStyle) {
        self.default_text_style = style;
    }

    pub fn default_text_style(&self) -> &TextStyle {
        &self.default_text_style
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, SceneError> {
        self.nodes.get(id).ok_or(SceneError::NotFound(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, SceneError> {
        self.nodes.get_mut(id).ok_or(SceneError::NotFound(id))
    }

    // ---- creation ----

    pub fn create_container(&mut self, name: &str) -> NodeId {
        self.insert(name, NodeKind::Container)
    }

    pub fn create_graphics(&mut self, name: &str) -> NodeId {
        self.insert(name, NodeKind::Graphics(Graphics::new()))
    }

    /// Text node in the default style.
    pub fn create_text(&mut self, content: &str, name: &str) -> NodeId {
        let style = self.default_text_style.clone();
        self.create_text_with_style(content, style, name)
    }

    pub fn create_text_with_style(&mut self, content: &str, style: TextStyle, name: &str) -> NodeId {
        let node = TextNode::new(content, style, &self.text);
        self.insert(name, NodeKind::Text(node))
    }

    pub fn create_bitmap(&mut self, bitmap: Bitmap, name: &str) -> NodeId {
        self.insert(name, NodeKind::Bitmap(bitmap))
    }

    fn insert(&mut self, name: &str, kind: NodeKind) -> NodeId {
        let id = self.nodes.insert(Node::new(name, kind));
        debug!(?id, kind = self.nodes[id].kind.name(), name, "created node");
        id
    }

    // ---- tree ----

    /// Append `child` to `parent`, detaching it from its previous parent.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        let len = self.node(parent)?.children.len();
        self.add_child_at(parent, child, len)
    }

    /// Insert `child` at `index` (clamped) in `parent`'s children.
    pub fn add_child_at(&mut self, parent: NodeId, child: NodeId, index: usize) -> Result<(), SceneError> {
        if !self.node(parent)?.is_container() {
            return Err(SceneError::NotAContainer(parent));
        }
        self.node(child)?;
        if child == self.root {
            return Err(SceneError::Root);
        }
        if child == parent || self.is_ancestor(child, parent) {
            return Err(SceneError::Cycle { parent, child });
        }

        self.detach(child);
        let children = &mut self.nodes[parent].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child].parent = Some(parent);
        Ok(())
    }

    /// Remove `child` from `parent`. The child stays alive, unattached.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if self.parent(child) != Some(parent) {
            return false;
        }
        self.detach(child)
    }

    /// Remove `id` from its parent, if it has one.
    pub fn detach(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.nodes.get_mut(id).and_then(|n| n.parent.take()) else {
            return false;
        };
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.retain(|c| *c != id);
        }
        true
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    /// Children of `id` in paint order; empty for unknown ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Whether `ancestor` is a strict ancestor of `id`.
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.parent(id);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.parent(p);
        }
        false
    }

    /// Whether `id` is attached, directly or not, to the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root || self.is_ancestor(self.root, id)
    }

    /// Destroy `id` and its whole subtree. Listeners are dropped and owned
    /// textures are queued in [`take_released_textures`](Self::take_released_textures).
    /// Returns the number of nodes removed.
    pub fn destroy(&mut self, id: NodeId) -> Result<usize, SceneError> {
        if id == self.root {
            return Err(SceneError::Root);
        }
        self.node(id)?;
        self.detach(id);

        let mut stack = vec![id];
        let mut count = 0;
        while let Some(current) = stack.pop() {
            let Some(mut node) = self.nodes.remove(current) else {
                continue;
            };
            count += 1;
            stack.extend(node.children.iter().copied());
            node.listeners.clear();
            let texture = match &mut node.kind {
                NodeKind::Text(t) => t.take_texture(),
                NodeKind::Bitmap(b) => b.take_owned_texture(),
                NodeKind::Container | NodeKind::Graphics(_) => None,
            };
            self.released_textures.extend(texture);
        }
        debug!(?id, count, "destroyed subtree");
        Ok(count)
    }

    /// Destroy every child of the root.
    pub fn clear(&mut self) -> usize {
        let children: Vec<NodeId> = self.children(self.root).to_vec();
        children.into_iter().filter_map(|c| self.destroy(c).ok()).sum()
    }

    /// Textures released by destroyed nodes since the last call.
    pub fn take_released_textures(&mut self) -> Vec<TextureKey> {
        std::mem::take(&mut self.released_textures)
    }

    /// Ids of every node in the subtree of `id`, depth first, `id` first.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(current) {
                out.push(current);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    // ---- kinds ----

    pub fn graphics(&self, id: NodeId) -> Option<&Graphics> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Graphics(g) => Some(g),
            _ => None,
        }
    }

    pub fn graphics_mut(&mut self, id: NodeId) -> Option<&mut Graphics> {
        match &mut self.nodes.get_mut(id)?.kind {
            NodeKind::Graphics(g) => Some(g),
            _ => None,
        }
    }

    pub fn text_node(&self, id: NodeId) -> Option<&TextNode> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn text_node_mut(&mut self, id: NodeId) -> Option<&mut TextNode> {
        match &mut self.nodes.get_mut(id)?.kind {
            NodeKind::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn bitmap(&self, id: NodeId) -> Option<&Bitmap> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Bitmap(b) => Some(b),
            _ => None,
        }
    }

    pub fn bitmap_mut(&mut self, id: NodeId) -> Option<&mut Bitmap> {
        match &mut self.nodes.get_mut(id)?.kind {
            NodeKind::Bitmap(b) => Some(b),
            _ => None,
        }
    }

    /// Replace the text of a text node. Returns whether it changed.
    pub fn set_text(&mut self, id: NodeId, content: &str) -> Result<bool, SceneError> {
        let system = Rc::clone(&self.text);
        self.text_mut_checked(id).map(|t| t.set_text(content, &system))
    }

    pub fn set_text_style(&mut self, id: NodeId, style: TextStyle) -> Result<bool, SceneError> {
        let system = Rc::clone(&self.text);
        self.text_mut_checked(id).map(|t| t.set_style(style, &system))
    }

    fn text_mut_checked(&mut self, id: NodeId) -> Result<&mut TextNode, SceneError> {
        let node = self.nodes.get_mut(id).ok_or(SceneError::NotFound(id))?;
        let actual = node.kind.name();
        match &mut node.kind {
            NodeKind::Text(t) => Ok(t),
            _ => Err(SceneError::WrongKind { id, expected: "text", actual }),
        }
    }

    // ---- geometry ----

    /// Local-space box of the node's content. Containers use the union of
    /// their children's boxes in the container's space.
    pub fn content_rect(&self, id: NodeId) -> Rect {
        let Some(node) = self.nodes.get(id) else {
            return Rect::ZERO;
        };
        match &node.kind {
            NodeKind::Container => node
                .children
                .iter()
                .map(|c| self.rect_in_parent(*c))
                .reduce(|a, b| a.union(&b))
                .unwrap_or(Rect::ZERO),
            NodeKind::Graphics(g) => g.bounds(),
            NodeKind::Text(t) => Rect::new(0.0, 0.0, t.layout().width, t.layout().height),
            NodeKind::Bitmap(b) => Rect::new(0.0, 0.0, b.width, b.height),
        }
    }

    /// Intrinsic (unscaled) size.
    pub fn size(&self, id: NodeId) -> Size {
        self.content_rect(id).size()
    }

    /// Content box of `id` in its parent's space. The subtree is measured
    /// once per call.
    fn rect_in_parent(&self, id: NodeId) -> Rect {
        let Some(node) = self.nodes.get(id) else {
            return Rect::ZERO;
        };
        let rect = self.content_rect(id);
        node.local_matrix(rect.size()).transform_rect(&rect)
    }

    /// The intrinsic size only feeds the anchor, so nodes anchored at their
    /// origin skip measuring their subtree.
    pub fn local_matrix(&self, id: NodeId) -> Matrix {
        match self.nodes.get(id) {
            Some(node) if node.has_anchor() => node.local_matrix(self.size(id)),
            Some(node) => node.local_matrix(Size::ZERO),
            None => Matrix::IDENTITY,
        }
    }

    /// Product of the local transforms from the root down to `id`,
    /// recomputed on every call.
    pub fn global_matrix(&self, id: NodeId) -> Matrix {
        let mut matrix = self.local_matrix(id);
        let mut current = self.parent(id);
        while let Some(p) = current {
            matrix = self.local_matrix(p).multiply(&matrix);
            current = self.parent(p);
        }
        matrix
    }

    /// Canvas point in the local space of `id`, `None` for singular
    /// transforms.
    pub fn to_local(&self, id: NodeId, point: Point) -> Option<Point> {
        self.global_matrix(id).invert().map(|inv| inv.transform_point(point))
    }

    /// Screen-space axis-aligned bounds of the node's content box.
    pub fn get_bounds(&self, id: NodeId) -> Rect {
        let Some(node) = self.nodes.get(id) else {
            return Rect::ZERO;
        };
        let rect = self.content_rect(id);
        let size = rect.size();
        let local = if node.scale_affects_size {
            node.local_matrix(size)
        } else {
            node.local_matrix_scaled(size, 1.0, 1.0)
        };
        let parent = node.parent.map(|p| self.global_matrix(p)).unwrap_or(Matrix::IDENTITY);
        parent.multiply(&local).transform_rect(&rect)
    }

    /// Whether the canvas `point` hits the node. Alpha is ignored; hidden
    /// nodes never hit; containers hit when any child hits.
    pub fn hit_test(&self, id: NodeId, point: Point) -> bool {
        let Some(node) = self.nodes.get(id) else {
            return false;
        };
        if !node.visible {
            return false;
        }
        let local = self.to_local(id, point);
        if let Some(clip) = node.clip_rect {
            if !local.is_some_and(|p| clip.contains_point(p)) {
                return false;
            }
        }
        match &node.kind {
            NodeKind::Container => node.children.iter().rev().any(|c| self.hit_test(*c, point)),
            NodeKind::Graphics(g) => local.is_some_and(|p| g.hit(p)),
            NodeKind::Text(_) | NodeKind::Bitmap(_) => {
                local.is_some_and(|p| self.content_rect(id).contains_point(p))
            }
        }
    }

    // ---- events ----

    pub fn add_event_listener<F>(&mut self, id: NodeId, kind: EventKind, handler: F) -> Result<ListenerId, SceneError>
    where
        F: Fn(&mut UiEvent, &mut Scene) + 'static,
    {
        let node = self.node_mut(id)?;
        Ok(node.listeners.on(kind, Rc::new(handler)))
    }

    pub fn remove_event_listener(&mut self, id: NodeId, kind: EventKind, listener: ListenerId) -> bool {
        self.nodes
            .get_mut(id)
            .map(|n| n.listeners.off(kind, listener))
            .unwrap_or(false)
    }

    /// Deliver `event` through the tree from the root. Returns whether any
    /// listener received it.
    ///
    /// Children are visited front to back before their parent, so the
    /// top-most node's listeners run first and ancestors run afterwards.
    pub fn dispatch(&mut self, event: &mut UiEvent) -> bool {
        let root = self.root;
        self.dispatch_node(root, event);
        event.is_handled()
    }

    /// Returns whether a listener in the subtree of `id` received the event.
    fn dispatch_node(&mut self, id: NodeId, event: &mut UiEvent) -> bool {
        let Some(node) = self.nodes.get(id) else {
            return false;
        };
        if !node.visible {
            return false;
        }
        if let Some(clip) = node.clip_rect {
            if !self.to_local(id, event.point()).is_some_and(|p| clip.contains_point(p)) {
                return false;
            }
        }
        let children = node.children.clone();

        let mut delivered_below = false;
        for child in children.iter().rev() {
            delivered_below |= self.dispatch_node(*child, event);
            if event.is_immediate_propagation_stopped() {
                return delivered_below;
            }
        }
        if event.is_propagation_stopped() {
            return delivered_below;
        }

        let handlers = match self.nodes.get(id) {
            Some(node) => node.listeners.listeners(event.kind),
            None => return delivered_below,
        };
        if handlers.is_empty() {
            return delivered_below;
        }
        // a delivery below implies this node is hit as well
        if !delivered_below && !self.hit_test(id, event.point()) {
            return false;
        }

        event.current_target = Some(id);
        event.local = self.to_local(id, event.point()).unwrap_or(event.point());
        if event.target.is_none() {
            event.target = Some(id);
        }
        event.mark_handled();
        for handler in handlers {
            handler(event, self);
            if event.is_immediate_propagation_stopped() {
                break;
            }
        }
        event.current_target = None;
        true
    }
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("root", &self.root)
            .field("nodes", &self.nodes.len())
            .field("released_textures", &self.released_textures.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PointerSource;
    use slotmap::SlotMap;
    use std::cell::RefCell;

    fn scene() -> Scene {
        Scene::new(Rc::new(TextSystem::monospace()))
    }

    fn square(scene: &mut Scene, parent: NodeId, x: f32, y: f32, size: f32) -> NodeId {
        let id = scene.create_graphics("square");
        scene.graphics_mut(id).unwrap().fill_rect(0.0, 0.0, size, size, common::Color::WHITE);
        scene.get_mut(id).unwrap().set_position(x, y);
        scene.add_child(parent, id).unwrap();
        id
    }

    fn touch(x: f32, y: f32) -> UiEvent {
        UiEvent::new(EventKind::TouchStart, PointerSource::Touch, x, y)
    }

    #[test]
    fn test_add_child_detaches_from_previous_parent() {
        let mut s = scene();
        let a = s.create_container("a");
        let b = s.create_container("b");
        let child = s.create_container("child");
        s.add_child(s.root(), a).unwrap();
        s.add_child(s.root(), b).unwrap();
        s.add_child(a, child).unwrap();
        s.add_child(b, child).unwrap();

        assert!(s.children(a).is_empty());
        assert_eq!(s.children(b), &[child]);
        assert_eq!(s.parent(child), Some(b));
        let listed = [s.root(), a, b].iter().filter(|p| s.children(**p).contains(&child)).count();
        assert_eq!(listed, 1);
    }

    #[test]
    fn test_add_child_rejects_cycles_and_leaves() {
        let mut s = scene();
        let a = s.create_container("a");
        let b = s.create_container("b");
        s.add_child(a, b).unwrap();
        assert_eq!(s.add_child(b, a), Err(SceneError::Cycle { parent: b, child: a }));
        assert_eq!(s.add_child(a, a), Err(SceneError::Cycle { parent: a, child: a }));
        assert_eq!(s.add_child(a, s.root()), Err(SceneError::Root));

        let g = s.create_graphics("g");
        assert_eq!(s.add_child(g, b), Err(SceneError::NotAContainer(g)));
    }

    #[test]
    fn test_add_child_at_orders_children() {
        let mut s = scene();
        let root = s.root();
        let a = s.create_container("a");
        let b = s.create_container("b");
        let c = s.create_container("c");
        s.add_child(root, a).unwrap();
        s.add_child(root, b).unwrap();
        s.add_child_at(root, c, 0).unwrap();
        assert_eq!(s.children(root), &[c, a, b]);
        // moving within the same parent
        s.add_child_at(root, c, 99).unwrap();
        assert_eq!(s.children(root), &[a, b, c]);
        assert!(s.remove_child(root, a));
        assert!(!s.remove_child(root, a));
        assert!(s.contains(a));
    }

    #[test]
    fn test_destroy_is_recursive_and_releases_owned_textures() {
        let mut s = scene();
        let mut keys: SlotMap<TextureKey, ()> = SlotMap::with_key();
        let (k1, k2, k3) = (keys.insert(()), keys.insert(()), keys.insert(()));

        let parent = s.create_container("parent");
        s.add_child(s.root(), parent).unwrap();
        let text = s.create_text("hi", "t");
        s.text_node_mut(text).unwrap().set_rasterized(k1);
        let owned = s.create_bitmap(Bitmap::owned(k2, 1, 1, None), "owned");
        let mut shared_bitmap = Bitmap::pending(None);
        shared_bitmap.attach(k3, 2, 2);
        let shared = s.create_bitmap(shared_bitmap, "shared");
        for id in [text, owned, shared] {
            s.add_child(parent, id).unwrap();
        }
        s.add_event_listener(text, EventKind::TouchStart, |_, _| {}).unwrap();

        assert_eq!(s.destroy(parent), Ok(4));
        assert!(!s.contains(text) && !s.contains(owned) && !s.contains(shared));
        assert!(s.children(s.root()).is_empty());
        let mut released = s.take_released_textures();
        released.sort();
        let mut expected = vec![k1, k2];
        expected.sort();
        assert_eq!(released, expected);
        assert!(s.take_released_textures().is_empty());
        assert_eq!(s.destroy(s.root()), Err(SceneError::Root));
        assert_eq!(s.destroy(parent), Err(SceneError::NotFound(parent)));
    }

    #[test]
    fn test_global_matrix_composes_parents() {
        let mut s = scene();
        let parent = s.create_container("p");
        s.get_mut(parent).unwrap().set_position(10.0, 20.0).set_scale(2.0, 2.0);
        s.add_child(s.root(), parent).unwrap();
        let child = square(&mut s, parent, 5.0, 5.0, 10.0);

        let p = s.global_matrix(child).transform_point(Point::ZERO);
        assert_eq!(p, Point::new(20.0, 30.0));
        assert_eq!(s.get_bounds(child), Rect::new(20.0, 30.0, 20.0, 20.0));
    }

    #[test]
    fn test_bounds_axis_aligned_for_rotation() {
        let mut s = scene();
        let root = s.root();
        let g = square(&mut s, root, 50.0, 50.0, 10.0);
        s.get_mut(g).unwrap().set_anchor(0.5, 0.5).set_rotation(std::f32::consts::FRAC_PI_4);
        let b = s.get_bounds(g);
        let half_diag = 50f32.sqrt();
        assert!((b.x - (50.0 - half_diag)).abs() < 1e-3);
        assert!((b.width - 2.0 * half_diag).abs() < 1e-3);
    }

    #[test]
    fn test_bounds_ignore_own_scale_when_not_size_affecting() {
        let mut s = scene();
        let root = s.root();
        let g = square(&mut s, root, 0.0, 0.0, 10.0);
        s.get_mut(g).unwrap().set_scale(3.0, 3.0);
        assert_eq!(s.get_bounds(g).width, 30.0);
        s.get_mut(g).unwrap().scale_affects_size = false;
        assert_eq!(s.get_bounds(g).width, 10.0);
    }

    #[test]
    fn test_container_size_is_union_of_children() {
        let mut s = scene();
        let c = s.create_container("c");
        s.add_child(s.root(), c).unwrap();
        square(&mut s, c, 0.0, 0.0, 10.0);
        square(&mut s, c, 20.0, 5.0, 10.0);
        assert_eq!(s.content_rect(c), Rect::new(0.0, 0.0, 30.0, 15.0));
    }

    /// Nested containers down to one square; each level offset by (1, 1).
    fn chain(s: &mut Scene, depth: usize, anchor: f32) -> (NodeId, NodeId) {
        let mut parent = s.root();
        let mut top = parent;
        for i in 0..depth {
            let c = s.create_container("level");
            s.get_mut(c).unwrap().set_position(1.0, 1.0).set_anchor(anchor, anchor);
            s.add_child(parent, c).unwrap();
            if i == 0 {
                top = c;
            }
            parent = c;
        }
        let leaf = square(s, parent, 0.0, 0.0, 10.0);
        (top, leaf)
    }

    #[test]
    fn test_deep_chain_geometry_is_not_exponential() {
        let mut s = scene();
        let (top, leaf) = chain(&mut s, 200, 0.0);
        assert_eq!(s.content_rect(top), Rect::new(199.0, 199.0, 10.0, 10.0));
        assert_eq!(s.global_matrix(leaf).transform_point(Point::ZERO), Point::new(200.0, 200.0));
        assert!(s.hit_test(top, Point::new(205.0, 205.0)));
        assert!(!s.hit_test(top, Point::new(150.0, 150.0)));

        let hits = Rc::new(RefCell::new(0));
        let h = hits.clone();
        s.add_event_listener(leaf, EventKind::TouchStart, move |_, _| *h.borrow_mut() += 1).unwrap();
        assert!(s.dispatch(&mut touch(205.0, 205.0)));
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn test_deep_anchored_chain() {
        let mut s = scene();
        // every level is 10x10, so an anchor of 0.5 shifts each by (-5, -5)
        let (top, leaf) = chain(&mut s, 60, 0.5);
        assert_eq!(s.size(top), Size::new(10.0, 10.0));
        assert_eq!(s.global_matrix(leaf).transform_point(Point::ZERO), Point::new(-240.0, -240.0));
        assert!(s.hit_test(top, Point::new(-235.0, -235.0)));
    }

    #[test]
    fn test_alpha_zero_still_hits() {
        let mut s = scene();
        let root = s.root();
        let g = square(&mut s, root, 0.0, 0.0, 10.0);
        s.get_mut(g).unwrap().set_alpha(0.0);
        assert!(s.hit_test(g, Point::new(5.0, 5.0)));
        s.get_mut(g).unwrap().set_visible(false);
        assert!(!s.hit_test(g, Point::new(5.0, 5.0)));
    }

    #[test]
    fn test_singular_transform_never_hits() {
        let mut s = scene();
        let root = s.root();
        let g = square(&mut s, root, 0.0, 0.0, 10.0);
        s.get_mut(g).unwrap().set_scale(0.0, 0.0);
        assert!(!s.hit_test(g, Point::ZERO));
    }

    #[test]
    fn test_container_hits_through_children() {
        let mut s = scene();
        let c = s.create_container("c");
        s.add_child(s.root(), c).unwrap();
        square(&mut s, c, 100.0, 100.0, 10.0);
        assert!(s.hit_test(c, Point::new(105.0, 105.0)));
        assert!(!s.hit_test(c, Point::new(50.0, 50.0)));
    }

    #[test]
    fn test_clip_limits_hits() {
        let mut s = scene();
        let c = s.create_container("c");
        s.add_child(s.root(), c).unwrap();
        square(&mut s, c, 0.0, 0.0, 100.0);
        s.get_mut(c).unwrap().set_clip_rect(Some(Rect::new(0.0, 0.0, 10.0, 10.0)));
        assert!(s.hit_test(c, Point::new(5.0, 5.0)));
        assert!(!s.hit_test(c, Point::new(50.0, 50.0)));
    }

    #[test]
    fn test_dispatch_topmost_first_then_ancestors() {
        let mut s = scene();
        let log = Rc::new(RefCell::new(Vec::new()));
        let parent = s.create_container("parent");
        s.add_child(s.root(), parent).unwrap();
        let below = square(&mut s, parent, 0.0, 0.0, 10.0);
        let above = square(&mut s, parent, 0.0, 0.0, 10.0);
        for (id, name) in [(parent, "parent"), (below, "below"), (above, "above")] {
            let log = log.clone();
            s.add_event_listener(id, EventKind::TouchStart, move |_, _| log.borrow_mut().push(name))
                .unwrap();
        }

        let mut e = touch(5.0, 5.0);
        assert!(s.dispatch(&mut e));
        assert_eq!(*log.borrow(), vec!["above", "below", "parent"]);
        assert_eq!(e.target, Some(above));
    }

    #[test]
    fn test_stop_propagation_skips_ancestors() {
        let mut s = scene();
        let log = Rc::new(RefCell::new(Vec::new()));
        let parent = s.create_container("parent");
        s.add_child(s.root(), parent).unwrap();
        let child = square(&mut s, parent, 0.0, 0.0, 10.0);

        let l = log.clone();
        s.add_event_listener(child, EventKind::TouchStart, move |e, _| {
            l.borrow_mut().push("child 1");
            e.stop_propagation();
        })
        .unwrap();
        let l = log.clone();
        s.add_event_listener(child, EventKind::TouchStart, move |_, _| l.borrow_mut().push("child 2"))
            .unwrap();
        let l = log.clone();
        s.add_event_listener(parent, EventKind::TouchStart, move |_, _| l.borrow_mut().push("parent"))
            .unwrap();

        let mut e = touch(1.0, 1.0);
        s.dispatch(&mut e);
        assert_eq!(*log.borrow(), vec!["child 1", "child 2"]);
    }

    #[test]
    fn test_stop_immediate_skips_listeners_and_siblings() {
        let mut s = scene();
        let log = Rc::new(RefCell::new(Vec::new()));
        let root = s.root();
        let below = square(&mut s, root, 0.0, 0.0, 10.0);
        let above = square(&mut s, root, 0.0, 0.0, 10.0);

        let l = log.clone();
        s.add_event_listener(above, EventKind::TouchStart, move |e, _| {
            l.borrow_mut().push("above 1");
            e.stop_immediate_propagation();
        })
        .unwrap();
        let l = log.clone();
        s.add_event_listener(above, EventKind::TouchStart, move |_, _| l.borrow_mut().push("above 2"))
            .unwrap();
        let l = log.clone();
        s.add_event_listener(below, EventKind::TouchStart, move |_, _| l.borrow_mut().push("below"))
            .unwrap();

        let mut e = touch(1.0, 1.0);
        s.dispatch(&mut e);
        assert_eq!(*log.borrow(), vec!["above 1"]);
    }

    #[test]
    fn test_miss_and_kind_filtering() {
        let mut s = scene();
        let hits = Rc::new(RefCell::new(0));
        let root = s.root();
        let g = square(&mut s, root, 0.0, 0.0, 10.0);
        let h = hits.clone();
        let id = s
            .add_event_listener(g, EventKind::TouchEnd, move |_, _| *h.borrow_mut() += 1)
            .unwrap();

        assert!(!s.dispatch(&mut touch(5.0, 5.0)));
        let mut end = UiEvent::touch(EventKind::TouchEnd, 50.0, 50.0);
        assert!(!s.dispatch(&mut end));
        let mut end = UiEvent::touch(EventKind::TouchEnd, 5.0, 5.0);
        assert!(s.dispatch(&mut end));
        assert_eq!(*hits.borrow(), 1);

        assert!(s.remove_event_listener(g, EventKind::TouchEnd, id));
        let mut end = UiEvent::touch(EventKind::TouchEnd, 5.0, 5.0);
        assert!(!s.dispatch(&mut end));
    }

    #[test]
    fn test_handler_can_edit_scene() {
        let mut s = scene();
        let root = s.root();
        let g = square(&mut s, root, 10.0, 10.0, 10.0);
        s.add_event_listener(g, EventKind::TouchStart, move |e, scene| {
            assert_eq!(e.local, Point::new(2.0, 3.0));
            let target = e.current_target.unwrap();
            scene.destroy(target).unwrap();
        })
        .unwrap();
        let mut e = touch(12.0, 13.0);
        assert!(s.dispatch(&mut e));
        assert!(!s.contains(g));
        // a second dispatch finds nothing
        assert!(!s.dispatch(&mut touch(12.0, 13.0)));
    }

    #[test]
    fn test_set_text_relayouts() {
        let mut s = scene();
        let t = s.create_text("ab", "t");
        let before = s.size(t);
        assert!(s.set_text(t, "abcd").unwrap());
        assert!(!s.set_text(t, "abcd").unwrap());
        assert!(s.size(t).width > before.width);
        assert!(s.text_node(t).unwrap().is_raster_dirty());

        let g = s.create_graphics("g");
        assert!(matches!(s.set_text(g, "x"), Err(SceneError::WrongKind { .. })));
    }
}
