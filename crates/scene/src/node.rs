//! Display nodes.

use crate::bitmap::Bitmap;
use crate::event::{Emitter, EventKind, UiEvent};
use crate::graphics::Graphics;
use crate::scene::Scene;
use crate::text_node::TextNode;
use common::{Matrix, Rect, Size};
use slotmap::new_key_type;
use smallvec::SmallVec;

new_key_type! {
    /// Handle to a node in a [`Scene`].
    pub struct NodeId;
}

/// Listener callback. Receives the scene so handlers can edit the tree.
pub type EventHandler = dyn Fn(&mut UiEvent, &mut Scene);

/// What a node draws.
#[derive(Debug)]
pub enum NodeKind {
    Container,
    Graphics(Graphics),
    Text(TextNode),
    Bitmap(Bitmap),
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Container => "container",
            NodeKind::Graphics(_) => "graphics",
            NodeKind::Text(_) => "text",
            NodeKind::Bitmap(_) => "bitmap",
        }
    }
}

/// Transform, visibility and tree links shared by every node kind.
#[derive(Debug)]
pub struct Node {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    /// Pivot as a fraction of the intrinsic size.
    pub anchor_x: f32,
    pub anchor_y: f32,
    /// Radians, clockwise on screen.
    pub rotation: f32,
    pub alpha: f32,
    pub visible: bool,
    /// Local-space clip for this node and its subtree.
    pub clip_rect: Option<Rect>,
    /// Whether [`Scene::get_bounds`] applies this node's own scale.
    pub scale_affects_size: bool,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: SmallVec<[NodeId; 4]>,
    pub(crate) kind: NodeKind,
    pub(crate) listeners: Emitter<EventKind, EventHandler>,
}

impl Node {
    pub(crate) fn new(name: &str, kind: NodeKind) -> Self {
        Self {
            name: name.to_string(),
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            anchor_x: 0.0,
            anchor_y: 0.0,
            rotation: 0.0,
            alpha: 1.0,
            visible: true,
            clip_rect: None,
            scale_affects_size: true,
            parent: None,
            children: SmallVec::new(),
            kind,
            listeners: Emitter::new(),
        }
    }

    pub fn set_position(&mut self, x: f32, y: f32) -> &mut Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn set_scale(&mut self, sx: f32, sy: f32) -> &mut Self {
        self.scale_x = sx;
        self.scale_y = sy;
        self
    }

    pub fn set_anchor(&mut self, ax: f32, ay: f32) -> &mut Self {
        self.anchor_x = ax;
        self.anchor_y = ay;
        self
    }

    pub fn set_rotation(&mut self, radians: f32) -> &mut Self {
        self.rotation = radians;
        self
    }

    pub fn set_alpha(&mut self, alpha: f32) -> &mut Self {
        self.alpha = alpha;
        self
    }

    pub fn set_visible(&mut self, visible: bool) -> &mut Self {
        self.visible = visible;
        self
    }

    pub fn set_clip_rect(&mut self, clip: Option<Rect>) -> &mut Self {
        self.clip_rect = clip;
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_container(&self) -> bool {
        matches!(self.kind, NodeKind::Container)
    }

    pub fn has_listeners(&self, kind: EventKind) -> bool {
        self.listeners.has(kind)
    }

    /// Whether the pivot depends on the intrinsic size.
    pub fn has_anchor(&self) -> bool {
        self.anchor_x != 0.0 || self.anchor_y != 0.0
    }

    /// Local transform for an intrinsic size of `size`.
    pub fn local_matrix(&self, size: Size) -> Matrix {
        self.local_matrix_scaled(size, self.scale_x, self.scale_y)
    }

    /// Translate to the anchor-corrected position; rotate and scale about
    /// the anchor only when either is not the identity.
    pub(crate) fn local_matrix_scaled(&self, size: Size, sx: f32, sy: f32) -> Matrix {
        let ax = self.anchor_x * size.width;
        let ay = self.anchor_y * size.height;
        let m = Matrix::from_translation(self.x - ax, self.y - ay);
        if self.rotation == 0.0 && sx == 1.0 && sy == 1.0 {
            return m;
        }
        m.translate(ax, ay).rotate(self.rotation).scale(sx, sy).translate(-ax, -ay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Point;

    fn node() -> Node {
        Node::new("n", NodeKind::Container)
    }

    #[test]
    fn test_translation_with_anchor() {
        let mut n = node();
        n.set_position(100.0, 50.0).set_anchor(0.5, 0.5);
        let m = n.local_matrix(Size::new(20.0, 10.0));
        assert_eq!(m.transform_point(Point::ZERO), Point::new(90.0, 45.0));
    }

    #[test]
    fn test_scale_pivots_on_anchor() {
        let mut n = node();
        n.set_position(100.0, 50.0).set_anchor(0.5, 0.5).set_scale(2.0, 2.0);
        let m = n.local_matrix(Size::new(20.0, 10.0));
        // the anchor point stays at (x, y)
        let p = m.transform_point(Point::new(10.0, 5.0));
        assert!((p.x - 100.0).abs() < 1e-4 && (p.y - 50.0).abs() < 1e-4);
        let corner = m.transform_point(Point::ZERO);
        assert!((corner.x - 80.0).abs() < 1e-4 && (corner.y - 40.0).abs() < 1e-4);
    }

    #[test]
    fn test_rotation_about_anchor() {
        let mut n = node();
        n.set_position(0.0, 0.0).set_rotation(std::f32::consts::FRAC_PI_2);
        let m = n.local_matrix(Size::new(10.0, 10.0));
        let p = m.transform_point(Point::new(1.0, 0.0));
        assert!((p.x - 0.0).abs() < 1e-5 && (p.y - 1.0).abs() < 1e-5);
    }
}
