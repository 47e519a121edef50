//! The TinyUI display tree.
//!
//! - [`Scene`]: node arena with parent/child links, transforms, bounds,
//!   hit testing and pointer dispatch
//! - node kinds: containers, [`Graphics`], [`TextNode`] and [`Bitmap`]
//! - [`UiEvent`] and the per-node listener table ([`Emitter`])

pub mod bitmap;
pub mod error;
pub mod event;
pub mod graphics;
pub mod node;
pub mod scene;
pub mod text_node;

pub use bitmap::Bitmap;
pub use error::SceneError;
pub use event::{Emitter, EventKind, ListenerId, PointerSource, UiEvent};
pub use graphics::{circle_segments, DrawCommand, Graphics, Primitive};
pub use node::{EventHandler, Node, NodeId, NodeKind};
pub use scene::Scene;
pub use text_node::TextNode;
