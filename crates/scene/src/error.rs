//! Scene graph errors.

use crate::node::NodeId;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SceneError {
    #[error("node {0:?} does not exist")]
    NotFound(NodeId),

    #[error("node {0:?} is not a container")]
    NotAContainer(NodeId),

    #[error("cannot add {child:?} to {parent:?}: it is the parent or one of its ancestors")]
    Cycle { parent: NodeId, child: NodeId },

    #[error("the root node cannot be moved or destroyed")]
    Root,

    #[error("node {id:?} is a {actual}, expected {expected}")]
    WrongKind {
        id: NodeId,
        expected: &'static str,
        actual: &'static str,
    },
}
