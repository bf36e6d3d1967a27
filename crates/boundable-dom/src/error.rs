use thiserror::Error;

use crate::tree::NodeId;

pub type Result<T> = std::result::Result<T, TreeError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("cannot insert {child} under {parent}: {child} is an ancestor of {parent}")]
    Cycle { parent: NodeId, child: NodeId },

    #[error("the tree root cannot be moved or removed")]
    RootImmovable,

    #[error("{node} has no parent")]
    NoParent { node: NodeId },

    #[error("index {index} out of bounds for {len} children")]
    IndexOutOfBounds { index: usize, len: usize },
}
