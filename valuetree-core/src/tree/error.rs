//! Errors and operation outcomes for the node store.

use thiserror::Error;

use super::node::NodeId;

/// Errors that reject a store operation.
///
/// A rejected operation leaves the store exactly as it was.
#[derive(Debug, Error)]
pub enum TreeError {
    /// `add_node` or `reorder_node` named a parent that is not in the store.
    #[error("parent node `{0}` does not exist")]
    InvalidParent(NodeId),

    /// `add_node` was given an id that is already taken.
    #[error("node `{0}` already exists")]
    DuplicateId(NodeId),

    /// A non-root node was moved to no parent, which would leave two roots.
    #[error("node `{0}` cannot be detached from the tree")]
    WouldDetach(NodeId),

    /// A loaded snapshot does not describe a single well-formed tree.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("snapshot json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot msgpack encode: {0}")]
    MsgpackEncode(#[from] rmp_serde::encode::Error),

    #[error("snapshot msgpack decode: {0}")]
    MsgpackDecode(#[from] rmp_serde::decode::Error),
}

pub type Result<T> = std::result::Result<T, TreeError>;

/// What a store operation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// The operation committed.
    Applied,
    /// The operation was accepted but changed nothing.
    Unchanged(Noop),
}

impl Change {
    pub fn is_applied(&self) -> bool {
        matches!(self, Change::Applied)
    }
}

/// Why an operation was a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Noop {
    /// The operation referenced a node that no longer exists. Expected when a
    /// request races with the deletion of its target.
    NotFound(NodeId),
    /// The reorder would have made a node a child of itself or of one of its
    /// descendants.
    CycleRejected { id: NodeId, new_parent: NodeId },
    /// The root cannot be deleted or moved.
    RootProtected,
}
