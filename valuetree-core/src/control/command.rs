//! Commands
//!
//! The command protocol is the only way to mutate the tree from outside the
//! crate. Each command names one store operation and carries its payload.
//! On the wire a command is a JSON object tagged by `type`:
//!
//! ```json
//! {"type": "reorderNode", "id": "a", "newParentId": "root", "newIndex": 0}
//! ```

use serde::{Deserialize, Serialize};

use crate::tree::{Change, NodeId, NodeStore, Result, Snapshot};

/// A named store operation with its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    AddNode {
        id: NodeId,
        #[serde(default)]
        parent_id: Option<NodeId>,
    },
    DeleteNode {
        id: NodeId,
    },
    ReorderNode {
        id: NodeId,
        new_parent_id: Option<NodeId>,
        new_index: usize,
    },
    UpdateLabel {
        id: NodeId,
        label: String,
    },
    UpdateCompleted {
        id: NodeId,
        completed: bool,
    },
    UpdateIsValue {
        id: NodeId,
        is_value: bool,
    },
    UpdateValueIcon {
        id: NodeId,
        icon: String,
    },
    LoadProject {
        nodes: Snapshot,
    },
}

impl Command {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::AddNode { .. } => "addNode",
            Command::DeleteNode { .. } => "deleteNode",
            Command::ReorderNode { .. } => "reorderNode",
            Command::UpdateLabel { .. } => "updateLabel",
            Command::UpdateCompleted { .. } => "updateCompleted",
            Command::UpdateIsValue { .. } => "updateIsValue",
            Command::UpdateValueIcon { .. } => "updateValueIcon",
            Command::LoadProject { .. } => "loadProject",
        }
    }

    /// Run the command against `store`.
    pub fn apply(self, store: &mut NodeStore) -> Result<Change> {
        match self {
            Command::AddNode { id, parent_id } => store.add_node(id, parent_id),
            Command::DeleteNode { id } => store.delete_node(&id),
            Command::ReorderNode {
                id,
                new_parent_id,
                new_index,
            } => store.reorder_node(&id, new_parent_id.as_ref(), new_index),
            Command::UpdateLabel { id, label } => store.update_label(&id, label),
            Command::UpdateCompleted { id, completed } => store.update_completed(&id, completed),
            Command::UpdateIsValue { id, is_value } => store.update_is_value(&id, is_value),
            Command::UpdateValueIcon { id, icon } => store.update_value_icon(&id, icon),
            Command::LoadProject { nodes } => store.load_project(nodes),
        }
    }
}
