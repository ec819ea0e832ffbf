//! Node Store
//!
//! The store owns the node collection and is the only code that mutates it.
//! Every operation is a complete transition: it either commits in full or
//! leaves the collection untouched.
//!
//! # Invariants
//!
//! After every operation:
//!
//! 1. Exactly one parentless root exists and it is never deleted.
//! 2. Every other node's parent is in the store.
//! 3. Each node's `displayed_children` is exactly the ordered set of nodes
//!    pointing at it, without duplicates.
//! 4. The parent relation is acyclic.
//!
//! `displayed_children` is the authoritative child order. There is no second
//! child index to keep in sync.

use std::fmt;

use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use super::error::{Change, Noop, Result, TreeError};
use super::node::{Node, NodeId};
use super::propagate;
use super::snapshot::Snapshot;
use super::validate;
use crate::colour::ColourGenerator;
use crate::config::EngineConfig;

/// The node collection: every node keyed by id, in stored order, plus the id
/// of the root.
///
/// This is the read side of the store. Committed copies of it are what the
/// controller publishes to readers.
#[derive(Debug, Clone)]
pub struct Nodes {
    map: IndexMap<NodeId, Node>,
    root: NodeId,
}

impl Nodes {
    fn with_root(root: Node) -> Self {
        let root_id = root.id.clone();
        let mut map = IndexMap::new();
        map.insert(root_id.clone(), root);
        Self { map, root: root_id }
    }

    /// Build from an already validated map.
    pub(crate) fn from_validated(map: IndexMap<NodeId, Node>, root: NodeId) -> Self {
        Self { map, root }
    }

    pub fn root_id(&self) -> &NodeId {
        &self.root
    }

    pub fn root(&self) -> &Node {
        // The root is inserted on construction and never removed.
        &self.map[&self.root]
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.map.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.map.get_mut(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.map.contains_key(id)
    }

    /// Child ids of `id` in display order.
    pub fn children(&self, id: &NodeId) -> Option<&[NodeId]> {
        self.map.get(id).map(|n| n.displayed_children.as_slice())
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Always false; the root is always present.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate nodes in stored order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.map.values()
    }

    /// Check the structural invariants.
    pub fn check_invariants(&self) -> Result<()> {
        let root = validate::validate(&self.map).map_err(TreeError::InvalidSnapshot)?;
        if root != self.root {
            return Err(TreeError::InvalidSnapshot(format!(
                "root is `{root}`, expected `{}`",
                self.root
            )));
        }
        Ok(())
    }

    /// Unlink `id` from its parent's `displayed_children`.
    ///
    /// A parent that does not list the child is tolerated.
    fn detach_from_parent(&mut self, id: &NodeId, parent: Option<&NodeId>) {
        let Some(parent_id) = parent else {
            return;
        };
        match self.map.get_mut(parent_id) {
            Some(parent) => {
                if !parent.detach_child(id) {
                    warn!(node = %id, parent = %parent_id, "parent did not list child; skipping unlink");
                }
            }
            None => warn!(node = %id, parent = %parent_id, "parent missing; skipping unlink"),
        }
    }
}

/// Owns the node collection and applies mutations to it.
pub struct NodeStore {
    nodes: Nodes,
    default_icon: String,
    colours: Box<dyn ColourGenerator>,
}

impl fmt::Debug for NodeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeStore")
            .field("nodes", &self.nodes)
            .field("default_icon", &self.default_icon)
            .finish_non_exhaustive()
    }
}

impl NodeStore {
    /// Create a store holding only the root.
    pub fn new(config: &EngineConfig, colours: impl ColourGenerator + 'static) -> Self {
        let root = Node::root(
            NodeId::new(config.root_id.clone()),
            &config.root_label,
            &config.default_icon,
        );
        Self {
            nodes: Nodes::with_root(root),
            default_icon: config.default_icon.clone(),
            colours: Box::new(colours),
        }
    }

    /// Create a store from a saved snapshot, repairing it on the way in.
    pub fn from_snapshot(
        snapshot: Snapshot,
        config: &EngineConfig,
        colours: impl ColourGenerator + 'static,
    ) -> Result<Self> {
        let mut colours: Box<dyn ColourGenerator> = Box::new(colours);
        let nodes = snapshot.into_nodes(&config.default_icon, colours.as_mut())?;
        Ok(Self {
            nodes,
            default_icon: config.default_icon.clone(),
            colours,
        })
    }

    /// Read access to the committed collection.
    pub fn nodes(&self) -> &Nodes {
        &self.nodes
    }

    #[cfg(test)]
    pub(crate) fn nodes_mut(&mut self) -> &mut Nodes {
        &mut self.nodes
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Serialize the collection for persistence.
    pub fn snapshot(&self) -> Snapshot {
        self.nodes.to_snapshot()
    }

    /// Create a node under `parent` (the root if `None`), appended after its
    /// existing children.
    ///
    /// The new node inherits the icon of its nearest value ancestor.
    pub fn add_node(&mut self, id: NodeId, parent: Option<NodeId>) -> Result<Change> {
        if self.nodes.contains(&id) {
            return Err(TreeError::DuplicateId(id));
        }
        let parent = parent.unwrap_or_else(|| self.nodes.root.clone());
        let Some(parent_node) = self.nodes.get_mut(&parent) else {
            return Err(TreeError::InvalidParent(parent));
        };
        parent_node.displayed_children.push(id.clone());

        let node = Node::new(id.clone(), Some(parent.clone()), &self.default_icon);
        self.nodes.map.insert(id.clone(), node);

        if let Some(icon) = propagate::inherited_icon(&self.nodes, &id) {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.value_icon = icon;
            }
        }

        debug!(node = %id, %parent, "added node");
        Ok(Change::Applied)
    }

    /// Delete `id` together with its whole subtree.
    ///
    /// Nodes are removed in post-order, then `id` is unlinked from its former
    /// parent. Unknown ids and the root are no-ops.
    pub fn delete_node(&mut self, id: &NodeId) -> Result<Change> {
        if !self.nodes.contains(id) {
            return Ok(Change::Unchanged(Noop::NotFound(id.clone())));
        }
        if id == &self.nodes.root {
            debug!(node = %id, "refusing to delete root");
            return Ok(Change::Unchanged(Noop::RootProtected));
        }

        let doomed = self.nodes.descendants_post_order(id);
        for victim in &doomed {
            if let Some(node) = self.nodes.map.shift_remove(victim) {
                self.nodes.detach_from_parent(victim, node.parent.as_ref());
            }
        }

        debug!(node = %id, removed = doomed.len(), "deleted subtree");
        Ok(Change::Applied)
    }

    pub fn update_label(&mut self, id: &NodeId, label: impl Into<String>) -> Result<Change> {
        let label = label.into();
        Ok(self.update(id, |node| node.label = label))
    }

    pub fn update_completed(&mut self, id: &NodeId, completed: bool) -> Result<Change> {
        Ok(self.update(id, |node| node.completed = completed))
    }

    /// Override the icon. Descendants keep whatever icon they already have.
    pub fn update_value_icon(&mut self, id: &NodeId, icon: impl Into<String>) -> Result<Change> {
        let icon = icon.into();
        Ok(self.update(id, |node| node.value_icon = icon))
    }

    /// Set the value flag. The first time a node becomes a value it is given
    /// a colour; the colour is kept across later toggles.
    pub fn update_is_value(&mut self, id: &NodeId, is_value: bool) -> Result<Change> {
        let Some(node) = self.nodes.get_mut(id) else {
            return Ok(Change::Unchanged(Noop::NotFound(id.clone())));
        };
        node.is_value = is_value;
        propagate::ensure_colour(node, self.colours.as_mut());
        trace!(node = %id, is_value, "updated value flag");
        Ok(Change::Applied)
    }

    /// Move `id` under `new_parent` at `new_index` (clamped to the end).
    ///
    /// Moving a node under itself or one of its descendants is rejected as a
    /// no-op. Moving a non-root node to no parent is an error.
    pub fn reorder_node(
        &mut self,
        id: &NodeId,
        new_parent: Option<&NodeId>,
        new_index: usize,
    ) -> Result<Change> {
        let Some(node) = self.nodes.get(id) else {
            return Ok(Change::Unchanged(Noop::NotFound(id.clone())));
        };
        let old_parent = node.parent.clone();

        let Some(new_parent) = new_parent else {
            return match old_parent {
                None => Ok(Change::Unchanged(Noop::RootProtected)),
                Some(_) => Err(TreeError::WouldDetach(id.clone())),
            };
        };
        if !self.nodes.contains(new_parent) {
            return Err(TreeError::InvalidParent(new_parent.clone()));
        }
        if self.nodes.is_descendant_of(new_parent, id) {
            debug!(node = %id, new_parent = %new_parent, "reorder rejected: would create a cycle");
            return Ok(Change::Unchanged(Noop::CycleRejected {
                id: id.clone(),
                new_parent: new_parent.clone(),
            }));
        }

        self.nodes.detach_from_parent(id, old_parent.as_ref());
        if let Some(node) = self.nodes.get_mut(id) {
            node.parent = Some(new_parent.clone());
        }
        if let Some(parent) = self.nodes.get_mut(new_parent) {
            parent.insert_child(new_index, id.clone());
        }

        trace!(node = %id, new_parent = %new_parent, new_index, "reordered node");
        Ok(Change::Applied)
    }

    /// Replace the whole collection with a loaded project.
    ///
    /// The snapshot is repaired and validated first; if it is rejected the
    /// current collection stays.
    pub fn load_project(&mut self, snapshot: Snapshot) -> Result<Change> {
        let nodes = snapshot.into_nodes(&self.default_icon, self.colours.as_mut())?;
        debug!(nodes = nodes.len(), root = %nodes.root, "loaded project");
        self.nodes = nodes;
        Ok(Change::Applied)
    }

    fn update(&mut self, id: &NodeId, apply: impl FnOnce(&mut Node)) -> Change {
        match self.nodes.get_mut(id) {
            Some(node) => {
                apply(node);
                Change::Applied
            }
            None => Change::Unchanged(Noop::NotFound(id.clone())),
        }
    }
}
