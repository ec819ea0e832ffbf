//! Tree Nodes
//!
//! This module defines the node type that lives in the tree, together with
//! its identifier.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::colour::Colour;

/// Unique identifier for a node in the tree.
///
/// Identifiers are opaque strings. Callers may bring their own (ids read from
/// a saved project) or ask for a fresh one with [`NodeId::generate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new identifier, unique within this process.
    ///
    /// The prefix is derived from the process start time so ids generated by
    /// different sessions of the same project do not collide.
    pub fn generate() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        static SESSION: OnceLock<u64> = OnceLock::new();

        let session = *SESSION.get_or_init(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or_default()
        });
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("{session:x}-{n:x}"))
    }

    /// Get the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A task or value marker in the tree.
///
/// Fields are only mutated by the [`NodeStore`](super::NodeStore); everything
/// outside the crate reads them through accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) label: String,
    /// Only meaningful while `is_value` is false.
    pub(crate) completed: bool,
    pub(crate) is_value: bool,
    pub(crate) value_icon: String,
    /// Set the first time the node becomes a value, never reassigned.
    pub(crate) value_colour: Option<Colour>,
    /// `None` only for the root.
    pub(crate) parent: Option<NodeId>,
    /// Authoritative child ordering.
    pub(crate) displayed_children: Vec<NodeId>,
}

impl Node {
    /// Create a node with default attributes under `parent`.
    pub(crate) fn new(id: NodeId, parent: Option<NodeId>, default_icon: &str) -> Self {
        Self {
            id,
            label: String::new(),
            completed: false,
            is_value: false,
            value_icon: default_icon.to_owned(),
            value_colour: None,
            parent,
            displayed_children: Vec::new(),
        }
    }

    /// Create a parentless root node.
    pub(crate) fn root(id: NodeId, label: &str, default_icon: &str) -> Self {
        let mut node = Self::new(id, None, default_icon);
        node.label = label.to_owned();
        node
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    /// Whether this node is a value (goal/category) rather than a task.
    pub fn is_value(&self) -> bool {
        self.is_value
    }

    pub fn value_icon(&self) -> &str {
        &self.value_icon
    }

    pub fn value_colour(&self) -> Option<&Colour> {
        self.value_colour.as_ref()
    }

    /// The parent's id, or `None` for the root.
    pub fn parent(&self) -> Option<&NodeId> {
        self.parent.as_ref()
    }

    /// Child ids in display order.
    pub fn displayed_children(&self) -> &[NodeId] {
        &self.displayed_children
    }

    /// Check if this node has no parent.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Remove `child` from the displayed children.
    ///
    /// Returns false if the child was not listed.
    pub(crate) fn detach_child(&mut self, child: &NodeId) -> bool {
        match self.displayed_children.iter().position(|c| c == child) {
            Some(pos) => {
                self.displayed_children.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Insert `child` at `index`, clamped to the end of the list.
    pub(crate) fn insert_child(&mut self, index: usize, child: NodeId) {
        let index = index.min(self.displayed_children.len());
        self.displayed_children.insert(index, child);
    }
}
