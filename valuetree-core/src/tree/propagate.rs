//! Derived attribute propagation.
//!
//! Two attributes are derived rather than set directly: a new node inherits
//! the icon of its nearest value ancestor, and a value node gets a colour the
//! first time it becomes a value. Both happen exactly once. Later edits to
//! ancestors never reach back into existing nodes.

use super::node::{Node, NodeId};
use super::store::Nodes;
use crate::colour::ColourGenerator;

/// Icon inherited by `id` from its nearest value ancestor, if it has one.
pub(crate) fn inherited_icon(nodes: &Nodes, id: &NodeId) -> Option<String> {
    nodes
        .value_ancestors(id)
        .first()
        .map(|ancestor| ancestor.value_icon.clone())
}

/// Give a value node its colour if it does not have one yet.
///
/// Returns true if a colour was generated.
pub(crate) fn ensure_colour(node: &mut Node, colours: &mut dyn ColourGenerator) -> bool {
    if !node.is_value || node.value_colour.is_some() {
        return false;
    }
    let colour = colours.generate();
    tracing::trace!(node = %node.id, %colour, "assigned value colour");
    node.value_colour = Some(colour);
    true
}
