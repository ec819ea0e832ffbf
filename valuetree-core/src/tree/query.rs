//! Ancestor and Descendant Queries
//!
//! Read-only traversals over the node collection. Every walk is iterative and
//! keeps an explicit visited set, so a corrupted parent chain terminates
//! after at most one visit per node instead of looping.

use std::collections::HashSet;

use smallvec::SmallVec;

use super::node::{Node, NodeId};
use super::store::Nodes;

/// Ancestor chain, nearest first. Most trees are shallow enough to stay
/// inline.
pub type Ancestors<'a> = SmallVec<[&'a Node; 8]>;

impl Nodes {
    /// Walk the parent chain upward from `id`, nearest ancestor first.
    ///
    /// The node itself is not included. If a node would be visited twice the
    /// walk stops and returns what it has collected so far.
    pub fn ancestors(&self, id: &NodeId) -> Ancestors<'_> {
        let mut ancestors = Ancestors::new();
        let Some(start) = self.get(id) else {
            return ancestors;
        };

        let mut visited: HashSet<&NodeId> = HashSet::new();
        visited.insert(&start.id);

        let mut current = start.parent.as_ref();
        while let Some(parent_id) = current {
            if !visited.insert(parent_id) {
                tracing::warn!(node = %id, revisited = %parent_id, "cycle in parent chain");
                break;
            }
            let Some(parent) = self.get(parent_id) else {
                break;
            };
            ancestors.push(parent);
            current = parent.parent.as_ref();
        }

        ancestors
    }

    /// Ancestors of `id` that are value nodes, nearest first.
    pub fn value_ancestors(&self, id: &NodeId) -> Ancestors<'_> {
        self.ancestors(id)
            .into_iter()
            .filter(|ancestor| ancestor.is_value)
            .collect()
    }

    /// Check whether walking up from `candidate` reaches `node`.
    ///
    /// A node counts as its own descendant. Unknown ids are descendants of
    /// nothing.
    pub fn is_descendant_of(&self, candidate: &NodeId, node: &NodeId) -> bool {
        let mut visited: HashSet<&NodeId> = HashSet::new();
        let mut current = self.get(candidate);

        while let Some(n) = current {
            if &n.id == node {
                return true;
            }
            if !visited.insert(&n.id) {
                return false;
            }
            current = n.parent.as_ref().and_then(|p| self.get(p));
        }

        false
    }

    /// Number of parent links between `id` and a parentless node.
    ///
    /// Returns `None` if `id` is not in the store.
    pub fn depth(&self, id: &NodeId) -> Option<usize> {
        let start = self.get(id)?;
        let mut visited: HashSet<&NodeId> = HashSet::new();
        visited.insert(&start.id);

        let mut depth = 0;
        let mut current = start;
        while let Some(parent_id) = current.parent.as_ref() {
            if !visited.insert(parent_id) {
                break;
            }
            let Some(parent) = self.get(parent_id) else {
                break;
            };
            depth += 1;
            current = parent;
        }

        Some(depth)
    }

    /// Depth of the deepest node.
    pub fn max_depth(&self) -> usize {
        self.iter()
            .filter_map(|node| self.depth(&node.id))
            .max()
            .unwrap_or(0)
    }

    /// The subtree rooted at `id` in post-order: every child's subtree before
    /// the child, every child before its parent, `id` last.
    ///
    /// Children are visited in display order. Returns an empty list if `id`
    /// is not in the store.
    pub fn descendants_post_order(&self, id: &NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        if !self.contains(id) {
            return order;
        }

        let mut visited: HashSet<&NodeId> = HashSet::new();
        // (node, children already pushed)
        let mut stack: Vec<(&NodeId, bool)> = vec![(id, false)];

        while let Some((node_id, expanded)) = stack.pop() {
            if expanded {
                order.push(node_id.clone());
                continue;
            }
            if !visited.insert(node_id) {
                continue;
            }
            stack.push((node_id, true));
            if let Some(node) = self.get(node_id) {
                for child in node.displayed_children.iter().rev() {
                    if self.contains(child) {
                        stack.push((child, false));
                    }
                }
            }
        }

        order
    }
}
