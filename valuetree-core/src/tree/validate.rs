//! Structural validation of a node collection.
//!
//! Used when a snapshot is loaded and by tests after every mutation. Checks
//! that the collection is a single out-tree whose `displayed_children` lists
//! agree exactly with the parent links.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use super::node::{Node, NodeId};

/// Validate `nodes` and return the id of its root.
pub(crate) fn validate(nodes: &IndexMap<NodeId, Node>) -> Result<NodeId, String> {
    let mut roots = nodes.values().filter(|n| n.parent.is_none());
    let root = match (roots.next(), roots.next()) {
        (Some(root), None) => root.id.clone(),
        (None, _) => return Err("no parentless root node".into()),
        (Some(a), Some(b)) => {
            return Err(format!("more than one root (`{}` and `{}`)", a.id, b.id));
        }
    };

    let mut child_counts: HashMap<&NodeId, usize> = HashMap::new();
    for node in nodes.values() {
        if let Some(parent) = &node.parent {
            if !nodes.contains_key(parent) {
                return Err(format!("`{}` has missing parent `{parent}`", node.id));
            }
            *child_counts.entry(parent).or_default() += 1;
        }
    }

    for node in nodes.values() {
        let mut seen: HashSet<&NodeId> = HashSet::new();
        for child in &node.displayed_children {
            if !seen.insert(child) {
                return Err(format!("`{}` lists child `{child}` twice", node.id));
            }
            match nodes.get(child) {
                None => return Err(format!("`{}` lists missing child `{child}`", node.id)),
                Some(c) if c.parent.as_ref() != Some(&node.id) => {
                    return Err(format!(
                        "`{}` lists `{child}` whose parent is elsewhere",
                        node.id
                    ));
                }
                Some(_) => {}
            }
        }
        let expected = child_counts.get(&node.id).copied().unwrap_or(0);
        if seen.len() != expected {
            return Err(format!(
                "`{}` lists {} children but {expected} nodes point at it",
                node.id,
                seen.len()
            ));
        }
    }

    // Every node must reach the root. Nodes already proven to reach it end
    // later walks early.
    let mut reaches_root: HashSet<&NodeId> = HashSet::new();
    reaches_root.insert(&root);
    for node in nodes.values() {
        let mut path: Vec<&NodeId> = Vec::new();
        let mut on_path: HashSet<&NodeId> = HashSet::new();
        let mut current = node;
        while !reaches_root.contains(&current.id) {
            if !on_path.insert(&current.id) {
                return Err(format!("cycle through `{}`", current.id));
            }
            path.push(&current.id);
            // Parent existence was checked above; only the root has none.
            let Some(parent) = current.parent.as_ref().and_then(|p| nodes.get(p)) else {
                return Err(format!("`{}` does not reach the root", current.id));
            };
            current = parent;
        }
        reaches_root.extend(path);
    }

    Ok(root)
}
