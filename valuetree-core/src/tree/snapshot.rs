//! Persisted Snapshots
//!
//! A snapshot is the ordered list of node records that gets saved and
//! loaded. Records are lenient on the way in: anything missing takes its
//! default, child lists can be rebuilt from parent links, and records written
//! with the older `parents: [id]` shape are read as single-parent.
//!
//! Loading runs a repair pass and then validates the result:
//!
//! 1. Every child list is reconciled with the parent links. Ids that are
//!    unknown, repeated, or whose node names another parent are dropped.
//!    Children missing from the list are appended in stored order, so a
//!    node without `displayedChildren` gets all of them.
//! 2. The collection must form a single tree (see `validate`).
//! 3. A value node without a colour is given one.
//!
//! Repair is idempotent: loading a snapshot that was just saved changes
//! nothing.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::error::{Result, TreeError};
use super::node::{Node, NodeId};
use super::propagate;
use super::store::Nodes;
use super::validate;
use crate::colour::{Colour, ColourGenerator};

/// One node as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub id: NodeId,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub is_value: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_colour: Option<Colour>,
    #[serde(default)]
    pub parent: Option<NodeId>,
    /// Older single-element parent list. Only the first entry is read, and
    /// it may be null.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parents: Option<Vec<Option<NodeId>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displayed_children: Option<Vec<NodeId>>,
}

impl NodeRecord {
    /// A record with only an id and a parent; everything else defaulted.
    pub fn new(id: impl Into<NodeId>, parent: Option<NodeId>) -> Self {
        Self {
            id: id.into(),
            label: String::new(),
            completed: false,
            is_value: false,
            value_icon: None,
            value_colour: None,
            parent,
            parents: None,
            displayed_children: None,
        }
    }

    fn resolved_parent(&self) -> Option<NodeId> {
        self.parent.clone().or_else(|| {
            self.parents
                .as_ref()
                .and_then(|parents| parents.first().cloned().flatten())
        })
    }
}

impl From<&Node> for NodeRecord {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            label: node.label.clone(),
            completed: node.completed,
            is_value: node.is_value,
            value_icon: Some(node.value_icon.clone()),
            value_colour: node.value_colour.clone(),
            parent: node.parent.clone(),
            parents: None,
            displayed_children: Some(node.displayed_children.clone()),
        }
    }
}

/// An ordered sequence of node records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    nodes: Vec<NodeRecord>,
}

impl Snapshot {
    pub fn new(nodes: Vec<NodeRecord>) -> Self {
        Self { nodes }
    }

    pub fn records(&self) -> &[NodeRecord] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encode as MessagePack, with field names so optional fields can be
    /// omitted.
    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    /// Repair and validate the records, producing a node collection.
    ///
    /// Colours are only generated once the structure has been accepted.
    pub(crate) fn into_nodes(
        self,
        default_icon: &str,
        colours: &mut dyn ColourGenerator,
    ) -> Result<Nodes> {
        if self.nodes.is_empty() {
            return Err(TreeError::InvalidSnapshot("snapshot has no nodes".into()));
        }

        let mut seen: HashSet<&NodeId> = HashSet::new();
        if let Some(dup) = self.nodes.iter().find(|r| !seen.insert(&r.id)) {
            return Err(TreeError::InvalidSnapshot(format!("duplicate node `{}`", dup.id)));
        }

        let parents: Vec<Option<NodeId>> = self.nodes.iter().map(NodeRecord::resolved_parent).collect();
        let reconciled: Vec<Vec<NodeId>> = {
            let parent_of: HashMap<&NodeId, Option<&NodeId>> = self
                .nodes
                .iter()
                .zip(&parents)
                .map(|(record, parent)| (&record.id, parent.as_ref()))
                .collect();
            let mut children_of: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();
            for (record, parent) in self.nodes.iter().zip(&parents) {
                if let Some(parent) = parent {
                    children_of.entry(parent).or_default().push(&record.id);
                }
            }

            self.nodes
                .iter()
                .map(|record| {
                    reconcile_children(
                        record,
                        &parent_of,
                        children_of.get(&record.id).map(Vec::as_slice).unwrap_or_default(),
                    )
                })
                .collect()
        };

        let mut map: IndexMap<NodeId, Node> = IndexMap::with_capacity(self.nodes.len());
        for ((record, parent), displayed_children) in self.nodes.into_iter().zip(parents).zip(reconciled) {
            let node = Node {
                id: record.id.clone(),
                label: record.label,
                completed: record.completed,
                is_value: record.is_value,
                value_icon: record.value_icon.unwrap_or_else(|| default_icon.to_owned()),
                value_colour: record.value_colour,
                parent,
                displayed_children,
            };
            map.insert(record.id, node);
        }

        let root = validate::validate(&map).map_err(TreeError::InvalidSnapshot)?;

        let mut repaired = 0;
        for node in map.values_mut() {
            if propagate::ensure_colour(node, colours) {
                repaired += 1;
            }
        }
        if repaired > 0 {
            tracing::debug!(repaired, "assigned colours to value nodes while loading");
        }

        Ok(Nodes::from_validated(map, root))
    }
}

/// The child list `record` should have, given every node's parent link.
///
/// A stored list is kept in its order as far as it agrees with the links.
/// `linked` is every node pointing at `record`, in stored order.
fn reconcile_children(
    record: &NodeRecord,
    parent_of: &HashMap<&NodeId, Option<&NodeId>>,
    linked: &[&NodeId],
) -> Vec<NodeId> {
    let Some(stored) = &record.displayed_children else {
        return linked.iter().map(|&id| id.clone()).collect();
    };

    let mut kept: Vec<NodeId> = Vec::with_capacity(linked.len());
    let mut seen: HashSet<&NodeId> = HashSet::new();
    for child in stored {
        if parent_of.get(child) != Some(&Some(&record.id)) {
            warn!(node = %record.id, %child, "dropping child that does not point back");
            continue;
        }
        if !seen.insert(child) {
            warn!(node = %record.id, %child, "dropping repeated child");
            continue;
        }
        kept.push(child.clone());
    }
    for &child in linked {
        if seen.insert(child) {
            warn!(node = %record.id, %child, "appending child missing from list");
            kept.push(child.clone());
        }
    }
    kept
}

impl Nodes {
    /// Records for every node, in stored order.
    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot::new(self.iter().map(NodeRecord::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colour::SequenceColours;

    fn load(snapshot: Snapshot) -> Result<Nodes> {
        snapshot.into_nodes("⭐", &mut SequenceColours::new())
    }

    #[test]
    fn rebuilds_missing_child_lists_in_stored_order() {
        let json = r#"[
            {"id": "root", "label": "Root", "parent": null},
            {"id": "b", "parent": "root"},
            {"id": "a", "parent": "root"},
            {"id": "c", "parent": "a"}
        ]"#;
        let nodes = load(Snapshot::from_json(json).unwrap()).unwrap();

        let root_children: Vec<_> = nodes.root().displayed_children().iter().map(NodeId::as_str).collect();
        assert_eq!(root_children, vec!["b", "a"]);
        assert_eq!(nodes.children(&NodeId::new("a")).unwrap(), &[NodeId::new("c")]);
        assert_eq!(nodes.get(&NodeId::new("c")).unwrap().value_icon(), "⭐");
    }

    #[test]
    fn keeps_stored_child_order() {
        let json = r#"[
            {"id": "root", "parent": null, "displayedChildren": ["a", "b"]},
            {"id": "b", "parent": "root", "displayedChildren": []},
            {"id": "a", "parent": "root", "displayedChildren": []}
        ]"#;
        let nodes = load(Snapshot::from_json(json).unwrap()).unwrap();
        let root_children: Vec<_> = nodes.root().displayed_children().iter().map(NodeId::as_str).collect();
        assert_eq!(root_children, vec!["a", "b"]);
    }

    #[test]
    fn reads_legacy_parent_lists() {
        let json = r#"[
            {"id": "root", "label": "Root", "parents": []},
            {"id": "a", "parents": ["root"], "label": "Task"}
        ]"#;
        let nodes = load(Snapshot::from_json(json).unwrap()).unwrap();
        assert_eq!(nodes.get(&NodeId::new("a")).unwrap().parent(), Some(&NodeId::new("root")));
        assert_eq!(nodes.root().displayed_children(), &[NodeId::new("a")]);
    }

    #[test]
    fn stale_child_lists_are_reconciled() {
        // `b` points at root but is missing from its list. Root also lists
        // a node that no longer exists, `a` twice, and `c`, which moved.
        let json = r#"[
            {"id": "root", "parents": [], "displayedChildren": ["ghost", "a", "c", "a"]},
            {"id": "a", "parents": ["root"], "displayedChildren": ["c"]},
            {"id": "b", "parents": ["root"]},
            {"id": "c", "parents": ["a"], "displayedChildren": []}
        ]"#;
        let nodes = load(Snapshot::from_json(json).unwrap()).unwrap();

        let root_children: Vec<_> = nodes.root().displayed_children().iter().map(NodeId::as_str).collect();
        assert_eq!(root_children, vec!["a", "b"]);
        assert_eq!(nodes.children(&NodeId::new("a")).unwrap(), &[NodeId::new("c")]);
        nodes.check_invariants().unwrap();
    }

    #[test]
    fn legacy_list_missing_a_child_still_loads() {
        let json = r#"[
            {"id": "root", "parents": [], "displayedChildren": ["a"]},
            {"id": "a", "parents": ["root"]},
            {"id": "b", "parents": ["root"]}
        ]"#;
        let nodes = load(Snapshot::from_json(json).unwrap()).unwrap();
        assert_eq!(nodes.root().displayed_children(), &[NodeId::new("a"), NodeId::new("b")]);
    }

    #[test]
    fn legacy_null_parent_entry_reads_as_parentless() {
        let json = r#"[
            {"id": "root", "parents": [null]},
            {"id": "a", "parents": ["root"]}
        ]"#;
        let snapshot = Snapshot::from_json(json).unwrap();
        assert_eq!(snapshot.records()[0].resolved_parent(), None);
        let nodes = load(snapshot).unwrap();
        assert_eq!(nodes.root_id(), &NodeId::new("root"));

        // A second parentless node is a structural error, not a decode error.
        let two_roots = r#"[{"id": "root", "parents": [null]}, {"id": "x", "parents": [null]}]"#;
        let result = load(Snapshot::from_json(two_roots).unwrap());
        assert!(matches!(result, Err(TreeError::InvalidSnapshot(_))));
    }

    #[test]
    fn assigns_missing_value_colours() {
        let json = r##"[
            {"id": "root", "parent": null},
            {"id": "v", "parent": "root", "isValue": true},
            {"id": "w", "parent": "root", "isValue": true, "valueColour": "#123456"}
        ]"##;
        let nodes = load(Snapshot::from_json(json).unwrap()).unwrap();
        assert_eq!(
            nodes.get(&NodeId::new("v")).unwrap().value_colour(),
            Some(&Colour::new("#000001"))
        );
        assert_eq!(
            nodes.get(&NodeId::new("w")).unwrap().value_colour(),
            Some(&Colour::new("#123456"))
        );
    }

    #[test]
    fn repair_is_idempotent() {
        let json = r#"[
            {"id": "root", "parent": null},
            {"id": "v", "parent": "root", "isValue": true},
            {"id": "t", "parent": "v"}
        ]"#;
        let once = load(Snapshot::from_json(json).unwrap()).unwrap().to_snapshot();
        let twice = load(once.clone()).unwrap().to_snapshot();
        assert_eq!(once, twice);
    }

    #[test]
    fn rejects_malformed_snapshots() {
        let cases = [
            r#"[]"#,
            r#"[{"id": "root"}, {"id": "root"}]"#,
            r#"[{"id": "root"}, {"id": "a", "parent": "ghost"}]"#,
            r#"[{"id": "root"}, {"id": "other"}]"#,
        ];
        for json in cases {
            let result = load(Snapshot::from_json(json).unwrap());
            assert!(
                matches!(result, Err(TreeError::InvalidSnapshot(_))),
                "accepted {json}"
            );
        }
    }

    #[test]
    fn no_colours_spent_on_rejected_snapshots() {
        let json = r#"[{"id": "root", "isValue": true}, {"id": "x", "isValue": true}]"#;
        let mut colours = SequenceColours::new();
        assert!(Snapshot::from_json(json).unwrap().into_nodes("⭐", &mut colours).is_err());
        assert_eq!(colours.issued(), 0);
    }

    #[test]
    fn msgpack_preserves_records() {
        let mut record = NodeRecord::new("root", None);
        record.label = "Root".into();
        record.displayed_children = Some(vec![NodeId::new("a")]);
        let mut child = NodeRecord::new("a", Some(NodeId::new("root")));
        child.is_value = true;
        child.value_colour = Some(Colour::new("#abcdef"));
        let snapshot = Snapshot::new(vec![record, child]);

        let bytes = snapshot.to_msgpack().unwrap();
        assert_eq!(Snapshot::from_msgpack(&bytes).unwrap(), snapshot);
    }
}
