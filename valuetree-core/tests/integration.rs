//! Integration Tests for the Node Tree
//!
//! These tests drive the store, the controller and the drag throttle through
//! the public API only.

use std::time::Duration;

use tokio::sync::mpsc;

use valuetree_core::colour::SequenceColours;
use valuetree_core::config::EngineConfig;
use valuetree_core::control::{
    run_drag, Command, Controller, DragSession, HoverTarget, PointerHalf,
};
use valuetree_core::tree::{Change, NodeId, NodeStore, Noop, Snapshot};

fn id(s: &str) -> NodeId {
    NodeId::new(s)
}

fn store() -> NodeStore {
    NodeStore::new(&EngineConfig::default(), SequenceColours::new())
}

fn children(store: &NodeStore, parent: &str) -> Vec<String> {
    store
        .nodes()
        .children(&id(parent))
        .unwrap_or_default()
        .iter()
        .map(ToString::to_string)
        .collect()
}

/// Root only, then two adds: children appear in insertion order.
#[test]
fn adding_appends_to_root() {
    let mut store = store();
    store.add_node(id("A"), Some(id("root"))).unwrap();
    store.add_node(id("B"), Some(id("root"))).unwrap();

    assert_eq!(children(&store, "root"), vec!["A", "B"]);
}

/// A value gets a colour, and a task created under it inherits its icon.
#[test]
fn value_colour_and_icon_inheritance() {
    let mut store = store();
    store.add_node(id("V"), Some(id("root"))).unwrap();
    store.update_is_value(&id("V"), true).unwrap();

    let v = store.get(&id("V")).unwrap();
    assert!(v.value_colour().is_some());
    let icon = v.value_icon().to_owned();

    store.add_node(id("C"), Some(id("V"))).unwrap();
    assert_eq!(store.get(&id("C")).unwrap().value_icon(), icon);
}

/// Moving a node under its own child is rejected and changes nothing.
#[test]
fn reorder_under_own_child_is_rejected() {
    let mut store = store();
    store.add_node(id("X"), Some(id("root"))).unwrap();
    store.add_node(id("Y"), Some(id("X"))).unwrap();
    let before = store.snapshot();

    let change = store.reorder_node(&id("X"), Some(&id("Y")), 0).unwrap();

    assert!(matches!(change, Change::Unchanged(Noop::CycleRejected { .. })));
    assert_eq!(store.snapshot(), before);
    assert_eq!(store.get(&id("X")).unwrap().parent(), Some(&id("root")));
    assert_eq!(store.get(&id("Y")).unwrap().parent(), Some(&id("X")));
}

/// Moving a sibling under another sibling.
#[test]
fn reorder_into_sibling() {
    let mut store = store();
    store.add_node(id("X"), Some(id("root"))).unwrap();
    store.add_node(id("Y"), Some(id("root"))).unwrap();

    store.reorder_node(&id("Y"), Some(&id("X")), 0).unwrap();

    assert_eq!(children(&store, "X"), vec!["Y"]);
    assert_eq!(children(&store, "root"), vec!["X"]);
}

/// Deleting a parent takes its children with it.
#[test]
fn delete_cascades() {
    let mut store = store();
    store.add_node(id("P"), Some(id("root"))).unwrap();
    store.add_node(id("C1"), Some(id("P"))).unwrap();
    store.add_node(id("C2"), Some(id("P"))).unwrap();

    store.delete_node(&id("P")).unwrap();

    for gone in ["P", "C1", "C2"] {
        assert!(store.get(&id(gone)).is_none());
    }
    assert!(children(&store, "root").is_empty());
}

/// Small deterministic generator so the randomized test is reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: usize) -> usize {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.0 >> 33) as usize) % bound.max(1)
    }
}

/// Random add/delete/reorder/toggle sequences keep every invariant, and
/// every reorder that would create a cycle leaves the tree untouched.
#[test]
fn random_mutations_preserve_invariants() {
    let mut rng = Lcg(0x5eed);
    let mut store = store();
    let mut next_id = 0;

    for _ in 0..2_000 {
        let ids: Vec<NodeId> = store.nodes().iter().map(|n| n.id().clone()).collect();
        let pick = |rng: &mut Lcg| ids[rng.next(ids.len())].clone();

        match rng.next(5) {
            0 | 1 => {
                next_id += 1;
                let parent = pick(&mut rng);
                store.add_node(id(&format!("n{next_id}")), Some(parent)).unwrap();
            }
            2 => {
                if rng.next(4) == 0 {
                    store.delete_node(&pick(&mut rng)).unwrap();
                }
            }
            3 => {
                let node = pick(&mut rng);
                let parent = pick(&mut rng);
                let index = rng.next(6);
                let would_cycle = store.nodes().is_descendant_of(&parent, &node);
                let before = store.snapshot();

                let change = store.reorder_node(&node, Some(&parent), index).unwrap();
                if would_cycle {
                    assert!(!change.is_applied());
                    assert_eq!(store.snapshot(), before);
                } else {
                    assert!(change.is_applied());
                    let siblings = store.nodes().children(&parent).unwrap();
                    assert_eq!(siblings.iter().filter(|c| **c == node).count(), 1);
                }
            }
            _ => {
                let node = pick(&mut rng);
                let before = store.get(&node).unwrap().value_colour().cloned();
                store.update_is_value(&node, true).unwrap();
                let after = store.get(&node).unwrap().value_colour().cloned();
                assert!(after.is_some());
                if before.is_some() {
                    assert_eq!(before, after);
                }
            }
        }

        store.nodes().check_invariants().unwrap();
        for node in store.nodes().iter() {
            let ancestors = store.nodes().ancestors(node.id());
            assert!(ancestors.len() < store.nodes().len());
        }
    }
}

/// A saved project reloads into an identical tree.
#[test]
fn snapshot_round_trip_through_json() {
    let mut store = store();
    store.add_node(id("v"), None).unwrap();
    store.update_is_value(&id("v"), true).unwrap();
    store.update_label(&id("v"), "Health").unwrap();
    store.add_node(id("t"), Some(id("v"))).unwrap();
    store.update_completed(&id("t"), true).unwrap();

    let json = store.snapshot().to_json().unwrap();
    let reloaded = NodeStore::from_snapshot(
        Snapshot::from_json(&json).unwrap(),
        &EngineConfig::default(),
        SequenceColours::new(),
    )
    .unwrap();

    assert_eq!(reloaded.snapshot(), store.snapshot());
}

/// A whole drag gesture, end to end: hovers queue up faster than the
/// interval, the first reorder goes out at once and the last one goes out
/// after the interval.
#[tokio::test(start_paused = true)]
async fn drag_gesture_through_controller() {
    let mut initial = store();
    for n in ["a", "b", "c"] {
        initial.add_node(id(n), None).unwrap();
    }
    let config = EngineConfig::default();
    let controller = Controller::spawn(initial, &config);
    let handle = controller.handle();

    let session = DragSession::begin(&handle.nodes(), &id("a"), config.reorder_interval()).unwrap();
    let (tx, rx) = mpsc::channel(16);
    let hovers = [
        HoverTarget::Node {
            parent: Some(id("root")),
            index: 1,
            pointer: PointerHalf::Lower,
        },
        HoverTarget::Node {
            parent: Some(id("root")),
            index: 2,
            pointer: PointerHalf::Lower,
        },
        HoverTarget::AddChild {
            parent: id("c"),
            index: 0,
        },
    ];
    for hover in hovers {
        tx.send(hover).await.unwrap();
    }
    drop(tx);

    let started = tokio::time::Instant::now();
    let report = run_drag(session, rx, handle.clone()).await;

    assert_eq!(report.hovers, 3);
    assert_eq!(report.dispatched, 2);
    assert_eq!(report.dropped, 0);
    assert!(started.elapsed() >= Duration::from_millis(500));

    let nodes = handle.nodes();
    let root: Vec<_> = nodes.root().displayed_children().iter().map(NodeId::as_str).collect();
    assert_eq!(root, vec!["b", "c"]);
    assert_eq!(nodes.children(&id("c")).unwrap(), &[id("a")]);
    nodes.check_invariants().unwrap();

    controller.shutdown().await;
}

/// A drag that targets a node deleted mid-gesture drops the held reorder.
#[tokio::test(start_paused = true)]
async fn drag_onto_deleted_target_is_dropped() {
    let mut initial = store();
    for n in ["a", "x"] {
        initial.add_node(id(n), None).unwrap();
    }
    let config = EngineConfig::default();
    let controller = Controller::spawn(initial, &config);
    let handle = controller.handle();

    let session = DragSession::begin(&handle.nodes(), &id("a"), config.reorder_interval()).unwrap();
    let (tx, rx) = mpsc::channel(16);
    let drag = tokio::spawn(run_drag(session, rx, handle.clone()));

    tx.send(HoverTarget::Node {
        parent: Some(id("root")),
        index: 1,
        pointer: PointerHalf::Lower,
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(HoverTarget::AddChild {
        parent: id("x"),
        index: 0,
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    handle.send(Command::DeleteNode { id: id("x") }).await.unwrap();
    drop(tx);

    let report = drag.await.unwrap();
    assert_eq!(report.dispatched, 1);
    assert_eq!(report.dropped, 1);
    assert_eq!(handle.nodes().root().displayed_children(), &[id("a")]);

    controller.shutdown().await;
}
