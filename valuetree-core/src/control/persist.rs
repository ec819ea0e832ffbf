//! Snapshot persistence.
//!
//! Where snapshots live is up to the host. The crate only defines the
//! [`SnapshotStore`] capability, the byte encodings, and an in-memory store.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use thiserror::Error;

use crate::colour::ColourGenerator;
use crate::config::EngineConfig;
use crate::tree::{NodeStore, Snapshot, TreeError};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("snapshot backend: {0}")]
    Backend(String),
}

/// Somewhere snapshots can be saved to and loaded from.
pub trait SnapshotStore: Send + Sync {
    /// The most recently saved snapshot, if any.
    fn load(&self) -> Result<Option<Snapshot>, PersistError>;

    fn save(&self, snapshot: &Snapshot) -> Result<(), PersistError>;
}

/// Byte encoding for snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Json,
    MessagePack,
}

impl Encoding {
    pub fn encode(self, snapshot: &Snapshot) -> Result<Vec<u8>, TreeError> {
        match self {
            Encoding::Json => Ok(snapshot.to_json()?.into_bytes()),
            Encoding::MessagePack => snapshot.to_msgpack(),
        }
    }

    pub fn decode(self, bytes: &[u8]) -> Result<Snapshot, TreeError> {
        match self {
            Encoding::Json => Ok(serde_json::from_slice(bytes)?),
            Encoding::MessagePack => Snapshot::from_msgpack(bytes),
        }
    }
}

/// Keeps the latest encoded snapshot in memory.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    encoding: Encoding,
    bytes: Mutex<Option<Vec<u8>>>,
    saves: AtomicUsize,
}

impl MemorySnapshotStore {
    pub fn new(encoding: Encoding) -> Self {
        Self {
            encoding,
            bytes: Mutex::new(None),
            saves: AtomicUsize::new(0),
        }
    }

    /// Start out holding `snapshot`, as if it had been saved earlier.
    pub fn with_snapshot(encoding: Encoding, snapshot: &Snapshot) -> Result<Self, PersistError> {
        let store = Self::new(encoding);
        *store.bytes.lock() = Some(encoding.encode(snapshot)?);
        Ok(store)
    }

    /// Number of successful saves.
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> Result<Option<Snapshot>, PersistError> {
        let bytes = self.bytes.lock();
        match bytes.as_deref() {
            Some(bytes) => Ok(Some(self.encoding.decode(bytes)?)),
            None => Ok(None),
        }
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), PersistError> {
        let encoded = self.encoding.encode(snapshot)?;
        *self.bytes.lock() = Some(encoded);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Open the saved project, or start a root-only tree if nothing was saved.
pub fn open_store(
    snapshots: &dyn SnapshotStore,
    config: &EngineConfig,
    colours: impl ColourGenerator + 'static,
) -> Result<NodeStore, PersistError> {
    match snapshots.load()? {
        Some(snapshot) => {
            tracing::debug!(records = snapshot.len(), "opening saved project");
            Ok(NodeStore::from_snapshot(snapshot, config, colours)?)
        }
        None => Ok(NodeStore::new(config, colours)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colour::SequenceColours;
    use crate::tree::NodeId;

    fn sample() -> NodeStore {
        let mut store = NodeStore::new(&EngineConfig::default(), SequenceColours::new());
        store.add_node(NodeId::new("v"), None).unwrap();
        store.update_is_value(&NodeId::new("v"), true).unwrap();
        store.add_node(NodeId::new("t"), Some(NodeId::new("v"))).unwrap();
        store
    }

    #[test]
    fn empty_store_opens_root_only() {
        let snapshots = MemorySnapshotStore::new(Encoding::Json);
        let store = open_store(&snapshots, &EngineConfig::default(), SequenceColours::new()).unwrap();
        assert_eq!(store.nodes().len(), 1);
    }

    #[test]
    fn saved_project_reopens_in_both_encodings() {
        let original = sample();
        for encoding in [Encoding::Json, Encoding::MessagePack] {
            let snapshots = MemorySnapshotStore::new(encoding);
            snapshots.save(&original.snapshot()).unwrap();
            assert_eq!(snapshots.saves(), 1);

            let reopened =
                open_store(&snapshots, &EngineConfig::default(), SequenceColours::new()).unwrap();
            assert_eq!(reopened.snapshot(), original.snapshot());
        }
    }

    #[test]
    fn project_with_stale_child_list_still_opens() {
        let saved = Snapshot::from_json(
            r#"[
                {"id": "root", "label": "Root", "parents": [], "displayedChildren": ["a"]},
                {"id": "a", "parents": ["root"], "displayedChildren": []},
                {"id": "b", "parents": ["root"], "displayedChildren": []}
            ]"#,
        )
        .unwrap();
        let snapshots = MemorySnapshotStore::with_snapshot(Encoding::MessagePack, &saved).unwrap();
        assert_eq!(snapshots.saves(), 0);

        let store = open_store(&snapshots, &EngineConfig::default(), SequenceColours::new()).unwrap();
        assert_eq!(
            store.nodes().root().displayed_children(),
            &[NodeId::new("a"), NodeId::new("b")]
        );
        store.nodes().check_invariants().unwrap();
    }

    #[test]
    fn corrupt_bytes_surface_as_errors() {
        let snapshots = MemorySnapshotStore::new(Encoding::Json);
        *snapshots.bytes.lock() = Some(b"not json".to_vec());
        assert!(matches!(
            snapshots.load(),
            Err(PersistError::Tree(TreeError::Json(_)))
        ));
    }
}
