//! Controller
//!
//! The controller is the single writer. It owns the [`NodeStore`] inside a
//! tokio task and applies [`Command`]s one at a time, in the order they were
//! queued. No caller ever sees a half-applied command.
//!
//! # How It Works
//!
//! 1. Callers send a command through a [`ControllerHandle`] and wait for the
//!    reply on a oneshot channel.
//!
//! 2. The actor applies the command to the store. If it changed anything,
//!    the actor bumps the revision and publishes a copy of the committed
//!    collection.
//!
//! 3. Readers pick up the committed copy from a watch channel without going
//!    through the queue: synchronously via [`ControllerHandle::nodes`], or by
//!    awaiting changes on a subscribed receiver.
//!
//! 4. If persistence is enabled, a second task watches for new revisions and
//!    saves the latest one. Bursts of commits collapse into one save.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, trace, warn};

use super::command::Command;
use super::persist::SnapshotStore;
use crate::config::EngineConfig;
use crate::tree::{Change, NodeStore, Nodes, TreeError};

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("controller has shut down")]
    Closed,

    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// A committed state of the tree.
#[derive(Debug, Clone)]
pub struct Committed {
    /// Number of commits so far. Starts at 0 for the initial tree.
    pub revision: u64,
    pub nodes: Arc<Nodes>,
}

/// Internal requests (queued and processed by the actor).
#[derive(Debug)]
enum Request {
    Apply {
        command: Command,
        respond: oneshot::Sender<Result<Change, TreeError>>,
    },
    Shutdown,
}

/// Cheap, cloneable access to a running controller.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<Request>,
    updates: watch::Receiver<Committed>,
}

impl ControllerHandle {
    /// Queue a command and wait until it has been applied.
    #[instrument(level = "trace", skip_all, fields(kind = command.kind()))]
    pub async fn send(&self, command: Command) -> Result<Change, ControlError> {
        let (respond, reply) = oneshot::channel();
        self.tx
            .send(Request::Apply { command, respond })
            .await
            .map_err(|_| ControlError::Closed)?;
        let result = reply.await.map_err(|_| ControlError::Closed)?;
        Ok(result?)
    }

    /// The latest committed state.
    pub fn committed(&self) -> Committed {
        self.updates.borrow().clone()
    }

    /// The latest committed node collection.
    pub fn nodes(&self) -> Arc<Nodes> {
        Arc::clone(&self.updates.borrow().nodes)
    }

    pub fn revision(&self) -> u64 {
        self.updates.borrow().revision
    }

    /// A receiver that is notified after every commit.
    pub fn subscribe(&self) -> watch::Receiver<Committed> {
        self.updates.clone()
    }
}

/// A running controller and its background tasks.
#[derive(Debug)]
pub struct Controller {
    handle: ControllerHandle,
    actor: JoinHandle<()>,
    persister: Option<JoinHandle<()>>,
}

impl Controller {
    /// Start the actor. Must be called inside a tokio runtime.
    pub fn spawn(store: NodeStore, config: &EngineConfig) -> Self {
        Self::start(store, config, None)
    }

    /// Start the actor plus a task that saves every new revision to
    /// `snapshots`.
    pub fn spawn_with_persistence(
        store: NodeStore,
        config: &EngineConfig,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Self {
        Self::start(store, config, Some(snapshots))
    }

    fn start(
        store: NodeStore,
        config: &EngineConfig,
        snapshots: Option<Arc<dyn SnapshotStore>>,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<Request>(config.command_queue_capacity.max(1));
        let initial = Committed {
            revision: 0,
            nodes: Arc::new(store.nodes().clone()),
        };
        let (updates_tx, updates_rx) = watch::channel(initial);

        let persister = snapshots.map(|snapshots| tokio::spawn(persist_loop(updates_rx.clone(), snapshots)));
        let actor = tokio::spawn(actor_loop(store, rx, updates_tx));

        Self {
            handle: ControllerHandle {
                tx,
                updates: updates_rx,
            },
            actor,
            persister,
        }
    }

    pub fn handle(&self) -> ControllerHandle {
        self.handle.clone()
    }

    /// Stop accepting commands and wait for the background tasks.
    ///
    /// Commands queued before the shutdown request are still applied, and
    /// the final revision is saved before this returns.
    pub async fn shutdown(self) {
        let _ = self.handle.tx.send(Request::Shutdown).await;
        if let Err(err) = self.actor.await {
            warn!(%err, "controller task failed");
        }
        if let Some(persister) = self.persister {
            if let Err(err) = persister.await {
                warn!(%err, "persistence task failed");
            }
        }
    }
}

async fn actor_loop(
    mut store: NodeStore,
    mut rx: mpsc::Receiver<Request>,
    updates: watch::Sender<Committed>,
) {
    let mut revision = 0u64;

    while let Some(request) = rx.recv().await {
        match request {
            Request::Apply { command, respond } => {
                let kind = command.kind();
                let result = command.apply(&mut store);

                match &result {
                    Ok(Change::Applied) => {
                        revision += 1;
                        updates.send_replace(Committed {
                            revision,
                            nodes: Arc::new(store.nodes().clone()),
                        });
                        trace!(kind, revision, "committed");
                    }
                    Ok(Change::Unchanged(noop)) => debug!(kind, ?noop, "command changed nothing"),
                    Err(err) => warn!(kind, %err, "command rejected"),
                }

                // The caller may have stopped waiting.
                let _ = respond.send(result);
            }
            Request::Shutdown => break,
        }
    }

    debug!(revision, "controller stopped");
}

async fn persist_loop(mut updates: watch::Receiver<Committed>, snapshots: Arc<dyn SnapshotStore>) {
    let mut saved = updates.borrow().revision;

    loop {
        // After the actor stops there may still be one unsaved revision.
        let closed = updates.changed().await.is_err();
        let latest = updates.borrow_and_update().clone();

        if latest.revision > saved {
            let snapshot = latest.nodes.to_snapshot();
            let target = Arc::clone(&snapshots);
            match tokio::task::spawn_blocking(move || target.save(&snapshot)).await {
                Ok(Ok(())) => {
                    saved = latest.revision;
                    trace!(revision = saved, "saved snapshot");
                }
                Ok(Err(err)) => warn!(%err, revision = latest.revision, "failed to save snapshot"),
                Err(err) => warn!(%err, "snapshot save task failed"),
            }
        }

        if closed {
            break;
        }
    }
}
