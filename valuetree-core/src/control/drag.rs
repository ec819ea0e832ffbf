//! Drag Reordering
//!
//! A drag gesture produces a continuous stream of hover events. Each event
//! gets a cheap local test deciding whether it should move the dragged node
//! at all. Candidates then pass through a [`Throttle`], so the store sees at
//! most one reorder per interval. The last candidate before the pointer
//! settles is still delivered.
//!
//! Just before a throttled reorder is issued, the drop target is checked
//! again against the latest committed tree. A target that disappeared in
//! the meantime (deleted by another command) drops the reorder silently.
//!
//! Pointer geometry is the host's business. A hover event only says which
//! half of the hovered row the pointer is in.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use super::command::Command;
use super::controller::{ControlError, ControllerHandle};
use super::throttle::{Clock, Throttle, TokioClock};
use crate::tree::{NodeId, Nodes};

/// Which half of the hovered row the pointer is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerHalf {
    Upper,
    Lower,
}

/// What the dragged node is currently over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoverTarget {
    /// A node row at `index` among the children of `parent`.
    Node {
        parent: Option<NodeId>,
        index: usize,
        pointer: PointerHalf,
    },
    /// The "add child" slot at the end of `parent`'s children.
    AddChild { parent: NodeId, index: usize },
}

/// A reorder that survived the local test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderRequest {
    pub id: NodeId,
    pub new_parent: Option<NodeId>,
    pub new_index: usize,
}

impl ReorderRequest {
    pub fn into_command(self) -> Command {
        Command::ReorderNode {
            id: self.id,
            new_parent_id: self.new_parent,
            new_index: self.new_index,
        }
    }
}

/// Decides whether a reorder may still be issued.
pub trait DropTargets {
    fn can_drop(&self, request: &ReorderRequest) -> bool;
}

impl DropTargets for Nodes {
    fn can_drop(&self, request: &ReorderRequest) -> bool {
        self.contains(&request.id)
            && request
                .new_parent
                .as_ref()
                .map_or(true, |parent| self.contains(parent))
    }
}

/// State of one drag gesture.
#[derive(Debug, Clone)]
pub struct DragSession {
    id: NodeId,
    /// Index of the dragged node as of the last dispatched reorder.
    index: usize,
    /// Parent when the drag started.
    origin_parent: Option<NodeId>,
    /// Parent named by the last dispatched reorder, if any.
    dispatched_parent: Option<Option<NodeId>>,
    throttle: Throttle<ReorderRequest>,
    dropped: usize,
}

impl DragSession {
    pub fn new(id: NodeId, index: usize, parent: Option<NodeId>, interval: Duration) -> Self {
        Self {
            id,
            index,
            origin_parent: parent,
            dispatched_parent: None,
            throttle: Throttle::new(interval),
            dropped: 0,
        }
    }

    /// Start dragging `id`, reading its position from `nodes`.
    pub fn begin(nodes: &Nodes, id: &NodeId, interval: Duration) -> Option<Self> {
        let node = nodes.get(id)?;
        let parent = node.parent().cloned();
        let index = parent
            .as_ref()
            .and_then(|p| nodes.children(p))
            .and_then(|siblings| siblings.iter().position(|s| s == id))
            .unwrap_or(0);
        Some(Self::new(id.clone(), index, parent, interval))
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Reorders dropped because their target was gone by dispatch time.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// When a held reorder becomes due.
    pub fn deadline(&self) -> Option<Instant> {
        self.throttle.deadline()
    }

    /// The local test: the reorder `target` asks for, or `None` if hovering
    /// there should not move anything.
    pub fn candidate(&self, target: &HoverTarget) -> Option<ReorderRequest> {
        match target {
            HoverTarget::Node {
                parent,
                index,
                pointer,
            } => {
                let current_parent = self
                    .dispatched_parent
                    .as_ref()
                    .unwrap_or(&self.origin_parent);
                if self.index == *index && current_parent == parent {
                    return None;
                }

                // Within the original list, only move once the pointer has
                // crossed the middle of the hovered row.
                if &self.origin_parent == parent {
                    match pointer {
                        PointerHalf::Upper if self.index < *index => return None,
                        PointerHalf::Lower if self.index > *index => return None,
                        _ => {}
                    }
                }

                Some(ReorderRequest {
                    id: self.id.clone(),
                    new_parent: parent.clone(),
                    new_index: *index,
                })
            }
            HoverTarget::AddChild { parent, index } => Some(ReorderRequest {
                id: self.id.clone(),
                new_parent: Some(parent.clone()),
                new_index: *index,
            }),
        }
    }

    /// Feed a hover event. Returns the reorder to issue now, if any.
    pub fn hover(
        &mut self,
        target: &HoverTarget,
        now: Instant,
        targets: &dyn DropTargets,
    ) -> Option<ReorderRequest> {
        let request = self.candidate(target)?;
        let ready = self.throttle.call(request, now)?;
        self.dispatch(ready, targets)
    }

    /// Release a held reorder whose interval has run out.
    pub fn tick(&mut self, now: Instant, targets: &dyn DropTargets) -> Option<ReorderRequest> {
        let ready = self.throttle.poll(now)?;
        self.dispatch(ready, targets)
    }

    fn dispatch(
        &mut self,
        request: ReorderRequest,
        targets: &dyn DropTargets,
    ) -> Option<ReorderRequest> {
        if !targets.can_drop(&request) {
            debug!(node = %request.id, "drop target gone; dropping reorder");
            self.dropped += 1;
            return None;
        }
        self.index = request.new_index;
        self.dispatched_parent = Some(request.new_parent.clone());
        Some(request)
    }
}

/// Counters for one driven drag gesture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DragReport {
    pub hovers: usize,
    pub dispatched: usize,
    pub dropped: usize,
}

/// How long to sleep when nothing is held; the branch is disabled anyway.
const IDLE: Duration = Duration::from_secs(3600);

/// Drive `session` from a stream of hover events until the stream closes,
/// sending reorders to the controller.
///
/// A reorder still held when the stream closes is delivered once its
/// interval runs out.
pub async fn run_drag(
    mut session: DragSession,
    mut hovers: mpsc::Receiver<HoverTarget>,
    handle: ControllerHandle,
) -> DragReport {
    let clock = TokioClock;
    let mut report = DragReport::default();
    let mut open = true;

    loop {
        let deadline = session.deadline();
        if !open && deadline.is_none() {
            break;
        }
        let wake = tokio::time::Instant::from_std(deadline.unwrap_or_else(|| clock.now() + IDLE));

        let request = tokio::select! {
            hover = hovers.recv(), if open => match hover {
                Some(target) => {
                    report.hovers += 1;
                    session.hover(&target, clock.now(), &*handle.nodes())
                }
                None => {
                    open = false;
                    None
                }
            },
            _ = tokio::time::sleep_until(wake), if deadline.is_some() => {
                session.tick(clock.now(), &*handle.nodes())
            }
        };

        let Some(request) = request else {
            continue;
        };
        match handle.send(request.into_command()).await {
            Ok(change) => {
                report.dispatched += 1;
                trace!(node = %session.id(), ?change, "drag reorder applied");
            }
            Err(ControlError::Closed) => break,
            Err(err) => {
                report.dispatched += 1;
                warn!(node = %session.id(), %err, "drag reorder rejected");
            }
        }
    }

    report.dropped = session.dropped();
    report
}
