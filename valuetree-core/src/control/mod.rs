//! Control Layer
//!
//! Everything between the outside world and the [`NodeStore`](crate::tree::NodeStore):
//!
//! - `command`: the command protocol, the only way to request a mutation
//! - `controller`: the single-writer actor that applies commands in order and
//!   publishes committed state
//! - `throttle`: a general rate limiter with leading and trailing delivery
//! - `drag`: turns a stream of drag-hover events into throttled reorders
//! - `persist`: the snapshot storage capability and its encodings
//!
//! # Concurrency
//!
//! The store is owned by exactly one task. Other tasks hold a
//! [`ControllerHandle`] and either queue commands or read the last committed
//! copy of the tree. Reads never wait on writes.

mod command;
mod controller;
mod drag;
mod persist;
mod throttle;

pub use command::Command;
pub use controller::{Committed, ControlError, Controller, ControllerHandle};
pub use drag::{run_drag, DragReport, DragSession, DropTargets, HoverTarget, PointerHalf, ReorderRequest};
pub use persist::{open_store, Encoding, MemorySnapshotStore, PersistError, SnapshotStore};
pub use throttle::{Clock, ManualClock, SystemClock, Throttle, TokioClock};
