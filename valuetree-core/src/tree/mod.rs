//! Node Tree
//!
//! This module implements the tree of tasks and values that a user edits.
//!
//! # Overview
//!
//! The tree is a flat collection of nodes linked by single-parent references:
//!
//! - Each node names at most one parent; only the root has none
//! - Each node keeps an ordered `displayed_children` list, which is the
//!   authoritative record of its children and their order
//!
//! All mutation goes through [`NodeStore`]. Queries over ancestors and
//! descendants live on [`Nodes`], the read side of the store, and never
//! mutate anything.
//!
//! # Design Decisions
//!
//! 1. Nodes are kept in an `IndexMap` keyed by id. Lookups are O(1) and the
//!    stored order is stable, so a saved snapshot lists nodes in the order
//!    they were created.
//!
//! 2. Parent links and child lists are both stored. The store updates them
//!    together in every operation; `validate` checks they agree.
//!
//! 3. Walks over the parent chain are iterative with a visited set, so a
//!    corrupted chain cannot hang a query.

mod error;
mod node;
mod propagate;
mod query;
mod snapshot;
mod store;
mod validate;

pub use error::{Change, Noop, Result, TreeError};
pub use node::{Node, NodeId};
pub use query::Ancestors;
pub use snapshot::{NodeRecord, Snapshot};
pub use store::{NodeStore, Nodes};
