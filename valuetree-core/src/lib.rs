//! Valuetree Core
//!
//! This crate provides the tree-mutation engine behind a hierarchical planner
//! of tasks and values. It implements:
//!
//! - A node store with guarded create, update, delete and reorder operations
//! - Ancestor and descendant queries that terminate on corrupted input
//! - Derived attributes: inherited icons and lazily assigned value colours
//! - A single-writer controller that serializes commands
//! - A throttle that turns drag-hover streams into a bounded run of reorders
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `tree`: nodes, the store, queries, and persisted snapshots
//! - `control`: commands, the controller actor, drag throttling, persistence
//! - `colour`: the colour generator capability
//! - `config`: engine tunables
//!
//! # Example
//!
//! ```rust,ignore
//! use valuetree_core::{colour::GoldenRatioColours, config::EngineConfig};
//! use valuetree_core::tree::{NodeId, NodeStore};
//!
//! let config = EngineConfig::default();
//! let mut store = NodeStore::new(&config, GoldenRatioColours::new());
//!
//! let health = NodeId::new("health");
//! store.add_node(health.clone(), None)?;
//! store.update_is_value(&health, true)?;
//! store.update_value_icon(&health, "💪")?;
//!
//! // New tasks under a value pick up its icon.
//! store.add_node(NodeId::new("run"), Some(health.clone()))?;
//! assert_eq!(store.get(&NodeId::new("run")).unwrap().value_icon(), "💪");
//! ```

pub mod colour;
pub mod config;
pub mod control;
pub mod tree;
