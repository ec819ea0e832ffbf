//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object is a valid
//! configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for the store and the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Id given to the root of a fresh tree.
    pub root_id: String,
    /// Label of the root of a fresh tree.
    pub root_label: String,
    /// Icon for new nodes that have no value ancestor.
    pub default_icon: String,
    /// Minimum spacing between reorders dispatched during one drag.
    pub reorder_interval_ms: u64,
    /// Commands that may wait in the controller queue before senders block.
    pub command_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root_id: "root".to_owned(),
            root_label: "Root".to_owned(),
            default_icon: "⭐".to_owned(),
            reorder_interval_ms: 500,
            command_queue_capacity: 256,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn reorder_interval(&self) -> Duration {
        Duration::from_millis(self.reorder_interval_ms)
    }
}
