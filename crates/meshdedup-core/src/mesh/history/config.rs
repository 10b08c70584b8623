//! Construction-time configuration for the packet history.

use crate::mesh::error::{HistoryError, Result};
use crate::mesh::packet::NodeId;
use serde::{Deserialize, Serialize};

/// Default number of records (sized for small-RAM boards).
pub const DEFAULT_CAPACITY: usize = 100;

/// Default time after which a record no longer counts as "recent" (10 minutes).
pub const DEFAULT_FLOOD_EXPIRE_MS: u32 = 10 * 60 * 1000;

/// Packet history configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Our node number. Packets with `from == 0` are ours, and our relay id
    /// is derived from it.
    pub node_num: NodeId,
    /// Number of packet records, fixed for the lifetime of the history
    pub capacity: usize,
    /// Records older than this are treated as unseen
    pub flood_expire_ms: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            node_num: NodeId::UNKNOWN,
            capacity: DEFAULT_CAPACITY,
            flood_expire_ms: DEFAULT_FLOOD_EXPIRE_MS,
        }
    }
}

impl HistoryConfig {
    /// Configuration for the given node with default sizing
    pub fn for_node(node_num: NodeId) -> Self {
        Self {
            node_num,
            ..Default::default()
        }
    }

    /// Builder: set the record capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Builder: set the expiry window
    pub fn with_flood_expire_ms(mut self, ms: u32) -> Self {
        self.flood_expire_ms = ms;
        self
    }

    /// Check values loaded from an external source.
    ///
    /// A history built from an invalid config still works (it fails open),
    /// so this is for loaders that want to reject bad files up front.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(HistoryError::Config(
                "capacity must be nonzero, a zero-capacity history deduplicates nothing".into(),
            ));
        }
        if self.flood_expire_ms == 0 {
            return Err(HistoryError::Config("flood_expire_ms must be nonzero".into()));
        }
        if self.node_num.is_unknown() || self.node_num.is_broadcast() {
            return Err(HistoryError::Config(format!(
                "node_num {} is reserved",
                self.node_num
            )));
        }
        Ok(())
    }
}
