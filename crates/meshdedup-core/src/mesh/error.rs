//! Error types for the mesh deduplication crate.
//!
//! The hot path (`PacketHistory::observe` and the relayer queries) never
//! returns these: it degrades to "not seen" instead. They are raised only by
//! validation of untrusted input such as configs and replay traces.

use thiserror::Error;

/// Mesh history error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// A hop limit does not fit in its 3-bit field
    #[error("hop limit {0} out of range (max {max})", max = crate::mesh::packet::MAX_HOP_LIMIT)]
    HopLimitOutOfRange(u8),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid simulation parameters
    #[error("invalid simulation: {0}")]
    Simulation(String),
}

/// Result type alias for mesh history operations
pub type Result<T> = std::result::Result<T, HistoryError>;
