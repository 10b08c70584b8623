//! # Mesh Flood Deduplication
//!
//! This crate implements the duplicate-suppression and relay-tracking core of
//! a flooding packet-radio mesh (LoRa style). Every node rebroadcasts what it
//! hears, so without a memory of recent packets a single message would echo
//! forever.
//!
//! ## Overview
//!
//! For each recently observed packet, keyed by `(sender, id)`, the engine
//! keeps a compact record:
//!
//! - **Hop limits**: highest hop limit seen and the one we transmitted with,
//!   packed into one byte
//! - **Next hop**: the relay the first copy was directed to
//! - **Relayers**: up to six nodes heard relaying the packet
//!
//! From these the router learns whether a packet is a duplicate, whether a
//! better copy arrived, whether a directed packet fell back to flooding, and
//! who the best next hop is.
//!
//! ## Flow
//!
//! ```text
//! RX: Packet → observe() → Observation → DupeAction → deliver / relay / cancel
//! TX: Relay  → observe() (records our hop limit and ourselves as relayer)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use meshdedup_core::{HistoryConfig, MeshPacket, NodeId, PacketHistory};
//!
//! let mut history = PacketHistory::new(HistoryConfig::for_node(NodeId::from_u32(0xDEAD_1234)));
//! let packet = MeshPacket::broadcast(NodeId::from_u32(0x1111), 42, 3);
//!
//! assert!(!history.was_seen_recently(&packet, true));
//! assert!(history.was_seen_recently(&packet, true));
//! assert!(history.was_relayer(packet.relay_node, 42, packet.from));
//! ```

pub mod mesh;

// Re-export main types
pub use mesh::{
    Clock, DupeAction, HistoryConfig, HistoryError, MeshPacket, NodeId, Observation,
    PacketHistory, RelayId,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::mesh::{
        Clock, DupeAction, HistoryConfig, ManualClock, MeshPacket, NodeId, Observation,
        PacketHistory, RelayId, RelayerStatus,
    };
}
