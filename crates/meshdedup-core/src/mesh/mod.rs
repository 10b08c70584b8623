//! Flood Deduplication Framework
//!
//! A flooding mesh relays every packet it hears, so each node must remember
//! which packets it has already handled. This module provides that memory and
//! the decisions built on it:
//!
//! - **Packet**: the routing fields of a received mesh packet
//! - **History**: bounded record store, hop-limit codec, relayer tracker and
//!   the dedup decision API
//! - **Dupe**: router actions derived from an observation
//! - **Simulation**: managed flooding over a random mesh
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Router (consumer)                               │
//! │      observe  ·  was_relayer  ·  check_relayers  ·  remove_relayer      │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                  │
//!                                  ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         PacketHistory                                   │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐     │
//! │  │ seen before │  │  upgraded   │  │  fallback   │  │ next hop us │     │
//! │  └─────────────┘  └─────────────┘  └─────────────┘  └─────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                  │
//!                                  ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          RecordStore                                    │
//! │  ┌───────────────────────────┐  ┌─────────────────────────────────────┐ │
//! │  │  PacketRecord × N         │  │  HopLimits (1 byte)                 │ │
//! │  │  round-robin eviction     │  │  Relayers (6 × relay id)            │ │
//! │  └───────────────────────────┘  └─────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use meshdedup_core::mesh::{DupeAction, HistoryConfig, MeshPacket, NodeId, PacketHistory};
//!
//! let us = NodeId::from_u32(0xDEAD_1234);
//! let mut history = PacketHistory::new(HistoryConfig::for_node(us));
//!
//! let packet = MeshPacket::broadcast(NodeId::from_u32(0x1111), 7, 3);
//! let first = history.observe(&packet, true);
//! assert_eq!(DupeAction::classify(&first, &packet), DupeAction::Process);
//!
//! // Another node relays it; our own relay can be cancelled.
//! let relayed = packet.relayed_by(NodeId::from_u32(0x2222)).unwrap();
//! let again = history.observe(&relayed, true);
//! assert_eq!(DupeAction::classify(&again, &relayed), DupeAction::CancelPending);
//! ```

pub mod clock;
pub mod dupe;
pub mod error;
pub mod history;
pub mod packet;
pub mod simulation;

// Re-export main types
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use dupe::{learn_next_hop, DupeAction};
pub use error::{HistoryError, Result};
pub use history::{
    HistoryConfig, HistoryStats, HopLimits, Observation, PacketHistory, PacketRecord,
    RelayerCheck, RelayerStatus, Relayers, NUM_RELAYERS,
};
pub use packet::{MeshPacket, NodeId, PacketId, RelayId, MAX_HOP_LIMIT};
pub use simulation::{MeshSimulator, SimConfig, SimStats};
