//! Mesh packet view consumed by the deduplication engine
//!
//! The engine never parses or serializes the radio wire format. It only reads
//! the routing fields below, which the radio layer has already decoded from
//! the mesh header.
//!
//! ```text
//! ┌────────────┬────────────┬────────────┬───────────┬───────────┬──────────┬────────────┐
//! │ to (4B)    │ from (4B)  │ id (4B)    │ hop_limit │ hop_start │ next_hop │ relay_node │
//! │            │            │            │ (3 bits)  │ (3 bits)  │ (1B)     │ (1B)       │
//! └────────────┴────────────┴────────────┴───────────┴───────────┴──────────┴────────────┘
//! ```
//!
//! `next_hop` and `relay_node` only carry the last byte of a node number,
//! so they are modelled as [`RelayId`] rather than [`NodeId`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Packet identifier assigned by the originating node.
pub type PacketId = u32;

/// Largest hop limit representable in the mesh header (3 bits).
pub const MAX_HOP_LIMIT: u8 = 7;

/// Node identifier - the 32-bit node number
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// Broadcast address (all 0xFF)
    pub const BROADCAST: NodeId = NodeId(0xFFFF_FFFF);

    /// Unknown/unset address. A packet `from` of zero means "from us".
    pub const UNKNOWN: NodeId = NodeId(0);

    /// Create a NodeId from a u32
    pub const fn from_u32(value: u32) -> Self {
        NodeId(value)
    }

    /// Convert to u32
    pub const fn to_u32(self) -> u32 {
        self.0
    }

    /// Create a NodeId from 4 big-endian bytes
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        NodeId(u32::from_be_bytes(bytes))
    }

    /// The one-byte relay id this node uses in `next_hop` / `relay_node`
    pub const fn relay_id(self) -> RelayId {
        RelayId((self.0 & 0xFF) as u8)
    }

    /// Check if this is the broadcast address
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Check if this is unknown/unset
    pub fn is_unknown(&self) -> bool {
        *self == Self::UNKNOWN
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({:08x})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "!{:08x}", self.0)
    }
}

/// Last byte of a node number, as carried in `next_hop` and `relay_node`
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelayId(u8);

impl RelayId {
    /// No next-hop preference / no relayer
    pub const NONE: RelayId = RelayId(0);

    /// Wrap a raw relay byte
    pub const fn new(byte: u8) -> Self {
        RelayId(byte)
    }

    /// Raw byte value
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Check if this is the "none" id
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl From<NodeId> for RelayId {
    fn from(node: NodeId) -> Self {
        node.relay_id()
    }
}

impl fmt::Debug for RelayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelayId({:02x})", self.0)
    }
}

impl fmt::Display for RelayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}", self.0)
    }
}

/// Routing view of a mesh packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshPacket {
    /// Originating node (zero when the packet was created locally)
    #[serde(default)]
    pub from: NodeId,
    /// Destination node (BROADCAST for all nodes)
    #[serde(default = "broadcast_default")]
    pub to: NodeId,
    /// Packet ID assigned by the originator (zero is never deduplicated)
    pub id: PacketId,
    /// Remaining hop limit
    #[serde(default)]
    pub hop_limit: u8,
    /// Hop limit the originator started with
    #[serde(default)]
    pub hop_start: u8,
    /// Relay the previous hop asked to forward the packet
    #[serde(default)]
    pub next_hop: RelayId,
    /// Relay id of the node that transmitted this copy
    #[serde(default)]
    pub relay_node: RelayId,
    /// Sender requested an acknowledgment
    #[serde(default)]
    pub want_ack: bool,
}

fn broadcast_default() -> NodeId {
    NodeId::BROADCAST
}

impl MeshPacket {
    /// Create a new broadcast packet as the originator sends it
    pub fn broadcast(from: NodeId, id: PacketId, hop_limit: u8) -> Self {
        Self {
            from,
            to: NodeId::BROADCAST,
            id,
            hop_limit,
            hop_start: hop_limit,
            next_hop: RelayId::NONE,
            relay_node: from.relay_id(),
            want_ack: false,
        }
    }

    /// Create a new direct (unicast) packet
    pub fn direct(from: NodeId, to: NodeId, id: PacketId, hop_limit: u8) -> Self {
        Self {
            to,
            want_ack: true,
            ..Self::broadcast(from, id, hop_limit)
        }
    }

    /// Builder: set the nominated next hop
    pub fn with_next_hop(mut self, next_hop: RelayId) -> Self {
        self.next_hop = next_hop;
        self
    }

    /// Builder: set the relay node of this copy
    pub fn with_relay_node(mut self, relay_node: RelayId) -> Self {
        self.relay_node = relay_node;
        self
    }

    /// Builder: set the remaining hop limit
    pub fn with_hop_limit(mut self, hop_limit: u8) -> Self {
        self.hop_limit = hop_limit;
        self
    }

    /// Key for duplicate detection as seen by node `our_node`.
    ///
    /// A zero `from` marks a locally created packet, so it is keyed under
    /// our own node number.
    pub fn dedup_key(&self, our_node: NodeId) -> (NodeId, PacketId) {
        let sender = if self.from.is_unknown() {
            our_node
        } else {
            self.from
        };
        (sender, self.id)
    }

    /// Check if this is a broadcast packet
    pub fn is_broadcast(&self) -> bool {
        self.to.is_broadcast()
    }

    /// The originator is retransmitting (nobody has relayed this copy yet)
    pub fn is_repeated(&self) -> bool {
        self.hop_start > 0 && self.hop_start == self.hop_limit
    }

    /// Decrement hop limit, returns false if already zero
    pub fn decrement_hop_limit(&mut self) -> bool {
        if self.hop_limit > 0 {
            self.hop_limit -= 1;
            true
        } else {
            false
        }
    }

    /// The copy `relayer` puts on the air when it forwards this packet.
    ///
    /// Returns `None` when the hop limit is exhausted.
    pub fn relayed_by(&self, relayer: NodeId) -> Option<Self> {
        let mut copy = self.clone();
        if !copy.decrement_hop_limit() {
            return None;
        }
        copy.relay_node = relayer.relay_id();
        copy.next_hop = RelayId::NONE;
        Some(copy)
    }
}
