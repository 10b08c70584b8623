//! Recent-packet history for flood deduplication
//!
//! [`PacketHistory`] remembers a bounded number of recently observed packets
//! keyed by `(sender, id)` and answers the router's questions:
//!
//! - **seen recently?** suppresses re-broadcasting a packet twice
//! - **upgraded?** a later copy arrived with more hops left
//! - **fallback?** a directed packet came back as a flood
//! - **we were next hop?** we were explicitly asked to relay it
//! - **who relayed it?** up to six relayers per packet
//!
//! ## Memory
//!
//! ```text
//! RecordStore (N slots, allocated once)
//! ┌──────────┬──────────┬──────────┬──────────┬──────────┐
//! │ record 0 │ record 1 │ record 2 │   ...    │ record N │
//! └──────────┴──────────┴──────────┴──────────┴──────────┘
//!                  ▲
//!                cursor: next slot to overwrite
//! ```
//!
//! When full, the record inserted longest ago is overwritten. Detection is
//! therefore only "recent", and every degraded case (no store, unknown key,
//! full relayer list) resolves toward *not* suppressing a packet.
//!
//! ## Example
//!
//! ```
//! use meshdedup_core::mesh::{HistoryConfig, MeshPacket, NodeId, PacketHistory};
//!
//! let mut history = PacketHistory::new(HistoryConfig::for_node(NodeId::from_u32(0xDEAD_1234)));
//! let packet = MeshPacket::broadcast(NodeId::from_u32(0x1111), 42, 3);
//!
//! assert!(!history.was_seen_recently(&packet, true));
//! assert!(history.was_seen_recently(&packet, true));
//! ```

mod config;
mod hop_limits;
mod record;
mod relayers;
mod store;

pub use config::{HistoryConfig, DEFAULT_CAPACITY, DEFAULT_FLOOD_EXPIRE_MS};
pub use hop_limits::HopLimits;
pub use record::PacketRecord;
pub use relayers::{Relayers, NUM_RELAYERS};
pub use store::RecordStore;

use super::clock::{Clock, MonotonicClock};
use super::packet::{MeshPacket, NodeId, PacketId, RelayId, MAX_HOP_LIMIT};
use serde::Serialize;

/// What the history knew about a packet when it was observed.
///
/// Every flag is independent. All are false for a packet not seen before.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Observation {
    /// The packet was already in the history
    pub seen_recently: bool,
    /// A directed packet is being re-flooded by a node that already relayed it
    pub was_fallback: bool,
    /// The first copy named us as next hop
    pub we_were_next_hop: bool,
    /// This copy has more hops left than any copy seen before
    pub was_upgraded: bool,
}

/// Result of a relayer query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayerStatus {
    /// Packet is not in the history
    Unknown,
    /// Packet is known but the node was not recorded as a relayer
    NotRelayer,
    /// Node relayed the packet; `sole` when it is the only recorded relayer
    Relayer { sole: bool },
}

impl RelayerStatus {
    pub fn was_relayer(self) -> bool {
        matches!(self, RelayerStatus::Relayer { .. })
    }

    pub fn was_sole(self) -> bool {
        matches!(self, RelayerStatus::Relayer { sole: true })
    }
}

/// Result of checking two relayers against one packet in a single lookup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayerCheck {
    pub first: bool,
    pub second: bool,
    /// The second relayer is the only recorded relayer
    pub second_sole: bool,
}

/// Counters for history operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistoryStats {
    /// Observations with a usable store and nonzero id
    pub lookups: u64,
    /// Observations of a packet already in the history
    pub hits: u64,
    /// New records written
    pub inserts: u64,
    /// Live records overwritten to make room
    pub evictions: u64,
    /// Records found but older than the expiry window
    pub expired: u64,
    /// Observations flagged as hop-limit upgrades
    pub upgrades: u64,
    /// Observations flagged as fallback to flooding
    pub fallbacks: u64,
    /// Relayers dropped because the list was full
    pub relayer_overflows: u64,
}

/// Bounded history of recently seen packets
#[derive(Debug)]
pub struct PacketHistory<C: Clock = MonotonicClock> {
    config: HistoryConfig,
    store: RecordStore,
    clock: C,
    stats: HistoryStats,
}

impl PacketHistory<MonotonicClock> {
    /// Create a history driven by the wall clock
    pub fn new(config: HistoryConfig) -> Self {
        Self::with_clock(config, MonotonicClock::new())
    }
}

impl<C: Clock> PacketHistory<C> {
    /// Create a history with an explicit time source
    pub fn with_clock(config: HistoryConfig, clock: C) -> Self {
        let store = RecordStore::with_capacity(config.capacity);
        if !store.init_ok() {
            tracing::warn!(
                "Packet history unavailable (capacity {}), every packet will look new",
                config.capacity
            );
        }
        Self {
            config,
            store,
            clock,
            stats: HistoryStats::default(),
        }
    }

    /// False when the store could not be allocated; dedup is then disabled
    pub fn init_ok(&self) -> bool {
        self.store.init_ok()
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn stats(&self) -> &HistoryStats {
        &self.stats
    }

    /// Number of record slots
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Our node number
    pub fn node_num(&self) -> NodeId {
        self.config.node_num
    }

    /// Our one-byte relay id
    pub fn our_relay_id(&self) -> RelayId {
        self.config.node_num.relay_id()
    }

    /// Look up the record for a key, ignoring expiry
    pub fn find(&self, sender: NodeId, id: PacketId) -> Option<&PacketRecord> {
        self.store.find(sender, id)
    }

    /// Live records in slot order
    pub fn records(&self) -> impl Iterator<Item = &PacketRecord> {
        self.store.iter()
    }

    /// Forget every packet
    pub fn clear(&mut self) {
        self.store.clear();
    }

    /// Observe a packet and report what was already known about it.
    ///
    /// With `with_update`, a new key is recorded and a known key is merged
    /// (hop-limit upgrade, relayer, receive time). Without it the history is
    /// left untouched.
    pub fn observe(&mut self, packet: &MeshPacket, with_update: bool) -> Observation {
        if !self.store.init_ok() {
            return Observation::default();
        }
        if packet.id == 0 {
            // Not a floodable id.
            return Observation::default();
        }

        let our_node = self.config.node_num;
        let (sender, _) = packet.dedup_key(our_node);
        let hop_limit = clamp_hop_limit(packet.hop_limit);
        let our_relay = our_node.relay_id();
        let now = self.clock.now_ms();
        let expire_ms = self.config.flood_expire_ms;
        let stats = &mut self.stats;
        stats.lookups += 1;

        match self.store.find_mut(sender, packet.id) {
            Some(record) if record.age_ms(now) < expire_ms => {
                stats.hits += 1;
                let observation = Observation {
                    seen_recently: true,
                    was_fallback: is_fallback(record, packet, sender, our_node),
                    we_were_next_hop: !our_relay.is_none() && record.next_hop == our_relay,
                    was_upgraded: hop_limit > record.hop_limits.highest(),
                };
                if observation.was_upgraded {
                    stats.upgrades += 1;
                }
                if observation.was_fallback {
                    stats.fallbacks += 1;
                    tracing::debug!(
                        "Fallback to flooding for {}/{:#x} from relay {}",
                        sender,
                        packet.id,
                        packet.relay_node
                    );
                }
                tracing::trace!(
                    "Dupe {}/{:#x} hop_limit={} relay={} {:?}",
                    sender,
                    packet.id,
                    hop_limit,
                    packet.relay_node,
                    observation
                );
                if with_update {
                    merge(record, packet, hop_limit, our_relay, now, stats);
                }
                observation
            }
            Some(record) => {
                stats.expired += 1;
                tracing::debug!(
                    "Record {}/{:#x} expired after {} ms",
                    sender,
                    packet.id,
                    record.age_ms(now)
                );
                if with_update {
                    // Re-initialise in place so the key never occupies two slots.
                    *record = new_record(sender, packet, hop_limit, our_relay, now);
                    stats.inserts += 1;
                }
                Observation::default()
            }
            None => {
                if with_update {
                    let record = new_record(sender, packet, hop_limit, our_relay, now);
                    stats.inserts += 1;
                    if let Some(evicted) = self.store.insert(record) {
                        stats.evictions += 1;
                        tracing::trace!(
                            "Evicted {}/{:#x} for {}/{:#x}",
                            evicted.sender,
                            evicted.id,
                            sender,
                            packet.id
                        );
                    }
                }
                Observation::default()
            }
        }
    }

    /// Plain "have we seen this packet" query
    pub fn was_seen_recently(&mut self, packet: &MeshPacket, with_update: bool) -> bool {
        self.observe(packet, with_update).seen_recently
    }

    /// Relayer status of `relayer` for the packet `(sender, id)`
    pub fn relayer_status(&self, relayer: RelayId, id: PacketId, sender: NodeId) -> RelayerStatus {
        match self.store.find(sender, id) {
            None => RelayerStatus::Unknown,
            Some(record) if record.relayed_by.contains(relayer) => RelayerStatus::Relayer {
                sole: record.relayed_by.is_sole(relayer),
            },
            Some(_) => RelayerStatus::NotRelayer,
        }
    }

    /// True if `relayer` was observed relaying `(sender, id)`
    pub fn was_relayer(&self, relayer: RelayId, id: PacketId, sender: NodeId) -> bool {
        self.relayer_status(relayer, id, sender).was_relayer()
    }

    /// Check two relayers with one lookup
    pub fn check_relayers(
        &self,
        first: RelayId,
        second: RelayId,
        id: PacketId,
        sender: NodeId,
    ) -> RelayerCheck {
        match self.store.find(sender, id) {
            Some(record) => RelayerCheck {
                first: record.relayed_by.contains(first),
                second: record.relayed_by.contains(second),
                second_sole: record.relayed_by.is_sole(second),
            },
            None => RelayerCheck::default(),
        }
    }

    /// Forget that `relayer` relayed `(sender, id)`. Unknown keys are ignored.
    pub fn remove_relayer(&mut self, relayer: RelayId, id: PacketId, sender: NodeId) {
        if let Some(record) = self.store.find_mut(sender, id) {
            if record.relayed_by.remove(relayer) {
                tracing::trace!("Removed relayer {} from {}/{:#x}", relayer, sender, id);
            }
        }
    }
}

fn clamp_hop_limit(hop_limit: u8) -> u8 {
    if hop_limit > MAX_HOP_LIMIT {
        tracing::warn!("Hop limit {} out of range, clamping to {}", hop_limit, MAX_HOP_LIMIT);
        return MAX_HOP_LIMIT;
    }
    hop_limit
}

fn new_record(
    sender: NodeId,
    packet: &MeshPacket,
    hop_limit: u8,
    our_relay: RelayId,
    now: u32,
) -> PacketRecord {
    let mut record = PacketRecord::new(sender, packet.id, now);
    record.next_hop = packet.next_hop;
    record.hop_limits.set_highest(hop_limit);
    if !our_relay.is_none() && packet.relay_node == our_relay {
        record.hop_limits.set_our_tx(hop_limit);
    }
    record.relayed_by.record(packet.relay_node);
    record
}

fn merge(
    record: &mut PacketRecord,
    packet: &MeshPacket,
    hop_limit: u8,
    our_relay: RelayId,
    now: u32,
    stats: &mut HistoryStats,
) {
    if hop_limit > record.hop_limits.highest() {
        record.hop_limits.set_highest(hop_limit);
    }

    let relayer = packet.relay_node;
    if !relayer.is_none() {
        if relayer == our_relay && record.hop_limits.our_tx() == 0 {
            record.hop_limits.set_our_tx(hop_limit);
        }
        if !record.relayed_by.contains(relayer) && !record.relayed_by.record(relayer) {
            stats.relayer_overflows += 1;
            tracing::trace!(
                "Relayer list full for {}/{:#x}, dropping {}",
                record.sender,
                record.id,
                relayer
            );
        }
    }

    // next_hop stays as first observed.
    record.touch(now);
}

/// A node that already relayed a directed packet is now flooding it, and
/// neither we nor the nominated next hop have relayed it.
fn is_fallback(record: &PacketRecord, packet: &MeshPacket, sender: NodeId, our_node: NodeId) -> bool {
    let our_relay = our_node.relay_id();
    sender != our_node
        && !record.next_hop.is_none()
        && record.next_hop != our_relay
        && packet.next_hop.is_none()
        && record.relayed_by.contains(packet.relay_node)
        && !record.relayed_by.contains(our_relay)
        && !record.relayed_by.contains(record.next_hop)
}
