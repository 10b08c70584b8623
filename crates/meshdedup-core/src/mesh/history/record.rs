//! One retained fact about a recently observed packet

use super::hop_limits::HopLimits;
use super::relayers::Relayers;
use crate::mesh::packet::{NodeId, PacketId, RelayId};

/// A slot in the record store.
///
/// Plain data: 4 + 4 + 4 + 1 + 1 + 6 bytes of payload per packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketRecord {
    /// Originator of the packet
    pub sender: NodeId,
    /// Originator-assigned packet id
    pub id: PacketId,
    /// Local receive time in ms; zero marks an empty slot
    pub rx_time_ms: u32,
    /// Next hop nominated in the first copy we observed
    pub next_hop: RelayId,
    /// Highest observed / our-tx hop limits
    pub hop_limits: HopLimits,
    /// Nodes observed relaying this packet
    pub relayed_by: Relayers,
}

impl PacketRecord {
    /// An unused slot
    pub const EMPTY: PacketRecord = PacketRecord {
        sender: NodeId::UNKNOWN,
        id: 0,
        rx_time_ms: 0,
        next_hop: RelayId::NONE,
        hop_limits: HopLimits::new(),
        relayed_by: Relayers::new(),
    };

    /// Fresh record for a key first observed at `now_ms`.
    pub fn new(sender: NodeId, id: PacketId, now_ms: u32) -> Self {
        Self {
            sender,
            id,
            rx_time_ms: stamp(now_ms),
            ..Self::EMPTY
        }
    }

    /// Slot holds a live record
    pub fn is_live(&self) -> bool {
        self.rx_time_ms != 0
    }

    /// Live record for this dedup key
    pub fn matches(&self, sender: NodeId, id: PacketId) -> bool {
        self.is_live() && self.sender == sender && self.id == id
    }

    /// Milliseconds since the record was last refreshed.
    ///
    /// `now_ms` is stamped the same way as `rx_time_ms`, so a record made
    /// at time 0 has age 0 at time 0.
    pub fn age_ms(&self, now_ms: u32) -> u32 {
        stamp(now_ms).wrapping_sub(self.rx_time_ms)
    }

    /// Refresh the receive time
    pub fn touch(&mut self, now_ms: u32) {
        self.rx_time_ms = stamp(now_ms);
    }
}

/// Zero is reserved for empty slots.
fn stamp(now_ms: u32) -> u32 {
    now_ms.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_record_is_not_live() {
        assert!(!PacketRecord::EMPTY.is_live());
        assert!(!PacketRecord::default().matches(NodeId::UNKNOWN, 0));
    }

    #[test]
    fn test_zero_timestamp_is_bumped() {
        let record = PacketRecord::new(NodeId::from_u32(1), 100, 0);
        assert!(record.is_live());
        assert_eq!(record.rx_time_ms, 1);
    }

    #[test]
    fn test_matches_key() {
        let record = PacketRecord::new(NodeId::from_u32(1), 100, 50);
        assert!(record.matches(NodeId::from_u32(1), 100));
        assert!(!record.matches(NodeId::from_u32(2), 100));
        assert!(!record.matches(NodeId::from_u32(1), 101));
    }

    #[test]
    fn test_age_across_wrap() {
        let mut record = PacketRecord::new(NodeId::from_u32(1), 100, u32::MAX - 9);
        assert_eq!(record.age_ms(5), 15);

        record.touch(5);
        assert_eq!(record.age_ms(5), 0);
    }

    #[test]
    fn test_age_at_time_zero() {
        let record = PacketRecord::new(NodeId::from_u32(1), 100, 0);
        assert_eq!(record.age_ms(0), 0);
        assert_eq!(record.age_ms(1), 0);
        assert_eq!(record.age_ms(2), 1);
    }

    #[test]
    fn test_age_when_clock_wraps_onto_zero() {
        let record = PacketRecord::new(NodeId::from_u32(1), 100, u32::MAX);
        assert_eq!(record.age_ms(0), 2);

        let record = PacketRecord::new(NodeId::from_u32(1), 100, u32::MAX - 1);
        assert_eq!(record.age_ms(0), 3);
    }
}
