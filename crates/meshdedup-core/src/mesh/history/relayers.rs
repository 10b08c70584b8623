//! Bounded list of relay ids observed forwarding a packet

use crate::mesh::packet::RelayId;

/// Number of relayers remembered per packet.
pub const NUM_RELAYERS: usize = 6;

/// Compacted set of relayers: occupied slots first, `RelayId::NONE` after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Relayers {
    slots: [RelayId; NUM_RELAYERS],
}

impl Relayers {
    pub const fn new() -> Self {
        Self {
            slots: [RelayId::NONE; NUM_RELAYERS],
        }
    }

    /// Number of recorded relayers
    pub fn len(&self) -> usize {
        self.slots.iter().take_while(|id| !id.is_none()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots[0].is_none()
    }

    pub fn is_full(&self) -> bool {
        !self.slots[NUM_RELAYERS - 1].is_none()
    }

    /// Recorded relayers in insertion order
    pub fn iter(&self) -> impl Iterator<Item = RelayId> + '_ {
        self.slots.iter().copied().take_while(|id| !id.is_none())
    }

    /// True if `relayer` is recorded. `NONE` is never a relayer.
    pub fn contains(&self, relayer: RelayId) -> bool {
        !relayer.is_none() && self.iter().any(|id| id == relayer)
    }

    /// True if `relayer` is the only recorded relayer
    pub fn is_sole(&self, relayer: RelayId) -> bool {
        !relayer.is_none() && self.slots[0] == relayer && self.slots[1].is_none()
    }

    /// Record a relayer.
    ///
    /// Returns `false` when nothing was added: `NONE`, already present, or full.
    pub fn record(&mut self, relayer: RelayId) -> bool {
        if relayer.is_none() || self.contains(relayer) {
            return false;
        }
        let len = self.len();
        if len == NUM_RELAYERS {
            return false;
        }
        self.slots[len] = relayer;
        true
    }

    /// Remove a relayer and close the gap. Absent ids are ignored.
    pub fn remove(&mut self, relayer: RelayId) -> bool {
        let len = self.len();
        match self.slots[..len].iter().position(|&id| id == relayer) {
            Some(idx) if !relayer.is_none() => {
                self.slots.copy_within(idx + 1..len, idx);
                self.slots[len - 1] = RelayId::NONE;
                true
            }
            _ => false,
        }
    }
}
