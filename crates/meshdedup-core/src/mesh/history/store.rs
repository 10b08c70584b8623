//! Fixed-capacity record arena with round-robin eviction

use super::record::PacketRecord;
use crate::mesh::packet::{NodeId, PacketId};

/// Fixed array of packet records, written oldest-first.
///
/// The slots are allocated once. New records go to the write cursor, which
/// advances on every insert and wraps, so the record inserted longest ago is
/// always the one overwritten. Lookups never affect eviction order.
#[derive(Debug)]
pub struct RecordStore {
    slots: Box<[PacketRecord]>,
    cursor: usize,
}

impl RecordStore {
    /// Allocate `capacity` empty slots.
    ///
    /// A zero capacity or a failed allocation yields a store for which
    /// [`init_ok`](Self::init_ok) is false and every operation is inert.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::new();
        if slots.try_reserve_exact(capacity).is_err() {
            tracing::warn!("Packet history allocation failed ({} records)", capacity);
            return Self::unallocated();
        }
        slots.resize(capacity, PacketRecord::EMPTY);
        Self {
            slots: slots.into_boxed_slice(),
            cursor: 0,
        }
    }

    fn unallocated() -> Self {
        Self {
            slots: Box::default(),
            cursor: 0,
        }
    }

    /// Store is usable
    pub fn init_ok(&self) -> bool {
        !self.slots.is_empty()
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First live record with this key
    pub fn find(&self, sender: NodeId, id: PacketId) -> Option<&PacketRecord> {
        self.slots.iter().find(|r| r.matches(sender, id))
    }

    /// First live record with this key, mutably
    pub fn find_mut(&mut self, sender: NodeId, id: PacketId) -> Option<&mut PacketRecord> {
        self.slots.iter_mut().find(|r| r.matches(sender, id))
    }

    /// Write `record` at the cursor and advance it.
    ///
    /// Returns the live record that was overwritten, if any.
    pub fn insert(&mut self, record: PacketRecord) -> Option<PacketRecord> {
        if !self.init_ok() {
            return None;
        }
        let slot = &mut self.slots[self.cursor];
        let evicted = slot.is_live().then_some(*slot);
        *slot = record;
        self.cursor = (self.cursor + 1) % self.slots.len();
        evicted
    }

    /// Live records, in slot order
    pub fn iter(&self) -> impl Iterator<Item = &PacketRecord> {
        self.slots.iter().filter(|r| r.is_live())
    }

    /// Empty every slot and rewind the cursor
    pub fn clear(&mut self) {
        self.slots.fill(PacketRecord::EMPTY);
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(sender: u32, id: PacketId) -> PacketRecord {
        PacketRecord::new(NodeId::from_u32(sender), id, 1_000)
    }

    fn has(store: &RecordStore, sender: u32, id: PacketId) -> bool {
        store.find(NodeId::from_u32(sender), id).is_some()
    }

    #[test]
    fn test_zero_capacity_is_inert() {
        let mut store = RecordStore::with_capacity(0);
        assert!(!store.init_ok());
        assert_eq!(store.insert(record(1, 1)), None);
        assert!(!has(&store, 1, 1));
        assert!(store.is_empty());
    }

    #[test]
    fn test_impossible_allocation_is_inert() {
        let mut store = RecordStore::with_capacity(usize::MAX);
        assert!(!store.init_ok());
        assert_eq!(store.capacity(), 0);
        assert_eq!(store.insert(record(1, 1)), None);
    }

    #[test]
    fn test_find_ignores_empty_slots() {
        let store = RecordStore::with_capacity(4);
        assert!(store.init_ok());
        // An empty slot has sender 0 / id 0, but must never match.
        assert!(store.find(NodeId::UNKNOWN, 0).is_none());
    }

    #[test]
    fn test_fill_without_eviction() {
        let mut store = RecordStore::with_capacity(4);
        for id in 1..=4 {
            assert_eq!(store.insert(record(0xAAAA, id)), None);
        }
        assert_eq!(store.len(), 4);
        assert!((1..=4).all(|id| has(&store, 0xAAAA, id)));
    }

    #[test]
    fn test_evicts_in_insertion_order() {
        let mut store = RecordStore::with_capacity(3);
        for id in 1..=3 {
            store.insert(record(0xAAAA, id));
        }

        // Looking a record up does not protect it.
        assert!(has(&store, 0xAAAA, 1));

        let evicted = store.insert(record(0xAAAA, 4)).unwrap();
        assert_eq!(evicted.id, 1);
        assert!(!has(&store, 0xAAAA, 1));
        assert!((2..=4).all(|id| has(&store, 0xAAAA, id)));

        let evicted = store.insert(record(0xAAAA, 5)).unwrap();
        assert_eq!(evicted.id, 2);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_find_mut_updates_in_place() {
        let mut store = RecordStore::with_capacity(2);
        store.insert(record(1, 10));
        store
            .find_mut(NodeId::from_u32(1), 10)
            .unwrap()
            .hop_limits
            .set_highest(5);
        assert_eq!(store.find(NodeId::from_u32(1), 10).unwrap().hop_limits.highest(), 5);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut store = RecordStore::with_capacity(2);
        store.insert(record(1, 10));
        store.insert(record(1, 11));
        store.clear();
        assert!(store.is_empty());
        assert!(store.init_ok());
        assert_eq!(store.insert(record(1, 12)), None);
    }
}
