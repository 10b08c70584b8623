//! Packed hop-limit byte
//!
//! ```text
//!   7   6   5   4   3   2   1   0
//! ┌───┬───┬───────────┬───────────┐
//! │ 0 │ 0 │  our tx   │  highest  │
//! └───┴───┴───────────┴───────────┘
//! ```
//!
//! `highest` is the best hop limit observed for the packet so far.
//! `our tx` is the hop limit we used the first time we transmitted it
//! (zero while we have not transmitted).

use crate::mesh::error::{HistoryError, Result};
use crate::mesh::packet::MAX_HOP_LIMIT;

/// Two independent 3-bit hop-limit counters in one byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HopLimits(u8);

impl HopLimits {
    const FIELD_MASK: u8 = 0x07;
    const HIGHEST_SHIFT: u8 = 0;
    const OUR_TX_SHIFT: u8 = 3;

    /// Both counters zero
    pub const fn new() -> Self {
        HopLimits(0)
    }

    /// Build from untrusted values, rejecting anything over 3 bits
    pub fn try_new(highest: u8, our_tx: u8) -> Result<Self> {
        let mut limits = Self::new();
        limits.set_highest(check(highest)?);
        limits.set_our_tx(check(our_tx)?);
        Ok(limits)
    }

    /// Highest hop limit observed
    pub fn highest(&self) -> u8 {
        self.field(Self::HIGHEST_SHIFT)
    }

    /// Set the highest hop limit observed
    pub fn set_highest(&mut self, value: u8) {
        self.set_field(Self::HIGHEST_SHIFT, value);
    }

    /// Hop limit of our first transmission (0 = not transmitted)
    pub fn our_tx(&self) -> u8 {
        self.field(Self::OUR_TX_SHIFT)
    }

    /// Set the hop limit of our first transmission
    pub fn set_our_tx(&mut self, value: u8) {
        self.set_field(Self::OUR_TX_SHIFT, value);
    }

    fn field(&self, shift: u8) -> u8 {
        (self.0 >> shift) & Self::FIELD_MASK
    }

    fn set_field(&mut self, shift: u8, value: u8) {
        debug_assert!(
            value <= MAX_HOP_LIMIT,
            "hop limit {value} does not fit in 3 bits"
        );
        let value = value.min(MAX_HOP_LIMIT);
        self.0 = (self.0 & !(Self::FIELD_MASK << shift)) | (value << shift);
    }
}

fn check(value: u8) -> Result<u8> {
    if value > MAX_HOP_LIMIT {
        return Err(HistoryError::HopLimitOutOfRange(value));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_zero() {
        let limits = HopLimits::default();
        assert_eq!(limits.highest(), 0);
        assert_eq!(limits.our_tx(), 0);
    }

    #[test]
    fn test_fields_do_not_interfere_highest_first() {
        for a in 0..=MAX_HOP_LIMIT {
            for b in 0..=MAX_HOP_LIMIT {
                let mut limits = HopLimits::new();
                limits.set_highest(a);
                limits.set_our_tx(b);
                assert_eq!(limits.highest(), a, "highest after ({a}, {b})");
                assert_eq!(limits.our_tx(), b, "our_tx after ({a}, {b})");
            }
        }
    }

    #[test]
    fn test_fields_do_not_interfere_our_tx_first() {
        for a in 0..=MAX_HOP_LIMIT {
            for b in 0..=MAX_HOP_LIMIT {
                let mut limits = HopLimits::new();
                limits.set_our_tx(b);
                limits.set_highest(a);
                assert_eq!(limits.highest(), a, "highest after ({a}, {b})");
                assert_eq!(limits.our_tx(), b, "our_tx after ({a}, {b})");
            }
        }
    }

    #[test]
    fn test_overwrite_keeps_sibling() {
        // Every transition of one field, starting from every state of both.
        for start_a in 0..=MAX_HOP_LIMIT {
            for start_b in 0..=MAX_HOP_LIMIT {
                for next in 0..=MAX_HOP_LIMIT {
                    let base = HopLimits::try_new(start_a, start_b).unwrap();

                    let mut limits = base;
                    limits.set_highest(next);
                    assert_eq!(limits.our_tx(), start_b);
                    assert_eq!(limits.highest(), next);

                    let mut limits = base;
                    limits.set_our_tx(next);
                    assert_eq!(limits.highest(), start_a);
                    assert_eq!(limits.our_tx(), next);
                }
            }
        }
    }

    #[test]
    fn test_try_new_rejects_out_of_range() {
        assert_eq!(
            HopLimits::try_new(8, 0),
            Err(HistoryError::HopLimitOutOfRange(8))
        );
        assert_eq!(
            HopLimits::try_new(3, 200),
            Err(HistoryError::HopLimitOutOfRange(200))
        );
        let limits = HopLimits::try_new(7, 7).unwrap();
        assert_eq!((limits.highest(), limits.our_tx()), (7, 7));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "does not fit in 3 bits")]
    fn test_out_of_range_asserts_in_debug() {
        let mut limits = HopLimits::new();
        limits.set_highest(8);
    }
}
