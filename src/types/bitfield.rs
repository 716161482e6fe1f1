//! Bit-field accessors for big-endian header words

use serde::{Deserialize, Serialize};

/// Modulus of the 24-bit virtual channel frame counter.
pub const FRAME_COUNTER_MODULUS: u32 = 1 << 24;

/// Big-endian header word with MSB-relative field extraction.
///
/// Header layouts are documented MSB first, so fields are addressed by the
/// bit offset of their most significant bit within a word of `width` bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitField {
    value: u32,
    width: u32,
}

impl BitField {
    /// Create a 16-bit field from two big-endian bytes.
    pub fn from_be_u16(bytes: [u8; 2]) -> Self {
        Self { value: u16::from_be_bytes(bytes) as u32, width: 16 }
    }

    /// Create a 32-bit field from four big-endian bytes.
    pub fn from_be_u32(bytes: [u8; 4]) -> Self {
        Self { value: u32::from_be_bytes(bytes), width: 32 }
    }

    /// Extract `len` bits starting `offset` bits from the most significant end.
    pub fn bits(&self, offset: u32, len: u32) -> u32 {
        debug_assert!(len > 0 && offset + len <= self.width);
        let shift = self.width - offset - len;
        let mask = if len == 32 { u32::MAX } else { (1u32 << len) - 1 };
        (self.value >> shift) & mask
    }

    /// Check if the single bit at `offset` (MSB relative) is set.
    pub fn is_set(&self, offset: u32) -> bool {
        self.bits(offset, 1) == 1
    }

    /// Get the raw value.
    pub fn value(&self) -> u32 {
        self.value
    }
}

/// Compare 24-bit frame counters with wraparound using the half-range rule.
/// Returns true if `a` is considered newer than `b`.
pub fn counter_after_u24(a: u32, b: u32) -> bool {
    let delta = a.wrapping_sub(b) % FRAME_COUNTER_MODULUS;
    delta != 0 && delta < FRAME_COUNTER_MODULUS / 2
}

/// Number of frames lost between two consecutive counters.
///
/// Returns `None` when `current` is not after `last` (duplicate or regression).
pub fn counter_gap_u24(last: u32, current: u32) -> Option<u32> {
    if !counter_after_u24(current, last) {
        return None;
    }
    Some(current.wrapping_sub(last) % FRAME_COUNTER_MODULUS - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn extracts_primary_header_fields() {
        // 0x0D59: version 0, type 0, secondary header 1, APID 1369
        let word = BitField::from_be_u16([0x0D, 0x59]);
        assert_eq!(word.bits(0, 3), 0);
        assert!(!word.is_set(3));
        assert!(word.is_set(4));
        assert_eq!(word.bits(5, 11), 1369);

        // 0xD2AB: sequence flags 3, count 4779
        let word = BitField::from_be_u16([0xD2, 0xAB]);
        assert_eq!(word.bits(0, 2), 3);
        assert_eq!(word.bits(2, 14), 4779);
    }

    #[test]
    fn extracts_frame_counter_from_32_bit_word() {
        let word = BitField::from_be_u32([0x12, 0x34, 0x56, 0x78]);
        assert_eq!(word.bits(0, 24), 0x123456);
        assert_eq!(word.bits(24, 8), 0x78);
        assert_eq!(word.bits(0, 32), 0x1234_5678);
        assert_eq!(word.value(), 0x1234_5678);
    }

    #[test]
    fn counter_gap_handles_wraparound() {
        assert_eq!(counter_gap_u24(4, 5), Some(0));
        assert_eq!(counter_gap_u24(2, 4), Some(1));
        assert_eq!(counter_gap_u24(0xFF_FFFF, 0), Some(0));
        assert_eq!(counter_gap_u24(0xFF_FFFE, 1), Some(2));
        assert_eq!(counter_gap_u24(7, 7), None);
        assert_eq!(counter_gap_u24(10, 3), None);
    }

    proptest! {
        #[test]
        fn gap_matches_successor_distance(last in 0u32..FRAME_COUNTER_MODULUS, skipped in 0u32..1000) {
            let current = (last + skipped + 1) % FRAME_COUNTER_MODULUS;
            prop_assert_eq!(counter_gap_u24(last, current), Some(skipped));
        }

        #[test]
        fn counter_never_after_itself(value in 0u32..FRAME_COUNTER_MODULUS) {
            prop_assert!(!counter_after_u24(value, value));
        }

        #[test]
        fn sixteen_bit_fields_partition_the_word(raw in any::<u16>()) {
            let word = BitField::from_be_u16(raw.to_be_bytes());
            let rebuilt = (word.bits(0, 3) << 13)
                | (word.bits(3, 1) << 12)
                | (word.bits(4, 1) << 11)
                | word.bits(5, 11);
            prop_assert_eq!(rebuilt, raw as u32);
        }
    }
}
