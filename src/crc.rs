//! Packet CRC-16
//!
//! Every packet closes with a big-endian 16-bit checksum over its user data.
//! The ground segment encoder computes it with a byte-serial recurrence over two
//! 8-bit accumulators, reproduced here bit for bit.

/// Compute the packet checksum over `data`.
pub fn calc_crc(data: &[u8]) -> u16 {
    let mut lsb: u8 = 0xFF;
    let mut msb: u8 = 0xFF;

    for &byte in data {
        let mut x = byte ^ msb;
        x ^= x >> 4;
        msb = lsb ^ (x >> 3) ^ (x << 4);
        lsb = x ^ (x << 5);
    }

    ((msb as u16) << 8) | lsb as u16
}

/// Check `data` against the checksum carried in the packet trailer.
pub fn validate(data: &[u8], expected: u16) -> bool {
    calc_crc(data) == expected
}

/// Split a packet payload into user data and its trailing checksum.
pub fn split_trailer(payload: &[u8]) -> Option<(&[u8], u16)> {
    let split = payload.len().checked_sub(2)?;
    let (data, trailer) = payload.split_at(split);
    Some((data, u16::from_be_bytes([trailer[0], trailer[1]])))
}
