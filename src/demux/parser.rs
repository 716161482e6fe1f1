//! Packet boundary scanning over a contiguous buffer
//!
//! The scanner walks a buffer that begins at a packet header and splits it into
//! packets using the length field of each primary header. It holds no state
//! beyond its position, so the reassembler decides what each packet means.

use crate::types::{PRIMARY_HEADER_SIZE, PrimaryHeader};

/// One unit produced while scanning a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parsed<'a> {
    /// A packet whose declared length ends strictly inside the buffer.
    Complete { header: PrimaryHeader, payload: &'a [u8] },
    /// The last packet of the buffer. Its payload is either partial or ends
    /// exactly at the end of the buffer; more bytes may follow in later frames.
    Open { header: PrimaryHeader, payload: &'a [u8] },
    /// Trailing bytes too short to hold a primary header.
    Remainder(&'a [u8]),
}

/// Iterator over the packets of a buffer.
///
/// Yields any number of [`Parsed::Complete`] items followed by at most one
/// [`Parsed::Open`] or non-empty [`Parsed::Remainder`].
#[derive(Debug, Clone)]
pub struct PacketParser<'a> {
    rest: &'a [u8],
    done: bool,
}

impl<'a> PacketParser<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { rest: buffer, done: false }
    }
}

impl<'a> Iterator for PacketParser<'a> {
    type Item = Parsed<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.rest.len() < PRIMARY_HEADER_SIZE {
            self.done = true;
            return (!self.rest.is_empty()).then_some(Parsed::Remainder(self.rest));
        }

        let header = PrimaryHeader::parse(self.rest).ok()?;
        let available = &self.rest[PRIMARY_HEADER_SIZE..];
        let packet_length = header.packet_length();

        if packet_length < available.len() {
            let (payload, rest) = available.split_at(packet_length);
            self.rest = rest;
            Some(Parsed::Complete { header, payload })
        } else {
            self.done = true;
            Some(Parsed::Open { header, payload: available })
        }
    }
}
