//! Space packet primary header and in-flight packet state

use super::BitField;
use crate::{DemuxError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of the space packet primary header.
pub const PRIMARY_HEADER_SIZE: usize = 6;
/// Size of the CRC trailer closing every packet.
pub const CRC_SIZE: usize = 2;
/// APID reserved for fill (idle) packets.
pub const FILL_APID: u16 = 2047;

/// Role of a packet within a segmented group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SequenceFlag {
    Continuation = 0,
    First = 1,
    Last = 2,
    Standalone = 3,
}

impl SequenceFlag {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => SequenceFlag::Continuation,
            1 => SequenceFlag::First,
            2 => SequenceFlag::Last,
            _ => SequenceFlag::Standalone,
        }
    }

    /// First and Standalone segments open a group.
    pub fn starts_group(self) -> bool {
        matches!(self, SequenceFlag::First | SequenceFlag::Standalone)
    }

    /// Last and Standalone segments close a group.
    pub fn ends_group(self) -> bool {
        matches!(self, SequenceFlag::Last | SequenceFlag::Standalone)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SequenceFlag::Continuation => "continuation",
            SequenceFlag::First => "first",
            SequenceFlag::Last => "last",
            SequenceFlag::Standalone => "standalone",
        }
    }
}

impl fmt::Display for SequenceFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Space packet primary header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryHeader {
    pub version: u8,
    pub packet_type: u8,
    pub secondary_header: bool,
    pub apid: u16,
    pub sequence_flag: SequenceFlag,
    pub sequence_count: u16,
    /// Raw length field; the packet carries `packet_data_length + 1` bytes after the header.
    pub packet_data_length: u16,
}

impl PrimaryHeader {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < PRIMARY_HEADER_SIZE {
            return Err(DemuxError::parse_error(
                "Packet primary header parsing",
                format!("Need {} bytes, have {}", PRIMARY_HEADER_SIZE, data.len()),
            ));
        }

        let id = BitField::from_be_u16([data[0], data[1]]);
        let sequence = BitField::from_be_u16([data[2], data[3]]);
        let packet_data_length = u16::from_be_bytes([data[4], data[5]]);

        Ok(Self {
            version: id.bits(0, 3) as u8,
            packet_type: id.bits(3, 1) as u8,
            secondary_header: id.is_set(4),
            apid: id.bits(5, 11) as u16,
            sequence_flag: SequenceFlag::from_bits(sequence.bits(0, 2) as u8),
            sequence_count: sequence.bits(2, 14) as u16,
            packet_data_length,
        })
    }

    /// Bytes following the primary header, CRC included.
    pub fn packet_length(&self) -> usize {
        self.packet_data_length as usize + 1
    }

    /// Declared user data size, CRC excluded.
    pub fn data_size(&self) -> usize {
        self.packet_length().saturating_sub(CRC_SIZE)
    }

    pub fn is_fill(&self) -> bool {
        self.apid == FILL_APID
    }
}

/// A packet whose bytes are being accumulated across frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPacket {
    pub header: PrimaryHeader,
    /// Accumulated bytes after the primary header (user data + CRC).
    pub data: Vec<u8>,
    /// Set when a frame was lost while this packet was being assembled.
    pub frames_dropped: bool,
}

impl PendingPacket {
    pub fn new(header: PrimaryHeader, data: &[u8]) -> Self {
        Self { header, data: data.to_vec(), frames_dropped: false }
    }

    pub fn apid(&self) -> u16 {
        self.header.apid
    }

    pub fn sequence_flag(&self) -> SequenceFlag {
        self.header.sequence_flag
    }

    pub fn sequence_count(&self) -> u16 {
        self.header.sequence_count
    }

    /// Declared user data size, CRC excluded.
    pub fn size(&self) -> usize {
        self.header.data_size()
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }
}
