//! Transfer frame and M-PDU layout
//!
//! Each channel capture is a plain concatenation of fixed-size virtual channel
//! data units. A unit is laid out as:
//!
//! 1. **Frame header** (6 bytes) - version, spacecraft id, virtual channel id,
//!    24-bit frame counter and an 8-bit signalling field
//! 2. **M-PDU header** (2 bytes) - 5 spare bits and the 11-bit first header pointer
//! 3. **Packet zone** - the remaining bytes, carrying space packets that freely
//!    straddle frame boundaries
//!
//! All multi-byte fields are big-endian.

use crate::types::BitField;
use crate::{DemuxError, Result};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Default frame size of an LRIT virtual channel data unit.
pub const FRAME_SIZE: usize = 892;
/// Size of the frame primary header.
pub const FRAME_HEADER_SIZE: usize = 6;
/// Size of the M-PDU header that prefixes the packet zone.
pub const MPDU_HEADER_SIZE: usize = 2;
/// First header pointer value meaning "no packet header starts in this frame".
pub const NO_HEADER_POINTER: u16 = 0x07FF;

/// Frame primary header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHeader {
    pub version: u8,
    pub spacecraft_id: u8,
    pub virtual_channel_id: u8,
    pub counter: u32,
    pub signalling: u8,
}

impl FrameHeader {
    /// Size of the frame primary header in bytes
    pub const HEADER_SIZE: usize = FRAME_HEADER_SIZE;

    pub fn parse(data: &[u8]) -> Result<Self> {
        let bytes: [u8; FRAME_HEADER_SIZE] = data
            .get(..FRAME_HEADER_SIZE)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| {
                DemuxError::parse_error(
                    "Frame header parsing",
                    format!(
                        "Need {} bytes for a frame header, have {}",
                        FRAME_HEADER_SIZE,
                        data.len()
                    ),
                )
            })?;

        // byte 0: VVSS SSSS, byte 1: SSCC CCCC
        let id = BitField::from_be_u16([bytes[0], bytes[1]]);
        let sequence = BitField::from_be_u32([bytes[2], bytes[3], bytes[4], bytes[5]]);

        let header = Self {
            version: id.bits(0, 2) as u8,
            spacecraft_id: id.bits(2, 8) as u8,
            virtual_channel_id: id.bits(10, 6) as u8,
            counter: sequence.bits(0, 24),
            signalling: sequence.bits(24, 8) as u8,
        };

        trace!(
            "Parsed frame header: scid={}, vcid={}, counter={}",
            header.spacecraft_id, header.virtual_channel_id, header.counter
        );
        Ok(header)
    }
}

/// M-PDU header carried at the start of every frame data field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MpduHeader {
    pub first_header_pointer: u16,
}

impl MpduHeader {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let bytes: [u8; MPDU_HEADER_SIZE] =
            data.get(..MPDU_HEADER_SIZE).and_then(|b| b.try_into().ok()).ok_or_else(|| {
                DemuxError::parse_error(
                    "M-PDU header parsing",
                    format!("Need {} bytes for an M-PDU header, have {}", MPDU_HEADER_SIZE, data.len()),
                )
            })?;

        let word = BitField::from_be_u16(bytes);
        Ok(Self { first_header_pointer: word.bits(5, 11) as u16 })
    }

    /// Whether a packet header starts somewhere in this frame.
    pub fn has_packet_start(&self) -> bool {
        self.first_header_pointer != NO_HEADER_POINTER
    }
}

/// Smallest frame size that still carries at least one packet zone byte.
pub fn min_frame_size() -> usize {
    FRAME_HEADER_SIZE + MPDU_HEADER_SIZE + 1
}
