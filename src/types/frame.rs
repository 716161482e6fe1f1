//! Frame type flowing from the reader into the demultiplexer

use crate::frame::format::{FRAME_HEADER_SIZE, FrameHeader, MPDU_HEADER_SIZE, MpduHeader};
use crate::{Anomaly, Result};

/// One virtual channel data unit pulled off the capture.
///
/// `dropped` is the number of frames the reader inferred as lost between the
/// previous frame and this one; `discontinuity` carries the counter anomaly
/// (a gap or a regression) when there was one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub mpdu: MpduHeader,
    /// Packet zone bytes (M-PDU header stripped).
    pub data: Vec<u8>,
    pub dropped: u32,
    pub discontinuity: Option<Anomaly>,
}

impl Frame {
    /// Parse a full frame buffer. Drop accounting is left to the reader.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let header = FrameHeader::parse(raw)?;
        let mpdu = MpduHeader::parse(&raw[FRAME_HEADER_SIZE..])?;
        let data = raw[FRAME_HEADER_SIZE + MPDU_HEADER_SIZE..].to_vec();

        Ok(Self { header, mpdu, data, dropped: 0, discontinuity: None })
    }

    pub fn counter(&self) -> u32 {
        self.header.counter
    }

    pub fn first_header_pointer(&self) -> u16 {
        self.mpdu.first_header_pointer
    }

    /// Whether anything happened upstream that degrades the packet in flight.
    pub fn is_discontinuous(&self) -> bool {
        self.discontinuity.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_both_headers() {
        let mut raw = vec![0x00, 0x0D, 0x00, 0x00, 0x07, 0x00, 0x00, 0x04];
        raw.extend_from_slice(&[0xAA; 20]);

        let frame = Frame::parse(&raw).expect("valid frame");
        assert_eq!(frame.counter(), 7);
        assert_eq!(frame.first_header_pointer(), 4);
        assert_eq!(frame.data.len(), 20);
        assert!(!frame.is_discontinuous());
    }

    #[test]
    fn rejects_frames_without_mpdu_header() {
        assert!(Frame::parse(&[0u8; 7]).is_err());
    }
}
