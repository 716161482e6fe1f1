//! Core types for frame and packet representation.
//!
//! - [`Frame`] is one virtual channel data unit with its packet zone
//! - [`PrimaryHeader`] and [`SequenceFlag`] describe a space packet header
//! - [`PendingPacket`] accumulates a packet that straddles frames
//! - [`StreamContext`] carries per-APID group state across packets
//! - [`DemuxStats`] and [`DemuxReport`] tally what happened during a run
//! - [`BitField`] gives MSB-relative access to big-endian header words
//!
//! ## Usage Example
//!
//! ```rust
//! use lrit_demux::types::{PrimaryHeader, SequenceFlag};
//!
//! let header = PrimaryHeader::parse(&[0x00, 0x0D, 0xC0, 0x2A, 0x00, 0x09]).unwrap();
//! assert_eq!(header.apid, 13);
//! assert_eq!(header.sequence_flag, SequenceFlag::Standalone);
//! assert_eq!(header.sequence_count, 42);
//! assert_eq!(header.data_size(), 8);
//! ```

mod bitfield;
mod frame;
mod packet;
mod report;
mod stream;

pub use bitfield::{BitField, FRAME_COUNTER_MODULUS, counter_after_u24, counter_gap_u24};
pub use frame::Frame;
pub use packet::{
    CRC_SIZE, FILL_APID, PRIMARY_HEADER_SIZE, PendingPacket, PrimaryHeader, SequenceFlag,
};
pub use report::{DemuxReport, DemuxStats};
pub use stream::StreamContext;
