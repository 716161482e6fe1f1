//! Frame-to-packet demultiplexer for LRIT satellite downlink channels.
//!
//! A ground station records each virtual channel of the downlink as a flat
//! capture of fixed-size frames. This crate turns such a capture back into
//! the space packets it carries and writes them out as LRIT segment files.
//!
//! # Features
//!
//! - **Frame reading**: counter tracking with 24-bit wrap-around and drop detection
//! - **Reassembly**: packets straddling any number of frames, driven by the
//!   M-PDU first header pointer
//! - **Validation**: the ground segment's packet CRC-16, size checks and
//!   orphan segment detection
//! - **Pluggable output**: sub-header parsing, decompression and file handling
//!   are traits with default implementations
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use lrit_demux::{DemuxConfig, DemuxSession};
//!
//! fn main() -> lrit_demux::Result<()> {
//!     let config = DemuxConfig::new("13", "channels");
//!     let report = DemuxSession::open(config)?.run()?;
//!
//!     println!("{}", report);
//!     Ok(())
//! }
//! ```
//!
//! Lower-level pieces ([`FrameReader`], [`Demultiplexer`], [`FileSink`]) can
//! be wired together directly when frames come from somewhere other than a file.

// Core types and error handling
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Decoding pipeline
pub mod crc;
pub mod demux;
pub mod frame;
pub mod session;
pub mod sink;

// Configuration and external collaborators
pub mod collaborators;
pub mod config;

// Core exports
pub use error::*;
pub use types::*;

// Pipeline exports
pub use collaborators::{
    CommandDecompressor, DecompressRequest, Decompressor, DecompressorConfig, FileManager,
    HeaderParser, HeaderRecord, LogFileManager, LritHeaderParser,
};
pub use config::DemuxConfig;
pub use demux::{Demultiplexer, InFlight, PacketParser, Parsed};
pub use frame::{FrameHeader, FrameReader, MpduHeader};
pub use session::DemuxSession;
pub use sink::{CollectingSink, FileSink, PacketSink, SinkOutcome};
