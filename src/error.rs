//! Error types for channel demultiplexing.
//!
//! Two families live here:
//!
//! - [`DemuxError`] is returned through [`Result`] and stops a run. Only a small
//!   set of conditions are fatal: the input capture cannot be opened or read, an
//!   output artifact cannot be written, or the configuration is unusable.
//! - [`Anomaly`] describes everything that degrades gracefully while decoding a
//!   downlink (dropped frames, orphan segments, checksum failures and so on).
//!   Anomalies are tallied in [`DemuxStats`](crate::DemuxStats) and logged, never
//!   returned as errors.
//!
//! ## Recovery
//!
//! ```rust
//! use lrit_demux::DemuxError;
//! use std::path::PathBuf;
//!
//! let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
//! let error = DemuxError::file_error(PathBuf::from("channels/channel_13.bin"), io_err);
//! assert!(error.is_fatal());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for demultiplexer operations.
pub type Result<T, E = DemuxError> = std::result::Result<T, E>;

/// Fatal error type for demultiplexer operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DemuxError {
    #[error("Input capture error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Output artifact error: {path}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },
}

impl DemuxError {
    /// Returns whether this error should end the run.
    ///
    /// Parse errors only surface when a caller hands a header parser a slice
    /// that is too short; the demultiplexer itself never lets them escape.
    pub fn is_fatal(&self) -> bool {
        match self {
            DemuxError::File { .. } => true,
            DemuxError::Output { .. } => true,
            DemuxError::Config { .. } => true,
            DemuxError::Parse { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            DemuxError::File { .. } => vec![
                "Check the channel capture file exists and is readable",
                "Verify the channel id matches the capture file name",
                "Check file permissions",
            ],
            DemuxError::Output { .. } => vec![
                "Ensure the output directory is writable",
                "Ensure sufficient disk space",
                "Check that no other process holds the output file",
            ],
            DemuxError::Config { .. } => vec![
                "Check the frame size matches the downlink profile",
                "Verify the decompressor program is set when decompression is enabled",
            ],
            DemuxError::Parse { .. } => vec![
                "Check the buffer holds a complete header",
                "Verify source data integrity",
            ],
        }
    }

    /// Helper constructor for input errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        DemuxError::File { path, source }
    }

    /// Helper constructor for output errors with path context.
    pub fn output_error(path: PathBuf, source: std::io::Error) -> Self {
        DemuxError::Output { path, source }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(reason: impl Into<String>) -> Self {
        DemuxError::Config { reason: reason.into() }
    }

    /// Helper constructor for header parse errors.
    pub fn parse_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        DemuxError::Parse { context: context.into(), details: details.into() }
    }
}

impl From<std::io::Error> for DemuxError {
    fn from(err: std::io::Error) -> Self {
        DemuxError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}

/// Non-fatal conditions met while decoding a channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    #[error("{remaining} trailing bytes are not enough for a {frame_size}-byte frame")]
    TruncatedTail { remaining: u64, frame_size: usize },

    #[error("frame counter jumped from {last} to {found}: {dropped} frames dropped")]
    FrameSequenceGap { last: u32, found: u32, dropped: u32 },

    #[error("frame counter went from {last} back to {found}")]
    CounterRegression { last: u32, found: u32 },

    #[error("first header pointer {pointer} lies outside the {zone_len}-byte packet zone")]
    InvalidHeaderPointer { pointer: u16, zone_len: usize },

    #[error("orphan {flag} segment {sequence} for APID {apid} without a first segment")]
    OrphanSegment { apid: u16, sequence: u16, flag: &'static str },

    #[error("packet size mismatch for APID {apid}: expected {expected} bytes, found {found}")]
    PacketSizeMismatch { apid: u16, expected: usize, found: usize },

    #[error("CRC mismatch for APID {apid}: expected {expected:#06x}, computed {computed:#06x}")]
    CrcMismatch { apid: u16, expected: u16, computed: u16 },

    #[error("fill packet skipped")]
    FillPacketSkip,
}
