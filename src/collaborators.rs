//! Collaborator traits invoked by the packet sink
//!
//! The sink hands finished packets to three external concerns that the
//! demultiplexer does not own: sub-header interpretation, decompression of
//! segmented compressed images, and downstream handling of finished files.
//! Each is a trait so tests (or other ground stations) can substitute their
//! own implementation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

/// LRIT header record type of the primary header.
pub const PRIMARY_HEADER_TYPE: u8 = 0;
/// LRIT header record type of the image structure header.
pub const IMAGE_STRUCTURE_TYPE: u8 = 1;
/// NOAA specific header record type.
pub const NOAA_SPECIFIC_TYPE: u8 = 129;

/// One header record discovered in the first segment of a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderRecord {
    pub record_type: u8,
    pub compression: u8,
    pub columns: u16,
}

/// Interprets the sub-headers at the start of a group's first segment.
pub trait HeaderParser {
    /// Return the header records found in `data`, in file order.
    fn parse(&self, data: &[u8]) -> Vec<HeaderRecord>;
}

/// Parameters for merging the segments of a compressed group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecompressRequest {
    /// Path prefix shared by the segment files (`{dir}/{apid}_{version}_`).
    pub prefix: PathBuf,
    pub pixel_count: u16,
    pub start_segment: u16,
    pub end_segment: u16,
}

impl DecompressRequest {
    /// `{prefix}{suffix}` without inserting a path separator.
    pub fn prefixed(&self, suffix: &str) -> PathBuf {
        let mut path: OsString = self.prefix.as_os_str().to_owned();
        path.push(suffix);
        PathBuf::from(path)
    }
}

/// Merges and decompresses the segment files of a compressed group.
///
/// Runs synchronously; failures are the implementation's business and are not
/// reported back to the sink.
pub trait Decompressor {
    /// Produce the merged file and return its path.
    fn decompress(&mut self, request: &DecompressRequest) -> PathBuf;
}

/// Downstream handling of a finished output file.
pub trait FileManager {
    fn manage_file(&mut self, path: &Path);
}

/// Decoder for LRIT header records.
///
/// Each record starts with a type byte and a big-endian record length that
/// includes the three prefix bytes. Parsing stops at the end of the header
/// area announced by the primary header, or at the first malformed record.
#[derive(Debug, Clone, Copy, Default)]
pub struct LritHeaderParser;

impl HeaderParser for LritHeaderParser {
    fn parse(&self, data: &[u8]) -> Vec<HeaderRecord> {
        let mut records = Vec::new();
        let mut limit = data.len();
        let mut offset = 0;

        while offset + 3 <= limit {
            let record_type = data[offset];
            let record_len = u16::from_be_bytes([data[offset + 1], data[offset + 2]]) as usize;
            if record_len < 3 || offset + record_len > data.len() {
                debug!("Stopping header scan at offset {} (record length {})", offset, record_len);
                break;
            }

            let body = &data[offset + 3..offset + record_len];
            let mut record = HeaderRecord { record_type, ..Default::default() };

            match record_type {
                PRIMARY_HEADER_TYPE if body.len() >= 5 => {
                    let header_len = u32::from_be_bytes([body[1], body[2], body[3], body[4]]);
                    limit = limit.min(header_len as usize);
                }
                IMAGE_STRUCTURE_TYPE if body.len() >= 6 => {
                    record.columns = u16::from_be_bytes([body[1], body[2]]);
                    record.compression = body[5];
                }
                NOAA_SPECIFIC_TYPE if body.len() >= 11 => {
                    record.compression = body[10];
                }
                _ => {}
            }

            records.push(record);
            offset += record_len;
        }

        records
    }
}

/// Settings for an external decompression program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompressorConfig {
    pub program: String,
    /// Leading arguments placed before the request parameters.
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub extension: String,
}

impl Default for DecompressorConfig {
    fn default() -> Self {
        Self {
            program: "wine".to_string(),
            args: vec!["Decompress.exe".to_string()],
            env: BTreeMap::from([("WINEDEBUG".to_string(), "-all".to_string())]),
            extension: "lrit".to_string(),
        }
    }
}

/// Runs an external decompression program as a blocking subprocess.
///
/// The program receives `prefix pixels first_data_segment last_segment a` and
/// writes `{prefix}_decomp{start}.{ext}`. The first segment of a group only
/// carries headers, so data starts one segment later. Segment files are
/// removed afterwards whether or not the program succeeded.
#[derive(Debug, Clone)]
pub struct CommandDecompressor {
    config: DecompressorConfig,
}

impl CommandDecompressor {
    pub fn new(config: DecompressorConfig) -> Self {
        Self { config }
    }

    fn segment_path(&self, request: &DecompressRequest, segment: u16) -> PathBuf {
        request.prefixed(&format!("{}.{}", segment, self.config.extension))
    }
}

impl Decompressor for CommandDecompressor {
    fn decompress(&mut self, request: &DecompressRequest) -> PathBuf {
        let output = request
            .prefixed(&format!("_decomp{}.{}", request.start_segment, self.config.extension));

        info!(
            "Decompressing {} segments {}..={} ({} pixels)",
            request.prefix.display(),
            request.start_segment,
            request.end_segment,
            request.pixel_count
        );

        let status = Command::new(&self.config.program)
            .args(&self.config.args)
            .arg(&request.prefix)
            .arg(request.pixel_count.to_string())
            .arg((request.start_segment as u32 + 1).to_string())
            .arg(request.end_segment.to_string())
            .arg("a")
            .envs(&self.config.env)
            .status();

        match status {
            Ok(status) if status.success() => {}
            Ok(status) => warn!("Decompressor {} exited with {}", self.config.program, status),
            Err(e) => warn!("Failed to run decompressor {}: {}", self.config.program, e),
        }

        for segment in request.start_segment..=request.end_segment {
            let path = self.segment_path(request, segment);
            if path.exists() {
                if let Err(e) = std::fs::remove_file(&path) {
                    debug!("Could not remove segment {}: {}", path.display(), e);
                }
            }
        }

        output
    }
}

/// File manager that records handled files and logs them.
#[derive(Debug, Clone, Default)]
pub struct LogFileManager {
    handled: Vec<PathBuf>,
}

impl LogFileManager {
    pub fn handled(&self) -> &[PathBuf] {
        &self.handled
    }
}

impl FileManager for LogFileManager {
    fn manage_file(&mut self, path: &Path) {
        info!("Finished file {}", path.display());
        self.handled.push(path.to_path_buf());
    }
}
