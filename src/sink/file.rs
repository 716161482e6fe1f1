//! LRIT segment file writer
//!
//! Output layout under the channel directory:
//!
//! - compressed groups: one file per segment, `{apid}_{version}_{seq}.lrit`,
//!   merged by the decompressor when the group ends
//! - uncompressed groups: a single `{apid}_{version}.lrit`, truncated by the
//!   opening segment and appended to by the rest of the group
//!
//! A configured decompressor's extension replaces `lrit`, so the segments it
//! removes are the ones written here.

use super::{PacketSink, SinkOutcome};
use crate::collaborators::{
    CommandDecompressor, DecompressRequest, Decompressor, FileManager, HeaderParser,
    IMAGE_STRUCTURE_TYPE, LogFileManager, LritHeaderParser, NOAA_SPECIFIC_TYPE,
};
use crate::config::{DemuxConfig, TRANSPORT_PREFIX_LEN};
use crate::crc;
use crate::types::{CRC_SIZE, DemuxStats, PendingPacket, StreamContext};
use crate::{Anomaly, DemuxError, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const SEGMENT_EXTENSION: &str = "lrit";

/// Writes validated packet payloads to segment files.
pub struct FileSink {
    channel_dir: PathBuf,
    transport_prefix_len: usize,
    export_corrupt: bool,
    header_parser: Box<dyn HeaderParser>,
    decompressor: Option<Box<dyn Decompressor>>,
    file_manager: Box<dyn FileManager>,
    extension: String,
    dir_ready: bool,
}

impl FileSink {
    /// Sink writing into `channel_dir` with the default collaborators and no
    /// decompressor.
    pub fn new(channel_dir: impl Into<PathBuf>) -> Self {
        Self {
            channel_dir: channel_dir.into(),
            transport_prefix_len: TRANSPORT_PREFIX_LEN,
            export_corrupt: false,
            header_parser: Box::new(LritHeaderParser),
            decompressor: None,
            file_manager: Box::new(LogFileManager::default()),
            extension: SEGMENT_EXTENSION.to_string(),
            dir_ready: false,
        }
    }

    pub fn from_config(config: &DemuxConfig) -> Self {
        let mut sink = Self::new(config.channel_dir())
            .with_transport_prefix_len(config.transport_prefix_len)
            .with_export_corrupt(config.export_corrupt);
        if let Some(decompressor) = &config.decompressor {
            sink.extension = decompressor.extension.clone();
            sink.decompressor = Some(Box::new(CommandDecompressor::new(decompressor.clone())));
        }
        sink
    }

    pub fn with_transport_prefix_len(mut self, len: usize) -> Self {
        self.transport_prefix_len = len;
        self
    }

    pub fn with_export_corrupt(mut self, export_corrupt: bool) -> Self {
        self.export_corrupt = export_corrupt;
        self
    }

    pub fn with_header_parser(mut self, parser: impl HeaderParser + 'static) -> Self {
        self.header_parser = Box::new(parser);
        self
    }

    pub fn with_decompressor(mut self, decompressor: impl Decompressor + 'static) -> Self {
        self.decompressor = Some(Box::new(decompressor));
        self
    }

    pub fn with_file_manager(mut self, manager: impl FileManager + 'static) -> Self {
        self.file_manager = Box::new(manager);
        self
    }

    /// File extension of written segments, without the dot.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn channel_dir(&self) -> &Path {
        &self.channel_dir
    }

    fn segment_path(&self, packet: &PendingPacket, compressed: bool) -> PathBuf {
        let name = if compressed {
            format!(
                "{}_{}_{}.{}",
                packet.apid(),
                packet.header.version,
                packet.sequence_count(),
                self.extension
            )
        } else {
            format!("{}_{}.{}", packet.apid(), packet.header.version, self.extension)
        };
        self.channel_dir.join(name)
    }

    fn write_segment(&mut self, path: &Path, bytes: &[u8], append: bool) -> Result<()> {
        if !self.dir_ready {
            fs::create_dir_all(&self.channel_dir)
                .map_err(|e| DemuxError::output_error(self.channel_dir.clone(), e))?;
            self.dir_ready = true;
        }

        let mut options = OpenOptions::new();
        if append {
            options.append(true).create(true);
        } else {
            options.write(true).create(true).truncate(true);
        }

        let mut file =
            options.open(path).map_err(|e| DemuxError::output_error(path.to_path_buf(), e))?;
        file.write_all(bytes).map_err(|e| DemuxError::output_error(path.to_path_buf(), e))
    }

    fn apply_sub_headers(&self, payload: &[u8], stream: &mut StreamContext) {
        let headers = payload.get(self.transport_prefix_len..).unwrap_or(&[]);
        for record in self.header_parser.parse(headers) {
            if record.record_type == IMAGE_STRUCTURE_TYPE || record.record_type == NOAA_SPECIFIC_TYPE {
                stream.is_compressed = record.compression != 0;
            }
            if record.record_type == IMAGE_STRUCTURE_TYPE {
                stream.pixel_count = record.columns;
            }
        }
    }

    fn finish_group(
        &mut self,
        packet: &PendingPacket,
        path: &Path,
        stream: &StreamContext,
        stats: &mut DemuxStats,
    ) {
        info!(
            "Ending file {}_{}_{} ({} bytes in group)",
            packet.apid(),
            packet.header.version,
            packet.sequence_count(),
            stream.group_bytes
        );

        let finished = if stream.is_compressed {
            let Some(decompressor) = self.decompressor.as_mut() else {
                debug!("No decompressor configured; leaving segments of APID {}", packet.apid());
                return;
            };
            let Some((start_segment, end_segment)) = stream.segment_range() else {
                warn!("Group of APID {} ended without a known start segment", packet.apid());
                return;
            };

            let request = DecompressRequest {
                prefix: self.channel_dir.join(format!("{}_{}_", packet.apid(), packet.header.version)),
                pixel_count: stream.pixel_count,
                start_segment,
                end_segment,
            };
            stats.decompressions += 1;
            decompressor.decompress(&request)
        } else {
            path.to_path_buf()
        };

        self.file_manager.manage_file(&finished);
        stats.files_managed += 1;
    }
}

impl PacketSink for FileSink {
    fn accept(
        &mut self,
        mut packet: PendingPacket,
        stream: &mut StreamContext,
        stats: &mut DemuxStats,
    ) -> Result<SinkOutcome> {
        if packet.header.is_fill() {
            stats.record(&Anomaly::FillPacketSkip);
            return Ok(SinkOutcome::SkippedFill);
        }

        let apid = packet.apid();
        let size = packet.size();
        let expected_len = size + CRC_SIZE;
        if packet.data.len() != expected_len {
            stats.record(&Anomaly::PacketSizeMismatch {
                apid,
                expected: size,
                found: packet.data.len().saturating_sub(CRC_SIZE),
            });
            if packet.data.len() < expected_len {
                warn!("Dropping short packet {} of APID {}", packet.sequence_count(), apid);
                return Ok(SinkOutcome::Discarded);
            }
            packet.data.truncate(expected_len);
        }

        let flag = packet.sequence_flag();
        let (payload, expected_crc) = crc::split_trailer(&packet.data).unwrap_or((&[], 0));

        if flag.starts_group() {
            self.apply_sub_headers(payload, stream);
            info!(
                "Starting file {}_{}_{} (compressed: {}, pixels: {})",
                apid,
                packet.header.version,
                packet.sequence_count(),
                stream.is_compressed,
                stream.pixel_count
            );
        }

        if packet.frames_dropped {
            warn!("Packet {} of APID {} spans dropped frames", packet.sequence_count(), apid);
        }

        let computed = crc::calc_crc(payload);
        let crc_ok = computed == expected_crc;
        if !crc_ok {
            stats.record(&Anomaly::CrcMismatch { apid, expected: expected_crc, computed });
            if !self.export_corrupt {
                return Ok(SinkOutcome::Discarded);
            }
            stats.corrupt_exported += 1;
        }

        let path = self.segment_path(&packet, stream.is_compressed);
        let content = if flag.starts_group() {
            payload.get(self.transport_prefix_len..).unwrap_or(&[])
        } else {
            payload
        };
        let append = !stream.is_compressed && !flag.starts_group();

        let written = content.len();
        self.write_segment(&path, content, append)?;
        debug!("Wrote {} bytes of APID {} to {}", written, apid, path.display());

        if flag.starts_group() {
            stream.group_bytes = written;
        } else {
            stream.group_bytes += written;
        }
        stats.packets_saved += 1;

        if flag.ends_group() {
            self.finish_group(&packet, &path, stream, stats);
        }

        Ok(SinkOutcome::Written { path, corrupt: !crc_ok })
    }
}
