//! Test utilities for building synthetic channel captures
//!
//! Real downlink captures are large and not redistributable, so tests and
//! benchmarks synthesise them: [`encode_packet`] builds a space packet with a
//! valid checksum, and [`MpduMuxer`] lays a packet stream across fixed-size
//! frames with correct first header pointers, the way the spacecraft does.

#![cfg(any(test, feature = "benchmark"))]

use crate::collaborators::{DecompressRequest, Decompressor, FileManager};
use crate::crc::calc_crc;
use crate::frame::format::{FRAME_HEADER_SIZE, MPDU_HEADER_SIZE, NO_HEADER_POINTER};
use crate::types::{FILL_APID, SequenceFlag};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Spacecraft id written into synthetic frame headers.
pub const TEST_SPACECRAFT_ID: u8 = 0x9D;

/// Encode one frame. The packet zone is padded with idle `0xFF` bytes.
pub fn encode_frame(frame_size: usize, vcid: u8, counter: u32, fhp: u16, zone: &[u8]) -> Vec<u8> {
    let zone_len = frame_size - FRAME_HEADER_SIZE - MPDU_HEADER_SIZE;
    assert!(zone.len() <= zone_len, "zone of {} bytes exceeds {}", zone.len(), zone_len);

    let mut frame = Vec::with_capacity(frame_size);
    frame.push(TEST_SPACECRAFT_ID >> 2);
    frame.push(((TEST_SPACECRAFT_ID & 0x03) << 6) | (vcid & 0x3F));
    frame.extend_from_slice(&((counter & 0xFF_FFFF) << 8).to_be_bytes());
    frame.extend_from_slice(&(fhp & NO_HEADER_POINTER).to_be_bytes());
    frame.extend_from_slice(zone);
    frame.resize(frame_size, 0xFF);
    frame
}

/// Encode a primary header for a packet carrying `packet_len` bytes after it.
pub fn encode_primary_header(apid: u16, flag: SequenceFlag, sequence: u16, packet_len: usize) -> [u8; 6] {
    let id = apid & 0x07FF;
    let seq = ((flag as u16) << 14) | (sequence & 0x3FFF);
    let len = (packet_len - 1) as u16;
    let [a, b] = id.to_be_bytes();
    let [c, d] = seq.to_be_bytes();
    let [e, f] = len.to_be_bytes();
    [a, b, c, d, e, f]
}

/// Encode a packet with user data and a valid checksum trailer.
pub fn encode_packet(apid: u16, flag: SequenceFlag, sequence: u16, user_data: &[u8]) -> Vec<u8> {
    encode_packet_with_crc(apid, flag, sequence, user_data, calc_crc(user_data))
}

/// Encode a packet with an explicit checksum trailer.
pub fn encode_packet_with_crc(
    apid: u16,
    flag: SequenceFlag,
    sequence: u16,
    user_data: &[u8],
    crc: u16,
) -> Vec<u8> {
    let mut packet = encode_primary_header(apid, flag, sequence, user_data.len() + 2).to_vec();
    packet.extend_from_slice(user_data);
    packet.extend_from_slice(&crc.to_be_bytes());
    packet
}

/// Encode a fill packet occupying exactly `total_len` bytes (at least 7).
pub fn encode_fill_packet(total_len: usize) -> Vec<u8> {
    let mut packet =
        encode_primary_header(FILL_APID, SequenceFlag::Standalone, 0, total_len - 6).to_vec();
    packet.resize(total_len, 0x55);
    packet
}

/// LRIT primary header record announcing `header_len` bytes of headers.
pub fn primary_header_record(file_type: u8, header_len: u32) -> Vec<u8> {
    let mut record = vec![0, 0x00, 16, file_type];
    record.extend_from_slice(&header_len.to_be_bytes());
    record.extend_from_slice(&0u64.to_be_bytes());
    record
}

/// LRIT image structure record.
pub fn image_structure_record(bits_per_pixel: u8, columns: u16, lines: u16, compression: u8) -> Vec<u8> {
    let mut record = vec![1, 0x00, 9, bits_per_pixel];
    record.extend_from_slice(&columns.to_be_bytes());
    record.extend_from_slice(&lines.to_be_bytes());
    record.push(compression);
    record
}

/// User data for the opening segment of a group: the transport prefix followed
/// by LRIT headers describing an image.
pub fn first_segment_data(transport_prefix_len: usize, columns: u16, compression: u8, body: &[u8]) -> Vec<u8> {
    let mut data = vec![0xA5; transport_prefix_len];
    data.extend(primary_header_record(0, 16 + 9));
    data.extend(image_structure_record(8, columns, 1, compression));
    data.extend_from_slice(body);
    data
}

/// Lays a byte stream of packets across frames.
#[derive(Debug, Clone)]
pub struct MpduMuxer {
    frame_size: usize,
    vcid: u8,
    first_counter: u32,
    stream: Vec<u8>,
    starts: Vec<usize>,
}

impl MpduMuxer {
    pub fn new(frame_size: usize) -> Self {
        Self { frame_size, vcid: 13, first_counter: 0, stream: Vec::new(), starts: Vec::new() }
    }

    pub fn starting_at(mut self, counter: u32) -> Self {
        self.first_counter = counter;
        self
    }

    pub fn zone_len(&self) -> usize {
        self.frame_size - FRAME_HEADER_SIZE - MPDU_HEADER_SIZE
    }

    /// Append a packet; its first byte becomes a header pointer target.
    pub fn push_packet(&mut self, packet: &[u8]) -> &mut Self {
        self.starts.push(self.stream.len());
        self.stream.extend_from_slice(packet);
        self
    }

    /// Append bytes that do not start a packet.
    pub fn push_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.stream.extend_from_slice(bytes);
        self
    }

    /// Split the stream into frames with consecutive counters.
    ///
    /// Idle padding after the last packet is marked as a header start so the
    /// final packet is delimited by a pointer.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        let zone_len = self.zone_len();
        let frame_count = self.stream.len().div_ceil(zone_len).max(1);
        let mut starts = self.starts.clone();
        if self.stream.len() % zone_len != 0 {
            starts.push(self.stream.len());
        }

        (0..frame_count)
            .map(|k| {
                let begin = k * zone_len;
                let end = (begin + zone_len).min(self.stream.len());
                let zone = self.stream.get(begin..end).unwrap_or(&[]);
                let fhp = starts
                    .iter()
                    .find(|&&s| s >= begin && s < begin + zone_len)
                    .map(|&s| (s - begin) as u16)
                    .unwrap_or(NO_HEADER_POINTER);
                let counter = self.first_counter.wrapping_add(k as u32);
                encode_frame(self.frame_size, self.vcid, counter, fhp, zone)
            })
            .collect()
    }

    /// Concatenated capture of all frames.
    pub fn capture(&self) -> Vec<u8> {
        self.frames().concat()
    }
}

/// File manager whose handled paths stay visible through clones.
#[derive(Debug, Clone, Default)]
pub struct RecordingFileManager {
    files: Rc<RefCell<Vec<PathBuf>>>,
}

impl RecordingFileManager {
    pub fn files(&self) -> Vec<PathBuf> {
        self.files.borrow().clone()
    }
}

impl FileManager for RecordingFileManager {
    fn manage_file(&mut self, path: &Path) {
        self.files.borrow_mut().push(path.to_path_buf());
    }
}

/// Decompressor that records requests and returns `{prefix}_decomp{start}.lrit`
/// without touching the filesystem.
#[derive(Debug, Clone, Default)]
pub struct RecordingDecompressor {
    requests: Rc<RefCell<Vec<DecompressRequest>>>,
}

impl RecordingDecompressor {
    pub fn requests(&self) -> Vec<DecompressRequest> {
        self.requests.borrow().clone()
    }
}

impl Decompressor for RecordingDecompressor {
    fn decompress(&mut self, request: &DecompressRequest) -> PathBuf {
        self.requests.borrow_mut().push(request.clone());
        request.prefixed(&format!("_decomp{}.lrit", request.start_segment))
    }
}
