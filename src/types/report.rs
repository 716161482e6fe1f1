//! Running counters and the end-of-stream report

use crate::Anomaly;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Counters tallied while a channel is decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemuxStats {
    pub frames_read: u64,
    pub frames_dropped: u64,
    pub counter_regressions: u64,
    pub invalid_pointers: u64,
    pub truncated_tail_bytes: u64,
    pub packets_saved: u64,
    pub crc_failures: u64,
    pub corrupt_exported: u64,
    pub orphan_segments: u64,
    pub size_mismatches: u64,
    pub corrupt_packets: u64,
    pub fill_packets: u64,
    pub files_managed: u64,
    pub decompressions: u64,
}

impl DemuxStats {
    /// Tally a non-fatal condition and log it.
    pub fn record(&mut self, anomaly: &Anomaly) {
        match anomaly {
            Anomaly::TruncatedTail { remaining, .. } => self.truncated_tail_bytes += remaining,
            Anomaly::FrameSequenceGap { dropped, .. } => self.frames_dropped += *dropped as u64,
            Anomaly::CounterRegression { .. } => self.counter_regressions += 1,
            Anomaly::InvalidHeaderPointer { .. } => self.invalid_pointers += 1,
            Anomaly::OrphanSegment { .. } => self.orphan_segments += 1,
            Anomaly::PacketSizeMismatch { expected, found, .. } => {
                self.size_mismatches += 1;
                if found < expected {
                    self.corrupt_packets += 1;
                }
            }
            Anomaly::CrcMismatch { .. } => self.crc_failures += 1,
            Anomaly::FillPacketSkip => {
                self.fill_packets += 1;
                debug!("{}", anomaly);
                return;
            }
        }
        warn!("{}", anomaly);
    }
}

/// Report emitted once when a channel capture is exhausted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemuxReport {
    pub channel_id: String,
    #[serde(flatten)]
    pub stats: DemuxStats,
}

impl DemuxReport {
    pub fn new(channel_id: impl Into<String>, stats: DemuxStats) -> Self {
        Self { channel_id: channel_id.into(), stats }
    }
}

impl fmt::Display for DemuxReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.stats;
        writeln!(f, "Report for channel {}:", self.channel_id)?;
        writeln!(f, "\tTotal Frames Dropped: {}", s.frames_dropped)?;
        writeln!(f, "\tTotal Saved Packets: {}", s.packets_saved)?;
        writeln!(f, "\tTotal Packet CRC Fails: {}", s.crc_failures)?;
        writeln!(f, "\tFrames Read: {}", s.frames_read)?;
        writeln!(f, "\tOrphan Segments: {}", s.orphan_segments)?;
        writeln!(f, "\tSize Mismatches: {} ({} short)", s.size_mismatches, s.corrupt_packets)?;
        write!(f, "\tFill Packets: {}", s.fill_packets)
    }
}
