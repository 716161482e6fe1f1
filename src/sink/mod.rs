//! Destinations for reassembled packets
//!
//! The demultiplexer hands every flushed packet to a [`PacketSink`] together
//! with the group state of its APID. [`FileSink`] writes LRIT segment files;
//! [`CollectingSink`] keeps packets in memory for inspection.

mod file;

pub use file::FileSink;

use crate::types::{DemuxStats, PendingPacket, StreamContext};
use crate::Result;
use std::path::PathBuf;

/// What a sink did with a packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOutcome {
    /// Payload written to `path`; `corrupt` marks a CRC failure exported anyway.
    Written { path: PathBuf, corrupt: bool },
    /// Packet dropped (size or CRC failure).
    Discarded,
    /// Fill packet, never written.
    SkippedFill,
    /// Packet kept by the sink without producing an artifact.
    Retained,
}

/// Receives completed packets from the demultiplexer.
///
/// Implementations may update `stream` (image metadata, group byte count) and
/// tally anomalies in `stats`. Only output failures should be returned as
/// errors; everything else degrades gracefully.
pub trait PacketSink {
    fn accept(
        &mut self,
        packet: PendingPacket,
        stream: &mut StreamContext,
        stats: &mut DemuxStats,
    ) -> Result<SinkOutcome>;
}

/// Sink that stores every packet it is given, in delivery order.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    packets: Vec<PendingPacket>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn packets(&self) -> &[PendingPacket] {
        &self.packets
    }

    pub fn into_packets(self) -> Vec<PendingPacket> {
        self.packets
    }
}

impl PacketSink for CollectingSink {
    fn accept(
        &mut self,
        packet: PendingPacket,
        _stream: &mut StreamContext,
        _stats: &mut DemuxStats,
    ) -> Result<SinkOutcome> {
        self.packets.push(packet);
        Ok(SinkOutcome::Retained)
    }
}

impl<S: PacketSink + ?Sized> PacketSink for Box<S> {
    fn accept(
        &mut self,
        packet: PendingPacket,
        stream: &mut StreamContext,
        stats: &mut DemuxStats,
    ) -> Result<SinkOutcome> {
        (**self).accept(packet, stream, stats)
    }
}
