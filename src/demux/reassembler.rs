//! M-PDU demultiplexer
//!
//! Packets straddle frames freely. The first header pointer of each frame says
//! where the first packet header inside its packet zone begins, so everything
//! before that offset belongs to whatever packet was in flight and everything
//! after it is a fresh run of packets.
//!
//! ## State
//!
//! - `carryover` holds bytes that begin at a packet header but are too short
//!   to contain the header itself; they wait for the next frame.
//! - `in_flight` names what the bytes of the next frame continue: a pending
//!   packet, a packet being discarded (fill or orphan), or nothing.
//! - `pending` holds packets still accumulating, keyed by APID.
//! - `streams` keeps per-APID group state for the life of the run.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use lrit_demux::demux::Demultiplexer;
//! use lrit_demux::frame::{FRAME_SIZE, FrameReader};
//! use lrit_demux::sink::FileSink;
//!
//! fn decode() -> lrit_demux::Result<()> {
//!     let reader = FrameReader::open("channels/channel_13.bin", FRAME_SIZE)?;
//!     let mut demux = Demultiplexer::new(FileSink::new("channels/13"));
//!
//!     for frame in reader {
//!         demux.push_frame(&frame?)?;
//!     }
//!     demux.finish()?;
//!
//!     println!("{} packets saved", demux.stats().packets_saved);
//!     Ok(())
//! }
//! ```

use super::parser::{PacketParser, Parsed};
use crate::frame::NO_HEADER_POINTER;
use crate::sink::PacketSink;
use crate::types::{DemuxStats, Frame, PendingPacket, PrimaryHeader, SequenceFlag, StreamContext};
use crate::{Anomaly, Result};
use std::collections::BTreeMap;
use tracing::{debug, info, trace, warn};

/// What the bytes at the start of the next frame belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InFlight {
    #[default]
    Idle,
    /// A pending packet of this APID is accumulating.
    Packet(u16),
    /// A fill packet or orphan segment runs on; its bytes are dropped.
    Discard,
}

/// Reassembles space packets from the frames of one virtual channel.
pub struct Demultiplexer<S> {
    sink: S,
    stats: DemuxStats,
    streams: BTreeMap<u16, StreamContext>,
    pending: BTreeMap<u16, PendingPacket>,
    in_flight: InFlight,
    carryover: Vec<u8>,
}

impl<S: PacketSink> Demultiplexer<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            stats: DemuxStats::default(),
            streams: BTreeMap::new(),
            pending: BTreeMap::new(),
            in_flight: InFlight::Idle,
            carryover: Vec::new(),
        }
    }

    pub fn stats(&self) -> &DemuxStats {
        &self.stats
    }

    pub fn in_flight(&self) -> InFlight {
        self.in_flight
    }

    pub fn pending(&self, apid: u16) -> Option<&PendingPacket> {
        self.pending.get(&apid)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Group state for `apid`, once a packet of that APID has been seen.
    pub fn stream(&self, apid: u16) -> Option<&StreamContext> {
        self.streams.get(&apid)
    }

    pub fn carryover(&self) -> &[u8] {
        &self.carryover
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Tally a condition noticed outside the demultiplexer (the reader's tail).
    pub fn record(&mut self, anomaly: &Anomaly) {
        self.stats.record(anomaly);
    }

    /// Process one frame.
    ///
    /// Only sink output failures are returned as errors.
    pub fn push_frame(&mut self, frame: &Frame) -> Result<()> {
        self.stats.frames_read += 1;

        if let Some(anomaly) = &frame.discontinuity {
            self.stats.record(anomaly);
            self.mark_in_flight_degraded();
            self.discard_split_header();
        }

        let data = frame.data.as_slice();
        let pointer = frame.first_header_pointer();
        trace!(
            "Frame {}: pointer={}, in_flight={:?}, carryover={}",
            frame.counter(),
            pointer,
            self.in_flight,
            self.carryover.len()
        );

        if pointer == NO_HEADER_POINTER {
            return self.continue_in_flight(data);
        }

        let offset = pointer as usize;
        if offset >= data.len() {
            self.stats.record(&Anomaly::InvalidHeaderPointer { pointer, zone_len: data.len() });
            self.mark_in_flight_degraded();
            self.carryover.clear();
            return Ok(());
        }

        let (head, tail) = data.split_at(offset);

        // A header split across frames completes with the bytes before the pointer.
        let mut head_consumed = false;
        if self.in_flight == InFlight::Idle && !self.carryover.is_empty() {
            self.carryover.extend_from_slice(head);
            self.parse_carryover()?;
            head_consumed = true;
        }

        match std::mem::take(&mut self.in_flight) {
            InFlight::Packet(apid) => {
                if !head_consumed {
                    if let Some(packet) = self.pending.get_mut(&apid) {
                        packet.append(head);
                    }
                }
                self.flush_pending(apid)?;
            }
            InFlight::Discard => trace!("Dropping {} bytes of a skipped packet", head.len()),
            InFlight::Idle => {
                if !head_consumed && !head.is_empty() {
                    debug!("Dropping {} bytes with no packet in flight", head.len());
                }
            }
        }

        if !self.carryover.is_empty() {
            debug!("Resynchronising at header pointer; dropping {} carryover bytes", self.carryover.len());
            self.carryover.clear();
        }

        self.carryover.extend_from_slice(tail);
        self.parse_carryover()
    }

    /// Flush every packet still pending, each exactly once and in APID order.
    ///
    /// Carryover bytes and any packet being discarded are dropped. Calling
    /// this again without new frames does nothing.
    pub fn finish(&mut self) -> Result<()> {
        self.in_flight = InFlight::Idle;

        let pending = std::mem::take(&mut self.pending);
        if !pending.is_empty() {
            debug!("Flushing {} pending packets at end of stream", pending.len());
        }
        for packet in pending.into_values() {
            self.deliver(packet)?;
        }

        if !self.carryover.is_empty() {
            debug!("Dropping {} carryover bytes at end of stream", self.carryover.len());
            self.carryover.clear();
        }
        Ok(())
    }

    fn continue_in_flight(&mut self, data: &[u8]) -> Result<()> {
        match self.in_flight {
            InFlight::Packet(apid) => {
                if let Some(packet) = self.pending.get_mut(&apid) {
                    packet.append(data);
                } else {
                    self.in_flight = InFlight::Idle;
                }
                Ok(())
            }
            InFlight::Discard => {
                trace!("Dropping {} bytes of a skipped packet", data.len());
                Ok(())
            }
            InFlight::Idle => {
                self.carryover.extend_from_slice(data);
                self.parse_carryover()
            }
        }
    }

    fn parse_carryover(&mut self) -> Result<()> {
        let buffer = std::mem::take(&mut self.carryover);

        for parsed in PacketParser::new(&buffer) {
            match parsed {
                Parsed::Complete { header, payload } => {
                    if let Some(packet) = self.start_packet(header, payload) {
                        self.deliver(packet)?;
                    }
                }
                Parsed::Open { header, payload } => match self.start_packet(header, payload) {
                    Some(packet) => {
                        let apid = packet.apid();
                        if let Some(previous) = self.pending.remove(&apid) {
                            warn!("APID {} restarted before its pending packet ended", apid);
                            self.deliver(previous)?;
                        }
                        self.pending.insert(apid, packet);
                        self.in_flight = InFlight::Packet(apid);
                    }
                    None => self.in_flight = InFlight::Discard,
                },
                Parsed::Remainder(rest) => self.carryover = rest.to_vec(),
            }
        }

        Ok(())
    }

    /// Apply group semantics to a freshly parsed header.
    ///
    /// Returns `None` for packets that must not reach the sink: fill packets
    /// and segments whose group was never opened.
    fn start_packet(&mut self, header: PrimaryHeader, payload: &[u8]) -> Option<PendingPacket> {
        if header.is_fill() {
            self.stats.record(&Anomaly::FillPacketSkip);
            return None;
        }

        let apid = header.apid;
        let sequence = header.sequence_count;

        match header.sequence_flag {
            SequenceFlag::First | SequenceFlag::Standalone => {
                let stream = self.streams.entry(apid).or_insert_with(|| StreamContext::new(apid));
                if let Some(abandoned) = stream.open_group(header.sequence_flag, sequence) {
                    warn!("Abandoning group of APID {} started at segment {}", apid, abandoned);
                }
                info!("Starting {} segment {} of APID {}", header.sequence_flag, sequence, apid);
            }
            SequenceFlag::Continuation | SequenceFlag::Last => {
                let Some(stream) = self.streams.get_mut(&apid).filter(|s| s.is_open()) else {
                    self.stats.record(&Anomaly::OrphanSegment {
                        apid,
                        sequence,
                        flag: header.sequence_flag.as_str(),
                    });
                    return None;
                };
                if header.sequence_flag == SequenceFlag::Last {
                    stream.mark_end(sequence);
                }
            }
        }

        debug!("Created packet {} of APID {} with {} bytes", sequence, apid, payload.len());
        Some(PendingPacket::new(header, payload))
    }

    fn flush_pending(&mut self, apid: u16) -> Result<()> {
        match self.pending.remove(&apid) {
            Some(packet) => self.deliver(packet),
            None => Ok(()),
        }
    }

    fn deliver(&mut self, packet: PendingPacket) -> Result<()> {
        let apid = packet.apid();
        let ends_group = packet.sequence_flag().ends_group();
        debug!(
            "Flushing packet {} of APID {} ({} of {} bytes)",
            packet.sequence_count(),
            apid,
            packet.data.len(),
            packet.header.packet_length()
        );

        let stream = self.streams.entry(apid).or_insert_with(|| StreamContext::new(apid));
        let outcome = self.sink.accept(packet, stream, &mut self.stats)?;
        trace!("Sink outcome for APID {}: {:?}", apid, outcome);

        if ends_group {
            stream.close_group();
        }
        Ok(())
    }

    /// A header split across a gap cannot be rejoined; skip to the next pointer.
    fn discard_split_header(&mut self) {
        if self.in_flight == InFlight::Idle && !self.carryover.is_empty() {
            debug!("Dropping {} header bytes cut off by a frame gap", self.carryover.len());
            self.carryover.clear();
            self.in_flight = InFlight::Discard;
        }
    }

    fn mark_in_flight_degraded(&mut self) {
        if let InFlight::Packet(apid) = self.in_flight {
            if let Some(packet) = self.pending.get_mut(&apid) {
                packet.frames_dropped = true;
            }
        }
    }
}
