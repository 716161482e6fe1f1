//! Per-APID reassembly context

use super::SequenceFlag;
use serde::{Deserialize, Serialize};

/// Group state kept for one APID for the lifetime of a run.
///
/// A group is the run of segments from a First (or Standalone) segment up to
/// the matching Last segment. Image metadata learned from the sub-header of
/// the opening segment applies to every segment of the group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamContext {
    pub apid: u16,
    pub is_compressed: bool,
    pub pixel_count: u16,
    pub start_segment: Option<u16>,
    pub end_segment: Option<u16>,
    /// Payload bytes written for the current group.
    pub group_bytes: usize,
    open: bool,
}

impl StreamContext {
    pub fn new(apid: u16) -> Self {
        // Matches the decoder's startup assumption until a sub-header says otherwise.
        Self { apid, is_compressed: true, ..Self::default() }
    }

    /// Whether a First segment has been seen without its Last.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Start a new group at `sequence`. Returns the start of an abandoned group, if any.
    pub fn open_group(&mut self, flag: SequenceFlag, sequence: u16) -> Option<u16> {
        let abandoned = if self.open { self.start_segment } else { None };
        self.open = true;
        self.start_segment = Some(sequence);
        self.end_segment = (flag == SequenceFlag::Standalone).then_some(sequence);
        self.group_bytes = 0;
        abandoned
    }

    pub fn mark_end(&mut self, sequence: u16) {
        self.end_segment = Some(sequence);
    }

    pub fn close_group(&mut self) {
        self.open = false;
    }

    /// Sequence range of the group, when both ends are known.
    pub fn segment_range(&self) -> Option<(u16, u16)> {
        Some((self.start_segment?, self.end_segment?))
    }
}
