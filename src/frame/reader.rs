//! Channel capture reader
//!
//! Pulls fixed-size frames off a channel capture in arrival order and performs
//! frame counter bookkeeping, so the demultiplexer only ever sees parsed
//! [`Frame`]s annotated with how many frames went missing before them.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use lrit_demux::frame::{FRAME_SIZE, FrameReader};
//!
//! fn read_frames() -> lrit_demux::Result<()> {
//!     let mut reader = FrameReader::open("channels/channel_13.bin", FRAME_SIZE)?;
//!     println!("Capture holds {} frames", reader.total_frames());
//!
//!     while let Some(frame) = reader.read_next_frame()? {
//!         println!("Frame {} (dropped before: {})", frame.counter(), frame.dropped);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! The reader is single pass: once it has returned `None` it stays exhausted.

use super::format::min_frame_size;
use crate::types::{Frame, counter_gap_u24};
use crate::{Anomaly, DemuxError, Result};
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Sequential reader over a capture of concatenated frames.
pub struct FrameReader<R = BufReader<File>> {
    source: R,
    path: PathBuf,
    frame_size: usize,
    total_len: u64,
    consumed: u64,
    current_frame: usize,
    last_counter: Option<u32>,
    total_dropped: u64,
    truncated_tail: Option<Anomaly>,
    exhausted: bool,
}

impl FrameReader {
    /// Open a channel capture for reading
    pub fn open<P: AsRef<Path>>(path: P, frame_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| DemuxError::file_error(path.clone(), e))?;
        let total_len =
            file.metadata().map_err(|e| DemuxError::file_error(path.clone(), e))?.len();

        debug!("Opened capture {} ({} bytes)", path.display(), total_len);
        Self::with_source(BufReader::new(file), path, total_len, frame_size)
    }
}

impl FrameReader<Cursor<Vec<u8>>> {
    /// Create a reader over an in-memory capture (for testing)
    pub fn from_bytes(data: Vec<u8>, frame_size: usize) -> Result<Self> {
        let total_len = data.len() as u64;
        Self::with_source(Cursor::new(data), PathBuf::from("<memory>"), total_len, frame_size)
    }
}

impl<R: Read> FrameReader<R> {
    /// Wrap any byte source whose total length is known up front.
    pub fn with_source(source: R, path: PathBuf, total_len: u64, frame_size: usize) -> Result<Self> {
        if frame_size < min_frame_size() {
            return Err(DemuxError::config_error(format!(
                "Frame size {} is below the minimum of {} bytes",
                frame_size,
                min_frame_size()
            )));
        }

        Ok(Self {
            source,
            path,
            frame_size,
            total_len,
            consumed: 0,
            current_frame: 0,
            last_counter: None,
            total_dropped: 0,
            truncated_tail: None,
            exhausted: false,
        })
    }

    /// Number of complete frames in the capture
    pub fn total_frames(&self) -> usize {
        (self.total_len / self.frame_size as u64) as usize
    }

    /// Number of frames read so far
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Frames inferred as lost from counter discontinuities so far
    pub fn total_dropped(&self) -> u64 {
        self.total_dropped
    }

    /// The trailing partial frame, once the reader has reached it
    pub fn truncated_tail(&self) -> Option<&Anomaly> {
        self.truncated_tail.as_ref()
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn file_path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the next frame
    ///
    /// Returns `Ok(None)` at the end of the capture, including when fewer than
    /// `frame_size` bytes remain.
    pub fn read_next_frame(&mut self) -> Result<Option<Frame>> {
        if self.exhausted {
            return Ok(None);
        }

        let remaining = self.total_len.saturating_sub(self.consumed);
        if remaining == 0 {
            self.exhausted = true;
            return Ok(None);
        }
        if remaining < self.frame_size as u64 {
            let anomaly = Anomaly::TruncatedTail { remaining, frame_size: self.frame_size };
            debug!("{}", anomaly);
            self.truncated_tail = Some(anomaly);
            self.exhausted = true;
            return Ok(None);
        }

        let mut raw = vec![0u8; self.frame_size];
        self.source
            .read_exact(&mut raw)
            .map_err(|e| DemuxError::file_error(self.path.clone(), e))?;
        self.consumed += self.frame_size as u64;
        self.current_frame += 1;

        let mut frame = Frame::parse(&raw)?;
        let counter = frame.counter();

        if let Some(last) = self.last_counter {
            match counter_gap_u24(last, counter) {
                Some(0) => {}
                Some(dropped) => {
                    frame.dropped = dropped;
                    frame.discontinuity =
                        Some(Anomaly::FrameSequenceGap { last, found: counter, dropped });
                    self.total_dropped += dropped as u64;
                }
                None => {
                    frame.discontinuity = Some(Anomaly::CounterRegression { last, found: counter })
                }
            }
        }
        self.last_counter = Some(counter);

        trace!(
            "Frame {}/{}: counter={}, fhp={}, dropped={}",
            self.current_frame,
            self.total_frames(),
            counter,
            frame.first_header_pointer(),
            frame.dropped
        );

        Ok(Some(frame))
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => None,
            Err(e) => {
                self.exhausted = true;
                Some(Err(e))
            }
        }
    }
}
