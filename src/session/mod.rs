//! One decoding run over a channel capture
//!
//! A session wires a [`FrameReader`] to a [`Demultiplexer`] and its sink, runs
//! the capture to exhaustion and produces the end-of-stream [`DemuxReport`].
//!
//! ```rust,no_run
//! use lrit_demux::{DemuxConfig, DemuxSession};
//!
//! fn main() -> lrit_demux::Result<()> {
//!     let config = DemuxConfig::load("lrit.yaml")?;
//!     let _ = config.init_tracing();
//!
//!     let report = DemuxSession::open(config)?.run()?;
//!     println!("{report}");
//!     Ok(())
//! }
//! ```

use crate::config::DemuxConfig;
use crate::demux::Demultiplexer;
use crate::frame::FrameReader;
use crate::sink::{FileSink, PacketSink};
use crate::types::DemuxReport;
use crate::Result;
use std::fs::File;
use std::io::{BufReader, Read};
use tracing::{debug, info};

/// Reader, demultiplexer and sink for one channel.
pub struct DemuxSession<R = BufReader<File>, S = FileSink> {
    config: DemuxConfig,
    reader: FrameReader<R>,
    demux: Demultiplexer<S>,
    report: Option<DemuxReport>,
}

impl DemuxSession {
    /// Open `config.input_path()` and write into `config.channel_dir()`.
    pub fn open(config: DemuxConfig) -> Result<Self> {
        config.validate()?;
        let reader = FrameReader::open(config.input_path(), config.frame_size)?;
        let sink = FileSink::from_config(&config);
        Ok(Self::with_sink(config, reader, sink))
    }
}

impl<R: Read> DemuxSession<R, FileSink> {
    /// Decode frames from any reader, writing files as configured.
    pub fn from_reader(reader: FrameReader<R>, config: DemuxConfig) -> Self {
        let sink = FileSink::from_config(&config);
        Self::with_sink(config, reader, sink)
    }
}

impl<R: Read, S: PacketSink> DemuxSession<R, S> {
    pub fn with_sink(config: DemuxConfig, reader: FrameReader<R>, sink: S) -> Self {
        Self { config, reader, demux: Demultiplexer::new(sink), report: None }
    }

    pub fn config(&self) -> &DemuxConfig {
        &self.config
    }

    pub fn demux(&self) -> &Demultiplexer<S> {
        &self.demux
    }

    pub fn into_sink(self) -> S {
        self.demux.into_sink()
    }

    /// Process the next frame. Returns `false` once the capture is exhausted.
    pub fn step(&mut self) -> Result<bool> {
        match self.reader.read_next_frame()? {
            Some(frame) => {
                self.demux.push_frame(&frame)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Decode the rest of the capture and return the report.
    ///
    /// The report is logged the first time a run completes; later calls
    /// return the same report without reprocessing.
    pub fn run(&mut self) -> Result<DemuxReport> {
        if let Some(report) = &self.report {
            return Ok(report.clone());
        }

        debug!(
            "Decoding channel {} ({} frames of {} bytes)",
            self.config.channel_id,
            self.reader.total_frames(),
            self.reader.frame_size()
        );

        while self.step()? {}

        if let Some(tail) = self.reader.truncated_tail() {
            self.demux.record(tail);
        }
        self.demux.finish()?;

        let report = DemuxReport::new(self.config.channel_id.clone(), self.demux.stats().clone());
        info!("{}", report);
        self.report = Some(report.clone());
        Ok(report)
    }
}

#[cfg(test)]
mod tests;
