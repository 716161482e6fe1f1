//! Run configuration
//!
//! A run decodes one channel capture. Configuration is plain serde data so it
//! can come from YAML, from code, or from a mix of both:
//!
//! ```rust
//! use lrit_demux::DemuxConfig;
//!
//! let config = DemuxConfig::from_yaml_str(
//!     "channel_id: \"13\"\noutput_dir: /var/lrit/channels\nexport_corrupt: true\n",
//! )
//! .unwrap();
//! assert_eq!(config.frame_size, 892);
//! assert!(config.input_path().ends_with("channel_13.bin"));
//! ```

use crate::collaborators::DecompressorConfig;
use crate::frame::{FRAME_SIZE, min_frame_size};
use crate::{DemuxError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Default length of the transport-layer prefix on opening segments.
pub const TRANSPORT_PREFIX_LEN: usize = 10;

/// Settings for decoding one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemuxConfig {
    /// Channel (virtual channel id) being decoded; names the input and output.
    pub channel_id: String,
    /// Directory holding `channel_{id}.bin` and the per-channel output folders.
    pub output_dir: PathBuf,
    pub frame_size: usize,
    /// Bytes of transport header preceding the LRIT headers in opening segments.
    pub transport_prefix_len: usize,
    /// Write packets that fail the CRC check instead of dropping them.
    pub export_corrupt: bool,
    /// External decompressor; `None` leaves compressed segments as written.
    pub decompressor: Option<DecompressorConfig>,
    /// `tracing` filter directive used by [`DemuxConfig::init_tracing`].
    pub log_filter: String,
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            channel_id: String::new(),
            output_dir: PathBuf::from("channels"),
            frame_size: FRAME_SIZE,
            transport_prefix_len: TRANSPORT_PREFIX_LEN,
            export_corrupt: false,
            decompressor: None,
            log_filter: "info".to_string(),
        }
    }
}

impl DemuxConfig {
    pub fn new(channel_id: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self { channel_id: channel_id.into(), output_dir: output_dir.into(), ..Self::default() }
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)
            .map_err(|e| DemuxError::config_error(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| DemuxError::file_error(path.to_path_buf(), e))?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml_ng::to_string(self)
            .map_err(|e| DemuxError::config_error(format!("Failed to serialize config: {e}")))
    }

    pub fn validate(&self) -> Result<()> {
        if self.channel_id.trim().is_empty() {
            return Err(DemuxError::config_error("Channel id must not be empty"));
        }

        if self.frame_size < min_frame_size() {
            return Err(DemuxError::config_error(format!(
                "Frame size {} is below the minimum of {} bytes",
                self.frame_size,
                min_frame_size()
            )));
        }

        if let Some(decompressor) = &self.decompressor {
            if decompressor.program.trim().is_empty() {
                return Err(DemuxError::config_error("Decompressor program must not be empty"));
            }
        }

        Ok(())
    }

    /// `{output_dir}/channel_{channel_id}.bin`
    pub fn input_path(&self) -> PathBuf {
        self.output_dir.join(format!("channel_{}.bin", self.channel_id))
    }

    /// `{output_dir}/{channel_id}`
    pub fn channel_dir(&self) -> PathBuf {
        self.output_dir.join(&self.channel_id)
    }

    /// Install a global `fmt` subscriber filtered by `log_filter`.
    ///
    /// `RUST_LOG` takes precedence when set. Fails if a subscriber is already
    /// installed.
    pub fn init_tracing(&self) -> Result<()> {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.log_filter))
            .map_err(|e| DemuxError::config_error(format!("Invalid log filter: {e}")))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| DemuxError::config_error(format!("Failed to install subscriber: {e}")))
    }
}
