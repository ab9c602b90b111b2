//! Player configuration
//!
//! Settings are read from a TOML file. Every field has a default, so a
//! missing file or a partial file is fine:
//!
//! ```toml
//! [decode]
//! jitter_budget_ms = 80
//! clock_mode = "arrival_time"
//! uninterrupted = false
//! sync_mode = "overlap"
//!
//! [output]
//! device = "pulse"
//! frames_per_buffer = 512
//! output_channels = 2
//!
//! [codecs]
//! opus_payload_type = 111
//! ```

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::error::ConfigError;

/// Which clock a packet's playout instant is measured against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockMode {
    /// Packets play when they arrived on the wire
    #[default]
    ArrivalTime,
    /// Packets play when the sender stamped them; nothing is ever late
    MediaTimestamp,
}

/// How two selected tracks are laid onto the shared frame counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Play only the wall-clock interval both tracks cover
    #[default]
    Overlap,
    /// Play everything; the later track gets a silent lead-in
    Union,
}

/// Jitter simulation settings used by a decode pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    pub jitter_budget_ms: u32,
    pub clock_mode: ClockMode,
    pub uninterrupted: bool,
    pub sync_mode: SyncMode,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            jitter_budget_ms: DEFAULT_JITTER_BUFFER_MS,
            clock_mode: ClockMode::default(),
            uninterrupted: false,
            sync_mode: SyncMode::default(),
        }
    }
}

impl DecodeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jitter_budget_ms > MAX_JITTER_BUDGET_MS {
            return Err(ConfigError::JitterBudget(self.jitter_budget_ms));
        }
        Ok(())
    }

    /// Whether switching to `other` invalidates already decoded tracks.
    /// The sync mode only affects alignment, which is recomputed on play.
    pub fn requires_redecode(&self, other: &DecodeConfig) -> bool {
        self.jitter_budget_ms != other.jitter_budget_ms
            || self.clock_mode != other.clock_mode
            || self.uninterrupted != other.uninterrupted
    }
}

/// Audio output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output device name; `None` uses the host default
    pub device: Option<String>,
    pub frames_per_buffer: u32,
    pub output_channels: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            device: None,
            frames_per_buffer: DEFAULT_FRAMES_PER_BUFFER,
            output_channels: DEFAULT_OUTPUT_CHANNELS,
        }
    }
}

impl OutputConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_channels == 0 || self.output_channels > 8 {
            return Err(ConfigError::OutputChannels(self.output_channels));
        }
        if self.frames_per_buffer == 0 || self.frames_per_buffer > 16384 {
            return Err(ConfigError::FramesPerBuffer(self.frames_per_buffer));
        }
        Ok(())
    }
}

/// Payload type assignments for codecs without a static RTP number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub opus_payload_type: Option<u8>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            opus_payload_type: Some(DEFAULT_OPUS_PAYLOAD_TYPE),
        }
    }
}

impl CodecConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.opus_payload_type {
            Some(pt) if !(96..=127).contains(&pt) => Err(ConfigError::PayloadType(pt)),
            _ => Ok(()),
        }
    }
}

/// Complete player configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub decode: DecodeConfig,
    pub output: OutputConfig,
    pub codecs: CodecConfig,
}

impl PlayerConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: PlayerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> crate::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                tracing::info!("Loading configuration from {}", path.display());
                Ok(Self::from_toml_str(&content)?)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No configuration at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Load from the platform configuration directory
    pub fn load_default() -> crate::Result<Self> {
        Self::load(&default_config_path()?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.decode.validate()?;
        self.output.validate()?;
        self.codecs.validate()
    }
}

/// `<config dir>/rtp-player/config.toml` for the current platform
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    ProjectDirs::from("", "", "rtp-player")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .ok_or(ConfigError::NoConfigDir)
}
