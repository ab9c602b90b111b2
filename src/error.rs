//! Error types for the RTP player

use thiserror::Error;

/// Main error type for the player
#[derive(Error, Debug)]
pub enum Error {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Track error: {0}")]
    Track(#[from] TrackError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-packet codec failures.
///
/// These never abort a decode pass: the jitter simulator substitutes
/// silence for the packet's nominal duration and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Decoder initialization failed: {0}")]
    DecoderInit(String),

    #[error("Decoding failed: {0}")]
    DecodingFailed(String),

    #[error("Unsupported payload type: {0}")]
    UnsupportedPayloadType(u8),

    #[error("Invalid payload size: {0} bytes")]
    InvalidPayloadSize(usize),
}

/// Configuration errors, surfaced before playback can start
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Jitter budget out of range: {0} ms (expected 0..={})", crate::constants::MAX_JITTER_BUDGET_MS)]
    JitterBudget(u32),

    #[error("Invalid output channel count: {0}")]
    OutputChannels(u16),

    #[error("Invalid frames per buffer: {0}")]
    FramesPerBuffer(u32),

    #[error("Payload type {0} is not in the dynamic range 96..=127")]
    PayloadType(u8),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Could not determine the configuration directory")]
    NoConfigDir,

    #[error("Decode settings changed since the last decode; decode again before playing")]
    StaleDecode,
}

/// Audio output device errors
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),

    #[error("Failed to start stream: {0}")]
    StartFailed(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("cpal error: {0}")]
    CpalError(String),
}

/// Track selection and session errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackError {
    #[error("No decoded tracks available")]
    NoTracks,

    #[error("No track selected")]
    NothingSelected,

    #[error("Selected tracks have different sample rates: {0} Hz and {1} Hz")]
    SampleRateMismatch(u32, u32),

    #[error("Selection cannot change while a session is active")]
    SessionActive,
}

/// Result type alias for the player
pub type Result<T> = std::result::Result<T, Error>;
