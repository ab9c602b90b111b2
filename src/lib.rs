//! # RTP Player
//!
//! Reconstructs what a listener would have heard from a set of captured
//! RTP media packets, and plays up to two reconstructed tracks in real
//! time, aligned to each other on wall-clock time.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                            CONTROL CONTEXT                                   │
//! │                                                                              │
//! │   MediaPacketRecord ──▶ ┌──────────────────────────────┐                     │
//! │   (capture collaborator)│ Stream Collector              │                     │
//! │                         │ (stream::collector)           │                     │
//! │                         │ key: src, dst, ssrc, call     │                     │
//! │                         └──────────────┬───────────────┘                     │
//! │                                        │ Stream (arrival order)              │
//! │                                        ▼                                     │
//! │                         ┌──────────────────────────────┐   ┌─────────────┐  │
//! │                         │ Jitter simulator              │◀──│ DecoderSet  │  │
//! │                         │ (audio::jitter)               │   │ PCMU/PCMA/  │  │
//! │                         │ drops, resyncs, silence       │   │ Opus        │  │
//! │                         └──────────────┬───────────────┘   └─────────────┘  │
//! │                                        │ Sample runs                         │
//! │                                        ▼                                     │
//! │                         ┌──────────────────────────────┐                     │
//! │                         │ Track Manager (tracks)        │                     │
//! │                         │ concat streams per endpoint   │                     │
//! │                         │ pair / call / channel slot    │                     │
//! │                         └──────────────┬───────────────┘                     │
//! │                                        │ Arc<Track> x2                       │
//! │                                        ▼                                     │
//! │                         ┌──────────────────────────────┐                     │
//! │                         │ Synchronizer (tracks::sync)   │                     │
//! │                         │ start/end offsets per slot    │                     │
//! │                         └──────────────┬───────────────┘                     │
//! │                                        │                                     │
//! │   Player (session) ── MixerCommand ────┼──── (bounded lock-free channel)     │
//! └────────────────────────────────────────┼─────────────────────────────────────┘
//!                                          ▼
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                           PRODUCTION CONTEXT                                 │
//! │   ┌──────────────────────────────┐        ┌──────────────────────────────┐  │
//! │   │ Mixer (audio::mixer)          │──────▶ │ cpal output stream            │  │
//! │   │ no locks, no allocation       │ i16    │ (audio::playback)             │  │
//! │   └──────────────────────────────┘        └──────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod codec;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod stream;
pub mod tracks;

pub use error::{Error, Result};
pub use session::Player;

/// Application-wide constants
pub mod constants {
    /// Sample rate assumed before any payload has been decoded
    pub const DEFAULT_SAMPLE_RATE: u32 = 8000;

    /// Nominal packetization time used when a payload's duration is unknown
    pub const DEFAULT_PTIME_MS: u32 = 20;

    /// Default simulated jitter buffer depth in milliseconds
    pub const DEFAULT_JITTER_BUFFER_MS: u32 = 50;

    /// Largest jitter budget accepted by the configuration
    pub const MAX_JITTER_BUDGET_MS: u32 = 500;

    /// Upper bound on silence inserted for a single gap (30 minutes at 8 kHz)
    pub const MAX_SILENCE_FRAMES: usize = 14_400_000;

    /// Number of tracks that can be played at once
    pub const MAX_PLAY_SLOTS: usize = 2;

    /// Default output channel count (one lane per play slot)
    pub const DEFAULT_OUTPUT_CHANNELS: u16 = 2;

    /// Default host buffer size requested from the audio device
    pub const DEFAULT_FRAMES_PER_BUFFER: u32 = 512;

    /// Default dynamic RTP payload type for Opus
    pub const DEFAULT_OPUS_PAYLOAD_TYPE: u8 = 111;

    /// Opus always decodes at this rate
    pub const OPUS_SAMPLE_RATE: u32 = 48000;

    /// Capacity of the control to production command queue
    pub const COMMAND_QUEUE_CAPACITY: usize = 64;
}
