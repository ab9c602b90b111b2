//! Tagged PCM samples
//!
//! Every reconstructed sample remembers why it is there, so a viewer can
//! show where the simulated receiver dropped, resynced or padded.

use serde::{Deserialize, Serialize};

/// Why a sample looks the way it does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum SampleStatus {
    /// Decoded audio from a packet played on time
    #[default]
    Normal,
    /// First sample after a packet the jitter buffer discarded
    DroppedByJitter,
    /// First sample after a sequence gap or reordered packet
    WrongSequence,
    /// First sample after timestamp spacing disagreed with decoded length
    WrongTimestamp,
    /// Inserted by the player, not carried by any packet
    Silence,
}

/// One playback-rate PCM sample with its status tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sample {
    pub value: i16,
    pub status: SampleStatus,
}

impl Sample {
    pub const fn new(value: i16, status: SampleStatus) -> Self {
        Self { value, status }
    }

    pub const fn silence() -> Self {
        Self::new(0, SampleStatus::Silence)
    }

    pub fn is_silence(&self) -> bool {
        self.status == SampleStatus::Silence
    }
}

/// Counts of each status in a sample run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistogram {
    pub normal: usize,
    pub dropped_by_jitter: usize,
    pub wrong_sequence: usize,
    pub wrong_timestamp: usize,
    pub silence: usize,
}

impl StatusHistogram {
    pub fn of(samples: &[Sample]) -> Self {
        samples.iter().fold(Self::default(), |mut h, s| {
            match s.status {
                SampleStatus::Normal => h.normal += 1,
                SampleStatus::DroppedByJitter => h.dropped_by_jitter += 1,
                SampleStatus::WrongSequence => h.wrong_sequence += 1,
                SampleStatus::WrongTimestamp => h.wrong_timestamp += 1,
                SampleStatus::Silence => h.silence += 1,
            }
            h
        })
    }
}
