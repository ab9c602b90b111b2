//! Track synchronization
//!
//! Lays up to two tracks onto one shared frame counter so that samples
//! captured at the same wall-clock instant play together.
//!
//! Each play slot gets a half-open window `[start, end)` into its track
//! and a `lead_in`: the number of frames of the shared counter that pass
//! before the slot starts reading.

use chrono::{DateTime, Utc};

use crate::config::SyncMode;
use crate::constants::MAX_PLAY_SLOTS;
use crate::tracks::track::{seconds_between, Track};

/// Where one play slot reads from its track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotOffsets {
    /// Shared frames that elapse before this slot reads anything
    pub lead_in: usize,
    /// First track sample played
    pub start: usize,
    /// One past the last track sample played
    pub end: usize,
}

impl SlotOffsets {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frames of the shared counter this slot covers
    pub fn span(&self) -> usize {
        self.lead_in + self.len()
    }
}

/// Offsets for both play slots plus the shared playback length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Alignment {
    pub max_len: usize,
    pub slots: [SlotOffsets; MAX_PLAY_SLOTS],
    pub mode: SyncMode,
}

impl Alignment {
    pub fn start_a(&self) -> usize {
        self.slots[0].start
    }

    pub fn end_a(&self) -> usize {
        self.slots[0].end
    }

    pub fn start_b(&self) -> usize {
        self.slots[1].start
    }

    pub fn end_b(&self) -> usize {
        self.slots[1].end
    }
}

/// Align with the default overlap policy
pub fn align(a: Option<&Track>, b: Option<&Track>) -> Alignment {
    align_with(a, b, SyncMode::default())
}

/// Compute per-slot offsets for the selected tracks.
///
/// Both tracks are assumed to share a sample rate; the session refuses
/// to select tracks that don't. When the tracks do not overlap at all
/// the overlap policy falls back to union.
pub fn align_with(a: Option<&Track>, b: Option<&Track>, mode: SyncMode) -> Alignment {
    match (a, b) {
        (None, None) => Alignment {
            mode,
            ..Default::default()
        },
        (Some(a), None) => single(a.len(), 0, mode),
        (None, Some(b)) => single(b.len(), 1, mode),
        (Some(a), Some(b)) => match mode {
            SyncMode::Overlap => overlap(a, b).unwrap_or_else(|| {
                tracing::debug!("Tracks {} and {} do not overlap, playing their union", a.key(), b.key());
                union(a, b)
            }),
            SyncMode::Union => union(a, b),
        },
    }
}

fn single(len: usize, slot: usize, mode: SyncMode) -> Alignment {
    let mut slots = [SlotOffsets {
        lead_in: 0,
        start: len,
        end: len,
    }; MAX_PLAY_SLOTS];
    slots[slot] = SlotOffsets {
        lead_in: 0,
        start: 0,
        end: len,
    };
    Alignment {
        max_len: len,
        slots,
        mode,
    }
}

fn frames(secs: f64, sample_rate: u32) -> usize {
    let frames = (secs * sample_rate as f64).round();
    if frames > 0.0 {
        frames as usize
    } else {
        0
    }
}

fn overlap(a: &Track, b: &Track) -> Option<Alignment> {
    let from: DateTime<Utc> = a.start_time().max(b.start_time());
    let to: DateTime<Utc> = a.stop_time().min(b.stop_time());
    if to <= from {
        return None;
    }

    let window = |t: &Track| {
        let rate = t.sample_rate();
        let start = frames(seconds_between(from, t.start_time()), rate).min(t.len());
        let trailing = frames(seconds_between(t.stop_time(), to), rate);
        let end = t.len().saturating_sub(trailing).max(start);
        SlotOffsets {
            lead_in: 0,
            start,
            end,
        }
    };
    let slots = [window(a), window(b)];

    Some(Alignment {
        max_len: slots.iter().map(SlotOffsets::len).max().unwrap_or(0),
        slots,
        mode: SyncMode::Overlap,
    })
}

fn union(a: &Track, b: &Track) -> Alignment {
    let origin = a.start_time().min(b.start_time());
    let window = |t: &Track| SlotOffsets {
        lead_in: frames(seconds_between(t.start_time(), origin), t.sample_rate()),
        start: 0,
        end: t.len(),
    };
    let slots = [window(a), window(b)];

    Alignment {
        max_len: slots.iter().map(SlotOffsets::span).max().unwrap_or(0),
        slots,
        mode: SyncMode::Union,
    }
}
