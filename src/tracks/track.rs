//! Reconstructed audio track

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::ops::AddAssign;

use crate::audio::buffer::Sample;
use crate::constants::MAX_SILENCE_FRAMES;

/// Identity of a track: one endpoint pair within one call, one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackKey {
    pub src: SocketAddr,
    pub dst: SocketAddr,
    pub call_id: u32,
    pub channel_slot: u8,
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} call {}", self.src, self.dst, self.call_id)?;
        if self.channel_slot > 0 {
            write!(f, " ch{}", self.channel_slot)?;
        }
        Ok(())
    }
}

/// Running counters of what the jitter simulation saw
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackStats {
    pub packet_count: u32,
    pub dropped_count: u32,
    pub out_of_order_count: u32,
    pub wrong_timestamp_count: u32,
    pub decode_error_count: u32,
}

impl AddAssign for TrackStats {
    fn add_assign(&mut self, other: Self) {
        self.packet_count += other.packet_count;
        self.dropped_count += other.dropped_count;
        self.out_of_order_count += other.out_of_order_count;
        self.wrong_timestamp_count += other.wrong_timestamp_count;
        self.decode_error_count += other.decode_error_count;
    }
}

/// Continuous PCM for one logical endpoint, as a listener would hear it.
///
/// The stop time is never stored: it is always `start_time` plus the
/// duration of the samples held.
#[derive(Debug, Clone)]
pub struct Track {
    key: TrackKey,
    start_time: DateTime<Utc>,
    sample_rate: u32,
    source_channels: u8,
    samples: Vec<Sample>,
    stats: TrackStats,
    stream_count: usize,
}

impl Track {
    pub fn new(key: TrackKey, start_time: DateTime<Utc>, sample_rate: u32) -> Self {
        Self {
            key,
            start_time,
            sample_rate,
            source_channels: 1,
            samples: Vec::new(),
            stats: TrackStats::default(),
            stream_count: 1,
        }
    }

    pub fn from_samples(
        key: TrackKey,
        start_time: DateTime<Utc>,
        sample_rate: u32,
        samples: Vec<Sample>,
    ) -> Self {
        Self {
            samples,
            ..Self::new(key, start_time, sample_rate)
        }
    }

    pub(crate) fn set_decode_result(&mut self, sample_rate: u32, source_channels: u8, stats: TrackStats) {
        self.sample_rate = sample_rate;
        self.source_channels = source_channels.max(1);
        self.stats = stats;
    }

    pub fn key(&self) -> &TrackKey {
        &self.key
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn stop_time(&self) -> DateTime<Utc> {
        self.start_time + self.duration()
    }

    /// Exact duration of the held samples, to the nanosecond
    pub fn duration(&self) -> Duration {
        frames_to_duration(self.samples.len(), self.sample_rate)
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel count of the codec the track was decoded from
    pub fn source_channels(&self) -> u8 {
        self.source_channels
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn stats(&self) -> &TrackStats {
        &self.stats
    }

    /// Number of RTP streams concatenated into this track
    pub fn stream_count(&self) -> usize {
        self.stream_count
    }

    /// Append silence, never more than `MAX_SILENCE_FRAMES` at once.
    /// Returns how many samples were added.
    pub fn append_silence(&mut self, frames: usize) -> usize {
        let frames = frames.min(MAX_SILENCE_FRAMES);
        self.samples
            .resize(self.samples.len() + frames, Sample::silence());
        frames
    }

    /// Concatenate a later stream's track, padding the wall-clock gap
    /// between this track's stop and the other's start with silence.
    /// Returns the number of gap samples inserted.
    pub fn append_track(&mut self, other: Track) -> usize {
        if other.sample_rate != self.sample_rate {
            tracing::warn!(
                "Track {}: appending stream at {} Hz to track at {} Hz",
                self.key,
                other.sample_rate,
                self.sample_rate
            );
        }

        let gap_secs = seconds_between(other.start_time, self.stop_time());
        let gap = (gap_secs * self.sample_rate as f64).round();
        let gap = if gap > 0.0 { gap as usize } else { 0 };
        let inserted = self.append_silence(gap);

        self.samples.extend(other.samples);
        self.stats += other.stats;
        self.source_channels = self.source_channels.max(other.source_channels);
        self.stream_count += other.stream_count;
        inserted
    }
}

/// `later - earlier` in seconds (negative if `later` is earlier)
pub fn seconds_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> f64 {
    let delta = later - earlier;
    match delta.num_nanoseconds() {
        Some(ns) => ns as f64 / 1e9,
        None => delta.num_milliseconds() as f64 / 1e3,
    }
}

pub fn frames_to_duration(frames: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::zero();
    }
    let nanos = frames as u128 * 1_000_000_000 / sample_rate as u128;
    Duration::nanoseconds(nanos as i64)
}
