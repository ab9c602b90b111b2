//! Track aggregation
//!
//! A call can carry several RTP streams between the same two endpoints,
//! for example after an SSRC change or a re-INVITE. Those streams are
//! decoded separately and concatenated, in first-arrival order, into one
//! track per endpoint pair, call and channel slot. The wall-clock gap
//! between consecutive streams becomes silence.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::audio::jitter::decode_stream;
use crate::codec::CodecRegistry;
use crate::config::DecodeConfig;
use crate::protocol::TrackStatus;
use crate::stream::Stream;
use crate::tracks::track::Track;

/// Concatenate `streams` into one track for `channel_slot`.
///
/// Streams are taken in order of their first arrival. Returns `None`
/// when there is nothing to aggregate.
pub fn aggregate(
    streams: &[&Stream],
    config: &DecodeConfig,
    channel_slot: u8,
    registry: &CodecRegistry,
) -> Option<Track> {
    let mut ordered: Vec<&Stream> = streams.to_vec();
    ordered.sort_by_key(|s| s.start_time);

    let mut iter = ordered.into_iter();
    let mut track = decode_stream(iter.next()?, config, channel_slot, registry);
    for stream in iter {
        let next = decode_stream(stream, config, channel_slot, registry);
        let gap = track.append_track(next);
        if gap > 0 {
            tracing::debug!("Track {}: {} samples of silence between streams", track.key(), gap);
        }
    }
    Some(track)
}

type EndpointKey = (SocketAddr, SocketAddr, u32);

/// Owns the decoded tracks of the current decode pass
#[derive(Debug, Default)]
pub struct TrackManager {
    tracks: Vec<Arc<Track>>,
}

impl TrackManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all tracks with a fresh decode of `streams`.
    ///
    /// When `calls` is given only streams of those calls are decoded.
    /// Tracks for the first channel come first, followed by tracks for
    /// the second channel of every endpoint pair that carried stereo.
    pub fn rebuild(
        &mut self,
        streams: &[Stream],
        config: &DecodeConfig,
        registry: &CodecRegistry,
        calls: Option<&[u32]>,
    ) -> usize {
        let mut index: HashMap<EndpointKey, usize> = HashMap::new();
        let mut groups: Vec<Vec<&Stream>> = Vec::new();

        for stream in streams {
            if let Some(calls) = calls {
                if !calls.contains(&stream.key.call_id) {
                    continue;
                }
            }
            let key = (stream.key.flow.src, stream.key.flow.dst, stream.key.call_id);
            let slot = *index.entry(key).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(stream);
        }

        let mut first = Vec::with_capacity(groups.len());
        let mut second = Vec::new();
        for group in &groups {
            let Some(track) = aggregate(group, config, 0, registry) else {
                continue;
            };
            if track.source_channels() > 1 {
                second.extend(aggregate(group, config, 1, registry).map(Arc::new));
            }
            first.push(Arc::new(track));
        }
        first.append(&mut second);
        self.tracks = first;

        tracing::info!(
            "Decoded {} tracks from {} streams (jitter budget {} ms)",
            self.tracks.len(),
            groups.iter().map(Vec::len).sum::<usize>(),
            config.jitter_budget_ms
        );
        self.tracks.len()
    }

    pub fn tracks(&self) -> &[Arc<Track>] {
        &self.tracks
    }

    pub fn get(&self, track_id: usize) -> Option<&Arc<Track>> {
        self.tracks.get(track_id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    /// Status rows for every track, marking the ones in `selection`
    pub fn status(&self, selection: &[Option<usize>]) -> Vec<TrackStatus> {
        self.tracks
            .iter()
            .enumerate()
            .map(|(track_id, track)| {
                let key = track.key();
                TrackStatus {
                    track_id,
                    label: key.to_string(),
                    call_id: key.call_id,
                    channel_slot: key.channel_slot,
                    sample_rate: track.sample_rate(),
                    sample_count: track.len(),
                    start_time: track.start_time(),
                    stop_time: track.stop_time(),
                    duration_secs: track.duration_secs(),
                    stats: *track.stats(),
                    selected_slot: selection.iter().position(|s| *s == Some(track_id)),
                }
            })
            .collect()
    }
}
