//! Jitter buffer simulation
//!
//! Replays one stream's packets in arrival order through a fixed playout
//! budget and reconstructs what a receiver with that budget would have
//! played. Late packets are discarded, timestamp jumps become silence,
//! and every notable event tags the first sample emitted after it.
//!
//! Times inside the simulator are seconds relative to a per-stream
//! baseline. The baseline starts at the first packet and moves forward
//! whenever a long gap forces a resync.

use crate::audio::buffer::{Sample, SampleStatus};
use crate::codec::{CodecRegistry, DecodedAudio, DecoderSet};
use crate::config::{ClockMode, DecodeConfig};
use crate::constants::{DEFAULT_SAMPLE_RATE, MAX_SILENCE_FRAMES};
use crate::stream::{CapturedPacket, Stream};
use crate::tracks::track::{Track, TrackKey, TrackStats};

/// What a packet's payload turned into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketAudio {
    Decoded(DecodedAudio),
    /// The packet carried no payload bytes
    Empty,
    /// Decoding failed; this much silence stands in for the payload
    Failed { nominal_frames: usize },
}

/// Per-stream jitter buffer state, fed one packet at a time
#[derive(Debug, Clone)]
pub struct JitterSimulator {
    config: DecodeConfig,
    lane: u8,
    sample_rate: u32,
    channels: u8,
    media_base: u32,
    arrival_base: f64,
    prev_media_time: f64,
    prev_arrival_time: f64,
    prev_frames: usize,
    packet_period: f64,
    highest_seq: Option<u16>,
    pending: SampleStatus,
    samples: Vec<Sample>,
    stats: TrackStats,
}

impl JitterSimulator {
    /// `lane` picks which channel of multi-channel payloads is kept.
    /// `clock_rate` is the media clock used until a payload decodes.
    pub fn new(config: DecodeConfig, lane: u8, clock_rate: u32) -> Self {
        Self {
            config,
            lane,
            sample_rate: clock_rate.max(1),
            channels: 1,
            media_base: 0,
            arrival_base: 0.0,
            prev_media_time: 0.0,
            prev_arrival_time: 0.0,
            prev_frames: 0,
            packet_period: 0.0,
            highest_seq: None,
            pending: SampleStatus::Normal,
            samples: Vec::new(),
            stats: TrackStats::default(),
        }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn stats(&self) -> &TrackStats {
        &self.stats
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Widest channel count seen in any decoded payload
    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Run one packet through the simulated buffer
    pub fn push(&mut self, packet: &CapturedPacket, audio: PacketAudio) {
        self.stats.packet_count += 1;
        match &audio {
            PacketAudio::Decoded(decoded) => {
                if decoded.sample_rate > 0 {
                    self.sample_rate = decoded.sample_rate;
                }
                self.channels = self.channels.max(decoded.channels);
            }
            PacketAudio::Failed { .. } => self.stats.decode_error_count += 1,
            PacketAudio::Empty => {}
        }

        let Some(highest) = self.highest_seq else {
            self.media_base = packet.media_timestamp;
            self.arrival_base = packet.arrival_offset_ms / 1000.0;
            self.highest_seq = Some(packet.seq);
            let frames = self.play(audio);
            self.advance(frames, 0.0, 0.0);
            return;
        };
        let in_order = self.check_sequence(highest, packet.seq);

        let rate = self.sample_rate as f64;
        // Signed, so a packet stamped before the baseline is slightly negative
        let delta = packet.media_timestamp.wrapping_sub(self.media_base) as i32;
        let media_time = delta as f64 / rate;
        let arrival_time = match self.config.clock_mode {
            ClockMode::MediaTimestamp => media_time,
            ClockMode::ArrivalTime => packet.arrival_offset_ms / 1000.0 - self.arrival_base,
        };

        // A packet exactly at the budget still plays
        let deviation_ms = (arrival_time - media_time).abs() * 1000.0;
        if deviation_ms > self.config.jitter_budget_ms as f64 && !self.config.uninterrupted {
            self.stats.dropped_count += 1;
            self.raise(SampleStatus::DroppedByJitter);
            // Exactly two packet periods is still an ordinary loss
            if media_time - self.prev_media_time > 2.0 * self.packet_period {
                self.resync(packet, arrival_time);
            }
            return;
        }

        if !self.config.uninterrupted {
            let elapsed = ((media_time - self.prev_media_time) * rate).round() as i64;
            let expected = elapsed - self.prev_frames as i64;
            if expected != 0 {
                self.stats.wrong_timestamp_count += 1;
                self.raise(SampleStatus::WrongTimestamp);
            }
            self.pad(expected);
        }
        let frames = self.play(audio);
        // A late straggler plays but must not pull the timeline back
        if in_order {
            self.advance(frames, media_time, arrival_time);
        }
    }

    /// Finish the stream and wrap the samples into a track
    pub fn into_track(self, key: TrackKey, start_time: chrono::DateTime<chrono::Utc>) -> Track {
        let mut track = Track::from_samples(key, start_time, self.sample_rate, self.samples);
        track.set_decode_result(self.sample_rate, self.channels, self.stats);
        track
    }

    /// Returns whether `seq` is ahead of everything seen so far
    fn check_sequence(&mut self, highest: u16, seq: u16) -> bool {
        let delta = seq.wrapping_sub(highest) as i16;
        if delta <= 0 {
            self.stats.out_of_order_count += 1;
            self.raise(SampleStatus::WrongSequence);
            return false;
        }
        if delta > 1 {
            self.raise(SampleStatus::WrongSequence);
        }
        self.highest_seq = Some(seq);
        true
    }

    /// Remember an event for the next emitted sample. A drop outranks a
    /// sequence problem, which outranks a timestamp mismatch.
    fn raise(&mut self, status: SampleStatus) {
        if rank(status) > rank(self.pending) {
            self.pending = status;
        }
    }

    fn take_pending(&mut self) -> SampleStatus {
        std::mem::take(&mut self.pending)
    }

    fn resync(&mut self, packet: &CapturedPacket, arrival_time: f64) {
        let elapsed = ((arrival_time - self.prev_arrival_time) * self.sample_rate as f64).round() as i64;
        let gap = elapsed - self.prev_frames as i64;
        tracing::debug!(seq = packet.seq, gap, "Jitter buffer resync");

        self.pad(gap);
        self.media_base = packet.media_timestamp;
        self.arrival_base = packet.arrival_offset_ms / 1000.0;
        self.prev_media_time = 0.0;
        self.prev_arrival_time = 0.0;
        self.prev_frames = 0;
    }

    /// Append silence, clamped to `0..=MAX_SILENCE_FRAMES`
    fn pad(&mut self, frames: i64) {
        let frames = frames.clamp(0, MAX_SILENCE_FRAMES as i64) as usize;
        if frames == 0 {
            return;
        }
        let first = match self.take_pending() {
            SampleStatus::Normal => SampleStatus::Silence,
            status => status,
        };
        self.samples.reserve(frames);
        self.samples.push(Sample::new(0, first));
        self.samples
            .resize(self.samples.len() + frames - 1, Sample::silence());
    }

    /// Emit a packet's audio, returning how many frames it covered
    fn play(&mut self, audio: PacketAudio) -> usize {
        match audio {
            PacketAudio::Decoded(decoded) => {
                let frames = decoded.frames();
                if frames > 0 {
                    let channels = decoded.channels.max(1) as usize;
                    let lane = (self.lane as usize).min(channels - 1);
                    let first = self.take_pending();
                    self.samples.extend(
                        decoded
                            .pcm
                            .chunks_exact(channels)
                            .take(frames)
                            .enumerate()
                            .map(|(i, frame)| {
                                let status = if i == 0 { first } else { SampleStatus::Normal };
                                Sample::new(frame[lane], status)
                            }),
                    );
                }
                frames
            }
            PacketAudio::Empty => 0,
            PacketAudio::Failed { nominal_frames } => {
                self.pad(nominal_frames as i64);
                nominal_frames
            }
        }
    }

    fn advance(&mut self, frames: usize, media_time: f64, arrival_time: f64) {
        self.packet_period = frames as f64 / self.sample_rate as f64;
        self.prev_frames = frames;
        self.prev_media_time = media_time;
        self.prev_arrival_time = arrival_time;
    }
}

fn rank(status: SampleStatus) -> u8 {
    match status {
        SampleStatus::Normal | SampleStatus::Silence => 0,
        SampleStatus::WrongTimestamp => 1,
        SampleStatus::WrongSequence => 2,
        SampleStatus::DroppedByJitter => 3,
    }
}

fn decode_packet(decoders: &mut DecoderSet<'_>, packet: &CapturedPacket) -> PacketAudio {
    if packet.payload.is_empty() {
        return PacketAudio::Empty;
    }
    match decoders.decode(&packet.payload, packet.payload_type) {
        Ok(decoded) => PacketAudio::Decoded(decoded),
        Err(e) => {
            tracing::debug!(seq = packet.seq, "Decode failed: {}", e);
            PacketAudio::Failed {
                nominal_frames: decoders.nominal_frames(&packet.payload, packet.payload_type),
            }
        }
    }
}

/// Decode one stream into the track for `channel_slot`.
///
/// Every packet is decoded, including the ones the buffer drops, so
/// stateful codecs see the same input a real receiver's decoder would.
pub fn decode_stream(
    stream: &Stream,
    config: &DecodeConfig,
    channel_slot: u8,
    registry: &CodecRegistry,
) -> Track {
    let mut decoders = registry.decoder_set();
    let clock_rate = stream
        .packets
        .first()
        .map_or(DEFAULT_SAMPLE_RATE, |p| decoders.clock_rate(p.payload_type));

    let mut simulator = JitterSimulator::new(*config, channel_slot, clock_rate);
    for packet in &stream.packets {
        let audio = decode_packet(&mut decoders, packet);
        simulator.push(packet, audio);
    }

    let stats = *simulator.stats();
    tracing::debug!(
        "Decoded {} call {} ch{}: {} samples, {} packets, {} dropped, {} out of order, {} wrong timestamps",
        stream.key.flow,
        stream.key.call_id,
        channel_slot,
        simulator.samples().len(),
        stats.packet_count,
        stats.dropped_count,
        stats.out_of_order_count,
        stats.wrong_timestamp_count
    );

    let key = TrackKey {
        src: stream.key.flow.src,
        dst: stream.key.flow.dst,
        call_id: stream.key.call_id,
        channel_slot,
    };
    simulator.into_track(key, stream.start_time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::StatusHistogram;
    use crate::codec::pcm::{L16_STEREO_PAYLOAD_TYPE, PCMU_PAYLOAD_TYPE};
    use crate::protocol::FlowKey;
    use crate::stream::StreamKey;
    use crate::tracks::manager::aggregate;
    use crate::tracks::track::frames_to_duration;
    use bytes::Bytes;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;

    // 0x80 expands to 32124 in µ-law, so audio is easy to tell from silence
    const LOUD: u8 = 0x80;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 2, 8, 0, 0).unwrap()
    }

    fn packet(seq: u16, media_timestamp: u32, arrival_offset_ms: f64) -> CapturedPacket {
        CapturedPacket {
            seq,
            media_timestamp,
            arrival_offset_ms,
            payload_type: PCMU_PAYLOAD_TYPE,
            payload: Bytes::from(vec![LOUD; 160]),
        }
    }

    fn stream(packets: Vec<CapturedPacket>) -> Stream {
        Stream {
            key: StreamKey {
                flow: FlowKey {
                    src: "10.0.0.1:4000".parse().unwrap(),
                    dst: "10.0.0.2:5000".parse().unwrap(),
                    ssrc: 0x1234,
                },
                call_id: 1,
            },
            start_time: start(),
            start_offset_ms: 0.0,
            packets,
        }
    }

    fn decode(stream: &Stream, config: DecodeConfig) -> Track {
        decode_stream(stream, &config, 0, &CodecRegistry::default())
    }

    /// Packet 3 lands 500ms late after an 800-sample timestamp jump
    fn late_packet_stream() -> Stream {
        stream(vec![
            packet(1, 0, 0.0),
            packet(2, 160, 20.0),
            packet(3, 960, 620.0),
            packet(4, 1120, 640.0),
            packet(5, 1280, 660.0),
        ])
    }

    #[test]
    fn test_late_packet_dropped_and_resynced() {
        let track = decode(&late_packet_stream(), DecodeConfig::default());
        let stats = track.stats();
        assert_eq!(stats.packet_count, 5);
        assert_eq!(stats.dropped_count, 1);
        assert_eq!(stats.wrong_timestamp_count, 1);
        assert_eq!(stats.out_of_order_count, 0);

        let samples = track.samples();
        assert_eq!(samples.len(), 5440);

        // Resync silence covers the 600ms of arrival time minus the last packet
        assert_eq!(samples[320].status, SampleStatus::DroppedByJitter);
        assert!(samples[321..4960].iter().all(Sample::is_silence));

        // Packet 4 is one packet past the new baseline
        assert_eq!(samples[4960].status, SampleStatus::WrongTimestamp);
        assert!(samples[4961..5120].iter().all(Sample::is_silence));
        assert_eq!(samples[5120], Sample::new(32124, SampleStatus::Normal));

        assert_eq!(track.stop_time(), start() + Duration::milliseconds(680));
    }

    #[test]
    fn test_reordered_packet_counted_once() {
        let track = decode(
            &stream(vec![
                packet(1, 0, 0.0),
                packet(2, 160, 20.0),
                packet(4, 480, 60.0),
                packet(3, 320, 62.0),
                packet(5, 640, 80.0),
            ]),
            DecodeConfig::default(),
        );
        assert_eq!(track.stats().out_of_order_count, 1);
        assert_eq!(track.stats().dropped_count, 0);
        // The gap before packet 4 is tagged as a sequence problem
        assert_eq!(track.samples()[320].status, SampleStatus::WrongSequence);
    }

    /// The first two packets arrive swapped, inside the budget
    fn swapped_start_stream() -> Stream {
        stream(vec![
            packet(2, 1160, 0.0),
            packet(1, 1000, 2.0),
            packet(3, 1320, 20.0),
            packet(4, 1480, 40.0),
        ])
    }

    #[test]
    fn test_packet_before_baseline_arrival_clock() {
        let track = decode(&swapped_start_stream(), DecodeConfig::default());
        assert_eq!(track.stats().dropped_count, 0);
        assert_eq!(track.stats().out_of_order_count, 1);
        assert_eq!(track.len(), 640);
        assert_eq!(track.samples()[160].status, SampleStatus::WrongSequence);
        assert_eq!(StatusHistogram::of(track.samples()).silence, 0);
    }

    #[test]
    fn test_packet_before_baseline_media_clock() {
        let config = DecodeConfig {
            clock_mode: ClockMode::MediaTimestamp,
            ..Default::default()
        };
        let track = decode(&swapped_start_stream(), config);
        assert_eq!(track.stats().dropped_count, 0);
        assert_eq!(track.len(), 640);
        assert_eq!(track.stop_time(), start() + Duration::milliseconds(80));
    }

    #[test]
    fn test_media_timestamp_wrap_is_forward() {
        let config = DecodeConfig {
            clock_mode: ClockMode::MediaTimestamp,
            ..Default::default()
        };
        let track = decode(
            &stream(vec![
                packet(1, u32::MAX - 159, 0.0),
                packet(2, 0, 20.0),
                packet(3, 160, 40.0),
            ]),
            config,
        );
        assert_eq!(track.len(), 480);
        assert_eq!(track.stats().wrong_timestamp_count, 0);
    }

    #[test]
    fn test_timestamp_jump_silence_is_capped() {
        let config = DecodeConfig {
            clock_mode: ClockMode::MediaTimestamp,
            ..Default::default()
        };
        // 2000 seconds of timestamp gap
        let jump = 160 + 8000 * 2000;
        let track = decode(
            &stream(vec![packet(1, 0, 0.0), packet(2, jump, 20.0)]),
            config,
        );
        let samples = track.samples();
        assert_eq!(samples.len(), 160 + MAX_SILENCE_FRAMES + 160);
        assert_eq!(samples[160].status, SampleStatus::WrongTimestamp);
        assert!(samples[161..160 + MAX_SILENCE_FRAMES].iter().all(Sample::is_silence));
        assert_eq!(samples[160 + MAX_SILENCE_FRAMES].value, 32124);
    }

    #[test]
    fn test_resync_silence_is_capped() {
        // Packet 3 turns up 2000 seconds late, well past two packet periods
        let track = decode(
            &stream(vec![
                packet(1, 0, 0.0),
                packet(2, 160, 20.0),
                packet(3, 800, 2_000_000.0),
                packet(4, 960, 2_000_020.0),
            ]),
            DecodeConfig::default(),
        );
        assert_eq!(track.stats().dropped_count, 1);

        let samples = track.samples();
        assert_eq!(samples[320].status, SampleStatus::DroppedByJitter);
        assert!(samples[321..320 + MAX_SILENCE_FRAMES].iter().all(Sample::is_silence));
        // Packet 4 then pads one period after the new baseline
        assert_eq!(samples.len(), 320 + MAX_SILENCE_FRAMES + 160 + 160);
        assert_eq!(samples[320 + MAX_SILENCE_FRAMES].status, SampleStatus::WrongTimestamp);
    }

    #[test]
    fn test_sequence_wrap_is_in_order() {
        let track = decode(
            &stream(vec![
                packet(65534, 0, 0.0),
                packet(65535, 160, 20.0),
                packet(0, 320, 40.0),
                packet(1, 480, 60.0),
            ]),
            DecodeConfig::default(),
        );
        assert_eq!(track.stats().out_of_order_count, 0);
        assert_eq!(track.len(), 640);
        assert_eq!(StatusHistogram::of(track.samples()).normal, 640);
    }

    #[test]
    fn test_empty_stream() {
        let track = decode(&stream(Vec::new()), DecodeConfig::default());
        assert!(track.is_empty());
        assert_eq!(*track.stats(), TrackStats::default());
        assert_eq!(track.start_time(), track.stop_time());
    }

    #[test]
    fn test_single_packet_decodes_directly() {
        let track = decode(&stream(vec![packet(7, 90_000, 0.0)]), DecodeConfig::default());
        assert_eq!(track.len(), 160);
        assert!(track.samples().iter().all(|s| s.status == SampleStatus::Normal));
        assert_eq!(track.sample_rate(), 8000);
    }

    #[test]
    fn test_uninterrupted_plays_every_packet() {
        let config = DecodeConfig {
            uninterrupted: true,
            ..Default::default()
        };
        let track = decode(&late_packet_stream(), config);
        assert_eq!(track.len(), 800);
        assert_eq!(track.stats().dropped_count, 0);
        assert_eq!(track.stats().wrong_timestamp_count, 0);
        assert_eq!(StatusHistogram::of(track.samples()).silence, 0);
    }

    #[test]
    fn test_media_clock_never_drops() {
        let config = DecodeConfig {
            clock_mode: ClockMode::MediaTimestamp,
            ..Default::default()
        };
        let track = decode(&late_packet_stream(), config);
        assert_eq!(track.stats().dropped_count, 0);
        assert_eq!(track.stats().wrong_timestamp_count, 1);
        // Timestamp span 0..1280 plus the last packet
        assert_eq!(track.len(), 1440);
        assert_eq!(track.samples()[320].status, SampleStatus::WrongTimestamp);
    }

    #[test]
    fn test_undecodable_payload_becomes_silence() {
        let mut packets = vec![packet(1, 0, 0.0), packet(2, 160, 20.0), packet(3, 320, 40.0)];
        for p in &mut packets {
            p.payload_type = 18;
        }
        let track = decode(&stream(packets), DecodeConfig::default());
        assert_eq!(track.len(), 480);
        assert_eq!(track.stats().decode_error_count, 3);
        assert_eq!(track.stats().wrong_timestamp_count, 0);
        assert!(track.samples().iter().all(Sample::is_silence));
    }

    #[test]
    fn test_empty_payload_contributes_nothing() {
        let mut empty = packet(2, 160, 20.0);
        empty.payload = Bytes::new();
        let track = decode(
            &stream(vec![packet(1, 0, 0.0), empty, packet(3, 320, 40.0)]),
            DecodeConfig::default(),
        );
        // The next packet pads the 160 frames the empty one never produced
        assert_eq!(track.len(), 480);
        assert_eq!(track.stats().wrong_timestamp_count, 1);
        assert_eq!(track.stats().decode_error_count, 0);
    }

    #[test]
    fn test_stereo_lane_selection() {
        let payload: Vec<u8> = std::iter::repeat([0x00, 0x01, 0x00, 0x02])
            .take(441)
            .flatten()
            .collect();
        let packets: Vec<CapturedPacket> = (0..2u16)
            .map(|i| CapturedPacket {
                seq: i,
                media_timestamp: i as u32 * 441,
                arrival_offset_ms: i as f64 * 10.0,
                payload_type: L16_STEREO_PAYLOAD_TYPE,
                payload: Bytes::from(payload.clone()),
            })
            .collect();
        let s = stream(packets);
        let registry = CodecRegistry::default();
        let config = DecodeConfig::default();

        let left = decode_stream(&s, &config, 0, &registry);
        let right = decode_stream(&s, &config, 1, &registry);
        assert_eq!(left.source_channels(), 2);
        assert_eq!(left.sample_rate(), 44100);
        assert_eq!(left.len(), 882);
        assert!(left.samples().iter().all(|s| s.value == 1));
        assert!(right.samples().iter().all(|s| s.value == 2));
        assert_eq!(right.key().channel_slot, 1);
    }

    #[test]
    fn test_drop_status_outranks_timestamp() {
        let mut sim = JitterSimulator::new(DecodeConfig::default(), 0, 8000);
        sim.raise(SampleStatus::DroppedByJitter);
        sim.raise(SampleStatus::WrongTimestamp);
        assert_eq!(sim.take_pending(), SampleStatus::DroppedByJitter);
        assert_eq!(sim.take_pending(), SampleStatus::Normal);
    }

    fn jittered(jitter_ms: &[u16]) -> Stream {
        stream(
            jitter_ms
                .iter()
                .enumerate()
                .map(|(i, j)| packet(i as u16, i as u32 * 160, i as f64 * 20.0 + *j as f64))
                .collect(),
        )
    }

    proptest! {
        #[test]
        fn prop_uninterrupted_is_back_to_back(jitter in prop::collection::vec(0u16..2000, 1..40)) {
            let config = DecodeConfig { uninterrupted: true, ..Default::default() };
            let track = decode(&jittered(&jitter), config);
            prop_assert_eq!(track.len(), jitter.len() * 160);
            prop_assert_eq!(track.stats().dropped_count, 0);
        }

        #[test]
        fn prop_media_clock_keeps_every_packet(jitter in prop::collection::vec(0u16..2000, 1..40)) {
            let config = DecodeConfig { clock_mode: ClockMode::MediaTimestamp, ..Default::default() };
            let track = decode(&jittered(&jitter), config);
            prop_assert_eq!(track.stats().dropped_count, 0);
            prop_assert_eq!(track.len(), jitter.len() * 160);
        }

        #[test]
        fn prop_drops_never_exceed_packets(jitter in prop::collection::vec(0u16..2000, 1..40)) {
            let track = decode(&jittered(&jitter), DecodeConfig::default());
            let stats = track.stats();
            prop_assert!(stats.dropped_count <= stats.packet_count);
            prop_assert_eq!(stats.packet_count as usize, jitter.len());
            prop_assert_eq!(track.stop_time(), track.start_time() + frames_to_duration(track.len(), 8000));
        }

        #[test]
        fn prop_timestamp_gaps_padded_exactly(steps in prop::collection::vec(160u32..40_000, 1..20)) {
            let mut ts = 0u32;
            let mut packets = vec![packet(0, 0, 0.0)];
            for (i, step) in steps.iter().enumerate() {
                ts += step;
                packets.push(packet(i as u16 + 1, ts, (i + 1) as f64 * 20.0));
            }
            let config = DecodeConfig { clock_mode: ClockMode::MediaTimestamp, ..Default::default() };
            let track = decode(&stream(packets), config);

            let silence: usize = steps.iter().map(|s| (*s as usize - 160).min(MAX_SILENCE_FRAMES)).sum();
            prop_assert_eq!(track.len(), (steps.len() + 1) * 160 + silence);
            prop_assert_eq!(StatusHistogram::of(track.samples()).normal, (steps.len() + 1) * 160);
            let jumps = steps.iter().filter(|s| **s > 160).count();
            prop_assert_eq!(track.stats().wrong_timestamp_count as usize, jumps);
        }

        #[test]
        fn prop_aggregated_duration_matches_samples(
            first in prop::collection::vec(0u16..300, 1..20),
            second in prop::collection::vec(0u16..300, 1..20),
            gap_ms in 0i64..5000,
        ) {
            let a = jittered(&first);
            let mut b = jittered(&second);
            b.key.flow.ssrc = 0x5678;
            b.start_time = a.start_time + Duration::milliseconds(first.len() as i64 * 20 + gap_ms);

            let config = DecodeConfig::default();
            let registry = CodecRegistry::default();
            let alone = [decode(&a, config), decode(&b, config)];
            let track = aggregate(&[&b, &a], &config, 0, &registry).unwrap();

            prop_assert_eq!(track.stream_count(), 2);
            prop_assert!(track.len() >= alone[0].len() + alone[1].len());
            prop_assert_eq!(track.stop_time(), track.start_time() + frames_to_duration(track.len(), 8000));
            prop_assert!(track.stop_time() >= alone[1].stop_time());
        }
    }
}
