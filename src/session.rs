//! Playback session control
//!
//! [`Player`] is the control-context surface: it ingests packet records,
//! runs decode passes, keeps the two-slot track selection and drives one
//! playback session at a time. Everything here may block or allocate;
//! the production context only ever sees the [`Mixer`] built on play.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::audio::mixer::{Mixer, MixerCommand, MixerHandle, PlaybackState, PlaybackStatus};
use crate::audio::playback::AudioPlayback;
use crate::codec::CodecRegistry;
use crate::config::{DecodeConfig, PlayerConfig};
use crate::constants::MAX_PLAY_SLOTS;
use crate::error::{ConfigError, Result, TrackError};
use crate::protocol::{MediaPacketRecord, TrackStatus};
use crate::stream::StreamCollector;
use crate::tracks::{align_with, Alignment, Track, TrackManager};

struct ActiveSession {
    handle: MixerHandle,
    /// Last state asked of the mixer; the published one may lag a callback
    intended: PlaybackState,
    alignment: Alignment,
    sample_rate: u32,
    output: Option<AudioPlayback>,
}

/// Control surface for decoding and playing captured RTP audio
pub struct Player {
    config: PlayerConfig,
    registry: CodecRegistry,
    collector: StreamCollector,
    tracks: TrackManager,
    /// Settings the current tracks were decoded with
    decoded_with: Option<DecodeConfig>,
    selection: [Option<usize>; MAX_PLAY_SLOTS],
    next_slot: usize,
    session: Option<ActiveSession>,
    /// Seek target remembered while stopped
    pending_position: usize,
}

impl Player {
    pub fn new(config: PlayerConfig, capture_start: DateTime<Utc>) -> Result<Self> {
        let registry = CodecRegistry::new(&config.codecs);
        Self::with_registry(config, capture_start, registry)
    }

    /// Use a custom codec registry instead of the configured one
    pub fn with_registry(
        config: PlayerConfig,
        capture_start: DateTime<Utc>,
        registry: CodecRegistry,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry,
            collector: StreamCollector::new(capture_start),
            tracks: TrackManager::new(),
            decoded_with: None,
            selection: [None; MAX_PLAY_SLOTS],
            next_slot: 0,
            session: None,
            pending_position: 0,
        })
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn add_packet(&self, record: MediaPacketRecord) {
        self.collector.add_packet(record);
    }

    /// Change the jitter simulation settings. Tracks decoded under
    /// different settings must be decoded again before playing.
    pub fn set_decode_config(&mut self, decode: DecodeConfig) -> Result<()> {
        decode.validate()?;
        if self.decoded_with.map_or(false, |d| d.requires_redecode(&decode)) {
            tracing::info!("Decode settings changed, tracks need decoding again");
        }
        self.config.decode = decode;
        Ok(())
    }

    /// Whether the decoded tracks no longer match the decode settings
    pub fn is_stale(&self) -> bool {
        self.decoded_with
            .map_or(false, |d| d.requires_redecode(&self.config.decode))
    }

    /// Decode every collected stream
    pub fn decode_all(&mut self) -> Result<usize> {
        self.decode(None)
    }

    /// Decode only the streams belonging to `calls`
    pub fn decode_calls(&mut self, calls: &[u32]) -> Result<usize> {
        self.decode(Some(calls))
    }

    fn decode(&mut self, calls: Option<&[u32]>) -> Result<usize> {
        self.ensure_stopped()?;
        let streams = self.collector.snapshot();
        let count = self
            .tracks
            .rebuild(&streams, &self.config.decode, &self.registry, calls);
        self.decoded_with = Some(self.config.decode);
        self.selection = [None; MAX_PLAY_SLOTS];
        self.next_slot = 0;
        self.pending_position = 0;
        Ok(count)
    }

    pub fn tracks(&self) -> &[Arc<Track>] {
        self.tracks.tracks()
    }

    pub fn track_status(&self) -> Vec<TrackStatus> {
        self.tracks.status(&self.selection)
    }

    pub fn selection(&self) -> [Option<usize>; MAX_PLAY_SLOTS] {
        self.selection
    }

    /// Put a track into a play slot. Out-of-range slots and track ids
    /// clamp to the last valid one. Returns the track id selected.
    pub fn select_track(&mut self, slot: usize, track_id: usize) -> Result<usize> {
        self.ensure_stopped()?;
        if self.tracks.is_empty() {
            return Err(TrackError::NoTracks.into());
        }
        let slot = slot.min(MAX_PLAY_SLOTS - 1);
        let track_id = track_id.min(self.tracks.len() - 1);

        let other = self.selection[1 - slot].and_then(|id| self.tracks.get(id));
        if let (Some(other), Some(track)) = (other, self.tracks.get(track_id)) {
            if other.sample_rate() != track.sample_rate() {
                return Err(TrackError::SampleRateMismatch(track.sample_rate(), other.sample_rate()).into());
            }
        }

        self.selection[slot] = Some(track_id);
        self.next_slot = (slot + 1) % MAX_PLAY_SLOTS;
        self.pending_position = 0;
        tracing::info!("Selected track {} into slot {}", track_id, slot);
        Ok(track_id)
    }

    /// Select into the slot after the last one filled, alternating
    pub fn select_next(&mut self, track_id: usize) -> Result<usize> {
        self.select_track(self.next_slot, track_id)
    }

    pub fn deselect_track(&mut self, slot: usize) -> Result<()> {
        self.ensure_stopped()?;
        let slot = slot.min(MAX_PLAY_SLOTS - 1);
        self.selection[slot] = None;
        self.next_slot = slot;
        self.pending_position = 0;
        Ok(())
    }

    fn selected(&self) -> [Option<Arc<Track>>; MAX_PLAY_SLOTS] {
        self.selection
            .map(|id| id.and_then(|id| self.tracks.get(id).cloned()))
    }

    /// Alignment of the current selection
    pub fn alignment(&self) -> Alignment {
        if let Some(session) = &self.session {
            return session.alignment;
        }
        let [a, b] = self.selected();
        align_with(a.as_deref(), b.as_deref(), self.config.decode.sync_mode)
    }

    /// Playback state as last commanded. The end of playback is only
    /// known once the mixer has published it.
    pub fn state(&self) -> PlaybackState {
        match &self.session {
            None => PlaybackState::Stopped,
            Some(session) if session.handle.status().state() == PlaybackState::Stopped => {
                PlaybackState::Stopped
            }
            Some(session) => session.intended,
        }
    }

    /// Status shared with the running mixer, if a session is active
    pub fn status(&self) -> Option<Arc<PlaybackStatus>> {
        self.session.as_ref().map(|s| s.handle.status().clone())
    }

    /// Build the mixer for a new session without opening a device.
    ///
    /// The caller becomes responsible for driving [`Mixer::produce`].
    pub fn start_session(&mut self) -> Result<Mixer> {
        self.ensure_stopped()?;
        if self.is_stale() {
            return Err(ConfigError::StaleDecode.into());
        }

        let selected = self.selected();
        let sample_rate = match selected.iter().flatten().next() {
            Some(track) => track.sample_rate(),
            None => return Err(TrackError::NothingSelected.into()),
        };
        let [a, b] = &selected;
        let alignment = align_with(a.as_deref(), b.as_deref(), self.config.decode.sync_mode);

        let (mut mixer, handle) = Mixer::new(selected, alignment, self.config.output.output_channels);
        if self.pending_position > 0 {
            mixer.apply(MixerCommand::Seek(self.pending_position));
            self.pending_position = 0;
        }

        tracing::info!(
            "Starting playback: {} frames at {} Hz ({:?} alignment)",
            alignment.max_len,
            sample_rate,
            alignment.mode
        );
        self.session = Some(ActiveSession {
            handle,
            intended: PlaybackState::Playing,
            alignment,
            sample_rate,
            output: None,
        });
        Ok(mixer)
    }

    /// Start playing on the configured device, or resume when paused
    pub fn play(&mut self) -> Result<()> {
        match self.state() {
            PlaybackState::Playing => return Ok(()),
            PlaybackState::Paused => {
                if self.send(MixerCommand::Resume) {
                    self.set_intended(PlaybackState::Playing);
                    tracing::info!("Resumed");
                }
                return Ok(());
            }
            PlaybackState::Stopped => self.release(),
        }

        let mixer = self.start_session()?;
        let sample_rate = self.session.as_ref().map_or(0, |s| s.sample_rate);
        match AudioPlayback::start(&self.config.output, sample_rate, mixer) {
            Ok(output) => {
                if let Some(session) = self.session.as_mut() {
                    session.output = Some(output);
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Could not open audio output: {}", e);
                self.session = None;
                Err(e.into())
            }
        }
    }

    pub fn pause(&mut self) {
        if self.state() == PlaybackState::Playing && self.send(MixerCommand::Pause) {
            self.set_intended(PlaybackState::Paused);
            tracing::info!("Paused");
        }
    }

    /// Stop playback and release the output device
    pub fn stop(&mut self) {
        if self.session.is_some() {
            self.send(MixerCommand::Stop);
            self.release();
            tracing::info!("Stopped");
        }
        self.pending_position = 0;
    }

    /// Move to `position` frames on the shared counter, clamped to the
    /// playback length. A running session keeps its paused or playing
    /// state; the mixer moves both lanes between two callbacks.
    pub fn seek(&mut self, position: usize) {
        let position = position.min(self.alignment().max_len);
        if self.state() == PlaybackState::Stopped {
            self.release();
            self.pending_position = position;
        } else {
            self.send(MixerCommand::Seek(position));
        }
        tracing::debug!("Seek to frame {}", position);
    }

    /// Seek to `secs` seconds from the start of playback
    pub fn seek_secs(&mut self, secs: f64) {
        let rate = self.playback_rate();
        let frames = (secs.max(0.0) * rate as f64).round() as usize;
        self.seek(frames);
    }

    /// Current frame, possibly a callback behind
    pub fn position(&self) -> usize {
        match &self.session {
            Some(session) => session.handle.status().frame_index(),
            None => self.pending_position,
        }
    }

    pub fn position_secs(&self) -> f64 {
        match self.playback_rate() {
            0 => 0.0,
            rate => self.position() as f64 / rate as f64,
        }
    }

    fn playback_rate(&self) -> u32 {
        if let Some(session) = &self.session {
            return session.sample_rate;
        }
        self.selected()
            .iter()
            .flatten()
            .next()
            .map_or(0, |t| t.sample_rate())
    }

    /// Observe the session from the control side. Releases the device
    /// once the mixer reports the end of playback.
    pub fn poll(&mut self) -> PlaybackState {
        let Some(session) = &self.session else {
            return PlaybackState::Stopped;
        };
        if let Some(output) = &session.output {
            while let Some(e) = output.check_errors() {
                tracing::warn!("Output stream error: {}", e);
            }
        }

        let state = session.handle.status().state();
        if state == PlaybackState::Stopped {
            tracing::info!("Playback finished");
            self.release();
        }
        state
    }

    fn send(&self, command: MixerCommand) -> bool {
        self.session
            .as_ref()
            .map_or(false, |session| session.handle.send(command))
    }

    fn set_intended(&mut self, state: PlaybackState) {
        if let Some(session) = self.session.as_mut() {
            session.intended = state;
        }
    }

    fn release(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Some(output) = session.output.as_mut() {
                output.stop();
            }
        }
    }

    /// Finished sessions count as stopped; anything else blocks changes
    fn ensure_stopped(&mut self) -> Result<()> {
        if self.poll() != PlaybackState::Stopped {
            return Err(TrackError::SessionActive.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mixer::Produced;
    use crate::config::SyncMode;
    use crate::error::Error;
    use crate::protocol::FlowKey;
    use bytes::Bytes;
    use chrono::{Duration, TimeZone};

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 2, 8, 0, 0).unwrap()
    }

    /// `count` 20ms PCMU packets from `src_port`, starting `offset_ms`
    /// into the capture, each filled with `byte`
    fn feed(player: &Player, src_port: u16, offset_ms: f64, count: u16, byte: u8) {
        let flow_key = FlowKey {
            src: format!("10.0.0.1:{}", src_port).parse().unwrap(),
            dst: "10.0.0.2:5000".parse().unwrap(),
            ssrc: src_port as u32,
        };
        for i in 0..count {
            player.add_packet(MediaPacketRecord {
                flow_key,
                call_id: 1,
                seq: i,
                media_timestamp: i as u32 * 160,
                arrival_offset_ms: offset_ms + i as f64 * 20.0,
                payload_type: 0,
                payload: Bytes::from(vec![byte; 160]),
            });
        }
    }

    fn player() -> Player {
        Player::new(PlayerConfig::default(), epoch()).unwrap()
    }

    /// Two tracks: 0..200ms at full scale, 100..400ms at -full scale
    fn two_track_player() -> Player {
        let mut player = player();
        feed(&player, 4000, 0.0, 10, 0x80);
        feed(&player, 4002, 100.0, 15, 0x00);
        assert_eq!(player.decode_all().unwrap(), 2);
        player
    }

    fn drain(mixer: &mut Mixer, out: &mut [i16]) -> Vec<i16> {
        let mut played = Vec::new();
        while mixer.produce(out) == Produced::Continue {
            played.extend_from_slice(out);
        }
        played.extend_from_slice(out);
        played
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = PlayerConfig::default();
        config.decode.jitter_budget_ms = 9999;
        assert!(matches!(
            Player::new(config, epoch()),
            Err(Error::Config(ConfigError::JitterBudget(9999)))
        ));
    }

    #[test]
    fn test_decode_and_status() {
        let player = two_track_player();
        let status = player.track_status();
        assert_eq!(status.len(), 2);
        assert_eq!(status[0].sample_count, 1600);
        assert_eq!(status[1].sample_count, 2400);
        assert_eq!(status[1].start_time, epoch() + Duration::milliseconds(100));
    }

    #[test]
    fn test_selection_clamps_and_alternates() {
        let mut player = two_track_player();
        assert_eq!(player.select_next(7).unwrap(), 1);
        assert_eq!(player.select_next(0).unwrap(), 0);
        assert_eq!(player.selection(), [Some(1), Some(0)]);

        player.select_track(9, 1).unwrap();
        assert_eq!(player.selection(), [Some(1), Some(1)]);

        player.deselect_track(0).unwrap();
        assert_eq!(player.selection(), [None, Some(1)]);
        assert_eq!(player.track_status()[1].selected_slot, Some(1));
    }

    #[test]
    fn test_select_without_tracks() {
        let mut player = player();
        assert!(matches!(
            player.select_track(0, 0),
            Err(Error::Track(TrackError::NoTracks))
        ));
    }

    #[test]
    fn test_sample_rate_mismatch_rejected() {
        let mut player = player();
        feed(&player, 4000, 0.0, 5, 0x80);
        player.add_packet(MediaPacketRecord {
            flow_key: FlowKey {
                src: "10.0.0.9:6000".parse().unwrap(),
                dst: "10.0.0.2:5000".parse().unwrap(),
                ssrc: 9,
            },
            call_id: 1,
            seq: 0,
            media_timestamp: 0,
            arrival_offset_ms: 0.0,
            payload_type: 11,
            payload: Bytes::from(vec![0u8; 882]),
        });
        player.decode_all().unwrap();

        player.select_track(0, 0).unwrap();
        assert!(matches!(
            player.select_track(1, 1),
            Err(Error::Track(TrackError::SampleRateMismatch(44100, 8000)))
        ));
    }

    #[test]
    fn test_nothing_selected() {
        let mut player = two_track_player();
        assert!(matches!(
            player.start_session(),
            Err(Error::Track(TrackError::NothingSelected))
        ));
    }

    #[test]
    fn test_session_plays_overlap() {
        let mut player = two_track_player();
        player.select_track(0, 0).unwrap();
        player.select_track(1, 1).unwrap();
        let mut mixer = player.start_session().unwrap();
        assert_eq!(player.state(), PlaybackState::Playing);
        assert_eq!(player.alignment().max_len, 800);

        let mut out = vec![0i16; 256];
        let played = drain(&mut mixer, &mut out);
        let frames: Vec<&[i16]> = played.chunks(2).collect();
        assert!(frames[..800].iter().all(|f| *f == [32124, -32124]));
        assert!(frames[800..].iter().all(|f| *f == [0, 0]));

        assert_eq!(player.poll(), PlaybackState::Stopped);
        assert!(player.status().is_none());
    }

    #[test]
    fn test_union_mode_plays_everything() {
        let mut player = two_track_player();
        let mut decode = player.config().decode;
        decode.sync_mode = SyncMode::Union;
        player.set_decode_config(decode).unwrap();
        assert!(!player.is_stale());

        player.select_track(0, 0).unwrap();
        player.select_track(1, 1).unwrap();
        let mixer = player.start_session().unwrap();
        // 100ms lead-in plus 300ms of the later track
        assert_eq!(mixer.max_len(), 3200);
    }

    #[test]
    fn test_selection_locked_during_session() {
        let mut player = two_track_player();
        player.select_track(0, 0).unwrap();
        let _mixer = player.start_session().unwrap();
        assert!(matches!(
            player.select_track(1, 1),
            Err(Error::Track(TrackError::SessionActive))
        ));
        assert!(matches!(
            player.decode_all(),
            Err(Error::Track(TrackError::SessionActive))
        ));
        player.stop();
        assert!(player.select_track(1, 1).is_ok());
    }

    #[test]
    fn test_pause_seek_resume() {
        let mut player = two_track_player();
        player.select_track(0, 0).unwrap();
        let mut mixer = player.start_session().unwrap();
        let mut out = vec![0i16; 200];
        mixer.produce(&mut out);
        assert_eq!(player.position(), 100);

        player.pause();
        mixer.produce(&mut out);
        assert_eq!(player.state(), PlaybackState::Paused);
        assert_eq!(player.position(), 100);

        player.seek(1400);
        player.play().unwrap();
        mixer.produce(&mut out);
        assert_eq!(player.state(), PlaybackState::Playing);
        assert_eq!(player.position(), 1500);

        let status = player.status().unwrap();
        assert_eq!(
            status.frames_rendered() as i64 - status.pause_duration(),
            status.frame_index() as i64
        );
    }

    #[test]
    fn test_seek_before_callback_keeps_pause() {
        let mut player = two_track_player();
        player.select_track(0, 0).unwrap();
        let mut mixer = player.start_session().unwrap();
        let mut out = vec![0i16; 200];
        mixer.produce(&mut out);

        // No callback runs between the two calls
        player.pause();
        player.seek(1000);
        assert_eq!(player.state(), PlaybackState::Paused);
        mixer.produce(&mut out);
        assert_eq!(mixer.state(), PlaybackState::Paused);
        assert_eq!(player.position(), 1000);
        assert!(out.iter().all(|&s| s == 0));

        mixer.produce(&mut out);
        assert_eq!(player.position(), 1000);
    }

    #[test]
    fn test_resume_right_after_pause() {
        let mut player = two_track_player();
        player.select_track(0, 0).unwrap();
        let mut mixer = player.start_session().unwrap();
        let mut out = vec![0i16; 200];

        player.pause();
        player.play().unwrap();
        assert_eq!(player.state(), PlaybackState::Playing);
        mixer.produce(&mut out);
        assert_eq!(mixer.state(), PlaybackState::Playing);
        assert_eq!(player.position(), 100);

        // And the other way round
        player.pause();
        player.play().unwrap();
        player.pause();
        mixer.produce(&mut out);
        assert_eq!(mixer.state(), PlaybackState::Paused);
        assert_eq!(player.state(), PlaybackState::Paused);
        assert_eq!(player.position(), 100);
    }

    #[test]
    fn test_seek_while_playing_is_one_step() {
        let mut player = two_track_player();
        player.select_track(0, 0).unwrap();
        let mut mixer = player.start_session().unwrap();
        let mut out = vec![0i16; 200];
        mixer.produce(&mut out);

        player.seek(600);
        mixer.produce(&mut out);
        assert_eq!(mixer.state(), PlaybackState::Playing);
        assert_eq!(player.position(), 700);

        let status = player.status().unwrap();
        assert_eq!(
            status.frames_rendered() as i64 - status.pause_duration(),
            status.frame_index() as i64
        );
    }

    #[test]
    fn test_seek_while_stopped_applies_on_start() {
        let mut player = two_track_player();
        player.select_track(0, 0).unwrap();
        player.seek_secs(0.15);
        assert_eq!(player.position(), 1200);

        let mixer = player.start_session().unwrap();
        assert_eq!(mixer.frame_index(), 1200);
        assert_eq!(player.position(), 1200);
    }

    #[test]
    fn test_seek_clamped_to_length() {
        let mut player = two_track_player();
        player.select_track(0, 0).unwrap();
        player.seek(1_000_000);
        assert_eq!(player.position(), 1600);
    }

    #[test]
    fn test_stale_decode_blocks_playback() {
        let mut player = two_track_player();
        player.select_track(0, 0).unwrap();

        let mut decode = player.config().decode;
        decode.jitter_budget_ms = 120;
        player.set_decode_config(decode).unwrap();
        assert!(player.is_stale());
        assert!(matches!(
            player.start_session(),
            Err(Error::Config(ConfigError::StaleDecode))
        ));

        player.decode_all().unwrap();
        player.select_track(0, 0).unwrap();
        assert!(player.start_session().is_ok());
    }

    #[test]
    fn test_decode_calls_filters() {
        let mut player = player();
        feed(&player, 4000, 0.0, 5, 0x80);
        assert_eq!(player.decode_calls(&[2]).unwrap(), 0);
        assert_eq!(player.decode_calls(&[1]).unwrap(), 1);
    }
}
