//! Real-time mixer
//!
//! The mixer runs inside the audio device callback. It never locks,
//! allocates or logs. Commands from the control side arrive over a
//! bounded channel and are drained at the top of every callback;
//! progress is published back through atomics in [`PlaybackStatus`].
//!
//! Play slot 0 is routed to output channel 0 and slot 1 to channel 1.
//! Any further output channels are silent. With a single output channel
//! both slots are summed.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::constants::{COMMAND_QUEUE_CAPACITY, MAX_PLAY_SLOTS};
use crate::tracks::{Alignment, SlotOffsets, Track};

/// Control request for the production side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixerCommand {
    Pause,
    Resume,
    Stop,
    /// Move both lanes to this position on the shared frame counter.
    /// The playback state is left as it was.
    Seek(usize),
}

/// Playback state as seen by both contexts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PlaybackState {
    #[default]
    Stopped = 0,
    Playing = 1,
    Paused = 2,
}

impl PlaybackState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Playing,
            2 => Self::Paused,
            _ => Self::Stopped,
        }
    }
}

/// What the caller should do after a production cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Produced {
    Continue,
    /// Playback reached the end or was stopped; the output is silence
    Finished,
}

/// Progress published by the mixer, readable from any thread
#[derive(Debug, Default)]
pub struct PlaybackStatus {
    state: AtomicU8,
    frame_index: AtomicUsize,
    pause_duration: AtomicI64,
    frames_rendered: AtomicU64,
    max_len: AtomicUsize,
}

impl PlaybackStatus {
    pub fn state(&self) -> PlaybackState {
        PlaybackState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Current position on the shared frame counter
    pub fn frame_index(&self) -> usize {
        self.frame_index.load(Ordering::Relaxed)
    }

    /// Frames the device played that did not advance the position.
    /// Seeking backwards adds to it, seeking forwards subtracts.
    pub fn pause_duration(&self) -> i64 {
        self.pause_duration.load(Ordering::Relaxed)
    }

    /// Frames handed to the device since the session started
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    pub fn max_len(&self) -> usize {
        self.max_len.load(Ordering::Relaxed)
    }
}

/// Control-side end of a mixer
#[derive(Debug, Clone)]
pub struct MixerHandle {
    commands: Sender<MixerCommand>,
    status: Arc<PlaybackStatus>,
}

impl MixerHandle {
    /// Queue a command for the next callback. Returns `false` when the
    /// queue is full or the mixer is gone.
    pub fn send(&self, command: MixerCommand) -> bool {
        match self.commands.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(command)) => {
                tracing::warn!("Mixer command queue full, dropping {:?}", command);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn status(&self) -> &Arc<PlaybackStatus> {
        &self.status
    }
}

struct Lane {
    track: Arc<Track>,
    offsets: SlotOffsets,
    cursor: usize,
}

impl Lane {
    fn next(&mut self, frame_index: usize) -> i16 {
        if frame_index < self.offsets.lead_in || self.cursor >= self.offsets.end {
            return 0;
        }
        let value = self
            .track
            .samples()
            .get(self.cursor)
            .map_or(0, |s| s.value);
        self.cursor += 1;
        value
    }

    fn seek(&mut self, position: usize) {
        let into = position.saturating_sub(self.offsets.lead_in);
        self.cursor = (self.offsets.start + into).min(self.offsets.end);
    }
}

/// Produces interleaved i16 output from up to two aligned tracks
pub struct Mixer {
    lanes: [Option<Lane>; MAX_PLAY_SLOTS],
    max_len: usize,
    frame_index: usize,
    pause_duration: i64,
    frames_rendered: u64,
    state: PlaybackState,
    output_channels: usize,
    commands: Receiver<MixerCommand>,
    status: Arc<PlaybackStatus>,
}

impl Mixer {
    /// Create a mixer in the playing state, positioned at frame 0
    pub fn new(
        tracks: [Option<Arc<Track>>; MAX_PLAY_SLOTS],
        alignment: Alignment,
        output_channels: u16,
    ) -> (Self, MixerHandle) {
        let (tx, rx) = bounded(COMMAND_QUEUE_CAPACITY);
        let status = Arc::new(PlaybackStatus::default());

        let [a, b] = tracks;
        let lane = |track: Option<Arc<Track>>, offsets: SlotOffsets| {
            track.map(|track| Lane {
                track,
                offsets,
                cursor: offsets.start,
            })
        };

        let mut mixer = Self {
            lanes: [lane(a, alignment.slots[0]), lane(b, alignment.slots[1])],
            max_len: alignment.max_len,
            frame_index: 0,
            pause_duration: 0,
            frames_rendered: 0,
            state: PlaybackState::Playing,
            output_channels: output_channels.max(1) as usize,
            commands: rx,
            status: status.clone(),
        };
        mixer.status.max_len.store(mixer.max_len, Ordering::Relaxed);
        mixer.publish();

        let handle = MixerHandle {
            commands: tx,
            status,
        };
        (mixer, handle)
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    pub fn pause_duration(&self) -> i64 {
        self.pause_duration
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn output_channels(&self) -> usize {
        self.output_channels
    }

    /// Fill `out` with the next interleaved frames.
    ///
    /// Called from the device callback; `out.len()` should be a multiple
    /// of the output channel count.
    pub fn produce(&mut self, out: &mut [i16]) -> Produced {
        self.apply_commands();

        let result = match self.state {
            PlaybackState::Playing => self.render(out),
            PlaybackState::Paused => {
                out.fill(0);
                let frames = out.len() / self.output_channels;
                self.pause_duration += frames as i64;
                self.frames_rendered += frames as u64;
                Produced::Continue
            }
            PlaybackState::Stopped => {
                out.fill(0);
                Produced::Finished
            }
        };

        self.publish();
        result
    }

    /// Apply a command immediately, bypassing the queue
    pub fn apply(&mut self, command: MixerCommand) {
        self.execute(command);
        self.publish();
    }

    fn execute(&mut self, command: MixerCommand) {
        match command {
            MixerCommand::Pause => {
                if self.state == PlaybackState::Playing {
                    self.state = PlaybackState::Paused;
                }
            }
            MixerCommand::Resume => {
                if self.state == PlaybackState::Paused {
                    self.state = PlaybackState::Playing;
                }
            }
            MixerCommand::Stop => self.reset(),
            MixerCommand::Seek(position) => self.seek(position),
        }
    }

    fn apply_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            self.execute(command);
        }
    }

    fn render(&mut self, out: &mut [i16]) -> Produced {
        let channels = self.output_channels;
        let mut frames = out.chunks_exact_mut(channels);

        for frame in &mut frames {
            if self.frame_index >= self.max_len {
                frame.fill(0);
                continue;
            }

            let a = self.lanes[0].as_mut().map_or(0, |l| l.next(self.frame_index));
            let b = self.lanes[1].as_mut().map_or(0, |l| l.next(self.frame_index));
            if channels == 1 {
                frame[0] = a.saturating_add(b);
            } else {
                frame[0] = a;
                frame[1] = b;
                frame[2..].fill(0);
            }

            self.frame_index += 1;
            self.frames_rendered += 1;
        }
        frames.into_remainder().fill(0);

        if self.frame_index >= self.max_len {
            self.state = PlaybackState::Stopped;
            Produced::Finished
        } else {
            Produced::Continue
        }
    }

    fn seek(&mut self, position: usize) {
        let position = position.min(self.max_len);
        self.pause_duration += self.frame_index as i64 - position as i64;
        self.frame_index = position;
        for lane in self.lanes.iter_mut().flatten() {
            lane.seek(position);
        }
    }

    fn reset(&mut self) {
        self.state = PlaybackState::Stopped;
        self.frame_index = 0;
        self.pause_duration = 0;
        self.frames_rendered = 0;
        for lane in self.lanes.iter_mut().flatten() {
            lane.seek(0);
        }
    }

    fn publish(&self) {
        self.status.frame_index.store(self.frame_index, Ordering::Relaxed);
        self.status
            .pause_duration
            .store(self.pause_duration, Ordering::Relaxed);
        self.status
            .frames_rendered
            .store(self.frames_rendered, Ordering::Relaxed);
        self.status.state.store(self.state as u8, Ordering::Release);
    }
}
