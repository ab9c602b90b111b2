//! Audio output through cpal
//!
//! The cpal stream is built and kept alive by a dedicated thread, the
//! same way capture streams were run. The mixer is moved into the
//! stream's data callback and is the only thing that runs there.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig, SupportedStreamConfigRange};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::device::output_device;
use crate::audio::mixer::Mixer;
use crate::config::OutputConfig;
use crate::error::DeviceError;

/// Frames converted per pass when the device wants f32
const SCRATCH_FRAMES: usize = 1024;

/// A running output stream fed by a [`Mixer`]
pub struct AudioPlayback {
    /// Whether the stream thread should keep the stream alive
    running: Arc<AtomicBool>,

    /// Stream thread handle
    thread_handle: Option<JoinHandle<()>>,

    /// Channel for stream errors
    error_rx: Receiver<DeviceError>,

    device_name: String,
}

impl AudioPlayback {
    /// Open the configured device at `sample_rate` and start pulling
    /// frames from `mixer`. Returns once the stream is playing.
    pub fn start(output: &OutputConfig, sample_rate: u32, mixer: Mixer) -> Result<Self, DeviceError> {
        let device = output_device(output.device.as_deref())?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let channels = mixer.output_channels() as u16;
        let supported = device
            .supported_output_configs()
            .map_err(|e| DeviceError::CpalError(e.to_string()))?;
        let format = pick_format(supported, channels, sample_rate).ok_or_else(|| {
            DeviceError::UnsupportedFormat(format!(
                "'{}' cannot play {} channels at {} Hz as i16 or f32",
                device_name, channels, sample_rate
            ))
        })?;

        let config = StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Fixed(output.frames_per_buffer),
        };

        let (error_tx, error_rx) = bounded::<DeviceError>(16);
        let (ready_tx, ready_rx) = bounded::<Result<(), DeviceError>>(1);
        let running = Arc::new(AtomicBool::new(true));
        let running_for_loop = running.clone();
        let stream_config = config.clone();

        let handle = thread::Builder::new()
            .name("rtp-playback".to_string())
            .spawn(move || {
                let stream = match build_stream(&device, &stream_config, format, mixer, error_tx) {
                    Ok(stream) => stream,
                    Err(e) => {
                        tracing::error!("Failed to build output stream: {}", e);
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                if let Err(e) = stream.play() {
                    tracing::error!("Failed to start output stream: {}", e);
                    let _ = ready_tx.send(Err(DeviceError::StartFailed(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                // Keep thread alive while running
                while running_for_loop.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(10));
                }

                // Stream is dropped here, stopping output
            })
            .map_err(|e| DeviceError::StreamError(e.to_string()))?;

        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(DeviceError::StreamError("playback thread exited".to_string())));
        if let Err(e) = ready {
            running.store(false, Ordering::SeqCst);
            let _ = handle.join();
            return Err(e);
        }

        tracing::info!(
            "Playing on '{}' at {} Hz, {} channels, {} frames per buffer",
            device_name,
            sample_rate,
            config.channels,
            output.frames_per_buffer
        );

        Ok(Self {
            running,
            thread_handle: Some(handle),
            error_rx,
            device_name,
        })
    }

    /// Stop output and release the device
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
            tracing::debug!("Released output device '{}'", self.device_name);
        }
    }

    /// Check for errors
    pub fn check_errors(&self) -> Option<DeviceError> {
        self.error_rx.try_recv().ok()
    }
}

impl Drop for AudioPlayback {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Sample format to open the stream with: i16 when the device takes it
/// at this rate and channel count, f32 otherwise
fn pick_format(
    supported: impl IntoIterator<Item = SupportedStreamConfigRange>,
    channels: u16,
    sample_rate: u32,
) -> Option<SampleFormat> {
    let rate = cpal::SampleRate(sample_rate);
    let mut found = None;
    for range in supported {
        if range.channels() != channels
            || rate < range.min_sample_rate()
            || rate > range.max_sample_rate()
        {
            continue;
        }
        match range.sample_format() {
            SampleFormat::I16 => return Some(SampleFormat::I16),
            SampleFormat::F32 => found = Some(SampleFormat::F32),
            _ => {}
        }
    }
    found
}

fn build_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    format: SampleFormat,
    mut mixer: Mixer,
    error_tx: Sender<DeviceError>,
) -> Result<cpal::Stream, DeviceError> {
    let on_error = move |err: cpal::StreamError| {
        let _ = error_tx.try_send(DeviceError::StreamError(err.to_string()));
    };

    let stream = match format {
        SampleFormat::I16 => device.build_output_stream(
            config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                mixer.produce(data);
            },
            on_error,
            None,
        ),
        SampleFormat::F32 => {
            // Allocated once here, never inside the callback
            let mut scratch = vec![0i16; SCRATCH_FRAMES * config.channels as usize];
            device.build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for chunk in data.chunks_mut(scratch.len()) {
                        let pcm = &mut scratch[..chunk.len()];
                        mixer.produce(pcm);
                        for (out, sample) in chunk.iter_mut().zip(pcm.iter()) {
                            *out = *sample as f32 / 32768.0;
                        }
                    }
                },
                on_error,
                None,
            )
        }
        other => {
            return Err(DeviceError::UnsupportedFormat(format!("{:?}", other)));
        }
    };

    stream.map_err(|e| DeviceError::StreamError(e.to_string()))
}
