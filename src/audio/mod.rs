//! Audio subsystem module

pub mod buffer;
pub mod device;
pub mod jitter;
pub mod mixer;
pub mod playback;

pub use buffer::{Sample, SampleStatus, StatusHistogram};
pub use device::{list_output_devices, output_device};
pub use jitter::{decode_stream, JitterSimulator, PacketAudio};
pub use mixer::{Mixer, MixerCommand, MixerHandle, PlaybackState, PlaybackStatus, Produced};
pub use playback::AudioPlayback;
