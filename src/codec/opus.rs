//! Opus decoder wrapper
//!
//! Opus always decodes at 48 kHz. The channel count is taken from the
//! first packet's TOC byte and the underlying decoder is created then.

use ::opus::{packet, Channels, Decoder};

use super::{DecodedAudio, PayloadDecoder};
use crate::constants::{DEFAULT_PTIME_MS, OPUS_SAMPLE_RATE};
use crate::error::DecodeError;

/// 120ms at 48kHz stereo, the largest frame Opus can produce
const MAX_DECODE_SAMPLES: usize = 48000 * 2 * 120 / 1000;

/// Opus payload decoder
pub struct OpusDecoder {
    decoder: Option<Decoder>,
    channels: u8,
    /// Decoding buffer (reused to avoid allocations)
    decode_buffer: Vec<i16>,
    frames_decoded: u64,
}

impl OpusDecoder {
    pub fn new() -> Self {
        Self {
            decoder: None,
            channels: 0,
            decode_buffer: vec![0i16; MAX_DECODE_SAMPLES],
            frames_decoded: 0,
        }
    }

    fn ensure_decoder(&mut self, payload: &[u8]) -> Result<&mut Decoder, DecodeError> {
        if self.decoder.is_none() {
            let channels = packet::get_nb_channels(payload)
                .map_err(|e| DecodeError::DecoderInit(e.to_string()))?;
            let decoder = Decoder::new(OPUS_SAMPLE_RATE, channels)
                .map_err(|e| DecodeError::DecoderInit(e.to_string()))?;
            self.channels = match channels {
                Channels::Mono => 1,
                Channels::Stereo => 2,
            };
            self.decoder = Some(decoder);
        }
        self.decoder
            .as_mut()
            .ok_or_else(|| DecodeError::DecoderInit("decoder unavailable".to_string()))
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }
}

impl Default for OpusDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadDecoder for OpusDecoder {
    fn decode(&mut self, payload: &[u8]) -> Result<DecodedAudio, DecodeError> {
        if payload.is_empty() {
            return Err(DecodeError::InvalidPayloadSize(0));
        }

        // Split borrow: the buffer lives next to the decoder
        let mut buffer = std::mem::take(&mut self.decode_buffer);
        let result = self
            .ensure_decoder(payload)
            .and_then(|decoder| {
                decoder
                    .decode(payload, &mut buffer, false)
                    .map_err(|e| DecodeError::DecodingFailed(e.to_string()))
            });
        let channels = self.channels;
        let audio = result.map(|frames| DecodedAudio {
            pcm: buffer[..frames * channels as usize].to_vec(),
            sample_rate: OPUS_SAMPLE_RATE,
            channels,
        });
        self.decode_buffer = buffer;

        if audio.is_ok() {
            self.frames_decoded += 1;
        }
        audio
    }

    fn nominal_frames(&self, payload: &[u8]) -> usize {
        packet::get_nb_samples(payload, OPUS_SAMPLE_RATE)
            .unwrap_or((OPUS_SAMPLE_RATE * DEFAULT_PTIME_MS / 1000) as usize)
    }

    fn clock_rate(&self) -> u32 {
        OPUS_SAMPLE_RATE
    }

    fn name(&self) -> &'static str {
        "opus"
    }
}
