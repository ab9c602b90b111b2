//! Uncompressed and companded PCM payloads (RFC 3551)
//!
//! G.711 µ-law (PT 0) and A-law (PT 8) at 8 kHz, one byte per sample,
//! and L16 big-endian linear PCM at 44.1 kHz (PT 10 stereo, PT 11 mono).

use super::{DecodedAudio, PayloadDecoder};
use crate::error::DecodeError;

pub const PCMU_PAYLOAD_TYPE: u8 = 0;
pub const PCMA_PAYLOAD_TYPE: u8 = 8;
pub const L16_STEREO_PAYLOAD_TYPE: u8 = 10;
pub const L16_MONO_PAYLOAD_TYPE: u8 = 11;

const G711_SAMPLE_RATE: u32 = 8000;
const L16_SAMPLE_RATE: u32 = 44100;

/// Expand one µ-law byte to linear PCM
pub fn ulaw_to_linear(byte: u8) -> i16 {
    let u = !byte;
    let sign = u & 0x80;
    let exponent = (u >> 4) & 0x07;
    let mantissa = (u & 0x0f) as i16;

    let magnitude = ((mantissa << 3) + 0x84) << exponent;
    if sign != 0 {
        0x84 - magnitude
    } else {
        magnitude - 0x84
    }
}

/// Expand one A-law byte to linear PCM
pub fn alaw_to_linear(byte: u8) -> i16 {
    let a = byte ^ 0x55;
    let segment = (a & 0x70) >> 4;
    let mut magnitude = ((a & 0x0f) as i16) << 4;

    match segment {
        0 => magnitude += 8,
        1 => magnitude += 0x108,
        _ => {
            magnitude += 0x108;
            magnitude <<= segment - 1;
        }
    }

    if a & 0x80 != 0 {
        magnitude
    } else {
        -magnitude
    }
}

/// G.711 µ-law
#[derive(Debug, Default)]
pub struct PcmuDecoder;

impl PcmuDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl PayloadDecoder for PcmuDecoder {
    fn decode(&mut self, payload: &[u8]) -> Result<DecodedAudio, DecodeError> {
        Ok(DecodedAudio {
            pcm: payload.iter().map(|&b| ulaw_to_linear(b)).collect(),
            sample_rate: G711_SAMPLE_RATE,
            channels: 1,
        })
    }

    fn nominal_frames(&self, payload: &[u8]) -> usize {
        payload.len()
    }

    fn clock_rate(&self) -> u32 {
        G711_SAMPLE_RATE
    }

    fn name(&self) -> &'static str {
        "PCMU"
    }
}

/// G.711 A-law
#[derive(Debug, Default)]
pub struct PcmaDecoder;

impl PcmaDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl PayloadDecoder for PcmaDecoder {
    fn decode(&mut self, payload: &[u8]) -> Result<DecodedAudio, DecodeError> {
        Ok(DecodedAudio {
            pcm: payload.iter().map(|&b| alaw_to_linear(b)).collect(),
            sample_rate: G711_SAMPLE_RATE,
            channels: 1,
        })
    }

    fn nominal_frames(&self, payload: &[u8]) -> usize {
        payload.len()
    }

    fn clock_rate(&self) -> u32 {
        G711_SAMPLE_RATE
    }

    fn name(&self) -> &'static str {
        "PCMA"
    }
}

/// 16-bit big-endian linear PCM
#[derive(Debug)]
pub struct L16Decoder {
    channels: u8,
}

impl L16Decoder {
    pub fn new(channels: u8) -> Self {
        Self { channels }
    }

    fn frame_bytes(&self) -> usize {
        2 * self.channels as usize
    }
}

impl PayloadDecoder for L16Decoder {
    fn decode(&mut self, payload: &[u8]) -> Result<DecodedAudio, DecodeError> {
        if payload.len() % self.frame_bytes() != 0 {
            return Err(DecodeError::InvalidPayloadSize(payload.len()));
        }

        Ok(DecodedAudio {
            pcm: payload
                .chunks_exact(2)
                .map(|pair| i16::from_be_bytes([pair[0], pair[1]]))
                .collect(),
            sample_rate: L16_SAMPLE_RATE,
            channels: self.channels,
        })
    }

    fn nominal_frames(&self, payload: &[u8]) -> usize {
        payload.len() / self.frame_bytes()
    }

    fn clock_rate(&self) -> u32 {
        L16_SAMPLE_RATE
    }

    fn name(&self) -> &'static str {
        "L16"
    }
}
