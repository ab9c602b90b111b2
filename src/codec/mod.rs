//! Payload decoding
//!
//! The jitter simulator only needs `payload -> PCM` per packet. Codecs sit
//! behind [`PayloadDecoder`]; the [`CodecRegistry`] maps RTP payload types
//! to decoder constructors and each decode pass draws its own
//! [`DecoderSet`] so stateful codecs stay continuous within one stream.

pub mod opus;
pub mod pcm;

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::CodecConfig;
use crate::constants::{DEFAULT_PTIME_MS, DEFAULT_SAMPLE_RATE};
use crate::error::DecodeError;

pub use self::opus::OpusDecoder;
pub use pcm::{L16Decoder, PcmaDecoder, PcmuDecoder};

/// PCM produced from one payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAudio {
    /// Interleaved samples
    pub pcm: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u8,
}

impl DecodedAudio {
    /// Samples per channel
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.pcm.len() / self.channels as usize
        }
    }
}

/// A codec able to turn RTP payloads into PCM
pub trait PayloadDecoder: Send {
    fn decode(&mut self, payload: &[u8]) -> Result<DecodedAudio, DecodeError>;

    /// Frames the payload would have produced, used to size the silence
    /// that replaces it when decoding fails
    fn nominal_frames(&self, payload: &[u8]) -> usize;

    /// Media clock rate of the RTP timestamps
    fn clock_rate(&self) -> u32;

    fn name(&self) -> &'static str;
}

type DecoderFactory = Arc<dyn Fn() -> Box<dyn PayloadDecoder> + Send + Sync>;

/// Payload type to decoder mapping
#[derive(Clone)]
pub struct CodecRegistry {
    factories: HashMap<u8, DecoderFactory>,
}

impl CodecRegistry {
    /// Registry with no codecs at all
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Static RTP assignments plus the configured dynamic ones
    pub fn new(config: &CodecConfig) -> Self {
        let mut registry = Self::empty();
        registry.register(pcm::PCMU_PAYLOAD_TYPE, || Box::new(PcmuDecoder::new()));
        registry.register(pcm::PCMA_PAYLOAD_TYPE, || Box::new(PcmaDecoder::new()));
        registry.register(pcm::L16_STEREO_PAYLOAD_TYPE, || Box::new(L16Decoder::new(2)));
        registry.register(pcm::L16_MONO_PAYLOAD_TYPE, || Box::new(L16Decoder::new(1)));
        if let Some(pt) = config.opus_payload_type {
            registry.register(pt, || Box::new(OpusDecoder::new()));
        }
        registry
    }

    /// Add or replace the decoder for `payload_type`
    pub fn register<F>(&mut self, payload_type: u8, factory: F)
    where
        F: Fn() -> Box<dyn PayloadDecoder> + Send + Sync + 'static,
    {
        self.factories.insert(payload_type, Arc::new(factory));
    }

    pub fn supports(&self, payload_type: u8) -> bool {
        self.factories.contains_key(&payload_type)
    }

    /// Fresh decoder state for one decode pass
    pub fn decoder_set(&self) -> DecoderSet<'_> {
        DecoderSet {
            registry: self,
            decoders: HashMap::new(),
        }
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new(&CodecConfig::default())
    }
}

/// Decoder instances for one stream, created lazily per payload type
pub struct DecoderSet<'a> {
    registry: &'a CodecRegistry,
    decoders: HashMap<u8, Box<dyn PayloadDecoder>>,
}

impl DecoderSet<'_> {
    fn decoder(&mut self, payload_type: u8) -> Option<&mut Box<dyn PayloadDecoder>> {
        if !self.decoders.contains_key(&payload_type) {
            let factory = self.registry.factories.get(&payload_type)?;
            self.decoders.insert(payload_type, factory());
        }
        self.decoders.get_mut(&payload_type)
    }

    /// Decode one payload using the codec registered for `payload_type`
    pub fn decode(&mut self, payload: &[u8], payload_type: u8) -> Result<DecodedAudio, DecodeError> {
        match self.decoder(payload_type) {
            Some(decoder) => decoder.decode(payload),
            None => Err(DecodeError::UnsupportedPayloadType(payload_type)),
        }
    }

    pub fn nominal_frames(&mut self, payload: &[u8], payload_type: u8) -> usize {
        match self.decoder(payload_type) {
            Some(decoder) => decoder.nominal_frames(payload),
            None => (DEFAULT_SAMPLE_RATE * DEFAULT_PTIME_MS / 1000) as usize,
        }
    }

    pub fn clock_rate(&mut self, payload_type: u8) -> u32 {
        self.decoder(payload_type)
            .map(|d| d.clock_rate())
            .unwrap_or(DEFAULT_SAMPLE_RATE)
    }
}
