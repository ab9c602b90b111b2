//! Packet grouping into RTP streams

pub mod collector;

pub use collector::{CapturedPacket, Stream, StreamCollector, StreamKey};
