//! Records exchanged with the surrounding application
//!
//! `MediaPacketRecord` is what the capture/dissection side hands us;
//! `TrackStatus` and `AudioDeviceInfo` are what a UI reads back.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

use crate::tracks::TrackStats;

/// Identity of one RTP flow: both endpoints and the synchronization source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowKey {
    pub src: SocketAddr,
    pub dst: SocketAddr,
    pub ssrc: u32,
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} 0x{:08x}", self.src, self.dst, self.ssrc)
    }
}

/// One dissected RTP packet as delivered by the capture collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaPacketRecord {
    pub flow_key: FlowKey,
    /// Call/session the flow was correlated with
    pub call_id: u32,
    pub seq: u16,
    pub media_timestamp: u32,
    /// Capture-relative arrival time in milliseconds
    pub arrival_offset_ms: f64,
    /// RTP payload type, used as the codec hint
    pub payload_type: u8,
    /// Encoded payload; empty when the capture truncated it
    #[serde(default)]
    pub payload: Bytes,
}

/// Summary of one decoded track
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackStatus {
    pub track_id: usize,
    pub label: String,
    pub call_id: u32,
    pub channel_slot: u8,
    pub sample_rate: u32,
    pub sample_count: usize,
    pub start_time: DateTime<Utc>,
    pub stop_time: DateTime<Utc>,
    pub duration_secs: f64,
    pub stats: TrackStats,
    /// Play slot this track is selected into, if any
    pub selected_slot: Option<usize>,
}

/// Output device as listed for the user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioDeviceInfo {
    pub id: String,
    pub name: String,
    pub is_default: bool,
    pub sample_rates: Vec<u32>,
    pub channels: Vec<u16>,
}
