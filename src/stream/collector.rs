//! Stream collector
//!
//! Groups incoming packet records into streams keyed by flow and call.
//! Ingestion may come from a capture thread while the control side reads
//! snapshots, so the map is concurrent and creation order is kept in a
//! separate list.

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::protocol::{FlowKey, MediaPacketRecord};

/// Key of a collected stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamKey {
    pub flow: FlowKey,
    pub call_id: u32,
}

/// A packet as stored in its stream
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedPacket {
    pub seq: u16,
    pub media_timestamp: u32,
    /// Milliseconds since the first packet of the stream arrived
    pub arrival_offset_ms: f64,
    pub payload_type: u8,
    pub payload: Bytes,
}

/// Packets of one flow within one call, in arrival order
#[derive(Debug, Clone)]
pub struct Stream {
    pub key: StreamKey,
    /// Absolute arrival time of the first packet
    pub start_time: DateTime<Utc>,
    /// Capture-relative arrival of the first packet, used for ordering
    pub start_offset_ms: f64,
    pub packets: Vec<CapturedPacket>,
}

impl Stream {
    pub fn packet_count(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}

/// Collects packet records into streams
pub struct StreamCollector {
    capture_start: DateTime<Utc>,
    streams: DashMap<StreamKey, Stream>,
    order: Mutex<Vec<StreamKey>>,
}

impl StreamCollector {
    /// `capture_start` is the absolute time that record arrival offsets
    /// are measured from.
    pub fn new(capture_start: DateTime<Utc>) -> Self {
        Self {
            capture_start,
            streams: DashMap::new(),
            order: Mutex::new(Vec::new()),
        }
    }

    /// Append a packet to its stream, creating the stream on first sight
    pub fn add_packet(&self, record: MediaPacketRecord) {
        let key = StreamKey {
            flow: record.flow_key,
            call_id: record.call_id,
        };

        let mut created = false;
        {
            let mut stream = self.streams.entry(key).or_insert_with(|| {
                created = true;
                Stream {
                    key,
                    start_time: self.capture_start + offset_duration(record.arrival_offset_ms),
                    start_offset_ms: record.arrival_offset_ms,
                    packets: Vec::new(),
                }
            });

            let arrival_offset_ms = record.arrival_offset_ms - stream.start_offset_ms;
            stream.packets.push(CapturedPacket {
                seq: record.seq,
                media_timestamp: record.media_timestamp,
                arrival_offset_ms,
                payload_type: record.payload_type,
                payload: record.payload,
            });
        }

        // Never taken while a shard lock is held
        if created {
            tracing::debug!("New stream {} in call {}", key.flow, key.call_id);
            self.order.lock().push(key);
        }
    }

    /// Number of distinct streams
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Total packets across all streams
    pub fn packet_count(&self) -> usize {
        self.streams.iter().map(|s| s.packets.len()).sum()
    }

    /// Copy of every stream, ordered by first arrival
    pub fn snapshot(&self) -> Vec<Stream> {
        let order = self.order.lock().clone();
        let mut streams: Vec<Stream> = order
            .iter()
            .filter_map(|key| self.streams.get(key).map(|s| s.clone()))
            .collect();
        streams.sort_by(|a, b| a.start_offset_ms.total_cmp(&b.start_offset_ms));
        streams
    }

    /// Drop every collected stream
    pub fn clear(&self) {
        let mut order = self.order.lock();
        self.streams.clear();
        order.clear();
    }
}

fn offset_duration(offset_ms: f64) -> Duration {
    Duration::microseconds((offset_ms * 1000.0).round() as i64)
}
