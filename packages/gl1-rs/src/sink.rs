// Downstream sinks for decoded packets
//
// The driver publishes each record as it is decoded, independent of how long
// the window keeps it. Sinks take `&self` so one sink can be shared by several
// inputs behind an `Arc`.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{EventSequence, Gl1Packet};

/// Receiver of every decoded packet, keyed by event sequence.
pub trait PacketSink: Send + Sync {
    fn publish(&self, sequence: EventSequence, packet: &Gl1Packet);
}

/// Keeps its own copy of everything published.
#[derive(Debug, Default)]
pub struct CollectingSink {
    packets: Mutex<BTreeMap<EventSequence, Vec<Gl1Packet>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of packets received.
    pub fn len(&self) -> usize {
        self.packets.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.lock().is_empty()
    }

    pub fn sequences(&self) -> Vec<EventSequence> {
        self.packets.lock().keys().copied().collect()
    }

    pub fn packets(&self, sequence: EventSequence) -> Vec<Gl1Packet> {
        self.packets
            .lock()
            .get(&sequence)
            .cloned()
            .unwrap_or_default()
    }

    /// Hand over everything collected so far.
    pub fn take(&self) -> BTreeMap<EventSequence, Vec<Gl1Packet>> {
        std::mem::take(&mut *self.packets.lock())
    }
}

impl PacketSink for CollectingSink {
    fn publish(&self, sequence: EventSequence, packet: &Gl1Packet) {
        self.packets
            .lock()
            .entry(sequence)
            .or_default()
            .push(packet.clone());
    }
}

/// Writes one JSON object per published packet.
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
    written: AtomicU64,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            written: AtomicU64::new(0),
        }
    }

    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn flush(&self) -> std::io::Result<()> {
        self.writer.lock().flush()
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> PacketSink for JsonLinesSink<W> {
    fn publish(&self, _sequence: EventSequence, packet: &Gl1Packet) {
        let mut writer = self.writer.lock();
        let result = serde_json::to_writer(&mut *writer, packet)
            .map_err(std::io::Error::from)
            .and_then(|_| writer.write_all(b"\n"));

        match result {
            Ok(()) => {
                self.written.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => log::warn!("Failed to write packet {}: {}", packet.sequence, e),
        }
    }
}
