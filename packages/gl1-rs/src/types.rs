use serde::{Deserialize, Serialize};

/// Event sequence number as assigned by the DAQ event builder.
pub type EventSequence = i32;

/// Number of GL1 trigger scaler channels.
pub const SCALER_CHANNELS: usize = 64;

/// Number of GL1P (trigger processor) scaler rows.
pub const GL1P_PROCESSORS: usize = 12;

/// Scaler kinds per row: raw, live, scaled.
pub const SCALER_KINDS: usize = 3;

/// Raw event type as stamped by the DAQ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Data,
    BeginRun,
    EndRun,
    Other(u16),
}

impl EventType {
    pub const DATA_CODE: u16 = 1;
    pub const BEGIN_RUN_CODE: u16 = 9;
    pub const END_RUN_CODE: u16 = 12;

    pub fn from_code(code: u16) -> Self {
        match code {
            Self::DATA_CODE => EventType::Data,
            Self::BEGIN_RUN_CODE => EventType::BeginRun,
            Self::END_RUN_CODE => EventType::EndRun,
            other => EventType::Other(other),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            EventType::Data => Self::DATA_CODE,
            EventType::BeginRun => Self::BEGIN_RUN_CODE,
            EventType::EndRun => Self::END_RUN_CODE,
            EventType::Other(code) => code,
        }
    }

    /// Only data events carry trigger packets.
    pub fn is_data(self) -> bool {
        self == EventType::Data
    }
}

/// One sub-packet of a raw event, payload left undecoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub identifier: i32,
    pub hit_format: i32,
    pub payload: Vec<u8>,
}

/// A raw event as delivered by a [`crate::source::RawEventSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub run_number: i32,
    pub sequence: EventSequence,
    pub event_type: EventType,
    pub packets: Vec<RawPacket>,
}

impl RawEvent {
    pub fn new(run_number: i32, sequence: EventSequence, event_type: EventType) -> Self {
        Self {
            run_number,
            sequence,
            event_type,
            packets: Vec::new(),
        }
    }

    pub fn with_packet(mut self, packet: RawPacket) -> Self {
        self.packets.push(packet);
        self
    }

    /// Find the sub-packet with the given identifier.
    pub fn packet(&self, identifier: i32) -> Option<&RawPacket> {
        self.packets.iter().find(|p| p.identifier == identifier)
    }
}

/// Decoded GL1 trigger packet for a single event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Gl1Packet {
    pub identifier: i32,
    pub hit_format: i32,
    pub sequence: EventSequence,
    pub packet_number: i32,
    /// Beam crossing clock. Opaque, compare only.
    pub bco: u64,
    pub bunch_number: u64,
    pub trigger_input: u64,
    pub live_vector: u64,
    pub scaled_vector: u64,
    pub gtm_busy_vector: u64,
    scalers: Vec<[u64; SCALER_KINDS]>,
    gl1p_scalers: Vec<[u64; SCALER_KINDS]>,
}

impl Gl1Packet {
    /// Create an empty packet for `sequence` with zeroed scaler tables.
    pub fn new(sequence: EventSequence) -> Self {
        Self {
            identifier: 0,
            hit_format: 0,
            sequence,
            packet_number: 0,
            bco: 0,
            bunch_number: 0,
            trigger_input: 0,
            live_vector: 0,
            scaled_vector: 0,
            gtm_busy_vector: 0,
            scalers: vec![[0; SCALER_KINDS]; SCALER_CHANNELS],
            gl1p_scalers: vec![[0; SCALER_KINDS]; GL1P_PROCESSORS],
        }
    }

    /// Scaler value for `channel` (0..64) and `kind` (0..3).
    pub fn scaler(&self, channel: usize, kind: usize) -> Option<u64> {
        self.scalers.get(channel)?.get(kind).copied()
    }

    /// Returns false when the indices are out of range.
    pub fn set_scaler(&mut self, channel: usize, kind: usize, value: u64) -> bool {
        match self.scalers.get_mut(channel).and_then(|row| row.get_mut(kind)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// GL1P scaler value for `processor` (0..12) and `kind` (0..3).
    pub fn gl1p_scaler(&self, processor: usize, kind: usize) -> Option<u64> {
        self.gl1p_scalers.get(processor)?.get(kind).copied()
    }

    pub fn set_gl1p_scaler(&mut self, processor: usize, kind: usize, value: u64) -> bool {
        match self
            .gl1p_scalers
            .get_mut(processor)
            .and_then(|row| row.get_mut(kind))
        {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn scalers(&self) -> &[[u64; SCALER_KINDS]] {
        &self.scalers
    }

    pub fn gl1p_scalers(&self) -> &[[u64; SCALER_KINDS]] {
        &self.gl1p_scalers
    }
}
