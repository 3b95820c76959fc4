//! GL1 packet decoding.
//!
//! The GL1 payload is a fixed little-endian block:
//!
//! | offset | size      | field                                   |
//! |--------|-----------|-----------------------------------------|
//! | 0      | 4 (i32)   | packet number                           |
//! | 4      | 6 × 8     | BCO, bunch, trigger input, live, scaled, GTM busy |
//! | 52     | 64×3 × 8  | trigger scalers, channel-major          |
//! | 1588   | 12×3 × 8  | GL1P scalers (raw, live, scaled)        |

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::Cursor;

use crate::error::DecodeError;
use crate::types::{
    Gl1Packet, RawEvent, RawPacket, GL1P_PROCESSORS, SCALER_CHANNELS, SCALER_KINDS,
};

/// Packet identifier the GL1 board writes into every data event.
pub const DEFAULT_GL1_PACKET_ID: i32 = 14001;

const HEADER_WORDS: usize = 6;

/// Size in bytes of a complete GL1 payload.
pub const GL1_PAYLOAD_LEN: usize =
    4 + 8 * (HEADER_WORDS + SCALER_CHANNELS * SCALER_KINDS + GL1P_PROCESSORS * SCALER_KINDS);

/// Outcome of decoding one raw event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Record(Gl1Packet),
    /// Not a data event (begin/end run and other control events).
    Skip,
}

#[derive(Debug, Clone)]
pub struct Gl1Decoder {
    packet_id: i32,
}

impl Default for Gl1Decoder {
    fn default() -> Self {
        Self::new(DEFAULT_GL1_PACKET_ID)
    }
}

impl Gl1Decoder {
    pub fn new(packet_id: i32) -> Self {
        Self { packet_id }
    }

    pub fn packet_id(&self) -> i32 {
        self.packet_id
    }

    /// Decode the GL1 sub-packet of `event`.
    ///
    /// Pure: the same event always yields the same result.
    pub fn decode(&self, event: &RawEvent) -> Result<Decoded, DecodeError> {
        if !event.event_type.is_data() {
            return Ok(Decoded::Skip);
        }

        let packet = event
            .packet(self.packet_id)
            .ok_or(DecodeError::MissingSubpacket {
                sequence: event.sequence,
                packet_id: self.packet_id,
            })?;

        let truncated = DecodeError::TruncatedPayload {
            sequence: event.sequence,
            expected: GL1_PAYLOAD_LEN,
            actual: packet.payload.len(),
        };
        if packet.payload.len() < GL1_PAYLOAD_LEN {
            return Err(truncated);
        }

        let mut record =
            read_payload(&packet.payload, event.sequence).map_err(|_| truncated.clone())?;
        record.identifier = packet.identifier;
        record.hit_format = packet.hit_format;
        Ok(Decoded::Record(record))
    }

    /// Build the raw sub-packet that decodes back to `record`.
    pub fn encode(&self, record: &Gl1Packet) -> RawPacket {
        RawPacket {
            identifier: self.packet_id,
            hit_format: record.hit_format,
            payload: encode_payload(record),
        }
    }
}

fn read_payload(payload: &[u8], sequence: i32) -> std::io::Result<Gl1Packet> {
    let mut cursor = Cursor::new(payload);
    let mut record = Gl1Packet::new(sequence);

    record.packet_number = cursor.read_i32::<LittleEndian>()?;
    record.bco = cursor.read_u64::<LittleEndian>()?;
    record.bunch_number = cursor.read_u64::<LittleEndian>()?;
    record.trigger_input = cursor.read_u64::<LittleEndian>()?;
    record.live_vector = cursor.read_u64::<LittleEndian>()?;
    record.scaled_vector = cursor.read_u64::<LittleEndian>()?;
    record.gtm_busy_vector = cursor.read_u64::<LittleEndian>()?;

    for channel in 0..SCALER_CHANNELS {
        for kind in 0..SCALER_KINDS {
            record.set_scaler(channel, kind, cursor.read_u64::<LittleEndian>()?);
        }
    }
    for processor in 0..GL1P_PROCESSORS {
        for kind in 0..SCALER_KINDS {
            record.set_gl1p_scaler(processor, kind, cursor.read_u64::<LittleEndian>()?);
        }
    }

    Ok(record)
}

/// Serialize the payload fields of `record` in the GL1 layout.
pub fn encode_payload(record: &Gl1Packet) -> Vec<u8> {
    let mut buf = vec![0u8; GL1_PAYLOAD_LEN];
    LittleEndian::write_i32(&mut buf[0..4], record.packet_number);

    let header = [
        record.bco,
        record.bunch_number,
        record.trigger_input,
        record.live_vector,
        record.scaled_vector,
        record.gtm_busy_vector,
    ];
    let tables = record
        .scalers()
        .iter()
        .chain(record.gl1p_scalers())
        .flat_map(|row| row.iter().copied());

    for (i, value) in header.into_iter().chain(tables).enumerate() {
        let offset = 4 + i * 8;
        LittleEndian::write_u64(&mut buf[offset..offset + 8], value);
    }
    buf
}
