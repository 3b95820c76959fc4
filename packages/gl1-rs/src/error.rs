use thiserror::Error;

use crate::types::EventSequence;

#[derive(Error, Debug)]
pub enum Gl1Error {
    #[error("Segment file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid segment: {0}")]
    InvalidSegment(String),

    #[error("Unsupported segment format version: {0}")]
    UnsupportedVersion(u16),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Gl1Error>;

/// Reasons a data-class event cannot be turned into a [`crate::Gl1Packet`].
///
/// Both are per-event anomalies: the event is dropped and the stream continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("event {sequence}: packet {packet_id} missing")]
    MissingSubpacket {
        sequence: EventSequence,
        packet_id: i32,
    },

    #[error("event {sequence}: packet payload truncated ({actual} of {expected} bytes)")]
    TruncatedPayload {
        sequence: EventSequence,
        expected: usize,
        actual: usize,
    },
}
