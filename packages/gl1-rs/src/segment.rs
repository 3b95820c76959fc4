//! Raw event segment files.
//!
//! A run is written as an ordered list of segment files. Each file starts with
//! the magic `GL1S` and a little-endian `u16` format version, followed by
//! length-prefixed event records:
//!
//! ```text
//! u32 record_len
//! i32 run_number | i32 sequence | u16 event_type | u16 packet_count
//! packet_count × (i32 identifier | i32 hit_format | u32 payload_len | payload)
//! ```

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use memmap2::Mmap;
use std::fs::File;
use std::io::{self, BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{Gl1Error, Result};
use crate::types::{EventType, RawEvent, RawPacket};

pub const SEGMENT_MAGIC: &[u8; 4] = b"GL1S";
pub const SEGMENT_VERSION: u16 = 1;

const HEADER_LEN: usize = 6;

/// Sequential reader over a memory-mapped segment file.
pub struct SegmentReader {
    path: PathBuf,
    data: Mmap,
    position: usize,
    failed: bool,
}

impl SegmentReader {
    /// Map `path` and validate its header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(Gl1Error::FileNotFound(path.display().to_string()));
        }

        let file = File::open(&path)?;
        // SAFETY: segment files are written once and never modified while replayed.
        let data = unsafe { Mmap::map(&file)? };

        if data.len() < HEADER_LEN || &data[..4] != SEGMENT_MAGIC {
            return Err(Gl1Error::InvalidSegment(format!(
                "{}: missing GL1S header",
                path.display()
            )));
        }
        let version = LittleEndian::read_u16(&data[4..HEADER_LEN]);
        if version != SEGMENT_VERSION {
            return Err(Gl1Error::UnsupportedVersion(version));
        }

        Ok(Self {
            path,
            data,
            position: HEADER_LEN,
            failed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the next event; `Ok(None)` at a clean end of file.
    pub fn read_event(&mut self) -> Result<Option<RawEvent>> {
        let remaining = &self.data[self.position..];
        if remaining.is_empty() {
            return Ok(None);
        }

        let offset = self.position;
        if remaining.len() < 4 {
            return Err(self.corrupt(offset, "truncated record length"));
        }
        let record_len = LittleEndian::read_u32(&remaining[..4]) as usize;
        let body = match remaining.get(4..4 + record_len) {
            Some(body) => body,
            None => return Err(self.corrupt(offset, "record extends past end of file")),
        };

        let event = parse_record(body).map_err(|e| self.corrupt(offset, &e.to_string()))?;
        self.position += 4 + record_len;
        Ok(Some(event))
    }

    fn corrupt(&self, offset: usize, reason: &str) -> Gl1Error {
        Gl1Error::InvalidSegment(format!(
            "{}: {} at offset {}",
            self.path.display(),
            reason,
            offset
        ))
    }
}

impl Iterator for SegmentReader {
    type Item = Result<RawEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.read_event() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

fn parse_record(body: &[u8]) -> io::Result<RawEvent> {
    let mut cursor = Cursor::new(body);
    let run_number = cursor.read_i32::<LittleEndian>()?;
    let sequence = cursor.read_i32::<LittleEndian>()?;
    let event_type = EventType::from_code(cursor.read_u16::<LittleEndian>()?);
    let packet_count = cursor.read_u16::<LittleEndian>()?;

    let mut event = RawEvent::new(run_number, sequence, event_type);
    for _ in 0..packet_count {
        let identifier = cursor.read_i32::<LittleEndian>()?;
        let hit_format = cursor.read_i32::<LittleEndian>()?;
        let payload_len = cursor.read_u32::<LittleEndian>()? as usize;
        let left = body.len() - cursor.position() as usize;
        if payload_len > left {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("payload of {} bytes with only {} left in record", payload_len, left),
            ));
        }
        let mut payload = vec![0u8; payload_len];
        cursor.read_exact(&mut payload)?;
        event.packets.push(RawPacket {
            identifier,
            hit_format,
            payload,
        });
    }

    if cursor.position() as usize != body.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "record length disagrees with contents",
        ));
    }
    Ok(event)
}

fn length_u32(len: usize, event: &RawEvent, what: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        Gl1Error::InvalidSegment(format!(
            "event {}: {} of {} bytes does not fit a u32 length",
            event.sequence, what, len
        ))
    })
}

/// Writes raw events in the segment format.
pub struct SegmentWriter<W: Write> {
    writer: W,
    events_written: u64,
}

impl SegmentWriter<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> SegmentWriter<W> {
    /// Wrap `writer` and emit the segment header.
    pub fn new(mut writer: W) -> Result<Self> {
        writer.write_all(SEGMENT_MAGIC)?;
        writer.write_u16::<LittleEndian>(SEGMENT_VERSION)?;
        Ok(Self {
            writer,
            events_written: 0,
        })
    }

    pub fn write_event(&mut self, event: &RawEvent) -> Result<()> {
        let packet_count = u16::try_from(event.packets.len()).map_err(|_| {
            Gl1Error::InvalidSegment(format!(
                "event {} has {} packets, more than a record can hold",
                event.sequence,
                event.packets.len()
            ))
        })?;

        let mut body = Vec::with_capacity(
            12 + event
                .packets
                .iter()
                .map(|p| 12 + p.payload.len())
                .sum::<usize>(),
        );
        body.write_i32::<LittleEndian>(event.run_number)?;
        body.write_i32::<LittleEndian>(event.sequence)?;
        body.write_u16::<LittleEndian>(event.event_type.code())?;
        body.write_u16::<LittleEndian>(packet_count)?;
        for packet in &event.packets {
            body.write_i32::<LittleEndian>(packet.identifier)?;
            body.write_i32::<LittleEndian>(packet.hit_format)?;
            let payload_len = length_u32(packet.payload.len(), event, "payload")?;
            body.write_u32::<LittleEndian>(payload_len)?;
            body.write_all(&packet.payload)?;
        }

        self.writer
            .write_u32::<LittleEndian>(length_u32(body.len(), event, "record")?)?;
        self.writer.write_all(&body)?;
        self.events_written += 1;
        Ok(())
    }

    pub fn events_written(&self) -> u64 {
        self.events_written
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn event(sequence: i32, event_type: EventType) -> RawEvent {
        RawEvent::new(21_000, sequence, event_type).with_packet(RawPacket {
            identifier: 14001,
            hit_format: 2,
            payload: vec![sequence as u8; 8],
        })
    }

    #[test]
    fn test_write_then_read_segment() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run-0000.gl1");

        let mut writer = SegmentWriter::create(&path).unwrap();
        writer.write_event(&event(1, EventType::BeginRun)).unwrap();
        writer.write_event(&event(2, EventType::Data)).unwrap();
        assert_eq!(writer.events_written(), 2);
        writer.finish().unwrap();

        let events: Vec<RawEvent> = SegmentReader::open(&path)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(events, vec![event(1, EventType::BeginRun), event(2, EventType::Data)]);
    }

    #[test]
    fn test_rejects_bad_magic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.gl1");
        std::fs::write(&path, b"PRDF\x01\x00").unwrap();

        assert!(matches!(
            SegmentReader::open(&path),
            Err(Gl1Error::InvalidSegment(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("v9.gl1");
        std::fs::write(&path, b"GL1S\x09\x00").unwrap();

        assert!(matches!(
            SegmentReader::open(&path),
            Err(Gl1Error::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            SegmentReader::open("/nonexistent/segment.gl1"),
            Err(Gl1Error::FileNotFound(_))
        ));
    }

    #[test]
    fn test_truncated_tail_stops_iteration() {
        let mut buf = Vec::new();
        {
            let mut writer = SegmentWriter::new(&mut buf).unwrap();
            writer.write_event(&event(1, EventType::Data)).unwrap();
            writer.write_event(&event(2, EventType::Data)).unwrap();
            writer.finish().unwrap();
        }
        buf.truncate(buf.len() - 3);

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("short.gl1");
        std::fs::write(&path, &buf).unwrap();

        let mut reader = SegmentReader::open(&path).unwrap();
        assert_eq!(reader.next().unwrap().unwrap().sequence, 1);
        assert!(matches!(reader.next(), Some(Err(Gl1Error::InvalidSegment(_)))));
        assert!(reader.next().is_none());
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_lengths_beyond_u32_are_refused() {
        let event = event(3, EventType::Data);
        assert_eq!(length_u32(1876, &event, "payload").unwrap(), 1876);
        assert!(matches!(
            length_u32(u32::MAX as usize + 1, &event, "payload"),
            Err(Gl1Error::InvalidSegment(msg)) if msg.contains("event 3")
        ));
    }

    #[test]
    fn test_oversized_payload_length_is_rejected() {
        let mut body = Vec::new();
        body.write_i32::<LittleEndian>(21_000).unwrap();
        body.write_i32::<LittleEndian>(1).unwrap();
        body.write_u16::<LittleEndian>(EventType::DATA_CODE).unwrap();
        body.write_u16::<LittleEndian>(1).unwrap();
        body.write_i32::<LittleEndian>(14001).unwrap();
        body.write_i32::<LittleEndian>(0).unwrap();
        body.write_u32::<LittleEndian>(u32::MAX).unwrap();

        let mut buf = b"GL1S\x01\x00".to_vec();
        buf.write_u32::<LittleEndian>(body.len() as u32).unwrap();
        buf.extend_from_slice(&body);

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("huge.gl1");
        std::fs::write(&path, &buf).unwrap();

        let mut reader = SegmentReader::open(&path).unwrap();
        match reader.next() {
            Some(Err(Gl1Error::InvalidSegment(msg))) => assert!(msg.contains("only 0 left")),
            other => panic!("expected a corrupt record, got {:?}", other),
        }
        assert!(reader.next().is_none());
    }
}
