use std::io::Write;

use crate::types::{EventSequence, RawPacket};

const BYTES_PER_LINE: usize = 32;

/// Hex dump of raw GL1 packets, one block per packet.
pub struct PacketDumper {
    writer: Box<dyn Write + Send>,
    packets_dumped: u64,
}

impl PacketDumper {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer,
            packets_dumped: 0,
        }
    }

    pub fn packets_dumped(&self) -> u64 {
        self.packets_dumped
    }

    pub fn dump(
        &mut self,
        sequence: EventSequence,
        bco: u64,
        packet: &RawPacket,
    ) -> std::io::Result<()> {
        writeln!(
            self.writer,
            "Packet {} evtno: {} bco: 0x{:x} length: {}",
            packet.identifier,
            sequence,
            bco,
            packet.payload.len()
        )?;
        for (line, chunk) in packet.payload.chunks(BYTES_PER_LINE).enumerate() {
            let words: Vec<String> = chunk.chunks(4).map(hex::encode).collect();
            writeln!(
                self.writer,
                "{:06x}: {}",
                line * BYTES_PER_LINE,
                words.join(" ")
            )?;
        }
        self.packets_dumped += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_dump_format() {
        let buf = SharedBuf::default();
        let mut dumper = PacketDumper::new(Box::new(buf.clone()));
        let packet = RawPacket {
            identifier: 14001,
            hit_format: 0,
            payload: (0u8..40).collect(),
        };
        dumper.dump(8, 0xbeef, &packet).unwrap();
        assert_eq!(dumper.packets_dumped(), 1);

        let text = String::from_utf8(buf.0.lock().clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Packet 14001 evtno: 8 bco: 0xbeef length: 40");
        assert!(lines[1].starts_with("000000: 00010203 04050607"));
        assert_eq!(lines[2], "000020: 20212223 24252627");
    }
}
