// GL1 trigger input: window driver and reaper
//
// `fill_pool` pulls raw events from the source, decodes them, publishes each
// record to the sink and keeps it in the window until the consumer releases it
// with `cleanup_used_packets`. Everything runs synchronously on the caller's
// thread; decode anomalies and source exhaustion are handled here and never
// surface as errors.

use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;

use crate::buffer::{BufferMetrics, EventWindowBuffer};
use crate::config::PoolConfig;
use crate::decoder::{Decoded, Gl1Decoder};
use crate::dump::PacketDumper;
use crate::error::Gl1Error;
use crate::policy::{FillPolicy, LookaheadPolicy};
use crate::sink::PacketSink;
use crate::source::RawEventSource;
use crate::types::{EventSequence, Gl1Packet, RawEvent};

/// Which part of the window `describe` lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescribeScope {
    All,
    /// Buffered records
    Storage,
    /// Pending sequence numbers
    Stack,
}

impl DescribeScope {
    fn storage(self) -> bool {
        matches!(self, DescribeScope::All | DescribeScope::Storage)
    }

    fn stack(self) -> bool {
        matches!(self, DescribeScope::All | DescribeScope::Stack)
    }
}

impl FromStr for DescribeScope {
    type Err = Gl1Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ALL" => Ok(DescribeScope::All),
            "STORAGE" => Ok(DescribeScope::Storage),
            "STACK" => Ok(DescribeScope::Stack),
            other => Err(Gl1Error::InvalidConfig(format!(
                "unknown describe scope '{}', expected ALL, STORAGE or STACK",
                other
            ))),
        }
    }
}

impl fmt::Display for DescribeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DescribeScope::All => "ALL",
            DescribeScope::Storage => "STORAGE",
            DescribeScope::Stack => "STACK",
        };
        f.write_str(name)
    }
}

/// Snapshot of input counters.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PoolStats {
    pub name: String,
    pub run_number: Option<i32>,
    pub fill_calls: u64,
    pub raw_events: u64,
    pub special_events: u64,
    pub anomalies: u64,
    pub published: u64,
    pub exhausted: bool,
    pub buffer: BufferMetrics,
}

pub struct Gl1TriggerInput<S: RawEventSource> {
    config: PoolConfig,
    source: S,
    decoder: Gl1Decoder,
    policy: Box<dyn FillPolicy>,
    buffer: EventWindowBuffer,
    sink: Option<Arc<dyn PacketSink>>,
    dumper: Option<PacketDumper>,
    all_done: bool,
    run_number: Option<i32>,
    fill_calls: u64,
    raw_events: u64,
    special_events: u64,
    anomalies: u64,
    published: u64,
}

impl<S: RawEventSource> Gl1TriggerInput<S> {
    pub fn new(config: PoolConfig, source: S) -> Self {
        let dumper = config
            .dump_packets
            .then(|| PacketDumper::new(Box::new(std::io::stderr())));

        Self {
            decoder: Gl1Decoder::new(config.packet_id),
            config,
            source,
            policy: Box::new(LookaheadPolicy),
            buffer: EventWindowBuffer::new(),
            sink: None,
            dumper,
            all_done: false,
            run_number: None,
            fill_calls: 0,
            raw_events: 0,
            special_events: 0,
            anomalies: 0,
            published: 0,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn PacketSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_policy(mut self, policy: Box<dyn FillPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Hex dump every decoded GL1 packet to `writer`.
    pub fn with_dump_writer(mut self, writer: Box<dyn Write + Send>) -> Self {
        self.dumper = Some(PacketDumper::new(writer));
        self
    }

    /// Register or remove the downstream sink.
    pub fn set_sink(&mut self, sink: Option<Arc<dyn PacketSink>>) {
        self.sink = sink;
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn buffer(&self) -> &EventWindowBuffer {
        &self.buffer
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run number of the most recent raw event.
    pub fn run_number(&self) -> Option<i32> {
        self.run_number
    }

    /// True once the source ran dry. Further `fill_pool` calls do nothing.
    pub fn is_exhausted(&self) -> bool {
        self.all_done
    }

    /// Pull events until the fill policy is satisfied for `min_keep` or the
    /// source is exhausted.
    pub fn fill_pool(&mut self, min_keep: usize) {
        if self.all_done {
            return;
        }
        self.fill_calls += 1;

        if !self.source.has_open_segment()
            && (self.source.is_exhausted() || !self.source.open_next_segment())
        {
            self.mark_exhausted();
            return;
        }

        loop {
            if let Some(line) = self.window_trace() {
                log::info!("{}", line);
            }
            if !self.policy.need_more(&self.buffer, min_keep, self.all_done) {
                break;
            }

            let Some(event) = self.pull_raw_event() else {
                self.mark_exhausted();
                return;
            };
            self.raw_events += 1;

            if self.config.verbosity > 2 {
                log::info!("{}: fetching next event {}", self.config.name, event.sequence);
            }
            self.run_number = Some(event.run_number);
            if self.config.verbosity > 1 {
                log::info!(
                    "{}: event {} run {} type {:?} with {} packets",
                    self.config.name,
                    event.sequence,
                    event.run_number,
                    event.event_type,
                    event.packets.len()
                );
            }

            let record = match self.decoder.decode(&event) {
                Ok(Decoded::Record(record)) => record,
                Ok(Decoded::Skip) => {
                    self.special_events += 1;
                    continue;
                }
                Err(e) => {
                    log::error!("{}: dropping event: {}", self.config.name, e);
                    self.anomalies += 1;
                    continue;
                }
            };

            if self.config.verbosity > 2 {
                log::info!(
                    "{}: packet {} evtno: {}, bco: 0x{:x}, bunch no: {}",
                    self.config.name,
                    record.identifier,
                    record.sequence,
                    record.bco,
                    record.bunch_number
                );
            }

            if self.buffer.is_stale(record.sequence) {
                log::warn!(
                    "{}: dropping event {}, already released up to {:?}",
                    self.config.name,
                    record.sequence,
                    self.buffer.last_released()
                );
                self.anomalies += 1;
                continue;
            }

            self.publish(&record);
            self.dump(&event, &record);
            self.store(record);
        }
    }

    /// Release every buffered event with sequence `<= watermark`.
    ///
    /// Returns how many distinct sequences were released.
    pub fn cleanup_used_packets(&mut self, watermark: EventSequence) -> usize {
        let released = self.buffer.release_through(watermark);
        if released > 0 {
            log::debug!(
                "{}: released {} events up to {}",
                self.config.name,
                released,
                watermark
            );
        }
        released
    }

    /// Drop the oldest pending event. Used to get past a stuck consumer.
    pub fn clear_current_event(&mut self) {
        match self.buffer.first_key() {
            Some(current) => {
                log::info!("{}: clearing event {}", self.config.name, current);
                self.cleanup_used_packets(current);
            }
            None => log::debug!("{}: no current event to clear", self.config.name),
        }
    }

    /// List buffered (`Event:`) and/or pending (`stacked event:`) sequences.
    pub fn describe(&self, scope: DescribeScope) -> String {
        let mut out = String::new();
        if scope.storage() {
            for sequence in self.buffer.keys() {
                out.push_str(&format!("Event: {}\n", sequence));
            }
        }
        if scope.stack() {
            for sequence in self.buffer.keys() {
                out.push_str(&format!("stacked event: {}\n", sequence));
            }
        }
        out
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            name: self.config.name.clone(),
            run_number: self.run_number,
            fill_calls: self.fill_calls,
            raw_events: self.raw_events,
            special_events: self.special_events,
            anomalies: self.anomalies,
            published: self.published,
            exhausted: self.all_done,
            buffer: self.buffer.metrics(),
        }
    }

    /// Oldest and newest pending key, once verbosity asks for per-event traces.
    fn window_trace(&self) -> Option<String> {
        if self.config.verbosity <= 1 {
            return None;
        }
        let first = self.buffer.first_key()?;
        let last = self.buffer.last_key()?;
        Some(format!(
            "{}: first event: {} last event: {}",
            self.config.name, first, last
        ))
    }

    /// Next raw event, rolling over to the following segment at end of segment.
    fn pull_raw_event(&mut self) -> Option<RawEvent> {
        loop {
            if let Some(event) = self.source.next_raw_event() {
                return Some(event);
            }
            self.source.close_segment();
            if !self.source.open_next_segment() {
                return None;
            }
        }
    }

    fn mark_exhausted(&mut self) {
        if !self.all_done {
            log::info!(
                "{}: source exhausted after {} raw events",
                self.config.name,
                self.raw_events
            );
        }
        self.all_done = true;
    }

    fn publish(&mut self, record: &Gl1Packet) {
        if let Some(sink) = &self.sink {
            sink.publish(record.sequence, record);
            self.published += 1;
        }
    }

    fn dump(&mut self, event: &RawEvent, record: &Gl1Packet) {
        let Some(dumper) = self.dumper.as_mut() else {
            return;
        };
        if let Some(packet) = event.packet(self.decoder.packet_id()) {
            if let Err(e) = dumper.dump(record.sequence, record.bco, packet) {
                log::warn!("{}: packet dump failed: {}", self.config.name, e);
            }
        }
    }

    fn store(&mut self, record: Gl1Packet) {
        if let Some(last) = self.buffer.last_key() {
            if record.sequence < last {
                log::warn!(
                    "{}: event {} arrived after event {}",
                    self.config.name,
                    record.sequence,
                    last
                );
            }
        }
        self.buffer.insert(record);
    }
}

impl<S: RawEventSource> Drop for Gl1TriggerInput<S> {
    fn drop(&mut self) {
        self.cleanup_used_packets(EventSequence::MAX);
        self.buffer.clear();
        if let Some(dumper) = self.dumper.as_mut() {
            let _ = dumper.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::CollectingSink;
    use crate::source::MemorySource;
    use crate::types::{EventType, RawPacket};

    fn data_event(sequence: EventSequence) -> RawEvent {
        let decoder = Gl1Decoder::default();
        let mut record = Gl1Packet::new(sequence);
        record.bco = 0x1000 + sequence as u64;
        RawEvent::new(42, sequence, EventType::Data).with_packet(decoder.encode(&record))
    }

    fn input(sequences: &[EventSequence]) -> Gl1TriggerInput<MemorySource> {
        let events = sequences.iter().map(|&s| data_event(s)).collect();
        Gl1TriggerInput::new(PoolConfig::default(), MemorySource::from_events(events))
    }

    fn keys(input: &Gl1TriggerInput<MemorySource>) -> Vec<EventSequence> {
        input.buffer().keys().copied().collect()
    }

    #[test]
    fn test_duplicate_sequences_are_appended() {
        let mut input = input(&[5, 5, 6]);
        input.fill_pool(1);

        assert_eq!(keys(&input), vec![5, 6]);
        assert_eq!(input.buffer().get(5).map(<[Gl1Packet]>::len), Some(2));
        assert!(!input.is_exhausted());
    }

    #[test]
    fn test_exhaustion_stops_fill() {
        let mut input = input(&[1, 2, 3]);
        input.fill_pool(10);

        assert_eq!(keys(&input), vec![1, 2, 3]);
        assert!(input.is_exhausted());

        input.fill_pool(10);
        assert_eq!(input.stats().fill_calls, 1);
    }

    #[test]
    fn test_empty_source_is_exhausted_immediately() {
        let mut input = Gl1TriggerInput::new(PoolConfig::default(), MemorySource::default());
        input.fill_pool(2);
        assert!(input.is_exhausted());
        assert!(input.buffer().is_empty());
    }

    #[test]
    fn test_cleanup_and_clear_current() {
        let mut input = input(&[1, 2, 3, 7]);
        input.fill_pool(10);

        assert_eq!(input.cleanup_used_packets(2), 2);
        assert_eq!(keys(&input), vec![3, 7]);

        input.clear_current_event();
        assert_eq!(keys(&input), vec![7]);
    }

    #[test]
    fn test_clear_current_on_empty_buffer() {
        let mut input = input(&[]);
        input.clear_current_event();
        assert!(input.buffer().is_empty());
    }

    #[test]
    fn test_missing_subpacket_is_an_anomaly() {
        let sink = Arc::new(CollectingSink::new());
        let broken = RawEvent::new(42, 2, EventType::Data).with_packet(RawPacket {
            identifier: 12001,
            hit_format: 0,
            payload: vec![],
        });
        let source = MemorySource::from_events(vec![data_event(1), broken, data_event(3)]);
        let mut input =
            Gl1TriggerInput::new(PoolConfig::default(), source).with_sink(sink.clone());

        input.fill_pool(2);

        let stats = input.stats();
        assert_eq!(stats.anomalies, 1);
        assert_eq!(keys(&input), vec![1, 3]);
        assert_eq!(sink.sequences(), vec![1, 3]);
        assert_eq!(stats.published, 2);
    }

    #[test]
    fn test_control_events_are_counted() {
        let source = MemorySource::from_events(vec![
            RawEvent::new(42, 0, EventType::BeginRun),
            data_event(1),
            data_event(2),
            RawEvent::new(42, 3, EventType::EndRun),
        ]);
        let mut input = Gl1TriggerInput::new(PoolConfig::default(), source);
        input.fill_pool(10);

        let stats = input.stats();
        assert_eq!(stats.special_events, 2);
        assert_eq!(stats.raw_events, 4);
        assert_eq!(stats.run_number, Some(42));
        assert_eq!(keys(&input), vec![1, 2]);
    }

    #[test]
    fn test_describe_scopes() {
        let mut input = input(&[3, 4]);
        input.fill_pool(1);

        assert_eq!(input.describe(DescribeScope::Storage), "Event: 3\nEvent: 4\n");
        assert_eq!(
            input.describe(DescribeScope::Stack),
            "stacked event: 3\nstacked event: 4\n"
        );
        assert_eq!(input.describe(DescribeScope::All).lines().count(), 4);
        assert_eq!(keys(&input), vec![3, 4]);
    }

    #[test]
    fn test_custom_policy() {
        struct OneAtATime;

        impl FillPolicy for OneAtATime {
            fn need_more(&self, buffer: &EventWindowBuffer, _: usize, exhausted: bool) -> bool {
                !exhausted && buffer.is_empty()
            }
        }

        let mut input = input(&[1, 2, 3]).with_policy(Box::new(OneAtATime));
        input.fill_pool(10);
        assert_eq!(keys(&input), vec![1]);

        input.clear_current_event();
        input.fill_pool(10);
        assert_eq!(keys(&input), vec![2]);
    }

    #[test]
    fn test_dump_writer_receives_packets() {
        #[derive(Clone, Default)]
        struct Shared(Arc<parking_lot::Mutex<Vec<u8>>>);

        impl Write for Shared {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let out = Shared::default();
        let mut input = input(&[1, 2]).with_dump_writer(Box::new(out.clone()));
        input.fill_pool(2);
        drop(input);

        let text = String::from_utf8(out.0.lock().clone()).unwrap();
        assert!(text.starts_with("Packet 14001 evtno: 1 bco: 0x1001 length: 1876\n"));
        assert!(text.contains("Packet 14001 evtno: 2 bco: 0x1002"));
    }

    #[test]
    fn test_window_trace_follows_verbosity() {
        let mut quiet = input(&[3, 4]);
        quiet.fill_pool(1);
        assert_eq!(quiet.window_trace(), None);

        let events = vec![data_event(3), data_event(4)];
        let mut loud = Gl1TriggerInput::new(
            PoolConfig::new("GL1-loud").with_verbosity(2),
            MemorySource::from_events(events),
        );
        assert_eq!(loud.window_trace(), None);
        loud.fill_pool(1);
        assert_eq!(
            loud.window_trace().as_deref(),
            Some("GL1-loud: first event: 3 last event: 4")
        );
    }

    #[test]
    fn test_scope_parsing() {
        assert_eq!("ALL".parse::<DescribeScope>().unwrap(), DescribeScope::All);
        assert_eq!("storage".parse::<DescribeScope>().unwrap(), DescribeScope::Storage);
        assert_eq!(DescribeScope::Stack.to_string(), "STACK");
        assert!("EVERYTHING".parse::<DescribeScope>().is_err());
    }
}
