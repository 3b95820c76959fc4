// Sequence-ordered retention window for decoded GL1 packets
//
// Records stay here from the moment the driver inserts them until the consumer
// reaps them with a watermark. One ordered map serves as both the store and the
// pending-key index, so the key set and the stored records cannot diverge.

use serde::Serialize;
use std::collections::btree_map::{self, BTreeMap};

use crate::types::{EventSequence, Gl1Packet};

/// Counters describing buffer traffic since construction.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct BufferMetrics {
    pub total_inserted: u64,
    pub total_released: u64,
    pub keys_released: u64,
    pub current_keys: usize,
    pub current_records: usize,
    pub peak_keys: usize,
}

#[derive(Debug, Default)]
pub struct EventWindowBuffer {
    records: BTreeMap<EventSequence, Vec<Gl1Packet>>,
    record_count: usize,
    /// Highest key ever released. Older keys must not come back; the same key
    /// can, when a duplicate arrives after its first copy was reaped.
    last_released: Option<EventSequence>,
    total_inserted: u64,
    total_released: u64,
    keys_released: u64,
    peak_keys: usize,
}

impl EventWindowBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `record` under its sequence, after any records already there.
    pub fn insert(&mut self, record: Gl1Packet) {
        let sequence = record.sequence;
        debug_assert!(
            !self.is_stale(sequence),
            "event {} re-inserted after release up to {:?}",
            sequence,
            self.last_released
        );
        if self.last_released == Some(sequence) {
            log::warn!("late duplicate of already released event {}", sequence);
        }

        self.records.entry(sequence).or_default().push(record);
        self.record_count += 1;
        self.total_inserted += 1;
        self.peak_keys = self.peak_keys.max(self.records.len());
    }

    /// Drop every key `<= watermark`, oldest first. Returns the number of keys released.
    pub fn release_through(&mut self, watermark: EventSequence) -> usize {
        let mut released = 0;
        while let Some(entry) = self.records.first_entry() {
            if *entry.key() > watermark {
                break;
            }
            let (sequence, records) = entry.remove_entry();
            self.record_count -= records.len();
            self.total_released += records.len() as u64;
            self.keys_released += 1;
            self.last_released = Some(sequence);
            released += 1;
        }
        released
    }

    /// Remove everything regardless of watermark. Teardown only.
    pub fn clear(&mut self) {
        if let Some(&last) = self.records.keys().next_back() {
            self.last_released = Some(last);
        }
        self.records.clear();
        self.record_count = 0;
    }

    /// Highest sequence released so far.
    pub fn last_released(&self) -> Option<EventSequence> {
        self.last_released
    }

    /// True when `sequence` lies below what has already been released and
    /// can no longer be stored.
    pub fn is_stale(&self, sequence: EventSequence) -> bool {
        self.last_released.is_some_and(|released| sequence < released)
    }

    /// Oldest pending sequence.
    pub fn first_key(&self) -> Option<EventSequence> {
        self.records.keys().next().copied()
    }

    /// Newest pending sequence.
    pub fn last_key(&self) -> Option<EventSequence> {
        self.records.keys().next_back().copied()
    }

    /// Number of distinct pending sequences.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total records across all keys.
    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn contains(&self, sequence: EventSequence) -> bool {
        self.records.contains_key(&sequence)
    }

    pub fn get(&self, sequence: EventSequence) -> Option<&[Gl1Packet]> {
        self.records.get(&sequence).map(Vec::as_slice)
    }

    /// Pending sequences in ascending order.
    pub fn keys(&self) -> btree_map::Keys<'_, EventSequence, Vec<Gl1Packet>> {
        self.records.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, EventSequence, Vec<Gl1Packet>> {
        self.records.iter()
    }

    pub fn metrics(&self) -> BufferMetrics {
        BufferMetrics {
            total_inserted: self.total_inserted,
            total_released: self.total_released,
            keys_released: self.keys_released,
            current_keys: self.records.len(),
            current_records: self.record_count,
            peak_keys: self.peak_keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_with(sequences: &[EventSequence]) -> EventWindowBuffer {
        let mut buffer = EventWindowBuffer::new();
        for &seq in sequences {
            buffer.insert(Gl1Packet::new(seq));
        }
        buffer
    }

    fn keys(buffer: &EventWindowBuffer) -> Vec<EventSequence> {
        buffer.keys().copied().collect()
    }

    #[test]
    fn test_duplicates_share_a_key() {
        let buffer = buffer_with(&[5, 5, 6]);
        assert_eq!(keys(&buffer), vec![5, 6]);
        assert_eq!(buffer.get(5).map(<[Gl1Packet]>::len), Some(2));
        assert_eq!(buffer.record_count(), 3);
        assert_eq!(buffer.first_key(), Some(5));
        assert_eq!(buffer.last_key(), Some(6));
    }

    #[test]
    fn test_release_is_a_prefix() {
        let mut buffer = buffer_with(&[1, 2, 3]);
        assert_eq!(buffer.release_through(2), 2);
        assert_eq!(keys(&buffer), vec![3]);
        assert!(!buffer.contains(1));
        assert!(!buffer.contains(2));
    }

    #[test]
    fn test_release_below_first_key_is_noop() {
        let mut buffer = buffer_with(&[4, 8]);
        assert_eq!(buffer.release_through(3), 0);
        assert_eq!(keys(&buffer), vec![4, 8]);
    }

    #[test]
    fn test_release_everything() {
        let mut buffer = buffer_with(&[1, 1, 9]);
        assert_eq!(buffer.release_through(EventSequence::MAX), 2);
        assert!(buffer.is_empty());
        assert_eq!(buffer.record_count(), 0);
    }

    #[test]
    fn test_metrics() {
        let mut buffer = buffer_with(&[1, 2, 2, 3]);
        buffer.release_through(2);

        let metrics = buffer.metrics();
        assert_eq!(metrics.total_inserted, 4);
        assert_eq!(metrics.total_released, 3);
        assert_eq!(metrics.keys_released, 2);
        assert_eq!(metrics.current_keys, 1);
        assert_eq!(metrics.current_records, 1);
        assert_eq!(metrics.peak_keys, 3);
    }

    #[test]
    fn test_late_duplicate_of_released_key() {
        let mut buffer = buffer_with(&[1, 2]);
        buffer.release_through(2);
        buffer.insert(Gl1Packet::new(2));
        assert_eq!(buffer.first_key(), Some(2));
    }

    #[test]
    fn test_stale_sequences() {
        let mut buffer = buffer_with(&[4, 5, 6]);
        assert!(!buffer.is_stale(1));
        buffer.release_through(5);
        assert_eq!(buffer.last_released(), Some(5));
        assert!(buffer.is_stale(4));
        assert!(!buffer.is_stale(5));
        assert!(!buffer.is_stale(7));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "re-inserted")]
    fn test_reinsert_after_release_asserts() {
        let mut buffer = buffer_with(&[1, 2]);
        buffer.release_through(2);
        buffer.insert(Gl1Packet::new(1));
    }
}
