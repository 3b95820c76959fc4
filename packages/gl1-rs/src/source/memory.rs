use std::collections::VecDeque;

use super::RawEventSource;
use crate::types::RawEvent;

/// Source backed by segments held in memory.
#[derive(Debug, Default)]
pub struct MemorySource {
    segments: VecDeque<Vec<RawEvent>>,
    current: Option<std::vec::IntoIter<RawEvent>>,
    segments_opened: usize,
}

impl MemorySource {
    pub fn new(segments: Vec<Vec<RawEvent>>) -> Self {
        Self {
            segments: segments.into(),
            current: None,
            segments_opened: 0,
        }
    }

    /// Single-segment source.
    pub fn from_events(events: Vec<RawEvent>) -> Self {
        Self::new(vec![events])
    }

    pub fn push_segment(&mut self, events: Vec<RawEvent>) {
        self.segments.push_back(events);
    }

    pub fn segments_opened(&self) -> usize {
        self.segments_opened
    }
}

impl RawEventSource for MemorySource {
    fn next_raw_event(&mut self) -> Option<RawEvent> {
        self.current.as_mut()?.next()
    }

    fn open_next_segment(&mut self) -> bool {
        match self.segments.pop_front() {
            Some(events) => {
                self.current = Some(events.into_iter());
                self.segments_opened += 1;
                true
            }
            None => {
                self.current = None;
                false
            }
        }
    }

    fn close_segment(&mut self) {
        self.current = None;
    }

    fn has_open_segment(&self) -> bool {
        self.current.is_some()
    }

    fn is_exhausted(&self) -> bool {
        self.current.is_none() && self.segments.is_empty()
    }
}
