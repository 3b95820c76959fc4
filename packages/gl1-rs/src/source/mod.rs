// Sequential raw event sources
//
// A source hands out raw events one segment at a time. The window driver only
// ever sees the `RawEventSource` trait; how segments map to files (or memory)
// and how broken segments are handled stays inside the implementation.
//
// Current implementations:
// - Memory: pre-built segments, used for tests and programmatic replay
// - Files: an ordered list of segment files (explicit, list file, or glob)

mod file;
mod memory;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;
use crate::types::RawEvent;

pub use file::FileListSource;
pub use memory::MemorySource;

/// Sequential supplier of raw events, segment by segment.
///
/// Once `is_exhausted` reports true no further events are produced.
pub trait RawEventSource {
    /// Next event of the open segment, or `None` when the segment is used up.
    fn next_raw_event(&mut self) -> Option<RawEvent>;

    /// Open the following segment. Returns false when there is none.
    fn open_next_segment(&mut self) -> bool;

    /// Close the open segment, if any.
    fn close_segment(&mut self);

    fn has_open_segment(&self) -> bool;

    /// True when no segment is open and none remain.
    fn is_exhausted(&self) -> bool;
}

impl<S: RawEventSource + ?Sized> RawEventSource for Box<S> {
    fn next_raw_event(&mut self) -> Option<RawEvent> {
        (**self).next_raw_event()
    }

    fn open_next_segment(&mut self) -> bool {
        (**self).open_next_segment()
    }

    fn close_segment(&mut self) {
        (**self).close_segment()
    }

    fn has_open_segment(&self) -> bool {
        (**self).has_open_segment()
    }

    fn is_exhausted(&self) -> bool {
        (**self).is_exhausted()
    }
}

/// How to locate the segment files of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum SourceConfig {
    /// Explicit, already ordered segment paths
    #[serde(rename = "files")]
    Files { paths: Vec<PathBuf> },

    /// Text file with one segment path per line (`#` comments allowed)
    #[serde(rename = "list")]
    ListFile { path: PathBuf },

    /// Glob pattern; matches are replayed in sorted order
    #[serde(rename = "glob")]
    Glob { pattern: String },
}

/// Build a source from its configuration.
pub fn create_source(config: SourceConfig) -> Result<Box<dyn RawEventSource>> {
    Ok(Box::new(FileListSource::from_config(config)?))
}
