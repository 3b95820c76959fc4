// File-backed raw event source
//
// Replays a run stored as an ordered list of segment files. Rollover between
// files happens through `open_next_segment`; unreadable files are skipped and
// a corrupt record ends its segment, both with an error log.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use super::{RawEventSource, SourceConfig};
use crate::error::{Gl1Error, Result};
use crate::segment::SegmentReader;
use crate::types::RawEvent;

pub struct FileListSource {
    pending: VecDeque<PathBuf>,
    current: Option<SegmentReader>,
    segments_opened: usize,
    segments_failed: usize,
}

impl FileListSource {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            pending: paths.into(),
            current: None,
            segments_opened: 0,
            segments_failed: 0,
        }
    }

    /// Read segment paths from a list file, one per line.
    ///
    /// Blank lines and lines starting with `#` are ignored.
    pub fn from_list_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Gl1Error::FileNotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let paths: Vec<PathBuf> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(PathBuf::from)
            .collect();

        log::info!(
            "Loaded {} segment paths from list {}",
            paths.len(),
            path.display()
        );
        Ok(Self::new(paths))
    }

    /// Collect segment files matching `pattern`, sorted by path.
    pub fn from_glob(pattern: &str) -> Result<Self> {
        let mut paths = Vec::new();
        for entry in glob::glob(pattern)? {
            match entry {
                Ok(path) => paths.push(path),
                Err(e) => log::warn!("Skipping unreadable glob match: {}", e),
            }
        }

        if paths.is_empty() {
            return Err(Gl1Error::FileNotFound(format!(
                "no segment files match {}",
                pattern
            )));
        }

        paths.sort();
        Ok(Self::new(paths))
    }

    pub fn from_config(config: SourceConfig) -> Result<Self> {
        match config {
            SourceConfig::Files { paths } => Ok(Self::new(paths)),
            SourceConfig::ListFile { path } => Self::from_list_file(path),
            SourceConfig::Glob { pattern } => Self::from_glob(&pattern),
        }
    }

    pub fn remaining_segments(&self) -> usize {
        self.pending.len()
    }

    pub fn segments_opened(&self) -> usize {
        self.segments_opened
    }

    pub fn segments_failed(&self) -> usize {
        self.segments_failed
    }
}

impl RawEventSource for FileListSource {
    fn next_raw_event(&mut self) -> Option<RawEvent> {
        let reader = self.current.as_mut()?;
        match reader.next()? {
            Ok(event) => Some(event),
            Err(e) => {
                log::error!("Abandoning rest of segment: {}", e);
                self.segments_failed += 1;
                None
            }
        }
    }

    fn open_next_segment(&mut self) -> bool {
        self.current = None;
        while let Some(path) = self.pending.pop_front() {
            match SegmentReader::open(&path) {
                Ok(reader) => {
                    log::info!("Opened segment {}", path.display());
                    self.current = Some(reader);
                    self.segments_opened += 1;
                    return true;
                }
                Err(e) => {
                    log::error!("Could not open segment {}: {}", path.display(), e);
                    self.segments_failed += 1;
                }
            }
        }
        false
    }

    fn close_segment(&mut self) {
        if let Some(reader) = self.current.take() {
            log::debug!("Closed segment {}", reader.path().display());
        }
    }

    fn has_open_segment(&self) -> bool {
        self.current.is_some()
    }

    fn is_exhausted(&self) -> bool {
        self.current.is_none() && self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::SegmentWriter;
    use crate::types::EventType;
    use tempfile::TempDir;

    fn write_segment(dir: &Path, name: &str, sequences: &[i32]) -> PathBuf {
        let path = dir.join(name);
        let mut writer = SegmentWriter::create(&path).unwrap();
        for &seq in sequences {
            writer
                .write_event(&RawEvent::new(7, seq, EventType::Data))
                .unwrap();
        }
        writer.finish().unwrap();
        path
    }

    fn drain(source: &mut FileListSource) -> Vec<i32> {
        let mut seen = Vec::new();
        while source.open_next_segment() {
            while let Some(event) = source.next_raw_event() {
                seen.push(event.sequence);
            }
            source.close_segment();
        }
        seen
    }

    #[test]
    fn test_rollover_across_files() {
        let dir = TempDir::new().unwrap();
        let a = write_segment(dir.path(), "run-0000.gl1", &[1, 2]);
        let b = write_segment(dir.path(), "run-0001.gl1", &[3]);

        let mut source = FileListSource::new(vec![a, b]);
        assert_eq!(drain(&mut source), vec![1, 2, 3]);
        assert_eq!(source.segments_opened(), 2);
        assert!(source.is_exhausted());
    }

    #[test]
    fn test_unreadable_segment_is_skipped() {
        let dir = TempDir::new().unwrap();
        let good = write_segment(dir.path(), "run-0001.gl1", &[10]);
        let missing = dir.path().join("run-0000.gl1");

        let mut source = FileListSource::new(vec![missing, good]);
        assert_eq!(drain(&mut source), vec![10]);
        assert_eq!(source.segments_failed(), 1);
    }

    #[test]
    fn test_glob_is_sorted() {
        let dir = TempDir::new().unwrap();
        write_segment(dir.path(), "run-0001.gl1", &[3]);
        write_segment(dir.path(), "run-0000.gl1", &[1]);

        let pattern = format!("{}/run-*.gl1", dir.path().display());
        let mut source = FileListSource::from_glob(&pattern).unwrap();
        assert_eq!(source.remaining_segments(), 2);
        assert_eq!(drain(&mut source), vec![1, 3]);
    }

    #[test]
    fn test_glob_without_matches() {
        let dir = TempDir::new().unwrap();
        let pattern = format!("{}/*.gl1", dir.path().display());
        assert!(matches!(
            FileListSource::from_glob(&pattern),
            Err(Gl1Error::FileNotFound(_))
        ));
    }

    #[test]
    fn test_list_file_ignores_comments() {
        let dir = TempDir::new().unwrap();
        let a = write_segment(dir.path(), "a.gl1", &[1]);
        let list = dir.path().join("segments.list");
        std::fs::write(&list, format!("# run 7\n\n{}\n", a.display())).unwrap();

        let source = FileListSource::from_list_file(&list).unwrap();
        assert_eq!(source.remaining_segments(), 1);
    }
}
