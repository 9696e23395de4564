//! Chained, pre-counted JSONL event source.
//!
//! Every input file is indexed once when the source is opened: each non-blank line is one entry
//! and its byte span is remembered. Entries are numbered across the whole chain in file order, so
//! the total is known before the scan starts and [`EventSource::load`] can seek straight to any
//! entry.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use skim_core::{CurrentEvent, Error, EventSource, Result, SampleInfo};

use crate::columns::EntryColumns;

#[derive(Debug, Clone, Copy)]
struct LineSpan {
    file: usize,
    offset: u64,
    len: usize,
}

/// Event source over one or more JSONL files of the same sample.
#[derive(Debug)]
pub struct JsonlEventSource {
    sample: SampleInfo,
    paths: Vec<PathBuf>,
    /// Handle of the file the last entry came from; at most one input is open at a time.
    current: Option<(usize, File)>,
    index: Vec<LineSpan>,
    buf: Vec<u8>,
}

/// Sample identifier derived from an input path: the file name without its extension.
pub fn sample_name_from_path(path: &Path) -> String {
    path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
}

impl JsonlEventSource {
    /// Open and index `paths`. The sample name defaults to the first file's stem.
    pub fn open<P: AsRef<Path>>(paths: &[P], sample: Option<&str>) -> Result<Self> {
        let paths: Vec<PathBuf> = paths.iter().map(|p| p.as_ref().to_path_buf()).collect();
        let first = paths
            .first()
            .ok_or_else(|| Error::Source("no input files given".to_string()))?;
        let name = match sample {
            Some(s) => s.to_string(),
            None => sample_name_from_path(first),
        };

        let mut index = Vec::new();
        for (file_idx, path) in paths.iter().enumerate() {
            let before = index.len();
            index_file(file_idx, path, &mut index)?;
            let entries = index.len() - before;
            tracing::debug!(path = %path.display(), entries, "indexed input");
        }
        if index.is_empty() {
            tracing::warn!(sample = %name, files = paths.len(), "inputs contain no entries");
        }

        Ok(Self { sample: SampleInfo::new(name), paths, current: None, index, buf: Vec::new() })
    }

    /// Input files in chain order.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    fn read_line(&mut self, span: LineSpan) -> Result<()> {
        if self.current.as_ref().is_none_or(|(idx, _)| *idx != span.file) {
            // Drop the previous handle before opening the next file.
            self.current = None;
            let path = &self.paths[span.file];
            let file = File::open(path)
                .map_err(|e| Error::Source(format!("failed to open {}: {e}", path.display())))?;
            self.current = Some((span.file, file));
        }
        let Some((_, file)) = self.current.as_mut() else {
            return Err(Error::Source("input file handle unavailable".to_string()));
        };
        file.seek(SeekFrom::Start(span.offset))?;
        self.buf.resize(span.len, 0);
        file.read_exact(&mut self.buf)?;
        Ok(())
    }
}

fn index_file(file_idx: usize, path: &Path, index: &mut Vec<LineSpan>) -> Result<()> {
    let file = File::open(path)
        .map_err(|e| Error::Source(format!("failed to open {}: {e}", path.display())))?;
    let mut reader = BufReader::new(file);
    let mut line = Vec::new();
    let mut offset = 0u64;
    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line)?;
        if n == 0 {
            break;
        }
        if line.iter().any(|b| !b.is_ascii_whitespace()) {
            index.push(LineSpan { file: file_idx, offset, len: n });
        }
        offset += n as u64;
    }
    Ok(())
}

impl EventSource for JsonlEventSource {
    fn sample(&self) -> &SampleInfo {
        &self.sample
    }

    fn total_entries(&self) -> usize {
        self.index.len()
    }

    fn load(&mut self, entry: usize, event: &mut CurrentEvent) -> Result<()> {
        let span = *self
            .index
            .get(entry)
            .ok_or_else(|| Error::Source(format!("entry {entry} out of range")))?;
        self.read_line(span)?;
        let cols: EntryColumns = serde_json::from_slice(&self.buf).map_err(|e| {
            Error::Source(format!(
                "{} entry {entry}: malformed line: {e}",
                self.paths[span.file].display()
            ))
        })?;
        cols.fill(entry, event);
        Ok(())
    }
}

/// Write events as JSONL, one entry per line.
pub fn write_jsonl_events(path: &Path, events: &[CurrentEvent]) -> Result<()> {
    let mut out = String::new();
    for ev in events {
        out.push_str(&serde_json::to_string(&EntryColumns::from_event(ev))?);
        out.push('\n');
    }
    std::fs::write(path, out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("skim_io_source_{}_{name}", std::process::id()))
    }

    #[test]
    fn test_chain_counts_and_order() {
        let a = tmp("a.jsonl");
        let b = tmp("b.jsonl");
        std::fs::write(&a, "{\"event\": 1}\n\n{\"event\": 2}\n").unwrap();
        std::fs::write(&b, "{\"event\": 3, \"jets\": {\"pt\": [40.0]}}").unwrap();

        let mut src = JsonlEventSource::open(&[&a, &b], None).unwrap();
        assert_eq!(src.total_entries(), 3);
        assert_eq!(src.sample().name(), sample_name_from_path(&a));

        let mut ev = CurrentEvent::default();
        src.load(2, &mut ev).unwrap();
        assert_eq!(ev.event, 3);
        assert_eq!(ev.jets.len(), 1);
        assert_eq!(src.current.as_ref().map(|(i, _)| *i), Some(1));
        src.load(0, &mut ev).unwrap();
        assert_eq!(ev.event, 1);
        assert!(ev.jets.is_empty());
        assert_eq!(src.current.as_ref().map(|(i, _)| *i), Some(0));
        assert!(src.load(3, &mut ev).is_err());

        std::fs::remove_file(&a).ok();
        std::fs::remove_file(&b).ok();
    }

    #[test]
    fn test_malformed_line_fails_only_that_entry() {
        let p = tmp("bad.jsonl");
        std::fs::write(&p, "{\"event\": 1}\n{\"event\": \n{\"event\": 3}\n").unwrap();
        let mut src = JsonlEventSource::open(&[&p], Some("TTJets_v71")).unwrap();
        assert_eq!(src.sample().name(), "TTJets_v71");
        let mut ev = CurrentEvent::default();
        assert!(src.load(1, &mut ev).is_err());
        src.load(2, &mut ev).unwrap();
        assert_eq!(ev.event, 3);
        std::fs::remove_file(&p).ok();
    }

    #[test]
    fn test_missing_file_and_empty_list() {
        let empty: [&Path; 0] = [];
        assert!(JsonlEventSource::open(&empty, None).is_err());
        assert!(JsonlEventSource::open(&[tmp("does_not_exist.jsonl")], None).is_err());
    }
}
