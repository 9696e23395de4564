//! In-memory event source and record sink.

use std::collections::HashSet;

use skim_core::{
    CurrentEvent, Error, EventSource, MetaInfo, RecordSink, ReducedRecord, Result, SampleInfo,
};

/// Event source over a vector of pre-built events.
#[derive(Debug, Clone)]
pub struct VecSource {
    sample: SampleInfo,
    events: Vec<CurrentEvent>,
    unreadable: HashSet<usize>,
}

impl VecSource {
    /// Source for `sample` yielding `events` in order.
    pub fn new(sample: impl Into<String>, events: Vec<CurrentEvent>) -> Self {
        Self { sample: SampleInfo::new(sample), events, unreadable: HashSet::new() }
    }

    /// Make entry `entry` fail to load.
    pub fn with_unreadable(mut self, entry: usize) -> Self {
        self.unreadable.insert(entry);
        self
    }
}

impl EventSource for VecSource {
    fn sample(&self) -> &SampleInfo {
        &self.sample
    }

    fn total_entries(&self) -> usize {
        self.events.len()
    }

    fn load(&mut self, entry: usize, event: &mut CurrentEvent) -> Result<()> {
        if self.unreadable.contains(&entry) {
            return Err(Error::Source(format!("entry {entry} is unreadable")));
        }
        let src = self
            .events
            .get(entry)
            .ok_or_else(|| Error::Source(format!("entry {entry} out of range")))?;
        event.clone_from(src);
        Ok(())
    }
}

/// Sink collecting records in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    /// Records in write order.
    pub records: Vec<ReducedRecord>,
    /// Provenance, set by `finish`.
    pub meta: Option<MetaInfo>,
}

impl RecordSink for MemorySink {
    fn write(&mut self, record: &ReducedRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn finish(&mut self, meta: &MetaInfo) -> Result<()> {
        self.meta = Some(meta.clone());
        Ok(())
    }
}
