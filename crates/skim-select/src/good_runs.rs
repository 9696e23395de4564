//! Good-run / luminosity-block whitelists.
//!
//! Certification files use the standard CMS JSON layout,
//! `{"190645": [[10, 110]], "190646": [[1, 35], [40, 111]]}`, which is flattened here into
//! sorted `[run, first_lumiblock, last_lumiblock]` ranges.

use std::collections::BTreeMap;
use std::path::Path;

use skim_core::{DataEra, Error, GoodRunsConfig, Result, SampleInfo};

/// One certified range: `run`, lumiblocks `first..=last`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LumiRange {
    /// Run number.
    pub run: u32,
    /// First certified lumiblock (inclusive).
    pub first: u32,
    /// Last certified lumiblock (inclusive).
    pub last: u32,
}

/// Ordered collection of certified ranges for one data-taking era.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoodRunList {
    ranges: Vec<LumiRange>,
}

impl GoodRunList {
    /// Build from arbitrary ranges; they are sorted on construction.
    pub fn new(mut ranges: Vec<LumiRange>) -> Self {
        ranges.sort_unstable();
        Self { ranges }
    }

    /// Parse a certification JSON document.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let raw: BTreeMap<String, Vec<[u32; 2]>> = serde_json::from_str(s)?;
        let mut ranges = Vec::new();
        for (run, blocks) in raw {
            let run: u32 = run.trim().parse().map_err(|_| {
                Error::Validation(format!("invalid run number in good-run list: {run:?}"))
            })?;
            for [first, last] in blocks {
                if first > last {
                    return Err(Error::Validation(format!(
                        "run {run}: lumiblock range [{first}, {last}] is reversed"
                    )));
                }
                ranges.push(LumiRange { run, first, last });
            }
        }
        Ok(Self::new(ranges))
    }

    /// Read a certification JSON file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let list = Self::from_json_str(&text)?;
        tracing::debug!(path = %path.display(), ranges = list.len(), "loaded good-run list");
        Ok(list)
    }

    /// Number of certified ranges.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// No certified ranges.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// The ranges, sorted.
    pub fn ranges(&self) -> &[LumiRange] {
        &self.ranges
    }

    /// Whether `(run, lumiblock)` is certified.
    pub fn contains(&self, run: u32, lumiblock: u32) -> bool {
        let start = self.ranges.partition_point(|r| r.run < run);
        self.ranges[start..]
            .iter()
            .take_while(|r| r.run == run)
            .any(|r| r.first <= lumiblock && lumiblock <= r.last)
    }
}

/// Whitelists for the three 2012 reconstruction eras.
#[derive(Debug, Clone, Default)]
pub struct GoodRuns {
    prompt: Option<GoodRunList>,
    aug24: Option<GoodRunList>,
    jul13: Option<GoodRunList>,
}

impl GoodRuns {
    /// Assemble from already loaded lists.
    pub fn new(
        prompt: Option<GoodRunList>,
        aug24: Option<GoodRunList>,
        jul13: Option<GoodRunList>,
    ) -> Self {
        Self { prompt, aug24, jul13 }
    }

    /// Load every configured list.
    pub fn from_config(cfg: &GoodRunsConfig) -> Result<Self> {
        let load = |p: &Option<std::path::PathBuf>| {
            p.as_deref().map(GoodRunList::from_path).transpose()
        };
        Ok(Self { prompt: load(&cfg.prompt)?, aug24: load(&cfg.aug24)?, jul13: load(&cfg.jul13)? })
    }

    /// Whitelist of an era, if configured.
    pub fn list(&self, era: DataEra) -> Option<&GoodRunList> {
        match era {
            DataEra::PromptReco => self.prompt.as_ref(),
            DataEra::Aug24 => self.aug24.as_ref(),
            DataEra::Jul13 => self.jul13.as_ref(),
        }
    }

    /// Warn once per scan when a data sample's era has no whitelist: every event will fail.
    pub fn check_sample(&self, sample: &SampleInfo) {
        if let Some(era) = sample.data_era() {
            if self.list(era).is_none() {
                tracing::warn!(
                    sample = sample.name(),
                    era = era.tag(),
                    "no good-run list configured for this era; every event fails the good-run cut"
                );
            }
        }
    }

    /// Good-run decision for one event.
    ///
    /// Simulation and data of an unrecognised era always pass. Data of a known era must appear
    /// in that era's whitelist; an unconfigured whitelist certifies nothing.
    pub fn passes(&self, sample: &SampleInfo, run: u32, lumiblock: u32) -> bool {
        match sample.data_era() {
            None => true,
            Some(era) => self.list(era).is_some_and(|l| l.contains(run, lumiblock)),
        }
    }
}
