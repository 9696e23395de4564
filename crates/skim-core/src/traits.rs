//! Seams to the collaborators around the selection core.
//!
//! The selection engine never reaches into an ntuple reader, a writer, or a numeric solver
//! directly; the driver is handed implementations of these traits instead.

use crate::Result;
use crate::event::CurrentEvent;
use crate::record::{MetaInfo, ReducedRecord};
use crate::sample::SampleInfo;

/// Ordered, pre-counted source of events.
pub trait EventSource {
    /// The sample being read.
    fn sample(&self) -> &SampleInfo;

    /// Total number of entries, known before the scan starts.
    fn total_entries(&self) -> usize;

    /// Overwrite `event` with entry `entry`.
    ///
    /// On error the contents of `event` are unspecified and the caller skips the entry.
    fn load(&mut self, entry: usize, event: &mut CurrentEvent) -> Result<()>;
}

/// Destination of reduced records.
pub trait RecordSink {
    /// Append one record; records arrive in input order.
    fn write(&mut self, record: &ReducedRecord) -> Result<()>;

    /// Flush everything, storing the provenance record alongside.
    fn finish(&mut self, meta: &MetaInfo) -> Result<()>;
}

/// A visible parent system for MT2: mass and transverse momentum.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VisibleParent {
    /// Invariant mass (GeV).
    pub mass: f64,
    /// Momentum x component.
    pub px: f64,
    /// Momentum y component.
    pub py: f64,
}

/// Two-body transverse-mass (MT2) minimiser.
pub trait Mt2Solver {
    /// MT2 of the two visible parents with missing momentum `(missing_px, missing_py)` shared by
    /// two invisible particles of mass `invisible_mass`.
    fn mt2(
        &self,
        a: VisibleParent,
        b: VisibleParent,
        missing: (f64, f64),
        invisible_mass: f64,
    ) -> f64;
}

/// Per-event pileup weight lookup.
pub trait PileupReweighter {
    /// Weight for an event with the given true number of interactions.
    fn weight(&self, true_interactions: f64) -> f64;
}
