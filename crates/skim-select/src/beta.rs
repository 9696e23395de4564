//! Per-event memoised pileup-jet discriminant ("beta").
//!
//! The discriminant lives in a separate, independently produced table that has to be matched to
//! the jet collection. The match is done once per event and stamped with the [`EventKey`] of the
//! event it was computed for. The driver calls [`BetaCache::invalidate`] whenever it loads a new
//! event; a read that finds a stale stamp recomputes as well.

use std::cell::{Cell, RefCell};
use std::str::FromStr;

use skim_core::{CurrentEvent, EventKey, SampleInfo};

/// Value recorded for every matched jet when the requested variant name is not recognised.
pub const UNKNOWN_VARIANT_SENTINEL: f64 = -5.0;

/// Fields per sub-entry of a table row: `(pt, eta, beta, betaStar, betaClassic, betaStarClassic)`.
const ROW_STRIDE: usize = 6;

/// Which discriminant column to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BetaVariant {
    /// `beta`.
    #[default]
    Beta,
    /// `betaStar`.
    BetaStar,
    /// `betaClassic`.
    BetaClassic,
    /// `betaStarClassic`.
    BetaStarClassic,
    /// Unrecognised name; matched jets get [`UNKNOWN_VARIANT_SENTINEL`].
    Unknown,
}

impl BetaVariant {
    /// Parse a variant name; never fails.
    pub fn parse(name: &str) -> Self {
        match name {
            "beta" => BetaVariant::Beta,
            "betaStar" => BetaVariant::BetaStar,
            "betaClassic" => BetaVariant::BetaClassic,
            "betaStarClassic" => BetaVariant::BetaStarClassic,
            _ => BetaVariant::Unknown,
        }
    }

    fn column(self) -> Option<usize> {
        match self {
            BetaVariant::Beta => Some(2),
            BetaVariant::BetaStar => Some(3),
            BetaVariant::BetaClassic => Some(4),
            BetaVariant::BetaStarClassic => Some(5),
            BetaVariant::Unknown => None,
        }
    }
}

impl FromStr for BetaVariant {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

#[derive(Debug, Clone)]
struct BetaEntry {
    stamp: EventKey,
    values: Vec<Option<f64>>,
}

/// Lazily computed per-jet discriminant values for the current event.
#[derive(Debug, Default)]
pub struct BetaCache {
    variant: BetaVariant,
    entry: RefCell<Option<BetaEntry>>,
    computations: Cell<u64>,
}

impl BetaCache {
    /// Create an empty cache reading `variant`.
    pub fn new(variant: BetaVariant) -> Self {
        Self { variant, ..Default::default() }
    }

    /// Variant this cache reads.
    pub fn variant(&self) -> BetaVariant {
        self.variant
    }

    /// Drop the cached values. Called by the driver on every event advance.
    pub fn invalidate(&mut self) {
        *self.entry.get_mut() = None;
    }

    /// Number of times the values have been (re)computed.
    pub fn computations(&self) -> u64 {
        self.computations.get()
    }

    /// Discriminant of jet `index`; `None` when no table row matched that jet.
    pub fn get(&self, event: &CurrentEvent, sample: &SampleInfo, index: usize) -> Option<f64> {
        self.refresh(event, sample);
        self.entry.borrow().as_ref().and_then(|e| e.values.get(index).copied().flatten())
    }

    /// All per-jet values for the event, in jet order.
    pub fn values(&self, event: &CurrentEvent, sample: &SampleInfo) -> Vec<Option<f64>> {
        self.refresh(event, sample);
        self.entry.borrow().as_ref().map(|e| e.values.clone()).unwrap_or_default()
    }

    fn refresh(&self, event: &CurrentEvent, sample: &SampleInfo) {
        let stamp = event.key();
        let fresh = matches!(&*self.entry.borrow(), Some(e) if e.stamp == stamp);
        if fresh {
            return;
        }
        let values = compute_beta(event, sample, self.variant);
        self.computations.set(self.computations.get() + 1);
        *self.entry.borrow_mut() = Some(BetaEntry { stamp, values });
    }
}

/// Match every jet against the discriminant table.
///
/// Legacy formats carry no usable table: every jet gets 0. Otherwise each row is folded into six
/// fields (later sub-entries overwrite earlier ones position by position) and the first row whose
/// `(pt, |eta|)` equals the jet's, compared exactly at single precision, supplies the value.
pub fn compute_beta(
    event: &CurrentEvent,
    sample: &SampleInfo,
    variant: BetaVariant,
) -> Vec<Option<f64>> {
    if sample.is_legacy_format() {
        return vec![Some(0.0); event.jets.len()];
    }

    let folded: Vec<[f32; ROW_STRIDE]> =
        event.pu_jet_table.iter().map(|row| fold_row(row)).collect();

    event
        .jets
        .iter()
        .map(|jet| {
            let pt = jet.pt as f32;
            let abs_eta = (jet.eta as f32).abs();
            folded.iter().find(|f| f[0] == pt && f[1].abs() == abs_eta).map(|f| {
                variant.column().map_or(UNKNOWN_VARIANT_SENTINEL, |c| f64::from(f[c]))
            })
        })
        .collect()
}

fn fold_row(row: &[f32]) -> [f32; ROW_STRIDE] {
    let mut fields = [0.0_f32; ROW_STRIDE];
    for (j, value) in row.iter().enumerate() {
        fields[j % ROW_STRIDE] = *value;
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use skim_core::Jet;

    fn event_with_table(run: u32) -> CurrentEvent {
        CurrentEvent {
            run,
            event: 7,
            lumiblock: 3,
            jets: vec![
                Jet { pt: 45.5, eta: -1.25, ..Default::default() },
                Jet { pt: 33.0, eta: 0.5, ..Default::default() },
            ],
            pu_jet_table: vec![
                vec![33.0, 0.5, 0.1, 0.2, 0.3, 0.4],
                vec![45.5, 1.25, 0.9, 0.8, 0.7, 0.6],
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_match_by_pt_and_abs_eta() {
        let ev = event_with_table(200000);
        let s = SampleInfo::new("TTJets_v71");
        let v = compute_beta(&ev, &s, BetaVariant::Beta);
        assert_eq!(v, vec![Some(f64::from(0.9_f32)), Some(f64::from(0.1_f32))]);
        let v = compute_beta(&ev, &s, BetaVariant::BetaStarClassic);
        assert_eq!(v[1], Some(f64::from(0.4_f32)));
    }

    #[test]
    fn test_unmatched_jet_is_absent() {
        let mut ev = event_with_table(200000);
        ev.jets.push(Jet { pt: 99.0, eta: 0.0, ..Default::default() });
        let v = compute_beta(&ev, &SampleInfo::new("TTJets_v71"), BetaVariant::Beta);
        assert_eq!(v.len(), 3);
        assert_eq!(v[2], None);
    }

    #[test]
    fn test_unknown_variant_sentinel() {
        let ev = event_with_table(200000);
        let v = compute_beta(&ev, &SampleInfo::new("TTJets_v71"), BetaVariant::parse("gamma"));
        assert_eq!(v, vec![Some(-5.0), Some(-5.0)]);
    }

    #[test]
    fn test_legacy_format_zeroes() {
        let ev = event_with_table(200000);
        let v = compute_beta(&ev, &SampleInfo::new("TTJets_v66"), BetaVariant::Beta);
        assert_eq!(v, vec![Some(0.0), Some(0.0)]);
    }

    #[test]
    fn test_folding_overwrites_by_position() {
        let mut ev = event_with_table(1);
        ev.pu_jet_table = vec![vec![1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 45.5, -1.25, 0.55]];
        let v = compute_beta(&ev, &SampleInfo::new("X_v71"), BetaVariant::Beta);
        assert_eq!(v[0], Some(f64::from(0.55_f32)));
    }

    #[test]
    fn test_cache_stable_within_event_and_recomputes_after_advance() {
        let sample = SampleInfo::new("TTJets_v71");
        let mut cache = BetaCache::new(BetaVariant::Beta);
        let ev = event_with_table(200000);

        let first = cache.values(&ev, &sample);
        let second = cache.values(&ev, &sample);
        assert_eq!(first, second);
        assert_eq!(cache.get(&ev, &sample, 1), first[1]);
        assert_eq!(cache.computations(), 1);

        cache.invalidate();
        let mut next = event_with_table(200001);
        next.pu_jet_table[1][2] = 0.05;
        let third = cache.values(&next, &sample);
        assert_eq!(cache.computations(), 2);
        assert_eq!(third[0], Some(f64::from(0.05_f32)));
    }

    #[test]
    fn test_stale_stamp_recomputes_without_invalidate() {
        let sample = SampleInfo::new("TTJets_v71");
        let cache = BetaCache::new(BetaVariant::Beta);
        cache.values(&event_with_table(1), &sample);
        cache.values(&event_with_table(2), &sample);
        assert_eq!(cache.computations(), 2);
    }
}
