//! Scan driver: event source in, reduced records out.
//!
//! The driver owns the only mutable state of a scan (the current event, the beta cache and the
//! deduplication set) and composes the selection, derivation and weighting components over it.
//! Events are processed strictly in input order.

use std::time::{Duration, Instant};

use chrono::{DateTime, Datelike, Timelike, Utc};
use skim_core::record::{narrow_count, narrow_f32, narrow_mass};
use skim_core::{
    CurrentEvent, EventSource, MetaInfo, Mt2Solver, PileupReweighter, REDUCED_TREE_VERSION,
    RecordSink, ReducedRecord, Result, SampleInfo, SkimConfig,
};

use crate::beta::{BetaCache, BetaVariant};
use crate::cutflow::CutFlow;
use crate::dedup::EventDeduplicator;
use crate::good_runs::GoodRuns;
use crate::kinematics::{CSV_LOOSE, CSV_MEDIUM, CSV_TIGHT, Kinematics};
use crate::mt2::GoldenSectionMt2;
use crate::objects::ObjectSelector;
use crate::pileup::{LumiReWeighting, NoPileupReweighting};
use crate::weights::{WeightResolver, parse_mass_points};
use crate::working_point::WorkingPoint;

/// Counters reported at the end of a scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Entries in the input.
    pub entries: usize,
    /// Records handed to the sink.
    pub written: usize,
    /// Entries the source failed to load.
    pub failed: usize,
}

/// The reduced-tree maker.
pub struct Skimmer {
    weights: WeightResolver,
    good_runs: GoodRuns,
    pileup: Box<dyn PileupReweighter>,
    mt2: Box<dyn Mt2Solver>,
    beta_variant: BetaVariant,
    iso_track_pt: f64,
    w_mass: f64,
    progress_interval: usize,
}

impl std::fmt::Debug for Skimmer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Skimmer")
            .field("weights", &self.weights)
            .field("good_runs", &self.good_runs)
            .field("beta_variant", &self.beta_variant)
            .field("iso_track_pt", &self.iso_track_pt)
            .field("w_mass", &self.w_mass)
            .field("progress_interval", &self.progress_interval)
            .finish_non_exhaustive()
    }
}

impl Skimmer {
    /// Skimmer with default settings: no good-run lists, no pileup reweighting.
    pub fn new(weights: WeightResolver) -> Self {
        let defaults = SkimConfig::default();
        Self {
            weights,
            good_runs: GoodRuns::default(),
            pileup: Box::new(NoPileupReweighting),
            mt2: Box::new(GoldenSectionMt2::default()),
            beta_variant: BetaVariant::parse(&defaults.beta_variant),
            iso_track_pt: defaults.iso_track_pt,
            w_mass: defaults.w_mass,
            progress_interval: defaults.progress_interval,
        }
    }

    /// Build every component from a validated configuration, loading the referenced files.
    pub fn from_config(cfg: &SkimConfig) -> Result<Self> {
        let weights = WeightResolver::from_config(cfg)?;
        let good_runs = GoodRuns::from_config(&cfg.good_runs)?;
        let pileup: Box<dyn PileupReweighter> = match &cfg.pileup {
            Some(pu) => Box::new(LumiReWeighting::from_config(pu)?),
            None => Box::new(NoPileupReweighting),
        };
        let beta_variant = BetaVariant::parse(&cfg.beta_variant);
        if beta_variant == BetaVariant::Unknown {
            tracing::warn!(
                variant = %cfg.beta_variant,
                "unknown beta variant; matched jets get the -5 sentinel and fail the beta cut"
            );
        }
        Ok(Self {
            weights,
            good_runs,
            pileup,
            mt2: Box::new(GoldenSectionMt2::default()),
            beta_variant,
            iso_track_pt: cfg.iso_track_pt,
            w_mass: cfg.w_mass,
            progress_interval: cfg.progress_interval,
        })
    }

    /// Replace the good-run lists.
    pub fn with_good_runs(mut self, good_runs: GoodRuns) -> Self {
        self.good_runs = good_runs;
        self
    }

    /// Replace the pileup reweighter.
    pub fn with_pileup(mut self, pileup: Box<dyn PileupReweighter>) -> Self {
        self.pileup = pileup;
        self
    }

    /// Replace the MT2 solver.
    pub fn with_mt2_solver(mut self, mt2: Box<dyn Mt2Solver>) -> Self {
        self.mt2 = mt2;
        self
    }

    /// Select the beta variant.
    pub fn with_beta_variant(mut self, variant: BetaVariant) -> Self {
        self.beta_variant = variant;
        self
    }

    /// Entries between progress lines (0 disables).
    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }

    /// The weight resolver.
    pub fn weights(&self) -> &WeightResolver {
        &self.weights
    }

    /// Build the reduced record of one event.
    ///
    /// `base_weight` is the sample normalisation; mass-point samples replace it with the weight
    /// of the event's mass point.
    pub fn reduce_event(
        &self,
        event: &CurrentEvent,
        sample: &SampleInfo,
        beta: &BetaCache,
        base_weight: f64,
    ) -> ReducedRecord {
        let sel = ObjectSelector::new(event, sample, beta);
        let cuts = CutFlow::new(sel, &self.good_runs).evaluate();
        let kin = Kinematics::new(sel);

        let (mass1, mass2) = parse_mass_points(&event.model_params);
        let lumi_weight = if self.weights.is_mass_point_sample(sample) {
            self.weights.mass_point_weight(sample.name(), mass1, mass2)
        } else {
            base_weight
        };
        let true_interactions = sel.num_true_interactions();
        let pu_weight =
            if sample.is_real_data() { 1.0 } else { self.pileup.weight(true_interactions) };

        let leptons = |wp: WorkingPoint| {
            let e = sel.num_electrons(wp, true);
            let m = sel.num_muons(wp, true);
            let t = sel.num_taus(wp, true);
            (narrow_count(e), narrow_count(m), narrow_count(t), narrow_count(e + m + t))
        };
        let (veto_e, veto_m, veto_t, veto_l) = leptons(WorkingPoint::Veto);
        let (loose_e, loose_m, loose_t, loose_l) = leptons(WorkingPoint::Loose);
        let (medium_e, medium_m, medium_t, medium_l) = leptons(WorkingPoint::Medium);
        let (tight_e, tight_m, tight_t, tight_l) = leptons(WorkingPoint::Tight);

        let jet_pt = |n| narrow_f32(kin.nth_highest_jet_pt(n));
        let jet_csv = |n| narrow_f32(kin.nth_highest_jet_csv(n));

        ReducedRecord {
            passes_json: cuts.json,
            passes_pv: cuts.pv,
            passes_met_cleaning: cuts.met_cleaning,
            passes_lepton: cuts.lepton,
            passes_ht: cuts.ht,
            passes_met: cuts.met,
            passes_num_jets: cuts.num_jets,
            passes_b_tagging: cuts.b_tagging,
            passes_baseline: cuts.baseline(),

            highest_jet_pt: jet_pt(1),
            second_highest_jet_pt: jet_pt(2),
            third_highest_jet_pt: jet_pt(3),
            fourth_highest_jet_pt: jet_pt(4),
            fifth_highest_jet_pt: jet_pt(5),

            highest_csv: jet_csv(1),
            second_highest_csv: jet_csv(2),
            third_highest_csv: jet_csv(3),
            fourth_highest_csv: jet_csv(4),
            fifth_highest_csv: jet_csv(5),

            pu_true_num_interactions: narrow_f32(true_interactions),
            num_primary_vertices: narrow_count(sel.num_good_vertices()),

            met_sig: narrow_f32(event.met_significance),
            met: narrow_f32(event.leading_met().map_or(0.0, |m| m.et)),

            num_jets: narrow_count(sel.num_good_jets()),
            num_csvl_jets: narrow_count(sel.num_csv_jets(CSV_LOOSE)),
            num_csvm_jets: narrow_count(sel.num_csv_jets(CSV_MEDIUM)),
            num_csvt_jets: narrow_count(sel.num_csv_jets(CSV_TIGHT)),

            num_veto_electrons: veto_e,
            num_veto_muons: veto_m,
            num_veto_taus: veto_t,
            num_veto_leptons: veto_l,
            num_loose_electrons: loose_e,
            num_loose_muons: loose_m,
            num_loose_taus: loose_t,
            num_loose_leptons: loose_l,
            num_medium_electrons: medium_e,
            num_medium_muons: medium_m,
            num_medium_taus: medium_t,
            num_medium_leptons: medium_l,
            num_tight_electrons: tight_e,
            num_tight_muons: tight_m,
            num_tight_taus: tight_t,
            num_tight_leptons: tight_l,

            num_iso_tracks: narrow_count(sel.num_precomputed_iso_tracks(self.iso_track_pt)),

            mt2_w_mass: narrow_f32(kin.mt2(self.mt2.as_ref(), self.w_mass)),
            mt2_massless: narrow_f32(kin.mt2(self.mt2.as_ref(), 0.0)),
            mt: narrow_f32(kin.mt()),
            delta_phi_met_lepton: narrow_f32(kin.delta_phi_met_lepton()),
            delta_phi_w_lepton: narrow_f32(kin.delta_phi_w_lepton()),

            ht_jets: narrow_f32(kin.ht(false, false)),
            ht_jets_met: narrow_f32(kin.ht(true, false)),
            ht_jets_leps: narrow_f32(kin.ht(false, true)),
            ht_jets_met_leps: narrow_f32(kin.ht(true, true)),

            full_weight: narrow_f32(pu_weight * lumi_weight),
            lumi_weight: narrow_f32(lumi_weight),
            pu_weight: narrow_f32(pu_weight),

            mass1: narrow_mass(mass1),
            mass2: narrow_mass(mass2),

            run: event.run,
            event: event.event,
            lumiblock: event.lumiblock,
        }
    }

    /// Scan every entry of `source`, writing one record per distinct physical event to `sink`.
    ///
    /// Entries the source fails to load are logged and skipped. Repeated events are skipped
    /// without further work.
    pub fn run(
        &self,
        source: &mut dyn EventSource,
        sink: &mut dyn RecordSink,
    ) -> Result<ScanSummary> {
        let sample = source.sample().clone();
        let total = source.total_entries();
        if total == 0 {
            tracing::warn!(sample = sample.name(), "input contains no entries");
        }
        self.good_runs.check_sample(&sample);

        let base_weight = self.weights.weight(sample.name());
        tracing::info!(
            sample = sample.name(),
            entries = total,
            format_version = sample.format_version(),
            real_data = sample.is_real_data(),
            base_weight,
            "starting scan"
        );

        let mut event = CurrentEvent::default();
        let mut beta = BetaCache::new(self.beta_variant);
        let mut dedup = EventDeduplicator::new();
        let mut summary = ScanSummary { entries: total, ..Default::default() };
        let progress = Progress::start(total, self.progress_interval);

        for entry in 0..total {
            progress.report(entry);
            beta.invalidate();
            if let Err(err) = source.load(entry, &mut event) {
                tracing::warn!(entry, error = %err, "failed to load entry; skipping");
                summary.failed += 1;
                continue;
            }
            if !dedup.observe(event.key()) {
                continue;
            }
            let record = self.reduce_event(&event, &sample, &beta, base_weight);
            sink.write(&record)?;
            summary.written += 1;
        }

        sink.finish(&meta_info(&sample, total, Utc::now()))?;
        tracing::info!(
            entries = summary.entries,
            written = summary.written,
            failed = summary.failed,
            elapsed_s = progress.elapsed().as_secs_f64(),
            "scan finished"
        );
        Ok(summary)
    }
}

/// Provenance record for a finished scan.
pub fn meta_info(sample: &SampleInfo, entries: usize, now: DateTime<Utc>) -> MetaInfo {
    let narrow_u8 = |v: u32| u8::try_from(v).unwrap_or(u8::MAX);
    MetaInfo {
        original_file_name: sample.name().to_string(),
        original_file_entries: u32::try_from(entries).unwrap_or(u32::MAX),
        reduced_tree_version: REDUCED_TREE_VERSION,
        utc_creation_year: u16::try_from(now.year()).unwrap_or(0),
        utc_creation_month: narrow_u8(now.month()),
        utc_creation_day: narrow_u8(now.day()),
        utc_creation_hour: narrow_u8(now.hour()),
        utc_creation_minute: narrow_u8(now.minute()),
        utc_creation_second: narrow_u8(now.second()),
        utc_creation_isdst: 0,
    }
}

/// Periodic progress lines with a remaining-time estimate.
struct Progress {
    total: usize,
    interval: usize,
    started: Instant,
}

impl Progress {
    fn start(total: usize, interval: usize) -> Self {
        Self { total, interval, started: Instant::now() }
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn report(&self, entry: usize) {
        if self.interval == 0 || entry == 0 || entry % self.interval != 0 {
            return;
        }
        let elapsed = self.elapsed().as_secs_f64();
        let remaining = elapsed / entry as f64 * (self.total - entry) as f64;
        tracing::info!(
            entry,
            total = self.total,
            percent = format_args!("{:.1}", 100.0 * entry as f64 / self.total as f64),
            remaining_s = format_args!("{remaining:.0}"),
            "progress"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemorySink, VecSource};
    use crate::testutil::{all_filters, good_jet, loose_muon, with_primary_vertex};
    use crate::weights::{MassPointEntry, SampleEntry, WeightTable};
    use approx::assert_relative_eq;
    use chrono::TimeZone;
    use skim_core::{Met, PileupSummary};

    fn resolver() -> WeightResolver {
        let table = WeightTable {
            samples: vec![SampleEntry {
                name: "TTJets".into(),
                cross_section: 200.0,
                total_events: 1000,
            }],
            mass_points: vec![MassPointEntry {
                model: "T1tttt".into(),
                mass1: 1000,
                mass2: 400,
                cross_section: 0.5,
                total_events: 100,
            }],
        };
        WeightResolver::new(table, 10.0, "SMS")
    }

    fn event(run: u32, evt: u32) -> CurrentEvent {
        let mut jets: Vec<_> = (0..6).map(|i| good_jet(150.0 - 10.0 * i as f64, 0.2)).collect();
        jets[0].csv = 0.95;
        jets[1].csv = 0.92;
        jets[2].csv = 0.7;
        let mut ev = with_primary_vertex(CurrentEvent {
            run,
            event: evt,
            lumiblock: 1,
            jets,
            pf_type1_met: vec![Met { et: 300.0, ex: 300.0, ..Default::default() }],
            raw_met: vec![Met { et: 290.0, ..Default::default() }],
            filters: all_filters(),
            pileup: vec![PileupSummary { bunch_crossing: 0, true_interactions: 20.0 }],
            ..Default::default()
        });
        ev.muons = vec![loose_muon(40.0, 0.0)];
        ev
    }

    #[test]
    fn test_reduce_event_fields() {
        let skimmer = Skimmer::new(resolver());
        let sample = SampleInfo::new("TTJets_v66");
        let ev = event(1, 1);
        let beta = BetaCache::default();
        let r = skimmer.reduce_event(&ev, &sample, &beta, 2.0);

        assert!(r.passes_baseline);
        assert_eq!(r.num_jets, 6);
        assert_eq!(r.num_csvm_jets, 3);
        assert_eq!(r.num_csvt_jets, 2);
        assert_eq!(r.highest_jet_pt, 150.0);
        assert_eq!(r.fifth_highest_jet_pt, 110.0);
        assert_eq!(r.highest_csv, 0.95_f32);
        assert_eq!(r.num_veto_muons, 1);
        assert_eq!(r.num_loose_leptons, 1);
        assert_eq!(r.num_veto_electrons, 0);
        assert_eq!(r.num_iso_tracks, 0);
        assert_eq!(r.met, 300.0);
        assert_eq!(r.pu_true_num_interactions, 20.0);
        assert_eq!(r.num_primary_vertices, 1);
        assert_relative_eq!(r.ht_jets, 750.0);
        assert_relative_eq!(r.ht_jets_met_leps, 1090.0);
        assert_eq!(r.delta_phi_met_lepton, 0.0);
        assert_eq!(r.mass1, -1);
        assert_eq!(r.mass2, -1);
        assert_eq!(r.lumi_weight, 2.0);
        assert_eq!(r.pu_weight, 1.0);
        assert_eq!(r.full_weight, 2.0);
    }

    #[test]
    fn test_reduce_event_mass_point_weight() {
        let skimmer = Skimmer::new(resolver());
        let sample = SampleInfo::new("SMS-T1tttt_Mgluino-350to1200_v66");
        let mut ev = event(1, 1);
        ev.model_params = "T1tttt_1000_400_".into();
        let beta = BetaCache::default();
        let r = skimmer.reduce_event(&ev, &sample, &beta, 7.0);
        assert_eq!((r.mass1, r.mass2), (1000, 400));
        assert_relative_eq!(r.lumi_weight, 0.05);

        ev.model_params = "T1tttt".into();
        let r = skimmer.reduce_event(&ev, &sample, &beta, 7.0);
        assert_eq!((r.mass1, r.mass2), (-1, -1));
        assert_eq!(r.lumi_weight, 1.0);
    }

    #[test]
    fn test_pileup_weight_skipped_for_data() {
        let mut data = vec![0.0; 22];
        data[21] = 1.0;
        let lw = LumiReWeighting::new(&data, &[1.0; 22]).unwrap();
        let skimmer = Skimmer::new(resolver()).with_pileup(Box::new(lw));
        let beta = BetaCache::default();
        let ev = event(1, 1);

        let mc = skimmer.reduce_event(&ev, &SampleInfo::new("TTJets_v66"), &beta, 1.0);
        assert_eq!(mc.pu_weight, 0.0);
        assert_eq!(mc.full_weight, 0.0);

        let data = skimmer.reduce_event(&ev, &SampleInfo::new("MET_Run2012D_v66"), &beta, 1.0);
        assert_eq!(data.pu_weight, 1.0);
    }

    #[test]
    fn test_run_deduplicates_and_preserves_order() {
        let skimmer = Skimmer::new(resolver());
        let mut source = VecSource::new(
            "TTJets_v66",
            vec![event(1, 3), event(1, 1), event(1, 3), event(1, 2), event(1, 1)],
        );
        let mut sink = MemorySink::default();
        let summary = skimmer.run(&mut source, &mut sink).unwrap();

        assert_eq!(summary, ScanSummary { entries: 5, written: 3, failed: 0 });
        let events: Vec<u32> = sink.records.iter().map(|r| r.event).collect();
        assert_eq!(events, vec![3, 1, 2]);
        assert_relative_eq!(sink.records[0].lumi_weight, 2.0);

        let meta = sink.meta.unwrap();
        assert_eq!(meta.original_file_name, "TTJets_v66");
        assert_eq!(meta.original_file_entries, 5);
        assert_eq!(meta.reduced_tree_version, REDUCED_TREE_VERSION);
        assert_eq!(meta.utc_creation_isdst, 0);
    }

    #[test]
    fn test_run_skips_failed_entries() {
        let skimmer = Skimmer::new(resolver());
        let mut source =
            VecSource::new("TTJets_v66", vec![event(1, 1), event(1, 2)]).with_unreadable(0);
        let mut sink = MemorySink::default();
        let summary = skimmer.run(&mut source, &mut sink).unwrap();
        assert_eq!(summary, ScanSummary { entries: 2, written: 1, failed: 1 });
        assert_eq!(sink.records[0].event, 2);
    }

    #[test]
    fn test_run_empty_input() {
        let skimmer = Skimmer::new(resolver());
        let mut source = VecSource::new("TTJets_v66", vec![]);
        let mut sink = MemorySink::default();
        let summary = skimmer.run(&mut source, &mut sink).unwrap();
        assert_eq!(summary.written, 0);
        assert!(sink.meta.is_some());
    }

    #[test]
    fn test_meta_info_timestamp() {
        let now = Utc.with_ymd_and_hms(2013, 11, 14, 9, 30, 5).unwrap();
        let meta = meta_info(&SampleInfo::new("X_v71"), 42, now);
        assert_eq!(meta.utc_creation_year, 2013);
        assert_eq!(meta.utc_creation_month, 11);
        assert_eq!(meta.utc_creation_day, 14);
        assert_eq!(meta.utc_creation_hour, 9);
        assert_eq!(meta.utc_creation_minute, 30);
        assert_eq!(meta.utc_creation_second, 5);
        assert_eq!(meta.original_file_entries, 42);
    }
}
