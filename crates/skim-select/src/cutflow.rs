//! Event-level selection predicates.
//!
//! Each cut is queryable on its own so that per-cut efficiencies can be derived downstream; the
//! baseline selection is their conjunction.

use crate::good_runs::GoodRuns;
use crate::kinematics::{CSV_MEDIUM, Kinematics};
use crate::objects::ObjectSelector;
use crate::working_point::WorkingPoint;

/// Minimum jet-only HT (exclusive).
pub const HT_MIN: f64 = 500.0;
/// Minimum leading type-I MET (exclusive).
pub const MET_MIN: f64 = 250.0;
/// Minimum number of good jets.
pub const NUM_JETS_MIN: usize = 6;
/// Minimum number of medium b-tagged good jets.
pub const NUM_CSVM_JETS_MIN: usize = 2;

/// Outcome of every cut for one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CutFlowResult {
    /// Good-run whitelist.
    pub json: bool,
    /// Primary-vertex quality.
    pub pv: bool,
    /// MET cleaning.
    pub met_cleaning: bool,
    /// Single-lepton selection.
    pub lepton: bool,
    /// HT.
    pub ht: bool,
    /// MET.
    pub met: bool,
    /// Jet multiplicity.
    pub num_jets: bool,
    /// b-tag multiplicity.
    pub b_tagging: bool,
}

impl CutFlowResult {
    /// Conjunction of all cuts.
    pub fn baseline(&self) -> bool {
        self.json
            && self.pv
            && self.met_cleaning
            && self.lepton
            && self.ht
            && self.met
            && self.num_jets
            && self.b_tagging
    }
}

/// Cut-flow evaluator for one event.
#[derive(Debug, Clone, Copy)]
pub struct CutFlow<'a> {
    sel: ObjectSelector<'a>,
    good_runs: &'a GoodRuns,
}

impl<'a> CutFlow<'a> {
    /// Evaluate cuts on a classified event.
    pub fn new(sel: ObjectSelector<'a>, good_runs: &'a GoodRuns) -> Self {
        Self { sel, good_runs }
    }

    /// Event is in the good-run whitelist of its era (always true for simulation).
    pub fn passes_json(&self) -> bool {
        let ev = self.sel.event();
        self.good_runs.passes(self.sel.sample(), ev.run, ev.lumiblock)
    }

    /// Beam spot recorded and the leading vertex is good.
    pub fn passes_pv(&self) -> bool {
        self.sel.event().beam_spot.is_some() && self.sel.is_good_vertex(0)
    }

    /// Particle-based noise rejection score: −3 both neutral-hadron and photon dominated jets,
    /// −2 photon only, −1 neutral-hadron only, +1 clean.
    pub fn pbnr(&self) -> i32 {
        let jets = &self.sel.event().jets;
        let nh_bad = jets.iter().any(|j| j.neutral_had_energy / j.raw_energy() > 0.9);
        let ph_bad = jets.iter().any(|j| j.photon_energy / j.raw_energy() > 0.95);
        match (nh_bad, ph_bad) {
            (true, true) => -3,
            (false, true) => -2,
            (true, false) => -1,
            (false, false) => 1,
        }
    }

    /// Detector-quality flags, with the dataset-keyed HBHE and ECAL-laser exemptions.
    pub fn passes_met_filters(&self) -> bool {
        let sample = self.sel.sample();
        let f = &self.sel.event().filters;
        f.csc_halo
            && (f.hbhe || sample.exempt_from_hbhe_filter())
            && f.hcal_laser
            && f.ecal_tp
            && f.tracking_failure
            && f.ee_bad_sc
            && (f.ecal_laser || sample.exempt_from_ecal_laser_filter())
            && f.greedy_muon
            && f.inconsistent_pf_muon
            && f.scraping_veto
    }

    /// MET cleaning: no problem jet, sane PF/calo MET ratio, quality filters, no bad jet, and a
    /// clean noise score.
    pub fn passes_met_cleaning(&self) -> bool {
        let ev = self.sel.event();
        if self.sel.has_problem_jet() {
            return false;
        }
        match (ev.leading_met(), ev.raw_met.first()) {
            (Some(pf), Some(raw)) if pf.et <= 2.0 * raw.et => {}
            _ => return false,
        }
        self.passes_met_filters() && !self.sel.has_bad_jet() && self.pbnr() >= 1
    }

    /// Exactly one loose electron or muon, exactly one veto electron or muon, and no veto tau.
    pub fn passes_lepton(&self) -> bool {
        let loose = self.sel.num_electrons(WorkingPoint::Loose, true)
            + self.sel.num_muons(WorkingPoint::Loose, true);
        let veto = self.sel.num_electrons(WorkingPoint::Veto, true)
            + self.sel.num_muons(WorkingPoint::Veto, true);
        loose == 1 && veto == 1 && self.sel.num_taus(WorkingPoint::Veto, true) == 0
    }

    /// Jet-only HT above threshold.
    pub fn passes_ht(&self) -> bool {
        Kinematics::new(self.sel).ht(false, false) > HT_MIN
    }

    /// Leading type-I MET above threshold.
    pub fn passes_met(&self) -> bool {
        self.sel.event().leading_met().is_some_and(|m| m.et > MET_MIN)
    }

    /// Enough good jets.
    pub fn passes_num_jets(&self) -> bool {
        self.sel.num_good_jets() >= NUM_JETS_MIN
    }

    /// Enough medium b-tagged good jets.
    pub fn passes_b_tagging(&self) -> bool {
        self.sel.num_csv_jets(CSV_MEDIUM) >= NUM_CSVM_JETS_MIN
    }

    /// Evaluate every cut.
    pub fn evaluate(&self) -> CutFlowResult {
        CutFlowResult {
            json: self.passes_json(),
            pv: self.passes_pv(),
            met_cleaning: self.passes_met_cleaning(),
            lepton: self.passes_lepton(),
            ht: self.passes_ht(),
            met: self.passes_met(),
            num_jets: self.passes_num_jets(),
            b_tagging: self.passes_b_tagging(),
        }
    }
}
