//! Derived event-level kinematic quantities.
//!
//! Every derivation has a saturating default instead of an error: undefined angles are
//! `f64::MAX`, undefined masses and missing order statistics are 0, undefined reweighting
//! factors are 1.

use std::cmp::Ordering;

use skim_core::{Mt2Solver, VisibleParent};

use crate::math::{abs_delta_phi, transverse_mass};
use crate::objects::{JetSelection, ObjectSelector};
use crate::working_point::WorkingPoint;

/// Tight CSV working point.
pub const CSV_TIGHT: f64 = 0.898;
/// Medium CSV working point.
pub const CSV_MEDIUM: f64 = 0.679;
/// Loose CSV working point.
pub const CSV_LOOSE: f64 = 0.244;

/// Top-pt scale factor `exp(a + b·pt)`: `a`.
const TOP_PT_A: f64 = 0.156;
/// Top-pt scale factor `exp(a + b·pt)`: `b`.
const TOP_PT_B: f64 = -0.00137;
/// Top pt above this uses the value at this point.
const TOP_PT_CLIP: f64 = 400.0;

/// The lepton the single-lepton quantities are built from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectedLepton {
    /// Transverse momentum.
    pub pt: f64,
    /// Azimuth.
    pub phi: f64,
    /// Momentum x component.
    pub px: f64,
    /// Momentum y component.
    pub py: f64,
}

/// Count b-tagged jets from CSV scores sorted in descending order.
///
/// The first two ranks must pass tight, the third medium, the fourth loose; from the fourth rank
/// on, counting continues while scores stay above loose.
pub fn btag_cascade(sorted_desc: &[f64]) -> usize {
    let rank_fails = |i: usize, cut: f64| sorted_desc.get(i).is_none_or(|&s| s < cut);
    if rank_fails(0, CSV_TIGHT) {
        0
    } else if rank_fails(1, CSV_TIGHT) {
        1
    } else if rank_fails(2, CSV_MEDIUM) {
        2
    } else if rank_fails(3, CSV_LOOSE) {
        3
    } else {
        3 + sorted_desc[3..].iter().take_while(|&&s| s > CSV_LOOSE).count()
    }
}

/// Bin of a generator parton id: light quarks 2, charm 3, bottom 4, gluon 5, anything else 1.
pub fn parton_id_bin(id: i32) -> u8 {
    match id.unsigned_abs() {
        1..=3 => 2,
        4 => 3,
        5 => 4,
        21 => 5,
        _ => 1,
    }
}

fn descending(a: &f64, b: &f64) -> Ordering {
    b.total_cmp(a)
}

/// Event-level derivations over one classified event.
#[derive(Debug, Clone, Copy)]
pub struct Kinematics<'a> {
    sel: ObjectSelector<'a>,
}

impl<'a> Kinematics<'a> {
    /// Derive from a classified event.
    pub fn new(sel: ObjectSelector<'a>) -> Self {
        Self { sel }
    }

    /// Scalar pt sum of good jets, optionally with the leading MET and the veto-level isolated
    /// electrons, muons and taus.
    pub fn ht(&self, use_met: bool, use_leptons: bool) -> f64 {
        let event = self.sel.event();
        let mut ht: f64 = self.sel.good_jets().map(|j| j.pt).sum();
        if use_met {
            ht += event.leading_met().map_or(0.0, |m| m.et);
        }
        if use_leptons {
            let wp = WorkingPoint::Veto;
            for (i, el) in event.electrons.iter().enumerate() {
                if self.sel.is_electron(i, wp, true) {
                    ht += el.pt;
                }
            }
            for (i, mu) in event.muons.iter().enumerate() {
                if self.sel.is_muon(i, wp, true) {
                    ht += mu.pt;
                }
            }
            for (i, tau) in event.taus.iter().enumerate() {
                if self.sel.is_tau(i, wp, true) {
                    ht += tau.pt;
                }
            }
        }
        ht
    }

    /// Smallest |Δφ| between MET and the `max_jets` hardest wide-selection jets;
    /// `f64::MAX` when there is no such jet or no MET.
    pub fn min_delta_phi_met(&self, max_jets: usize) -> f64 {
        let event = self.sel.event();
        let Some(met) = event.leading_met() else {
            return f64::MAX;
        };
        let mut jets: Vec<(f64, f64)> = event
            .jets
            .iter()
            .enumerate()
            .filter(|(i, _)| self.sel.is_good_jet(*i, &JetSelection::WIDE))
            .map(|(_, j)| (j.pt, j.phi))
            .collect();
        jets.sort_by(|a, b| b.0.total_cmp(&a.0).then(b.1.total_cmp(&a.1)));
        jets.iter()
            .take(max_jets)
            .map(|&(_, phi)| abs_delta_phi(phi, met.phi))
            .fold(f64::MAX, f64::min)
    }

    fn sorted_good_jet_values(&self, value: impl Fn(&skim_core::Jet) -> f64) -> Vec<f64> {
        let mut values: Vec<f64> = self.sel.good_jets().map(value).collect();
        values.sort_by(descending);
        values
    }

    /// b-tag multiplicity from the tight/medium/loose cascade over good jets.
    pub fn num_b_tagged_jets(&self) -> usize {
        btag_cascade(&self.sorted_good_jet_values(|j| j.csv))
    }

    /// `n`-th highest good-jet pt (1-indexed); 0 when there are fewer than `n` good jets.
    pub fn nth_highest_jet_pt(&self, n: usize) -> f64 {
        nth(&self.sorted_good_jet_values(|j| j.pt), n)
    }

    /// `n`-th highest good-jet CSV (1-indexed); 0 when there are fewer than `n` good jets.
    pub fn nth_highest_jet_csv(&self, n: usize) -> f64 {
        nth(&self.sorted_good_jet_values(|j| j.csv), n)
    }

    /// Highest-pt loose isolated electron or muon. Ties keep the first candidate, electrons
    /// before muons.
    pub fn selected_lepton(&self) -> Option<SelectedLepton> {
        let event = self.sel.event();
        let wp = WorkingPoint::Loose;
        let electrons = event
            .electrons
            .iter()
            .enumerate()
            .filter(|(i, _)| self.sel.is_electron(*i, wp, true))
            .map(|(_, e)| SelectedLepton { pt: e.pt, phi: e.phi, px: e.px, py: e.py });
        let muons = event
            .muons
            .iter()
            .enumerate()
            .filter(|(i, _)| self.sel.is_muon(*i, wp, true))
            .map(|(_, m)| SelectedLepton { pt: m.pt, phi: m.phi, px: m.px, py: m.py });
        electrons.chain(muons).fold(None, |best: Option<SelectedLepton>, lep| match best {
            Some(b) if b.pt >= lep.pt => Some(b),
            _ => Some(lep),
        })
    }

    /// Transverse mass of the selected lepton and the leading MET; 0 when either is missing.
    pub fn mt(&self) -> f64 {
        match (self.selected_lepton(), self.sel.event().leading_met()) {
            (Some(lep), Some(met)) => transverse_mass(lep.px, lep.py, met.ex, met.ey),
            _ => 0.0,
        }
    }

    /// |Δφ| between the leading MET and the selected lepton; `f64::MAX` when undefined.
    pub fn delta_phi_met_lepton(&self) -> f64 {
        match (self.selected_lepton(), self.sel.event().leading_met()) {
            (Some(lep), Some(met)) => abs_delta_phi(met.phi, lep.phi),
            _ => f64::MAX,
        }
    }

    /// |Δφ| between the selected lepton and the W candidate (lepton + MET); `f64::MAX` when
    /// undefined.
    pub fn delta_phi_w_lepton(&self) -> f64 {
        match (self.selected_lepton(), self.sel.event().leading_met()) {
            (Some(lep), Some(met)) => {
                let w_phi = (lep.py + met.ey).atan2(lep.px + met.ex);
                abs_delta_phi(lep.py.atan2(lep.px), w_phi)
            }
            _ => f64::MAX,
        }
    }

    /// MT2 of the two hardest good jets with the selected lepton folded into the missing
    /// momentum, for invisible particles of mass `invisible_mass`.
    ///
    /// 0 with fewer than two good jets, no selected lepton, or no MET.
    pub fn mt2(&self, solver: &dyn Mt2Solver, invisible_mass: f64) -> f64 {
        let mut jets: Vec<&skim_core::Jet> = self.sel.good_jets().collect();
        if jets.len() < 2 {
            return 0.0;
        }
        jets.sort_by(|a, b| b.pt.total_cmp(&a.pt));
        let (Some(lep), Some(met)) = (self.selected_lepton(), self.sel.event().leading_met())
        else {
            return 0.0;
        };
        let parent = |j: &skim_core::Jet| VisibleParent { mass: j.mass, px: j.px, py: j.py };
        solver.mt2(
            parent(jets[0]),
            parent(jets[1]),
            (lep.px + met.ex, lep.py + met.ey),
            invisible_mass,
        )
    }

    /// Generator-level top-quark pt; −1 when absent.
    pub fn top_pt(&self) -> f64 {
        self.sel.event().truth.iter().find(|p| p.id == 6).map_or(-1.0, |p| p.pt)
    }

    /// Top-pt reweighting factor for top-pair samples, 1 otherwise.
    ///
    /// Geometric mean of `exp(a + b·pt)` over the top and antitop legs (first truth entry with
    /// id 6 and −6, pt clipped at 400). A missing leg gives 1.
    pub fn top_pt_weight(&self) -> f64 {
        if !self.sel.sample().is_ttbar() {
            return 1.0;
        }
        let truth = &self.sel.event().truth;
        let leg = |id: i32| truth.iter().find(|p| p.id == id).map(|p| p.pt.min(TOP_PT_CLIP));
        match (leg(6), leg(-6)) {
            (Some(t), Some(tbar)) => {
                let sf = |pt: f64| (TOP_PT_A + TOP_PT_B * pt).exp();
                (sf(t) * sf(tbar)).sqrt()
            }
            _ => 1.0,
        }
    }
}

fn nth(sorted_desc: &[f64], n: usize) -> f64 {
    match n {
        0 => 0.0,
        n => sorted_desc.get(n - 1).copied().unwrap_or(0.0),
    }
}
