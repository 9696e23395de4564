//! Physics-object identification.
//!
//! [`ObjectSelector`] borrows the current event, the sample identity and the beta cache, and
//! classifies individual jets, leptons, tracks and vertices against the tiered working points.
//! Out-of-range indices classify as "not selected" rather than panicking.

use skim_core::sample::ISO_TRACK_MIN_FORMAT_VERSION;
use skim_core::{CurrentEvent, Electron, Jet, Muon, SampleInfo, Tau, Track, Vertex};

use crate::beta::BetaCache;
use crate::math::delta_r;
use crate::working_point::{DetectorRegion, ElectronCuts, WorkingPoint, electron_effective_area};

/// Jets whose beta falls below this are considered pileup.
pub const BETA_MIN: f64 = 0.2;

/// Kinematic and identification requirements for a jet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JetSelection {
    /// Require the loose particle-flow jet ID.
    pub require_id: bool,
    /// Minimum pt (inclusive).
    pub pt_min: f64,
    /// Maximum |eta| (inclusive).
    pub eta_max: f64,
    /// Apply the pileup-beta requirement.
    pub use_beta: bool,
}

impl Default for JetSelection {
    /// The analysis "good jet": ID, pt ≥ 20, |eta| ≤ 2.4, beta cut.
    fn default() -> Self {
        Self { require_id: true, pt_min: 20.0, eta_max: 2.4, use_beta: true }
    }
}

impl JetSelection {
    /// Wide selection used for the MET-jet angular separation: no ID, |eta| ≤ 5, no beta.
    pub const WIDE: JetSelection =
        JetSelection { require_id: false, pt_min: 20.0, eta_max: 5.0, use_beta: false };

    /// Kinematics of the bad-jet filter: pt ≥ 30, any eta, with or without ID.
    pub fn bad_jet_probe(require_id: bool) -> Self {
        Self { require_id, pt_min: 30.0, eta_max: f64::MAX, use_beta: true }
    }
}

/// Loose particle-flow jet ID, evaluated against the uncorrected energy.
///
/// For |eta| ≥ 2.4 only the neutral fractions and the constituent count are checked.
pub fn jet_passes_loose_id(jet: &Jet) -> bool {
    let raw = jet.raw_energy();
    if raw.is_nan() || raw <= 0.0 {
        return false;
    }
    let constituents =
        u64::from(jet.muon_mult) + u64::from(jet.neutral_mult) + u64::from(jet.charged_mult);
    if jet.neutral_had_energy / raw > 0.99
        || jet.neutral_em_energy / raw > 0.99
        || constituents < 2
    {
        return false;
    }
    if jet.eta.abs() >= 2.4 {
        return true;
    }
    jet.charged_had_energy / raw > 0.0 && jet.charged_em_energy / raw < 0.99 && jet.charged_mult > 0
}

/// High-pt central jet with a large charged-minus-neutral multiplicity.
pub fn is_problem_jet(jet: &Jet) -> bool {
    let abs_eta = jet.eta.abs();
    jet.pt > 50.0
        && abs_eta > 0.9
        && abs_eta < 1.9
        && i64::from(jet.charged_mult) - i64::from(jet.neutral_mult) >= 40
}

/// Classifier over the objects of one event.
#[derive(Debug, Clone, Copy)]
pub struct ObjectSelector<'a> {
    event: &'a CurrentEvent,
    sample: &'a SampleInfo,
    beta: &'a BetaCache,
}

impl<'a> ObjectSelector<'a> {
    /// Borrow an event for classification.
    pub fn new(event: &'a CurrentEvent, sample: &'a SampleInfo, beta: &'a BetaCache) -> Self {
        Self { event, sample, beta }
    }

    /// The event being classified.
    pub fn event(&self) -> &'a CurrentEvent {
        self.event
    }

    /// The sample the event belongs to.
    pub fn sample(&self) -> &'a SampleInfo {
        self.sample
    }

    // ---------------------------------------------------------------------------------------
    // Jets
    // ---------------------------------------------------------------------------------------

    /// Whether jet `index` passes `sel`.
    ///
    /// Legacy formats and the TChiHH signal samples never get the beta requirement. A jet with
    /// no matching discriminant row fails the beta requirement.
    pub fn is_good_jet(&self, index: usize, sel: &JetSelection) -> bool {
        let Some(jet) = self.event.jets.get(index) else {
            return false;
        };
        if jet.pt < sel.pt_min || jet.eta.abs() > sel.eta_max {
            return false;
        }
        if sel.require_id && !jet_passes_loose_id(jet) {
            return false;
        }
        if self.sample.skips_beta_cut() {
            return true;
        }
        if sel.use_beta {
            return self.beta.get(self.event, self.sample, index).is_some_and(|b| b >= BETA_MIN);
        }
        true
    }

    /// Jets passing the default selection, in input order.
    pub fn good_jets(&self) -> impl Iterator<Item = &'a Jet> {
        let this = *self;
        let sel = JetSelection::default();
        self.event
            .jets
            .iter()
            .enumerate()
            .filter(move |(i, _)| this.is_good_jet(*i, &sel))
            .map(|(_, jet)| jet)
    }

    /// Number of jets passing the default selection.
    pub fn num_good_jets(&self) -> usize {
        self.good_jets().count()
    }

    /// Good jets with CSV strictly above `threshold`.
    pub fn num_csv_jets(&self, threshold: f64) -> usize {
        self.good_jets().filter(|j| j.csv > threshold).count()
    }

    /// Any jet in the event is a problem jet.
    pub fn has_problem_jet(&self) -> bool {
        self.event.jets.iter().any(is_problem_jet)
    }

    /// A jet that passes the pt-30 kinematics without ID but fails them with ID.
    pub fn has_bad_jet(&self) -> bool {
        let loose = JetSelection::bad_jet_probe(false);
        let with_id = JetSelection::bad_jet_probe(true);
        (0..self.event.jets.len())
            .any(|i| self.is_good_jet(i, &loose) && !self.is_good_jet(i, &with_id))
    }

    // ---------------------------------------------------------------------------------------
    // Leptons
    // ---------------------------------------------------------------------------------------

    /// Transverse impact parameter corrected to the beam spot; `None` without a beam spot.
    fn beam_spot_d0(&self, d0: f64, track_phi: f64) -> Option<f64> {
        let bs = self.event.beam_spot?;
        Some(d0 - bs.x * track_phi.sin() + bs.y * track_phi.cos())
    }

    fn dz_to_primary_vertex(&self, vz: f64) -> Option<f64> {
        self.event.primary_vertex().map(|pv| (vz - pv.z).abs())
    }

    /// Pileup-corrected relative isolation of electron `index` (ΔR 0.3 cone).
    pub fn electron_rel_iso(&self, index: usize) -> f64 {
        self.event.electrons.get(index).map_or(f64::MAX, |el| electron_rel_iso(el, self.event.rho))
    }

    /// Whether electron `index` passes working point `wp`.
    pub fn is_electron(&self, index: usize, wp: WorkingPoint, use_iso: bool) -> bool {
        let Some(el) = self.event.electrons.get(index) else {
            return false;
        };
        let region = DetectorRegion::from_flags(el.is_barrel, el.is_endcap);
        let cuts = ElectronCuts::lookup(wp, region, el.pt);

        if el.sc_eta.abs() >= 2.5 || el.pt < cuts.pt_min {
            return false;
        }
        if el.d_eta_in.abs() > cuts.d_eta_in
            || el.d_phi_in.abs() > cuts.d_phi_in
            || el.sigma_ieta_ieta > cuts.sigma_ieta_ieta
            || el.had_over_em > cuts.had_over_em
        {
            return false;
        }
        let Some(d0) = self.beam_spot_d0(el.d0, el.track_phi) else {
            return false;
        };
        let Some(dz) = self.dz_to_primary_vertex(el.vz) else {
            return false;
        };
        if d0.abs() >= cuts.d0 || dz >= cuts.dz {
            return false;
        }
        !(use_iso && electron_rel_iso(el, self.event.rho) >= cuts.rel_iso)
    }

    /// Whether muon `index` passes working point `wp`; only the pt threshold is tiered.
    pub fn is_muon(&self, index: usize, wp: WorkingPoint, use_iso: bool) -> bool {
        let Some(mu) = self.event.muons.get(index) else {
            return false;
        };
        if mu.eta.abs() >= 2.4 || mu.pt < wp.muon_pt_min() {
            return false;
        }
        if !mu.global_prompt_tight || mu.matched_stations <= 1 {
            return false;
        }
        let Some(d0) = self.beam_spot_d0(mu.track_d0, mu.track_phi) else {
            return false;
        };
        let Some(dz) = self.dz_to_primary_vertex(mu.track_vz) else {
            return false;
        };
        if d0.abs() >= 0.2 || dz >= 0.5 {
            return false;
        }
        if mu.valid_pixel_hits == 0 || mu.tracker_layers <= 5 {
            return false;
        }
        !(use_iso && muon_rel_iso(mu) > 0.2)
    }

    /// Whether tau `index` passes working point `wp`.
    pub fn is_tau(&self, index: usize, wp: WorkingPoint, require_iso: bool) -> bool {
        self.event.taus.get(index).is_some_and(|tau| tau_passes(tau, wp, require_iso))
    }

    /// Number of electrons passing `wp`.
    pub fn num_electrons(&self, wp: WorkingPoint, use_iso: bool) -> usize {
        (0..self.event.electrons.len()).filter(|&i| self.is_electron(i, wp, use_iso)).count()
    }

    /// Number of muons passing `wp`.
    pub fn num_muons(&self, wp: WorkingPoint, use_iso: bool) -> usize {
        (0..self.event.muons.len()).filter(|&i| self.is_muon(i, wp, use_iso)).count()
    }

    /// Number of taus passing `wp`.
    pub fn num_taus(&self, wp: WorkingPoint, require_iso: bool) -> usize {
        self.event.taus.iter().filter(|t| tau_passes(t, wp, require_iso)).count()
    }

    // ---------------------------------------------------------------------------------------
    // Tracks and vertices
    // ---------------------------------------------------------------------------------------

    /// Central, high-purity track.
    pub fn is_quality_track(&self, index: usize) -> bool {
        self.event.tracks.get(index).is_some_and(track_is_quality)
    }

    /// Isolated quality track from the primary vertex with pt ≥ `pt_min`.
    pub fn is_iso_track(&self, index: usize, pt_min: f64) -> bool {
        let Some(track) = self.event.tracks.get(index) else {
            return false;
        };
        let Some(pv) = self.event.primary_vertex() else {
            return false;
        };
        let near_pv = |t: &Track| (t.vz - pv.z).abs() < 0.05;
        if !track_is_quality(track) || !near_pv(track) || track.pt < pt_min {
            return false;
        }
        let iso_sum: f64 = self
            .event
            .tracks
            .iter()
            .enumerate()
            .filter(|&(j, other)| {
                j != index
                    && track_is_quality(other)
                    && delta_r(track.phi, track.eta, other.phi, other.eta) < 0.3
                    && near_pv(other)
            })
            .map(|(_, other)| other.pt)
            .sum();
        iso_sum / track.pt < 0.05
    }

    /// Number of isolated tracks built from the full track collection.
    pub fn num_iso_tracks(&self, pt_min: f64) -> usize {
        (0..self.event.tracks.len()).filter(|&i| self.is_iso_track(i, pt_min)).count()
    }

    /// Number of isolated tracks from the pre-computed collection; 0 for formats that lack it.
    pub fn num_precomputed_iso_tracks(&self, pt_min: f64) -> usize {
        if self.sample.format_version() < ISO_TRACK_MIN_FORMAT_VERSION {
            return 0;
        }
        self.event
            .iso_tracks
            .iter()
            .filter(|t| {
                t.pt >= pt_min && t.iso / t.pt < 0.1 && t.dz_pv.abs() < 0.1 && t.eta.abs() < 2.4
            })
            .count()
    }

    /// Whether vertex `index` is a good primary vertex.
    pub fn is_good_vertex(&self, index: usize) -> bool {
        self.event.vertices.get(index).is_some_and(vertex_is_good)
    }

    /// Number of good primary vertices.
    pub fn num_good_vertices(&self) -> usize {
        self.event.vertices.iter().filter(|v| vertex_is_good(v)).count()
    }

    // ---------------------------------------------------------------------------------------
    // Event-level lookups
    // ---------------------------------------------------------------------------------------

    /// True number of interactions of the triggered bunch crossing; −1 when not recorded.
    pub fn num_true_interactions(&self) -> f64 {
        self.event
            .pileup
            .iter()
            .rev()
            .find(|p| p.bunch_crossing == 0)
            .map_or(-1.0, |p| p.true_interactions)
    }

    /// Any unprescaled trigger whose name contains `name` fired.
    pub fn passes_trigger(&self, name: &str) -> bool {
        self.event.triggers.iter().any(|t| t.name.contains(name) && t.prescale == 1 && t.decision)
    }
}

/// Pileup-corrected relative isolation of an electron.
pub fn electron_rel_iso(el: &Electron, rho: f64) -> f64 {
    let neutral = el.photon_iso + el.neutral_hadron_iso - rho * electron_effective_area(el.sc_eta);
    (el.charged_hadron_iso + neutral.max(0.0)) / el.pt
}

/// Δβ-corrected relative isolation of a muon (ΔR 0.4 cone).
pub fn muon_rel_iso(mu: &Muon) -> f64 {
    let neutral = mu.neutral_hadron_iso + mu.photon_iso - 0.5 * mu.pileup_iso;
    (mu.charged_hadron_iso + neutral.max(0.0)) / mu.pt
}

fn tau_passes(tau: &Tau, wp: WorkingPoint, require_iso: bool) -> bool {
    if tau.pt < wp.tau_pt_min() || tau.eta.abs() >= 2.4 {
        return false;
    }
    !(require_iso && tau.loose_iso <= 0.0)
}

fn track_is_quality(track: &Track) -> bool {
    track.eta.abs() < 2.4 && track.high_purity
}

fn vertex_is_good(v: &Vertex) -> bool {
    v.ndof > 4.0 && v.z.abs() < 24.0 && v.rho() < 2.0 && !v.is_fake
}
