//! Per-event data model.
//!
//! [`CurrentEvent`] is the in-place view of one physical collision event. The driver owns a
//! single instance and asks the [`EventSource`](crate::traits::EventSource) to overwrite it on
//! every advance; selection and derivation code only ever borrows it immutably.
//!
//! Upstream ntuples store every object collection as parallel arrays (`jets_pt[i]`,
//! `jets_eta[i]`, ...). Here each collection is a `Vec` of structs, so "index `i` refers to the
//! same physical object in every attribute" holds by construction once the source has assembled
//! the rows.

use serde::{Deserialize, Serialize};

/// Identity of a physical event.
///
/// Overlapping input file sets may contain the same physical event more than once; this triple is
/// what the deduplication set is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct EventKey {
    /// Run number.
    pub run: u32,
    /// Event number within the run.
    pub event: u32,
    /// Luminosity block.
    pub lumiblock: u32,
}

impl EventKey {
    /// Create a new key.
    pub fn new(run: u32, event: u32, lumiblock: u32) -> Self {
        Self { run, event, lumiblock }
    }
}

/// Particle-flow jet (energy corrections already applied upstream).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Jet {
    /// Transverse momentum (GeV).
    pub pt: f64,
    /// Pseudorapidity.
    pub eta: f64,
    /// Azimuth.
    pub phi: f64,
    /// Corrected energy (GeV).
    pub energy: f64,
    /// Factor mapping corrected energy back to raw energy.
    pub corr_factor_raw: f64,
    /// Combined secondary vertex (CSV) b-tag discriminant.
    pub csv: f64,
    /// Jet mass (GeV).
    pub mass: f64,
    /// Momentum x component.
    pub px: f64,
    /// Momentum y component.
    pub py: f64,
    /// Momentum z component.
    pub pz: f64,
    /// Charged constituent multiplicity.
    pub charged_mult: u32,
    /// Neutral constituent multiplicity.
    pub neutral_mult: u32,
    /// Muon constituent multiplicity.
    pub muon_mult: u32,
    /// Charged hadronic energy.
    pub charged_had_energy: f64,
    /// Charged electromagnetic energy.
    pub charged_em_energy: f64,
    /// Neutral hadronic energy.
    pub neutral_had_energy: f64,
    /// Neutral electromagnetic energy.
    pub neutral_em_energy: f64,
    /// Photon energy.
    pub photon_energy: f64,
}

impl Jet {
    /// Uncorrected jet energy.
    #[inline]
    pub fn raw_energy(&self) -> f64 {
        self.energy * self.corr_factor_raw
    }
}

/// Particle-flow electron.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Electron {
    /// Transverse momentum (GeV).
    pub pt: f64,
    /// Pseudorapidity.
    pub eta: f64,
    /// Azimuth.
    pub phi: f64,
    /// Momentum x component.
    pub px: f64,
    /// Momentum y component.
    pub py: f64,
    /// Energy (GeV).
    pub energy: f64,
    /// Supercluster pseudorapidity.
    pub sc_eta: f64,
    /// Electron lies in the ECAL barrel.
    pub is_barrel: bool,
    /// Electron lies in the ECAL endcap.
    pub is_endcap: bool,
    /// Track/supercluster Δη at the vertex.
    pub d_eta_in: f64,
    /// Track/supercluster Δφ at the vertex.
    pub d_phi_in: f64,
    /// Shower shape σ(iη iη).
    pub sigma_ieta_ieta: f64,
    /// Hadronic over electromagnetic energy.
    pub had_over_em: f64,
    /// Transverse impact parameter w.r.t. the nominal origin.
    pub d0: f64,
    /// Track azimuth used to move `d0` to the beam spot.
    pub track_phi: f64,
    /// Track vertex z.
    pub vz: f64,
    /// Charged-hadron isolation in a ΔR < 0.3 cone.
    pub charged_hadron_iso: f64,
    /// Photon isolation in a ΔR < 0.3 cone.
    pub photon_iso: f64,
    /// Neutral-hadron isolation in a ΔR < 0.3 cone.
    pub neutral_hadron_iso: f64,
}

/// Particle-flow muon.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Muon {
    /// Transverse momentum (GeV).
    pub pt: f64,
    /// Pseudorapidity.
    pub eta: f64,
    /// Azimuth.
    pub phi: f64,
    /// Momentum x component.
    pub px: f64,
    /// Momentum y component.
    pub py: f64,
    /// Energy (GeV).
    pub energy: f64,
    /// Global-muon prompt-tight identification flag.
    pub global_prompt_tight: bool,
    /// Number of matched muon stations.
    pub matched_stations: u32,
    /// Track transverse impact parameter w.r.t. the nominal origin.
    pub track_d0: f64,
    /// Track azimuth.
    pub track_phi: f64,
    /// Track vertex z.
    pub track_vz: f64,
    /// Valid pixel hits on the inner track.
    pub valid_pixel_hits: u32,
    /// Tracker layers with a measurement.
    pub tracker_layers: u32,
    /// Charged-hadron pt sum in a ΔR < 0.4 cone.
    pub charged_hadron_iso: f64,
    /// Neutral-hadron et sum in a ΔR < 0.4 cone.
    pub neutral_hadron_iso: f64,
    /// Photon et sum in a ΔR < 0.4 cone.
    pub photon_iso: f64,
    /// Pileup charged pt sum in a ΔR < 0.4 cone.
    pub pileup_iso: f64,
}

/// Hadronically decaying tau candidate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tau {
    /// Transverse momentum (GeV).
    pub pt: f64,
    /// Pseudorapidity.
    pub eta: f64,
    /// Azimuth.
    pub phi: f64,
    /// Momentum x component.
    pub px: f64,
    /// Momentum y component.
    pub py: f64,
    /// Energy (GeV).
    pub energy: f64,
    /// Loose Δβ-corrected isolation discriminant.
    pub loose_iso: f64,
}

/// Reconstructed charged track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    /// Transverse momentum (GeV).
    pub pt: f64,
    /// Pseudorapidity.
    pub eta: f64,
    /// Azimuth.
    pub phi: f64,
    /// Fit χ².
    pub chi2: f64,
    /// Vertex z.
    pub vz: f64,
    /// High-purity quality flag.
    pub high_purity: bool,
}

/// Pre-computed isolated-track candidate (format version 71 and later).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IsoTrack {
    /// Transverse momentum (GeV).
    pub pt: f64,
    /// Pseudorapidity.
    pub eta: f64,
    /// Absolute isolation sum.
    pub iso: f64,
    /// Longitudinal distance to the primary vertex.
    pub dz_pv: f64,
}

/// Reconstructed primary-vertex candidate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vertex {
    /// Position x.
    pub x: f64,
    /// Position y.
    pub y: f64,
    /// Position z.
    pub z: f64,
    /// Number of degrees of freedom of the vertex fit.
    pub ndof: f64,
    /// Fake (beam-spot constrained placeholder) vertex.
    pub is_fake: bool,
}

impl Vertex {
    /// Transverse distance from the origin.
    #[inline]
    pub fn rho(&self) -> f64 {
        self.x.hypot(self.y)
    }
}

/// A point in detector coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    /// x (cm).
    pub x: f64,
    /// y (cm).
    pub y: f64,
    /// z (cm).
    pub z: f64,
}

/// Missing transverse energy.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Met {
    /// Magnitude (GeV).
    pub et: f64,
    /// Azimuth.
    pub phi: f64,
    /// x component.
    pub ex: f64,
    /// y component.
    pub ey: f64,
}

/// One HLT path result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggerResult {
    /// Path name.
    pub name: String,
    /// Whether the path fired.
    pub decision: bool,
    /// Prescale value.
    pub prescale: u32,
}

/// Generator-level particle from the documentation record.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TruthParticle {
    /// PDG id.
    pub id: i32,
    /// Mother PDG id.
    pub mother_id: i32,
    /// Grandmother PDG id.
    pub grandmother_id: i32,
    /// Transverse momentum (GeV).
    pub pt: f64,
}

/// Pileup summary for one bunch crossing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PileupSummary {
    /// Bunch crossing relative to the triggered one.
    pub bunch_crossing: i32,
    /// True (Poisson mean) number of interactions.
    pub true_interactions: f64,
}

/// Detector-quality filter decisions used for MET cleaning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetFilters {
    /// CSC beam-halo filter.
    pub csc_halo: bool,
    /// HBHE noise filter.
    pub hbhe: bool,
    /// HCAL laser filter.
    pub hcal_laser: bool,
    /// ECAL dead-cell trigger-primitive filter.
    pub ecal_tp: bool,
    /// Tracking-failure filter.
    pub tracking_failure: bool,
    /// EE bad-supercrystal filter.
    pub ee_bad_sc: bool,
    /// ECAL laser-correction filter.
    pub ecal_laser: bool,
    /// Greedy-muon filter.
    pub greedy_muon: bool,
    /// Inconsistent PF-muon filter.
    pub inconsistent_pf_muon: bool,
    /// Beam-scraping veto.
    pub scraping_veto: bool,
}

/// The mutable per-iteration view of one physical event.
#[derive(Debug, Clone, Default)]
pub struct CurrentEvent {
    /// Run number.
    pub run: u32,
    /// Event number.
    pub event: u32,
    /// Luminosity block.
    pub lumiblock: u32,
    /// Signal-model parameter string (e.g. `"T1tttt_1000_400_"`), empty for non-signal samples.
    pub model_params: String,

    /// Jets.
    pub jets: Vec<Jet>,
    /// Electrons.
    pub electrons: Vec<Electron>,
    /// Muons.
    pub muons: Vec<Muon>,
    /// Taus.
    pub taus: Vec<Tau>,
    /// Tracks.
    pub tracks: Vec<Track>,
    /// Pre-computed isolated-track candidates.
    pub iso_tracks: Vec<IsoTrack>,
    /// Vertices; index 0 is the leading primary vertex.
    pub vertices: Vec<Vertex>,
    /// Beam-spot position, if recorded.
    pub beam_spot: Option<Position>,

    /// Type-I corrected particle-flow MET; index 0 is the leading entry.
    pub pf_type1_met: Vec<Met>,
    /// Raw calorimeter MET; index 0 is the leading entry.
    pub raw_met: Vec<Met>,
    /// MET significance.
    pub met_significance: f64,
    /// Median energy density used for electron isolation pileup subtraction.
    pub rho: f64,

    /// Trigger results.
    pub triggers: Vec<TriggerResult>,
    /// Generator documentation record.
    pub truth: Vec<TruthParticle>,
    /// Pileup summaries per bunch crossing.
    pub pileup: Vec<PileupSummary>,
    /// Detector-quality filters.
    pub filters: MetFilters,

    /// Flattened pileup-jet discriminant table: each row carries
    /// `(pt, eta, beta, betaStar, betaClassic, betaStarClassic)` in repeating groups of six.
    pub pu_jet_table: Vec<Vec<f32>>,
}

impl CurrentEvent {
    /// Identity of this event.
    pub fn key(&self) -> EventKey {
        EventKey::new(self.run, self.event, self.lumiblock)
    }

    /// Leading type-I PF MET.
    pub fn leading_met(&self) -> Option<&Met> {
        self.pf_type1_met.first()
    }

    /// Leading primary vertex.
    pub fn primary_vertex(&self) -> Option<&Vertex> {
        self.vertices.first()
    }

    /// Reset all collections, keeping their allocations for the next event.
    pub fn clear(&mut self) {
        self.run = 0;
        self.event = 0;
        self.lumiblock = 0;
        self.model_params.clear();
        self.jets.clear();
        self.electrons.clear();
        self.muons.clear();
        self.taus.clear();
        self.tracks.clear();
        self.iso_tracks.clear();
        self.vertices.clear();
        self.beam_spot = None;
        self.pf_type1_met.clear();
        self.raw_met.clear();
        self.met_significance = 0.0;
        self.rho = 0.0;
        self.triggers.clear();
        self.truth.clear();
        self.pileup.clear();
        self.filters = MetFilters::default();
        self.pu_jet_table.clear();
    }
}
