//! Lepton working points and their threshold tables.
//!
//! Each working point owns a lookup table of identification thresholds split by ECAL detector
//! region, instead of a branch per call site. Electron thresholds follow the 2012 EGamma
//! cut-based identification (without the 1/E − 1/p and conversion-rejection requirements).

/// Strictness tier of a lepton identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum WorkingPoint {
    /// Loosest tier, used to veto additional leptons.
    #[default]
    Veto,
    /// Loose.
    Loose,
    /// Medium.
    Medium,
    /// Tight.
    Tight,
}

impl WorkingPoint {
    /// All tiers from loosest to tightest.
    pub const ALL: [WorkingPoint; 4] =
        [WorkingPoint::Veto, WorkingPoint::Loose, WorkingPoint::Medium, WorkingPoint::Tight];

    /// Map an integer level to a tier. Unknown levels resolve to [`WorkingPoint::Veto`].
    pub fn from_level(level: u8) -> Self {
        match level {
            1 => WorkingPoint::Loose,
            2 => WorkingPoint::Medium,
            3 => WorkingPoint::Tight,
            _ => WorkingPoint::Veto,
        }
    }

    /// Lowercase tier name as used in output field names.
    pub fn name(self) -> &'static str {
        match self {
            WorkingPoint::Veto => "veto",
            WorkingPoint::Loose => "loose",
            WorkingPoint::Medium => "medium",
            WorkingPoint::Tight => "tight",
        }
    }

    /// Muon pt threshold: only the veto tier is softer.
    pub fn muon_pt_min(self) -> f64 {
        match self {
            WorkingPoint::Veto => 10.0,
            _ => 20.0,
        }
    }

    /// Tau pt threshold: only the veto tier is softer.
    pub fn tau_pt_min(self) -> f64 {
        match self {
            WorkingPoint::Veto => 20.0,
            _ => 30.0,
        }
    }
}

/// ECAL region an electron was reconstructed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorRegion {
    /// Barrel.
    Barrel,
    /// Endcap.
    Endcap,
    /// Neither flag set (gap or malformed input).
    Unassigned,
}

impl DetectorRegion {
    /// Region from the reconstruction flags; barrel takes precedence.
    pub fn from_flags(is_barrel: bool, is_endcap: bool) -> Self {
        if is_barrel {
            DetectorRegion::Barrel
        } else if is_endcap {
            DetectorRegion::Endcap
        } else {
            DetectorRegion::Unassigned
        }
    }
}

/// Electron identification thresholds for one tier and region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElectronCuts {
    /// Minimum pt.
    pub pt_min: f64,
    /// Maximum |Δη_in|.
    pub d_eta_in: f64,
    /// Maximum |Δφ_in|.
    pub d_phi_in: f64,
    /// Maximum σ(iη iη).
    pub sigma_ieta_ieta: f64,
    /// Maximum H/E.
    pub had_over_em: f64,
    /// Maximum |d0| w.r.t. the beam spot (exclusive).
    pub d0: f64,
    /// Maximum |dz| w.r.t. the primary vertex (exclusive).
    pub dz: f64,
    /// Maximum relative isolation (exclusive).
    pub rel_iso: f64,
}

/// Region-dependent part of a tier (pt and the endcap low-pt isolation are applied separately).
#[derive(Debug, Clone, Copy)]
struct RegionCuts {
    d_eta_in: f64,
    d_phi_in: f64,
    sigma_ieta_ieta: f64,
    had_over_em: f64,
    d0: f64,
    dz: f64,
    rel_iso: f64,
    /// Isolation for endcap electrons with pt ≤ 20 GeV.
    rel_iso_low_pt: f64,
}

const fn region(
    d_eta_in: f64,
    d_phi_in: f64,
    sigma_ieta_ieta: f64,
    had_over_em: f64,
    d0: f64,
    dz: f64,
    rel_iso: f64,
    rel_iso_low_pt: f64,
) -> RegionCuts {
    RegionCuts { d_eta_in, d_phi_in, sigma_ieta_ieta, had_over_em, d0, dz, rel_iso, rel_iso_low_pt }
}

/// `(pt_min, barrel, endcap)` per tier, indexed by [`WorkingPoint`] order.
const ELECTRON_TABLE: [(f64, RegionCuts, RegionCuts); 4] = [
    // veto
    (
        10.0,
        region(0.007, 0.8, 0.01, 0.15, 0.04, 0.2, 0.15, 0.15),
        region(0.01, 0.7, 0.03, f64::MAX, 0.04, 0.2, 0.15, 0.15),
    ),
    // loose
    (
        20.0,
        region(0.007, 0.15, 0.01, 0.12, 0.02, 0.2, 0.15, 0.15),
        region(0.009, 0.10, 0.03, 0.1, 0.02, 0.2, 0.15, 0.10),
    ),
    // medium
    (
        20.0,
        region(0.004, 0.06, 0.01, 0.12, 0.02, 0.1, 0.15, 0.15),
        region(0.007, 0.03, 0.03, 0.1, 0.02, 0.1, 0.15, 0.10),
    ),
    // tight
    (
        20.0,
        region(0.004, 0.03, 0.01, 0.12, 0.02, 0.1, 0.10, 0.10),
        region(0.005, 0.02, 0.03, 0.1, 0.02, 0.1, 0.10, 0.07),
    ),
];

/// Thresholds applied to electrons with neither region flag: the veto barrel values.
const UNASSIGNED_REGION: RegionCuts = ELECTRON_TABLE[0].1;

impl ElectronCuts {
    /// Look up the thresholds for a tier, region and electron pt.
    pub fn lookup(wp: WorkingPoint, region: DetectorRegion, pt: f64) -> Self {
        let (pt_min, barrel, endcap) = ELECTRON_TABLE[wp as usize];
        let cuts = match region {
            DetectorRegion::Barrel => barrel,
            DetectorRegion::Endcap => endcap,
            DetectorRegion::Unassigned => UNASSIGNED_REGION,
        };
        let rel_iso = if region == DetectorRegion::Endcap && pt <= 20.0 {
            cuts.rel_iso_low_pt
        } else {
            cuts.rel_iso
        };
        ElectronCuts {
            pt_min,
            d_eta_in: cuts.d_eta_in,
            d_phi_in: cuts.d_phi_in,
            sigma_ieta_ieta: cuts.sigma_ieta_ieta,
            had_over_em: cuts.had_over_em,
            d0: cuts.d0,
            dz: cuts.dz,
            rel_iso,
        }
    }
}

/// Neutral-isolation effective area from the supercluster |η| (ΔR = 0.3 cone).
pub fn electron_effective_area(sc_eta: f64) -> f64 {
    const AREAS: [(f64, f64); 6] =
        [(1.0, 0.13), (1.479, 0.14), (2.0, 0.07), (2.2, 0.09), (2.3, 0.11), (2.4, 0.11)];
    let abs_eta = sc_eta.abs();
    if abs_eta.is_nan() {
        return 0.10;
    }
    AREAS.iter().find(|(upper, _)| abs_eta < *upper).map_or(0.14, |(_, area)| *area)
}
