//! Reduced output record and its provenance metadata.

use serde::{Deserialize, Serialize};

/// Version tag of the reduced-record layout.
pub const REDUCED_TREE_VERSION: u16 = 1;

/// One row of reduced output, emitted once per deduplicated physical event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReducedRecord {
    pub passes_json: bool,
    pub passes_pv: bool,
    pub passes_met_cleaning: bool,
    pub passes_lepton: bool,
    pub passes_ht: bool,
    pub passes_met: bool,
    pub passes_num_jets: bool,
    pub passes_b_tagging: bool,
    pub passes_baseline: bool,

    pub highest_jet_pt: f32,
    pub second_highest_jet_pt: f32,
    pub third_highest_jet_pt: f32,
    pub fourth_highest_jet_pt: f32,
    pub fifth_highest_jet_pt: f32,

    pub highest_csv: f32,
    pub second_highest_csv: f32,
    pub third_highest_csv: f32,
    pub fourth_highest_csv: f32,
    pub fifth_highest_csv: f32,

    pub pu_true_num_interactions: f32,
    pub num_primary_vertices: u8,

    pub met_sig: f32,
    pub met: f32,

    pub num_jets: u8,
    pub num_csvl_jets: u8,
    pub num_csvm_jets: u8,
    pub num_csvt_jets: u8,

    pub num_veto_electrons: u8,
    pub num_veto_muons: u8,
    pub num_veto_taus: u8,
    pub num_veto_leptons: u8,
    pub num_loose_electrons: u8,
    pub num_loose_muons: u8,
    pub num_loose_taus: u8,
    pub num_loose_leptons: u8,
    pub num_medium_electrons: u8,
    pub num_medium_muons: u8,
    pub num_medium_taus: u8,
    pub num_medium_leptons: u8,
    pub num_tight_electrons: u8,
    pub num_tight_muons: u8,
    pub num_tight_taus: u8,
    pub num_tight_leptons: u8,

    pub num_iso_tracks: u8,

    /// MT2 under the W-mass invisible hypothesis.
    pub mt2_w_mass: f32,
    /// MT2 under the massless invisible hypothesis.
    pub mt2_massless: f32,
    pub mt: f32,
    pub delta_phi_met_lepton: f32,
    pub delta_phi_w_lepton: f32,

    pub ht_jets: f32,
    pub ht_jets_met: f32,
    pub ht_jets_leps: f32,
    pub ht_jets_met_leps: f32,

    /// `pu_weight * lumi_weight`.
    pub full_weight: f32,
    pub lumi_weight: f32,
    pub pu_weight: f32,

    pub mass1: i16,
    pub mass2: i16,

    pub run: u32,
    pub event: u32,
    pub lumiblock: u32,
}

/// Single-row provenance record stored alongside the reduced records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaInfo {
    /// Sample identifier the records were derived from.
    pub original_file_name: String,
    /// Number of entries in the input, duplicates included.
    pub original_file_entries: u32,
    /// [`REDUCED_TREE_VERSION`] at creation time.
    pub reduced_tree_version: u16,
    pub utc_creation_year: u16,
    pub utc_creation_month: u8,
    pub utc_creation_day: u8,
    pub utc_creation_hour: u8,
    pub utc_creation_minute: u8,
    pub utc_creation_second: u8,
    /// Daylight-saving flag; always 0 for UTC.
    pub utc_creation_isdst: i32,
}

/// Narrow a derived quantity to the stored `f32` precision, saturating instead of overflowing to
/// infinity so that "undefined" sentinels stay the largest finite value.
#[inline]
pub fn narrow_f32(x: f64) -> f32 {
    if x.is_nan() {
        f32::NAN
    } else {
        x.clamp(f32::MIN as f64, f32::MAX as f64) as f32
    }
}

/// Narrow a count to the stored `u8` width.
#[inline]
pub fn narrow_count(n: usize) -> u8 {
    u8::try_from(n).unwrap_or(u8::MAX)
}

/// Narrow a mass-point value to the stored `i16` width.
#[inline]
pub fn narrow_mass(m: i32) -> i16 {
    m.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}
