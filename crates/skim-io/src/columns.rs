//! Line layout of the JSONL event format.
//!
//! Every line is one entry. Object collections are stored the way ntuples store them: one
//! parallel array per attribute (`"jets": {"pt": [...], "eta": [...], ...}`). Assembly into row
//! structs checks that the arrays agree; a collection whose stored arrays disagree in length is
//! truncated to the shortest one with a warning; a stored empty array takes part in that check.
//! Attributes that are not stored at all take their default value.

use serde::{Deserialize, Serialize};
use skim_core::{
    CurrentEvent, Electron, IsoTrack, Jet, Met, MetFilters, Muon, PileupSummary, Position, Tau,
    Track, TriggerResult, TruthParticle, Vertex,
};

macro_rules! columnar {
    ($(#[$meta:meta])* $name:ident => $row:ident { $($field:ident: $ty:ty),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(default, deny_unknown_fields)]
        pub struct $name {
            $(
                #[serde(skip_serializing_if = "Option::is_none")]
                pub $field: Option<Vec<$ty>>,
            )*
        }

        impl $name {
            /// Number of rows after truncation to the shortest stored array.
            ///
            /// A stored empty array counts; only attributes missing from the line are ignored.
            fn row_count(&self, collection: &str, entry: usize) -> usize {
                let stored = [$(self.$field.as_ref().map(Vec::len)),*];
                let mut lens = stored.iter().copied().flatten();
                let Some(first) = lens.next() else {
                    return 0;
                };
                let (shortest, longest) =
                    lens.fold((first, first), |(lo, hi), n| (lo.min(n), hi.max(n)));
                if shortest != longest {
                    tracing::warn!(
                        collection,
                        entry,
                        shortest,
                        longest,
                        "parallel arrays differ in length; truncating collection"
                    );
                }
                shortest
            }

            /// Assemble rows into `out`, reusing its allocation.
            pub fn fill(&self, collection: &str, entry: usize, out: &mut Vec<$row>) {
                let n = self.row_count(collection, entry);
                out.clear();
                out.extend((0..n).map(|i| $row {
                    $($field: self
                        .$field
                        .as_ref()
                        .and_then(|v| v.get(i))
                        .cloned()
                        .unwrap_or_default(),)*
                }));
            }

            /// Split rows into parallel arrays; an empty collection stores nothing.
            pub fn from_rows(rows: &[$row]) -> Self {
                if rows.is_empty() {
                    return Self::default();
                }
                Self { $($field: Some(rows.iter().map(|r| r.$field.clone()).collect()),)* }
            }
        }
    };
}

columnar! {
    /// Jet attributes.
    JetColumns => Jet {
        pt: f64,
        eta: f64,
        phi: f64,
        energy: f64,
        corr_factor_raw: f64,
        csv: f64,
        mass: f64,
        px: f64,
        py: f64,
        pz: f64,
        charged_mult: u32,
        neutral_mult: u32,
        muon_mult: u32,
        charged_had_energy: f64,
        charged_em_energy: f64,
        neutral_had_energy: f64,
        neutral_em_energy: f64,
        photon_energy: f64,
    }
}

columnar! {
    /// Electron attributes.
    ElectronColumns => Electron {
        pt: f64,
        eta: f64,
        phi: f64,
        px: f64,
        py: f64,
        energy: f64,
        sc_eta: f64,
        is_barrel: bool,
        is_endcap: bool,
        d_eta_in: f64,
        d_phi_in: f64,
        sigma_ieta_ieta: f64,
        had_over_em: f64,
        d0: f64,
        track_phi: f64,
        vz: f64,
        charged_hadron_iso: f64,
        photon_iso: f64,
        neutral_hadron_iso: f64,
    }
}

columnar! {
    /// Muon attributes.
    MuonColumns => Muon {
        pt: f64,
        eta: f64,
        phi: f64,
        px: f64,
        py: f64,
        energy: f64,
        global_prompt_tight: bool,
        matched_stations: u32,
        track_d0: f64,
        track_phi: f64,
        track_vz: f64,
        valid_pixel_hits: u32,
        tracker_layers: u32,
        charged_hadron_iso: f64,
        neutral_hadron_iso: f64,
        photon_iso: f64,
        pileup_iso: f64,
    }
}

columnar! {
    /// Tau attributes.
    TauColumns => Tau {
        pt: f64,
        eta: f64,
        phi: f64,
        px: f64,
        py: f64,
        energy: f64,
        loose_iso: f64,
    }
}

columnar! {
    /// Track attributes.
    TrackColumns => Track {
        pt: f64,
        eta: f64,
        phi: f64,
        chi2: f64,
        vz: f64,
        high_purity: bool,
    }
}

columnar! {
    /// Pre-computed isolated-track attributes.
    IsoTrackColumns => IsoTrack {
        pt: f64,
        eta: f64,
        iso: f64,
        dz_pv: f64,
    }
}

columnar! {
    /// Vertex attributes.
    VertexColumns => Vertex {
        x: f64,
        y: f64,
        z: f64,
        ndof: f64,
        is_fake: bool,
    }
}

columnar! {
    /// MET attributes.
    MetColumns => Met {
        et: f64,
        phi: f64,
        ex: f64,
        ey: f64,
    }
}

columnar! {
    /// Trigger path results.
    TriggerColumns => TriggerResult {
        name: String,
        decision: bool,
        prescale: u32,
    }
}

columnar! {
    /// Generator record.
    TruthColumns => TruthParticle {
        id: i32,
        mother_id: i32,
        grandmother_id: i32,
        pt: f64,
    }
}

columnar! {
    /// Pileup summaries.
    PileupColumns => PileupSummary {
        bunch_crossing: i32,
        true_interactions: f64,
    }
}

/// Detector-quality filter decisions as stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterFlags {
    pub csc_halo: bool,
    pub hbhe: bool,
    pub hcal_laser: bool,
    pub ecal_tp: bool,
    pub tracking_failure: bool,
    pub ee_bad_sc: bool,
    pub ecal_laser: bool,
    pub greedy_muon: bool,
    pub inconsistent_pf_muon: bool,
    pub scraping_veto: bool,
}

impl From<FilterFlags> for MetFilters {
    fn from(f: FilterFlags) -> Self {
        MetFilters {
            csc_halo: f.csc_halo,
            hbhe: f.hbhe,
            hcal_laser: f.hcal_laser,
            ecal_tp: f.ecal_tp,
            tracking_failure: f.tracking_failure,
            ee_bad_sc: f.ee_bad_sc,
            ecal_laser: f.ecal_laser,
            greedy_muon: f.greedy_muon,
            inconsistent_pf_muon: f.inconsistent_pf_muon,
            scraping_veto: f.scraping_veto,
        }
    }
}

impl From<MetFilters> for FilterFlags {
    fn from(f: MetFilters) -> Self {
        FilterFlags {
            csc_halo: f.csc_halo,
            hbhe: f.hbhe,
            hcal_laser: f.hcal_laser,
            ecal_tp: f.ecal_tp,
            tracking_failure: f.tracking_failure,
            ee_bad_sc: f.ee_bad_sc,
            ecal_laser: f.ecal_laser,
            greedy_muon: f.greedy_muon,
            inconsistent_pf_muon: f.inconsistent_pf_muon,
            scraping_veto: f.scraping_veto,
        }
    }
}

/// One stored entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EntryColumns {
    pub run: u32,
    pub event: u32,
    pub lumiblock: u32,
    pub model_params: String,

    pub jets: JetColumns,
    pub electrons: ElectronColumns,
    pub muons: MuonColumns,
    pub taus: TauColumns,
    pub tracks: TrackColumns,
    pub iso_tracks: IsoTrackColumns,
    pub vertices: VertexColumns,
    /// `[x, y, z]`; absent when the beam spot was not recorded.
    pub beam_spot: Option<[f64; 3]>,

    pub pf_type1_met: MetColumns,
    pub raw_met: MetColumns,
    pub met_significance: f64,
    pub rho: f64,

    pub triggers: TriggerColumns,
    pub truth: TruthColumns,
    pub pileup: PileupColumns,
    pub filters: FilterFlags,

    /// Pileup-jet discriminant rows.
    pub pu_jet_table: Vec<Vec<f32>>,
}

impl EntryColumns {
    /// Overwrite `event` with this entry.
    pub fn fill(&self, entry: usize, event: &mut CurrentEvent) {
        event.run = self.run;
        event.event = self.event;
        event.lumiblock = self.lumiblock;
        event.model_params.clone_from(&self.model_params);

        self.jets.fill("jets", entry, &mut event.jets);
        self.electrons.fill("electrons", entry, &mut event.electrons);
        self.muons.fill("muons", entry, &mut event.muons);
        self.taus.fill("taus", entry, &mut event.taus);
        self.tracks.fill("tracks", entry, &mut event.tracks);
        self.iso_tracks.fill("iso_tracks", entry, &mut event.iso_tracks);
        self.vertices.fill("vertices", entry, &mut event.vertices);
        event.beam_spot = self.beam_spot.map(|[x, y, z]| Position { x, y, z });

        self.pf_type1_met.fill("pf_type1_met", entry, &mut event.pf_type1_met);
        self.raw_met.fill("raw_met", entry, &mut event.raw_met);
        event.met_significance = self.met_significance;
        event.rho = self.rho;

        self.triggers.fill("triggers", entry, &mut event.triggers);
        self.truth.fill("truth", entry, &mut event.truth);
        self.pileup.fill("pileup", entry, &mut event.pileup);
        event.filters = self.filters.into();
        event.pu_jet_table.clone_from(&self.pu_jet_table);
    }

    /// Store an in-memory event.
    pub fn from_event(event: &CurrentEvent) -> Self {
        Self {
            run: event.run,
            event: event.event,
            lumiblock: event.lumiblock,
            model_params: event.model_params.clone(),
            jets: JetColumns::from_rows(&event.jets),
            electrons: ElectronColumns::from_rows(&event.electrons),
            muons: MuonColumns::from_rows(&event.muons),
            taus: TauColumns::from_rows(&event.taus),
            tracks: TrackColumns::from_rows(&event.tracks),
            iso_tracks: IsoTrackColumns::from_rows(&event.iso_tracks),
            vertices: VertexColumns::from_rows(&event.vertices),
            beam_spot: event.beam_spot.map(|p| [p.x, p.y, p.z]),
            pf_type1_met: MetColumns::from_rows(&event.pf_type1_met),
            raw_met: MetColumns::from_rows(&event.raw_met),
            met_significance: event.met_significance,
            rho: event.rho,
            triggers: TriggerColumns::from_rows(&event.triggers),
            truth: TruthColumns::from_rows(&event.truth),
            pileup: PileupColumns::from_rows(&event.pileup),
            filters: event.filters.into(),
            pu_jet_table: event.pu_jet_table.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatched_arrays_truncate() {
        let line = r#"{"run": 1, "jets": {"pt": [50.0, 40.0, 30.0], "eta": [0.1, 0.2]}}"#;
        let cols: EntryColumns = serde_json::from_str(line).unwrap();
        let mut ev = CurrentEvent::default();
        cols.fill(0, &mut ev);
        assert_eq!(ev.jets.len(), 2);
        assert_eq!(ev.jets[1].pt, 40.0);
        assert_eq!(ev.jets[1].eta, 0.2);
        // Unstored attributes default.
        assert_eq!(ev.jets[0].csv, 0.0);
    }

    #[test]
    fn test_stored_empty_array_counts_in_length_check() {
        let line = r#"{"jets": {"pt": [50.0, 40.0], "csv": []}, "muons": {"pt": []}}"#;
        let cols: EntryColumns = serde_json::from_str(line).unwrap();
        assert_eq!(cols.jets.csv.as_deref(), Some(&[][..]));
        assert!(cols.jets.eta.is_none());
        let mut ev = CurrentEvent::default();
        cols.fill(0, &mut ev);
        assert!(ev.jets.is_empty());
        assert!(ev.muons.is_empty());
    }

    #[test]
    fn test_beam_spot_and_filters() {
        let line = r#"{"beam_spot": [0.1, 0.2, 0.3], "filters": {"hbhe": true}}"#;
        let cols: EntryColumns = serde_json::from_str(line).unwrap();
        let mut ev = CurrentEvent::default();
        cols.fill(0, &mut ev);
        assert_eq!(ev.beam_spot, Some(Position { x: 0.1, y: 0.2, z: 0.3 }));
        assert!(ev.filters.hbhe);
        assert!(!ev.filters.csc_halo);

        let empty: EntryColumns = serde_json::from_str("{}").unwrap();
        empty.fill(1, &mut ev);
        assert!(ev.beam_spot.is_none());
        assert!(ev.jets.is_empty());
    }

    #[test]
    fn test_unknown_attribute_rejected() {
        let r: Result<EntryColumns, _> = serde_json::from_str(r#"{"jets": {"ptt": [1.0]}}"#);
        assert!(r.is_err());
    }

    #[test]
    fn test_from_event_keeps_rows() {
        let ev = CurrentEvent {
            run: 7,
            muons: vec![Muon { pt: 12.0, global_prompt_tight: true, ..Default::default() }],
            triggers: vec![TriggerResult {
                name: "HLT_PFHT650_v5".into(),
                decision: true,
                prescale: 1,
            }],
            ..Default::default()
        };
        let cols = EntryColumns::from_event(&ev);
        let mut back = CurrentEvent::default();
        cols.fill(0, &mut back);
        assert_eq!(back.muons, ev.muons);
        assert_eq!(back.triggers, ev.triggers);
        assert_eq!(back.run, 7);
        assert!(cols.jets.pt.is_none());
    }
}
