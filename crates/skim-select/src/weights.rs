//! Per-sample normalisation weights.
//!
//! The cross-section / generated-event table is an explicit value loaded once at startup and
//! handed to the resolver by value. Unresolvable lookups never fail the scan: the weight falls
//! back to 1 (unweighted).

use std::path::Path;

use serde::{Deserialize, Serialize};
use skim_core::{Result, SampleInfo, SkimConfig};

/// Normalisation of one inclusive sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SampleEntry {
    /// Sample identifier, or a fragment of it.
    pub name: String,
    /// Cross section (pb).
    pub cross_section: f64,
    /// Number of generated events.
    pub total_events: i64,
}

/// Normalisation of one mass point of a scanned signal model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MassPointEntry {
    /// Model tag contained in the sample identifier (e.g. `"T1tttt"`).
    pub model: String,
    /// First mass parameter.
    pub mass1: i32,
    /// Second mass parameter.
    pub mass2: i32,
    /// Cross section (pb).
    pub cross_section: f64,
    /// Number of generated events at this mass point.
    pub total_events: i64,
}

/// Static cross-section and generated-event table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeightTable {
    /// Inclusive samples.
    #[serde(default)]
    pub samples: Vec<SampleEntry>,
    /// Mass points of scanned signal models.
    #[serde(default)]
    pub mass_points: Vec<MassPointEntry>,
}

impl WeightTable {
    /// Read a table; `.json` is parsed as JSON, anything else as YAML.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase();
        let table: WeightTable = if ext == "json" {
            serde_json::from_slice(&bytes)?
        } else {
            serde_yaml_ng::from_slice(&bytes)?
        };
        tracing::debug!(
            path = %path.display(),
            samples = table.samples.len(),
            mass_points = table.mass_points.len(),
            "loaded weight table"
        );
        Ok(table)
    }

    /// Exact-name entry, else the entry with the longest name contained in `sample`.
    pub fn sample(&self, sample: &str) -> Option<&SampleEntry> {
        self.samples.iter().find(|e| e.name == sample).or_else(|| {
            self.samples
                .iter()
                .filter(|e| !e.name.is_empty() && sample.contains(e.name.as_str()))
                .max_by_key(|e| e.name.len())
        })
    }

    /// Mass-point entry whose model tag is contained in `sample` (longest tag wins).
    pub fn mass_point(&self, sample: &str, mass1: i32, mass2: i32) -> Option<&MassPointEntry> {
        self.mass_points
            .iter()
            .filter(|e| e.mass1 == mass1 && e.mass2 == mass2)
            .filter(|e| !e.model.is_empty() && sample.contains(e.model.as_str()))
            .max_by_key(|e| e.model.len())
    }
}

/// `luminosity · cross_section / total_events`, or 1 when any input is not positive.
pub fn normalization(luminosity: f64, cross_section: f64, total_events: f64) -> f64 {
    if luminosity > 0.0 && cross_section > 0.0 && total_events > 0.0 {
        luminosity * cross_section / total_events
    } else {
        1.0
    }
}

/// Parse the mass-point pair from a model-parameter string such as `"T1tttt_1000_400_"`.
///
/// Tokens are the underscore-terminated fields; the first two integer tokens are the masses.
/// Either mass is −1 when not found.
pub fn parse_mass_points(model_params: &str) -> (i32, i32) {
    let mut fields: Vec<&str> = model_params.split('_').collect();
    // The text after the last underscore is not terminated.
    fields.pop();
    let mut masses = fields.into_iter().filter_map(|f| f.trim().parse::<i32>().ok());
    let m1 = masses.next().unwrap_or(-1);
    let m2 = masses.next().unwrap_or(-1);
    (m1, m2)
}

/// Resolves the normalisation weight of a sample or mass point.
#[derive(Debug, Clone)]
pub struct WeightResolver {
    table: WeightTable,
    luminosity: f64,
    mass_point_prefix: String,
}

impl WeightResolver {
    /// Create a resolver.
    pub fn new(table: WeightTable, luminosity: f64, mass_point_prefix: impl Into<String>) -> Self {
        Self { table, luminosity, mass_point_prefix: mass_point_prefix.into() }
    }

    /// Load the configured table (an empty one when none is configured).
    pub fn from_config(cfg: &SkimConfig) -> Result<Self> {
        let table = match &cfg.weight_table {
            Some(path) => WeightTable::from_path(path)?,
            None => {
                tracing::info!("no weight table configured; all samples are unweighted");
                WeightTable::default()
            }
        };
        Ok(Self::new(table, cfg.luminosity, cfg.mass_point_prefix.clone()))
    }

    /// Integrated luminosity.
    pub fn luminosity(&self) -> f64 {
        self.luminosity
    }

    /// The table.
    pub fn table(&self) -> &WeightTable {
        &self.table
    }

    /// Whether the sample is normalised per mass point.
    pub fn is_mass_point_sample(&self, sample: &SampleInfo) -> bool {
        sample.is_mass_point_signal(&self.mass_point_prefix)
    }

    /// Cross section of a sample.
    pub fn cross_section(&self, sample: &str) -> Option<f64> {
        self.table.sample(sample).map(|e| e.cross_section)
    }

    /// Generated events of a sample.
    pub fn total_events(&self, sample: &str) -> Option<i64> {
        self.table.sample(sample).map(|e| e.total_events)
    }

    /// Cross section of a mass point.
    pub fn mass_point_cross_section(&self, sample: &str, mass1: i32, mass2: i32) -> Option<f64> {
        self.table.mass_point(sample, mass1, mass2).map(|e| e.cross_section)
    }

    /// Generated events of a mass point.
    pub fn mass_point_total_events(&self, sample: &str, mass1: i32, mass2: i32) -> Option<i64> {
        self.table.mass_point(sample, mass1, mass2).map(|e| e.total_events)
    }

    /// Sample weight; 1 when the lookup fails or an input is not positive.
    pub fn weight(&self, sample: &str) -> f64 {
        match self.table.sample(sample) {
            Some(e) => normalization(self.luminosity, e.cross_section, e.total_events as f64),
            None => {
                tracing::debug!(sample, "sample not in weight table; using weight 1");
                1.0
            }
        }
    }

    /// Mass-point weight; 1 when the lookup fails or an input is not positive.
    pub fn mass_point_weight(&self, sample: &str, mass1: i32, mass2: i32) -> f64 {
        self.table.mass_point(sample, mass1, mass2).map_or(1.0, |e| {
            normalization(self.luminosity, e.cross_section, e.total_events as f64)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn table() -> WeightTable {
        serde_yaml_ng::from_str(
            r#"
samples:
  - { name: TTJets_FullLeptMGDecays, cross_section: 24.56, total_events: 12119013 }
  - { name: TTJets, cross_section: 234.0, total_events: 6923750 }
  - { name: ZeroXsec, cross_section: 0.0, total_events: 100 }
mass_points:
  - { model: T1tttt, mass1: 1000, mass2: 400, cross_section: 0.0244, total_events: 50000 }
  - { model: T1tttt, mass1: 1100, mass2: 400, cross_section: 0.0129, total_events: 0 }
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_sample_lookup_exact_then_longest_fragment() {
        let t = table();
        assert_eq!(t.sample("TTJets").unwrap().cross_section, 234.0);
        assert_eq!(
            t.sample("TTJets_FullLeptMGDecays_8TeV-madgraph_v71").unwrap().cross_section,
            24.56
        );
        assert_eq!(t.sample("TTJets_SemiLept_v71").unwrap().cross_section, 234.0);
        assert!(t.sample("WJets_v71").is_none());
    }

    #[test]
    fn test_weight_and_fallbacks() {
        let r = WeightResolver::new(table(), 19399.0, "SMS");
        assert_relative_eq!(r.weight("TTJets_v71"), 19399.0 * 234.0 / 6923750.0);
        assert_eq!(r.weight("ZeroXsec_v71"), 1.0);
        assert_eq!(r.weight("Unknown_v71"), 1.0);
        assert_eq!(r.total_events("TTJets_v71"), Some(6923750));

        let no_lumi = WeightResolver::new(table(), 0.0, "SMS");
        assert_eq!(no_lumi.weight("TTJets_v71"), 1.0);
    }

    #[test]
    fn test_mass_point_weight() {
        let r = WeightResolver::new(table(), 19399.0, "SMS");
        let s = "SMS-T1tttt_Mgluino-350to1200_v71";
        assert_relative_eq!(r.mass_point_weight(s, 1000, 400), 19399.0 * 0.0244 / 50000.0);
        assert_eq!(r.mass_point_weight(s, 1100, 400), 1.0);
        assert_eq!(r.mass_point_weight(s, -1, -1), 1.0);
        assert_eq!(r.mass_point_cross_section(s, 1000, 400), Some(0.0244));
        assert!(r.is_mass_point_sample(&SampleInfo::new(s)));
        assert!(!r.is_mass_point_sample(&SampleInfo::new("TTJets_v71")));
    }

    #[test]
    fn test_normalization() {
        assert_relative_eq!(normalization(10.0, 2.0, 4.0), 5.0);
        assert_eq!(normalization(-1.0, 2.0, 4.0), 1.0);
        assert_eq!(normalization(10.0, 2.0, 0.0), 1.0);
        assert_eq!(normalization(f64::NAN, 2.0, 4.0), 1.0);
    }

    #[test]
    fn test_parse_mass_points() {
        assert_eq!(parse_mass_points("T1tttt_1000_400_"), (1000, 400));
        assert_eq!(parse_mass_points("T1tttt_1000_400"), (1000, -1));
        assert_eq!(parse_mass_points("T1tttt_1000_"), (1000, -1));
        assert_eq!(parse_mass_points("T1tttt"), (-1, -1));
        assert_eq!(parse_mass_points(""), (-1, -1));
        assert_eq!(parse_mass_points("model_x_350_y_50_"), (350, 50));
    }

    #[test]
    fn test_table_from_json_file() {
        let dir = std::env::temp_dir().join(format!("skim_weights_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("xsec.json");
        std::fs::write(&path, serde_json::to_vec(&table()).unwrap()).unwrap();
        let back = WeightTable::from_path(&path).unwrap();
        assert_eq!(back, table());
        std::fs::remove_dir_all(&dir).ok();
    }
}
