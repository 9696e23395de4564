//! Run configuration for a skim.
//!
//! Read once at startup from YAML or JSON and passed by reference to the components that need
//! it; nothing here is mutated during a scan.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Good-run certification files, one per real-data era.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GoodRunsConfig {
    /// Whitelist for prompt reconstruction.
    #[serde(default)]
    pub prompt: Option<PathBuf>,
    /// Whitelist for the 24 August re-reconstruction.
    #[serde(default)]
    pub aug24: Option<PathBuf>,
    /// Whitelist for the 13 July re-reconstruction.
    #[serde(default)]
    pub jul13: Option<PathBuf>,
}

/// True-interaction distributions for pileup reweighting.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PileupConfig {
    /// Data distribution, one entry per integer bin starting at 0.
    pub data: Vec<f64>,
    /// Simulation distribution with the same binning.
    pub mc: Vec<f64>,
}

/// Top-level skim configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SkimConfig {
    /// Integrated luminosity in pb⁻¹.
    #[serde(default = "default_luminosity")]
    pub luminosity: f64,

    /// Cross-section / generated-event table (YAML or JSON).
    #[serde(default)]
    pub weight_table: Option<PathBuf>,

    /// Good-run whitelists.
    #[serde(default)]
    pub good_runs: GoodRunsConfig,

    /// Pileup distributions. Without them every event gets pileup weight 1.
    #[serde(default)]
    pub pileup: Option<PileupConfig>,

    /// Sample-name prefix of mass-point scanned signal samples.
    #[serde(default = "default_mass_point_prefix")]
    pub mass_point_prefix: String,

    /// Pileup-jet discriminant variant used by the jet selection.
    #[serde(default = "default_beta_variant")]
    pub beta_variant: String,

    /// Minimum pt of a counted isolated track.
    #[serde(default = "default_iso_track_pt")]
    pub iso_track_pt: f64,

    /// Invisible-particle mass for the W-mass MT2 hypothesis.
    #[serde(default = "default_w_mass")]
    pub w_mass: f64,

    /// Entries between progress log lines (0 disables).
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
}

fn default_luminosity() -> f64 {
    19399.0
}

fn default_mass_point_prefix() -> String {
    "SMS".to_string()
}

fn default_beta_variant() -> String {
    "beta".to_string()
}

fn default_iso_track_pt() -> f64 {
    10.0
}

fn default_w_mass() -> f64 {
    80.399
}

fn default_progress_interval() -> usize {
    1000
}

impl Default for SkimConfig {
    fn default() -> Self {
        Self {
            luminosity: default_luminosity(),
            weight_table: None,
            good_runs: GoodRunsConfig::default(),
            pileup: None,
            mass_point_prefix: default_mass_point_prefix(),
            beta_variant: default_beta_variant(),
            iso_track_pt: default_iso_track_pt(),
            w_mass: default_w_mass(),
            progress_interval: default_progress_interval(),
        }
    }
}

impl SkimConfig {
    /// Read a configuration file; `.json` is parsed as JSON, anything else as YAML.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase();
        let cfg: SkimConfig = if ext == "json" {
            serde_json::from_slice(&bytes)?
        } else {
            serde_yaml_ng::from_slice(&bytes)?
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values that would silently corrupt every record of the scan.
    pub fn validate(&self) -> Result<()> {
        if !self.luminosity.is_finite() {
            let msg = format!("luminosity must be finite, got {}", self.luminosity);
            return Err(Error::Config(msg));
        }
        if !self.w_mass.is_finite() || self.w_mass < 0.0 {
            return Err(Error::Config(format!("w_mass must be >= 0, got {}", self.w_mass)));
        }
        if let Some(pu) = &self.pileup {
            if pu.data.len() != pu.mc.len() {
                return Err(Error::Config(format!(
                    "pileup distributions differ in length: data {}, mc {}",
                    pu.data.len(),
                    pu.mc.len()
                )));
            }
        }
        Ok(())
    }
}
