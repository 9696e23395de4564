//! Pileup reweighting from true-interaction distributions.

use skim_core::{Error, PileupConfig, PileupReweighter, Result};

/// Ratio of the normalised data and simulation true-interaction distributions, one integer bin
/// per entry starting at 0.
#[derive(Debug, Clone, PartialEq)]
pub struct LumiReWeighting {
    weights: Vec<f64>,
}

impl LumiReWeighting {
    /// Build from raw (unnormalised) distributions with identical binning.
    pub fn new(data: &[f64], mc: &[f64]) -> Result<Self> {
        if data.len() != mc.len() {
            return Err(Error::Validation(format!(
                "pileup distributions differ in length: data {}, mc {}",
                data.len(),
                mc.len()
            )));
        }
        if data.iter().chain(mc).any(|v| !v.is_finite() || *v < 0.0) {
            return Err(Error::Validation(
                "pileup distributions must be finite and non-negative".to_string(),
            ));
        }
        let data_sum: f64 = data.iter().sum();
        let mc_sum: f64 = mc.iter().sum();
        if data_sum <= 0.0 || mc_sum <= 0.0 {
            return Err(Error::Validation("pileup distributions must not be empty".to_string()));
        }

        let weights = data
            .iter()
            .zip(mc)
            .map(|(&d, &m)| if m > 0.0 { (d / data_sum) / (m / mc_sum) } else { 0.0 })
            .collect();
        Ok(Self { weights })
    }

    /// Build from the configuration block.
    pub fn from_config(cfg: &PileupConfig) -> Result<Self> {
        Self::new(&cfg.data, &cfg.mc)
    }

    /// Per-bin weights.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

impl PileupReweighter for LumiReWeighting {
    /// Weight of the bin containing `true_interactions` (rounded to the nearest integer);
    /// 0 outside the table.
    fn weight(&self, true_interactions: f64) -> f64 {
        let bin = (true_interactions + 0.5).floor();
        if bin.is_nan() || bin < 0.0 || bin >= self.weights.len() as f64 {
            return 0.0;
        }
        self.weights[bin as usize]
    }
}

/// Reweighter used when no distributions are configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPileupReweighting;

impl PileupReweighter for NoPileupReweighting {
    fn weight(&self, _true_interactions: f64) -> f64 {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ratio_of_normalised_distributions() {
        let lw = LumiReWeighting::new(&[1.0, 2.0, 1.0], &[2.0, 1.0, 1.0]).unwrap();
        assert_relative_eq!(lw.weight(0.0), 0.5);
        assert_relative_eq!(lw.weight(1.2), 2.0);
        assert_relative_eq!(lw.weight(1.6), 1.0);
    }

    #[test]
    fn test_out_of_range_and_empty_mc_bins() {
        let lw = LumiReWeighting::new(&[1.0, 1.0], &[1.0, 0.0]).unwrap();
        assert_eq!(lw.weight(1.0), 0.0);
        assert_eq!(lw.weight(-1.0), 0.0);
        assert_eq!(lw.weight(7.0), 0.0);
        assert_eq!(lw.weight(f64::NAN), 0.0);
    }

    #[test]
    fn test_rejects_bad_inputs() {
        assert!(LumiReWeighting::new(&[1.0], &[1.0, 1.0]).is_err());
        assert!(LumiReWeighting::new(&[0.0], &[1.0]).is_err());
        assert!(LumiReWeighting::new(&[-1.0, 2.0], &[1.0, 1.0]).is_err());
    }

    #[test]
    fn test_no_reweighting() {
        assert_eq!(NoPileupReweighting.weight(35.0), 1.0);
    }
}
