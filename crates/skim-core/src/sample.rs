//! Sample identity and the dataset-name predicates that drive legacy carve-outs.
//!
//! Several selection policies depend on substrings of the sample (dataset) name. They are kept
//! here as named predicates so every call site reads as the policy it implements and each rule
//! can be tested on its own.

/// Format versions below this carry no usable pileup-jet discriminant.
pub const BETA_MIN_FORMAT_VERSION: u32 = 69;

/// Format versions below this carry no pre-computed isolated-track collection.
pub const ISO_TRACK_MIN_FORMAT_VERSION: u32 = 71;

/// Real-data reconstruction era, each certified by its own good-run whitelist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataEra {
    /// Prompt reconstruction.
    PromptReco,
    /// 24 August re-reconstruction.
    Aug24,
    /// 13 July re-reconstruction.
    Jul13,
}

impl DataEra {
    /// All eras, in the order they are matched against a sample name.
    pub const ALL: [DataEra; 3] = [DataEra::PromptReco, DataEra::Aug24, DataEra::Jul13];

    /// Dataset-name tag identifying the era.
    pub fn tag(self) -> &'static str {
        match self {
            DataEra::PromptReco => "PromptReco",
            DataEra::Aug24 => "24Aug",
            DataEra::Jul13 => "13Jul",
        }
    }
}

/// Identity of the input sample being scanned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleInfo {
    name: String,
}

impl SampleInfo {
    /// Create a sample from its dataset name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Dataset name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ntuple format version: the integer after the last `"_v"` in the name, 0 if none.
    pub fn format_version(&self) -> u32 {
        let Some(pos) = self.name.rfind("_v") else {
            return 0;
        };
        let digits: String =
            self.name[pos + 2..].chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().unwrap_or(0)
    }

    /// Legacy formats predate the pileup-jet discriminant.
    pub fn is_legacy_format(&self) -> bool {
        self.format_version() < BETA_MIN_FORMAT_VERSION
    }

    /// Collision data rather than simulation.
    pub fn is_real_data(&self) -> bool {
        self.name.contains("Run2012")
    }

    /// Reconstruction era of a real-data sample; `None` for simulation or an unknown era.
    pub fn data_era(&self) -> Option<DataEra> {
        if !self.is_real_data() {
            return None;
        }
        DataEra::ALL.into_iter().find(|era| self.name.contains(era.tag()))
    }

    /// Jets in these samples never get the pileup-beta requirement.
    pub fn skips_beta_cut(&self) -> bool {
        self.is_legacy_format() || self.name.contains("SMS-TChiHH")
    }

    /// Signal samples produced without a valid HBHE noise filter decision.
    pub fn exempt_from_hbhe_filter(&self) -> bool {
        self.name.contains("TChihh") || self.name.contains("HbbHbb")
    }

    /// The v66 production stored a broken ECAL laser filter decision.
    pub fn exempt_from_ecal_laser_filter(&self) -> bool {
        self.name.contains("_v66")
    }

    /// Top-pair samples that receive the top-pt reweighting.
    pub fn is_ttbar(&self) -> bool {
        self.name.contains("TTJets") || self.name.contains("TT_")
    }

    /// Scanned signal samples whose normalization depends on the mass point.
    pub fn is_mass_point_signal(&self, prefix: &str) -> bool {
        !prefix.is_empty() && self.name.starts_with(prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_version() {
        assert_eq!(SampleInfo::new("TTJets_SemiLeptMGDecays_8TeV_v71").format_version(), 71);
        assert_eq!(SampleInfo::new("TTJets_v68s_extra").format_version(), 68);
        assert_eq!(SampleInfo::new("no_version_here").format_version(), 0);
        assert_eq!(SampleInfo::new("trailing_v").format_version(), 0);
        // last occurrence wins
        assert_eq!(SampleInfo::new("a_v12_b_v70").format_version(), 70);
    }

    #[test]
    fn test_legacy_and_beta_carve_out() {
        assert!(SampleInfo::new("QCD_v66").is_legacy_format());
        assert!(!SampleInfo::new("QCD_v69").is_legacy_format());
        assert!(SampleInfo::new("QCD_v66").skips_beta_cut());
        assert!(SampleInfo::new("SMS-TChiHH_2b2b_v71").skips_beta_cut());
        assert!(!SampleInfo::new("TTJets_v71").skips_beta_cut());
    }

    #[test]
    fn test_data_eras() {
        let era = |name: &str| SampleInfo::new(name).data_era();
        assert_eq!(era("MET_Run2012C-PromptReco-v2_v71"), Some(DataEra::PromptReco));
        assert_eq!(era("MET_Run2012A-recover-06Aug2012-v1_24Aug_v71"), Some(DataEra::Aug24));
        assert_eq!(era("MET_Run2012A-13Jul2012-v1_v66"), Some(DataEra::Jul13));
        assert_eq!(era("MET_Run2012D-22Jan2013_v71"), None);
        assert_eq!(era("TTJets_PromptReco_v71"), None);
    }

    #[test]
    fn test_filter_exemptions() {
        assert!(SampleInfo::new("SMS-TChihh_v71").exempt_from_hbhe_filter());
        assert!(SampleInfo::new("HbbHbb_v71").exempt_from_hbhe_filter());
        assert!(!SampleInfo::new("TTJets_v71").exempt_from_hbhe_filter());
        assert!(SampleInfo::new("TTJets_v66").exempt_from_ecal_laser_filter());
        assert!(!SampleInfo::new("TTJets_v67").exempt_from_ecal_laser_filter());
    }

    #[test]
    fn test_ttbar_and_mass_point() {
        assert!(SampleInfo::new("TTJets_FullLeptMGDecays_v71").is_ttbar());
        assert!(SampleInfo::new("TT_CT10_TuneZ2star_v71").is_ttbar());
        assert!(!SampleInfo::new("WJetsToLNu_v71").is_ttbar());
        assert!(SampleInfo::new("SMS-T1tttt_v71").is_mass_point_signal("SMS"));
        assert!(!SampleInfo::new("TTJets_SMS_v71").is_mass_point_signal("SMS"));
        assert!(!SampleInfo::new("SMS-T1tttt_v71").is_mass_point_signal(""));
    }
}
