//! # skim-select
//!
//! Selection engine of the event reducer: physics-object identification, the baseline cut flow,
//! event-level kinematic derivations, sample normalisation and the scan driver that ties them
//! together.
//!
//! ```no_run
//! use skim_core::SkimConfig;
//! use skim_select::{MemorySink, Skimmer, VecSource};
//!
//! let cfg = SkimConfig::default();
//! let skimmer = Skimmer::from_config(&cfg)?;
//! let mut source = VecSource::new("TTJets_SemiLeptMGDecays_8TeV_v71", Vec::new());
//! let mut sink = MemorySink::default();
//! let summary = skimmer.run(&mut source, &mut sink)?;
//! println!("{} records", summary.written);
//! # Ok::<(), skim_core::Error>(())
//! ```

#![warn(clippy::all)]

pub mod beta;
pub mod cutflow;
pub mod dedup;
pub mod good_runs;
pub mod kinematics;
pub mod math;
pub mod memory;
pub mod mt2;
pub mod objects;
pub mod pileup;
pub mod pipeline;
pub mod weights;
pub mod working_point;

pub use beta::{BetaCache, BetaVariant};
pub use cutflow::{CutFlow, CutFlowResult};
pub use dedup::EventDeduplicator;
pub use good_runs::{GoodRunList, GoodRuns, LumiRange};
pub use kinematics::{Kinematics, SelectedLepton};
pub use memory::{MemorySink, VecSource};
pub use mt2::GoldenSectionMt2;
pub use objects::{JetSelection, ObjectSelector};
pub use pileup::{LumiReWeighting, NoPileupReweighting};
pub use pipeline::{ScanSummary, Skimmer, meta_info};
pub use weights::{WeightResolver, WeightTable};
pub use working_point::{DetectorRegion, WorkingPoint};
