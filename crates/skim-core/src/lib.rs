//! # skim-core
//!
//! Shared types for the skim event reducer: the per-event data model, the reduced output record,
//! run configuration, errors, and the traits the selection core is wired through.

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod event;
pub mod record;
pub mod sample;
pub mod traits;

pub use config::{GoodRunsConfig, PileupConfig, SkimConfig};
pub use error::{Error, Result};
pub use event::{
    CurrentEvent, Electron, EventKey, IsoTrack, Jet, Met, MetFilters, Muon, PileupSummary,
    Position, Tau, Track, TriggerResult, TruthParticle, Vertex,
};
pub use record::{MetaInfo, REDUCED_TREE_VERSION, ReducedRecord};
pub use sample::{DataEra, SampleInfo};
pub use traits::{EventSource, Mt2Solver, PileupReweighter, RecordSink, VisibleParent};
