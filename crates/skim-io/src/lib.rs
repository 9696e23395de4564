//! # skim-io
//!
//! Event input and reduced-tree output for the skim event reducer.
//!
//! - [`JsonlEventSource`]: chained JSONL files, one entry per line, collections stored as
//!   parallel attribute arrays.
//! - [`ParquetSink`] / [`read_reduced_parquet`]: the reduced tree as Parquet with the provenance
//!   record in the file's key-value metadata.

#![warn(clippy::all)]

pub mod columns;
pub mod source;
pub mod tree_parquet;

pub use columns::EntryColumns;
pub use source::{JsonlEventSource, sample_name_from_path, write_jsonl_events};
pub use tree_parquet::{
    META_KEY_META_INFO, META_KEY_SCHEMA_VERSION, ParquetSink, REDUCED_TREE_SCHEMA_V1, ReducedTree,
    read_reduced_parquet, records_to_record_batch, reduced_schema,
};
