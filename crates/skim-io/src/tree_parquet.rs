//! Parquet I/O for reduced trees.
//!
//! # Schema: `skim_reduced_tree_v1`
//!
//! One non-nullable column per [`ReducedRecord`] field, named after the field. Flags are
//! `Boolean`, derived quantities `Float32`, counts `UInt8`, mass-point values `Int16` and event
//! identity `UInt32`.
//!
//! ## Parquet key-value metadata
//!
//! | Key                   | Value                                     |
//! |-----------------------|-------------------------------------------|
//! | `skim.schema_version` | `"skim_reduced_tree_v1"`                  |
//! | `skim.meta_info`      | JSON of the [`MetaInfo`] provenance record |
//!
//! The provenance record is only known once the scan has finished, so it is appended when the
//! writer is closed.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    ArrayRef, AsArray, BooleanArray, Float32Array, Int16Array, UInt8Array, UInt32Array,
};
use arrow::datatypes::{
    DataType, Field, Float32Type, Int16Type, Schema, SchemaRef, UInt8Type, UInt32Type,
};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use skim_core::{Error, MetaInfo, RecordSink, ReducedRecord, Result};

/// Schema version string embedded in Parquet key-value metadata.
pub const REDUCED_TREE_SCHEMA_V1: &str = "skim_reduced_tree_v1";

/// Parquet metadata key for the schema version.
pub const META_KEY_SCHEMA_VERSION: &str = "skim.schema_version";

/// Parquet metadata key for the provenance record (JSON).
pub const META_KEY_META_INFO: &str = "skim.meta_info";

/// Rows buffered before a record batch is flushed to the writer.
pub const DEFAULT_BATCH_ROWS: usize = 8192;

macro_rules! reduced_columns {
    ($($field:ident: $kind:ident),* $(,)?) => {
        /// Arrow schema of the reduced tree (without metadata).
        pub fn reduced_fields() -> Vec<Field> {
            vec![$(Field::new(stringify!($field), reduced_columns!(@type $kind), false)),*]
        }

        fn records_to_arrays(records: &[ReducedRecord]) -> Vec<ArrayRef> {
            vec![$(reduced_columns!(@array $kind, records, $field)),*]
        }

        fn records_from_batch(batch: &RecordBatch, out: &mut Vec<ReducedRecord>) -> Result<()> {
            let start = out.len();
            out.resize(start + batch.num_rows(), ReducedRecord::default());
            let rows = &mut out[start..];
            $(
                {
                    let name = stringify!($field);
                    let col = batch
                        .column_by_name(name)
                        .ok_or_else(|| Error::Validation(format!("missing column '{name}'")))?;
                    let arr = reduced_columns!(@downcast $kind, col, name)?;
                    for (i, row) in rows.iter_mut().enumerate() {
                        row.$field = arr.value(i);
                    }
                }
            )*
            Ok(())
        }
    };

    (@type bool) => { DataType::Boolean };
    (@type f32) => { DataType::Float32 };
    (@type u8) => { DataType::UInt8 };
    (@type i16) => { DataType::Int16 };
    (@type u32) => { DataType::UInt32 };

    (@array bool, $records:ident, $field:ident) => {
        Arc::new(BooleanArray::from_iter($records.iter().map(|r| Some(r.$field)))) as ArrayRef
    };
    (@array f32, $records:ident, $field:ident) => {
        Arc::new(Float32Array::from_iter_values($records.iter().map(|r| r.$field))) as ArrayRef
    };
    (@array u8, $records:ident, $field:ident) => {
        Arc::new(UInt8Array::from_iter_values($records.iter().map(|r| r.$field))) as ArrayRef
    };
    (@array i16, $records:ident, $field:ident) => {
        Arc::new(Int16Array::from_iter_values($records.iter().map(|r| r.$field))) as ArrayRef
    };
    (@array u32, $records:ident, $field:ident) => {
        Arc::new(UInt32Array::from_iter_values($records.iter().map(|r| r.$field))) as ArrayRef
    };

    (@downcast bool, $col:ident, $name:ident) => {
        $col.as_boolean_opt().ok_or_else(|| type_mismatch($name, "Boolean"))
    };
    (@downcast f32, $col:ident, $name:ident) => {
        $col.as_primitive_opt::<Float32Type>().ok_or_else(|| type_mismatch($name, "Float32"))
    };
    (@downcast u8, $col:ident, $name:ident) => {
        $col.as_primitive_opt::<UInt8Type>().ok_or_else(|| type_mismatch($name, "UInt8"))
    };
    (@downcast i16, $col:ident, $name:ident) => {
        $col.as_primitive_opt::<Int16Type>().ok_or_else(|| type_mismatch($name, "Int16"))
    };
    (@downcast u32, $col:ident, $name:ident) => {
        $col.as_primitive_opt::<UInt32Type>().ok_or_else(|| type_mismatch($name, "UInt32"))
    };
}

fn type_mismatch(name: &str, expected: &str) -> Error {
    Error::Validation(format!("column '{name}' is not {expected}"))
}

reduced_columns! {
    passes_json: bool,
    passes_pv: bool,
    passes_met_cleaning: bool,
    passes_lepton: bool,
    passes_ht: bool,
    passes_met: bool,
    passes_num_jets: bool,
    passes_b_tagging: bool,
    passes_baseline: bool,

    highest_jet_pt: f32,
    second_highest_jet_pt: f32,
    third_highest_jet_pt: f32,
    fourth_highest_jet_pt: f32,
    fifth_highest_jet_pt: f32,

    highest_csv: f32,
    second_highest_csv: f32,
    third_highest_csv: f32,
    fourth_highest_csv: f32,
    fifth_highest_csv: f32,

    pu_true_num_interactions: f32,
    num_primary_vertices: u8,

    met_sig: f32,
    met: f32,

    num_jets: u8,
    num_csvl_jets: u8,
    num_csvm_jets: u8,
    num_csvt_jets: u8,

    num_veto_electrons: u8,
    num_veto_muons: u8,
    num_veto_taus: u8,
    num_veto_leptons: u8,
    num_loose_electrons: u8,
    num_loose_muons: u8,
    num_loose_taus: u8,
    num_loose_leptons: u8,
    num_medium_electrons: u8,
    num_medium_muons: u8,
    num_medium_taus: u8,
    num_medium_leptons: u8,
    num_tight_electrons: u8,
    num_tight_muons: u8,
    num_tight_taus: u8,
    num_tight_leptons: u8,

    num_iso_tracks: u8,

    mt2_w_mass: f32,
    mt2_massless: f32,
    mt: f32,
    delta_phi_met_lepton: f32,
    delta_phi_w_lepton: f32,

    ht_jets: f32,
    ht_jets_met: f32,
    ht_jets_leps: f32,
    ht_jets_met_leps: f32,

    full_weight: f32,
    lumi_weight: f32,
    pu_weight: f32,

    mass1: i16,
    mass2: i16,

    run: u32,
    event: u32,
    lumiblock: u32,
}

/// Arrow schema of the reduced tree, carrying the schema-version metadata.
pub fn reduced_schema() -> SchemaRef {
    let metadata = HashMap::from([(
        META_KEY_SCHEMA_VERSION.to_string(),
        REDUCED_TREE_SCHEMA_V1.to_string(),
    )]);
    Arc::new(Schema::new(reduced_fields()).with_metadata(metadata))
}

/// Build a record batch from reduced records.
pub fn records_to_record_batch(records: &[ReducedRecord]) -> Result<RecordBatch> {
    RecordBatch::try_new(reduced_schema(), records_to_arrays(records))
        .map_err(|e| Error::Output(format!("failed to build RecordBatch: {e}")))
}

fn default_compression() -> parquet::basic::Compression {
    parquet::basic::Compression::SNAPPY
}

/// [`RecordSink`] writing a Parquet reduced tree.
///
/// Records are buffered and flushed in batches of [`DEFAULT_BATCH_ROWS`]. Nothing is readable
/// until [`RecordSink::finish`] has closed the file.
pub struct ParquetSink {
    path: PathBuf,
    writer: Option<ArrowWriter<File>>,
    pending: Vec<ReducedRecord>,
    batch_rows: usize,
    written: usize,
}

impl std::fmt::Debug for ParquetSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParquetSink")
            .field("path", &self.path)
            .field("pending", &self.pending.len())
            .field("written", &self.written)
            .finish_non_exhaustive()
    }
}

impl ParquetSink {
    /// Create the output file (and its parent directory).
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Output(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let file = File::create(path)
            .map_err(|e| Error::Output(format!("failed to create {}: {e}", path.display())))?;
        let props = WriterProperties::builder().set_compression(default_compression()).build();
        let writer = ArrowWriter::try_new(file, reduced_schema(), Some(props))
            .map_err(|e| Error::Output(format!("failed to create Parquet writer: {e}")))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(writer),
            pending: Vec::new(),
            batch_rows: DEFAULT_BATCH_ROWS,
            written: 0,
        })
    }

    /// Override the flush size.
    pub fn with_batch_rows(mut self, rows: usize) -> Self {
        self.batch_rows = rows.max(1);
        self
    }

    /// Output path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records flushed so far.
    pub fn written(&self) -> usize {
        self.written
    }

    fn writer(&mut self) -> Result<&mut ArrowWriter<File>> {
        self.writer.as_mut().ok_or_else(|| Error::Output("writer already closed".to_string()))
    }

    fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch = records_to_record_batch(&self.pending)?;
        self.writer()?
            .write(&batch)
            .map_err(|e| Error::Output(format!("failed to write Parquet: {e}")))?;
        self.written += self.pending.len();
        self.pending.clear();
        Ok(())
    }
}

impl RecordSink for ParquetSink {
    fn write(&mut self, record: &ReducedRecord) -> Result<()> {
        self.pending.push(record.clone());
        if self.pending.len() >= self.batch_rows {
            self.flush()?;
        }
        Ok(())
    }

    fn finish(&mut self, meta: &MetaInfo) -> Result<()> {
        self.flush()?;
        let meta_json = serde_json::to_string(meta)?;
        let mut writer = self
            .writer
            .take()
            .ok_or_else(|| Error::Output("writer already closed".to_string()))?;
        writer.append_key_value_metadata(KeyValue::new(META_KEY_META_INFO.to_string(), meta_json));
        writer
            .close()
            .map_err(|e| Error::Output(format!("failed to close Parquet writer: {e}")))?;
        tracing::info!(path = %self.path.display(), records = self.written, "wrote reduced tree");
        Ok(())
    }
}

/// A reduced tree read back from Parquet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReducedTree {
    /// Records in file order.
    pub records: Vec<ReducedRecord>,
    /// Provenance record, when present.
    pub meta: Option<MetaInfo>,
    /// Schema version tag, when present.
    pub schema_version: Option<String>,
}

/// Read a reduced tree written by [`ParquetSink`].
pub fn read_reduced_parquet(path: &Path) -> Result<ReducedTree> {
    let file = File::open(path)
        .map_err(|e| Error::Validation(format!("failed to open {}: {e}", path.display())))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| Error::Validation(format!("failed to read Parquet: {e}")))?;

    let mut kv: HashMap<String, String> = builder.schema().metadata().clone();
    if let Some(file_kv) = builder.metadata().file_metadata().key_value_metadata() {
        for entry in file_kv {
            if let Some(value) = &entry.value {
                kv.insert(entry.key.clone(), value.clone());
            }
        }
    }

    let schema_version = kv.get(META_KEY_SCHEMA_VERSION).cloned();
    match schema_version.as_deref() {
        Some(REDUCED_TREE_SCHEMA_V1) => {}
        Some(other) => {
            return Err(Error::Validation(format!("unsupported reduced-tree schema '{other}'")));
        }
        None => tracing::warn!(path = %path.display(), "no schema version in Parquet metadata"),
    }
    let meta = kv
        .get(META_KEY_META_INFO)
        .map(|s| serde_json::from_str::<MetaInfo>(s))
        .transpose()
        .map_err(|e| Error::Validation(format!("invalid {META_KEY_META_INFO} metadata: {e}")))?;

    let reader = builder
        .build()
        .map_err(|e| Error::Validation(format!("failed to build Parquet reader: {e}")))?;
    let mut records = Vec::new();
    for batch in reader {
        let batch =
            batch.map_err(|e| Error::Validation(format!("failed to read Parquet batch: {e}")))?;
        records_from_batch(&batch, &mut records)?;
    }
    Ok(ReducedTree { records, meta, schema_version })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;

    fn record(event: u32) -> ReducedRecord {
        ReducedRecord {
            passes_baseline: event % 2 == 0,
            highest_jet_pt: 120.5,
            num_jets: 6,
            delta_phi_met_lepton: f32::MAX,
            mass1: -1,
            mass2: 400,
            event,
            ..Default::default()
        }
    }

    #[test]
    fn test_schema_matches_arrays() {
        let batch = records_to_record_batch(&[record(1), record(2)]).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), reduced_fields().len());
        assert_eq!(
            batch.schema().metadata().get(META_KEY_SCHEMA_VERSION).map(String::as_str),
            Some(REDUCED_TREE_SCHEMA_V1)
        );
        let col = batch.column_by_name("mass2").unwrap();
        assert_eq!(col.data_type(), &DataType::Int16);
        assert_eq!(col.len(), 2);
    }

    #[test]
    fn test_write_read_with_small_batches() {
        let path = std::env::temp_dir()
            .join(format!("skim_io_parquet_{}", std::process::id()))
            .join("reduced.parquet");
        let mut sink = ParquetSink::create(&path).unwrap().with_batch_rows(2);
        let records: Vec<_> = (0..5).map(record).collect();
        for r in &records {
            sink.write(r).unwrap();
        }
        let meta = MetaInfo {
            original_file_name: "TTJets_v71".into(),
            original_file_entries: 7,
            reduced_tree_version: skim_core::REDUCED_TREE_VERSION,
            utc_creation_year: 2013,
            ..Default::default()
        };
        sink.finish(&meta).unwrap();
        assert_eq!(sink.written(), 5);
        assert!(sink.finish(&meta).is_err());

        let tree = read_reduced_parquet(&path).unwrap();
        assert_eq!(tree.records, records);
        assert_eq!(tree.meta, Some(meta));
        assert_eq!(tree.schema_version.as_deref(), Some(REDUCED_TREE_SCHEMA_V1));

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }
}
