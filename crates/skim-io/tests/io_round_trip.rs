//! JSONL input and Parquet output through the public `EventSource` / `RecordSink` traits.

use skim_core::{
    CurrentEvent, EventSource, Jet, Met, MetaInfo, RecordSink, ReducedRecord, REDUCED_TREE_VERSION,
};
use skim_io::{JsonlEventSource, ParquetSink, read_reduced_parquet, write_jsonl_events};

fn tmp_dir(tag: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("skim_io_{tag}_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn jsonl_events_load_in_chain_order() {
    let dir = tmp_dir("chain");
    let events: Vec<CurrentEvent> = (1..=4)
        .map(|i| CurrentEvent {
            run: 200000,
            event: i,
            lumiblock: 10,
            jets: vec![Jet { pt: 30.0 * i as f64, eta: 0.5, csv: 0.9, ..Default::default() }],
            pf_type1_met: vec![Met { et: 100.0, ..Default::default() }],
            pu_jet_table: vec![vec![30.0 * i as f32, 0.5, 0.8, 0.7, 0.6, 0.5]],
            ..Default::default()
        })
        .collect();
    let first = dir.join("TTJets_v71_part1.jsonl");
    let second = dir.join("TTJets_v71_part2.jsonl");
    write_jsonl_events(&first, &events[..3]).unwrap();
    write_jsonl_events(&second, &events[3..]).unwrap();

    let mut src = JsonlEventSource::open(&[&first, &second], Some("TTJets_v71")).unwrap();
    assert_eq!(src.total_entries(), 4);
    let mut ev = CurrentEvent::default();
    for (entry, expected) in events.iter().enumerate() {
        src.load(entry, &mut ev).unwrap();
        assert_eq!(ev.key(), expected.key());
        assert_eq!(ev.jets, expected.jets);
        assert_eq!(ev.pu_jet_table, expected.pu_jet_table);
    }

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn empty_input_gives_empty_tree_with_metadata() {
    let dir = tmp_dir("empty");
    let input = dir.join("empty.jsonl");
    std::fs::write(&input, "\n\n").unwrap();
    let src = JsonlEventSource::open(&[&input], None).unwrap();
    assert_eq!(src.total_entries(), 0);
    assert_eq!(src.sample().name(), "empty");

    let out = dir.join("out").join("empty.parquet");
    let mut sink = ParquetSink::create(&out).unwrap();
    let meta = MetaInfo {
        original_file_name: "empty".into(),
        reduced_tree_version: REDUCED_TREE_VERSION,
        ..Default::default()
    };
    sink.finish(&meta).unwrap();

    let tree = read_reduced_parquet(&out).unwrap();
    assert!(tree.records.is_empty());
    assert_eq!(tree.meta.unwrap().original_file_name, "empty");

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn parquet_preserves_sentinels() {
    let dir = tmp_dir("sentinel");
    let out = dir.join("r.parquet");
    let rec = ReducedRecord {
        delta_phi_w_lepton: f32::MAX,
        mass1: -1,
        mass2: -1,
        full_weight: 0.25,
        ..Default::default()
    };
    let mut sink = ParquetSink::create(&out).unwrap();
    sink.write(&rec).unwrap();
    sink.finish(&MetaInfo::default()).unwrap();

    let tree = read_reduced_parquet(&out).unwrap();
    assert_eq!(tree.records, vec![rec]);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn stored_empty_array_truncates_collection() {
    let dir = tmp_dir("empty_array");
    let input = dir.join("TTJets_v71.jsonl");
    let lines = [
        r#"{"event": 1, "jets": {"pt": [40.0, 50.0], "csv": []}}"#,
        r#"{"event": 2, "jets": {"pt": [40.0, 50.0]}}"#,
    ];
    std::fs::write(&input, lines.join("\n")).unwrap();

    let mut src = JsonlEventSource::open(&[&input], None).unwrap();
    let mut ev = CurrentEvent::default();
    src.load(0, &mut ev).unwrap();
    assert!(ev.jets.is_empty(), "empty csv array must not be padded with zeros");

    src.load(1, &mut ev).unwrap();
    assert_eq!(ev.jets.len(), 2);
    assert_eq!(ev.jets[1].pt, 50.0);
    assert_eq!(ev.jets[1].csv, 0.0);

    std::fs::remove_dir_all(&dir).ok();
}
