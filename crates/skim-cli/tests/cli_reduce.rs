use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_skim"))
}

fn tmp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("skim_cli_{}_{}_{}", std::process::id(), nanos, name));
    std::fs::create_dir_all(&p).unwrap();
    p
}

fn run_in(dir: &std::path::Path, args: &[&str]) -> Output {
    Command::new(bin_path())
        .current_dir(dir)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

fn stdout_json(out: &Output) -> serde_json::Value {
    assert!(
        out.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).unwrap_or_else(|e| {
        panic!("stdout is not JSON ({e}): {}", String::from_utf8_lossy(&out.stdout))
    })
}

/// One entry passing the full baseline selection, as a JSONL line.
fn baseline_line(event: u32) -> String {
    let pts = [150.0, 130.0, 110.0, 90.0, 70.0, 50.0];
    let n = pts.len();
    serde_json::json!({
        "run": 1,
        "event": event,
        "lumiblock": 1,
        "jets": {
            "pt": pts,
            "eta": vec![0.5; n],
            "energy": pts.iter().map(|p| p * 1.1).collect::<Vec<_>>(),
            "corr_factor_raw": vec![1.0; n],
            "csv": [0.95, 0.93, 0.1, 0.1, 0.1, 0.1],
            "charged_mult": vec![5; n],
            "neutral_mult": vec![5; n],
            "charged_had_energy": pts.iter().map(|p| p * 0.6).collect::<Vec<_>>(),
            "neutral_had_energy": pts.iter().map(|p| p * 0.3).collect::<Vec<_>>()
        },
        "muons": {
            "pt": [40.0],
            "eta": [0.2],
            "px": [40.0],
            "global_prompt_tight": [true],
            "matched_stations": [2],
            "valid_pixel_hits": [2],
            "tracker_layers": [9]
        },
        "vertices": { "ndof": [15.0] },
        "beam_spot": [0.0, 0.0, 0.0],
        "pf_type1_met": { "et": [300.0], "ey": [300.0], "phi": [1.5707963] },
        "raw_met": { "et": [280.0] },
        "filters": {
            "csc_halo": true, "hbhe": true, "hcal_laser": true, "ecal_tp": true,
            "tracking_failure": true, "ee_bad_sc": true, "ecal_laser": true,
            "greedy_muon": true, "inconsistent_pf_muon": true, "scraping_veto": true
        }
    })
    .to_string()
}

#[test]
fn reduce_then_inspect() {
    let dir = tmp_dir("reduce");
    let input = dir.join("TTJets_SemiLeptMGDecays_8TeV_v66.jsonl");
    let lines = [baseline_line(1), baseline_line(2), baseline_line(1), "{\"event\": ".into()];
    std::fs::write(&input, lines.join("\n")).unwrap();

    let table = dir.join("xsec.json");
    std::fs::write(
        &table,
        r#"{"samples": [{"name": "TTJets", "cross_section": 100.0, "total_events": 500}]}"#,
    )
    .unwrap();
    let config = dir.join("skim.yaml");
    std::fs::write(&config, format!("luminosity: 20\nweight_table: {}\n", table.display()))
        .unwrap();

    let out = run_in(
        &dir,
        &["reduce", "--input", input.to_str().unwrap(), "--config", config.to_str().unwrap()],
    );
    let summary = stdout_json(&out);
    assert_eq!(summary["entries"], 4);
    assert_eq!(summary["written"], 2);
    assert_eq!(summary["failed"], 1);

    let tree = dir.join("reduced_trees").join("TTJets_SemiLeptMGDecays_8TeV_v66.parquet");
    assert!(tree.exists(), "default output path not used");

    let out = run_in(&dir, &["inspect", "--input", tree.to_str().unwrap()]);
    let reports = stdout_json(&out);
    let report = &reports[0];
    assert_eq!(report["records"], 2);
    assert_eq!(report["schema_version"], "skim_reduced_tree_v1");
    assert_eq!(report["meta_info"]["original_file_entries"], 4);
    assert_eq!(report["cuts"]["baseline"]["events"], 2);
    let weighted = report["cuts"]["baseline"]["weighted"].as_f64().unwrap();
    assert!((weighted - 8.0).abs() < 1e-5, "weighted yield {weighted}");

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn reduce_explicit_output_and_sample() {
    let dir = tmp_dir("explicit");
    let input = dir.join("part0.jsonl");
    std::fs::write(&input, baseline_line(5)).unwrap();
    let output = dir.join("nested").join("out.parquet");

    let out = run_in(
        &dir,
        &[
            "--log-level",
            "error",
            "reduce",
            "-i",
            input.to_str().unwrap(),
            "--sample",
            "QCD_HT-1000_v66",
            "-o",
            output.to_str().unwrap(),
        ],
    );
    let summary = stdout_json(&out);
    assert_eq!(summary["written"], 1);
    assert!(output.exists());

    let missing = dir.join("missing.parquet");
    let reports = stdout_json(&run_in(
        &dir,
        &["inspect", "-i", missing.to_str().unwrap(), output.to_str().unwrap()],
    ));
    assert!(reports[0]["error"].as_str().unwrap().contains("failed to read reduced tree"));
    assert_eq!(reports[1]["meta_info"]["original_file_name"], "QCD_HT-1000_v66");

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn reduce_missing_input_fails() {
    let dir = tmp_dir("missing");
    let out = run_in(&dir, &["reduce", "--input", "does_not_exist.jsonl"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("failed to open input files"));
    std::fs::remove_dir_all(&dir).ok();
}
