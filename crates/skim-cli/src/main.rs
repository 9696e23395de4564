//! skim CLI

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use skim_core::{EventSource, ReducedRecord, SampleInfo, SkimConfig};
use skim_io::{JsonlEventSource, ParquetSink, read_reduced_parquet};
use skim_select::weights::parse_mass_points;
use skim_select::{BetaVariant, Skimmer, WeightResolver};

/// Directory reduced trees land in when no output path is given.
const DEFAULT_OUTPUT_DIR: &str = "reduced_trees";

#[derive(Parser)]
#[command(name = "skim")]
#[command(about = "skim - reduce collision-event ntuples to flat analysis trees")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan input files of one sample and write its reduced tree
    Reduce {
        /// Input JSONL files, chained in the order given
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,

        /// Run configuration (YAML or JSON). Defaults are used when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Sample identifier. Defaults to the first input's file stem.
        #[arg(long)]
        sample: Option<String>,

        /// Output Parquet file. Defaults to reduced_trees/<sample>.parquet.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override the pileup-jet discriminant variant from the configuration.
        #[arg(long)]
        beta_variant: Option<String>,
    },

    /// Summarise reduced trees: provenance and per-cut yields
    Inspect {
        /// Reduced-tree Parquet files
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Resolve the normalisation weight of a sample
    Weight {
        /// Sample identifier
        #[arg(long)]
        sample: String,

        /// Run configuration (YAML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Model-parameter string of a mass-point sample (e.g. T1tttt_1000_400_)
        #[arg(long)]
        model_params: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Reduce { input, config, sample, output, beta_variant } => cmd_reduce(
            &input,
            config.as_deref(),
            sample.as_deref(),
            output.as_deref(),
            beta_variant.as_deref(),
        ),
        Commands::Inspect { input, output } => cmd_inspect(&input, output.as_deref()),
        Commands::Weight { sample, config, model_params } => {
            cmd_weight(&sample, config.as_deref(), model_params.as_deref())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<SkimConfig> {
    match path {
        Some(p) => SkimConfig::from_path(p)
            .with_context(|| format!("failed to load config {}", p.display())),
        None => Ok(SkimConfig::default()),
    }
}

fn default_output_path(sample: &str) -> PathBuf {
    Path::new(DEFAULT_OUTPUT_DIR).join(format!("{sample}.parquet"))
}

fn cmd_reduce(
    input: &[PathBuf],
    config: Option<&Path>,
    sample: Option<&str>,
    output: Option<&Path>,
    beta_variant: Option<&str>,
) -> Result<()> {
    let cfg = load_config(config)?;
    let mut skimmer = Skimmer::from_config(&cfg).context("failed to set up the skimmer")?;
    if let Some(v) = beta_variant {
        let variant = BetaVariant::parse(v);
        if variant == BetaVariant::Unknown {
            tracing::warn!(variant = v, "unknown beta variant; matched jets fail the beta cut");
        }
        skimmer = skimmer.with_beta_variant(variant);
    }

    let mut source =
        JsonlEventSource::open(input, sample).context("failed to open input files")?;
    let out_path = match output {
        Some(p) => p.to_path_buf(),
        None => default_output_path(source.sample().name()),
    };

    let mut sink = ParquetSink::create(&out_path)
        .with_context(|| format!("failed to create {}", out_path.display()))?;
    let summary = skimmer.run(&mut source, &mut sink).context("scan failed")?;

    let output_json = serde_json::json!({
        "output": out_path.display().to_string(),
        "entries": summary.entries,
        "written": summary.written,
        "failed": summary.failed,
    });
    write_json(None, output_json)
}

/// Raw and weighted yield of events passing a flag.
fn yields(records: &[ReducedRecord], pass: impl Fn(&ReducedRecord) -> bool) -> serde_json::Value {
    let (n, w) = records
        .iter()
        .filter(|r| pass(r))
        .fold((0usize, 0.0f64), |(n, w), r| (n + 1, w + f64::from(r.full_weight)));
    serde_json::json!({ "events": n, "weighted": w })
}

fn inspect_one(path: &Path) -> Result<serde_json::Value> {
    let tree = read_reduced_parquet(path)
        .with_context(|| format!("failed to read reduced tree {}", path.display()))?;
    let Some(meta) = tree.meta else {
        bail!("{} carries no provenance metadata", path.display());
    };
    let r = &tree.records;
    tracing::info!(path = %path.display(), records = r.len(), "loaded reduced tree");

    Ok(serde_json::json!({
        "file": path.display().to_string(),
        "schema_version": tree.schema_version,
        "meta_info": meta,
        "records": r.len(),
        "cuts": {
            "json": yields(r, |x| x.passes_json),
            "pv": yields(r, |x| x.passes_pv),
            "met_cleaning": yields(r, |x| x.passes_met_cleaning),
            "lepton": yields(r, |x| x.passes_lepton),
            "ht": yields(r, |x| x.passes_ht),
            "met": yields(r, |x| x.passes_met),
            "num_jets": yields(r, |x| x.passes_num_jets),
            "b_tagging": yields(r, |x| x.passes_b_tagging),
            "baseline": yields(r, |x| x.passes_baseline),
        },
    }))
}

/// Unreadable files produce an error entry; the remaining files are still inspected.
fn cmd_inspect(input: &[PathBuf], output: Option<&Path>) -> Result<()> {
    let reports: Vec<serde_json::Value> = input
        .iter()
        .map(|path| {
            inspect_one(path).unwrap_or_else(|err| {
                let msg = format!("{err:#}");
                tracing::error!(path = %path.display(), error = %msg, "inspect failed");
                serde_json::json!({ "file": path.display().to_string(), "error": msg })
            })
        })
        .collect();
    write_json(output, serde_json::Value::Array(reports))
}

fn cmd_weight(sample: &str, config: Option<&Path>, model_params: Option<&str>) -> Result<()> {
    let cfg = load_config(config)?;
    let resolver = WeightResolver::from_config(&cfg).context("failed to load weight table")?;
    let info = SampleInfo::new(sample);

    let output_json = if resolver.is_mass_point_sample(&info) {
        let Some(params) = model_params else {
            bail!("sample '{sample}' is normalised per mass point; pass --model-params");
        };
        let (m1, m2) = parse_mass_points(params);
        serde_json::json!({
            "sample": sample,
            "mass_point": [m1, m2],
            "luminosity": resolver.luminosity(),
            "cross_section": resolver.mass_point_cross_section(sample, m1, m2),
            "total_events": resolver.mass_point_total_events(sample, m1, m2),
            "weight": resolver.mass_point_weight(sample, m1, m2),
        })
    } else {
        serde_json::json!({
            "sample": sample,
            "luminosity": resolver.luminosity(),
            "cross_section": resolver.cross_section(sample),
            "total_events": resolver.total_events(sample),
            "weight": resolver.weight(sample),
        })
    };
    write_json(None, output_json)
}

fn write_json(output: Option<&Path>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
