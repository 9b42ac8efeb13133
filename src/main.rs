//! simsweep CLI
//!
//! Usage:
//!   simsweep run --simulator-dir ~/ChampSim --traces-dir ~/traces \
//!       --experiment baseline=bimodal --experiment variant-A=gshare
//!   simsweep parse run.log --extended
//!
//! Environment Variables:
//!   SIMSWEEP_CONFIG_PATH - TOML config used when --config is absent
//!   RUST_LOG             - log filter (default: info)

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use simsweep::sweep::{
    run_sweep, ExperimentConfig, FailurePolicy, HarnessConfig, OutputSchema, SchemaConfig,
    DEFAULT_CACHE_BLOCK,
};

#[derive(Parser, Debug)]
#[command(name = "simsweep", author, version)]
#[command(about = "Build a simulator per configuration, run it over traces, compare counters")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build, run every trace and compare experiments
    Run(RunArgs),
    /// Parse one captured simulator output and print the record
    Parse(ParseArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Simulator checkout (build and run directory)
    #[arg(long, env = "SIMSWEEP_SIMULATOR_DIR")]
    simulator_dir: Option<PathBuf>,

    /// Directory of trace files
    #[arg(long, env = "SIMSWEEP_TRACES_DIR")]
    traces_dir: Option<PathBuf>,

    /// Experiment as label=config (repeatable, first one fixes trace order)
    #[arg(short, long = "experiment")]
    experiments: Vec<ExperimentConfig>,

    /// Maximum concurrent simulator processes
    #[arg(short = 'j', long)]
    max_concurrency: Option<usize>,

    /// Kill a run that takes longer than this many seconds
    #[arg(long)]
    task_timeout_secs: Option<u64>,

    /// Keep going when a run fails and report failures separately
    #[arg(long)]
    collect_partial: bool,

    #[command(flatten)]
    schema: SchemaArgs,

    /// Output directory for reports
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Write JSON only, no markdown
    #[arg(long)]
    json_only: bool,
}

#[derive(Args, Debug)]
struct ParseArgs {
    /// Captured simulator stdout
    file: PathBuf,

    #[command(flatten)]
    schema: SchemaArgs,
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Also extract cache accesses/hits
    #[arg(long)]
    extended: bool,

    /// Cache block header for --extended
    #[arg(long, default_value = DEFAULT_CACHE_BLOCK)]
    cache_block: String,
}

impl SchemaArgs {
    fn to_config(&self) -> Option<SchemaConfig> {
        self.extended.then(|| SchemaConfig::Extended {
            cache_block: self.cache_block.clone(),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Parse(args) => parse(args),
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading config from {}", path.display());
            HarnessConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?
        }
        None => HarnessConfig::from_env(),
    };

    if let Some(dir) = args.simulator_dir {
        config.simulator_dir = dir;
    }
    if let Some(dir) = args.traces_dir {
        config.traces_dir = dir;
    }
    if !args.experiments.is_empty() {
        config.experiments = args.experiments;
    }
    if args.max_concurrency.is_some() {
        config.pool.max_concurrency = args.max_concurrency;
    }
    if args.task_timeout_secs.is_some() {
        config.pool.task_timeout_secs = args.task_timeout_secs;
    }
    if args.collect_partial {
        config.failure_policy = FailurePolicy::CollectPartial;
    }
    if let Some(schema) = args.schema.to_config() {
        config.schema = schema;
    }

    info!("Simulator: {}", config.simulator_dir.display());
    info!("Traces: {}", config.traces_dir.display());
    info!("Concurrency: {}", config.pool.concurrency());
    for exp in &config.experiments {
        info!("  - {} (config {})", exp.label, exp.config);
    }

    let report = run_sweep(&config).await.context("sweep failed")?;

    fs::create_dir_all(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    let json_path = args.output.join("sweep_report.json");
    fs::write(&json_path, report.to_json()?)
        .with_context(|| format!("writing {}", json_path.display()))?;
    info!("Written: {}", json_path.display());

    if !args.json_only {
        let md_path = args.output.join("SWEEP_REPORT.md");
        fs::write(&md_path, report.to_markdown())
            .with_context(|| format!("writing {}", md_path.display()))?;
        info!("Written: {}", md_path.display());
    }

    if !report.is_complete() {
        warn!("{} runs failed", report.failure_count());
        bail!("sweep incomplete: {} runs failed", report.failure_count());
    }
    Ok(())
}

fn parse(args: ParseArgs) -> Result<()> {
    let raw = fs::read(&args.file).with_context(|| format!("reading {}", args.file.display()))?;
    let schema = args
        .schema
        .to_config()
        .map(|c| c.to_schema())
        .unwrap_or_else(OutputSchema::core);
    let record = schema
        .parse(&raw)
        .with_context(|| format!("parsing {}", args.file.display()))?;

    let fields: serde_json::Map<String, serde_json::Value> = schema
        .field_names()
        .into_iter()
        .zip(record.values().iter().map(|v| serde_json::json!(v)))
        .collect();
    println!("{}", serde_json::to_string_pretty(&fields)?);
    Ok(())
}
