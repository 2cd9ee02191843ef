//! Piezo Infer CLI
//!
//! Offline and live windowed model inference over piezo recordings.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use piezo_infer::{
    config::{EngineConfig, PipelineConfig},
    core::{BoundaryMode, ModelRegistry, ModelSelector, OfflinePipeline, RunReport},
    diagnostics::create_shared_log,
    engine::{CancelFlag, CancellableEngine, IdentityEngine, SharedEngine},
    ingest::{collect_tcp, ColumnReader, DEFAULT_STREAM_PORT},
    VERSION,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "piezo-infer")]
#[command(version = VERSION)]
#[command(about = "Windowed model inference over filtered piezo signals", long_about = None)]
struct Cli {
    /// Enable debug logging (per-window diagnostics)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the offline pipeline on a CSV recording
    Run {
        /// CSV file with the piezo column
        csv: PathBuf,

        #[command(flatten)]
        overrides: Overrides,

        /// Print every output sample, one per line
        #[arg(long)]
        print: bool,

        /// Print the full run report as JSON
        #[arg(long, conflicts_with = "print")]
        json: bool,
    },

    /// Collect samples from the device stream, then run the pipeline
    Listen {
        /// Address to accept the device connection on
        #[arg(long, default_value_t = format!("127.0.0.1:{DEFAULT_STREAM_PORT}"))]
        bind: String,

        /// Stop after this many samples (default: until the device disconnects)
        #[arg(long)]
        samples: Option<usize>,

        #[command(flatten)]
        overrides: Overrides,

        /// Print the full run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the zero-phase filtered column only
    Filter {
        csv: PathBuf,

        /// 0-based column holding the signal
        #[arg(long)]
        column: Option<usize>,

        /// Filter edge handling (zero or reflect)
        #[arg(long)]
        boundary: Option<BoundaryMode>,
    },

    /// List the available models
    Models,

    /// Show configuration
    Config,
}

/// Per-invocation overrides of the stored configuration.
#[derive(clap::Args)]
struct Overrides {
    /// Model identifier (STAND, DB, SLEEP, or a configured extra)
    #[arg(long)]
    model: Option<String>,

    /// 0-based column holding the signal
    #[arg(long)]
    column: Option<usize>,

    /// Threads used for window inference
    #[arg(long)]
    workers: Option<usize>,

    /// Filter edge handling (zero or reflect)
    #[arg(long)]
    boundary: Option<BoundaryMode>,

    /// Fail if the input is shorter than one window
    #[arg(long)]
    strict: bool,
}

impl Overrides {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(ref model) = self.model {
            config.model = model.clone();
        }
        if let Some(column) = self.column {
            config.piezo_column = column;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(boundary) = self.boundary {
            config.boundary = boundary;
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            csv,
            overrides,
            print,
            json,
        } => cmd_run(&csv, &overrides, print, json),
        Commands::Listen {
            bind,
            samples,
            overrides,
            json,
        } => cmd_listen(&bind, samples, &overrides, json),
        Commands::Filter {
            csv,
            column,
            boundary,
        } => cmd_filter(&csv, column, boundary),
        Commands::Models => cmd_models(),
        Commands::Config => cmd_config(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

/// Logs go to stderr so stdout carries only sample output.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(overrides: Option<&Overrides>) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::load().context("loading configuration")?;
    if let Some(overrides) = overrides {
        overrides.apply(&mut config);
        config.validate()?;
    }
    Ok(config)
}

fn registry(config: &PipelineConfig) -> Result<ModelRegistry> {
    let extra = config
        .extra_models
        .iter()
        .map(|(id, model)| (id.clone(), model.clone()));
    Ok(ModelRegistry::with_extra(extra)?)
}

fn select_model(config: &PipelineConfig) -> Result<ModelSelector> {
    let mut selector = ModelSelector::new(Arc::new(registry(config)?));
    selector.select(&config.model)?;
    Ok(selector)
}

fn build_engine(config: &PipelineConfig, cancel: &CancelFlag) -> Result<SharedEngine> {
    let engine: SharedEngine = match config.engine {
        EngineConfig::Identity => {
            tracing::warn!("using identity engine; output is the denormalized model input");
            Arc::new(IdentityEngine)
        }
        #[cfg(feature = "remote")]
        EngineConfig::Remote {
            ref url,
            timeout_secs,
        } => {
            use piezo_infer::engine::{BlockingRemoteEngine, RemoteEngineConfig};

            let remote = BlockingRemoteEngine::new(RemoteEngineConfig {
                url: url.clone(),
                timeout_secs,
                model: config.model.clone(),
            })?;
            match remote.test_connection() {
                Ok(true) => tracing::info!(%url, "inference service reachable"),
                Ok(false) => tracing::warn!(%url, "inference service health check failed"),
                Err(e) => tracing::warn!(%url, "could not reach inference service: {e}"),
            }
            Arc::new(remote)
        }
        #[cfg(not(feature = "remote"))]
        EngineConfig::Remote { .. } => {
            bail!("remote engine configured but the `remote` feature is not enabled")
        }
    };

    Ok(Arc::new(CancellableEngine::new(engine, cancel.clone())))
}

fn cancel_flag() -> CancelFlag {
    let cancel = CancelFlag::new();
    if let Err(e) = cancel.install_ctrlc_handler() {
        tracing::warn!("could not install Ctrl+C handler: {e}");
    }
    cancel
}

fn cmd_run(csv: &Path, overrides: &Overrides, print: bool, json: bool) -> Result<()> {
    let config = load_config(Some(overrides))?;
    let selector = select_model(&config)?;
    let log = create_shared_log();
    let pipeline = OfflinePipeline::with_selector(&config, &selector)?
        .strict(overrides.strict)
        .with_log(log.clone());

    let ingest = ColumnReader::new(config.piezo_column)
        .read_path(csv)
        .with_context(|| format!("reading {}", csv.display()))?;

    let engine = build_engine(&config, &cancel_flag())?;
    let report = pipeline.run_ingest(&ingest, &engine)?;

    emit_report(&report, print, json)?;
    eprintln!();
    eprintln!("{}", log.summary());
    Ok(())
}

fn cmd_listen(bind: &str, samples: Option<usize>, overrides: &Overrides, json: bool) -> Result<()> {
    let config = load_config(Some(overrides))?;
    let selector = select_model(&config)?;
    let log = create_shared_log();
    let pipeline = OfflinePipeline::with_selector(&config, &selector)?
        .strict(overrides.strict)
        .with_log(log.clone());
    let cancel = cancel_flag();

    // The runtime is dropped before inference so a blocking remote engine
    // can start its own.
    let collection = {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(async {
            let listener = tokio::net::TcpListener::bind(bind)
                .await
                .with_context(|| format!("binding {bind}"))?;
            tracing::info!(%bind, "waiting for device connection");
            Ok::<_, anyhow::Error>(collect_tcp(listener, samples, cancel.clone()).await?)
        })?
    };

    if !collection.complete {
        bail!("cancelled after {} samples", collection.samples.len());
    }

    let engine = build_engine(&config, &cancel)?;
    let report = pipeline.run(&collection.values(), &engine)?;
    emit_report(&report, false, json)?;
    eprintln!();
    eprintln!("{}", log.summary());
    Ok(())
}

fn cmd_filter(csv: &Path, column: Option<usize>, boundary: Option<BoundaryMode>) -> Result<()> {
    let config = load_config(None)?;
    let filter = piezo_infer::ZeroPhaseFilter::default()
        .with_boundary(boundary.unwrap_or(config.boundary));

    let ingest = ColumnReader::new(column.unwrap_or(config.piezo_column))
        .read_path(csv)
        .with_context(|| format!("reading {}", csv.display()))?;

    for value in filter.apply(&ingest.samples) {
        println!("{value}");
    }
    Ok(())
}

fn cmd_models() -> Result<()> {
    let config = load_config(None)?;
    let registry = registry(&config)?;

    println!("{:<8} {:>10} {:>10} {:>10}  asset", "model", "v10_sig", "gf_min", "gf_max");
    for (id, model) in registry.iter() {
        println!(
            "{:<8} {:>10} {:>10} {:>10}  {}",
            id, model.v10_sig, model.gf_min, model.gf_max, model.asset
        );
    }
    Ok(())
}

fn cmd_config() -> Result<()> {
    let config = load_config(None)?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", PipelineConfig::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn emit_report(report: &RunReport, print: bool, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else if print {
        for value in &report.output {
            println!("{value}");
        }
    } else {
        println!("Run {} ({})", report.run_id, report.model);
        println!("  Samples: {}", report.samples);
        println!("  Skipped rows: {}", report.skipped_rows);
        println!("  Windows: {}", report.windows);
        println!("  Uncovered tail: {}", report.uncovered_tail);
        if let Some(summary) = report.output_summary {
            println!("  Output: {summary}");
        }
        println!(
            "  Elapsed: {} ms",
            (report.finished_at - report.started_at).num_milliseconds()
        );
    }
    Ok(())
}
