use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::Layer;

use wager_core::domain::ConductorError;
use wager_core::impls::{
    FileDatasetStore, FileOddsSource, FileResultSource, InMemorySnapshotStore, LogSink,
    LogisticFactory,
};
use wager_core::ports::Capabilities;
use wager_core::stages::{CollectorInput, QualityReviewerInput, ReviewMode};
use wager_core::{Conductor, FaultPolicy, PipelineConfig};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Run one value-bet pipeline pass over a data directory.
#[derive(Debug, Parser)]
#[command(name = "wager", version)]
struct Cli {
    /// JSON pipeline config; missing keys take their defaults.
    #[arg(short, long, env = "WAGER_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding datasets, odds and results.
    #[arg(long, env = "WAGER_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    #[arg(long, env = "INITIAL_BUDGET")]
    initial_budget: Option<f64>,

    #[arg(long, env = "CRITICAL_BUDGET")]
    critical_budget: Option<f64>,

    /// Pause length when the budget is critical.
    #[arg(long, env = "COOLDOWN_SECS")]
    cooldown_secs: Option<u64>,

    /// Odds sources, comma separated (overrides the config).
    #[arg(long, value_delimiter = ',')]
    sources: Option<Vec<String>>,

    /// Also settle earlier predictions against `results.json`.
    #[arg(long)]
    verify_results: bool,

    /// Stop the run on the first uncontained stage fault.
    #[arg(long)]
    abort_on_fault: bool,

    #[arg(long)]
    max_envelopes: Option<usize>,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.log_format)?;

    let config = load_config(&cli).await?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %cli.data_dir.display(),
        sources = ?config.sources,
        "wager starting"
    );

    let caps = build_capabilities(&cli, &config);
    let mut conductor = Conductor::new(config, caps).context("invalid pipeline config")?;

    conductor
        .submit_input(&CollectorInput::default())
        .context("submit collector")?;
    if cli.verify_results {
        conductor
            .submit_input(&QualityReviewerInput {
                review_type: ReviewMode::ResultVerification,
                predictions: Vec::new(),
            })
            .context("submit result verification")?;
    }

    let report = match conductor.run().await {
        Ok(report) => report,
        Err(e @ ConductorError::RunAborted { .. }) => {
            error!(error = %e, "run aborted");
            conductor.report()
        }
        Err(e) => return Err(e).context("run failed"),
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("encode run report")?
    );
    Ok(())
}

async fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("read config {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parse config {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };

    if let Some(v) = cli.initial_budget {
        config.initial_budget = v;
    }
    if let Some(v) = cli.critical_budget {
        config.critical_budget = v;
    }
    if let Some(secs) = cli.cooldown_secs {
        config.cooldown_ms = secs.saturating_mul(1000);
    }
    if let Some(sources) = &cli.sources {
        config.sources = sources.clone();
    }
    if cli.abort_on_fault {
        config.fault_policy = FaultPolicy::Abort;
    }
    if cli.max_envelopes.is_some() {
        config.max_envelopes = cli.max_envelopes;
    }
    Ok(config)
}

fn build_capabilities(cli: &Cli, config: &PipelineConfig) -> Capabilities {
    let sink = Arc::new(LogSink);
    let mut caps = Capabilities::new(
        Arc::new(LogisticFactory),
        Arc::new(FileDatasetStore::new(&cli.data_dir)),
    )
    .with_results(Arc::new(FileResultSource::new(&cli.data_dir)))
    .with_notifier(sink.clone())
    .with_dashboard(sink)
    .with_snapshots(Arc::new(InMemorySnapshotStore::default()));

    for name in &config.sources {
        caps = caps.with_odds_source(Arc::new(FileOddsSource::new(name.as_str(), &cli.data_dir)));
    }
    caps
}

fn init_logging(format: LogFormat) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries the run report.
    let fmt_layer = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().with_writer(std::io::stderr).boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;
    Ok(())
}
