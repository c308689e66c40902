// src/main.rs
//! Traffic Replay CLI
//!
//! Drives replays of persisted records against a candidate deployment and
//! inspects the record store.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use traffic_replay_engine::codec::SerdeRegistry;
use traffic_replay_engine::model::ProtocolTag;
use traffic_replay_engine::observability::{init_metrics, init_tracing};
use traffic_replay_engine::orchestrator::ModeOrchestrator;
use traffic_replay_engine::replay::{
    ExecutorRegistry, ExportFormat, Exporter, HttpReplayExecutor, TargetTable,
};
use traffic_replay_engine::sink::{SinkPort, SqliteSink, StorageConfig};
use traffic_replay_engine::utils::config::EngineConfig;
use traffic_replay_engine::TestRecord;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "traffic-replay", version, about = "Replay captured traffic against candidate builds")]
struct Cli {
    /// Configuration file (defaults to ./traffic-replay.{yaml,toml,json})
    #[arg(long, global = true, env = "REPLAY_CONFIG")]
    config: Option<PathBuf>,

    /// Expose Prometheus metrics while running
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay records against a configured target and compare responses
    Replay {
        /// Client id of the replay target
        #[arg(long)]
        target: String,

        /// Record ids to replay
        #[arg(long = "id", required_unless_present = "all")]
        ids: Vec<String>,

        /// Replay every stored record
        #[arg(long, conflicts_with = "ids")]
        all: bool,

        /// Report format: json or junit
        #[arg(long, default_value = "json")]
        format: String,

        /// Write the report here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Print record store statistics
    Stats,

    /// Print a stored record and its last replay result
    Show {
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => EngineConfig::load().context("failed to load configuration")?,
    };

    init_tracing(&config.logging)?;
    if cli.metrics {
        init_metrics()?;
    }

    info!("Traffic replay v{}", traffic_replay_engine::VERSION);

    let sink = Arc::new(SqliteSink::new(StorageConfig::from(config.storage.clone())).await?);

    match cli.command {
        Command::Replay {
            target,
            ids,
            all,
            format,
            output,
        } => {
            let format: ExportFormat = format.parse()?;
            run_replay(&config, sink, &target, ids, all, format, output).await
        }
        Command::Stats => {
            let stats = sink.stats().await?;
            println!("records:  {}", stats.total_records);
            println!("bytes:    {}", stats.total_size_bytes);
            println!("results:  {}", stats.total_results);
            Ok(())
        }
        Command::Show { id } => {
            let serde = SerdeRegistry::from_settings(&config.codecs);
            let record: TestRecord = serde.decode(&sink.read(&id).await?)?;
            println!("{}", serde_json::to_string_pretty(&record)?);

            match sink.read_result(&id).await? {
                Some(result) => println!("{}", result),
                None => println!("(not replayed yet)"),
            }
            Ok(())
        }
    }
}

async fn run_replay(
    config: &EngineConfig,
    sink: Arc<SqliteSink>,
    target: &str,
    ids: Vec<String>,
    all: bool,
    format: ExportFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let targets = Arc::new(TargetTable::from_settings(&config.targets)?);
    if targets.lookup(target).is_err() {
        bail!(
            "unknown target '{}', configured: {}",
            target,
            targets.client_ids().join(", ")
        );
    }

    let executors = Arc::new(ExecutorRegistry::new());
    executors.register(
        ProtocolTag::Http,
        Arc::new(HttpReplayExecutor::new(Arc::clone(&targets))),
    );

    let ids = if all { sink.list_ids().await? } else { ids };
    if ids.is_empty() {
        warn!("No records to replay");
        return Ok(());
    }

    let orchestrator = ModeOrchestrator::from_config(config, sink as Arc<dyn SinkPort>, executors)?;

    let mut reports = Vec::new();
    let mut errors = 0usize;
    for (id, result) in orchestrator.replay_many(&ids, target).await {
        match result {
            Ok(report) => reports.push(report),
            Err(e) => {
                error!("{}: {}", id, e);
                errors += 1;
            }
        }
    }

    let rendered = Exporter::new(format).export(&reports)?;
    match output {
        Some(path) => {
            tokio::fs::write(&path, rendered)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("Report written to {}", path.display());
        }
        None => println!("{}", rendered),
    }

    let failed = reports.iter().filter(|r| !r.passed).count();
    info!(
        "{} replayed, {} failed, {} errored",
        reports.len(),
        failed,
        errors
    );

    if failed > 0 || errors > 0 {
        bail!("{} of {} replays did not pass", failed + errors, reports.len() + errors);
    }
    Ok(())
}
