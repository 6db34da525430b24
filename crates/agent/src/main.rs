//! Telemetry Agent - runs storage-array and cluster-state inputs
//!
//! Loads the agent configuration, starts one gather loop per configured
//! input instance and writes every record to stdout as line protocol.

use anyhow::{Context, Result};
use clap::Parser;
use input_lib::{
    config::{AgentConfig, InputSettings},
    health::HealthRegistry,
    observability::{AgentMetrics, StructuredLogger},
    Accumulator, ChannelAccumulator, GatherLoop, GatherLoopBuilder, InputRegistry,
};
use std::path::PathBuf;
use std::sync::Arc;
use telemetry_agent::{api, output::OutputWriter};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "telemetry-agent", version, about = "Runs telemetry input plugins")]
struct Args {
    /// Path to the agent TOML file
    #[arg(long, short, env = "AGENT_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let args = Args::parse();
    info!("Starting telemetry-agent");

    let config = AgentConfig::load(args.config.as_deref())
        .context("failed to load agent configuration")?;
    info!(
        hostname = %config.agent.hostname,
        inputs = config.input_count(),
        "Agent configured"
    );

    let health_registry = HealthRegistry::new();
    let metrics = AgentMetrics::new();
    let logger = StructuredLogger::new(&config.agent.hostname);

    let (accumulator, records_rx) = ChannelAccumulator::new(config.agent.buffer_size);
    let accumulator: Arc<dyn Accumulator> = Arc::new(accumulator);

    let loops = build_loops(&config, accumulator, &health_registry)?;
    if loops.is_empty() {
        warn!("No inputs configured");
    }
    metrics.set_inputs_configured(loops.len() as i64);
    logger.log_startup(AGENT_VERSION, loops.len());

    let host = (!config.agent.omit_hostname).then(|| config.agent.hostname.clone());
    let writer = OutputWriter::new(
        records_rx,
        tokio::io::stdout(),
        host,
        health_registry.clone(),
    );
    let output_handle = tokio::spawn(writer.run());

    let (shutdown_tx, _) = broadcast::channel(1);
    let loop_handles: Vec<_> = loops
        .into_iter()
        .map(|gather_loop| tokio::spawn(gather_loop.run(shutdown_tx.subscribe())))
        .collect();

    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics.clone()));
    health_registry.set_ready(true).await;
    let api_handle = tokio::spawn(api::serve(config.agent.api_port, app_state));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    logger.log_shutdown("SIGINT received");

    let _ = shutdown_tx.send(());
    for handle in loop_handles {
        handle.await.context("gather loop panicked")?;
    }

    // Every accumulator handle is gone now, so the writer drains and stops
    let lines = output_handle
        .await
        .context("output writer panicked")?
        .context("output writer failed")?;
    info!(lines = lines, "Shutting down");

    api_handle.abort();
    Ok(())
}

/// One gather loop per `[[inputs.<name>]]` table
fn build_loops(
    config: &AgentConfig,
    accumulator: Arc<dyn Accumulator>,
    health_registry: &HealthRegistry,
) -> Result<Vec<GatherLoop>> {
    let registry = InputRegistry::builtin();
    let mut loops = Vec::new();

    for (name, tables) in &config.inputs {
        for (index, table) in tables.iter().enumerate() {
            let settings = InputSettings::from_table(table)
                .with_context(|| format!("invalid settings for inputs.{}[{}]", name, index))?;
            let input = registry
                .create(name, table.clone())
                .with_context(|| format!("failed to create inputs.{}[{}]", name, index))?;

            let gather_loop = GatherLoopBuilder::new()
                .input(input)
                .accumulator(accumulator.clone())
                .health(health_registry.clone())
                .index(index)
                .interval(settings.interval.unwrap_or(config.agent.interval))
                .jitter(config.agent.jitter)
                .hostname(&config.agent.hostname)
                .build()?;
            loops.push(gather_loop);
        }
    }

    Ok(loops)
}
