//! Telemetry input CLI
//!
//! Lists the built-in input plugins, prints their sample configuration and
//! runs configured inputs once against their real endpoints.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{gather, plugins};
use input_lib::InputRegistry;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Telemetry input CLI
#[derive(Parser)]
#[command(name = "inputctl")]
#[command(author, version, about = "CLI for telemetry input plugins", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List available input plugins
    Plugins,

    /// Print the sample configuration of an input plugin
    SampleConfig {
        /// Plugin name (e.g. kube_state)
        name: String,
    },

    /// Gather every configured input once and print the records
    Test {
        /// Path to the agent TOML file
        #[arg(long, short, env = "AGENT_CONFIG")]
        config: Option<PathBuf>,

        /// Only run instances of this plugin
        #[arg(long, short)]
        input: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let registry = InputRegistry::builtin();

    match cli.command {
        Commands::Plugins => plugins::list_plugins(&registry, cli.format)?,
        Commands::SampleConfig { name } => plugins::sample_config(&registry, &name)?,
        Commands::Test { config, input } => {
            gather::run_inputs(&registry, config.as_deref(), input.as_deref(), cli.format).await?;
        }
    }

    Ok(())
}
