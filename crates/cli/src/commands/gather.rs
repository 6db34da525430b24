//! Run configured inputs once and print what they gather

use anyhow::{bail, Context, Result};
use colored::Colorize;
use input_lib::{config::AgentConfig, InputRegistry, MemoryAccumulator};
use std::path::Path;
use std::time::Instant;

use crate::output::{print_error, print_metrics, print_success, print_warning, OutputFormat};

/// Gather every configured input instance once, optionally only the named plugin
pub async fn run_inputs(
    registry: &InputRegistry,
    config_path: Option<&Path>,
    only: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let config = AgentConfig::load(config_path).context("failed to load agent configuration")?;

    if let Some(name) = only {
        if !registry.contains(name) {
            bail!("unknown input plugin '{}'", name);
        }
    }

    let selected: Vec<_> = config
        .inputs
        .iter()
        .filter(|(name, _)| only.map_or(true, |o| o == name.as_str()))
        .flat_map(|(name, tables)| {
            tables
                .iter()
                .enumerate()
                .map(move |(index, table)| (name.as_str(), index, table))
        })
        .collect();

    if selected.is_empty() {
        print_warning("No matching inputs configured");
        return Ok(());
    }

    let mut failed = 0;
    for (name, index, table) in selected {
        let label = format!("inputs.{}[{}]", name, index);
        let mut input = match registry.create(name, table.clone()) {
            Ok(input) => input,
            Err(e) => {
                print_error(&format!("{}: {}", label, e));
                failed += 1;
                continue;
            }
        };

        let acc = MemoryAccumulator::new();
        let start = Instant::now();
        let result = input.gather(&acc).await;
        let elapsed = start.elapsed();

        // Partial results are still worth showing
        let records = acc.take();
        print_metrics(&records, format);

        match result {
            Ok(()) => print_success(&format!(
                "{}: {} records in {:.2?}",
                label.cyan(),
                records.len(),
                elapsed
            )),
            Err(e) => {
                print_error(&format!("{}: {}", label, e));
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} input(s) failed", failed);
    }
    Ok(())
}
