//! Plugin discovery commands

use anyhow::{bail, Result};
use colored::Colorize;
use input_lib::{InputInfo, InputRegistry};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{print_table, OutputFormat};

/// Row for the plugin table
#[derive(Tabled, Serialize)]
struct PluginRow {
    #[tabled(rename = "Name")]
    name: &'static str,
    #[tabled(rename = "Description")]
    description: &'static str,
}

impl From<InputInfo> for PluginRow {
    fn from(info: InputInfo) -> Self {
        Self {
            name: info.name,
            description: info.description,
        }
    }
}

/// List every built-in input plugin
pub fn list_plugins(registry: &InputRegistry, format: OutputFormat) -> Result<()> {
    let rows: Vec<PluginRow> = registry.infos().into_iter().map(PluginRow::from).collect();

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Table | OutputFormat::Line => {
            println!("{}", "Input Plugins".bold());
            print_table(rows);
        }
    }

    Ok(())
}

/// Print the sample configuration for one plugin as a ready-to-paste table
pub fn sample_config(registry: &InputRegistry, name: &str) -> Result<()> {
    let Some(info) = registry.info(name) else {
        bail!(
            "unknown input plugin '{}' (available: {})",
            name,
            registry.names().join(", ")
        );
    };

    println!("[[inputs.{}]]{}", info.name, info.sample_config);
    Ok(())
}
