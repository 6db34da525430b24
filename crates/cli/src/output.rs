//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use input_lib::Metric;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// Influx line protocol, as the agent writes it
    Line,
}

/// Row for the records table
#[derive(Tabled)]
pub struct MetricRow {
    #[tabled(rename = "Measurement")]
    measurement: String,
    #[tabled(rename = "Tags")]
    tags: String,
    #[tabled(rename = "Fields")]
    fields: String,
    #[tabled(rename = "Time")]
    time: String,
}

impl From<&Metric> for MetricRow {
    fn from(metric: &Metric) -> Self {
        Self {
            measurement: metric.measurement.clone(),
            tags: join_pairs(metric.tags.iter()),
            fields: join_pairs(metric.fields.iter()),
            time: metric
                .timestamp
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

fn join_pairs<K, V>(pairs: impl Iterator<Item = (K, V)>) -> String
where
    K: std::fmt::Display,
    V: std::fmt::Display,
{
    pairs
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Print gathered records in the requested format
pub fn print_metrics(metrics: &[Metric], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if metrics.is_empty() {
                println!("{}", "No records gathered".yellow());
                return;
            }
            let rows: Vec<MetricRow> = metrics.iter().map(MetricRow::from).collect();
            let table = Table::new(rows).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(metrics) {
                println!("{}", json);
            }
        }
        OutputFormat::Line => {
            for line in metrics.iter().filter_map(Metric::to_line_protocol) {
                println!("{}", line);
            }
        }
    }
}

/// Print a table from a list of items
pub fn print_table<T: Tabled>(items: Vec<T>) {
    let table = Table::new(items).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print a success message
pub fn print_success(message: &str) {
    eprintln!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message);
}
