//! Agent and input configuration
//!
//! The agent reads a TOML file layered with `AGENT__*` environment variables:
//!
//! ```toml
//! [agent]
//! interval = "60s"
//!
//! [[inputs.dellstoragecenter]]
//! ip_address = "192.168.192.168"
//! username = "admin"
//! password = "admin"
//! ```
//!
//! Each `[[inputs.<name>]]` table is handed verbatim to the plugin factory
//! registered under `<name>`.

use crate::error::{InputError, Result};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Default config file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/telemetry-agent/agent.toml";

/// Top-level agent configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub agent: AgentSection,

    /// Plugin name -> one table per configured instance
    #[serde(default)]
    pub inputs: BTreeMap<String, Vec<serde_json::Value>>,
}

/// `[agent]` section
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSection {
    /// Default gather interval for every input
    #[serde(default = "default_interval", deserialize_with = "deserialize_duration")]
    pub interval: Duration,

    /// Maximum random delay added to each interval
    #[serde(default = "default_jitter", deserialize_with = "deserialize_duration")]
    pub jitter: Duration,

    /// Port for the health/metrics API
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Value of the `host` tag added to every record
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Do not add the `host` tag
    #[serde(default)]
    pub omit_hostname: bool,

    /// Records buffered between inputs and the output writer
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            jitter: default_jitter(),
            api_port: default_api_port(),
            hostname: default_hostname(),
            omit_hostname: false,
            buffer_size: default_buffer_size(),
        }
    }
}

fn default_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_jitter() -> Duration {
    Duration::from_secs(1)
}

fn default_api_port() -> u16 {
    8080
}

fn default_hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_buffer_size() -> usize {
    10_000
}

/// Settings every input table may carry in addition to its plugin options
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputSettings {
    #[serde(default, deserialize_with = "deserialize_optional_duration")]
    pub interval: Option<Duration>,
}

impl InputSettings {
    pub fn from_table(table: &serde_json::Value) -> Result<Self> {
        serde_json::from_value(table.clone()).map_err(|e| InputError::Config(e.to_string()))
    }
}

impl AgentConfig {
    /// Load configuration from an optional file plus `AGENT__*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        } else {
            builder = builder.add_source(
                config::File::with_name(DEFAULT_CONFIG_PATH)
                    .format(config::FileFormat::Toml)
                    .required(false),
            );
        }

        let config = builder
            .add_source(config::Environment::with_prefix("AGENT").separator("__"))
            .build()
            .map_err(|e| InputError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| InputError::Config(e.to_string()))
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        config::Config::builder()
            .add_source(config::File::from_str(contents, config::FileFormat::Toml))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| InputError::Config(e.to_string()))
    }

    /// Number of configured input instances
    pub fn input_count(&self) -> usize {
        self.inputs.values().map(Vec::len).sum()
    }
}

/// Accept either a humantime string (`"5s"`, `"1h"`) or a number of seconds
pub fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Secs(u64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Text(s) => humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom),
        Raw::Secs(secs) => Ok(Duration::from_secs(secs)),
    }
}

pub fn deserialize_optional_duration<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "deserialize_duration")] Duration);

    Option::<Wrapper>::deserialize(deserializer).map(|w| w.map(|Wrapper(d)| d))
}
