//! Dell Storage Center volume statistics
//!
//! Every gather logs in, lists the array's volumes and, for each volume,
//! emits the latest I/O usage point and the latest storage usage point as two
//! `dellstoragecenter` records tagged with the array and volume identity.
//! The pass is strictly sequential and the first failure ends it.

mod connection;
mod models;


pub use connection::{
    ApiConnection, DEFAULT_API_VERSION, IO_USAGE_LOOKBACK_MINUTES, STORAGE_USAGE_LOOKBACK_MINUTES,
};
pub use models::{
    bytes_string_to_int, HistoricalFilter, HistoricalUsageRequest, ScVolume, ScVolumeIoStat,
    ScVolumeStorageUsage, SAMPLE_TIME_FORMAT,
};

use super::{async_trait, parse_table, Input, InputInfo};
use crate::accumulator::Accumulator;
use crate::error::{InputError, Result};
use crate::models::{FieldValue, Fields, Tags};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

pub const PLUGIN_NAME: &str = "dellstoragecenter";

/// Measurement shared by both record shapes
pub const MEASUREMENT: &str = "dellstoragecenter";

pub const INFO: InputInfo = InputInfo {
    name: PLUGIN_NAME,
    description: "Return performance data for all volumes in a Dell Storage Center endpoint.",
    sample_config: SAMPLE_CONFIG,
};

const SAMPLE_CONFIG: &str = r#"
  ## IP address the Data Collector is listening on
  # ip_address = "192.168.192.168"

  ## The port number the Data Collector is listening on
  # port = 3033

  ## Full base URL, overrides ip_address and port
  # base_url = "https://192.168.192.168:3033"

  ## The username to log into the Data Collector with
  # username = "admin"

  ## The password to log into the Data Collector with
  # password = "admin"

  ## Version of the Dell API to use
  # dell-api-version = "4.1"

  ## Interval to poll for stats
  interval = "60s"
"#;

/// `[[inputs.dellstoragecenter]]` options
#[derive(Debug, Clone, Deserialize)]
pub struct StorageCenterConfig {
    #[serde(default)]
    pub ip_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, rename = "dell-api-version")]
    pub api_version: String,
}

fn default_port() -> u16 {
    3033
}

impl StorageCenterConfig {
    /// Base URL of the Data Collector
    pub fn base_url(&self) -> String {
        match &self.base_url {
            Some(url) if !url.is_empty() => url.clone(),
            _ => format!("https://{}:{}", self.ip_address, self.port),
        }
    }
}

/// Storage Center input plugin
pub struct StorageCenter {
    config: StorageCenterConfig,
}

pub(crate) fn factory(table: serde_json::Value) -> Result<Box<dyn Input>> {
    Ok(Box::new(StorageCenter::new(parse_table(table)?)))
}

impl StorageCenter {
    pub fn new(config: StorageCenterConfig) -> Self {
        Self { config }
    }

    /// Run one pass over every volume
    pub async fn gather_volumes(&self, acc: &dyn Accumulator) -> Result<usize> {
        let conn = ApiConnection::new(
            self.config.base_url(),
            self.config.api_version.clone(),
            self.config.username.clone(),
            self.config.password.clone(),
        )?;
        conn.login().await?;

        let volumes = conn.get_volume_list().await?;
        debug!(count = volumes.len(), "Listed Storage Center volumes");

        for volume in &volumes {
            let tags = volume_tags(volume);

            let (fields, timestamp) = gather_io_usage(&conn, volume).await?;
            acc.add_fields(MEASUREMENT, fields, tags.clone(), Some(timestamp));

            let (fields, timestamp) = gather_storage_usage(&conn, volume).await?;
            acc.add_fields(MEASUREMENT, fields, tags, timestamp);
        }

        Ok(volumes.len())
    }
}

#[async_trait]
impl Input for StorageCenter {
    fn name(&self) -> &'static str {
        INFO.name
    }

    fn description(&self) -> &'static str {
        INFO.description
    }

    fn sample_config(&self) -> &'static str {
        INFO.sample_config
    }

    async fn gather(&mut self, acc: &dyn Accumulator) -> Result<()> {
        let volumes = self.gather_volumes(acc).await?;
        info!(
            base_url = %self.config.base_url(),
            volumes = volumes,
            "Gathered Storage Center volume statistics"
        );
        Ok(())
    }
}

fn volume_tags(volume: &ScVolume) -> Tags {
    let mut tags = Tags::new();
    tags.insert("scName".to_string(), volume.sc_name.clone());
    tags.insert("scVolume".to_string(), volume.name.clone());
    tags.insert("instanceId".to_string(), volume.instance_id.clone());
    tags
}

async fn gather_io_usage(
    conn: &ApiConnection,
    volume: &ScVolume,
) -> Result<(Fields, DateTime<Utc>)> {
    let stats = conn.get_volume_io_usage(&volume.instance_id).await?;
    let stat = stats.last().ok_or(InputError::EmptyHistory("I/O usage"))?;

    Ok((io_usage_fields(stat), parse_sample_time(&stat.time)?))
}

/// An empty history yields an empty field set with no timestamp
async fn gather_storage_usage(
    conn: &ApiConnection,
    volume: &ScVolume,
) -> Result<(Fields, Option<DateTime<Utc>>)> {
    let stats = conn.get_volume_storage_usage(&volume.instance_id).await?;
    let Some(stat) = stats.last() else {
        debug!(volume = %volume.name, "No storage usage history for volume");
        return Ok((Fields::new(), None));
    };

    Ok((storage_usage_fields(stat), Some(parse_sample_time(&stat.time)?)))
}

pub fn io_usage_fields(stat: &ScVolumeIoStat) -> Fields {
    let mut fields = Fields::new();
    fields.insert("readIops".into(), stat.read_iops.into());
    fields.insert("writeIops".into(), stat.write_iops.into());
    fields.insert("totalIops".into(), stat.total_iops.into());
    fields.insert("ioPending".into(), stat.io_pending.into());
    fields.insert("readKbPerSecond".into(), stat.read_kb_per_second.into());
    fields.insert("writeKbPerSecond".into(), stat.write_kb_per_second.into());
    fields.insert("totalKbPerSecond".into(), stat.total_kb_per_second.into());
    fields.insert("averageKbPerIo".into(), stat.average_kb_per_io.into());
    fields.insert("readLatency".into(), stat.read_latency.into());
    fields.insert("writeLatency".into(), stat.write_latency.into());
    fields.insert("xferLatency".into(), stat.xfer_latency.into());
    fields
}

pub fn storage_usage_fields(stat: &ScVolumeStorageUsage) -> Fields {
    let bytes = |s: &str| -> FieldValue { bytes_string_to_int(s).into() };

    let mut fields = Fields::new();
    fields.insert("activeSpace".into(), bytes(&stat.active_space));
    fields.insert("activeSpaceOnDisk".into(), bytes(&stat.active_space_on_disk));
    fields.insert("actualSpace".into(), bytes(&stat.actual_space));
    fields.insert("configuredSpace".into(), bytes(&stat.configured_space));
    fields.insert(
        "estimatedDataReductionSpaceSavings".into(),
        bytes(&stat.estimated_data_reduction_space_savings),
    );
    fields.insert(
        "estimatedDiskSpaceSavedByCompression".into(),
        bytes(&stat.estimated_disk_space_saved_by_compression),
    );
    fields.insert(
        "estimatedDiskSpaceSavedByDeduplicated".into(),
        bytes(&stat.estimated_disk_space_saved_by_deduplication),
    );
    fields.insert(
        "estimatedNonDeduplicatedToDuplicatedPageRatio".into(),
        stat.estimated_non_deduplicated_to_duplicated_page_ratio.into(),
    );
    fields.insert(
        "estimatedPercentCompressed".into(),
        stat.estimated_percent_compressed.into(),
    );
    fields.insert(
        "estimatedPercentDeduplicated".into(),
        stat.estimated_percent_deduplicated.into(),
    );
    fields.insert(
        "estimatedUncompressedToCompressedPageRatio".into(),
        stat.estimated_uncompressed_to_compressed_page_ratio.into(),
    );
    fields.insert("freeSpace".into(), bytes(&stat.free_space));
    fields.insert("instanceId".into(), stat.instance_id.clone().into());
    fields.insert("instanceName".into(), stat.instance_name.clone().into());
    fields.insert("name".into(), stat.name.clone().into());
    fields.insert("objectType".into(), stat.object_type.clone().into());
    fields.insert("raidOverhead".into(), bytes(&stat.raid_overhead));
    fields.insert("replaySpace".into(), bytes(&stat.replay_space));
    fields.insert("savingsVsRaidTen".into(), bytes(&stat.savings_vs_raid_ten));
    fields.insert("scName".into(), stat.sc_name.clone().into());
    fields.insert("scSerialNumber".into(), stat.sc_serial_number.clone().into());
    fields.insert("sharedSpace".into(), bytes(&stat.shared_space));
    fields.insert(
        "snapshotOverheadOnDisk".into(),
        bytes(&stat.snapshot_overhead_on_disk),
    );
    fields.insert("time".into(), stat.time.clone().into());
    fields.insert("totalDiskSpace".into(), bytes(&stat.total_disk_space));
    fields
}

/// Parse a sample's `time` (`2006-01-02T15:04:05Z` layout)
pub fn parse_sample_time(value: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, SAMPLE_TIME_FORMAT)
        .map(|t| t.and_utc())
        .map_err(|source| InputError::Timestamp {
            value: value.to_string(),
            source,
        })
}
