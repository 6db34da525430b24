//! Storage Center REST payloads

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Format of `time` on every returned sample
pub const SAMPLE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Format of `StartTime` in a historical filter
const FILTER_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// Volume as returned by `ScVolume/GetList`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScVolume {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub instance_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sc_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub active: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
}

/// One point of `GetHistoricalIoUsage`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScVolumeIoStat {
    #[serde(deserialize_with = "null_as_default")]
    pub time: String,
    #[serde(deserialize_with = "null_as_default")]
    pub sc_name: String,
    // The array has been seen to misspell this key
    #[serde(alias = "instancdId", deserialize_with = "null_as_default")]
    pub instance_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub instance_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub read_iops: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub write_iops: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub total_iops: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub io_pending: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub read_kb_per_second: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub write_kb_per_second: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub total_kb_per_second: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub average_kb_per_io: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub read_latency: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub write_latency: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub xfer_latency: i64,
}

/// One point of `GetHistoricalStorageUsage`
///
/// Capacity figures arrive as `"<n> Bytes"` strings; see [`bytes_string_to_int`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScVolumeStorageUsage {
    #[serde(deserialize_with = "null_as_default")]
    pub time: String,
    #[serde(deserialize_with = "null_as_default")]
    pub active_space: String,
    #[serde(deserialize_with = "null_as_default")]
    pub active_space_on_disk: String,
    #[serde(deserialize_with = "null_as_default")]
    pub actual_space: String,
    #[serde(deserialize_with = "null_as_default")]
    pub configured_space: String,
    #[serde(deserialize_with = "null_as_default")]
    pub estimated_data_reduction_space_savings: String,
    #[serde(deserialize_with = "null_as_default")]
    pub estimated_disk_space_saved_by_compression: String,
    #[serde(deserialize_with = "null_as_default")]
    pub estimated_disk_space_saved_by_deduplication: String,
    #[serde(deserialize_with = "number_or_string")]
    pub estimated_non_deduplicated_to_duplicated_page_ratio: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub estimated_percent_compressed: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub estimated_percent_deduplicated: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub estimated_uncompressed_to_compressed_page_ratio: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub free_space: String,
    #[serde(deserialize_with = "null_as_default")]
    pub instance_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub instance_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub object_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub raid_overhead: String,
    #[serde(deserialize_with = "null_as_default")]
    pub replay_space: String,
    #[serde(deserialize_with = "null_as_default")]
    pub savings_vs_raid_ten: String,
    #[serde(deserialize_with = "null_as_default")]
    pub sc_name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub sc_serial_number: String,
    #[serde(deserialize_with = "null_as_default")]
    pub shared_space: String,
    #[serde(deserialize_with = "null_as_default")]
    pub snapshot_overhead_on_disk: String,
    #[serde(deserialize_with = "null_as_default")]
    pub total_disk_space: String,
}

/// Request body for the historical usage endpoints
#[derive(Debug, Clone, Serialize)]
pub struct HistoricalUsageRequest {
    #[serde(rename = "HistoricalFilter")]
    pub historical_filter: HistoricalFilter,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HistoricalFilter {
    pub max_count_return: u32,
    pub start_time: String,
    pub use_current: bool,
    pub use_end_of_day: bool,
    pub use_start_of_day: bool,
}

impl HistoricalUsageRequest {
    /// Ask for the single most recent point in the last `lookback_minutes`
    pub fn latest(now: DateTime<Utc>, lookback_minutes: i64) -> Self {
        let start = now - Duration::minutes(lookback_minutes);
        Self {
            historical_filter: HistoricalFilter {
                max_count_return: 1,
                start_time: start.format(FILTER_TIME_FORMAT).to_string(),
                use_current: true,
                use_end_of_day: false,
                use_start_of_day: false,
            },
        }
    }
}

/// Convert `"12345 Bytes"` to `12345`.
///
/// Anything without the exact ` Bytes` suffix, or whose remainder is not an
/// integer, becomes `0`. A malformed value is therefore indistinguishable from
/// an empty volume.
pub fn bytes_string_to_int(value: &str) -> i64 {
    value
        .strip_suffix(" Bytes")
        .and_then(|n| n.trim().parse::<i64>().ok())
        .unwrap_or(0)
}

/// The array reports unset properties as `null`; treat them as absent
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
        Null(()),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Number(n) => n,
        Raw::Text(s) => s.trim().trim_end_matches('%').trim().parse().unwrap_or(0.0),
        Raw::Null(()) => 0.0,
    })
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
        Null(()),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
        Raw::Null(()) => String::new(),
    })
}
