//! Core data models for gathered metrics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Tag set attached to a metric record
pub type Tags = BTreeMap<String, String>;

/// Field set attached to a metric record
pub type Fields = BTreeMap<String, FieldValue>;

/// A single field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl FieldValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            FieldValue::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(v.into())
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::UInt(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::UInt(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Str(v) => write!(f, "{}", v),
        }
    }
}

/// A flattened metric record as submitted to an accumulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub measurement: String,
    pub tags: Tags,
    pub fields: Fields,
    /// Sample time. `None` is the zero timestamp: the record carries no time of its own.
    pub timestamp: Option<DateTime<Utc>>,
}

impl Metric {
    pub fn new(
        measurement: impl Into<String>,
        fields: Fields,
        tags: Tags,
        timestamp: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            measurement: measurement.into(),
            tags,
            fields,
            timestamp,
        }
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Render as Influx line protocol.
    ///
    /// Returns `None` for a record without fields, which line protocol cannot express.
    pub fn to_line_protocol(&self) -> Option<String> {
        if self.fields.is_empty() {
            return None;
        }

        let mut line = escape(&self.measurement, &[',', ' ']);

        for (key, value) in &self.tags {
            if value.is_empty() {
                continue;
            }
            let _ = write!(
                line,
                ",{}={}",
                escape(key, &[',', '=', ' ']),
                escape(value, &[',', '=', ' '])
            );
        }

        line.push(' ');
        let mut first = true;
        for (key, value) in &self.fields {
            if !first {
                line.push(',');
            }
            first = false;
            line.push_str(&escape(key, &[',', '=', ' ']));
            line.push('=');
            match value {
                FieldValue::Int(v) => {
                    let _ = write!(line, "{}i", v);
                }
                FieldValue::UInt(v) => {
                    let _ = write!(line, "{}u", v);
                }
                FieldValue::Float(v) => {
                    let _ = write!(line, "{}", v);
                }
                FieldValue::Bool(v) => {
                    let _ = write!(line, "{}", v);
                }
                FieldValue::Str(v) => {
                    let _ = write!(line, "\"{}\"", escape(v, &['"', '\\']));
                }
            }
        }

        if let Some(ts) = self.timestamp.and_then(|t| t.timestamp_nanos_opt()) {
            let _ = write!(line, " {}", ts);
        }

        Some(line)
    }
}

fn escape(value: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
