//! Accumulation sinks that receive flattened metric records
//!
//! Inputs never know where their records end up: they submit through the
//! [`Accumulator`] trait, which must accept concurrent submissions from
//! several resource-kind tasks at once.

use crate::models::{Fields, Metric, Tags};
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::warn;

/// Sink for metric records produced by an input
pub trait Accumulator: Send + Sync {
    /// Submit one record under `measurement`
    fn add_fields(
        &self,
        measurement: &str,
        fields: Fields,
        tags: Tags,
        timestamp: Option<DateTime<Utc>>,
    );
}

/// Collects records in memory
#[derive(Debug, Default)]
pub struct MemoryAccumulator {
    metrics: Mutex<Vec<Metric>>,
}

impl MemoryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything submitted so far
    pub fn metrics(&self) -> Vec<Metric> {
        self.metrics
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Drain all submitted records
    pub fn take(&self) -> Vec<Metric> {
        self.metrics
            .lock()
            .map(|mut m| std::mem::take(&mut *m))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.metrics.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Accumulator for MemoryAccumulator {
    fn add_fields(
        &self,
        measurement: &str,
        fields: Fields,
        tags: Tags,
        timestamp: Option<DateTime<Utc>>,
    ) {
        let metric = Metric::new(measurement, fields, tags, timestamp);
        match self.metrics.lock() {
            Ok(mut metrics) => metrics.push(metric),
            Err(poisoned) => poisoned.into_inner().push(metric),
        }
    }
}

/// Forwards records into a bounded channel consumed by the output writer
#[derive(Debug, Clone)]
pub struct ChannelAccumulator {
    tx: mpsc::Sender<Metric>,
}

impl ChannelAccumulator {
    /// Create an accumulator and the receiving half of its channel
    pub fn new(buffer_size: usize) -> (Self, mpsc::Receiver<Metric>) {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        (Self { tx }, rx)
    }
}

impl Accumulator for ChannelAccumulator {
    fn add_fields(
        &self,
        measurement: &str,
        fields: Fields,
        tags: Tags,
        timestamp: Option<DateTime<Utc>>,
    ) {
        let metric = Metric::new(measurement, fields, tags, timestamp);
        if let Err(e) = self.tx.try_send(metric) {
            crate::observability::AgentMetrics::new().inc_records_dropped();
            warn!(measurement = %measurement, error = %e, "Dropping metric record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn one_field(value: i64) -> Fields {
        let mut fields = Fields::new();
        fields.insert("value".to_string(), value.into());
        fields
    }

    #[test]
    fn test_memory_accumulator_collects_and_drains() {
        let acc = MemoryAccumulator::new();
        acc.add_fields("m", one_field(1), Tags::new(), None);
        acc.add_fields("m", one_field(2), Tags::new(), None);

        assert_eq!(acc.len(), 2);
        let taken = acc.take();
        assert_eq!(taken.len(), 2);
        assert!(acc.is_empty());
    }

    #[tokio::test]
    async fn test_memory_accumulator_concurrent_submission() {
        let acc = Arc::new(MemoryAccumulator::new());
        let mut handles = Vec::new();

        for i in 0..8 {
            let acc = acc.clone();
            handles.push(tokio::spawn(async move {
                for j in 0..25 {
                    acc.add_fields("m", one_field(i * 100 + j), Tags::new(), None);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(acc.len(), 200);
    }

    #[tokio::test]
    async fn test_channel_accumulator_forwards_records() {
        let (acc, mut rx) = ChannelAccumulator::new(4);
        acc.add_fields("m", one_field(5), Tags::new(), None);

        let metric = rx.recv().await.unwrap();
        assert_eq!(metric.measurement, "m");
        assert_eq!(metric.field("value").and_then(|v| v.as_i64()), Some(5));
    }

    #[test]
    fn test_channel_accumulator_drops_when_full() {
        let (acc, mut rx) = ChannelAccumulator::new(1);
        acc.add_fields("m", one_field(1), Tags::new(), None);
        acc.add_fields("m", one_field(2), Tags::new(), None);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
