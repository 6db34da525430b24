//! Per-input gather loop
//!
//! Calls one input's `gather` on its interval (plus jitter), records latency,
//! error and record-count metrics, and keeps the input's health component
//! current. A failed gather is logged and retried on the next tick.

use crate::accumulator::Accumulator;
use crate::error::{InputError, Result};
use crate::health::{components, HealthRegistry};
use crate::inputs::Input;
use crate::models::{Fields, Tags};
use crate::observability::{AgentMetrics, StructuredLogger};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::info;

/// Scheduling for one gather loop
#[derive(Debug, Clone)]
pub struct GatherConfig {
    /// Time between gathers (default: 60 seconds)
    pub interval: Duration,
    /// Maximum jitter added to each interval (default: 1 second)
    pub jitter: Duration,
}

impl Default for GatherConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            jitter: Duration::from_secs(1),
        }
    }
}

/// Outcome of a single gather call
#[derive(Debug)]
pub struct GatherReport {
    pub records: usize,
    pub elapsed: Duration,
    pub result: Result<()>,
}

/// Drives one input instance until shutdown
pub struct GatherLoop {
    input: Box<dyn Input>,
    accumulator: Arc<dyn Accumulator>,
    component: String,
    config: GatherConfig,
    health: HealthRegistry,
    metrics: AgentMetrics,
    logger: StructuredLogger,
}

impl GatherLoop {
    pub fn name(&self) -> &'static str {
        self.input.name()
    }

    /// Health component this loop reports under
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Gather immediately, then on every interval until `shutdown` fires
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            input = self.name(),
            interval_secs = self.config.interval.as_secs(),
            "Starting gather loop"
        );
        self.health.register(&self.component).await;

        loop {
            self.gather_once().await;

            tokio::select! {
                _ = tokio::time::sleep(self.current_interval()) => {}
                _ = shutdown.recv() => {
                    info!(input = self.name(), "Shutting down gather loop");
                    break;
                }
            }
        }
    }

    /// Run one gather and record its outcome
    pub async fn gather_once(&mut self) -> GatherReport {
        let name = self.input.name();
        let counting = CountingAccumulator::new(self.accumulator.as_ref());

        let start = Instant::now();
        let result = self.input.gather(&counting).await;
        let elapsed = start.elapsed();
        let records = counting.count();

        self.metrics
            .observe_gather_duration(name, elapsed.as_secs_f64());
        self.metrics.add_records_gathered(name, records as u64);

        match &result {
            Ok(()) => self.logger.log_gather_completed(name, records, elapsed),
            Err(e) => {
                self.metrics.inc_gather_errors(name);
                self.logger.log_gather_failed(name, records, &e.to_string());
            }
        }

        self.health
            .record_gather(&self.component, &result, records)
            .await;

        GatherReport {
            records,
            elapsed,
            result,
        }
    }

    fn current_interval(&self) -> Duration {
        let jitter_ms = rand_jitter(self.config.jitter.as_millis() as u64);
        self.config.interval + Duration::from_millis(jitter_ms)
    }
}

/// Counts records on their way to the real accumulator
struct CountingAccumulator<'a> {
    inner: &'a dyn Accumulator,
    count: AtomicUsize,
}

impl<'a> CountingAccumulator<'a> {
    fn new(inner: &'a dyn Accumulator) -> Self {
        Self {
            inner,
            count: AtomicUsize::new(0),
        }
    }

    fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

impl Accumulator for CountingAccumulator<'_> {
    fn add_fields(
        &self,
        measurement: &str,
        fields: Fields,
        tags: Tags,
        timestamp: Option<DateTime<Utc>>,
    ) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.inner.add_fields(measurement, fields, tags, timestamp);
    }
}

/// Generate a random jitter value between 0 and max_ms
fn rand_jitter(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }

    // Time-seeded; only needs to spread loops apart
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;

    now % max_ms
}

/// Builder for creating a gather loop
pub struct GatherLoopBuilder {
    input: Option<Box<dyn Input>>,
    accumulator: Option<Arc<dyn Accumulator>>,
    health: Option<HealthRegistry>,
    index: usize,
    config: GatherConfig,
    hostname: String,
}

impl GatherLoopBuilder {
    pub fn new() -> Self {
        Self {
            input: None,
            accumulator: None,
            health: None,
            index: 0,
            config: GatherConfig::default(),
            hostname: String::new(),
        }
    }

    pub fn input(mut self, input: Box<dyn Input>) -> Self {
        self.input = Some(input);
        self
    }

    pub fn accumulator(mut self, accumulator: Arc<dyn Accumulator>) -> Self {
        self.accumulator = Some(accumulator);
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Position of this instance among inputs of the same plugin
    pub fn index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.config.jitter = jitter;
        self
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn build(self) -> Result<GatherLoop> {
        let input = self
            .input
            .ok_or_else(|| InputError::Config("gather loop needs an input".to_string()))?;
        let accumulator = self
            .accumulator
            .ok_or_else(|| InputError::Config("gather loop needs an accumulator".to_string()))?;

        Ok(GatherLoop {
            component: components::input(input.name(), self.index),
            input,
            accumulator,
            config: self.config,
            health: self.health.unwrap_or_default(),
            metrics: AgentMetrics::new(),
            logger: StructuredLogger::new(self.hostname),
        })
    }
}

impl Default for GatherLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
