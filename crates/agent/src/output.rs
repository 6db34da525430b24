//! Line-protocol output writer
//!
//! Drains the record channel shared by every gather loop, stamps the `host`
//! tag and writes one line per record. Ends when every sender is dropped.

use input_lib::health::{components, HealthRegistry};
use input_lib::Metric;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub struct OutputWriter<W> {
    rx: mpsc::Receiver<Metric>,
    writer: W,
    host: Option<String>,
    health: HealthRegistry,
    written: u64,
}

impl<W: AsyncWrite + Unpin + Send> OutputWriter<W> {
    /// `host` is `None` when the host tag is omitted
    pub fn new(
        rx: mpsc::Receiver<Metric>,
        writer: W,
        host: Option<String>,
        health: HealthRegistry,
    ) -> Self {
        Self {
            rx,
            writer,
            host,
            health,
            written: 0,
        }
    }

    /// Write until the channel closes, returning the number of lines written
    pub async fn run(mut self) -> std::io::Result<u64> {
        self.health.register(components::OUTPUT).await;

        while let Some(metric) = self.rx.recv().await {
            if let Err(e) = self.write_metric(metric).await {
                warn!(error = %e, "Output write failed");
                self.health
                    .set_unhealthy(components::OUTPUT, e.to_string())
                    .await;
                return Err(e);
            }
        }

        self.writer.flush().await?;
        info!(lines = self.written, "Output writer drained");
        Ok(self.written)
    }

    /// Stamp and write a single record; records without fields are skipped
    pub async fn write_metric(&mut self, mut metric: Metric) -> std::io::Result<bool> {
        if let Some(host) = &self.host {
            metric
                .tags
                .entry("host".to_string())
                .or_insert_with(|| host.clone());
        }

        let Some(line) = metric.to_line_protocol() else {
            debug!(measurement = %metric.measurement, "Skipping record without fields");
            return Ok(false);
        };

        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        self.written += 1;
        Ok(true)
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
