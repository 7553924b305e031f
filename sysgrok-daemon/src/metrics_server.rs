//! Prometheus metrics endpoint and the daemon-side gauge sampler.
//!
//! The pipeline and publisher crates update their counters inline. Values
//! that only exist as live state (ingest queue depth, pending deliveries,
//! the publisher's disabled flag) are read here on a fixed interval and
//! exported as gauges.
//!
//! # Usage
//!
//! ```ignore
//! install_metrics_recorder(&config.metrics)?;
//! let sampler = MetricsSampler::new(Instant::now())
//!     .with_queue(pipeline.subscribe_queue())
//!     .with_accounting(service.publisher().accounting());
//! let task = sampler.spawn(Duration::from_secs(10), shutdown_tx.subscribe());
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use sysgrok_core::config::MetricsConfig;
use sysgrok_core::metrics as m;
use sysgrok_queue_publisher::DeliveryAccounting;
use sysgrok_syslog_pipeline::IngestQueue;

/// Install the global metrics recorder and start the HTTP listener.
///
/// The classify-duration histogram is exported with the buckets from
/// [`sysgrok_core::metrics::CLASSIFY_DURATION_BUCKETS`]. Call once per process.
///
/// # Errors
///
/// - The endpoint is not `/metrics`
/// - Socket address is invalid or binding fails
/// - Global recorder is already installed
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<()> {
    if config.endpoint != "/metrics" {
        return Err(anyhow::anyhow!(
            "unsupported metrics endpoint '{}': only '/metrics' is served",
            config.endpoint
        ));
    }

    let addr: SocketAddr = format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics listen address: {}", e))?;

    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint listens on all interfaces"
        );
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(m::SYSLOG_CLASSIFY_DURATION_SECONDS.to_owned()),
            m::CLASSIFY_DURATION_BUCKETS,
        )
        .map_err(|e| anyhow::anyhow!("invalid classify duration buckets: {}", e))?
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {}", e))?;

    m::describe_all();

    tracing::info!(listen_addr = %addr, "prometheus metrics endpoint active");
    Ok(())
}

/// Record build info and the number of registered plugins.
pub fn record_daemon_info(plugin_count: usize) {
    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);

    #[allow(clippy::cast_precision_loss)]
    metrics::gauge!(m::DAEMON_PLUGINS_REGISTERED).set(plugin_count as f64);

    tracing::debug!(
        plugin_count = plugin_count,
        version = env!("CARGO_PKG_VERSION"),
        "daemon info recorded"
    );
}

/// Values read by one sampler pass.
///
/// Fields are `None` when the corresponding plugin is disabled or, for
/// the queue, when the pipeline is not running.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub queue_depth: Option<usize>,
    pub queue_utilization: Option<f64>,
    pub publisher_disabled: Option<bool>,
    pub pending_deliveries: Option<u64>,
}

/// Periodic reader of live pipeline and publisher state.
pub struct MetricsSampler {
    start_time: Instant,
    queue: Option<watch::Receiver<Option<IngestQueue>>>,
    accounting: Option<Arc<DeliveryAccounting>>,
}

impl MetricsSampler {
    pub fn new(start_time: Instant) -> Self {
        Self {
            start_time,
            queue: None,
            accounting: None,
        }
    }

    /// Sample the ingest queue published by the syslog pipeline.
    pub fn with_queue(mut self, queue: watch::Receiver<Option<IngestQueue>>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Sample the publisher's delivery accounting.
    pub fn with_accounting(mut self, accounting: Arc<DeliveryAccounting>) -> Self {
        self.accounting = Some(accounting);
        self
    }

    /// Read the current values without touching the recorder.
    pub fn sample(&self) -> MetricsSnapshot {
        let (queue_depth, queue_utilization) = self
            .queue
            .as_ref()
            .and_then(|rx| {
                rx.borrow()
                    .as_ref()
                    .map(|queue| (queue.len(), queue.utilization()))
            })
            .unzip();

        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            queue_depth,
            queue_utilization,
            publisher_disabled: self.accounting.as_ref().map(|a| a.is_disabled()),
            pending_deliveries: self.accounting.as_ref().map(|a| a.pending_delivered()),
        }
    }

    /// Sample and export the values as gauges.
    #[allow(clippy::cast_precision_loss)]
    pub fn record(&self) -> MetricsSnapshot {
        let snapshot = self.sample();

        metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(snapshot.uptime_secs as f64);
        if let Some(depth) = snapshot.queue_depth {
            metrics::gauge!(m::SYSLOG_QUEUE_DEPTH).set(depth as f64);
        }
        if let Some(utilization) = snapshot.queue_utilization {
            metrics::gauge!(m::SYSLOG_QUEUE_UTILIZATION).set(utilization);
        }
        if let Some(disabled) = snapshot.publisher_disabled {
            metrics::gauge!(m::PUBLISHER_DISABLED).set(if disabled { 1.0 } else { 0.0 });
        }
        if let Some(pending) = snapshot.pending_deliveries {
            metrics::gauge!(m::PUBLISHER_PENDING_DELIVERIES).set(pending as f64);
        }

        snapshot
    }

    /// Record on every `period` until shutdown is broadcast.
    pub fn spawn(
        self,
        period: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.record();
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("metrics sampler shutting down");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use sysgrok_queue_publisher::{DeliveryReporter, DeliveryTag};
    use sysgrok_syslog_pipeline::{RawMessage, ingest_channel};

    fn tag() -> DeliveryTag {
        DeliveryTag {
            key: "latency_parser".to_owned(),
            partition: 0,
            generation: "gen-1".to_owned(),
        }
    }

    #[test]
    fn test_sample_without_sources_reports_uptime_only() {
        let sampler = MetricsSampler::new(Instant::now());

        let snapshot = sampler.sample();

        assert_eq!(snapshot.queue_depth, None);
        assert_eq!(snapshot.publisher_disabled, None);
        assert_eq!(snapshot.pending_deliveries, None);
    }

    #[test]
    fn test_sample_reads_live_queue_depth() {
        // Given: A queue with two waiting messages published on the watch channel
        let (queue, _rx) = ingest_channel(8);
        let (tx, watched) = watch::channel(None);
        tx.send_replace(Some(queue.clone()));
        for _ in 0..2 {
            queue
                .enqueue(RawMessage::new(
                    IpAddr::V4(Ipv4Addr::LOCALHOST),
                    514,
                    "<14>Jan  1 00:00:00 host app: hi",
                    "syslog_udp",
                ))
                .expect("should enqueue");
        }
        let sampler = MetricsSampler::new(Instant::now()).with_queue(watched);

        // When/Then: Depth and utilization follow the queue
        let snapshot = sampler.sample();
        assert_eq!(snapshot.queue_depth, Some(2));
        assert_eq!(snapshot.queue_utilization, Some(0.25));

        // And: A stopped pipeline clears the queue
        tx.send_replace(None);
        assert_eq!(sampler.sample().queue_depth, None);
    }

    #[test]
    fn test_sample_reads_publisher_accounting() {
        // Given: Accounting with one confirmed delivery, then disabled
        let accounting = Arc::new(DeliveryAccounting::new());
        accounting.on_delivery(&tag(), Ok(()));
        accounting.set_disabled(true);
        let sampler = MetricsSampler::new(Instant::now()).with_accounting(Arc::clone(&accounting));

        // When/Then
        let snapshot = sampler.record();
        assert_eq!(snapshot.pending_deliveries, Some(1));
        assert_eq!(snapshot.publisher_disabled, Some(true));

        // And: The health check's swap resets the pending count
        accounting.take_delivered();
        assert_eq!(sampler.sample().pending_deliveries, Some(0));
    }

    #[tokio::test]
    async fn test_sampler_stops_on_shutdown() {
        let (shutdown_tx, _) = broadcast::channel(1);
        let task = MetricsSampler::new(Instant::now())
            .spawn(Duration::from_millis(10), shutdown_tx.subscribe());

        tokio::time::sleep(Duration::from_millis(35)).await;
        shutdown_tx.send(()).expect("should broadcast shutdown");

        task.await.expect("sampler task should join");
    }
}
