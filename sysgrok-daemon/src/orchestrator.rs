//! Plugin orchestration -- assembly, channel wiring, and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `sysgrok-daemon`.
//! It validates configuration, creates the stats/alarm/record channels,
//! builds the enabled plugins, manages startup/shutdown ordering, and
//! runs the main loop.
//!
//! # Startup Order
//!
//! 1. Syslog Pipeline (produces StatRecords, AlarmEvents, SyslogRecords)
//! 2. Queue Publisher (consumes StatRecords through the stats forwarder)
//!
//! # Shutdown Order (same as startup)
//!
//! 1. Syslog Pipeline (stop collectors, drain the ingest queue)
//! 2. Queue Publisher (stop the health timer, release topics and producer)
//!
//! Stat records still buffered in the forwarder after the publisher has
//! shut down are counted as discarded.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use sysgrok_core::config::SysgrokConfig;
use sysgrok_core::plugin::PluginRegistry;
use sysgrok_core::types::{AlarmEvent, StatRecord};
use sysgrok_queue_publisher::{
    MemoryTransport, PublishHandle, PublisherStatus, QueuePublisherBuilder, QueuePublisherConfig,
};
use sysgrok_syslog_pipeline::{
    ChannelAlarmReporter, ChannelStatsWriter, ParserConfigLoader, ParserRegistry, PipelineConfig,
    SyslogPipelineBuilder, SyslogRecord,
};

use crate::health::{DaemonHealth, ModuleHealth, aggregate_status, log_health};
use crate::metrics_server::{self, MetricsSampler};
use crate::pid_file::{remove_pid_file, write_pid_file};

/// Channel capacity constants.
const STATS_CHANNEL_CAPACITY: usize = 4096;
const ALARM_CHANNEL_CAPACITY: usize = 256;
const RECORD_CHANNEL_CAPACITY: usize = 1024;

/// Interval between aggregated health reports in the main loop.
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(30);

/// Interval between gauge samples of queue depth and publisher accounting.
const METRICS_SAMPLE_INTERVAL: Duration = Duration::from_secs(10);

type Handle = PublishHandle<MemoryTransport>;

/// The main daemon orchestrator.
///
/// Manages the complete lifecycle of the sysgrok plugins:
/// channel wiring, ordered startup, health monitoring,
/// and graceful shutdown.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: SysgrokConfig,
    /// Registry of all plugins (ordered for start/stop).
    plugins: PluginRegistry,
    /// Shutdown broadcast sender (signals all background tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
    /// Identifier attached to every published message of this run.
    generation: String,
    /// Parser registry of the syslog pipeline, if enabled.
    parser_registry: Option<Arc<ParserRegistry>>,
    /// Publish handle of the queue publisher, if enabled.
    publisher: Option<Handle>,
    stats_rx: Option<mpsc::Receiver<StatRecord>>,
    alarm_rx: Option<mpsc::Receiver<AlarmEvent>>,
    record_rx: Option<mpsc::Receiver<SyslogRecord>>,
    status_rx: Option<watch::Receiver<PublisherStatus>>,
    sampler: Option<MetricsSampler>,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read or parsed
    /// - Configuration validation fails
    /// - Any enabled plugin fails to build
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = SysgrokConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    pub async fn build_from_config(config: SysgrokConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        // Install metrics recorder before plugin initialization
        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        let (shutdown_tx, _) = broadcast::channel(16);
        let mut plugins = PluginRegistry::new();
        let start_time = Instant::now();
        let mut sampler = MetricsSampler::new(start_time);

        let mut parser_registry = None;
        let mut stats_rx = None;
        let mut alarm_rx = None;
        let mut record_rx = None;

        if config.syslog.enabled {
            tracing::info!("initializing syslog pipeline");
            let (stats_writer, rx) = ChannelStatsWriter::channel(STATS_CHANNEL_CAPACITY);
            let (alarm_reporter, arx) = ChannelAlarmReporter::channel(ALARM_CHANNEL_CAPACITY);
            let (record_tx, rrx) = mpsc::channel(RECORD_CHANNEL_CAPACITY);

            let (pipeline, _) = SyslogPipelineBuilder::new()
                .config(PipelineConfig::from_core(&config.syslog))
                .stats_writer(Arc::new(stats_writer))
                .alarm_reporter(Arc::new(alarm_reporter))
                .record_sender(record_tx)
                .build()
                .map_err(|e| anyhow::anyhow!("failed to build syslog pipeline: {}", e))?;

            parser_registry = Some(pipeline.registry());
            sampler = sampler.with_queue(pipeline.subscribe_queue());
            plugins.register(Box::new(pipeline))?;
            stats_rx = Some(rx);
            alarm_rx = Some(arx);
            record_rx = Some(rrx);
        }

        let mut publisher = None;
        let mut status_rx = None;

        if config.publisher.enabled {
            let publisher_config = QueuePublisherConfig::from_core(&config.publisher);
            tracing::info!(
                brokers = %publisher_config.broker_list(),
                partitions = publisher_config.partitions,
                "initializing queue publisher on the in-process memory transport"
            );
            let service = QueuePublisherBuilder::new()
                .config(publisher_config)
                .transport(Arc::new(MemoryTransport::new()))
                .build()
                .map_err(|e| anyhow::anyhow!("failed to build queue publisher: {}", e))?;

            publisher = Some(service.handle());
            status_rx = Some(service.subscribe());
            sampler = sampler.with_accounting(service.publisher().accounting());
            plugins.register(Box::new(service))?;
        }

        let generation = uuid::Uuid::new_v4().to_string();
        tracing::info!(
            total_plugins = plugins.count(),
            generation = %generation,
            "orchestrator initialized"
        );

        if config.metrics.enabled {
            metrics_server::record_daemon_info(plugins.count());
        }
        let sampler = config.metrics.enabled.then_some(sampler);

        Ok(Self {
            config,
            plugins,
            shutdown_tx,
            start_time,
            generation,
            parser_registry,
            publisher,
            stats_rx,
            alarm_rx,
            record_rx,
            status_rx,
            sampler,
        })
    }

    /// Start all enabled plugins and run until SIGTERM or SIGINT.
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(wait_for_shutdown_signal()).await
    }

    /// Start all enabled plugins and run until `shutdown` resolves.
    ///
    /// `shutdown` yields the name of the trigger for logging. An error
    /// from `shutdown` still stops the plugins before it is returned.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = Result<&'static str>>,
    {
        let pid_path = (!self.config.general.pid_file.is_empty())
            .then(|| self.config.general.pid_file.clone());
        if let Some(path) = &pid_path {
            write_pid_file(Path::new(path))?;
        }

        if let Err(e) = self.start_plugins().await {
            if let Some(path) = &pid_path {
                remove_pid_file(Path::new(path));
            }
            return Err(e);
        }

        let tasks = self.spawn_tasks();

        tracing::info!("entering main loop");
        let mut health_interval = tokio::time::interval(HEALTH_LOG_INTERVAL);
        health_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        health_interval.tick().await;

        tokio::pin!(shutdown);
        let trigger = loop {
            tokio::select! {
                trigger = &mut shutdown => break trigger,
                _ = health_interval.tick() => log_health(&self.health().await),
            }
        };
        match &trigger {
            Ok(signal) => tracing::info!(signal = *signal, "shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "shutdown trigger failed, stopping"),
        }

        let stopped = self.shutdown().await;

        tracing::info!("broadcasting shutdown signal to all tasks");
        let _ = self.shutdown_tx.send(());
        for task in tasks {
            let _ = task.await;
        }

        if let Some(path) = &pid_path {
            remove_pid_file(Path::new(path));
        }

        trigger?;
        stopped
    }

    /// Initialize and start all plugins, rolling back on failure.
    async fn start_plugins(&mut self) -> Result<()> {
        tracing::info!("initializing all plugins");
        if let Err(e) = self.plugins.init_all().await {
            tracing::error!(error = %e, "plugin initialization failed");
            return Err(e.into());
        }

        tracing::info!("starting all plugins");
        if let Err(e) = self.plugins.start_all().await {
            tracing::warn!("startup failed, rolling back already-started plugins");
            if let Err(stop_err) = self.plugins.stop_all().await {
                tracing::error!(
                    startup_error = %e,
                    rollback_error = %stop_err,
                    "rollback also failed during startup failure cleanup"
                );
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Spawn the background consumers of the plugin channels.
    fn spawn_tasks(&mut self) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();

        if let Some(stats_rx) = self.stats_rx.take() {
            tasks.push(spawn_stats_forwarder(
                stats_rx,
                self.publisher.clone(),
                self.generation.clone(),
                self.shutdown_tx.subscribe(),
            ));
        }
        if let Some(alarm_rx) = self.alarm_rx.take() {
            tasks.push(spawn_alarm_logger(alarm_rx, self.shutdown_tx.subscribe()));
        }
        if let Some(record_rx) = self.record_rx.take() {
            tasks.push(spawn_record_logger(record_rx, self.shutdown_tx.subscribe()));
        }
        if let Some(status_rx) = self.status_rx.take() {
            tasks.push(spawn_status_watcher(status_rx, self.shutdown_tx.subscribe()));
        }
        if let Some(sampler) = self.sampler.take() {
            tasks.push(sampler.spawn(METRICS_SAMPLE_INTERVAL, self.shutdown_tx.subscribe()));
        }

        tasks
    }

    /// Perform graceful shutdown of all plugins.
    ///
    /// Stops plugins in registration order so the pipeline drains
    /// before the publisher releases its transport.
    async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("stopping all plugins");
        self.plugins.stop_all().await.map_err(|e| e.into())
    }

    /// Get the current aggregated health status.
    pub async fn health(&self) -> DaemonHealth {
        let modules: Vec<ModuleHealth> = self
            .plugins
            .health_check_all()
            .await
            .into_iter()
            .map(|(name, state, status)| ModuleHealth::from_plugin(name, state, status))
            .collect();

        let uptime_secs = self.start_time.elapsed().as_secs();

        if self.config.metrics.enabled {
            use sysgrok_core::metrics as m;
            #[allow(clippy::cast_precision_loss)]
            metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
        }

        DaemonHealth {
            status: aggregate_status(&modules),
            uptime_secs,
            modules,
        }
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &SysgrokConfig {
        &self.config
    }

    /// Number of registered plugins.
    pub fn plugin_count(&self) -> usize {
        self.plugins.count()
    }

    /// Generation identifier attached to published messages.
    pub fn generation(&self) -> &str {
        &self.generation
    }

    /// Parser registry of the syslog pipeline, for runtime parser updates.
    pub fn parser_registry(&self) -> Option<Arc<ParserRegistry>> {
        self.parser_registry.clone()
    }

    /// Publish handle of the queue publisher.
    pub fn publish_handle(&self) -> Option<Handle> {
        self.publisher.clone()
    }
}

/// Load the configured parser directory into a fresh registry and
/// return its introspection as JSON.
///
/// # Errors
///
/// Returns an error if the parser directory cannot be read or a
/// document cannot be applied.
pub async fn dump_parsers(config: &SysgrokConfig) -> Result<serde_json::Value> {
    let registry = ParserRegistry::new(None)
        .map_err(|e| anyhow::anyhow!("failed to create parser registry: {}", e))?;

    if !config.syslog.parser_dir.is_empty() {
        let documents = ParserConfigLoader::load_directory(&config.syslog.parser_dir)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load parser directory: {}", e))?;
        for doc in documents {
            let target = doc.target().to_owned();
            registry
                .apply(doc, true)
                .map_err(|e| anyhow::anyhow!("failed to apply parser '{}': {}", target, e))?;
        }
    }

    Ok(serde_json::to_value(registry.introspect())?)
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Forward stat records to the queue publisher, keyed by table name.
///
/// On shutdown the channel is drained once so buffered records are
/// accounted for by the publisher instead of silently lost.
fn spawn_stats_forwarder(
    mut stats_rx: mpsc::Receiver<StatRecord>,
    publisher: Option<Handle>,
    generation: String,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                record = stats_rx.recv() => {
                    match record {
                        Some(record) => forward_stat(&record, publisher.as_ref(), &generation),
                        None => {
                            tracing::debug!("stats channel closed, exiting forwarder");
                            break;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    while let Ok(record) = stats_rx.try_recv() {
                        forward_stat(&record, publisher.as_ref(), &generation);
                    }
                    tracing::debug!("stats forwarder shutting down");
                    break;
                }
            }
        }
    })
}

fn forward_stat(record: &StatRecord, publisher: Option<&Handle>, generation: &str) {
    let Some(handle) = publisher else {
        tracing::debug!(
            table = %record.table,
            metric = %record.metric,
            "queue publisher disabled, stat record dropped"
        );
        return;
    };

    match serde_json::to_vec(record) {
        Ok(payload) => {
            let partition = handle.publish_keyed(&record.table, payload, generation);
            tracing::trace!(table = %record.table, partition = partition, "stat record forwarded");
        }
        Err(e) => {
            tracing::warn!(table = %record.table, error = %e, "failed to encode stat record");
        }
    }
}

/// Log pattern compile alarms raised and cleared by the parser registry.
fn spawn_alarm_logger(
    mut alarm_rx: mpsc::Receiver<AlarmEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                alarm = alarm_rx.recv() => {
                    match alarm {
                        Some(alarm) if alarm.cleared => {
                            tracing::info!(parser = %alarm.pattern_name, "pattern compile alarm cleared");
                        }
                        Some(alarm) => {
                            tracing::error!(parser = %alarm.pattern_name, "pattern compile alarm raised");
                        }
                        None => {
                            tracing::debug!("alarm channel closed, exiting logger");
                            break;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("alarm logger shutting down");
                    break;
                }
            }
        }
    })
}

/// Log BSD syslog records emitted by the classifier.
fn spawn_record_logger(
    mut record_rx: mpsc::Receiver<SyslogRecord>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                record = record_rx.recv() => {
                    match record {
                        Some(record) => {
                            tracing::debug!(
                                source = %record.source,
                                facility = record.facility_name,
                                severity = record.severity,
                                hostname = %record.hostname,
                                prog = %record.prog,
                                pid = ?record.pid,
                                "syslog record received"
                            );
                        }
                        None => {
                            tracing::debug!("record channel closed, exiting logger");
                            break;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("record logger shutting down");
                    break;
                }
            }
        }
    })
}

/// Log publisher connection transitions.
fn spawn_status_watcher(
    mut status_rx: watch::Receiver<PublisherStatus>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut previous = *status_rx.borrow_and_update();
        loop {
            tokio::select! {
                changed = status_rx.changed() => {
                    if changed.is_err() {
                        tracing::debug!("publisher status channel closed, exiting watcher");
                        break;
                    }
                    let current = *status_rx.borrow_and_update();
                    log_status_transition(&previous, &current);
                    previous = current;
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("publisher status watcher shutting down");
                    break;
                }
            }
        }
    })
}

fn log_status_transition(previous: &PublisherStatus, current: &PublisherStatus) {
    if current.connection != previous.connection {
        tracing::info!(
            from = %previous.connection,
            to = %current.connection,
            delivered = current.last_delivered,
            "publisher connection status changed"
        );
    }
    if current.disabled && !previous.disabled {
        tracing::warn!("publisher disabled, messages will be discarded until brokers return");
    }
    if current.resumes > previous.resumes {
        tracing::info!(resumes = current.resumes, "publisher resumed");
    }
}
