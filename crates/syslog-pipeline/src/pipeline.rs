//! 파이프라인 오케스트레이션 -- 수집/분류/통계 디스패치의 전체 흐름을 관리합니다.
//!
//! [`SyslogPipeline`]은 core의 [`Plugin`](sysgrok_core::plugin::Plugin) trait을 구현하여
//! `sysgrok-daemon`에서 다른 모듈과 동일한 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! UDP/TCP collectors -> IngestQueue -> worker(SyslogClassifier) -> StatsDispatcher -> StatsWriter
//!                                                       \-> BSD SyslogRecord -> mpsc
//! ```
//!
//! # 종료 순서
//! 1. 수집기 취소
//! 2. 수집 큐 닫기
//! 3. 워커가 남은 메시지를 `drain_timeout_secs` 안에서 처리하고 나머지는 드롭

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use sysgrok_core::error::{PipelineError, SysgrokError};
use sysgrok_core::pipeline::{AlarmReporter, HealthStatus, StatsWriter};
use sysgrok_core::plugin::{Plugin, PluginInfo, PluginState, PluginType};
use sysgrok_core::types::StatRecord;

use crate::classifier::SyslogClassifier;
use crate::collector::{SyslogTcpCollector, SyslogUdpCollector, syslog_tcp, syslog_udp};
use crate::config::PipelineConfig;
use crate::error::SyslogPipelineError;
use crate::parser::SyslogRecord;
use crate::queue::{DrainReport, IngestQueue, IngestReceiver, ingest_channel};
use crate::registry::{ParserConfigLoader, ParserRegistry};
use crate::stats::{ChannelStatsWriter, StatsDispatcher};

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// syslog 파이프라인 -- 수집/분류/통계 디스패치의 전체 흐름을 관리합니다.
///
/// # 사용 예시
/// ```ignore
/// use sysgrok_syslog_pipeline::SyslogPipelineBuilder;
///
/// let (mut pipeline, stats_rx) = SyslogPipelineBuilder::new()
///     .config(config)
///     .alarm_reporter(alarms)
///     .build()?;
///
/// pipeline.start().await?;
/// ```
pub struct SyslogPipeline {
    info: PluginInfo,
    config: PipelineConfig,
    state: PipelineState,
    registry: Arc<ParserRegistry>,
    dispatcher: StatsDispatcher,
    record_tx: Option<mpsc::Sender<SyslogRecord>>,
    queue: Option<IngestQueue>,
    /// 현재 수집 큐를 외부 관찰자에게 알림
    queue_watch: watch::Sender<Option<IngestQueue>>,
    collector_cancel: CancellationToken,
    worker_stop: CancellationToken,
    collector_tasks: Vec<JoinHandle<()>>,
    worker: Option<JoinHandle<DrainReport>>,
    processed: Arc<AtomicU64>,
    failed_collectors: Arc<AtomicUsize>,
}

impl SyslogPipeline {
    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 파서 레지스트리를 반환합니다. 실행 중에도 파서를 추가/삭제할 수 있습니다.
    pub fn registry(&self) -> Arc<ParserRegistry> {
        Arc::clone(&self.registry)
    }

    /// 수집 큐 생산자 측을 반환합니다. 실행 중에만 존재합니다.
    pub fn ingest_queue(&self) -> Option<IngestQueue> {
        self.queue.clone()
    }

    /// 수집 큐 구독 채널을 반환합니다. 정지 상태에서는 `None`이 들어 있습니다.
    pub fn subscribe_queue(&self) -> watch::Receiver<Option<IngestQueue>> {
        self.queue_watch.subscribe()
    }

    /// 분류된 메시지 수를 반환합니다.
    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// 수집 큐 사용률을 반환합니다.
    pub fn queue_utilization(&self) -> f64 {
        self.queue.as_ref().map_or(0.0, IngestQueue::utilization)
    }

    /// 파서 설정 디렉토리의 문서를 레지스트리에 적용합니다.
    ///
    /// 적용에 실패한 문서는 로그만 남기고 이전 상태를 유지합니다.
    /// 적용된 문서 수를 반환합니다.
    pub async fn load_parsers(&self) -> Result<usize, SyslogPipelineError> {
        if self.config.parser_dir.is_empty() {
            return Ok(0);
        }

        let documents = ParserConfigLoader::load_directory(&self.config.parser_dir).await?;
        let mut applied = 0;
        for doc in documents {
            let target = doc.target().to_owned();
            match self.registry.apply(doc, true) {
                Ok(()) => applied += 1,
                Err(e) => {
                    tracing::error!(target_name = %target, error = %e, "failed to apply parser config document");
                }
            }
        }
        Ok(applied)
    }

    fn spawn_worker(&mut self, mut rx: IngestReceiver) {
        let mut classifier = SyslogClassifier::new(Arc::clone(&self.registry), self.dispatcher.clone())
            .with_max_input_size(self.config.max_message_size);
        if let Some(tx) = &self.record_tx {
            classifier = classifier.with_record_sender(tx.clone());
        }
        let stop = self.worker_stop.clone();
        let processed = Arc::clone(&self.processed);
        let drain_timeout = self.config.drain_timeout();

        self.worker = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Some(msg) => {
                            classifier.process(msg);
                            processed.fetch_add(1, Ordering::Relaxed);
                        }
                        None => break,
                    },
                }
            }

            rx.close();
            rx.drain(drain_timeout, |msg| {
                classifier.process(msg);
                processed.fetch_add(1, Ordering::Relaxed);
            })
        }));
    }

    fn spawn_collectors(&mut self, queue: &IngestQueue) {
        if self.config.has_source(syslog_udp::SOURCE_TYPE) {
            let mut collector = SyslogUdpCollector::new(
                self.config.udp_collector(),
                queue.clone(),
                self.collector_cancel.clone(),
            );
            let failed = Arc::clone(&self.failed_collectors);
            self.collector_tasks.push(tokio::spawn(async move {
                if let Err(e) = collector.run().await {
                    failed.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(source = syslog_udp::SOURCE_TYPE, error = %e, "collector stopped with error");
                }
            }));
        }

        if self.config.has_source(syslog_tcp::SOURCE_TYPE) {
            let mut collector = SyslogTcpCollector::new(
                self.config.tcp_collector(),
                queue.clone(),
                self.collector_cancel.clone(),
            );
            let failed = Arc::clone(&self.failed_collectors);
            self.collector_tasks.push(tokio::spawn(async move {
                if let Err(e) = collector.run().await {
                    failed.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(source = syslog_tcp::SOURCE_TYPE, error = %e, "collector stopped with error");
                }
            }));
        }
    }

    async fn start_pipeline(&mut self) -> Result<(), SyslogPipelineError> {
        tracing::info!("starting syslog pipeline");

        let applied = self.load_parsers().await?;
        tracing::info!(
            documents = applied,
            parsers = self.registry.configured_count(),
            "parser configuration applied"
        );

        self.collector_cancel = CancellationToken::new();
        self.worker_stop = CancellationToken::new();
        self.failed_collectors.store(0, Ordering::Relaxed);

        let (queue, rx) = ingest_channel(self.config.queue_capacity);
        self.spawn_worker(rx);
        self.spawn_collectors(&queue);
        self.queue_watch.send_replace(Some(queue.clone()));
        self.queue = Some(queue);

        self.state = PipelineState::Running;
        tracing::info!(sources = ?self.config.sources, "syslog pipeline started");
        Ok(())
    }

    async fn stop_pipeline(&mut self) {
        tracing::info!("stopping syslog pipeline");

        // 1. 수집기 정지
        self.collector_cancel.cancel();
        for task in self.collector_tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "collector task join failed");
            }
        }

        // 2. 큐 닫기
        if let Some(queue) = self.queue.take() {
            queue.close();
        }
        self.queue_watch.send_replace(None);

        // 3. 워커 드레인
        self.worker_stop.cancel();
        if let Some(worker) = self.worker.take() {
            match worker.await {
                Ok(report) => {
                    tracing::info!(
                        drained = report.processed,
                        discarded = report.discarded,
                        "ingest queue drained"
                    );
                }
                Err(e) => tracing::warn!(error = %e, "classifier worker join failed"),
            }
        }

        self.state = PipelineState::Stopped;
        tracing::info!(processed = self.processed_count(), "syslog pipeline stopped");
    }
}

impl Plugin for SyslogPipeline {
    fn info(&self) -> &PluginInfo {
        &self.info
    }

    fn state(&self) -> PluginState {
        match self.state {
            PipelineState::Initialized => PluginState::Initialized,
            PipelineState::Running => PluginState::Running,
            PipelineState::Stopped => PluginState::Stopped,
        }
    }

    async fn init(&mut self) -> Result<(), SysgrokError> {
        self.config.validate()?;
        Ok(())
    }

    async fn start(&mut self) -> Result<(), SysgrokError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }
        self.start_pipeline().await?;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), SysgrokError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }
        self.stop_pipeline().await;
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                let failed = self.failed_collectors.load(Ordering::Relaxed);
                let utilization = self.queue_utilization();
                if failed > 0 {
                    HealthStatus::Degraded(format!("{failed} collector(s) failed"))
                } else if utilization > 0.9 {
                    HealthStatus::Degraded(format!(
                        "ingest queue utilization high: {:.1}%",
                        utilization * 100.0
                    ))
                } else {
                    HealthStatus::Healthy
                }
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// syslog 파이프라인 빌더
///
/// 파이프라인을 구성하고 필요한 채널을 생성합니다.
pub struct SyslogPipelineBuilder {
    config: PipelineConfig,
    stats_writer: Option<Arc<dyn StatsWriter>>,
    alarm_reporter: Option<Arc<dyn AlarmReporter>>,
    record_tx: Option<mpsc::Sender<SyslogRecord>>,
    stats_channel_capacity: usize,
}

impl SyslogPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            stats_writer: None,
            alarm_reporter: None,
            record_tx: None,
            stats_channel_capacity: 4096,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 외부 통계 기록 경로를 설정합니다.
    ///
    /// 설정하지 않으면 빌더가 채널 기반 기록 경로를 생성합니다.
    pub fn stats_writer(mut self, writer: Arc<dyn StatsWriter>) -> Self {
        self.stats_writer = Some(writer);
        self
    }

    /// 패턴 컴파일 알람 보고 경로를 설정합니다.
    pub fn alarm_reporter(mut self, reporter: Arc<dyn AlarmReporter>) -> Self {
        self.alarm_reporter = Some(reporter);
        self
    }

    /// BSD syslog 레코드 전송 채널을 설정합니다.
    pub fn record_sender(mut self, tx: mpsc::Sender<SyslogRecord>) -> Self {
        self.record_tx = Some(tx);
        self
    }

    /// 통계 채널 용량을 설정합니다 (외부 기록 경로 미사용 시).
    pub fn stats_channel_capacity(mut self, capacity: usize) -> Self {
        self.stats_channel_capacity = capacity;
        self
    }

    /// 파이프라인을 빌드합니다.
    ///
    /// # Returns
    /// - `SyslogPipeline`: 파이프라인 인스턴스
    /// - `Option<mpsc::Receiver<StatRecord>>`: 통계 레코드 수신 채널
    ///   (외부 stats_writer를 설정한 경우 None)
    pub fn build(
        self,
    ) -> Result<(SyslogPipeline, Option<mpsc::Receiver<StatRecord>>), SyslogPipelineError> {
        self.config.validate()?;

        let (writer, stats_rx): (Arc<dyn StatsWriter>, _) = match self.stats_writer {
            Some(writer) => (writer, None),
            None => {
                let (writer, rx) = ChannelStatsWriter::channel(self.stats_channel_capacity.max(1));
                (Arc::new(writer), Some(rx))
            }
        };

        let registry = Arc::new(ParserRegistry::new(self.alarm_reporter)?);

        let pipeline = SyslogPipeline {
            info: PluginInfo {
                name: "syslog-pipeline".to_owned(),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                description: "syslog ingestion, grok classification and stats dispatch".to_owned(),
                plugin_type: PluginType::SyslogPipeline,
            },
            config: self.config,
            state: PipelineState::Initialized,
            registry,
            dispatcher: StatsDispatcher::new(writer),
            record_tx: self.record_tx,
            queue: None,
            queue_watch: watch::channel(None).0,
            collector_cancel: CancellationToken::new(),
            worker_stop: CancellationToken::new(),
            collector_tasks: Vec::new(),
            worker: None,
            processed: Arc::new(AtomicU64::new(0)),
            failed_collectors: Arc::new(AtomicUsize::new(0)),
        };

        Ok((pipeline, stats_rx))
    }
}

impl Default for SyslogPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
