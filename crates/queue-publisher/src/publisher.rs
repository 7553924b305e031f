//! 파티션 큐 발행기
//!
//! [`QueuePublisher`]는 파티션마다 토픽 하나(`topic_prefix + i`)를 만들고,
//! [`PublishHandle`]을 통해 들어온 메시지를 해당 토픽으로 보냅니다. 발행은
//! fire-and-forget이며 전달 실패는 호출자에게 돌아가지 않습니다.
//!
//! # 점검 타이머
//! ```text
//! tick ─> HealthTimer.tick ─(점검)─> delivered swap ─> Up/Down ─> status watch
//!   │                           └─(비활성)─> metadata probe ─> resume
//!   └──> transport.poll(accounting)
//! ```
//!
//! # 종료 순서
//! 1. 타이머 취소 후 대기
//! 2. 토픽 핸들 해제
//! 3. 전송 계층 해제
//!
//! 타이머가 살아 있는 채로 발행기를 drop하면 panic합니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use sysgrok_core::metrics as m;
use sysgrok_core::types::ConnectionStatus;

use crate::accounting::DeliveryAccounting;
use crate::config::QueuePublisherConfig;
use crate::error::PublisherError;
use crate::health::{HealthTimer, connection_status};
use crate::partition::select_partition;
use crate::transport::{BrokerTransport, DeliveryReporter, DeliveryTag};

/// 발행기 연결 상태 스냅샷
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublisherStatus {
    /// 마지막 점검의 연결 상태
    pub connection: ConnectionStatus,
    /// 브로커 다운으로 발행이 중단되었는지 여부
    pub disabled: bool,
    /// 복구(재개) 횟수
    pub resumes: u64,
    /// 마지막 점검에서 관찰한 전달 수
    pub last_delivered: u64,
}

/// 발행 경로와 타이머가 공유하는 상태
struct Shared<T: BrokerTransport> {
    producer: RwLock<Option<Arc<T>>>,
    topics: RwLock<Vec<T::Topic>>,
    accounting: Arc<DeliveryAccounting>,
    partitions: u32,
    sent: AtomicU64,
    discarded: AtomicU64,
}

impl<T: BrokerTransport> Shared<T> {
    fn discard(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::PUBLISHER_DISCARDED_TOTAL).increment(1);
    }
}

/// 메시지 발행 핸들
///
/// 복제하여 여러 태스크에서 사용할 수 있습니다.
pub struct PublishHandle<T: BrokerTransport> {
    shared: Arc<Shared<T>>,
}

impl<T: BrokerTransport> Clone for PublishHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: BrokerTransport> PublishHandle<T> {
    /// 지정한 파티션으로 메시지를 발행합니다.
    ///
    /// 비활성화 상태이거나 시작 전/종료 후에는 무시됩니다. 범위를 벗어난 파티션은
    /// 에러 로그를 남기고 버립니다.
    pub fn publish(&self, partition: u32, key: &str, value: impl Into<Bytes>, generation: &str) {
        let shared = &self.shared;

        if shared.accounting.is_disabled() {
            debug!(key, "publisher disabled, ignoring publish");
            shared.discard();
            return;
        }
        if partition >= shared.partitions {
            error!(
                key,
                partition,
                partitions = shared.partitions,
                "partition out of range, dropping message"
            );
            shared.discard();
            return;
        }

        let producer = shared.producer.read();
        let topics = shared.topics.read();
        let (Some(transport), Some(topic)) = (producer.as_ref(), topics.get(partition as usize))
        else {
            debug!(key, "publisher not running, ignoring publish");
            shared.discard();
            return;
        };

        let tag = DeliveryTag {
            key: key.to_owned(),
            partition,
            generation: generation.to_owned(),
        };
        match transport.produce(topic, 0, key, value.into(), tag.clone()) {
            Ok(()) => {
                shared.sent.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(m::PUBLISHER_MESSAGES_SENT_TOTAL).increment(1);
            }
            Err(e) => shared.accounting.on_delivery(&tag, Err(e.to_string())),
        }
    }

    /// 키의 DJB 해시로 파티션을 골라 발행합니다. 선택된 파티션을 반환합니다.
    pub fn publish_keyed(&self, key: &str, value: impl Into<Bytes>, generation: &str) -> u32 {
        let partition = select_partition(key.as_bytes(), self.shared.partitions);
        self.publish(partition, key, value, generation);
        partition
    }

    /// 파티션 수
    pub fn partitions(&self) -> u32 {
        self.shared.partitions
    }

    /// 발행이 비활성화되었는지 확인합니다.
    pub fn is_disabled(&self) -> bool {
        self.shared.accounting.is_disabled()
    }

    /// 전송 계층에 넘긴 메시지 수
    pub fn sent_count(&self) -> u64 {
        self.shared.sent.load(Ordering::Relaxed)
    }

    /// 발행하지 않고 버린 메시지 수
    pub fn discarded_count(&self) -> u64 {
        self.shared.discarded.load(Ordering::Relaxed)
    }
}

/// 파티션 큐 발행기
///
/// # 사용 예시
/// ```ignore
/// use std::sync::Arc;
/// use sysgrok_queue_publisher::{MemoryTransport, QueuePublisher};
///
/// let mut publisher = QueuePublisher::new(config, Arc::new(MemoryTransport::new()));
/// publisher.start().await?;
/// publisher.handle().publish_keyed("latency_parser", payload, "gen-1");
/// publisher.shutdown().await?;
/// ```
pub struct QueuePublisher<T: BrokerTransport> {
    config: QueuePublisherConfig,
    shared: Arc<Shared<T>>,
    status_tx: watch::Sender<PublisherStatus>,
    cancel: CancellationToken,
    timer: Option<JoinHandle<()>>,
}

impl<T: BrokerTransport> QueuePublisher<T> {
    /// 전송 계층을 받아 발행기를 생성합니다. 토픽은 `start`에서 만들어집니다.
    pub fn new(config: QueuePublisherConfig, transport: Arc<T>) -> Self {
        let (status_tx, _) = watch::channel(PublisherStatus::default());
        let shared = Arc::new(Shared {
            producer: RwLock::new(Some(transport)),
            topics: RwLock::new(Vec::new()),
            accounting: Arc::new(DeliveryAccounting::new()),
            partitions: config.partitions,
            sent: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        });
        Self {
            config,
            shared,
            status_tx,
            cancel: CancellationToken::new(),
            timer: None,
        }
    }

    /// 파티션별 토픽을 만들고 점검 타이머를 시작합니다.
    pub async fn start(&mut self) -> Result<(), PublisherError> {
        if self.timer.is_some() {
            return Err(PublisherError::AlreadyStarted);
        }
        let transport = self
            .shared
            .producer
            .read()
            .clone()
            .ok_or(PublisherError::Closed)?;

        let mut topics = Vec::with_capacity(self.config.partitions as usize);
        for index in 0..self.config.partitions {
            let name = self.config.topic_name(index);
            let topic = transport.create_topic(&name).await?;
            debug!(topic = %name, "topic created");
            topics.push(topic);
        }
        *self.shared.topics.write() = topics;

        self.status_tx.send_replace(PublisherStatus::default());
        self.cancel = CancellationToken::new();

        let mut health = HealthCheck {
            transport,
            accounting: Arc::clone(&self.shared.accounting),
            status_tx: self.status_tx.clone(),
            metadata_timeout: self.config.metadata_timeout(),
            brokers: self.config.broker_list(),
        };
        let tick = self.config.tick_interval();
        let period = self.config.activity_check_period();
        let cancel = self.cancel.clone();

        self.timer = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;
            let mut timer = HealthTimer::new(period, Instant::now());

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }
                if timer.tick(Instant::now(), health.accounting.is_disabled()) {
                    health.check().await;
                }
                health.poll();
            }
            debug!("publisher timer stopped");
        }));

        info!(
            brokers = %self.config.broker_list(),
            partitions = self.config.partitions,
            prefix = %self.config.topic_prefix,
            "queue publisher started"
        );
        Ok(())
    }

    /// 타이머를 멈추고 토픽과 전송 계층을 순서대로 해제합니다.
    pub async fn shutdown(&mut self) -> Result<(), PublisherError> {
        let timer = self.timer.take().ok_or(PublisherError::NotStarted)?;

        // 1. 타이머
        self.cancel.cancel();
        if let Err(e) = timer.await {
            warn!(error = %e, "publisher timer join failed");
        }

        // 2. 토픽 핸들
        self.shared.topics.write().clear();

        // 3. 전송 계층
        self.shared.producer.write().take();

        info!(
            sent = self.shared.sent.load(Ordering::Relaxed),
            delivered = self.shared.accounting.delivered_total(),
            failed = self.shared.accounting.failed_total(),
            "queue publisher stopped"
        );
        Ok(())
    }

    /// 발행 핸들을 반환합니다.
    pub fn handle(&self) -> PublishHandle<T> {
        PublishHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// 연결 상태 구독 채널을 반환합니다.
    pub fn subscribe(&self) -> watch::Receiver<PublisherStatus> {
        self.status_tx.subscribe()
    }

    /// 현재 연결 상태
    pub fn status(&self) -> PublisherStatus {
        *self.status_tx.borrow()
    }

    /// 전달 집계
    pub fn accounting(&self) -> Arc<DeliveryAccounting> {
        Arc::clone(&self.shared.accounting)
    }

    /// 타이머가 동작 중인지 확인합니다.
    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// 발행기 설정
    pub fn config(&self) -> &QueuePublisherConfig {
        &self.config
    }
}

impl<T: BrokerTransport> Drop for QueuePublisher<T> {
    fn drop(&mut self) {
        if self.timer.is_some() && !std::thread::panicking() {
            panic!("queue publisher dropped while its timer is armed, call shutdown() first");
        }
    }
}

/// 타이머 태스크가 소유하는 점검 상태
struct HealthCheck<T: BrokerTransport> {
    transport: Arc<T>,
    accounting: Arc<DeliveryAccounting>,
    status_tx: watch::Sender<PublisherStatus>,
    metadata_timeout: Duration,
    brokers: String,
}

impl<T: BrokerTransport> HealthCheck<T> {
    /// 전달 수로 연결 상태를 갱신하고, 비활성 상태면 메타데이터를 조회합니다.
    async fn check(&mut self) {
        let delivered = self.accounting.take_delivered();
        let connection = connection_status(delivered);
        match connection {
            ConnectionStatus::Up => info!(brokers = %self.brokers, delivered, "broker deliveries observed"),
            _ => error!(brokers = %self.brokers, "no broker deliveries since last check"),
        }
        metrics::gauge!(m::PUBLISHER_CONNECTION_UP)
            .set(if connection == ConnectionStatus::Up { 1.0 } else { 0.0 });
        self.status_tx.send_modify(|status| {
            status.connection = connection;
            status.last_delivered = delivered;
        });

        if !self.accounting.is_disabled() {
            return;
        }

        error!(brokers = %self.brokers, "publisher disabled, probing broker metadata");
        let probe = tokio::time::timeout(
            self.metadata_timeout,
            self.transport.fetch_metadata(self.metadata_timeout),
        )
        .await;
        match probe {
            Ok(Ok(metadata)) => {
                self.accounting.set_disabled(false);
                self.status_tx.send_modify(|status| {
                    status.disabled = false;
                    status.resumes += 1;
                });
                info!(
                    broker_id = metadata.broker_id,
                    broker = %metadata.broker_name,
                    "broker metadata detected, resuming publisher"
                );
            }
            Ok(Err(e)) => error!(error = %e, "failed to acquire broker metadata"),
            Err(_) => {
                let err = PublisherError::MetadataTimeout {
                    timeout_ms: self.metadata_timeout.as_millis() as u64,
                };
                error!(error = %err, "failed to acquire broker metadata");
            }
        }
    }

    /// 대기 중인 전달 결과를 집계에 반영하고 비활성 상태 변화를 알립니다.
    fn poll(&self) {
        let reports = self.transport.poll(self.accounting.as_ref());
        if reports > 0 {
            debug!(reports, "delivery reports processed");
        }
        let disabled = self.accounting.is_disabled();
        self.status_tx.send_if_modified(|status| {
            if status.disabled == disabled {
                return false;
            }
            status.disabled = disabled;
            true
        });
    }
}
