//! 메모리 내 루프백 전송 계층
//!
//! [`MemoryTransport`]는 외부 브로커 없이 [`BrokerTransport`]를 구현합니다.
//! 전송된 메시지는 토픽별로 최근 `retention`개까지 보관되고, 전달 결과는 다음
//! `poll`에서 보고됩니다. 브로커 다운, 전달 실패, 메타데이터 지연을 흉내 낼 수 있어
//! 발행기의 복구 경로를 시험하는 데 쓰입니다.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::PublisherError;
use crate::transport::{BrokerMetadata, BrokerTransport, DeliveryReporter, DeliveryTag};

/// 토픽별 기본 보관 개수
pub const DEFAULT_RETENTION: usize = 10_000;

/// 메모리 전송 계층의 토픽 핸들
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryTopic {
    name: String,
}

impl MemoryTopic {
    /// 토픽 이름
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// 보관된 메시지
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRecord {
    /// 토픽 내 파티션
    pub partition: i32,
    /// 메시지 키
    pub key: String,
    /// 메시지 본문
    pub value: Bytes,
    /// 전달 추적 정보
    pub tag: DeliveryTag,
}

#[derive(Default)]
struct MemoryState {
    topics: BTreeMap<String, VecDeque<MemoryRecord>>,
    reports: VecDeque<(DeliveryTag, Result<(), String>)>,
    down: bool,
    down_reported: bool,
    fail_deliveries: bool,
    metadata_delay: Duration,
}

/// 메모리 내 루프백 브로커
pub struct MemoryTransport {
    state: Mutex<MemoryState>,
    retention: usize,
}

impl MemoryTransport {
    /// 기본 보관 개수로 전송 계층을 생성합니다.
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }

    /// 토픽별 보관 개수를 지정하여 생성합니다.
    pub fn with_retention(retention: usize) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            retention: retention.max(1),
        }
    }

    /// 메타데이터 조회 응답을 지연시킵니다.
    pub fn with_metadata_delay(self, delay: Duration) -> Self {
        self.state.lock().metadata_delay = delay;
        self
    }

    /// 브로커 다운 상태를 설정합니다.
    ///
    /// 다운으로 바뀌면 다음 `poll`에서 브로커 다운 이벤트가 한 번 보고되고,
    /// 다운 중 전송된 메시지는 전달 실패로 보고됩니다.
    pub fn set_down(&self, down: bool) {
        let mut state = self.state.lock();
        if down && !state.down {
            state.down_reported = false;
        }
        state.down = down;
    }

    /// 전송된 메시지를 모두 전달 실패로 보고하도록 설정합니다.
    pub fn set_fail_deliveries(&self, fail: bool) {
        self.state.lock().fail_deliveries = fail;
    }

    /// 메타데이터 조회 지연을 변경합니다.
    pub fn set_metadata_delay(&self, delay: Duration) {
        self.state.lock().metadata_delay = delay;
    }

    /// 생성된 토픽 이름 목록
    pub fn topic_names(&self) -> Vec<String> {
        self.state.lock().topics.keys().cloned().collect()
    }

    /// 토픽에 보관된 메시지를 반환합니다.
    pub fn records(&self, topic: &str) -> Vec<MemoryRecord> {
        self.state
            .lock()
            .topics
            .get(topic)
            .map(|records| records.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 보관된 전체 메시지 수
    pub fn record_count(&self) -> usize {
        self.state.lock().topics.values().map(VecDeque::len).sum()
    }

    /// 아직 보고되지 않은 전달 결과 수
    pub fn pending_reports(&self) -> usize {
        self.state.lock().reports.len()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl BrokerTransport for MemoryTransport {
    type Topic = MemoryTopic;

    async fn create_topic(&self, name: &str) -> Result<MemoryTopic, PublisherError> {
        if name.is_empty() {
            return Err(PublisherError::TopicCreate {
                topic: String::new(),
                reason: "topic name must not be empty".to_owned(),
            });
        }
        self.state
            .lock()
            .topics
            .entry(name.to_owned())
            .or_default();
        debug!(topic = name, "memory topic created");
        Ok(MemoryTopic {
            name: name.to_owned(),
        })
    }

    fn produce(
        &self,
        topic: &MemoryTopic,
        partition: i32,
        key: &str,
        value: Bytes,
        tag: DeliveryTag,
    ) -> Result<(), PublisherError> {
        let mut state = self.state.lock();

        if state.down {
            state
                .reports
                .push_back((tag, Err("all brokers down".to_owned())));
            return Ok(());
        }
        if state.fail_deliveries {
            state
                .reports
                .push_back((tag, Err("delivery rejected".to_owned())));
            return Ok(());
        }

        let retention = self.retention;
        let records = state
            .topics
            .get_mut(&topic.name)
            .ok_or_else(|| PublisherError::Produce {
                topic: topic.name.clone(),
                reason: "unknown topic".to_owned(),
            })?;
        if records.len() >= retention {
            records.pop_front();
        }
        records.push_back(MemoryRecord {
            partition,
            key: key.to_owned(),
            value,
            tag: tag.clone(),
        });
        state.reports.push_back((tag, Ok(())));
        Ok(())
    }

    fn poll(&self, reporter: &dyn DeliveryReporter) -> usize {
        // 콜백은 잠금 밖에서 호출
        let (reports, broker_down) = {
            let mut state = self.state.lock();
            let reports: Vec<_> = state.reports.drain(..).collect();
            let broker_down = state.down && !state.down_reported;
            if broker_down {
                state.down_reported = true;
            }
            (reports, broker_down)
        };

        if broker_down {
            reporter.on_broker_down("all brokers down");
        }
        let count = reports.len();
        for (tag, result) in reports {
            reporter.on_delivery(&tag, result);
        }
        count
    }

    async fn fetch_metadata(&self, _timeout: Duration) -> Result<BrokerMetadata, PublisherError> {
        let delay = self.state.lock().metadata_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.lock();
        if state.down {
            return Err(PublisherError::BrokersDown(
                "no broker reachable".to_owned(),
            ));
        }
        Ok(BrokerMetadata {
            broker_id: 0,
            broker_name: "memory".to_owned(),
            topic_count: state.topics.len(),
        })
    }
}
