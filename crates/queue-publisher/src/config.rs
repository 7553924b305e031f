//! 큐 발행기 설정
//!
//! [`QueuePublisherConfig`]는 core의 [`PublisherConfig`](sysgrok_core::config::PublisherConfig)에서
//! 파생됩니다.
//!
//! # 사용 예시
//! ```ignore
//! use sysgrok_core::config::SysgrokConfig;
//! use sysgrok_queue_publisher::QueuePublisherConfig;
//!
//! let core_config = SysgrokConfig::default();
//! let config = QueuePublisherConfig::from_core(&core_config.publisher);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PublisherError;

const MAX_PARTITIONS: u32 = 1024;
const MAX_CHECK_PERIOD_MS: u64 = 3_600_000;
const MAX_METADATA_TIMEOUT_MS: u64 = 60_000;

/// 큐 발행기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuePublisherConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 브로커 주소 목록
    pub brokers: Vec<String>,
    /// 토픽 이름 접두어
    pub topic_prefix: String,
    /// 파티션 수 (토픽 수)
    pub partitions: u32,
    /// 전달 활동 점검 주기 (밀리초)
    pub activity_check_period_ms: u64,
    /// 타이머 틱 주기 (밀리초)
    pub tick_interval_ms: u64,
    /// 메타데이터 조회 제한 시간 (밀리초)
    pub metadata_timeout_ms: u64,
}

impl Default for QueuePublisherConfig {
    fn default() -> Self {
        Self::from_core(&sysgrok_core::config::PublisherConfig::default())
    }
}

impl QueuePublisherConfig {
    /// core의 `PublisherConfig`에서 발행기 설정을 생성합니다.
    pub fn from_core(core: &sysgrok_core::config::PublisherConfig) -> Self {
        Self {
            enabled: core.enabled,
            brokers: core.brokers.clone(),
            topic_prefix: core.topic_prefix.clone(),
            partitions: core.partitions,
            activity_check_period_ms: core.activity_check_period_ms,
            tick_interval_ms: core.tick_interval_ms,
            metadata_timeout_ms: core.metadata_timeout_ms,
        }
    }

    /// 파티션 `index`의 토픽 이름
    pub fn topic_name(&self, index: u32) -> String {
        format!("{}{index}", self.topic_prefix)
    }

    /// 브로커 목록을 쉼표로 이어 붙인 문자열
    pub fn broker_list(&self) -> String {
        self.brokers.join(",")
    }

    /// 전달 활동 점검 주기
    pub fn activity_check_period(&self) -> Duration {
        Duration::from_millis(self.activity_check_period_ms)
    }

    /// 타이머 틱 주기
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// 메타데이터 조회 제한 시간
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_timeout_ms)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), PublisherError> {
        if self.partitions == 0 || self.partitions > MAX_PARTITIONS {
            return Err(config_error(
                "partitions",
                format!("must be 1-{MAX_PARTITIONS}"),
            ));
        }
        if self.topic_prefix.is_empty() {
            return Err(config_error("topic_prefix", "must not be empty"));
        }
        if self.brokers.iter().any(|b| b.trim().is_empty()) {
            return Err(config_error("brokers", "broker address must not be empty"));
        }
        if self.tick_interval_ms == 0 {
            return Err(config_error("tick_interval_ms", "must be greater than 0"));
        }
        if self.activity_check_period_ms < self.tick_interval_ms
            || self.activity_check_period_ms > MAX_CHECK_PERIOD_MS
        {
            return Err(config_error(
                "activity_check_period_ms",
                format!("must be between tick_interval_ms and {MAX_CHECK_PERIOD_MS}"),
            ));
        }
        if self.metadata_timeout_ms == 0 || self.metadata_timeout_ms > MAX_METADATA_TIMEOUT_MS {
            return Err(config_error(
                "metadata_timeout_ms",
                format!("must be 1-{MAX_METADATA_TIMEOUT_MS}"),
            ));
        }
        Ok(())
    }
}

fn config_error(field: &str, reason: impl Into<String>) -> PublisherError {
    PublisherError::Config {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

/// 큐 발행기 설정 빌더
#[derive(Default)]
pub struct QueuePublisherConfigBuilder {
    config: QueuePublisherConfig,
}

impl QueuePublisherConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 활성화 여부를 설정합니다.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// 브로커 목록을 설정합니다.
    pub fn brokers(mut self, brokers: Vec<String>) -> Self {
        self.config.brokers = brokers;
        self
    }

    /// 토픽 접두어를 설정합니다.
    pub fn topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.topic_prefix = prefix.into();
        self
    }

    /// 파티션 수를 설정합니다.
    pub fn partitions(mut self, partitions: u32) -> Self {
        self.config.partitions = partitions;
        self
    }

    /// 전달 활동 점검 주기(밀리초)를 설정합니다.
    pub fn activity_check_period_ms(mut self, ms: u64) -> Self {
        self.config.activity_check_period_ms = ms;
        self
    }

    /// 타이머 틱 주기(밀리초)를 설정합니다.
    pub fn tick_interval_ms(mut self, ms: u64) -> Self {
        self.config.tick_interval_ms = ms;
        self
    }

    /// 메타데이터 조회 제한 시간(밀리초)을 설정합니다.
    pub fn metadata_timeout_ms(mut self, ms: u64) -> Self {
        self.config.metadata_timeout_ms = ms;
        self
    }

    /// 설정을 검증하고 반환합니다.
    pub fn build(self) -> Result<QueuePublisherConfig, PublisherError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
