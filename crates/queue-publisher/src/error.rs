//! 큐 발행기 에러 타입
//!
//! [`PublisherError`]는 토픽 생성, 메시지 전송, 브로커 메타데이터 조회 중 발생하는
//! 에러를 표현합니다. 전달 실패는 발행 호출자에게 전파되지 않고 집계와 로그로만
//! 드러나므로, 이 타입은 주로 시작/종료와 전송 계층 경계에서 쓰입니다.

use sysgrok_core::error::{ConfigError, PipelineError, SysgrokError};

/// 큐 발행기 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum PublisherError {
    /// 토픽 생성 실패
    #[error("failed to create topic '{topic}': {reason}")]
    TopicCreate {
        /// 토픽 이름
        topic: String,
        /// 실패 사유
        reason: String,
    },

    /// 메시지 전송 실패 (전송 계층 큐 포화 등)
    #[error("produce to '{topic}' failed: {reason}")]
    Produce {
        /// 토픽 이름
        topic: String,
        /// 실패 사유
        reason: String,
    },

    /// 모든 브로커에 연결할 수 없음
    #[error("all brokers down: {0}")]
    BrokersDown(String),

    /// 메타데이터 조회 실패
    #[error("metadata request failed: {0}")]
    Metadata(String),

    /// 메타데이터 조회 시간 초과
    #[error("metadata request timed out after {timeout_ms}ms")]
    MetadataTimeout {
        /// 제한 시간 (밀리초)
        timeout_ms: u64,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 이미 시작됨
    #[error("publisher already started")]
    AlreadyStarted,

    /// 시작되지 않음
    #[error("publisher not started")]
    NotStarted,

    /// 종료되어 전송 계층이 해제됨
    #[error("publisher closed")]
    Closed,
}

impl From<PublisherError> for SysgrokError {
    fn from(err: PublisherError) -> Self {
        match err {
            PublisherError::Config { field, reason } => {
                SysgrokError::Config(ConfigError::InvalidValue { field, reason })
            }
            PublisherError::AlreadyStarted => SysgrokError::Pipeline(PipelineError::AlreadyRunning),
            PublisherError::NotStarted => SysgrokError::Pipeline(PipelineError::NotRunning),
            other => SysgrokError::Publish(other.to_string()),
        }
    }
}
