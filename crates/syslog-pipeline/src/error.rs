//! syslog 파이프라인 에러 타입
//!
//! [`SyslogPipelineError`]는 수집, 분류, 패턴 컴파일, 통계 디스패치 중 발생하는
//! 모든 에러를 표현합니다. `From<SyslogPipelineError> for SysgrokError` 변환이
//! 구현되어 있어 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use sysgrok_core::error::{ConfigError, ParseError, PipelineError, SysgrokError};

/// syslog 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum SyslogPipelineError {
    /// 메시지 파싱 실패
    #[error("parse error: {format} at offset {offset}: {reason}")]
    Parse {
        /// 파서 형식 (bsd, rfc5424 등)
        format: String,
        /// 실패 위치 (바이트 오프셋)
        offset: usize,
        /// 실패 사유
        reason: String,
    },

    /// grok 패턴 컴파일 실패
    #[error("pattern compile error: '{name}': {reason}")]
    PatternCompile {
        /// 패턴(파서) 이름
        name: String,
        /// 실패 사유
        reason: String,
    },

    /// 등록되지 않은 패턴 정의
    #[error("unknown pattern definition: {0}")]
    UnknownPattern(String),

    /// 파서 설정 문서 해석 실패
    #[error("config document error: {kind}: {reason}")]
    ConfigDocument {
        /// 문서 종류 (syslog_parser, rfc5424)
        kind: String,
        /// 실패 사유
        reason: String,
    },

    /// 파서 설정 파일 로딩 실패
    #[error("parser config load error: {path}: {reason}")]
    ParserLoad {
        /// 설정 파일 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 정수 메트릭 값 변환 실패
    #[error("metric cast error: '{metric}' value '{value}': {reason}")]
    MetricCast {
        /// 메트릭 이름
        metric: String,
        /// 캡처된 원본 값
        value: String,
        /// 실패 사유
        reason: String,
    },

    /// 수집기 에러 (네트워크 등)
    #[error("collector error: {source_type}: {reason}")]
    Collector {
        /// 수집 소스 유형 (syslog_udp, syslog_tcp)
        source_type: String,
        /// 에러 사유
        reason: String,
    },

    /// 수집 큐 포화
    #[error("ingest queue full: capacity {capacity}")]
    QueueFull {
        /// 큐 최대 용량
        capacity: usize,
    },

    /// 수집 큐가 닫혀 더 이상 메시지를 받지 않음
    #[error("ingest queue closed")]
    QueueClosed,

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SyslogPipelineError> for SysgrokError {
    fn from(err: SyslogPipelineError) -> Self {
        match err {
            SyslogPipelineError::Config { field, reason } => {
                SysgrokError::Config(ConfigError::InvalidValue { field, reason })
            }
            SyslogPipelineError::Parse { offset, reason, .. } => {
                SysgrokError::Parse(ParseError::Failed { offset, reason })
            }
            SyslogPipelineError::Io(e) => SysgrokError::Io(e),
            other => SysgrokError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display() {
        let err = SyslogPipelineError::Parse {
            format: "bsd".to_owned(),
            offset: 42,
            reason: "unexpected character".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("bsd"));
        assert!(msg.contains("42"));
        assert!(msg.contains("unexpected character"));
    }

    #[test]
    fn pattern_compile_error_display() {
        let err = SyslogPipelineError::PatternCompile {
            name: "latency_parser".to_owned(),
            reason: "unknown pattern reference 'NOPE'".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("latency_parser"));
        assert!(msg.contains("NOPE"));
    }

    #[test]
    fn metric_cast_error_display() {
        let err = SyslogPipelineError::MetricCast {
            metric: "latency".to_owned(),
            value: "abc".to_owned(),
            reason: "invalid digit found in string".to_owned(),
        };
        assert!(err.to_string().contains("'abc'"));
    }

    #[test]
    fn config_error_maps_to_config() {
        let err = SyslogPipelineError::Config {
            field: "queue_capacity".to_owned(),
            reason: "must be greater than 0".to_owned(),
        };
        let top: SysgrokError = err.into();
        assert!(matches!(top, SysgrokError::Config(_)));
    }

    #[test]
    fn other_errors_map_to_pipeline() {
        let err = SyslogPipelineError::Channel("receiver closed".to_owned());
        let top: SysgrokError = err.into();
        assert!(matches!(top, SysgrokError::Pipeline(_)));
    }

    #[test]
    fn queue_full_display() {
        let err = SyslogPipelineError::QueueFull { capacity: 10000 };
        assert!(err.to_string().contains("10000"));
    }
}
