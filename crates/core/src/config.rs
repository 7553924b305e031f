//! 설정 관리 -- sysgrok.toml 파싱 및 런타임 설정
//!
//! [`SysgrokConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`SYSGROK_SYSLOG_TCP_BIND=0.0.0.0:5140` 형식)
//! 3. 설정 파일 (`sysgrok.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), sysgrok_core::error::SysgrokError> {
//! use sysgrok_core::config::SysgrokConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = SysgrokConfig::load("sysgrok.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = SysgrokConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, SysgrokError};

/// 수집 큐 최대 용량
const MAX_QUEUE_CAPACITY: usize = 1_000_000;
/// 최대 파티션 수
const MAX_PARTITIONS: u32 = 1024;
/// 최대 syslog 메시지 크기 (바이트)
const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// sysgrok 통합 설정
///
/// `sysgrok.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SysgrokConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// syslog 수집 설정
    #[serde(default)]
    pub syslog: SyslogConfig,
    /// 메시지 큐 발행 설정
    #[serde(default)]
    pub publisher: PublisherConfig,
    /// 메트릭 노출 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl SysgrokConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SysgrokError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, SysgrokError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SysgrokError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                SysgrokError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, SysgrokError> {
        toml::from_str(toml_str).map_err(|e| {
            SysgrokError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `SYSGROK_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "SYSGROK_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "SYSGROK_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.pid_file, "SYSGROK_GENERAL_PID_FILE");

        // Syslog
        override_bool(&mut self.syslog.enabled, "SYSGROK_SYSLOG_ENABLED");
        override_csv(&mut self.syslog.sources, "SYSGROK_SYSLOG_SOURCES");
        override_string(&mut self.syslog.tcp_bind, "SYSGROK_SYSLOG_TCP_BIND");
        override_string(&mut self.syslog.udp_bind, "SYSGROK_SYSLOG_UDP_BIND");
        override_usize(
            &mut self.syslog.queue_capacity,
            "SYSGROK_SYSLOG_QUEUE_CAPACITY",
        );
        override_u64(
            &mut self.syslog.drain_timeout_secs,
            "SYSGROK_SYSLOG_DRAIN_TIMEOUT_SECS",
        );
        override_string(&mut self.syslog.parser_dir, "SYSGROK_SYSLOG_PARSER_DIR");
        override_usize(
            &mut self.syslog.max_message_size,
            "SYSGROK_SYSLOG_MAX_MESSAGE_SIZE",
        );
        override_usize(
            &mut self.syslog.max_tcp_connections,
            "SYSGROK_SYSLOG_MAX_TCP_CONNECTIONS",
        );

        // Publisher
        override_bool(&mut self.publisher.enabled, "SYSGROK_PUBLISHER_ENABLED");
        override_csv(&mut self.publisher.brokers, "SYSGROK_PUBLISHER_BROKERS");
        override_string(
            &mut self.publisher.topic_prefix,
            "SYSGROK_PUBLISHER_TOPIC_PREFIX",
        );
        override_u32(&mut self.publisher.partitions, "SYSGROK_PUBLISHER_PARTITIONS");
        override_u64(
            &mut self.publisher.activity_check_period_ms,
            "SYSGROK_PUBLISHER_ACTIVITY_CHECK_PERIOD_MS",
        );
        override_u64(
            &mut self.publisher.tick_interval_ms,
            "SYSGROK_PUBLISHER_TICK_INTERVAL_MS",
        );
        override_u64(
            &mut self.publisher.metadata_timeout_ms,
            "SYSGROK_PUBLISHER_METADATA_TIMEOUT_MS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "SYSGROK_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "SYSGROK_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "SYSGROK_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), SysgrokError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.syslog.enabled {
            self.syslog.validate()?;
        }
        if self.publisher.enabled {
            self.publisher.validate()?;
        }
        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid("metrics.port", "must be greater than 0".to_owned()));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> SysgrokError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// PID 파일 경로 (빈 문자열이면 기록하지 않음)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            pid_file: String::new(),
        }
    }
}

/// syslog 수집 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyslogConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수집 소스 (syslog_tcp, syslog_udp)
    pub sources: Vec<String>,
    /// TCP 수신 주소
    pub tcp_bind: String,
    /// UDP 수신 주소
    pub udp_bind: String,
    /// 수집 큐 용량
    pub queue_capacity: usize,
    /// 종료 시 큐 드레인 최대 대기 (초)
    pub drain_timeout_secs: u64,
    /// 파서 설정 문서 디렉토리 (빈 문자열이면 로드하지 않음)
    pub parser_dir: String,
    /// 최대 메시지 크기 (바이트)
    pub max_message_size: usize,
    /// 최대 동시 TCP 연결 수
    pub max_tcp_connections: usize,
}

impl Default for SyslogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sources: vec!["syslog_udp".to_owned(), "syslog_tcp".to_owned()],
            tcp_bind: "0.0.0.0:514".to_owned(),
            udp_bind: "0.0.0.0:514".to_owned(),
            queue_capacity: 10_000,
            drain_timeout_secs: 15,
            parser_dir: String::new(),
            max_message_size: 64 * 1024,
            max_tcp_connections: 256,
        }
    }
}

impl SyslogConfig {
    fn validate(&self) -> Result<(), SysgrokError> {
        let valid_sources = ["syslog_tcp", "syslog_udp"];
        if let Some(bad) = self
            .sources
            .iter()
            .find(|s| !valid_sources.contains(&s.as_str()))
        {
            return Err(invalid(
                "syslog.sources",
                format!(
                    "unknown source '{bad}', expected one of: {}",
                    valid_sources.join(", ")
                ),
            ));
        }
        if self.queue_capacity == 0 || self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(invalid(
                "syslog.queue_capacity",
                format!("must be between 1 and {MAX_QUEUE_CAPACITY}"),
            ));
        }
        if self.max_message_size == 0 || self.max_message_size > MAX_MESSAGE_SIZE {
            return Err(invalid(
                "syslog.max_message_size",
                format!("must be between 1 and {MAX_MESSAGE_SIZE}"),
            ));
        }
        if self.max_tcp_connections == 0 {
            return Err(invalid(
                "syslog.max_tcp_connections",
                "must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }
}

/// 메시지 큐 발행 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 브로커 주소 목록
    pub brokers: Vec<String>,
    /// 토픽 이름 접두어 (파티션 인덱스가 뒤에 붙음)
    pub topic_prefix: String,
    /// 파티션 수
    pub partitions: u32,
    /// 전달 활동 점검 주기 (밀리초)
    pub activity_check_period_ms: u64,
    /// 건강 점검 타이머 주기 (밀리초)
    pub tick_interval_ms: u64,
    /// 브로커 메타데이터 조회 제한 시간 (밀리초)
    pub metadata_timeout_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            brokers: vec!["127.0.0.1:9092".to_owned()],
            topic_prefix: "sysgrok-uve-".to_owned(),
            partitions: 30,
            activity_check_period_ms: 30_000,
            tick_interval_ms: 1_000,
            metadata_timeout_ms: 5_000,
        }
    }
}

impl PublisherConfig {
    fn validate(&self) -> Result<(), SysgrokError> {
        if self.partitions == 0 || self.partitions > MAX_PARTITIONS {
            return Err(invalid(
                "publisher.partitions",
                format!("must be between 1 and {MAX_PARTITIONS}"),
            ));
        }
        if self.topic_prefix.is_empty() {
            return Err(invalid(
                "publisher.topic_prefix",
                "must not be empty".to_owned(),
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(invalid(
                "publisher.tick_interval_ms",
                "must be greater than 0".to_owned(),
            ));
        }
        if self.activity_check_period_ms < self.tick_interval_ms {
            return Err(invalid(
                "publisher.activity_check_period_ms",
                "must not be shorter than tick_interval_ms".to_owned(),
            ));
        }
        if self.metadata_timeout_ms == 0 {
            return Err(invalid(
                "publisher.metadata_timeout_ms",
                "must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }
}

/// 메트릭 노출 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
    /// 엔드포인트 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_u32(target: &mut u32, env_key: &str) {
    override_parsed(target, env_key, "u32");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
