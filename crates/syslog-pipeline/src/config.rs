//! syslog 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`SyslogConfig`](sysgrok_core::config::SyslogConfig)를
//! 기반으로 파이프라인 전용 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use sysgrok_core::config::SysgrokConfig;
//! use sysgrok_syslog_pipeline::config::PipelineConfig;
//!
//! let core_config = SysgrokConfig::default();
//! let config = PipelineConfig::from_core(&core_config.syslog);
//! ```

use std::path::{Component, Path};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collector::{SyslogTcpConfig, SyslogUdpConfig};
use crate::error::SyslogPipelineError;

const VALID_SOURCES: &[&str] = &["syslog_tcp", "syslog_udp"];
const MAX_QUEUE_CAPACITY: usize = 10_000_000;
const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;
const MAX_DRAIN_TIMEOUT_SECS: u64 = 3600;
const MAX_TCP_CONNECTIONS: usize = 65_536;
const MAX_IN_FLIGHT: usize = 100_000;

/// syslog 파이프라인 설정
///
/// core의 `SyslogConfig`에서 파생되며, 파이프라인 내부에서
/// 사용하는 추가 설정을 포함합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수집 소스 목록 (syslog_tcp, syslog_udp)
    pub sources: Vec<String>,
    /// TCP 수신 주소
    pub tcp_bind: String,
    /// UDP 수신 주소
    pub udp_bind: String,
    /// 수집 큐 용량
    pub queue_capacity: usize,
    /// 종료 시 드레인 최대 대기 (초)
    pub drain_timeout_secs: u64,
    /// 파서 설정 문서 디렉토리 (빈 문자열이면 로드하지 않음)
    pub parser_dir: String,
    /// 최대 메시지 크기 (바이트)
    pub max_message_size: usize,
    /// 최대 동시 TCP 연결 수
    pub max_tcp_connections: usize,

    // --- 확장 설정 (core에 없는 추가 필드) ---
    /// TCP 유휴 연결 타임아웃 (초)
    pub tcp_idle_timeout_secs: u64,
    /// TCP 연결당 처리 중 메시지 최대 수
    pub tcp_max_in_flight: usize,
}

impl Default for PipelineConfig {
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
            tcp_idle_timeout_secs: 300,
            tcp_max_in_flight: 64,
        }
    }
}

impl PipelineConfig {
    /// core의 `SyslogConfig`에서 파이프라인 설정을 생성합니다.
    ///
    /// core 설정에 없는 확장 필드는 기본값이 적용됩니다.
    pub fn from_core(core: &sysgrok_core::config::SyslogConfig) -> Self {
        Self {
            enabled: core.enabled,
            sources: core.sources.clone(),
            tcp_bind: core.tcp_bind.clone(),
            udp_bind: core.udp_bind.clone(),
            queue_capacity: core.queue_capacity,
            drain_timeout_secs: core.drain_timeout_secs,
            parser_dir: core.parser_dir.clone(),
            max_message_size: core.max_message_size,
            max_tcp_connections: core.max_tcp_connections,
            ..Self::default()
        }
    }

    /// 해당 수집 소스가 활성화되어 있는지 확인합니다.
    pub fn has_source(&self, source: &str) -> bool {
        self.sources.iter().any(|s| s == source)
    }

    /// 드레인 제한 시간
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }

    /// TCP 수집기 설정
    pub fn tcp_collector(&self) -> SyslogTcpConfig {
        SyslogTcpConfig {
            bind_addr: self.tcp_bind.clone(),
            max_connections: self.max_tcp_connections,
            max_message_size: self.max_message_size,
            connection_timeout_secs: self.tcp_idle_timeout_secs,
            max_in_flight: self.tcp_max_in_flight,
        }
    }

    /// UDP 수집기 설정
    pub fn udp_collector(&self) -> SyslogUdpConfig {
        SyslogUdpConfig {
            bind_addr: self.udp_bind.clone(),
            max_message_size: self.max_message_size,
        }
    }

    /// 파서 디렉토리 경로가 안전한지 검증합니다 (path traversal 방지).
    fn validate_parser_dir(dir: &str) -> Result<(), SyslogPipelineError> {
        if dir.is_empty() {
            return Ok(());
        }
        if Path::new(dir)
            .components()
            .any(|c| c == Component::ParentDir)
        {
            return Err(config_error(
                "parser_dir",
                format!("parser dir '{dir}' contains path traversal pattern '..'"),
            ));
        }
        Ok(())
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), SyslogPipelineError> {
        if let Some(bad) = self
            .sources
            .iter()
            .find(|s| !VALID_SOURCES.contains(&s.as_str()))
        {
            return Err(config_error(
                "sources",
                format!("unknown source '{bad}', expected one of: {}", VALID_SOURCES.join(", ")),
            ));
        }

        if self.queue_capacity == 0 || self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(config_error(
                "queue_capacity",
                format!("must be 1-{MAX_QUEUE_CAPACITY}"),
            ));
        }

        if self.max_message_size == 0 || self.max_message_size > MAX_MESSAGE_SIZE {
            return Err(config_error(
                "max_message_size",
                format!("must be 1-{MAX_MESSAGE_SIZE}"),
            ));
        }

        if self.drain_timeout_secs > MAX_DRAIN_TIMEOUT_SECS {
            return Err(config_error(
                "drain_timeout_secs",
                format!("must be at most {MAX_DRAIN_TIMEOUT_SECS}"),
            ));
        }

        if self.max_tcp_connections == 0 || self.max_tcp_connections > MAX_TCP_CONNECTIONS {
            return Err(config_error(
                "max_tcp_connections",
                format!("must be 1-{MAX_TCP_CONNECTIONS}"),
            ));
        }

        if self.tcp_max_in_flight == 0 || self.tcp_max_in_flight > MAX_IN_FLIGHT {
            return Err(config_error(
                "tcp_max_in_flight",
                format!("must be 1-{MAX_IN_FLIGHT}"),
            ));
        }

        if self.tcp_idle_timeout_secs == 0 {
            return Err(config_error("tcp_idle_timeout_secs", "must be greater than 0"));
        }

        Self::validate_parser_dir(&self.parser_dir)
    }
}

fn config_error(field: &str, reason: impl Into<String>) -> SyslogPipelineError {
    SyslogPipelineError::Config {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 활성화 여부를 설정합니다.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// 수집 소스를 설정합니다.
    pub fn sources(mut self, sources: Vec<String>) -> Self {
        self.config.sources = sources;
        self
    }

    /// TCP 수신 주소를 설정합니다.
    pub fn tcp_bind(mut self, bind: impl Into<String>) -> Self {
        self.config.tcp_bind = bind.into();
        self
    }

    /// UDP 수신 주소를 설정합니다.
    pub fn udp_bind(mut self, bind: impl Into<String>) -> Self {
        self.config.udp_bind = bind.into();
        self
    }

    /// 수집 큐 용량을 설정합니다.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// 드레인 제한 시간(초)을 설정합니다.
    pub fn drain_timeout_secs(mut self, secs: u64) -> Self {
        self.config.drain_timeout_secs = secs;
        self
    }

    /// 파서 설정 디렉토리를 설정합니다.
    pub fn parser_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.parser_dir = dir.into();
        self
    }

    /// 최대 메시지 크기를 설정합니다.
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// 최대 동시 TCP 연결 수를 설정합니다.
    pub fn max_tcp_connections(mut self, max: usize) -> Self {
        self.config.max_tcp_connections = max;
        self
    }

    /// TCP 연결당 처리 중 메시지 최대 수를 설정합니다.
    pub fn tcp_max_in_flight(mut self, max: usize) -> Self {
        self.config.tcp_max_in_flight = max;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, SyslogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn from_core_preserves_values() {
        let core = sysgrok_core::config::SyslogConfig {
            sources: vec!["syslog_udp".to_owned()],
            udp_bind: "127.0.0.1:5140".to_owned(),
            queue_capacity: 200,
            parser_dir: "/etc/sysgrok/parsers".to_owned(),
            ..Default::default()
        };
        let config = PipelineConfig::from_core(&core);
        assert_eq!(config.udp_bind, "127.0.0.1:5140");
        assert_eq!(config.queue_capacity, 200);
        assert_eq!(config.parser_dir, "/etc/sysgrok/parsers");
        assert!(config.has_source("syslog_udp"));
        assert!(!config.has_source("syslog_tcp"));
        // 확장 필드는 기본값
        assert_eq!(config.tcp_max_in_flight, 64);
    }

    #[test]
    fn collector_configs_follow_pipeline_values() {
        let config = PipelineConfigBuilder::new()
            .tcp_bind("127.0.0.1:6514")
            .max_message_size(1024)
            .max_tcp_connections(8)
            .build()
            .unwrap();
        let tcp = config.tcp_collector();
        assert_eq!(tcp.bind_addr, "127.0.0.1:6514");
        assert_eq!(tcp.max_connections, 8);
        assert_eq!(tcp.max_message_size, 1024);
        assert_eq!(config.udp_collector().max_message_size, 1024);
    }

    #[test]
    fn validate_rejects_unknown_source() {
        let config = PipelineConfig {
            sources: vec!["file".to_owned()],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("unknown source 'file'"));
    }

    #[test]
    fn validate_rejects_zero_queue_capacity() {
        let result = PipelineConfigBuilder::new().queue_capacity(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn validate_rejects_parser_dir_traversal() {
        let result = PipelineConfigBuilder::new()
            .parser_dir("/etc/sysgrok/../../root")
            .build();
        assert!(matches!(
            result,
            Err(SyslogPipelineError::Config { ref field, .. }) if field == "parser_dir"
        ));
    }

    #[test]
    fn empty_sources_is_allowed() {
        PipelineConfigBuilder::new().sources(Vec::new()).build().unwrap();
    }

    #[test]
    fn drain_timeout_duration() {
        let config = PipelineConfigBuilder::new().drain_timeout_secs(3).build().unwrap();
        assert_eq!(config.drain_timeout(), Duration::from_secs(3));
    }
}
