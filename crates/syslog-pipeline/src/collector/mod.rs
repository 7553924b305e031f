//! syslog 수집기 -- 네트워크에서 원시 메시지를 받아 수집 큐에 넣습니다.
//!
//! # 수집 소스
//! - [`SyslogUdpCollector`]: 데이터그램 하나가 메시지 하나
//! - [`SyslogTcpCollector`]: 개행 구분, 연결 수 제한, 연결당 처리 중 메시지 제한
//!
//! # 아키텍처
//! 각 수집기는 자체 tokio 태스크에서 실행되며, 수집한 [`RawMessage`]를
//! [`IngestQueue`](crate::queue::IngestQueue)로 전달합니다.

pub mod syslog_tcp;
pub mod syslog_udp;

pub use syslog_tcp::{SyslogTcpCollector, SyslogTcpConfig};
pub use syslog_udp::{SyslogUdpCollector, SyslogUdpConfig};

use std::fmt;
use std::net::IpAddr;
use std::time::SystemTime;

use bytes::Bytes;

/// 메시지 처리가 끝났을 때 한 번 호출되는 해제 콜백
pub type ReleaseHook = Box<dyn FnOnce() + Send + 'static>;

/// 수집된 원시 syslog 메시지
///
/// 수집기가 생성하고 분류기가 소비합니다. 해제 콜백이 있으면 메시지가
/// 처리되거나 버려져 drop될 때 정확히 한 번 호출됩니다.
pub struct RawMessage {
    /// 송신자 주소
    pub source_ip: IpAddr,
    /// 수신 포트
    pub arrival_port: u16,
    /// 원시 메시지 바이트
    pub payload: Bytes,
    /// 수신 시각
    pub received_at: SystemTime,
    /// 수집 소스 유형 (syslog_udp, syslog_tcp)
    pub source_type: &'static str,
    release: Option<ReleaseHook>,
}

impl RawMessage {
    /// 새 메시지를 생성합니다. 수신 시각은 현재 시각입니다.
    pub fn new(
        source_ip: IpAddr,
        arrival_port: u16,
        payload: impl Into<Bytes>,
        source_type: &'static str,
    ) -> Self {
        Self {
            source_ip,
            arrival_port,
            payload: payload.into(),
            received_at: SystemTime::now(),
            source_type,
            release: None,
        }
    }

    /// 해제 콜백을 설정합니다.
    pub fn with_release(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.release = Some(Box::new(hook));
        self
    }

    /// 수신 시각을 지정합니다.
    pub fn with_received_at(mut self, received_at: SystemTime) -> Self {
        self.received_at = received_at;
        self
    }

    /// 송신자 주소 문자열
    pub fn source(&self) -> String {
        self.source_ip.to_string()
    }

    /// 수신 시각 (epoch 기준 마이크로초)
    pub fn received_at_us(&self) -> i64 {
        match self.received_at.duration_since(SystemTime::UNIX_EPOCH) {
            Ok(d) => i64::try_from(d.as_micros()).unwrap_or(i64::MAX),
            Err(_) => 0,
        }
    }
}

impl Drop for RawMessage {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for RawMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawMessage")
            .field("source_ip", &self.source_ip)
            .field("arrival_port", &self.arrival_port)
            .field("payload_len", &self.payload.len())
            .field("received_at", &self.received_at)
            .field("source_type", &self.source_type)
            .field("has_release", &self.release.is_some())
            .finish()
    }
}

/// 수집기 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectorStatus {
    /// 실행 대기 중
    Idle,
    /// 실행 중
    Running,
    /// 에러로 중단됨
    Error(String),
    /// 정상 종료됨
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn localhost() -> IpAddr {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    }

    #[test]
    fn release_hook_runs_once_on_drop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let msg = RawMessage::new(localhost(), 514, "hello", "syslog_udp").with_release(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        drop(msg);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn message_without_hook_drops_cleanly() {
        let msg = RawMessage::new(localhost(), 514, "hello", "syslog_tcp");
        assert_eq!(msg.source(), "127.0.0.1");
        drop(msg);
    }

    #[test]
    fn received_at_micros() {
        let at = SystemTime::UNIX_EPOCH + std::time::Duration::from_micros(1_500);
        let msg = RawMessage::new(localhost(), 514, "x", "syslog_udp").with_received_at(at);
        assert_eq!(msg.received_at_us(), 1_500);
    }

    #[test]
    fn debug_hides_payload() {
        let msg = RawMessage::new(localhost(), 514, "secret", "syslog_udp");
        let text = format!("{msg:?}");
        assert!(text.contains("payload_len: 6"));
        assert!(!text.contains("secret"));
    }
}
