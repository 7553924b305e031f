//! TCP Syslog 수집기
//!
//! 개행으로 구분된 syslog 메시지를 TCP 소켓으로 수신합니다.
//!
//! # 흐름 제어
//! - 연결 수는 세마포어로 제한되며, 초과 연결은 즉시 닫힙니다.
//! - 연결마다 처리 중 메시지 수를 제한합니다. 허가는 메시지의 해제 콜백에서
//!   반환되므로, 분류가 밀리면 해당 연결의 읽기가 멈춥니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{CollectorStatus, RawMessage};
use crate::error::SyslogPipelineError;
use crate::queue::IngestQueue;

/// 수집 소스 유형 이름
pub const SOURCE_TYPE: &str = "syslog_tcp";

/// TCP syslog 수집기 설정
#[derive(Debug, Clone)]
pub struct SyslogTcpConfig {
    /// 바인드 주소 (예: "0.0.0.0:514")
    pub bind_addr: String,
    /// 최대 동시 연결 수
    pub max_connections: usize,
    /// 최대 메시지 크기 (바이트, 개행 제외)
    pub max_message_size: usize,
    /// 유휴 연결 타임아웃 (초)
    pub connection_timeout_secs: u64,
    /// 연결당 처리 중 메시지 최대 수
    pub max_in_flight: usize,
}

impl Default for SyslogTcpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:514".to_owned(),
            max_connections: 256,
            max_message_size: 64 * 1024,  // 64KB
            connection_timeout_secs: 300, // 5 minutes
            max_in_flight: 64,
        }
    }
}

/// TCP Syslog 수집기
///
/// 각 TCP 연결은 별도의 tokio 태스크에서 처리됩니다.
pub struct SyslogTcpCollector {
    config: SyslogTcpConfig,
    queue: IngestQueue,
    cancel_token: CancellationToken,
    status: CollectorStatus,
    active_connections: Arc<AtomicUsize>,
}

impl SyslogTcpCollector {
    /// 새 TCP syslog 수집기를 생성합니다.
    pub fn new(config: SyslogTcpConfig, queue: IngestQueue, cancel_token: CancellationToken) -> Self {
        Self {
            config,
            queue,
            cancel_token,
            status: CollectorStatus::Idle,
            active_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 설정된 주소에 바인드하고 취소될 때까지 연결을 수락합니다.
    pub async fn run(&mut self) -> Result<(), SyslogPipelineError> {
        let listener = TcpListener::bind(&self.config.bind_addr)
            .await
            .map_err(|e| {
                let err = collector_error(format!("failed to bind to {}: {e}", self.config.bind_addr));
                self.status = CollectorStatus::Error(err.to_string());
                err
            })?;
        self.serve(listener).await
    }

    /// 이미 바인드된 리스너로 연결 수락 루프를 실행합니다.
    pub async fn serve(&mut self, listener: TcpListener) -> Result<(), SyslogPipelineError> {
        self.status = CollectorStatus::Running;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "tcp syslog collector listening");

        let connection_semaphore = Arc::new(Semaphore::new(self.config.max_connections.max(1)));

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, peer) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!(error = %e, "tcp accept failed");
                            continue;
                        }
                    };

                    let Ok(permit) = Arc::clone(&connection_semaphore).try_acquire_owned() else {
                        warn!(peer = %peer, max = self.config.max_connections, "max connections reached, rejecting connection");
                        continue;
                    };
                    debug!(peer = %peer, "accepted tcp connection");

                    let connection = Connection {
                        queue: self.queue.clone(),
                        config: self.config.clone(),
                        peer,
                        arrival_port: local_addr.port(),
                        cancel: self.cancel_token.clone(),
                    };
                    let active = Arc::clone(&self.active_connections);
                    active.fetch_add(1, Ordering::Relaxed);

                    tokio::spawn(async move {
                        if let Err(e) = connection.handle(stream).await {
                            debug!(peer = %peer, error = %e, "tcp connection closed with error");
                        }
                        active.fetch_sub(1, Ordering::Relaxed);
                        drop(permit);
                    });
                }
                _ = self.cancel_token.cancelled() => {
                    info!(addr = %local_addr, "tcp syslog collector received shutdown signal");
                    self.status = CollectorStatus::Stopped;
                    break;
                }
            }
        }

        Ok(())
    }

    /// 바인드 주소를 반환합니다.
    pub fn bind_addr(&self) -> &str {
        &self.config.bind_addr
    }

    /// 현재 활성 연결 수를 반환합니다.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// 현재 상태를 반환합니다.
    pub fn status(&self) -> &CollectorStatus {
        &self.status
    }
}

/// 단일 TCP 연결 처리기
struct Connection {
    queue: IngestQueue,
    config: SyslogTcpConfig,
    peer: SocketAddr,
    arrival_port: u16,
    cancel: CancellationToken,
}

impl Connection {
    async fn handle(self, stream: TcpStream) -> Result<(), SyslogPipelineError> {
        let mut reader = BufReader::new(stream);
        let idle_timeout = Duration::from_secs(self.config.connection_timeout_secs);
        let in_flight = Arc::new(Semaphore::new(self.config.max_in_flight.max(1)));
        let max_size = self.config.max_message_size;
        let mut line = Vec::new();

        loop {
            line.clear();
            let mut limited = (&mut reader).take(max_size as u64 + 1);

            let read = tokio::select! {
                result = timeout(idle_timeout, limited.read_until(b'\n', &mut line)) => result,
                _ = self.cancel.cancelled() => {
                    debug!(peer = %self.peer, "tcp connection received shutdown signal");
                    return Ok(());
                }
            };

            match read {
                Ok(Ok(0)) => {
                    debug!(peer = %self.peer, "connection closed by peer");
                    return Ok(());
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    debug!(peer = %self.peer, "idle tcp connection timed out");
                    return Ok(());
                }
            }

            if !line.ends_with(b"\n") && line.len() > max_size {
                warn!(
                    peer = %self.peer,
                    max = max_size,
                    "message exceeds max size, closing connection"
                );
                return Err(collector_error("message exceeds max size"));
            }

            let end = line
                .iter()
                .rposition(|b| !matches!(b, b'\n' | b'\r'))
                .map_or(0, |i| i + 1);
            if end == 0 {
                continue;
            }
            line.truncate(end);

            let permit = tokio::select! {
                permit = Arc::clone(&in_flight).acquire_owned() => {
                    permit.map_err(|e| SyslogPipelineError::Channel(e.to_string()))?
                }
                _ = self.cancel.cancelled() => return Ok(()),
            };

            let payload = Bytes::from(std::mem::take(&mut line));
            let msg = RawMessage::new(self.peer.ip(), self.arrival_port, payload, SOURCE_TYPE)
                .with_release(move || drop(permit));
            self.queue.enqueue_wait(msg).await?;
        }
    }
}

fn collector_error(reason: impl Into<String>) -> SyslogPipelineError {
    SyslogPipelineError::Collector {
        source_type: SOURCE_TYPE.to_owned(),
        reason: reason.into(),
    }
}
