//! UDP Syslog 수집기
//!
//! 데이터그램 하나를 메시지 하나로 취급합니다. 큐가 가득 차면 대기하지 않고
//! 메시지를 버립니다.

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{CollectorStatus, RawMessage};
use crate::error::SyslogPipelineError;
use crate::queue::IngestQueue;

/// 수집 소스 유형 이름
pub const SOURCE_TYPE: &str = "syslog_udp";

/// UDP syslog 수집기 설정
#[derive(Debug, Clone)]
pub struct SyslogUdpConfig {
    /// 바인드 주소 (예: "0.0.0.0:514")
    pub bind_addr: String,
    /// 최대 메시지 크기 (바이트, UDP이므로 일반적으로 65535 이하)
    pub max_message_size: usize,
}

impl Default for SyslogUdpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:514".to_owned(),
            max_message_size: 65535,
        }
    }
}

/// UDP Syslog 수집기
pub struct SyslogUdpCollector {
    config: SyslogUdpConfig,
    queue: IngestQueue,
    cancel_token: CancellationToken,
    status: CollectorStatus,
}

impl SyslogUdpCollector {
    /// 새 UDP syslog 수집기를 생성합니다.
    pub fn new(config: SyslogUdpConfig, queue: IngestQueue, cancel_token: CancellationToken) -> Self {
        Self {
            config,
            queue,
            cancel_token,
            status: CollectorStatus::Idle,
        }
    }

    /// 설정된 주소에 바인드하고 취소될 때까지 수신합니다.
    pub async fn run(&mut self) -> Result<(), SyslogPipelineError> {
        let socket = UdpSocket::bind(&self.config.bind_addr).await.map_err(|e| {
            let err = SyslogPipelineError::Collector {
                source_type: SOURCE_TYPE.to_owned(),
                reason: format!("failed to bind to {}: {e}", self.config.bind_addr),
            };
            self.status = CollectorStatus::Error(err.to_string());
            err
        })?;
        self.serve(socket).await
    }

    /// 이미 바인드된 소켓으로 수신 루프를 실행합니다.
    pub async fn serve(&mut self, socket: UdpSocket) -> Result<(), SyslogPipelineError> {
        self.status = CollectorStatus::Running;
        let local_addr = socket.local_addr()?;
        info!(addr = %local_addr, "udp syslog collector listening");

        let max_size = self.config.max_message_size.max(1);
        // 한 바이트 여유를 두어 잘린 데이터그램을 구분
        let mut buf = vec![0u8; max_size + 1];

        loop {
            tokio::select! {
                result = socket.recv_from(&mut buf) => {
                    let (len, peer) = match result {
                        Ok(received) => received,
                        Err(e) => {
                            warn!(error = %e, "udp receive failed");
                            continue;
                        }
                    };

                    if len > max_size {
                        warn!(peer = %peer, max = max_size, "datagram exceeds max size, dropping");
                        continue;
                    }
                    if len == 0 {
                        continue;
                    }

                    let msg = RawMessage::new(
                        peer.ip(),
                        local_addr.port(),
                        Bytes::copy_from_slice(&buf[..len]),
                        SOURCE_TYPE,
                    );
                    match self.queue.enqueue(msg) {
                        Ok(()) => {}
                        Err(SyslogPipelineError::QueueClosed) => {
                            debug!("ingest queue closed, stopping udp collector");
                            self.status = CollectorStatus::Stopped;
                            break;
                        }
                        Err(_) => {}
                    }
                }
                _ = self.cancel_token.cancelled() => {
                    info!(addr = %local_addr, "udp syslog collector received shutdown signal");
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

    /// 현재 상태를 반환합니다.
    pub fn status(&self) -> &CollectorStatus {
        &self.status
    }
}
