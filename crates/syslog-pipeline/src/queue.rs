//! 수집 큐 -- 수집기와 분류 워커 사이의 유한 용량 채널
//!
//! 여러 수집기가 [`IngestQueue`]를 복제해 메시지를 넣고, 분류 워커 하나가
//! [`IngestReceiver`]로 소비합니다.
//!
//! # 포화 정책
//! - [`IngestQueue::enqueue`]: 대기하지 않고, 가득 차면 메시지를 버리고 에러 반환 (UDP)
//! - [`IngestQueue::enqueue_wait`]: 자리가 날 때까지 대기 (TCP 역압)
//!
//! 버려진 메시지는 drop되면서 해제 콜백이 호출됩니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use sysgrok_core::metrics as m;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;

use crate::collector::RawMessage;
use crate::error::SyslogPipelineError;

struct QueueShared {
    accepting: AtomicBool,
    capacity: usize,
    received: AtomicU64,
    dropped: AtomicU64,
}

impl QueueShared {
    fn record_drop(&self, count: u64) {
        self.dropped.fetch_add(count, Ordering::Relaxed);
        metrics::counter!(m::SYSLOG_MESSAGES_DROPPED_TOTAL).increment(count);
    }
}

/// 수집 큐 생산자 측
#[derive(Clone)]
pub struct IngestQueue {
    tx: mpsc::Sender<RawMessage>,
    shared: Arc<QueueShared>,
}

/// 수집 큐 소비자 측
pub struct IngestReceiver {
    rx: mpsc::Receiver<RawMessage>,
    shared: Arc<QueueShared>,
}

/// 종료 시 드레인 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// 처리된 메시지 수
    pub processed: usize,
    /// 시간 초과로 버려진 메시지 수
    pub discarded: usize,
}

/// 주어진 용량의 수집 큐를 생성합니다.
pub fn ingest_channel(capacity: usize) -> (IngestQueue, IngestReceiver) {
    let capacity = capacity.max(1);
    let (tx, rx) = mpsc::channel(capacity);
    let shared = Arc::new(QueueShared {
        accepting: AtomicBool::new(true),
        capacity,
        received: AtomicU64::new(0),
        dropped: AtomicU64::new(0),
    });
    (
        IngestQueue {
            tx,
            shared: Arc::clone(&shared),
        },
        IngestReceiver { rx, shared },
    )
}

impl IngestQueue {
    /// 메시지를 대기 없이 넣습니다.
    ///
    /// # Errors
    /// - 큐가 가득 찬 경우 [`SyslogPipelineError::QueueFull`]
    /// - 큐가 닫힌 경우 [`SyslogPipelineError::QueueClosed`]
    pub fn enqueue(&self, msg: RawMessage) -> Result<(), SyslogPipelineError> {
        if !self.is_accepting() {
            self.shared.record_drop(1);
            return Err(SyslogPipelineError::QueueClosed);
        }

        let source = msg.source_type;
        match self.tx.try_send(msg) {
            Ok(()) => {
                self.record_received(source);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.shared.record_drop(1);
                tracing::debug!(
                    capacity = self.shared.capacity,
                    source = source,
                    "ingest queue full, dropped message"
                );
                Err(SyslogPipelineError::QueueFull {
                    capacity: self.shared.capacity,
                })
            }
            Err(TrySendError::Closed(_)) => {
                self.shared.record_drop(1);
                Err(SyslogPipelineError::QueueClosed)
            }
        }
    }

    /// 자리가 날 때까지 기다렸다가 메시지를 넣습니다.
    ///
    /// # Errors
    /// 큐가 닫힌 경우 [`SyslogPipelineError::QueueClosed`]
    pub async fn enqueue_wait(&self, msg: RawMessage) -> Result<(), SyslogPipelineError> {
        if !self.is_accepting() {
            self.shared.record_drop(1);
            return Err(SyslogPipelineError::QueueClosed);
        }

        let source = msg.source_type;
        match self.tx.send(msg).await {
            Ok(()) => {
                self.record_received(source);
                Ok(())
            }
            Err(_) => {
                self.shared.record_drop(1);
                Err(SyslogPipelineError::QueueClosed)
            }
        }
    }

    fn record_received(&self, source: &'static str) {
        self.shared.received.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::SYSLOG_MESSAGES_RECEIVED_TOTAL, m::LABEL_SOURCE => source).increment(1);
    }

    /// 새 메시지 수신을 중단합니다. 이미 들어간 메시지는 소비자가 계속 꺼낼 수 있습니다.
    pub fn close(&self) {
        self.shared.accepting.store(false, Ordering::Release);
    }

    /// 메시지를 받는 중인지 확인합니다.
    pub fn is_accepting(&self) -> bool {
        self.shared.accepting.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    /// 현재 대기 중인 메시지 수
    pub fn len(&self) -> usize {
        self.shared.capacity.saturating_sub(self.tx.capacity())
    }

    /// 대기 중인 메시지가 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 최대 용량
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// 사용률 (0.0 - 1.0)
    pub fn utilization(&self) -> f64 {
        self.len() as f64 / self.shared.capacity as f64
    }

    /// 누적 수신 메시지 수
    pub fn received_count(&self) -> u64 {
        self.shared.received.load(Ordering::Relaxed)
    }

    /// 누적 드롭 메시지 수
    pub fn dropped_count(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

impl IngestReceiver {
    /// 다음 메시지를 기다립니다. 큐가 닫히고 비면 `None`을 반환합니다.
    pub async fn recv(&mut self) -> Option<RawMessage> {
        let msg = self.rx.recv().await;
        metrics::gauge!(m::SYSLOG_QUEUE_DEPTH).set(self.rx.len() as f64);
        msg
    }

    /// 큐를 닫습니다. 새 메시지는 거부되고, 남은 메시지는 [`drain`](Self::drain)으로 꺼냅니다.
    pub fn close(&mut self) {
        self.shared.accepting.store(false, Ordering::Release);
        self.rx.close();
    }

    /// 남은 메시지를 제한 시간 안에서 처리하고, 시간이 지나면 나머지를 버립니다.
    ///
    /// 버린 메시지는 드롭 카운터에 더해집니다.
    pub fn drain(&mut self, timeout: Duration, mut handle: impl FnMut(RawMessage)) -> DrainReport {
        let deadline = Instant::now() + timeout;
        let mut report = DrainReport::default();

        while let Ok(msg) = self.rx.try_recv() {
            if Instant::now() >= deadline {
                report.discarded += 1;
                drop(msg);
            } else {
                handle(msg);
                report.processed += 1;
            }
        }

        if report.discarded > 0 {
            self.shared.record_drop(report.discarded as u64);
            tracing::warn!(
                discarded = report.discarded,
                "drain timeout exceeded, discarded remaining messages"
            );
        }
        metrics::gauge!(m::SYSLOG_QUEUE_DEPTH).set(0.0);
        report
    }

    /// 현재 대기 중인 메시지 수
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// 대기 중인 메시지가 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// 누적 드롭 메시지 수
    pub fn dropped_count(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::atomic::AtomicUsize;

    fn msg(payload: &'static str) -> RawMessage {
        RawMessage::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 514, payload, "syslog_udp")
    }

    fn counted(payload: &'static str, released: &Arc<AtomicUsize>) -> RawMessage {
        let released = Arc::clone(released);
        msg(payload).with_release(move || {
            released.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn enqueue_and_receive_in_order() {
        let (queue, mut rx) = ingest_channel(4);
        queue.enqueue(msg("a")).unwrap();
        queue.enqueue(msg("b")).unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(rx.recv().await.unwrap().payload, "a");
        assert_eq!(rx.recv().await.unwrap().payload, "b");
        assert_eq!(queue.received_count(), 2);
    }

    #[test]
    fn full_queue_drops_and_releases() {
        let released = Arc::new(AtomicUsize::new(0));
        let (queue, _rx) = ingest_channel(1);
        queue.enqueue(counted("a", &released)).unwrap();
        let err = queue.enqueue(counted("b", &released)).unwrap_err();

        assert!(matches!(err, SyslogPipelineError::QueueFull { capacity: 1 }));
        assert_eq!(queue.dropped_count(), 1);
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert!((queue.utilization() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn closed_queue_rejects_new_messages() {
        let (queue, _rx) = ingest_channel(4);
        queue.close();
        assert!(!queue.is_accepting());
        assert!(matches!(
            queue.enqueue(msg("a")),
            Err(SyslogPipelineError::QueueClosed)
        ));
    }

    #[tokio::test]
    async fn enqueue_wait_fails_after_receiver_close() {
        let (queue, mut rx) = ingest_channel(1);
        rx.close();
        assert!(matches!(
            queue.enqueue_wait(msg("a")).await,
            Err(SyslogPipelineError::QueueClosed)
        ));
    }

    #[tokio::test]
    async fn enqueue_wait_waits_for_space() {
        let (queue, mut rx) = ingest_channel(1);
        queue.enqueue(msg("a")).unwrap();

        let producer = queue.clone();
        let handle = tokio::spawn(async move { producer.enqueue_wait(msg("b")).await });

        assert_eq!(rx.recv().await.unwrap().payload, "a");
        handle.await.unwrap().unwrap();
        assert_eq!(rx.recv().await.unwrap().payload, "b");
    }

    #[test]
    fn drain_processes_remaining_messages() {
        let (queue, mut rx) = ingest_channel(8);
        for p in ["a", "b", "c"] {
            queue.enqueue(msg(p)).unwrap();
        }
        rx.close();

        let mut seen = Vec::new();
        let report = rx.drain(Duration::from_secs(5), |m| seen.push(m.payload.clone()));
        assert_eq!(report, DrainReport { processed: 3, discarded: 0 });
        assert_eq!(seen, vec!["a", "b", "c"]);
        assert!(rx.is_empty());
    }

    #[test]
    fn drain_discards_after_deadline() {
        let released = Arc::new(AtomicUsize::new(0));
        let (queue, mut rx) = ingest_channel(8);
        for p in ["a", "b"] {
            queue.enqueue(counted(p, &released)).unwrap();
        }
        rx.close();

        let report = rx.drain(Duration::ZERO, |_| panic!("nothing should be processed"));
        assert_eq!(report, DrainReport { processed: 0, discarded: 2 });
        assert_eq!(rx.dropped_count(), 2);
        assert_eq!(released.load(Ordering::SeqCst), 2);
    }
}
