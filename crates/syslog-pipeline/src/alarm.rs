//! 알람 보고 경로 -- 패턴 컴파일 알람을 채널로 전달합니다.

use sysgrok_core::pipeline::AlarmReporter;
use sysgrok_core::types::AlarmEvent;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// mpsc 채널 기반 알람 보고기
///
/// 레지스트리 잠금 밖에서 호출되지만 라우팅을 지연시키지 않도록
/// 대기하지 않고 전송합니다. 채널이 가득 차면 이벤트를 버리고 경고합니다.
pub struct ChannelAlarmReporter {
    tx: mpsc::Sender<AlarmEvent>,
}

impl ChannelAlarmReporter {
    /// 새 보고기와 수신 채널을 생성합니다.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AlarmEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// 기존 송신측으로 보고기를 생성합니다.
    pub fn new(tx: mpsc::Sender<AlarmEvent>) -> Self {
        Self { tx }
    }
}

impl AlarmReporter for ChannelAlarmReporter {
    fn report(&self, event: AlarmEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!(
                    parser = %event.pattern_name,
                    cleared = event.cleared,
                    "alarm channel full, dropping alarm event"
                );
            }
            Err(TrySendError::Closed(event)) => {
                tracing::debug!(
                    parser = %event.pattern_name,
                    "alarm channel closed, dropping alarm event"
                );
            }
        }
    }
}
