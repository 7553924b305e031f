//! 연결 상태 점검 타이머
//!
//! 타이머는 매 틱마다 단조 시계 차이를 누적합니다. 점검 주기 `P`에 대해 다음 중
//! 하나가 성립하면 점검을 수행하고 누적 시간을 0으로 되돌립니다.
//!
//! - 시작 후 `P`가 지나지 않았고 누적 시간이 `P/3` 이상
//! - 비활성화 상태이고 누적 시간이 `P/3` 이상
//! - 누적 시간이 `P` 초과
//!
//! 시작 직후와 장애 중에는 더 자주 점검합니다.

use std::time::Duration;

use tokio::time::Instant;

use sysgrok_core::types::ConnectionStatus;

/// 점검 수행 여부를 판단합니다.
pub fn should_check(
    since_start: Duration,
    elapsed: Duration,
    disabled: bool,
    period: Duration,
) -> bool {
    let fast = period / 3;
    (since_start < period && elapsed >= fast) || (disabled && elapsed >= fast) || elapsed > period
}

/// 점검 시점의 전달 수로 연결 상태를 판정합니다.
pub fn connection_status(delivered: u64) -> ConnectionStatus {
    if delivered > 0 {
        ConnectionStatus::Up
    } else {
        ConnectionStatus::Down
    }
}

/// 틱 간 경과 시간을 누적하는 점검 타이머 상태
#[derive(Debug, Clone)]
pub struct HealthTimer {
    period: Duration,
    started: Instant,
    last_tick: Instant,
    elapsed: Duration,
}

impl HealthTimer {
    /// `now`를 시작 시각으로 하는 타이머를 생성합니다.
    pub fn new(period: Duration, now: Instant) -> Self {
        Self {
            period,
            started: now,
            last_tick: now,
            elapsed: Duration::ZERO,
        }
    }

    /// 틱 하나를 반영합니다. 점검할 차례면 누적 시간을 초기화하고 `true`를 반환합니다.
    pub fn tick(&mut self, now: Instant, disabled: bool) -> bool {
        self.elapsed += now.saturating_duration_since(self.last_tick);
        self.last_tick = now;

        let since_start = now.saturating_duration_since(self.started);
        if should_check(since_start, self.elapsed, disabled, self.period) {
            self.elapsed = Duration::ZERO;
            true
        } else {
            false
        }
    }

    /// 마지막 점검 이후 누적 시간
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// 점검 주기
    pub fn period(&self) -> Duration {
        self.period
    }
}
