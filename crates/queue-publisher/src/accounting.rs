//! 전달 집계
//!
//! 전달 콜백은 성공 수를 올리고, 연결 점검은 이를 원자적으로 꺼내 0으로 되돌립니다.
//! 브로커 다운 이벤트는 발행기를 비활성화합니다.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::error;

use sysgrok_core::metrics as m;

use crate::transport::{DeliveryReporter, DeliveryTag};

/// 전달 성공/실패 집계와 비활성화 플래그
#[derive(Debug, Default)]
pub struct DeliveryAccounting {
    /// 마지막 점검 이후 전달 성공 수
    delivered: AtomicU64,
    /// 누적 전달 실패 수
    failed: AtomicU64,
    /// 누적 전달 성공 수
    delivered_total: AtomicU64,
    /// 브로커 다운으로 발행이 중단되었는지 여부
    disabled: AtomicBool,
}

impl DeliveryAccounting {
    /// 빈 집계를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 마지막 점검 이후 전달 성공 수를 꺼내고 0으로 초기화합니다.
    pub fn take_delivered(&self) -> u64 {
        self.delivered.swap(0, Ordering::AcqRel)
    }

    /// 마지막 점검 이후 전달 성공 수
    pub fn pending_delivered(&self) -> u64 {
        self.delivered.load(Ordering::Acquire)
    }

    /// 누적 전달 성공 수
    pub fn delivered_total(&self) -> u64 {
        self.delivered_total.load(Ordering::Relaxed)
    }

    /// 누적 전달 실패 수
    pub fn failed_total(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// 발행이 비활성화되었는지 확인합니다.
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    /// 비활성화 플래그를 설정합니다. 이전 값을 반환합니다.
    pub fn set_disabled(&self, disabled: bool) -> bool {
        self.disabled.swap(disabled, Ordering::AcqRel)
    }
}

impl DeliveryReporter for DeliveryAccounting {
    fn on_delivery(&self, tag: &DeliveryTag, result: Result<(), String>) {
        match result {
            Ok(()) => {
                self.delivered.fetch_add(1, Ordering::AcqRel);
                self.delivered_total.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(m::PUBLISHER_DELIVERED_TOTAL).increment(1);
            }
            Err(reason) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(m::PUBLISHER_DELIVERY_FAILURES_TOTAL).increment(1);
                error!(
                    key = %tag.key,
                    partition = tag.partition,
                    generation = %tag.generation,
                    error = %reason,
                    "message delivery failed"
                );
            }
        }
    }

    fn on_broker_down(&self, reason: &str) {
        if !self.set_disabled(true) {
            error!(error = %reason, "all brokers down, disabling publisher");
        }
    }
}
