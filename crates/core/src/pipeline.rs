//! 파이프라인 trait -- 모듈 확장 포인트 정의
//!
//! 외부 협력자(통계 기록 경로, 알람 보고 경로)는 이 trait을 구현하여
//! 수집 파이프라인에 연결됩니다.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use crate::error::SysgrokError;
use crate::types::{AlarmEvent, StatRecord};

/// `Send` 가능한 boxed future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 모듈 건강 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작하지만 성능 저하
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 동작 불가 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

/// 통계 기록 경로
///
/// 레코드 하나는 독립적인 기록 단위입니다. 한 레코드의 실패가
/// 다른 레코드의 기록을 막아서는 안 됩니다.
pub trait StatsWriter: Send + Sync {
    /// 통계 레코드 하나를 기록합니다.
    fn write(&self, record: StatRecord) -> Result<(), SysgrokError>;
}

/// 알람 보고 경로
///
/// 패턴 컴파일 실패/복구 시 호출됩니다. 레지스트리 잠금 밖에서 호출되므로
/// 구현체가 블로킹하더라도 파서 라우팅을 막지 않습니다.
pub trait AlarmReporter: Send + Sync {
    /// 알람 이벤트를 보고합니다.
    fn report(&self, event: AlarmEvent);
}
