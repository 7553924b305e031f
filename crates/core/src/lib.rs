//! sysgrok 공통 크레이트 -- 모든 모듈이 공유하는 타입, trait, 에러, 설정
//!
//! - [`config`]: `sysgrok.toml` 로딩과 검증
//! - [`error`]: 최상위 [`SysgrokError`]와 도메인 에러
//! - [`pipeline`]: 건강 상태와 외부 협력자 trait ([`StatsWriter`], [`AlarmReporter`])
//! - [`plugin`]: 모듈 생명주기 ([`Plugin`], [`PluginRegistry`])
//! - [`types`]: 통계 레코드, 알람 이벤트, 연결 상태
//! - [`metrics`]: 메트릭 이름 상수

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod plugin;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, ParseError, PipelineError, PluginError, StatsError, SysgrokError};

// 설정
pub use config::SysgrokConfig;

// 파이프라인 trait
pub use pipeline::{AlarmReporter, BoxFuture, HealthStatus, StatsWriter};

// 플러그인
pub use plugin::{DynPlugin, Plugin, PluginInfo, PluginRegistry, PluginState, PluginType};

// 도메인 타입
pub use types::{AlarmEvent, ConnectionStatus, StatRecord, StatValue, TagSet};
