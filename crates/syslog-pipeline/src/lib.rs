//! sysgrok syslog 파이프라인 -- syslog 수집, grok 분류, 통계 디스패치
//!
//! # 모듈 구성
//!
//! - [`collector`]: UDP/TCP syslog 수집기와 원시 메시지
//! - [`queue`]: 수집기와 분류 워커 사이의 유한 용량 큐
//! - [`grok`]: 이름 있는 패턴 조합과 앵커 매칭을 제공하는 grok 엔진
//! - [`registry`]: 도메인별 파서 등록/갱신/삭제, 알람, 설정 문서와 로더
//! - [`parser`]: RFC 5424 헤더 정의와 BSD (RFC 3164) 파서
//! - [`classifier`]: 원시 메시지 분류와 도메인 라우팅
//! - [`stats`]: 매칭 필드를 통계 레코드로 변환
//! - [`alarm`]: 패턴 컴파일 알람 채널
//! - [`pipeline`]: 전체 흐름 오케스트레이션 (Plugin trait 구현)
//! - [`config`]: 파이프라인 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! UDP/TCP -> IngestQueue -> SyslogClassifier -+-> ParserRegistry.route -> StatsDispatcher -> StatsWriter
//!                                             +-> BSD SyslogRecord
//! ```

pub mod alarm;
pub mod classifier;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod queue;
pub mod stats;

pub mod collector;
pub mod grok;
pub mod parser;
pub mod registry;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{SyslogPipeline, SyslogPipelineBuilder};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder};

// 에러
pub use error::SyslogPipelineError;

// 수집
pub use collector::{CollectorStatus, RawMessage};
pub use queue::{DrainReport, IngestQueue, IngestReceiver, ingest_channel};

// 파싱
pub use classifier::{Classification, SyslogClassifier};
pub use grok::{ParsedFields, PatternEngine};
pub use parser::{BsdSyslogParser, SyslogRecord};
pub use registry::{
    CompileState, ConfigDocument, MetricType, ParserConfigLoader, ParserDefinition,
    ParserIntrospection, ParserRegistry, ParserUpdate, Rfc5424DomainConfig, RouteMatch,
};

// 출력 경로
pub use alarm::ChannelAlarmReporter;
pub use stats::{ChannelStatsWriter, StatsContext, StatsDispatcher};
