//! sysgrok 큐 발행기 -- 파티션 토픽 발행, 전달 집계, 연결 상태 점검과 브로커 복구
//!
//! # 모듈 구성
//!
//! - [`partition`]: DJB 해시 기반 파티션 선택
//! - [`transport`]: 브로커 전송 계층 trait과 전달 콜백
//! - [`memory`]: 메모리 내 루프백 전송 계층
//! - [`accounting`]: 전달 성공/실패 집계와 비활성화 플래그
//! - [`health`]: 연결 상태 점검 타이머
//! - [`publisher`]: 발행기와 발행 핸들
//! - [`service`]: 플러그인 래퍼와 빌더
//! - [`config`]: 발행기 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! PublishHandle.publish_keyed -> djb % N -> topic[prefix+i] -> BrokerTransport
//!                                                                |
//!                  timer tick -> poll -> DeliveryAccounting <----+
//!                             \-> check -> status watch (Up/Down/resume)
//! ```

pub mod accounting;
pub mod config;
pub mod error;
pub mod health;
pub mod memory;
pub mod partition;
pub mod publisher;
pub mod service;
pub mod transport;

// --- 주요 타입 re-export ---

pub use accounting::DeliveryAccounting;
pub use config::{QueuePublisherConfig, QueuePublisherConfigBuilder};
pub use error::PublisherError;
pub use health::{HealthTimer, connection_status, should_check};
pub use memory::{MemoryRecord, MemoryTopic, MemoryTransport};
pub use partition::{djb_hash, select_partition};
pub use publisher::{PublishHandle, PublisherStatus, QueuePublisher};
pub use service::{QueuePublisherBuilder, QueuePublisherService};
pub use transport::{BrokerMetadata, BrokerTransport, DeliveryReporter, DeliveryTag};
