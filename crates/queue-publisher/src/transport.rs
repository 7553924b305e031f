//! 브로커 전송 계층 추상화
//!
//! [`BrokerTransport`]는 메시지 브로커 클라이언트를 추상화합니다. 발행기는 이
//! trait만 사용하므로 실제 브로커 클라이언트와 [`MemoryTransport`](crate::MemoryTransport)를
//! 바꿔 끼울 수 있습니다.
//!
//! # 콜백 모델
//!
//! 전송은 비동기로 완료됩니다. `produce`는 메시지를 전송 계층 큐에 넣기만 하고,
//! 전달 결과와 브로커 이벤트는 `poll`을 호출할 때 [`DeliveryReporter`]로 전달됩니다.
//!
//! ```text
//! QueuePublisher --produce--> BrokerTransport --(poll)--> DeliveryReporter
//!                                                          on_delivery / on_broker_down
//! ```

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;

use crate::error::PublisherError;

/// 메시지마다 붙는 전달 추적 정보
///
/// 전달 콜백에서 실패한 메시지를 식별하는 데 쓰입니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryTag {
    /// 메시지 키
    pub key: String,
    /// 논리 파티션 번호
    pub partition: u32,
    /// 생성자 세대 식별자
    pub generation: String,
}

/// 브로커 메타데이터 조회 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMetadata {
    /// 응답한 브로커 ID
    pub broker_id: i32,
    /// 응답한 브로커 이름
    pub broker_name: String,
    /// 알려진 토픽 수
    pub topic_count: usize,
}

/// 전달 결과와 브로커 이벤트를 받는 콜백
pub trait DeliveryReporter: Send + Sync {
    /// 메시지 하나의 전달 결과를 보고합니다.
    fn on_delivery(&self, tag: &DeliveryTag, result: Result<(), String>);

    /// 모든 브로커에 연결할 수 없게 되었음을 보고합니다.
    fn on_broker_down(&self, reason: &str);
}

/// 메시지 브로커 전송 계층
///
/// 토픽 핸들은 전송 계층이 소유한 자원입니다. 발행기는 종료 시 토픽 핸들을 먼저
/// 놓은 뒤 전송 계층을 놓습니다.
pub trait BrokerTransport: Send + Sync + 'static {
    /// 토픽 핸들 타입
    type Topic: Send + Sync + 'static;

    /// 토픽 핸들을 생성합니다.
    fn create_topic(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Self::Topic, PublisherError>> + Send;

    /// 메시지를 전송 큐에 넣습니다. 전달 결과는 `poll` 시 보고됩니다.
    fn produce(
        &self,
        topic: &Self::Topic,
        partition: i32,
        key: &str,
        value: Bytes,
        tag: DeliveryTag,
    ) -> Result<(), PublisherError>;

    /// 대기 중인 전달 결과와 이벤트를 `reporter`로 전달합니다.
    ///
    /// 전달한 결과 수를 반환합니다.
    fn poll(&self, reporter: &dyn DeliveryReporter) -> usize;

    /// 브로커 메타데이터를 조회합니다.
    fn fetch_metadata(
        &self,
        timeout: Duration,
    ) -> impl Future<Output = Result<BrokerMetadata, PublisherError>> + Send;
}
