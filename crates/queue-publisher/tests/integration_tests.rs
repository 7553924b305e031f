//! 통합 테스트 -- 발행, 연결 상태 점검, 브로커 다운과 복구 흐름 검증

use std::sync::Arc;
use std::time::Duration;

use sysgrok_core::plugin::PluginRegistry;
use sysgrok_core::types::ConnectionStatus;
use sysgrok_queue_publisher::{
    MemoryTransport, QueuePublisher, QueuePublisherBuilder, QueuePublisherConfig,
    QueuePublisherConfigBuilder, select_partition,
};

fn fast_config() -> QueuePublisherConfig {
    QueuePublisherConfigBuilder::new()
        .topic_prefix("uve-")
        .partitions(4)
        .activity_check_period_ms(3_000)
        .tick_interval_ms(100)
        .metadata_timeout_ms(500)
        .build()
        .unwrap()
}

/// 브로커 다운 -> 발행 중단 -> 메타데이터 조회 성공 -> 재개
#[tokio::test(start_paused = true)]
async fn broker_down_disables_then_resumes() {
    let transport = Arc::new(MemoryTransport::new());
    let mut publisher = QueuePublisher::new(fast_config(), Arc::clone(&transport));
    publisher.start().await.unwrap();
    let handle = publisher.handle();
    let mut status = publisher.subscribe();

    let partition = handle.publish_keyed("latency_parser", "{\"v\":1}", "gen-1");
    assert_eq!(partition, select_partition(b"latency_parser", 4));
    status
        .wait_for(|s| s.connection == ConnectionStatus::Up)
        .await
        .unwrap();

    // 다운 이벤트는 다음 poll에서 보고됨
    transport.set_down(true);
    status.wait_for(|s| s.disabled).await.unwrap();
    assert!(handle.is_disabled());

    handle.publish_keyed("latency_parser", "{\"v\":2}", "gen-1");
    assert_eq!(handle.discarded_count(), 1);

    // 다운 중에는 조회가 실패하므로 재개되지 않음
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(publisher.status().resumes, 0);
    assert_eq!(publisher.status().connection, ConnectionStatus::Down);

    transport.set_down(false);
    status
        .wait_for(|s| s.resumes == 1 && !s.disabled)
        .await
        .unwrap();

    handle.publish_keyed("latency_parser", "{\"v\":3}", "gen-2");
    let records = transport.records(&format!("uve-{partition}"));
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].value, "{\"v\":3}");

    publisher.shutdown().await.unwrap();
}

/// 메타데이터 조회가 제한 시간을 넘으면 비활성 상태 유지
#[tokio::test(start_paused = true)]
async fn slow_metadata_probe_times_out() {
    let transport =
        Arc::new(MemoryTransport::new().with_metadata_delay(Duration::from_secs(2)));
    let mut publisher = QueuePublisher::new(fast_config(), Arc::clone(&transport));
    publisher.start().await.unwrap();
    let mut status = publisher.subscribe();

    transport.set_down(true);
    status.wait_for(|s| s.disabled).await.unwrap();
    transport.set_down(false);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(publisher.status().disabled);
    assert_eq!(publisher.status().resumes, 0);

    transport.set_metadata_delay(Duration::ZERO);
    status.wait_for(|s| s.resumes == 1).await.unwrap();

    publisher.shutdown().await.unwrap();
}

/// 전달 실패는 호출자에게 전파되지 않고 집계만 됨
#[tokio::test(start_paused = true)]
async fn delivery_failures_are_counted() {
    let transport = Arc::new(MemoryTransport::new());
    let mut publisher = QueuePublisher::new(fast_config(), Arc::clone(&transport));
    publisher.start().await.unwrap();
    let handle = publisher.handle();
    let mut status = publisher.subscribe();

    transport.set_fail_deliveries(true);
    for i in 0..3 {
        handle.publish(i, "key", "value", "g");
    }
    assert_eq!(handle.sent_count(), 3);

    // 성공한 전달이 없으므로 첫 점검에서 Down
    status
        .wait_for(|s| s.connection == ConnectionStatus::Down)
        .await
        .unwrap();
    assert_eq!(publisher.accounting().failed_total(), 3);
    assert_eq!(publisher.accounting().delivered_total(), 0);
    assert!(!handle.is_disabled());

    publisher.shutdown().await.unwrap();
}

/// 플러그인 레지스트리를 통한 생명주기
#[tokio::test]
async fn publisher_plugin_in_registry() {
    let service = QueuePublisherBuilder::new()
        .config(fast_config())
        .transport(Arc::new(MemoryTransport::new()))
        .build()
        .unwrap();
    let handle = service.handle();

    let mut registry = PluginRegistry::new();
    registry.register(Box::new(service)).unwrap();
    registry.init_all().await.unwrap();
    registry.start_all().await.unwrap();

    handle.publish(1, "key", "value", "g");
    assert_eq!(handle.sent_count(), 1);

    let health = registry.health_check_all().await;
    assert_eq!(health.len(), 1);
    assert_eq!(health[0].0, "queue-publisher");

    registry.stop_all().await.unwrap();
}
