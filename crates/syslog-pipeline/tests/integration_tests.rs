//! 통합 테스트 -- 수집부터 통계 레코드까지의 전체 흐름 검증

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::mpsc;

use sysgrok_core::plugin::Plugin;
use sysgrok_core::types::{AlarmEvent, StatValue};
use sysgrok_syslog_pipeline::{
    ChannelAlarmReporter, ChannelStatsWriter, CompileState, MetricType, ParserRegistry,
    ParserUpdate, PipelineConfigBuilder, RawMessage, StatsDispatcher, SyslogClassifier,
    SyslogPipelineBuilder,
};

fn free_port() -> u16 {
    let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap().port()
}

fn free_tcp_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn latency_documents() -> Vec<serde_json::Value> {
    vec![
        json!({"syslog_parser": {
            "fq_name": ["global", "app1-evt1", "latency_parser"],
            "pattern": {"pattern_string": "latency=%{INT:latency} region=%{WORD:region}"},
            "query_tags": {"tag_list": ["region"]},
            "metrics": {"metric_list": [{"name": "latency", "data_type": "int"}]}
        }}),
        json!({"rfc5424": {
            "fq_name": ["global", "app1-evt1"],
            "rfc5424_config": {"hostname_as_tag": true}
        }}),
    ]
}

/// 설정 문서 -> 레지스트리 -> 분류기 -> 통계 레코드 흐름
#[tokio::test]
async fn documents_drive_classification() {
    let registry = Arc::new(ParserRegistry::new(None).unwrap());
    for doc in latency_documents() {
        registry.apply_document(&doc, true).unwrap();
    }

    let (writer, mut stats_rx) = ChannelStatsWriter::channel(16);
    let classifier = SyslogClassifier::new(Arc::clone(&registry), StatsDispatcher::new(Arc::new(writer)));

    let msg = RawMessage::new(
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)),
        514,
        "<14>1 2024-01-15T12:00:00+01:00 web01 app1 77 evt1 - latency=42 region=eu",
        "syslog_udp",
    );
    classifier.classify(&msg);

    let record = stats_rx.recv().await.unwrap();
    assert_eq!(record.table, "latency_parser");
    assert_eq!(record.metric, "latency");
    assert_eq!(record.value(), Some(&StatValue::Int(42)));
    assert_eq!(record.tags["Source"], "192.168.1.10");
    assert_eq!(record.tags["region"], "eu");
    assert_eq!(record.tags["hostname"], "web01");
    // 12:00+01:00 == 11:00Z
    assert_eq!(record.timestamp_us, 1_705_316_400_000_000);

    // 삭제 후에는 더 이상 매칭되지 않음
    registry.apply_document(&latency_documents()[0], false).unwrap();
    let result = classifier.classify(&msg);
    assert!(matches!(
        result,
        sysgrok_syslog_pipeline::Classification::Rfc5424 { matched: 0, .. }
    ));
}

/// 잘못된 패턴을 두 번 적용하면 알람은 한 번, 복구하면 해제 알람
#[tokio::test]
async fn compile_alarm_raised_once_and_cleared() {
    let (reporter, mut alarm_rx) = ChannelAlarmReporter::channel(8);
    let registry = ParserRegistry::new(Some(Arc::new(reporter))).unwrap();

    let bad = ParserUpdate::with_pattern("%{NOPE:x}");
    assert!(registry.add_or_update("p", "d", bad.clone()).unwrap().is_error());
    assert!(registry.add_or_update("p", "d", bad).unwrap().is_error());
    assert_eq!(
        registry
            .add_or_update("p", "d", ParserUpdate::with_pattern("%{INT:x}"))
            .unwrap(),
        CompileState::Compiled
    );

    assert_eq!(alarm_rx.recv().await.unwrap(), AlarmEvent::raised("p"));
    assert_eq!(alarm_rx.recv().await.unwrap(), AlarmEvent::cleared("p"));
    assert!(alarm_rx.try_recv().is_err());
}

/// 파서를 다른 도메인으로 다시 등록하면 새 도메인에만 속함
#[test]
fn parser_domain_reassignment() {
    let registry = ParserRegistry::new(None).unwrap();
    let update = ParserUpdate::with_pattern("v=%{INT:v}").metric("v", MetricType::Int);
    registry.add_or_update("p", "a-1", update.clone()).unwrap();
    registry.add_or_update("p", "b-2", update).unwrap();

    assert!(registry.domain_members("a-1").is_empty());
    assert_eq!(registry.domain_members("b-2"), vec!["p".to_owned()]);
    assert!(registry.route("a-1", "v=1").is_none());
    assert!(registry.route("b-2", "v=1").is_some());
}

/// 실제 UDP/TCP 수집기를 거친 전체 파이프라인
#[tokio::test]
async fn pipeline_over_network() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("latency.json"),
        serde_json::to_string(&latency_documents()).unwrap(),
    )
    .unwrap();

    let udp_port = free_port();
    let tcp_port = free_tcp_port();
    let config = PipelineConfigBuilder::new()
        .udp_bind(format!("127.0.0.1:{udp_port}"))
        .tcp_bind(format!("127.0.0.1:{tcp_port}"))
        .parser_dir(dir.path().to_string_lossy())
        .drain_timeout_secs(1)
        .build()
        .unwrap();

    let (record_tx, mut record_rx) = mpsc::channel(16);
    let (mut pipeline, stats_rx) = SyslogPipelineBuilder::new()
        .config(config)
        .record_sender(record_tx)
        .build()
        .unwrap();
    let mut stats_rx = stats_rx.unwrap();

    pipeline.start().await.unwrap();
    // 수집기 바인드 대기
    tokio::time::sleep(Duration::from_millis(100)).await;

    let udp = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    udp.send_to(
        b"<14>1 2024-01-15T12:00:00Z web01 app1 1 evt1 - latency=5 region=us",
        ("127.0.0.1", udp_port),
    )
    .await
    .unwrap();

    let record = tokio::time::timeout(Duration::from_secs(5), stats_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.value(), Some(&StatValue::Int(5)));
    assert_eq!(record.tags["Source"], "127.0.0.1");

    let mut tcp = TcpStream::connect(("127.0.0.1", tcp_port)).await.unwrap();
    tcp.write_all(b"<34>Oct 11 22:14:15 mymachine su: 'su root' failed\n")
        .await
        .unwrap();

    let bsd = tokio::time::timeout(Duration::from_secs(5), record_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bsd.facility, 4);
    assert_eq!(bsd.severity, 2);
    assert_eq!(bsd.hostname, "mymachine");
    assert_eq!(bsd.prog, "su");
    assert_eq!(bsd.body, "'su root' failed");

    assert!(pipeline.health_check().await.is_healthy());
    pipeline.stop().await.unwrap();
    assert_eq!(pipeline.state_name(), "stopped");
    assert_eq!(pipeline.processed_count(), 2);
}

/// 레지스트리 조회 결과는 JSON으로 직렬화 가능
#[test]
fn introspection_serializes() {
    let registry = ParserRegistry::new(None).unwrap();
    registry
        .add_or_update("broken", "d-1", ParserUpdate::with_pattern("%{MISSING}"))
        .unwrap();

    let value = serde_json::to_value(registry.introspect()).unwrap();
    assert_eq!(value["preconfigured"][0]["name"], "SYSLOG5424");
    assert_eq!(value["configured"][0]["name"], "broken");
    assert_eq!(value["configured"][0]["state"]["state"], "error");
    assert!(
        value["base_patterns"]
            .as_array()
            .unwrap()
            .iter()
            .any(|p| p["name"] == "IPV4")
    );
}
