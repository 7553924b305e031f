//! Orchestrator integration tests.
//!
//! Tests the full flow: config -> plugin build -> start -> syslog over UDP
//! -> stats forwarded to the publisher -> health -> shutdown.

use std::time::Duration;

use serde_json::json;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;

use sysgrok_core::config::SysgrokConfig;
use sysgrok_daemon::orchestrator::{self, Orchestrator};

fn free_udp_port() -> u16 {
    let socket = std::net::UdpSocket::bind("127.0.0.1:0").expect("should bind ephemeral port");
    socket.local_addr().expect("should have local addr").port()
}

/// Helper function to create a config with every plugin disabled.
fn minimal_test_config() -> SysgrokConfig {
    let toml_str = r#"
[general]
log_level = "info"
pid_file = ""

[syslog]
enabled = false

[publisher]
enabled = false

[metrics]
enabled = false
"#;
    SysgrokConfig::parse(toml_str).expect("failed to parse minimal config")
}

/// Helper function to create a config with the UDP collector and the publisher.
fn full_test_config(udp_port: u16, parser_dir: &str) -> SysgrokConfig {
    let mut config = minimal_test_config();
    config.syslog.enabled = true;
    config.syslog.sources = vec!["syslog_udp".to_owned()];
    config.syslog.udp_bind = format!("127.0.0.1:{udp_port}");
    config.syslog.drain_timeout_secs = 1;
    config.syslog.parser_dir = parser_dir.to_owned();
    config.publisher.enabled = true;
    config.publisher.partitions = 4;
    config
}

fn write_latency_parser(dir: &std::path::Path) {
    let docs = json!([{"syslog_parser": {
        "fq_name": ["global", "app1-evt1", "latency_parser"],
        "pattern": {"pattern_string": "latency=%{INT:latency}"},
        "metrics": {"metric_list": [{"name": "latency", "data_type": "int"}]}
    }}]);
    std::fs::write(dir.join("latency.json"), docs.to_string()).expect("should write parser doc");
}

#[tokio::test]
async fn test_orchestrator_build_with_all_plugins_disabled() {
    // Given: A config with all plugins disabled
    let config = minimal_test_config();

    // When: Building orchestrator
    let orchestrator = Orchestrator::build_from_config(config)
        .await
        .expect("orchestrator should build with all plugins disabled");

    // Then: No plugins are registered and the daemon is healthy
    assert_eq!(orchestrator.plugin_count(), 0);
    assert!(orchestrator.parser_registry().is_none());
    assert!(orchestrator.publish_handle().is_none());
    let health = orchestrator.health().await;
    assert!(health.modules.is_empty());
    assert!(health.status.is_healthy());
}

#[tokio::test]
async fn test_orchestrator_registers_pipeline_before_publisher() {
    // Given: Both plugins enabled
    let config = full_test_config(free_udp_port(), "");

    // When: Building orchestrator
    let orchestrator = Orchestrator::build_from_config(config)
        .await
        .expect("build should succeed");

    // Then: The pipeline comes first so it stops first
    let health = orchestrator.health().await;
    let names: Vec<&str> = health.modules.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["syslog-pipeline", "queue-publisher"]);

    // Plugins are not running yet, so they are not counted against the daemon
    assert!(health.modules.iter().all(|m| !m.enabled));
    assert!(health.status.is_healthy());
    assert!(!orchestrator.generation().is_empty());
}

#[tokio::test]
async fn test_orchestrator_build_with_invalid_config_fails() {
    // Given: A config with an invalid log level
    let mut config = minimal_test_config();
    config.general.log_level = "loud".to_owned();

    // When: Building orchestrator
    let result = Orchestrator::build_from_config(config).await;

    // Then: Validation rejects it
    let err = result.err().expect("build should fail");
    assert!(err.to_string().contains("log_level"));
}

#[tokio::test]
async fn test_orchestrator_generation_is_unique_per_build() {
    let a = Orchestrator::build_from_config(minimal_test_config())
        .await
        .expect("build should succeed");
    let b = Orchestrator::build_from_config(minimal_test_config())
        .await
        .expect("build should succeed");
    assert_ne!(a.generation(), b.generation());
}

#[tokio::test]
async fn test_orchestrator_forwards_syslog_stats_to_publisher() {
    // Given: A running daemon with a latency parser loaded from disk
    let parser_dir = tempfile::tempdir().expect("should create temp dir");
    write_latency_parser(parser_dir.path());
    let pid_dir = tempfile::tempdir().expect("should create temp dir");
    let pid_path = pid_dir.path().join("sysgrok.pid");

    let udp_port = free_udp_port();
    let mut config = full_test_config(udp_port, &parser_dir.path().to_string_lossy());
    config.general.pid_file = pid_path.to_string_lossy().into_owned();

    let mut orchestrator = Orchestrator::build_from_config(config)
        .await
        .expect("build should succeed");
    let handle = orchestrator.publish_handle().expect("publisher should be enabled");
    let registry = orchestrator.parser_registry().expect("pipeline should be enabled");
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let driver = async {
        // Wait for the collector to bind
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(pid_path.exists(), "PID file should exist while running");
        assert_eq!(registry.domain_members("app1-evt1"), vec!["latency_parser".to_owned()]);

        // When: A matching RFC 5424 line arrives over UDP
        let udp = UdpSocket::bind("127.0.0.1:0").await.expect("should bind client");
        udp.send_to(
            b"<14>1 2024-01-15T12:00:00Z web01 app1 1 evt1 - latency=5",
            ("127.0.0.1", udp_port),
        )
        .await
        .expect("should send datagram");

        // Then: The stat record is published
        let published = tokio::time::timeout(Duration::from_secs(5), async {
            while handle.sent_count() == 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        assert!(published.is_ok(), "stat record should reach the publisher");

        stop_tx.send(()).expect("orchestrator should be waiting");
    };

    let (result, _) = tokio::join!(
        orchestrator.run_until(async {
            let _ = stop_rx.await;
            Ok("test")
        }),
        driver
    );

    result.expect("run should complete cleanly");
    assert!(!pid_path.exists(), "PID file should be removed on shutdown");
    assert_eq!(handle.sent_count(), 1);
}

#[tokio::test]
async fn test_orchestrator_run_fails_when_pid_file_exists() {
    // Given: A PID file left by another instance
    let pid_dir = tempfile::tempdir().expect("should create temp dir");
    let pid_path = pid_dir.path().join("sysgrok.pid");
    std::fs::write(&pid_path, "4242\n").expect("should write stale PID file");

    let mut config = minimal_test_config();
    config.general.pid_file = pid_path.to_string_lossy().into_owned();
    let mut orchestrator = Orchestrator::build_from_config(config)
        .await
        .expect("build should succeed");

    // When: Running
    let result = orchestrator.run_until(async { Ok("test") }).await;

    // Then: Startup is refused and the existing file is untouched
    let err = result.err().expect("run should fail");
    assert!(err.to_string().contains("4242"));
    assert_eq!(
        std::fs::read_to_string(&pid_path).expect("should read PID file"),
        "4242\n"
    );
}

#[tokio::test]
async fn test_orchestrator_shutdown_trigger_error_still_stops() {
    // Given: A running publisher-only daemon
    let mut config = minimal_test_config();
    config.publisher.enabled = true;
    let mut orchestrator = Orchestrator::build_from_config(config)
        .await
        .expect("build should succeed");

    // When: The shutdown trigger itself fails
    let result = orchestrator
        .run_until(async { Err(anyhow::anyhow!("signal handler unavailable")) })
        .await;

    // Then: The error is returned after plugins were stopped
    assert!(result.is_err());
    let health = orchestrator.health().await;
    assert_eq!(health.modules.len(), 1);
    assert!(!health.modules[0].enabled, "publisher should be stopped");
}

#[tokio::test]
async fn test_dump_parsers_includes_loaded_documents() {
    // Given: A parser directory with one document
    let parser_dir = tempfile::tempdir().expect("should create temp dir");
    write_latency_parser(parser_dir.path());
    let mut config = minimal_test_config();
    config.syslog.parser_dir = parser_dir.path().to_string_lossy().into_owned();

    // When: Dumping parsers
    let value = orchestrator::dump_parsers(&config)
        .await
        .expect("dump should succeed");

    // Then: Built-in and configured parsers are listed
    assert_eq!(value["preconfigured"][0]["name"], "SYSLOG5424");
    assert_eq!(value["configured"][0]["name"], "latency_parser");
    assert_eq!(value["configured"][0]["domain"], "app1-evt1");
}

#[tokio::test]
async fn test_dump_parsers_without_parser_dir() {
    let value = orchestrator::dump_parsers(&minimal_test_config())
        .await
        .expect("dump should succeed");
    assert!(
        value["configured"]
            .as_array()
            .expect("configured should be an array")
            .is_empty()
    );
}
