//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `sysgrok_`
//! - 모듈명: `syslog_`, `parser_`, `stats_`, `publisher_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 수집 소스 레이블 키 (syslog_tcp, syslog_udp)
pub const LABEL_SOURCE: &str = "source";

/// 분류 결과 레이블 키 (rfc5424, bsd, unparsed)
pub const LABEL_FORMAT: &str = "format";

// ─── Syslog 수집 메트릭 ────────────────────────────────────────────

/// Syslog: 수신된 메시지 수 (counter, label: source)
pub const SYSLOG_MESSAGES_RECEIVED_TOTAL: &str = "sysgrok_syslog_messages_received_total";

/// Syslog: 큐 포화 또는 종료로 버려진 메시지 수 (counter)
pub const SYSLOG_MESSAGES_DROPPED_TOTAL: &str = "sysgrok_syslog_messages_dropped_total";

/// Syslog: 분류된 메시지 수 (counter, label: format)
pub const SYSLOG_MESSAGES_CLASSIFIED_TOTAL: &str = "sysgrok_syslog_messages_classified_total";

/// Syslog: 수집 큐에 대기 중인 메시지 수 (gauge)
pub const SYSLOG_QUEUE_DEPTH: &str = "sysgrok_syslog_queue_depth";

/// Syslog: 수집 큐 사용률 (gauge, 0.0-1.0)
pub const SYSLOG_QUEUE_UTILIZATION: &str = "sysgrok_syslog_queue_utilization";

/// Syslog: 메시지 하나의 분류 소요 시간 (histogram, 초)
pub const SYSLOG_CLASSIFY_DURATION_SECONDS: &str = "sysgrok_syslog_classify_duration_seconds";

// ─── 파서 레지스트리 메트릭 ─────────────────────────────────────────

/// Parser: 설정된 사용자 파서 수 (gauge)
pub const PARSER_CONFIGURED: &str = "sysgrok_parser_configured";

/// Parser: 패턴 컴파일 실패 수 (counter)
pub const PARSER_COMPILE_ERRORS_TOTAL: &str = "sysgrok_parser_compile_errors_total";

/// Parser: 사용자 파서 매칭 수 (counter)
pub const PARSER_MATCHES_TOTAL: &str = "sysgrok_parser_matches_total";

// ─── 통계 기록 메트릭 ──────────────────────────────────────────────

/// Stats: 기록된 통계 레코드 수 (counter)
pub const STATS_RECORDS_WRITTEN_TOTAL: &str = "sysgrok_stats_records_written_total";

/// Stats: 기록 실패 수 (counter)
pub const STATS_WRITE_ERRORS_TOTAL: &str = "sysgrok_stats_write_errors_total";

// ─── 큐 발행기 메트릭 ──────────────────────────────────────────────

/// Publisher: 브로커에 전달 요청한 메시지 수 (counter)
pub const PUBLISHER_MESSAGES_SENT_TOTAL: &str = "sysgrok_publisher_messages_sent_total";

/// Publisher: 전달 확인된 메시지 수 (counter)
pub const PUBLISHER_DELIVERED_TOTAL: &str = "sysgrok_publisher_delivered_total";

/// Publisher: 전달 실패 메시지 수 (counter)
pub const PUBLISHER_DELIVERY_FAILURES_TOTAL: &str = "sysgrok_publisher_delivery_failures_total";

/// Publisher: 비활성 상태에서 버려진 메시지 수 (counter)
pub const PUBLISHER_DISCARDED_TOTAL: &str = "sysgrok_publisher_discarded_total";

/// Publisher: 브로커 연결 상태 (gauge, 1=up, 0=down)
pub const PUBLISHER_CONNECTION_UP: &str = "sysgrok_publisher_connection_up";

/// Publisher: 발행 중단 여부 (gauge, 1=disabled)
pub const PUBLISHER_DISABLED: &str = "sysgrok_publisher_disabled";

/// Publisher: 마지막 연결 점검 이후 전달 확인 수 (gauge)
pub const PUBLISHER_PENDING_DELIVERIES: &str = "sysgrok_publisher_pending_deliveries";

// ─── Daemon 메트릭 ─────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "sysgrok_daemon_uptime_seconds";

/// Daemon: 등록된 플러그인 수 (gauge)
pub const DAEMON_PLUGINS_REGISTERED: &str = "sysgrok_daemon_plugins_registered";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "sysgrok_daemon_build_info";

// ─── 히스토그램 버킷 ───────────────────────────────────────────────

/// 분류 소요 시간 버킷 (초)
pub const CLASSIFY_DURATION_BUCKETS: &[f64] = &[
    0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1,
];

/// 모든 메트릭의 설명을 등록합니다.
///
/// 데몬 시작 시 recorder 설치 직후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Syslog
    describe_counter!(
        SYSLOG_MESSAGES_RECEIVED_TOTAL,
        "Total number of syslog messages received per source"
    );
    describe_counter!(
        SYSLOG_MESSAGES_DROPPED_TOTAL,
        "Total number of syslog messages dropped by the ingest queue"
    );
    describe_counter!(
        SYSLOG_MESSAGES_CLASSIFIED_TOTAL,
        "Total number of syslog messages classified per format"
    );
    describe_gauge!(
        SYSLOG_QUEUE_DEPTH,
        "Current number of messages waiting in the ingest queue"
    );
    describe_gauge!(
        SYSLOG_QUEUE_UTILIZATION,
        "Ingest queue utilization ratio (0.0 - 1.0)"
    );
    describe_histogram!(
        SYSLOG_CLASSIFY_DURATION_SECONDS,
        "Time to classify and dispatch a single syslog message in seconds"
    );

    // Parser registry
    describe_gauge!(PARSER_CONFIGURED, "Number of user-configured parsers");
    describe_counter!(
        PARSER_COMPILE_ERRORS_TOTAL,
        "Total number of grok pattern compile failures"
    );
    describe_counter!(
        PARSER_MATCHES_TOTAL,
        "Total number of user parser matches"
    );

    // Stats
    describe_counter!(
        STATS_RECORDS_WRITTEN_TOTAL,
        "Total number of stat records handed to the stats writer"
    );
    describe_counter!(
        STATS_WRITE_ERRORS_TOTAL,
        "Total number of stat records rejected by the stats writer"
    );

    // Publisher
    describe_counter!(
        PUBLISHER_MESSAGES_SENT_TOTAL,
        "Total number of messages handed to the broker transport"
    );
    describe_counter!(
        PUBLISHER_DELIVERED_TOTAL,
        "Total number of broker-confirmed deliveries"
    );
    describe_counter!(
        PUBLISHER_DELIVERY_FAILURES_TOTAL,
        "Total number of failed deliveries"
    );
    describe_counter!(
        PUBLISHER_DISCARDED_TOTAL,
        "Total number of messages discarded while the publisher was disabled"
    );
    describe_gauge!(
        PUBLISHER_CONNECTION_UP,
        "Broker connection status (1 = up, 0 = down)"
    );
    describe_gauge!(
        PUBLISHER_DISABLED,
        "Whether publishing is suspended after a broker down event (1 = disabled)"
    );
    describe_gauge!(
        PUBLISHER_PENDING_DELIVERIES,
        "Confirmed deliveries since the last connection check"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "sysgrok daemon uptime in seconds");
    describe_gauge!(
        DAEMON_PLUGINS_REGISTERED,
        "Number of plugins registered in the daemon"
    );
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
