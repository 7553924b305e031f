//! RFC 5424 헤더 문법과 보조 함수
//!
//! RFC 5424 헤더는 기본 도메인에 미리 등록되는 grok 파서(`SYSLOG5424`)로
//! 해석됩니다. 이 모듈은 그 정의와 캡처 필드 이름, 타임스탬프 변환,
//! Structured Data 분리를 제공합니다.
//!
//! # 메시지 형식
//! ```text
//! <PRI>VERSION TIMESTAMP HOSTNAME APP-NAME PROCID MSGID STRUCTURED-DATA MSG
//! ```

use chrono::NaiveDateTime;

use crate::error::SyslogPipelineError;
use crate::registry::{ParserUpdate, PatternSpec, SubPattern};

/// 미리 등록되는 RFC 5424 헤더 파서 이름
pub const RFC5424_PARSER: &str = "SYSLOG5424";

/// 헤더 파서가 캡처하는 필드 이름
pub mod field {
    /// PRI 값
    pub const PRI: &str = "syslog5424_pri";
    /// 버전
    pub const VERSION: &str = "syslog5424_ver";
    /// 타임스탬프 원문
    pub const TIMESTAMP: &str = "syslog5424_ts";
    /// 호스트 이름
    pub const HOSTNAME: &str = "hostname";
    /// 애플리케이션 이름
    pub const APPNAME: &str = "appname";
    /// 프로세스 ID
    pub const PROCID: &str = "procid";
    /// 메시지 ID
    pub const MSGID: &str = "msgid";
    /// Structured Data 블록
    pub const SD: &str = "syslog5424_sd";
    /// 메시지 본문
    pub const MSG: &str = "syslog5424_msg";
}

const TOP_PATTERN: &str = "%{SYSLOG5424BASE} +%{GREEDYDATA:syslog5424_msg}";

const SUB_PATTERNS: &[(&str, &str)] = &[
    ("SYSLOG5424PRINTASCII", r"[!-~]+"),
    ("SYSLOG5424PRI", r"<%{NONNEGINT:syslog5424_pri}>"),
    ("SYSLOG5424SD", r"\[%{DATA}\]+"),
    (
        "SYSLOG5424BASE",
        r"%{SYSLOG5424PRI}%{NONNEGINT:syslog5424_ver} +(?:%{TIMESTAMP_ISO8601:syslog5424_ts}|-) +(?:%{HOSTNAME:hostname}|-) +(-|%{SYSLOG5424PRINTASCII:appname}) +(-|%{SYSLOG5424PRINTASCII:procid}) +(-|%{SYSLOG5424PRINTASCII:msgid}) +(?:%{SYSLOG5424SD:syslog5424_sd}|-|)",
    ),
];

/// 헤더 파서가 태그로 선언하는 캡처 필드
const HEADER_TAGS: &[&str] = &[
    field::PRI,
    field::VERSION,
    field::TIMESTAMP,
    field::HOSTNAME,
    field::APPNAME,
    field::PROCID,
    field::MSGID,
    field::SD,
    field::MSG,
];

/// 헤더 파서의 정의를 반환합니다.
pub fn builtin_update() -> ParserUpdate {
    ParserUpdate {
        pattern: Some(PatternSpec {
            pattern: TOP_PATTERN.to_owned(),
            sub_patterns: SUB_PATTERNS
                .iter()
                .map(|(name, pattern)| SubPattern {
                    name: (*name).to_owned(),
                    pattern: (*pattern).to_owned(),
                })
                .collect(),
        }),
        tags: Some(
            HEADER_TAGS
                .iter()
                .map(|tag| (*tag).to_owned())
                .collect(),
        ),
        metrics: None,
    }
}

/// `appname-msgid` 형식의 도메인 ID를 만듭니다. 빈 구성요소도 허용됩니다.
pub fn domain_id(appname: &str, msgid: &str) -> String {
    format!("{appname}-{msgid}")
}

/// Structured Data 블록을 요소별로 분리합니다.
///
/// 바깥 `[`/`]`를 벗긴 뒤 `][` 문자열로 나눕니다. 빈 블록은 빈 목록입니다.
pub fn split_structured_data(sd: &str) -> Vec<&str> {
    let inner = sd.strip_prefix('[').unwrap_or(sd);
    let inner = inner.strip_suffix(']').unwrap_or(inner);
    if inner.is_empty() {
        return Vec::new();
    }
    inner.split("][").collect()
}

/// RFC 5424 타임스탬프를 epoch 기준 UTC 마이크로초로 변환합니다.
///
/// `T` 앞은 날짜, 뒤는 시각과 오프셋입니다. 오프셋이 `+`면 빼고 `-`면 더하며,
/// 오프셋이 없거나 `Z`면 UTC로 취급합니다.
pub fn parse_timestamp(timestamp: &str) -> Result<i64, SyslogPipelineError> {
    let invalid = |reason: &str| SyslogPipelineError::Parse {
        format: "rfc5424".to_owned(),
        offset: 0,
        reason: format!("invalid timestamp '{timestamp}': {reason}"),
    };

    let (date, rest) = timestamp
        .split_once('T')
        .ok_or_else(|| invalid("missing 'T' separator"))?;

    let mut parts = rest.split(['+', '-', 'Z']);
    let time = parts.next().unwrap_or_default();
    let offset = parts.next().filter(|o| !o.is_empty());

    let local = NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|e| invalid(&e.to_string()))?;
    let micros = local.and_utc().timestamp_micros();

    let Some(offset) = offset else {
        return Ok(micros);
    };
    let offset_us = parse_offset_us(offset).ok_or_else(|| invalid("bad utc offset"))?;
    if rest.contains('+') {
        Ok(micros - offset_us)
    } else {
        Ok(micros + offset_us)
    }
}

/// `hh:mm` 또는 `hhmm` 오프셋을 마이크로초로 변환합니다.
fn parse_offset_us(offset: &str) -> Option<i64> {
    let (hours, minutes) = match offset.split_once(':') {
        Some((h, m)) => (h, m),
        None if offset.len() == 4 && offset.is_char_boundary(2) => offset.split_at(2),
        None => (offset, "0"),
    };
    let hours: i64 = hours.parse().ok()?;
    let minutes: i64 = minutes.parse().ok()?;
    if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
        return None;
    }
    Some((hours * 3600 + minutes * 60) * 1_000_000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn utc_us(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> i64 {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
            .and_utc()
            .timestamp_micros()
    }

    #[test]
    fn timestamp_zulu() {
        assert_eq!(
            parse_timestamp("2024-01-15T12:00:00Z").unwrap(),
            utc_us(2024, 1, 15, 12, 0, 0)
        );
    }

    #[test]
    fn timestamp_without_offset_is_utc() {
        assert_eq!(
            parse_timestamp("2024-01-15T12:00:00").unwrap(),
            utc_us(2024, 1, 15, 12, 0, 0)
        );
    }

    #[test]
    fn timestamp_positive_offset_is_subtracted() {
        assert_eq!(
            parse_timestamp("2024-01-15T12:00:00+02:00").unwrap(),
            utc_us(2024, 1, 15, 10, 0, 0)
        );
    }

    #[test]
    fn timestamp_negative_offset_is_added() {
        assert_eq!(
            parse_timestamp("2024-01-15T12:00:00-05:30").unwrap(),
            utc_us(2024, 1, 15, 17, 30, 0)
        );
    }

    #[test]
    fn timestamp_fractional_seconds() {
        assert_eq!(
            parse_timestamp("2024-01-15T12:00:00.250Z").unwrap(),
            utc_us(2024, 1, 15, 12, 0, 0) + 250_000
        );
    }

    #[test]
    fn timestamp_compact_offset() {
        assert_eq!(
            parse_timestamp("2024-01-15T12:00:00+0100").unwrap(),
            utc_us(2024, 1, 15, 11, 0, 0)
        );
    }

    #[test]
    fn timestamp_invalid_inputs() {
        assert!(parse_timestamp("-").is_err());
        assert!(parse_timestamp("2024-01-15 12:00:00").is_err());
        assert!(parse_timestamp("2024-13-15T12:00:00Z").is_err());
        assert!(parse_timestamp("2024-01-15T12:00:00+99:00").is_err());
    }

    #[test]
    fn sd_split() {
        assert_eq!(
            split_structured_data(r#"[a="1"][b="2"]"#),
            vec![r#"a="1""#, r#"b="2""#]
        );
        assert_eq!(
            split_structured_data(r#"[exampleSDID@32473 iut="3"]"#),
            vec![r#"exampleSDID@32473 iut="3""#]
        );
        assert!(split_structured_data("[]").is_empty());
        assert!(split_structured_data("").is_empty());
    }

    #[test]
    fn domain_id_joins_appname_and_msgid() {
        assert_eq!(domain_id("app1", "evt1"), "app1-evt1");
        assert_eq!(domain_id("", "evt1"), "-evt1");
        assert_eq!(domain_id("", ""), "-");
    }

    #[test]
    fn builtin_update_carries_sub_patterns() {
        let update = builtin_update();
        let spec = update.pattern.unwrap();
        assert_eq!(spec.pattern, TOP_PATTERN);
        assert_eq!(spec.sub_patterns.len(), SUB_PATTERNS.len());
        assert!(update.tags.is_none());
        assert!(update.metrics.is_none());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn parse_timestamp_never_panics(input in ".{0,64}") {
                let _ = parse_timestamp(&input);
            }

            #[test]
            fn sd_split_yields_one_element_per_block(values in prop::collection::vec("[a-z]{1,8}", 1..6)) {
                let sd: String = values.iter().map(|v| format!("[{v}]")).collect();
                let elements = split_structured_data(&sd);
                prop_assert_eq!(elements, values.iter().map(String::as_str).collect::<Vec<_>>());
            }
        }
    }
}
