//! BSD syslog (RFC 3164) 파서
//!
//! RFC 5424 헤더 문법에 매칭되지 않는 메시지에 적용되는 레거시 경로입니다.
//!
//! # 메시지 형식
//! ```text
//! <PRI>Mmm dd hh:mm:ss HOSTNAME TAG: MSG
//! ```
//! TAG는 `prog[pid]:` 또는 `prog:` 형식이며 없을 수도 있습니다.
//!
//! # 사용 예시
//! ```ignore
//! let parser = BsdSyslogParser::new();
//! let record = parser.parse(b"<34>Oct 11 22:14:15 mymachine su: 'su root' failed", "10.0.0.1")?;
//! assert_eq!(record.prog, "su");
//! ```

use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;

use crate::error::SyslogPipelineError;

/// 유효한 최대 PRI 값
/// facility 최댓값 23 * 8 + severity 최댓값 7 = 191
const MAX_SYSLOG_PRI: u8 = 191;

/// RFC 5424 facility 이름 표 (코드 순)
const FACILITY_NAMES: [&str; 24] = [
    "kern", "user", "mail", "daemon", "auth", "syslog", "lpr", "news", "uucp", "cron",
    "authpriv", "ftp", "ntp", "audit", "alert", "clock", "local0", "local1", "local2", "local3",
    "local4", "local5", "local6", "local7",
];

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// facility 코드에 대응하는 이름을 반환합니다.
pub fn facility_name(facility: u8) -> &'static str {
    FACILITY_NAMES
        .get(usize::from(facility))
        .copied()
        .unwrap_or("unknown")
}

/// BSD syslog 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyslogRecord {
    /// 송신자 주소
    pub source: String,
    /// facility 코드 (0-23)
    pub facility: u8,
    /// facility 이름 (`auth`, `local0` 등)
    pub facility_name: &'static str,
    /// severity 코드 (0-7)
    pub severity: u8,
    /// 이벤트 시각 (epoch 기준 마이크로초, UTC)
    pub timestamp_us: i64,
    /// 호스트 이름
    pub hostname: String,
    /// 프로그램 이름 (태그가 없으면 빈 문자열)
    pub prog: String,
    /// 프로세스 ID
    pub pid: Option<u32>,
    /// 메시지 본문
    pub body: String,
}

/// BSD syslog 파서
pub struct BsdSyslogParser {
    /// 최대 허용 입력 크기 (바이트)
    max_input_size: usize,
}

impl BsdSyslogParser {
    /// 기본 설정으로 새 파서를 생성합니다.
    pub fn new() -> Self {
        Self {
            max_input_size: 64 * 1024, // 64KB
        }
    }

    /// 최대 입력 크기를 설정합니다.
    pub fn with_max_input_size(mut self, size: usize) -> Self {
        self.max_input_size = size;
        self
    }

    /// PRI 값에서 facility와 severity를 분리합니다.
    fn decode_pri(pri: u8) -> (u8, u8) {
        (pri >> 3, pri & 7)
    }

    /// 원시 메시지를 현재 연도 기준으로 파싱합니다.
    pub fn parse(&self, raw: &[u8], source: &str) -> Result<SyslogRecord, SyslogPipelineError> {
        self.parse_in_year(raw, source, Utc::now().year())
    }

    /// 원시 메시지를 주어진 연도 기준으로 파싱합니다.
    ///
    /// BSD 타임스탬프에는 연도가 없으므로 호출자가 연도를 정합니다.
    pub fn parse_in_year(
        &self,
        raw: &[u8],
        source: &str,
        year: i32,
    ) -> Result<SyslogRecord, SyslogPipelineError> {
        if raw.len() > self.max_input_size {
            return Err(parse_error(
                0,
                format!(
                    "input too large: {} bytes (max: {})",
                    raw.len(),
                    self.max_input_size
                ),
            ));
        }

        let input = String::from_utf8_lossy(raw);
        let input = input.trim_end_matches(['\r', '\n', '\0']);

        let rest = input
            .strip_prefix('<')
            .ok_or_else(|| parse_error(0, "missing PRI field (expected '<')"))?;
        let pri_end = rest
            .find('>')
            .ok_or_else(|| parse_error(0, "unterminated PRI field"))?;
        let pri_str = &rest[..pri_end];
        let pri: u8 = pri_str
            .parse()
            .map_err(|_| parse_error(1, format!("invalid PRI value: '{pri_str}'")))?;
        if pri > MAX_SYSLOG_PRI {
            return Err(parse_error(
                1,
                format!("PRI value {pri} out of valid range (0-{MAX_SYSLOG_PRI})"),
            ));
        }
        let (facility, severity) = Self::decode_pri(pri);

        let body_offset = pri_end + 2;
        let rest = &rest[pri_end + 1..];

        let (month, rest) = next_token(rest).ok_or_else(|| parse_error(body_offset, "missing month"))?;
        let (day, rest) = next_token(rest).ok_or_else(|| parse_error(body_offset, "missing day"))?;
        let (time, rest) = next_token(rest).ok_or_else(|| parse_error(body_offset, "missing time"))?;
        let timestamp_us = bsd_timestamp_us(year, month, day, time)?;

        let (hostname, rest) =
            next_token(rest).ok_or_else(|| parse_error(body_offset, "missing hostname"))?;
        let rest = rest.strip_prefix(' ').unwrap_or(rest);

        let (prog, pid, body) = split_tag(rest);

        Ok(SyslogRecord {
            source: source.to_owned(),
            facility,
            facility_name: facility_name(facility),
            severity,
            timestamp_us,
            hostname: hostname.to_owned(),
            prog: prog.to_owned(),
            pid,
            body: body.to_owned(),
        })
    }
}

impl Default for BsdSyslogParser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_error(offset: usize, reason: impl Into<String>) -> SyslogPipelineError {
    SyslogPipelineError::Parse {
        format: "bsd".to_owned(),
        offset,
        reason: reason.into(),
    }
}

/// 앞쪽 공백을 건너뛰고 공백 전까지의 토큰과 나머지를 반환합니다.
fn next_token(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start_matches(' ');
    if input.is_empty() {
        return None;
    }
    match input.find(' ') {
        Some(end) => Some((&input[..end], &input[end..])),
        None => Some((input, "")),
    }
}

/// `Mmm dd hh:mm:ss`를 주어진 연도의 UTC 마이크로초로 변환합니다.
fn bsd_timestamp_us(year: i32, month: &str, day: &str, time: &str) -> Result<i64, SyslogPipelineError> {
    let invalid = || parse_error(0, format!("invalid BSD timestamp '{month} {day} {time}'"));

    let month = MONTHS
        .iter()
        .position(|m| *m == month)
        .ok_or_else(invalid)?;
    let day: u32 = day.parse().map_err(|_| invalid())?;

    let mut hms = time.splitn(3, ':');
    let mut field = || -> Result<u32, SyslogPipelineError> {
        hms.next()
            .and_then(|v| v.parse().ok())
            .ok_or_else(invalid)
    };
    let (hour, minute, second) = (field()?, field()?, field()?);

    let month = u32::try_from(month + 1).map_err(|_| invalid())?;
    let dt = NaiveDate::from_ymd_opt(year, month, day)
        .or_else(|| leap_day_before(year, month, day))
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .ok_or_else(invalid)?;
    Ok(dt.and_utc().timestamp_micros())
}

/// 윤년이 아닌 해의 `Feb 29`는 직전 윤년의 날짜로 봅니다.
fn leap_day_before(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    if (month, day) != (2, 29) {
        return None;
    }
    // 연속된 두 윤년 사이는 최대 8년
    (1..=8).find_map(|back| NaiveDate::from_ymd_opt(year - back, 2, 29))
}

/// `prog[pid]: body` 또는 `prog: body`를 분리합니다.
///
/// 태그가 없으면 prog는 빈 문자열, pid는 `None`, 본문은 입력 전체입니다.
fn split_tag(input: &str) -> (&str, Option<u32>, &str) {
    let prog_end = input
        .find([':', '[', ' '])
        .unwrap_or(input.len());
    let prog = &input[..prog_end];
    if prog.is_empty() {
        return ("", None, input);
    }

    let after_prog = &input[prog_end..];
    let (pid, after_pid) = match after_prog.strip_prefix('[') {
        Some(inner) => match inner.split_once(']') {
            Some((digits, after)) => match digits.parse::<u32>() {
                Ok(pid) => (Some(pid), after),
                Err(_) => return ("", None, input),
            },
            None => return ("", None, input),
        },
        None => (None, after_prog),
    };

    match after_pid.strip_prefix(':') {
        Some(body) => (prog, pid, body.trim_start_matches(' ')),
        None => ("", None, input),
    }
}
