//! syslog 형식별 파싱
//!
//! - [`rfc5424`]: 기본 도메인에 등록되는 RFC 5424 헤더 grok 정의와 보조 함수
//! - [`bsd`]: RFC 5424에 매칭되지 않는 메시지를 위한 BSD (RFC 3164) 파서

pub mod bsd;
pub mod rfc5424;

pub use bsd::{BsdSyslogParser, SyslogRecord, facility_name};
pub use rfc5424::RFC5424_PARSER;
