//! syslog 분류기 -- 수집 큐의 원시 메시지를 해석해 통계 레코드로 보냅니다.
//!
//! # 처리 순서
//! 1. 기본 도메인(RFC 5424 헤더 파서)으로 매칭
//! 2. RFC 5424면 `appname-msgid` 도메인으로 본문과 Structured Data 요소를 라우팅
//! 3. 기본 도메인에 매칭되지 않으면 BSD (RFC 3164) 파서로 해석
//! 4. 둘 다 실패하면 debug 로그 후 버림
//!
//! 분류기는 단일 소비자 워커에서만 호출됩니다.

use std::sync::Arc;
use std::time::Instant;

use sysgrok_core::metrics as m;
use sysgrok_core::types::TagSet;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::collector::RawMessage;
use crate::grok::ParsedFields;
use crate::parser::rfc5424::{self, field};
use crate::parser::{BsdSyslogParser, RFC5424_PARSER, SyslogRecord};
use crate::registry::{ParserRegistry, Rfc5424DomainConfig, RouteMatch};
use crate::stats::{StatsContext, StatsDispatcher};

/// 분류 결과
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// RFC 5424 메시지가 설정된 도메인으로 라우팅됨
    Rfc5424 {
        /// `appname-msgid` 도메인 ID
        domain_id: String,
        /// 매칭된 본문/SD 요소 수
        matched: usize,
        /// 기록된 통계 레코드 수
        records: usize,
    },
    /// RFC 5424 메시지지만 도메인 설정이 없음
    NoDomain {
        /// `appname-msgid` 도메인 ID
        domain_id: String,
    },
    /// 기본 도메인의 사용자 파서에 매칭됨
    Default {
        /// 매칭된 파서 이름
        parser: String,
        /// 기록된 통계 레코드 수
        records: usize,
    },
    /// BSD 형식으로 해석됨
    Bsd(SyslogRecord),
    /// 어떤 형식에도 맞지 않음
    Unparsed,
}

impl Classification {
    /// 메트릭 레이블용 형식 이름
    pub fn format(&self) -> &'static str {
        match self {
            Self::Rfc5424 { .. } => "rfc5424",
            Self::NoDomain { .. } => "rfc5424_no_domain",
            Self::Default { .. } => "default",
            Self::Bsd(_) => "bsd",
            Self::Unparsed => "unparsed",
        }
    }
}

/// syslog 분류기
pub struct SyslogClassifier {
    registry: Arc<ParserRegistry>,
    dispatcher: StatsDispatcher,
    bsd: BsdSyslogParser,
    record_tx: Option<mpsc::Sender<SyslogRecord>>,
}

impl SyslogClassifier {
    /// 새 분류기를 생성합니다.
    pub fn new(registry: Arc<ParserRegistry>, dispatcher: StatsDispatcher) -> Self {
        Self {
            registry,
            dispatcher,
            bsd: BsdSyslogParser::new(),
            record_tx: None,
        }
    }

    /// BSD 파서의 최대 입력 크기를 설정합니다.
    pub fn with_max_input_size(mut self, size: usize) -> Self {
        self.bsd = self.bsd.with_max_input_size(size);
        self
    }

    /// BSD 레코드를 보낼 채널을 설정합니다.
    pub fn with_record_sender(mut self, tx: mpsc::Sender<SyslogRecord>) -> Self {
        self.record_tx = Some(tx);
        self
    }

    /// 메시지 하나를 처리합니다. 결과를 로그와 메트릭으로 남기고 메시지를 해제합니다.
    ///
    /// 워커 루프에서 호출하는 진입점입니다. 에러는 여기서 로그로 끝납니다.
    pub fn process(&self, msg: RawMessage) {
        let started = Instant::now();
        let classification = self.classify(&msg);
        metrics::histogram!(m::SYSLOG_CLASSIFY_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        metrics::counter!(
            m::SYSLOG_MESSAGES_CLASSIFIED_TOTAL,
            m::LABEL_FORMAT => classification.format()
        )
        .increment(1);
        if let Classification::Bsd(record) = classification {
            self.forward_record(record);
        }
    }

    /// 메시지를 분류하고 매칭 결과를 통계로 디스패치합니다.
    ///
    /// # Panics
    /// `int` 메트릭 변환에 실패하면 [`StatsDispatcher::dispatch`]가 panic합니다.
    pub fn classify(&self, msg: &RawMessage) -> Classification {
        let text = line_text(&msg.payload);
        let source = msg.source();

        let Some(hit) = self.registry.match_default(&text) else {
            return match self.bsd.parse(text.as_bytes(), &source) {
                Ok(record) => Classification::Bsd(record),
                Err(e) => {
                    tracing::debug!(source = %source, error = %e, "unparsed syslog message");
                    Classification::Unparsed
                }
            };
        };

        if hit.parser.name != RFC5424_PARSER {
            return self.classify_default(msg, &source, hit);
        }
        self.classify_rfc5424(msg, &source, &hit.fields)
    }

    fn classify_default(
        &self,
        msg: &RawMessage,
        source: &str,
        hit: RouteMatch,
    ) -> Classification {
        metrics::counter!(m::PARSER_MATCHES_TOTAL).increment(1);
        let header_tags = TagSet::new();
        let ctx = StatsContext {
            source,
            timestamp_us: msg.received_at_us(),
            header_tags: &header_tags,
        };
        let records = self.dispatcher.dispatch(&ctx, &hit.parser, &hit.fields);
        Classification::Default {
            parser: hit.parser.name.clone(),
            records,
        }
    }

    fn classify_rfc5424(
        &self,
        msg: &RawMessage,
        source: &str,
        header: &ParsedFields,
    ) -> Classification {
        let get = |name: &str| header_field(header, name);
        let domain_id = rfc5424::domain_id(get(field::APPNAME), get(field::MSGID));

        let Some(config) = self.registry.rfc5424_config(&domain_id) else {
            tracing::debug!(source = %source, domain = %domain_id, "no rfc5424 domain configured");
            return Classification::NoDomain { domain_id };
        };

        let timestamp_us = header
            .get(field::TIMESTAMP)
            .and_then(|ts| rfc5424::parse_timestamp(ts).ok())
            .unwrap_or_else(|| msg.received_at_us());
        let header_tags = header_tags(config, header);
        let ctx = StatsContext {
            source,
            timestamp_us,
            header_tags: &header_tags,
        };

        let body = get(field::MSG);
        let elements = rfc5424::split_structured_data(get(field::SD));
        let texts = std::iter::once(body)
            .filter(|b| !b.is_empty())
            .chain(elements);

        let mut matched = 0;
        let mut records = 0;
        for text in texts {
            let Some(hit) = self.registry.route(&domain_id, text) else {
                continue;
            };
            matched += 1;
            metrics::counter!(m::PARSER_MATCHES_TOTAL).increment(1);
            records += self.dispatcher.dispatch(&ctx, &hit.parser, &hit.fields);
        }

        if matched == 0 {
            tracing::debug!(source = %source, domain = %domain_id, "no parser matched in domain");
        }

        Classification::Rfc5424 {
            domain_id,
            matched,
            records,
        }
    }

    fn forward_record(&self, record: SyslogRecord) {
        let Some(tx) = &self.record_tx else {
            return;
        };
        match tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(record)) => {
                tracing::warn!(source = %record.source, "syslog record channel full, dropping record");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("syslog record channel closed");
            }
        }
    }
}

fn header_field<'a>(header: &'a ParsedFields, name: &str) -> &'a str {
    header.get(name).map(String::as_str).unwrap_or_default()
}

/// 도메인 설정 플래그에 따라 헤더 필드를 태그로 만듭니다.
fn header_tags(config: Rfc5424DomainConfig, header: &ParsedFields) -> TagSet {
    let flags = [
        (config.hostname_as_tag, field::HOSTNAME),
        (config.appname_as_tag, field::APPNAME),
        (config.procid_as_tag, field::PROCID),
        (config.msgid_as_tag, field::MSGID),
    ];
    flags
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .filter_map(|(_, name)| {
            header
                .get(name)
                .filter(|v| !v.is_empty())
                .map(|v| (name.to_owned(), v.clone()))
        })
        .collect()
}

/// 페이로드를 한 줄 텍스트로 변환합니다. 끝의 개행과 NUL은 제거합니다.
fn line_text(payload: &[u8]) -> std::borrow::Cow<'_, str> {
    let end = payload
        .iter()
        .rposition(|b| !matches!(b, b'\n' | b'\r' | b'\0'))
        .map_or(0, |i| i + 1);
    String::from_utf8_lossy(&payload[..end])
}
