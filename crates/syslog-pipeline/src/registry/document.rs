//! 파서 설정 문서 -- `syslog_parser`와 `rfc5424` 문서를 해석합니다.
//!
//! # 문서 형식
//! ```json
//! {"syslog_parser": {
//!     "fq_name": ["global", "app1-evt1", "latency_parser"],
//!     "pattern": {"pattern_string": "latency=%{INT:latency}", "sub_patterns": []},
//!     "query_tags": {"tag_list": ["region"]},
//!     "metrics": {"metric_list": [{"name": "latency", "data_type": "int"}]}
//! }}
//! {"rfc5424": {"fq_name": ["global", "app1-evt1"], "rfc5424_config": {"hostname_as_tag": true}}}
//! ```
//! `fq_name`의 마지막 요소가 이름이고, `syslog_parser`에서는 그 앞 요소가 도메인입니다.

use serde::Deserialize;

use crate::error::SyslogPipelineError;

use super::types::{
    MetricSpec, MetricType, ParserUpdate, PatternSpec, Rfc5424DomainConfig, SubPattern,
};

/// 문서 키
pub const SYSLOG_PARSER_KEY: &str = "syslog_parser";
/// 문서 키
pub const RFC5424_KEY: &str = "rfc5424";

/// 해석된 설정 문서
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigDocument {
    /// 사용자 파서 정의
    SyslogParser {
        /// 파서 이름
        name: String,
        /// 소속 도메인
        domain: String,
        /// 갱신 내용
        update: ParserUpdate,
    },
    /// RFC 5424 도메인 설정
    Rfc5424 {
        /// 도메인 ID (`appname-msgid`)
        domain_id: String,
        /// 헤더 태그 설정
        config: Rfc5424DomainConfig,
    },
}

#[derive(Debug, Deserialize)]
struct SyslogParserDoc {
    fq_name: Vec<String>,
    #[serde(default)]
    pattern: Option<PatternDoc>,
    #[serde(default)]
    query_tags: Option<TagListDoc>,
    #[serde(default)]
    metrics: Option<MetricListDoc>,
}

#[derive(Debug, Deserialize)]
struct PatternDoc {
    pattern_string: String,
    #[serde(default)]
    sub_patterns: Vec<SubPatternDoc>,
}

#[derive(Debug, Deserialize)]
struct SubPatternDoc {
    pattern_name: String,
    pattern: String,
}

#[derive(Debug, Deserialize)]
struct TagListDoc {
    #[serde(default)]
    tag_list: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MetricListDoc {
    #[serde(default)]
    metric_list: Vec<MetricDoc>,
}

#[derive(Debug, Deserialize)]
struct MetricDoc {
    name: String,
    data_type: String,
}

#[derive(Debug, Deserialize)]
struct Rfc5424Doc {
    fq_name: Vec<String>,
    #[serde(default)]
    rfc5424_config: Rfc5424DomainConfig,
}

impl ConfigDocument {
    /// JSON 값에서 문서를 해석합니다.
    ///
    /// 최상위 객체는 `syslog_parser` 또는 `rfc5424` 키 하나를 가져야 합니다.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, SyslogPipelineError> {
        let object = value.as_object().ok_or_else(|| doc_error("document", "expected a JSON object"))?;

        if let Some(body) = object.get(SYSLOG_PARSER_KEY) {
            let doc: SyslogParserDoc = serde_json::from_value(body.clone())
                .map_err(|e| doc_error(SYSLOG_PARSER_KEY, e.to_string()))?;
            return Self::from_parser_doc(doc);
        }
        if let Some(body) = object.get(RFC5424_KEY) {
            let doc: Rfc5424Doc = serde_json::from_value(body.clone())
                .map_err(|e| doc_error(RFC5424_KEY, e.to_string()))?;
            let domain_id = doc
                .fq_name
                .last()
                .filter(|n| !n.is_empty())
                .cloned()
                .ok_or_else(|| doc_error(RFC5424_KEY, "fq_name must not be empty"))?;
            return Ok(Self::Rfc5424 {
                domain_id,
                config: doc.rfc5424_config,
            });
        }

        Err(doc_error(
            "document",
            format!("expected '{SYSLOG_PARSER_KEY}' or '{RFC5424_KEY}' key"),
        ))
    }

    fn from_parser_doc(doc: SyslogParserDoc) -> Result<Self, SyslogPipelineError> {
        let [.., domain, name] = doc.fq_name.as_slice() else {
            return Err(doc_error(
                SYSLOG_PARSER_KEY,
                "fq_name must contain at least parent and name",
            ));
        };
        if name.is_empty() || domain.is_empty() {
            return Err(doc_error(
                SYSLOG_PARSER_KEY,
                "fq_name components must not be empty",
            ));
        }

        let update = ParserUpdate {
            pattern: doc.pattern.map(|p| PatternSpec {
                pattern: p.pattern_string,
                sub_patterns: p
                    .sub_patterns
                    .into_iter()
                    .map(|s| SubPattern {
                        name: s.pattern_name,
                        pattern: s.pattern,
                    })
                    .collect(),
            }),
            tags: doc.query_tags.map(|t| t.tag_list),
            metrics: doc.metrics.map(|m| {
                m.metric_list
                    .into_iter()
                    .map(|d| MetricSpec {
                        metric_type: MetricType::from_declared(&d.data_type),
                        name: d.name,
                    })
                    .collect()
            }),
        };

        Ok(Self::SyslogParser {
            name: name.clone(),
            domain: domain.clone(),
            update,
        })
    }

    /// 문서 대상의 이름 (파서 이름 또는 도메인 ID)
    pub fn target(&self) -> &str {
        match self {
            Self::SyslogParser { name, .. } => name,
            Self::Rfc5424 { domain_id, .. } => domain_id,
        }
    }
}

fn doc_error(kind: &str, reason: impl Into<String>) -> SyslogPipelineError {
    SyslogPipelineError::ConfigDocument {
        kind: kind.to_owned(),
        reason: reason.into(),
    }
}
