//! 파서 레지스트리 데이터 구조

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::grok::ParsedFields;

/// 로컬 조각 정의
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubPattern {
    /// 조각 이름
    pub name: String,
    /// 정규식 본문 (`%{...}` 참조 가능)
    pub pattern: String,
}

/// 최상위 패턴과 로컬 조각
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSpec {
    /// 최상위 패턴 문자열
    pub pattern: String,
    /// 최상위 패턴에서 참조하는 로컬 조각
    #[serde(default)]
    pub sub_patterns: Vec<SubPattern>,
}

/// 메트릭 값 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    /// 정수 (`data_type = "int"`)
    Int,
    /// 문자열 (그 외 모든 선언)
    String,
}

impl MetricType {
    /// 설정 문서의 `data_type` 선언을 해석합니다. `"int"` 외에는 모두 문자열입니다.
    pub fn from_declared(data_type: &str) -> Self {
        if data_type == "int" {
            Self::Int
        } else {
            Self::String
        }
    }
}

/// 메트릭 선언
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSpec {
    /// 캡처 필드 이름
    pub name: String,
    /// 값 타입
    pub metric_type: MetricType,
}

/// 파서 컴파일 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum CompileState {
    /// 패턴 미지정
    Pending,
    /// 컴파일 성공, 매칭 가능
    Compiled,
    /// 컴파일 실패, 매칭하지 않음
    Error(String),
}

impl CompileState {
    /// 에러 상태인지 확인합니다.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// 파서 정의
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParserDefinition {
    /// 파서 이름 (통계 테이블 이름)
    pub name: String,
    /// 소속 도메인
    pub domain: String,
    /// 최상위 패턴
    pub pattern: String,
    /// 로컬 조각
    pub sub_patterns: Vec<SubPattern>,
    /// 태그로 쓰일 캡처 필드 이름
    pub tags: BTreeSet<String>,
    /// 메트릭으로 쓰일 캡처 필드 이름과 타입
    pub metrics: BTreeMap<String, MetricType>,
    /// 컴파일 상태
    pub state: CompileState,
}

impl ParserDefinition {
    /// 빈 정의를 생성합니다.
    pub fn new(name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
            pattern: String::new(),
            sub_patterns: Vec::new(),
            tags: BTreeSet::new(),
            metrics: BTreeMap::new(),
            state: CompileState::Pending,
        }
    }

    /// 갱신 내용을 적용합니다. 지정되지 않은 항목은 유지됩니다.
    pub(crate) fn apply(&mut self, update: ParserUpdate) {
        if let Some(spec) = update.pattern {
            self.pattern = spec.pattern;
            self.sub_patterns = spec.sub_patterns;
        }
        if let Some(tags) = update.tags {
            self.tags = tags.into_iter().collect();
        }
        if let Some(metrics) = update.metrics {
            self.metrics = metrics
                .into_iter()
                .map(|m| (m.name, m.metric_type))
                .collect();
        }
    }
}

/// 파서 추가/갱신 요청
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserUpdate {
    /// 패턴 (지정 시 교체)
    pub pattern: Option<PatternSpec>,
    /// 태그 목록 (지정 시 교체)
    pub tags: Option<Vec<String>>,
    /// 메트릭 목록 (지정 시 교체)
    pub metrics: Option<Vec<MetricSpec>>,
}

impl ParserUpdate {
    /// 패턴만 지정한 요청을 생성합니다.
    pub fn with_pattern(pattern: impl Into<String>) -> Self {
        Self {
            pattern: Some(PatternSpec {
                pattern: pattern.into(),
                sub_patterns: Vec::new(),
            }),
            ..Self::default()
        }
    }

    /// 로컬 조각을 추가합니다.
    pub fn sub_pattern(mut self, name: impl Into<String>, pattern: impl Into<String>) -> Self {
        let spec = self.pattern.get_or_insert_with(|| PatternSpec {
            pattern: String::new(),
            sub_patterns: Vec::new(),
        });
        spec.sub_patterns.push(SubPattern {
            name: name.into(),
            pattern: pattern.into(),
        });
        self
    }

    /// 태그 목록을 지정합니다.
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// 메트릭 하나를 추가합니다.
    pub fn metric(mut self, name: impl Into<String>, metric_type: MetricType) -> Self {
        self.metrics.get_or_insert_with(Vec::new).push(MetricSpec {
            name: name.into(),
            metric_type,
        });
        self
    }
}

/// RFC 5424 도메인별 설정
///
/// 켜진 항목의 헤더 필드가 해당 도메인에서 나온 모든 통계 레코드의 태그로 추가됩니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rfc5424DomainConfig {
    /// 호스트 이름을 태그로 추가
    pub hostname_as_tag: bool,
    /// 애플리케이션 이름을 태그로 추가
    pub appname_as_tag: bool,
    /// 프로세스 ID를 태그로 추가
    pub procid_as_tag: bool,
    /// 메시지 ID를 태그로 추가
    pub msgid_as_tag: bool,
}

/// 라우팅 결과
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// 매칭된 파서 정의 스냅샷
    pub parser: Arc<ParserDefinition>,
    /// 캡처된 필드
    pub fields: ParsedFields,
}

/// 기본 패턴 라이브러리 항목
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BasePattern {
    /// 패턴 이름
    pub name: String,
    /// 정규식 본문
    pub pattern: String,
}

/// 레지스트리 조회 결과
#[derive(Debug, Clone, Serialize)]
pub struct ParserIntrospection {
    /// 기본 도메인의 미리 등록된 파서
    pub preconfigured: Vec<ParserDefinition>,
    /// 사용자 도메인 파서
    pub configured: Vec<ParserDefinition>,
    /// 기본 패턴 라이브러리
    pub base_patterns: Vec<BasePattern>,
}
