//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 타입
//!
//! 수집기, 통계 기록 경로, 알람 경로, 발행기가 서로 주고받는 데이터 구조를 정의합니다.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 태그 집합 (태그 이름 -> 값)
///
/// 정렬된 맵을 사용하여 직렬화 결과가 결정적입니다.
pub type TagSet = BTreeMap<String, String>;

/// 통계 레코드의 값
///
/// 파서 설정에서 선언한 메트릭 타입에 따라 정수 또는 문자열입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    /// 정수 값 (`data_type = "int"`)
    Int(i64),
    /// 문자열 값 (그 외 모든 타입)
    Str(String),
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v}"),
        }
    }
}

/// 통계 레코드
///
/// 파서 하나가 매칭한 메트릭 하나당 하나씩 생성되어 통계 기록 경로로 전달됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatRecord {
    /// 이벤트 시각 (epoch 기준 마이크로초)
    pub timestamp_us: i64,
    /// 통계 테이블 이름 (파서 이름)
    pub table: String,
    /// 메트릭 이름
    pub metric: String,
    /// 태그 집합
    pub tags: TagSet,
    /// 속성 맵 (`"value"` 키에 메트릭 값)
    pub attributes: BTreeMap<String, StatValue>,
}

impl StatRecord {
    /// 속성 맵의 키
    pub const VALUE_ATTRIBUTE: &'static str = "value";

    /// 메트릭 값을 반환합니다.
    pub fn value(&self) -> Option<&StatValue> {
        self.attributes.get(Self::VALUE_ATTRIBUTE)
    }
}

/// 패턴 컴파일 알람 이벤트
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmEvent {
    /// 알람 대상 패턴(파서) 이름
    pub pattern_name: String,
    /// `true`면 알람 해제, `false`면 알람 발생
    pub cleared: bool,
}

impl AlarmEvent {
    /// 알람 발생 이벤트를 생성합니다.
    pub fn raised(pattern_name: impl Into<String>) -> Self {
        Self {
            pattern_name: pattern_name.into(),
            cleared: false,
        }
    }

    /// 알람 해제 이벤트를 생성합니다.
    pub fn cleared(pattern_name: impl Into<String>) -> Self {
        Self {
            pattern_name: pattern_name.into(),
            cleared: true,
        }
    }
}

/// 외부 연결 상태
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// 아직 판정되지 않음
    #[default]
    Init,
    /// 정상
    Up,
    /// 끊김
    Down,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stat_value_serializes_untagged() {
        let int = serde_json::to_string(&StatValue::Int(42)).unwrap();
        let text = serde_json::to_string(&StatValue::Str("ok".to_owned())).unwrap();
        assert_eq!(int, "42");
        assert_eq!(text, "\"ok\"");
    }

    #[test]
    fn stat_record_value_lookup() {
        let mut attributes = BTreeMap::new();
        attributes.insert(StatRecord::VALUE_ATTRIBUTE.to_owned(), StatValue::Int(7));
        let record = StatRecord {
            timestamp_us: 0,
            table: "latency_parser".to_owned(),
            metric: "latency".to_owned(),
            tags: TagSet::new(),
            attributes,
        };
        assert_eq!(record.value(), Some(&StatValue::Int(7)));
    }

    #[test]
    fn alarm_constructors() {
        assert!(!AlarmEvent::raised("p").cleared);
        assert!(AlarmEvent::cleared("p").cleared);
    }

    #[test]
    fn connection_status_display() {
        assert_eq!(ConnectionStatus::default().to_string(), "init");
        assert_eq!(ConnectionStatus::Up.to_string(), "up");
        assert_eq!(ConnectionStatus::Down.to_string(), "down");
    }
}
