//! grok 패턴 엔진 -- 이름 있는 정규식 조각을 조합해 필드를 추출합니다.
//!
//! # 패턴 문법
//! - `%{NAME}`: 조각 `NAME`을 비캡처 그룹으로 삽입
//! - `%{NAME:label}`: 조각 `NAME`이 매칭한 텍스트를 `label` 필드로 캡처
//! - `%{NAME:label:type}`: `type`은 무시되며 캡처는 항상 문자열
//!
//! 조각은 먼저 정의 자신의 로컬 조각에서, 다음으로 [`patterns`]의 기본
//! 라이브러리에서 찾습니다. 컴파일된 패턴은 입력 전체에 고정(anchored)되어
//! 매칭됩니다.
//!
//! # 사용 예시
//! ```ignore
//! let mut engine = PatternEngine::new();
//! engine.define("HTTP_LOG");
//! engine.add_fragment(
//!     "HTTP_LOG",
//!     "HTTP_LOG %{IP:client} %{WORD:method} %{URIPATHPARAM:request}",
//! )?;
//! engine.compile("HTTP_LOG")?;
//! let fields = engine.matches("HTTP_LOG", "55.3.244.1 GET /index.html");
//! ```

pub mod patterns;

use std::collections::HashMap;

use regex::{Regex, RegexBuilder};

use crate::error::SyslogPipelineError;

/// 매칭 결과 필드 (캡처 이름 -> 캡처된 텍스트)
pub type ParsedFields = HashMap<String, String>;

/// 내부 캡처 그룹 이름 접두어
const GROUP_PREFIX: &str = "__g";

/// 참조를 모두 펼친 정규식 본문의 최대 길이 (바이트)
const MAX_EXPANDED_LEN: usize = 256 * 1024;

/// 컴파일된 정규식 프로그램의 최대 크기
const REGEX_SIZE_LIMIT: usize = 8 * 1024 * 1024;

/// 컴파일 결과
#[derive(Debug)]
struct CompiledPattern {
    regex: Regex,
    /// (정규식 그룹 이름, 필드 이름) 순서대로
    captures: Vec<(String, String)>,
}

/// 파서 정의 하나의 조각 집합과 컴파일 결과
#[derive(Debug, Default)]
struct Definition {
    /// (조각 이름, 본문) 삽입 순서
    fragments: Vec<(String, String)>,
    compiled: Option<CompiledPattern>,
}

impl Definition {
    fn fragment(&self, name: &str) -> Option<&str> {
        // 같은 이름이 여러 번 추가되면 마지막 것이 유효
        self.fragments
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, body)| body.as_str())
    }
}

/// grok 패턴 엔진
///
/// 파서 정의 이름마다 독립된 조각 집합을 보관하고, 정의 이름과 같은
/// 이름의 조각을 최상위 패턴으로 컴파일합니다.
#[derive(Debug, Default)]
pub struct PatternEngine {
    definitions: HashMap<String, Definition>,
}

impl PatternEngine {
    /// 빈 엔진을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 빈 정의를 만듭니다. 이미 있으면 기존 조각과 컴파일 결과를 버립니다.
    pub fn define(&mut self, name: &str) {
        self.definitions
            .insert(name.to_owned(), Definition::default());
    }

    /// `"NAME body"` 형식의 조각 한 줄을 정의에 추가합니다.
    ///
    /// 첫 공백 앞이 조각 이름, 나머지가 정규식 본문입니다. 컴파일 결과는 무효화됩니다.
    pub fn add_fragment(&mut self, definition: &str, line: &str) -> Result<(), SyslogPipelineError> {
        let def = self
            .definitions
            .get_mut(definition)
            .ok_or_else(|| SyslogPipelineError::UnknownPattern(definition.to_owned()))?;

        let line = line.trim_start();
        let (name, body) = match line.split_once(char::is_whitespace) {
            Some((name, body)) => (name, body.trim_start()),
            None => (line, ""),
        };
        if !is_valid_name(name) {
            return Err(SyslogPipelineError::PatternCompile {
                name: definition.to_owned(),
                reason: format!("invalid fragment name '{name}'"),
            });
        }

        def.fragments.push((name.to_owned(), body.to_owned()));
        def.compiled = None;
        Ok(())
    }

    /// 정의를 컴파일합니다.
    ///
    /// 정의 이름과 같은 이름의 조각이 최상위 패턴입니다.
    pub fn compile(&mut self, name: &str) -> Result<(), SyslogPipelineError> {
        let def = self
            .definitions
            .get_mut(name)
            .ok_or_else(|| SyslogPipelineError::UnknownPattern(name.to_owned()))?;
        def.compiled = None;

        let compile_err = |reason: String| SyslogPipelineError::PatternCompile {
            name: name.to_owned(),
            reason,
        };

        if def.fragment(name).is_none() {
            return Err(compile_err(format!("no top-level fragment named '{name}'")));
        }

        let mut expander = Expander {
            definition: def,
            stack: Vec::new(),
            captures: Vec::new(),
        };
        let body = expander.expand(name).map_err(compile_err)?;
        let mut captures = expander.captures;

        let regex = RegexBuilder::new(&format!("^(?:{body})$"))
            .size_limit(REGEX_SIZE_LIMIT)
            .build()
            .map_err(|e| compile_err(e.to_string()))?;

        // 패턴에 직접 쓴 (?P<name>...) 그룹도 필드로 노출
        for group in regex.capture_names().flatten() {
            if !group.starts_with(GROUP_PREFIX) {
                captures.push((group.to_owned(), group.to_owned()));
            }
        }

        def.compiled = Some(CompiledPattern { regex, captures });
        Ok(())
    }

    /// 정의가 컴파일된 상태인지 확인합니다.
    pub fn is_compiled(&self, name: &str) -> bool {
        self.definitions
            .get(name)
            .is_some_and(|d| d.compiled.is_some())
    }

    /// 컴파일된 정의로 텍스트를 매칭합니다.
    ///
    /// 매칭 실패 또는 미컴파일 정의면 `None`을 반환합니다. 같은 필드 이름이
    /// 여러 번 캡처되면 처음 참여한 캡처가 사용됩니다.
    pub fn matches(&self, name: &str, text: &str) -> Option<ParsedFields> {
        let compiled = self.definitions.get(name)?.compiled.as_ref()?;
        let caps = compiled.regex.captures(text)?;

        let mut fields = ParsedFields::with_capacity(compiled.captures.len());
        for (group, label) in &compiled.captures {
            if let Some(m) = caps.name(group) {
                fields
                    .entry(label.clone())
                    .or_insert_with(|| m.as_str().to_owned());
            }
        }
        Some(fields)
    }

    /// 정의와 컴파일 결과를 제거합니다.
    pub fn remove(&mut self, name: &str) -> bool {
        self.definitions.remove(name).is_some()
    }

    /// 정의가 존재하는지 확인합니다.
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// 기본 라이브러리의 패턴 이름 목록 (정렬됨)
    pub fn base_names() -> Vec<&'static str> {
        let mut names: Vec<_> = patterns::BASE_PATTERNS.iter().map(|(n, _)| *n).collect();
        names.sort_unstable();
        names
    }

    /// 기본 라이브러리의 (이름, 본문) 목록 (이름 순)
    pub fn base_patterns() -> Vec<(&'static str, &'static str)> {
        let mut all = patterns::BASE_PATTERNS.to_vec();
        all.sort_unstable_by_key(|(n, _)| *n);
        all
    }
}

/// `%{...}` 참조를 재귀적으로 펼칩니다.
struct Expander<'a> {
    definition: &'a Definition,
    /// 현재 펼치는 중인 조각 이름 (순환 검출용)
    stack: Vec<String>,
    captures: Vec<(String, String)>,
}

impl Expander<'_> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.definition
            .fragment(name)
            .or_else(|| patterns::lookup(name))
            .map(str::to_owned)
    }

    fn expand(&mut self, name: &str) -> Result<String, String> {
        if self.stack.iter().any(|n| n == name) {
            let mut chain = self.stack.join(" -> ");
            chain.push_str(" -> ");
            chain.push_str(name);
            return Err(format!("recursive pattern reference: {chain}"));
        }
        let body = self
            .lookup(name)
            .ok_or_else(|| format!("unknown pattern reference '{name}'"))?;

        self.stack.push(name.to_owned());
        let expanded = self.expand_text(&body)?;
        self.stack.pop();
        Ok(expanded)
    }

    fn expand_text(&mut self, text: &str) -> Result<String, String> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find("%{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find('}')
                .ok_or_else(|| format!("unterminated reference '%{{{after}'"))?;
            let reference = &after[..end];

            let (name, label) = match reference.split_once(':') {
                Some((name, semantic)) => {
                    // `label:type`의 type은 버림
                    let label = semantic.split_once(':').map_or(semantic, |(l, _)| l);
                    (name, Some(label))
                }
                None => (reference, None),
            };
            if !is_valid_name(name) {
                return Err(format!("invalid pattern reference '%{{{reference}}}'"));
            }

            let inner = self.expand(name)?;
            match label {
                Some(label) if !label.is_empty() => {
                    let group = format!("{GROUP_PREFIX}{}", self.captures.len());
                    out.push_str(&format!("(?P<{group}>{inner})"));
                    self.captures.push((group, label.to_owned()));
                }
                _ => {
                    out.push_str("(?:");
                    out.push_str(&inner);
                    out.push(')');
                }
            }
            if out.len() > MAX_EXPANDED_LEN {
                return Err(too_large());
            }
            rest = &after[end + 1..];
        }

        out.push_str(rest);
        if out.len() > MAX_EXPANDED_LEN {
            return Err(too_large());
        }
        Ok(out)
    }
}

fn too_large() -> String {
    format!("expanded pattern too large: more than {MAX_EXPANDED_LEN} bytes")
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with(name: &str, lines: &[&str]) -> PatternEngine {
        let mut engine = PatternEngine::new();
        engine.define(name);
        for line in lines {
            engine.add_fragment(name, line).unwrap();
        }
        engine
    }

    #[test]
    fn http_log_extracts_fields() {
        let mut engine = engine_with(
            "HTTP_LOG",
            &["HTTP_LOG %{IP:client} %{WORD:method} %{URIPATHPARAM:request} %{NUMBER:bytes} %{NUMBER:duration}"],
        );
        engine.compile("HTTP_LOG").unwrap();

        let fields = engine
            .matches("HTTP_LOG", "55.3.244.1 GET /index.html 15824 0.043")
            .unwrap();
        assert_eq!(fields["client"], "55.3.244.1");
        assert_eq!(fields["method"], "GET");
        assert_eq!(fields["request"], "/index.html");
        assert_eq!(fields["bytes"], "15824");
        assert_eq!(fields["duration"], "0.043");
    }

    #[test]
    fn postfix_line_with_local_fragment() {
        let mut engine = engine_with(
            "POSTFIX",
            &[
                "POSTFIX_QUEUEID [0-9A-F]{10,11}",
                "POSTFIX %{SYSLOGBASE} %{POSTFIX_QUEUEID:queue_id}: %{GREEDYDATA:syslog_message}",
            ],
        );
        engine.compile("POSTFIX").unwrap();

        let line = "Jan  1 06:25:43 mailserver14 postfix/cleanup[21403]: BEF25A72965: message-id=<20130101142543.5828399CCAF@mailserver14.example.com>";
        let fields = engine.matches("POSTFIX", line).unwrap();
        assert_eq!(fields["timestamp"], "Jan  1 06:25:43");
        assert_eq!(fields["logsource"], "mailserver14");
        assert_eq!(fields["program"], "postfix/cleanup");
        assert_eq!(fields["pid"], "21403");
        assert_eq!(fields["queue_id"], "BEF25A72965");
        assert_eq!(
            fields["syslog_message"],
            "message-id=<20130101142543.5828399CCAF@mailserver14.example.com>"
        );
    }

    #[test]
    fn match_is_anchored() {
        let mut engine = engine_with("NUM", &["NUM %{INT:n}"]);
        engine.compile("NUM").unwrap();
        assert!(engine.matches("NUM", "42").is_some());
        assert!(engine.matches("NUM", "x42").is_none());
        assert!(engine.matches("NUM", "42 ").is_none());
    }

    #[test]
    fn type_suffix_is_ignored() {
        let mut engine = engine_with("LAT", &["LAT latency=%{INT:latency:int}"]);
        engine.compile("LAT").unwrap();
        let fields = engine.matches("LAT", "latency=42").unwrap();
        assert_eq!(fields["latency"], "42");
    }

    #[test]
    fn duplicate_label_keeps_first_participating_capture() {
        let mut engine = engine_with("DUP", &["DUP (?:%{INT:v}|%{WORD:v})"]);
        engine.compile("DUP").unwrap();
        assert_eq!(engine.matches("DUP", "12").unwrap()["v"], "12");
        assert_eq!(engine.matches("DUP", "abc").unwrap()["v"], "abc");
    }

    #[test]
    fn unknown_reference_fails_compile() {
        let mut engine = engine_with("BAD", &["BAD %{NOPE:x}"]);
        let err = engine.compile("BAD").unwrap_err();
        assert!(err.to_string().contains("NOPE"));
        assert!(!engine.is_compiled("BAD"));
        assert!(engine.matches("BAD", "anything").is_none());
    }

    #[test]
    fn recursive_reference_fails_compile() {
        let mut engine = engine_with("LOOP", &["A %{B}", "B %{A}", "LOOP %{A}"]);
        let err = engine.compile("LOOP").unwrap_err();
        assert!(err.to_string().contains("recursive"));
    }

    #[test]
    fn doubling_chain_fails_compile_without_expanding() {
        // L0 -> L1 L1 -> ... -> L24 = a: 2^24 copies if fully expanded
        let mut lines: Vec<String> = (0..24)
            .map(|i| format!("L{i} %{{L{next}}}%{{L{next}}}", next = i + 1))
            .collect();
        lines.push("L24 a".to_owned());
        lines.push("CHAIN %{L0}".to_owned());
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();

        let mut engine = engine_with("CHAIN", &refs);
        let err = engine.compile("CHAIN").unwrap_err();
        assert!(err.to_string().contains("too large"));
        assert!(!engine.is_compiled("CHAIN"));
    }

    #[test]
    fn unterminated_reference_fails_compile() {
        let mut engine = engine_with("OPEN", &["OPEN %{INT"]);
        assert!(engine.compile("OPEN").is_err());
    }

    #[test]
    fn invalid_regex_fails_compile() {
        let mut engine = engine_with("PAREN", &["PAREN (unclosed"]);
        assert!(engine.compile("PAREN").is_err());
    }

    #[test]
    fn missing_top_level_fragment_fails_compile() {
        let mut engine = engine_with("TOP", &["OTHER %{INT}"]);
        let err = engine.compile("TOP").unwrap_err();
        assert!(err.to_string().contains("top-level"));
    }

    #[test]
    fn local_fragment_overrides_base_library() {
        let mut engine = engine_with("OVR", &["INT [a-z]+", "OVR %{INT:v}"]);
        engine.compile("OVR").unwrap();
        assert!(engine.matches("OVR", "abc").is_some());
        assert!(engine.matches("OVR", "123").is_none());
    }

    #[test]
    fn add_fragment_to_unknown_definition_fails() {
        let mut engine = PatternEngine::new();
        assert!(matches!(
            engine.add_fragment("missing", "X y"),
            Err(SyslogPipelineError::UnknownPattern(_))
        ));
    }

    #[test]
    fn add_fragment_invalidates_compiled_form() {
        let mut engine = engine_with("P", &["P %{INT:n}"]);
        engine.compile("P").unwrap();
        assert!(engine.is_compiled("P"));
        engine.add_fragment("P", "EXTRA %{WORD}").unwrap();
        assert!(!engine.is_compiled("P"));
    }

    #[test]
    fn remove_discards_definition() {
        let mut engine = engine_with("P", &["P %{INT:n}"]);
        engine.compile("P").unwrap();
        assert!(engine.remove("P"));
        assert!(!engine.contains("P"));
        assert!(!engine.remove("P"));
        assert!(engine.matches("P", "1").is_none());
    }

    #[test]
    fn inline_named_groups_are_exposed() {
        let mut engine = engine_with("RAW", &["RAW (?P<code>[0-9]{3}) %{WORD:word}"]);
        engine.compile("RAW").unwrap();
        let fields = engine.matches("RAW", "404 missing").unwrap();
        assert_eq!(fields["code"], "404");
        assert_eq!(fields["word"], "missing");
    }

    #[test]
    fn base_listing_is_sorted() {
        let names = PatternEngine::base_names();
        assert!(names.windows(2).all(|w| w[0] <= w[1]));
        assert!(names.contains(&"SYSLOGBASE"));
        assert_eq!(PatternEngine::base_patterns().len(), names.len());
    }

    #[test]
    fn every_base_pattern_compiles() {
        for name in PatternEngine::base_names() {
            let mut engine = PatternEngine::new();
            engine.define("T");
            engine.add_fragment("T", &format!("T %{{{name}}}")).unwrap();
            engine
                .compile("T")
                .unwrap_or_else(|e| panic!("base pattern {name} failed: {e}"));
        }
    }
}
