//! 파서 레지스트리 -- 도메인별 grok 파서의 등록, 갱신, 삭제, 라우팅
//!
//! 모든 파서는 하나의 도메인에 속하며, 도메인 안에서는 먼저 등록된 파서부터
//! 시도합니다. 기본 도메인(`default`)에는 RFC 5424 헤더 파서가 미리 등록되어
//! 있고 수정할 수 없습니다.
//!
//! # 아키텍처
//! - [`ParserRegistry`]: 잠금 하나로 직렬화된 등록/라우팅
//! - [`document`]: `syslog_parser`/`rfc5424` 설정 문서 해석
//! - [`loader`]: 디렉토리에서 설정 문서 로딩
//! - [`types`]: 파서 정의와 조회 결과
//!
//! # 사용 예시
//! ```ignore
//! let registry = ParserRegistry::new(Some(alarm_reporter))?;
//! registry.add_or_update(
//!     "latency_parser",
//!     "app1-evt1",
//!     ParserUpdate::with_pattern("latency=%{INT:latency}").metric("latency", MetricType::Int),
//! )?;
//! let hit = registry.route("app1-evt1", "latency=42");
//! ```

pub mod document;
pub mod loader;
pub mod types;

pub use document::ConfigDocument;
pub use loader::ParserConfigLoader;
pub use types::{
    BasePattern, CompileState, MetricSpec, MetricType, ParserDefinition, ParserIntrospection,
    ParserUpdate, PatternSpec, Rfc5424DomainConfig, RouteMatch, SubPattern,
};

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use sysgrok_core::metrics as m;
use sysgrok_core::pipeline::AlarmReporter;
use sysgrok_core::types::AlarmEvent;

use crate::error::SyslogPipelineError;
use crate::grok::PatternEngine;
use crate::parser::rfc5424::{self, RFC5424_PARSER};

/// 미리 등록된 파서가 속한 도메인
pub const DEFAULT_DOMAIN: &str = "default";

/// 잠금으로 보호되는 레지스트리 상태
#[derive(Default)]
struct RegistryState {
    engine: PatternEngine,
    parsers: HashMap<String, Arc<ParserDefinition>>,
    /// 도메인 -> 파서 이름 (등록 순)
    domains: HashMap<String, Vec<String>>,
    rfc5424: HashMap<String, Rfc5424DomainConfig>,
}

impl RegistryState {
    /// 파서를 추가하거나 갱신하고, 필요한 알람 이벤트를 반환합니다.
    fn install(
        &mut self,
        name: &str,
        domain: &str,
        update: ParserUpdate,
    ) -> (Arc<ParserDefinition>, Option<AlarmEvent>) {
        let existing = self.parsers.get(name).cloned();
        let was_error = existing.as_ref().is_some_and(|d| d.state.is_error());

        self.engine.remove(name);

        let mut def = match existing {
            Some(prev) => {
                let mut def = (*prev).clone();
                if def.domain != domain {
                    self.leave_domain(&def.domain, name);
                    self.join_domain(domain, name);
                    def.domain = domain.to_owned();
                }
                def
            }
            None => {
                self.join_domain(domain, name);
                ParserDefinition::new(name, domain)
            }
        };

        def.apply(update);
        def.state = self.compile(&def);

        let alarm = match (&def.state, was_error) {
            (CompileState::Error(_), false) => Some(AlarmEvent::raised(name)),
            (state, true) if !state.is_error() => Some(AlarmEvent::cleared(name)),
            _ => None,
        };

        let def = Arc::new(def);
        self.parsers.insert(name.to_owned(), Arc::clone(&def));
        (def, alarm)
    }

    fn compile(&mut self, def: &ParserDefinition) -> CompileState {
        if def.pattern.is_empty() {
            return CompileState::Pending;
        }

        self.engine.define(&def.name);
        let lines = def
            .sub_patterns
            .iter()
            .map(|s| format!("{} {}", s.name, s.pattern))
            .chain(std::iter::once(format!("{} {}", def.name, def.pattern)));

        let mut result = Ok(());
        for line in lines {
            result = self.engine.add_fragment(&def.name, &line);
            if result.is_err() {
                break;
            }
        }

        match result.and_then(|()| self.engine.compile(&def.name)) {
            Ok(()) => CompileState::Compiled,
            Err(e) => {
                self.engine.remove(&def.name);
                CompileState::Error(e.to_string())
            }
        }
    }

    /// 파서를 제거하고, 필요한 알람 이벤트를 반환합니다.
    fn uninstall(&mut self, name: &str) -> Option<(Arc<ParserDefinition>, Option<AlarmEvent>)> {
        let def = self.parsers.remove(name)?;
        self.leave_domain(&def.domain, name);
        self.engine.remove(name);
        let alarm = def.state.is_error().then(|| AlarmEvent::cleared(name));
        Some((def, alarm))
    }

    fn join_domain(&mut self, domain: &str, name: &str) {
        let members = self.domains.entry(domain.to_owned()).or_default();
        if !members.iter().any(|n| n == name) {
            members.push(name.to_owned());
        }
    }

    fn leave_domain(&mut self, domain: &str, name: &str) {
        if let Some(members) = self.domains.get_mut(domain) {
            members.retain(|n| n != name);
            if members.is_empty() {
                self.domains.remove(domain);
            }
        }
    }

    fn configured_count(&self) -> usize {
        self.parsers
            .values()
            .filter(|d| d.domain != DEFAULT_DOMAIN)
            .count()
    }
}

/// 파서 레지스트리
///
/// 등록/갱신/삭제와 라우팅은 모두 하나의 잠금 아래에서 수행됩니다.
/// 알람은 잠금을 해제한 뒤 보고됩니다.
pub struct ParserRegistry {
    state: Mutex<RegistryState>,
    alarms: Option<Arc<dyn AlarmReporter>>,
}

impl ParserRegistry {
    /// RFC 5424 헤더 파서가 등록된 레지스트리를 생성합니다.
    pub fn new(alarms: Option<Arc<dyn AlarmReporter>>) -> Result<Self, SyslogPipelineError> {
        let mut state = RegistryState::default();
        let (builtin, _) = state.install(RFC5424_PARSER, DEFAULT_DOMAIN, rfc5424::builtin_update());
        if let CompileState::Error(reason) = &builtin.state {
            return Err(SyslogPipelineError::PatternCompile {
                name: RFC5424_PARSER.to_owned(),
                reason: reason.clone(),
            });
        }

        Ok(Self {
            state: Mutex::new(state),
            alarms,
        })
    }

    /// 파서를 추가하거나 갱신합니다.
    ///
    /// 기존 파서면 컴파일 결과를 먼저 버리고, 도메인이 바뀌었으면 소속을 옮긴 뒤
    /// 다시 컴파일합니다. 컴파일 실패는 에러가 아니라 `CompileState::Error`로
    /// 반환되며, 에러 상태로 처음 진입할 때만 알람이 발생합니다.
    ///
    /// # Errors
    /// - 이름이나 도메인이 비어 있는 경우
    /// - 미리 등록된 파서를 수정하려는 경우
    pub fn add_or_update(
        &self,
        name: &str,
        domain: &str,
        update: ParserUpdate,
    ) -> Result<CompileState, SyslogPipelineError> {
        validate_target(name, domain)?;

        let (def, alarm, configured) = {
            let mut state = self.state.lock();
            let (def, alarm) = state.install(name, domain, update);
            (def, alarm, state.configured_count())
        };

        match &def.state {
            CompileState::Error(reason) => {
                metrics::counter!(m::PARSER_COMPILE_ERRORS_TOTAL).increment(1);
                tracing::error!(
                    parser = %name,
                    domain = %domain,
                    error = %reason,
                    "failed to compile parser pattern"
                );
            }
            CompileState::Compiled => {
                tracing::info!(parser = %name, domain = %domain, "parser configured");
            }
            CompileState::Pending => {
                tracing::debug!(parser = %name, domain = %domain, "parser has no pattern yet");
            }
        }
        metrics::gauge!(m::PARSER_CONFIGURED).set(configured as f64);
        self.report(alarm);

        Ok(def.state.clone())
    }

    /// 파서를 삭제합니다.
    ///
    /// 등록되지 않은 이름이면 에러 로그를 남기고 `false`를 반환합니다.
    pub fn delete(&self, name: &str, domain: &str) -> bool {
        match self.remove(name, domain) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(parser = %name, domain = %domain, error = %e, "failed to delete parser");
                false
            }
        }
    }

    fn remove(&self, name: &str, domain: &str) -> Result<(), SyslogPipelineError> {
        if name == RFC5424_PARSER {
            return Err(builtin_error());
        }

        let (removed, configured) = {
            let mut state = self.state.lock();
            let removed = state.uninstall(name);
            (removed, state.configured_count())
        };
        let (def, alarm) = removed.ok_or_else(|| SyslogPipelineError::UnknownPattern(name.to_owned()))?;

        if def.domain != domain {
            tracing::warn!(
                parser = %name,
                requested = %domain,
                actual = %def.domain,
                "parser deleted from a different domain than requested"
            );
        }
        tracing::info!(parser = %name, domain = %def.domain, "parser deleted");
        metrics::gauge!(m::PARSER_CONFIGURED).set(configured as f64);
        self.report(alarm);
        Ok(())
    }

    /// 도메인의 파서를 등록 순으로 시도하여 처음 매칭된 결과를 반환합니다.
    pub fn route(&self, domain: &str, text: &str) -> Option<RouteMatch> {
        let state = self.state.lock();
        let members = state.domains.get(domain)?;
        members.iter().find_map(|name| {
            let fields = state.engine.matches(name, text)?;
            let parser = Arc::clone(state.parsers.get(name)?);
            Some(RouteMatch { parser, fields })
        })
    }

    /// 기본 도메인으로 라우팅합니다.
    pub fn match_default(&self, text: &str) -> Option<RouteMatch> {
        self.route(DEFAULT_DOMAIN, text)
    }

    /// RFC 5424 도메인 설정을 추가하거나 교체합니다.
    pub fn set_rfc5424_config(&self, domain_id: &str, config: Rfc5424DomainConfig) {
        self.state
            .lock()
            .rfc5424
            .insert(domain_id.to_owned(), config);
        tracing::info!(domain = %domain_id, "rfc5424 domain configured");
    }

    /// RFC 5424 도메인 설정을 제거합니다.
    pub fn remove_rfc5424_config(&self, domain_id: &str) -> bool {
        let removed = self.state.lock().rfc5424.remove(domain_id).is_some();
        if removed {
            tracing::info!(domain = %domain_id, "rfc5424 domain removed");
        }
        removed
    }

    /// RFC 5424 도메인 설정을 조회합니다.
    pub fn rfc5424_config(&self, domain_id: &str) -> Option<Rfc5424DomainConfig> {
        self.state.lock().rfc5424.get(domain_id).copied()
    }

    /// JSON 설정 문서를 적용합니다.
    ///
    /// `add_update`가 `false`면 삭제로 처리합니다. 해석에 실패한 문서는
    /// 레지스트리를 변경하지 않습니다.
    pub fn apply_document(
        &self,
        value: &serde_json::Value,
        add_update: bool,
    ) -> Result<(), SyslogPipelineError> {
        let doc = ConfigDocument::from_json(value)?;
        self.apply(doc, add_update)
    }

    /// 해석된 설정 문서를 적용합니다.
    pub fn apply(&self, doc: ConfigDocument, add_update: bool) -> Result<(), SyslogPipelineError> {
        match (doc, add_update) {
            (ConfigDocument::SyslogParser { name, domain, update }, true) => {
                self.add_or_update(&name, &domain, update).map(|_| ())
            }
            (ConfigDocument::SyslogParser { name, domain, .. }, false) => self.remove(&name, &domain),
            (ConfigDocument::Rfc5424 { domain_id, config }, true) => {
                self.set_rfc5424_config(&domain_id, config);
                Ok(())
            }
            (ConfigDocument::Rfc5424 { domain_id, .. }, false) => {
                if self.remove_rfc5424_config(&domain_id) {
                    Ok(())
                } else {
                    Err(SyslogPipelineError::ConfigDocument {
                        kind: document::RFC5424_KEY.to_owned(),
                        reason: format!("unknown rfc5424 domain '{domain_id}'"),
                    })
                }
            }
        }
    }

    /// 파서 정의 스냅샷을 조회합니다.
    pub fn parser(&self, name: &str) -> Option<Arc<ParserDefinition>> {
        self.state.lock().parsers.get(name).cloned()
    }

    /// 도메인에 속한 파서 이름을 등록 순으로 반환합니다.
    pub fn domain_members(&self, domain: &str) -> Vec<String> {
        self.state
            .lock()
            .domains
            .get(domain)
            .cloned()
            .unwrap_or_default()
    }

    /// 사용자 도메인 파서 수
    pub fn configured_count(&self) -> usize {
        self.state.lock().configured_count()
    }

    /// 레지스트리 내용을 조회합니다.
    ///
    /// 기본 도메인 파서는 `preconfigured`, 나머지는 도메인 이름 순으로 `configured`에 담깁니다.
    pub fn introspect(&self) -> ParserIntrospection {
        let state = self.state.lock();
        let snapshot = |name: &String| state.parsers.get(name).map(|d| (**d).clone());

        let preconfigured = state
            .domains
            .get(DEFAULT_DOMAIN)
            .map(|names| names.iter().filter_map(snapshot).collect())
            .unwrap_or_default();

        let mut domains: Vec<_> = state
            .domains
            .keys()
            .filter(|d| d.as_str() != DEFAULT_DOMAIN)
            .collect();
        domains.sort();
        let configured = domains
            .into_iter()
            .filter_map(|d| state.domains.get(d))
            .flat_map(|names| names.iter().filter_map(snapshot))
            .collect();

        let base_patterns = PatternEngine::base_patterns()
            .into_iter()
            .map(|(name, pattern)| BasePattern {
                name: name.to_owned(),
                pattern: pattern.to_owned(),
            })
            .collect();

        ParserIntrospection {
            preconfigured,
            configured,
            base_patterns,
        }
    }

    fn report(&self, alarm: Option<AlarmEvent>) {
        let (Some(event), Some(reporter)) = (alarm, &self.alarms) else {
            return;
        };
        if event.cleared {
            tracing::info!(parser = %event.pattern_name, "parser compile alarm cleared");
        } else {
            tracing::warn!(parser = %event.pattern_name, "parser compile alarm raised");
        }
        reporter.report(event);
    }
}

fn validate_target(name: &str, domain: &str) -> Result<(), SyslogPipelineError> {
    if name.is_empty() || domain.is_empty() {
        return Err(SyslogPipelineError::Config {
            field: "syslog_parser.fq_name".to_owned(),
            reason: "parser name and domain must not be empty".to_owned(),
        });
    }
    if name == RFC5424_PARSER {
        return Err(builtin_error());
    }
    Ok(())
}

fn builtin_error() -> SyslogPipelineError {
    SyslogPipelineError::Config {
        field: "syslog_parser.fq_name".to_owned(),
        reason: format!("parser '{RFC5424_PARSER}' is built in and cannot be modified"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::tests::RecordingAlarmReporter;

    fn registry_with_alarms() -> (ParserRegistry, Arc<RecordingAlarmReporter>) {
        let alarms = Arc::new(RecordingAlarmReporter::default());
        let reporter: Arc<dyn AlarmReporter> = alarms.clone();
        let registry = ParserRegistry::new(Some(reporter)).unwrap();
        (registry, alarms)
    }

    #[test]
    fn builtin_parser_is_preconfigured() {
        let registry = ParserRegistry::new(None).unwrap();
        assert_eq!(registry.domain_members(DEFAULT_DOMAIN), vec![RFC5424_PARSER]);
        assert_eq!(
            registry.parser(RFC5424_PARSER).unwrap().state,
            CompileState::Compiled
        );
        assert_eq!(registry.configured_count(), 0);
    }

    #[test]
    fn default_domain_matches_rfc5424_header() {
        let registry = ParserRegistry::new(None).unwrap();
        let hit = registry
            .match_default("<34>1 2024-01-15T12:00:00Z host app1 - evt1 - latency=42")
            .unwrap();
        assert_eq!(hit.parser.name, RFC5424_PARSER);
        assert_eq!(hit.fields[rfc5424::field::APPNAME], "app1");
        assert_eq!(hit.fields[rfc5424::field::MSGID], "evt1");
        assert_eq!(hit.fields[rfc5424::field::MSG], "latency=42");
        assert_eq!(hit.fields[rfc5424::field::HOSTNAME], "host");
        assert!(!hit.fields.contains_key(rfc5424::field::PROCID));
    }

    #[test]
    fn default_domain_captures_structured_data() {
        let registry = ParserRegistry::new(None).unwrap();
        let hit = registry
            .match_default(r#"<165>1 2003-10-11T22:14:15.003Z mymachine evntslog 1234 ID47 [a="1"][b="2"] body text"#)
            .unwrap();
        assert_eq!(hit.fields[rfc5424::field::SD], r#"[a="1"][b="2"]"#);
        assert_eq!(hit.fields[rfc5424::field::MSG], "body text");
        assert_eq!(hit.fields[rfc5424::field::PROCID], "1234");
    }

    #[test]
    fn default_domain_rejects_bsd_line() {
        let registry = ParserRegistry::new(None).unwrap();
        assert!(registry
            .match_default("<34>Oct 11 22:14:15 mymachine su: 'su root' failed")
            .is_none());
    }

    #[test]
    fn add_and_route_user_parser() {
        let registry = ParserRegistry::new(None).unwrap();
        let state = registry
            .add_or_update(
                "latency_parser",
                "app1-evt1",
                ParserUpdate::with_pattern("latency=%{INT:latency}").metric("latency", MetricType::Int),
            )
            .unwrap();
        assert_eq!(state, CompileState::Compiled);

        let hit = registry.route("app1-evt1", "latency=42").unwrap();
        assert_eq!(hit.parser.name, "latency_parser");
        assert_eq!(hit.fields["latency"], "42");
        assert!(registry.route("other", "latency=42").is_none());
        assert!(registry.route("app1-evt1", "nope").is_none());
        assert_eq!(registry.configured_count(), 1);
    }

    #[test]
    fn route_prefers_first_registered_parser() {
        let registry = ParserRegistry::new(None).unwrap();
        registry
            .add_or_update("first", "d", ParserUpdate::with_pattern("%{GREEDYDATA:any}"))
            .unwrap();
        registry
            .add_or_update("second", "d", ParserUpdate::with_pattern("%{INT:n}"))
            .unwrap();
        assert_eq!(registry.route("d", "42").unwrap().parser.name, "first");

        // 갱신은 순서를 바꾸지 않음
        registry
            .add_or_update("first", "d", ParserUpdate::with_pattern("x=%{INT:n}"))
            .unwrap();
        assert_eq!(registry.domain_members("d"), vec!["first", "second"]);
        assert_eq!(registry.route("d", "42").unwrap().parser.name, "second");
    }

    #[test]
    fn readding_under_new_domain_moves_membership() {
        let registry = ParserRegistry::new(None).unwrap();
        registry
            .add_or_update("p", "old", ParserUpdate::with_pattern("%{INT:n}"))
            .unwrap();
        registry
            .add_or_update("p", "new", ParserUpdate::default())
            .unwrap();

        assert!(registry.domain_members("old").is_empty());
        assert_eq!(registry.domain_members("new"), vec!["p"]);
        assert_eq!(registry.parser("p").unwrap().domain, "new");
        assert!(registry.route("old", "1").is_none());
        assert!(registry.route("new", "1").is_some());
    }

    #[test]
    fn invalid_pattern_raises_alarm_once() {
        let (registry, alarms) = registry_with_alarms();
        for _ in 0..2 {
            let state = registry
                .add_or_update("bad", "d", ParserUpdate::with_pattern("%{NOPE:x}"))
                .unwrap();
            assert!(state.is_error());
        }
        assert_eq!(alarms.events(), vec![AlarmEvent::raised("bad")]);
        assert!(registry.route("d", "anything").is_none());
    }

    #[test]
    fn recovery_clears_alarm() {
        let (registry, alarms) = registry_with_alarms();
        registry
            .add_or_update("p", "d", ParserUpdate::with_pattern("(unclosed"))
            .unwrap();
        registry
            .add_or_update("p", "d", ParserUpdate::with_pattern("%{INT:n}"))
            .unwrap();
        assert_eq!(
            alarms.events(),
            vec![AlarmEvent::raised("p"), AlarmEvent::cleared("p")]
        );
        assert!(registry.route("d", "7").is_some());
    }

    #[test]
    fn failed_update_stops_old_pattern_matching() {
        let (registry, alarms) = registry_with_alarms();
        registry
            .add_or_update("p", "d", ParserUpdate::with_pattern("%{INT:n}"))
            .unwrap();
        assert!(registry.route("d", "7").is_some());

        let state = registry
            .add_or_update("p", "d", ParserUpdate::with_pattern("%{NOPE}"))
            .unwrap();
        assert!(state.is_error());
        assert!(registry.route("d", "7").is_none());
        assert_eq!(alarms.events(), vec![AlarmEvent::raised("p")]);
        assert_eq!(registry.domain_members("d"), vec!["p"]);
    }

    #[test]
    fn doubling_sub_pattern_chain_is_a_compile_error() {
        let (registry, alarms) = registry_with_alarms();
        let mut update = ParserUpdate::with_pattern("%{L0:v}");
        for i in 0..24 {
            update = update.sub_pattern(format!("L{i}"), format!("%{{L{n}}}%{{L{n}}}", n = i + 1));
        }
        update = update.sub_pattern("L24", "a");

        let state = registry.add_or_update("chain", "d", update).unwrap();
        match state {
            CompileState::Error(reason) => assert!(reason.contains("too large")),
            other => panic!("expected compile error, got {other:?}"),
        }
        assert_eq!(alarms.events(), vec![AlarmEvent::raised("chain")]);
        assert!(registry.route("d", "a").is_none());
    }

    #[test]
    fn deleting_errored_parser_clears_alarm() {
        let (registry, alarms) = registry_with_alarms();
        registry
            .add_or_update("p", "d", ParserUpdate::with_pattern("%{NOPE}"))
            .unwrap();
        assert!(registry.delete("p", "d"));
        assert_eq!(
            alarms.events(),
            vec![AlarmEvent::raised("p"), AlarmEvent::cleared("p")]
        );
        assert!(registry.parser("p").is_none());
        assert!(registry.domain_members("d").is_empty());
    }

    #[test]
    fn deleting_unknown_parser_returns_false() {
        let registry = ParserRegistry::new(None).unwrap();
        assert!(!registry.delete("ghost", "d"));
    }

    #[test]
    fn builtin_parser_is_protected() {
        let registry = ParserRegistry::new(None).unwrap();
        assert!(registry
            .add_or_update(RFC5424_PARSER, DEFAULT_DOMAIN, ParserUpdate::with_pattern("x"))
            .is_err());
        assert!(!registry.delete(RFC5424_PARSER, DEFAULT_DOMAIN));
        assert!(registry.parser(RFC5424_PARSER).is_some());
    }

    #[test]
    fn empty_name_or_domain_is_rejected() {
        let registry = ParserRegistry::new(None).unwrap();
        assert!(registry.add_or_update("", "d", ParserUpdate::default()).is_err());
        assert!(registry.add_or_update("p", "", ParserUpdate::default()).is_err());
    }

    #[test]
    fn parser_without_pattern_is_pending() {
        let registry = ParserRegistry::new(None).unwrap();
        let state = registry
            .add_or_update("p", "d", ParserUpdate::default().tags(["host"]))
            .unwrap();
        assert_eq!(state, CompileState::Pending);
        assert!(registry.route("d", "").is_none());
    }

    #[test]
    fn sub_patterns_are_local_to_parser() {
        let registry = ParserRegistry::new(None).unwrap();
        registry
            .add_or_update(
                "a",
                "d1",
                ParserUpdate::with_pattern("%{CODE:c}").sub_pattern("CODE", "[A-Z]{3}"),
            )
            .unwrap();
        let state = registry
            .add_or_update("b", "d2", ParserUpdate::with_pattern("%{CODE:c}"))
            .unwrap();
        assert!(state.is_error());
        assert_eq!(registry.route("d1", "ABC").unwrap().fields["c"], "ABC");
    }

    #[test]
    fn apply_document_round() {
        let registry = ParserRegistry::new(None).unwrap();
        let doc = serde_json::json!({"syslog_parser": {
            "fq_name": ["global", "app1-evt1", "latency_parser"],
            "pattern": {"pattern_string": "latency=%{INT:latency}"},
            "metrics": {"metric_list": [{"name": "latency", "data_type": "int"}]}
        }});
        registry.apply_document(&doc, true).unwrap();
        assert!(registry.route("app1-evt1", "latency=1").is_some());

        registry.apply_document(&doc, false).unwrap();
        assert!(registry.parser("latency_parser").is_none());
        assert!(registry.apply_document(&doc, false).is_err());
    }

    #[test]
    fn apply_rfc5424_document() {
        let registry = ParserRegistry::new(None).unwrap();
        let doc = serde_json::json!({"rfc5424": {
            "fq_name": ["global", "app1-evt1"],
            "rfc5424_config": {"appname_as_tag": true}
        }});
        registry.apply_document(&doc, true).unwrap();
        assert!(registry.rfc5424_config("app1-evt1").unwrap().appname_as_tag);

        registry.apply_document(&doc, false).unwrap();
        assert!(registry.rfc5424_config("app1-evt1").is_none());
        assert!(registry.apply_document(&doc, false).is_err());
    }

    #[test]
    fn malformed_document_leaves_state_intact() {
        let registry = ParserRegistry::new(None).unwrap();
        registry
            .add_or_update("p", "d", ParserUpdate::with_pattern("%{INT:n}"))
            .unwrap();
        let bad = serde_json::json!({"syslog_parser": {"fq_name": 5}});
        assert!(registry.apply_document(&bad, true).is_err());
        assert_eq!(registry.domain_members("d"), vec!["p"]);
    }

    #[test]
    fn introspect_splits_preconfigured_and_configured() {
        let registry = ParserRegistry::new(None).unwrap();
        registry
            .add_or_update("zeta", "b-domain", ParserUpdate::with_pattern("%{INT:n}"))
            .unwrap();
        registry
            .add_or_update("alpha", "a-domain", ParserUpdate::with_pattern("%{WORD:w}"))
            .unwrap();

        let view = registry.introspect();
        assert_eq!(view.preconfigured.len(), 1);
        assert_eq!(view.preconfigured[0].name, RFC5424_PARSER);
        let header = &view.preconfigured[0].tags;
        assert!(header.contains(rfc5424::field::HOSTNAME));
        assert!(header.contains(rfc5424::field::APPNAME));
        assert!(header.contains(rfc5424::field::MSGID));
        assert_eq!(header.len(), 9);
        let names: Vec<_> = view.configured.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert!(view.base_patterns.iter().any(|b| b.name == "GREEDYDATA"));

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["configured"][0]["state"]["state"], "compiled");
    }
}
