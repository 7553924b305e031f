#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sysgrok_syslog_pipeline::PatternEngine;

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 최상위 패턴 본문
    pattern: String,
    /// 로컬 조각 (최대 4개만 사용)
    fragments: Vec<(String, String)>,
    /// 매칭 대상 문자열
    text: String,
}

fuzz_target!(|input: FuzzInput| {
    let mut engine = PatternEngine::new();
    engine.define("FUZZ");
    for (name, body) in input.fragments.iter().take(4) {
        let _ = engine.add_fragment("FUZZ", &format!("{name} {body}"));
    }
    if engine.add_fragment("FUZZ", &format!("FUZZ {}", input.pattern)).is_err() {
        return;
    }
    if engine.compile("FUZZ").is_ok() {
        let _ = engine.matches("FUZZ", &input.text);
    }
});
