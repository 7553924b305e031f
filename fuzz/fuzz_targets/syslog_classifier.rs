#![no_main]

use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, OnceLock};

use libfuzzer_sys::fuzz_target;
use sysgrok_core::error::SysgrokError;
use sysgrok_core::pipeline::StatsWriter;
use sysgrok_core::types::StatRecord;
use sysgrok_syslog_pipeline::{
    MetricType, ParserRegistry, ParserUpdate, RawMessage, StatsDispatcher, SyslogClassifier,
};

struct NullWriter;

impl StatsWriter for NullWriter {
    fn write(&self, _record: StatRecord) -> Result<(), SysgrokError> {
        Ok(())
    }
}

fn classifier() -> &'static SyslogClassifier {
    static CLASSIFIER: OnceLock<SyslogClassifier> = OnceLock::new();
    CLASSIFIER.get_or_init(|| {
        let registry = Arc::new(ParserRegistry::new(None).expect("registry"));
        registry
            .add_or_update(
                "latency_parser",
                "app1-evt1",
                // int 메트릭 캡처는 i64 범위 안으로 제한
                ParserUpdate::with_pattern("latency=%{LATENCY:latency} path=%{URIPATH:path}")
                    .sub_pattern("LATENCY", "[0-9]{1,9}")
                    .tags(["path"])
                    .metric("latency", MetricType::Int),
            )
            .expect("parser");
        SyslogClassifier::new(registry, StatsDispatcher::new(Arc::new(NullWriter)))
    })
}

fuzz_target!(|data: &[u8]| {
    let msg = RawMessage::new(
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        514,
        data.to_vec(),
        "syslog_udp",
    );
    classifier().classify(&msg);
});
