#![no_main]

use libfuzzer_sys::fuzz_target;
use sysgrok_syslog_pipeline::BsdSyslogParser;

fuzz_target!(|data: &[u8]| {
    let parser = BsdSyslogParser::new();
    if let Ok(record) = parser.parse(data, "127.0.0.1") {
        assert!(record.facility <= 23);
        assert!(record.severity <= 7);
    }
});
