#![no_main]

use libfuzzer_sys::fuzz_target;
use hooklog_pipeline::{Classifier, LogOverrides};

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    let Some(overrides) = LogOverrides::parse(raw) else {
        return;
    };

    // 병합 후에도 수신 맥락 필드는 그대로여야 함
    let classifier = Classifier::new().expect("builtin pattern compiles");
    let mut record = classifier.classify("fuzz base", "10.0.0.1");
    overrides.apply(&mut record);
    assert_eq!(record.source_ip, "10.0.0.1");
    assert_eq!(record.raw_data, "fuzz base");
    assert!(!record.message.trim().is_empty());
});
