#![no_main]

use libfuzzer_sys::fuzz_target;
use hooklog_core::types::Level;
use hooklog_pipeline::collector::{decode, split_lines};
use hooklog_pipeline::Classifier;

fuzz_target!(|data: &[u8]| {
    let classifier = Classifier::new().expect("builtin pattern compiles");

    // 디코딩 실패는 허용, 성공하면 모든 라인이 레코드가 되어야 함
    let Ok(text) = decode(data) else {
        return;
    };
    for line in split_lines(&text) {
        let record = classifier.classify(line, "127.0.0.1");
        assert!(Level::ALL.contains(&record.level));
        assert!(!record.message.is_empty());
        assert_eq!(record.source_ip, "127.0.0.1");
    }
});
