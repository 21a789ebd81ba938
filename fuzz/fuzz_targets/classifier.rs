#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use hooklog_core::types::Level;
use hooklog_pipeline::Classifier;

/// 퍼저용 구조적 입력 -- 휴리스틱 텍스트 + 선택적 JSON 오버라이드
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// JSON 객체로 보낼지 여부
    as_json: bool,
    text: String,
    level: Option<String>,
    tag: Option<String>,
    message: Option<String>,
    app_package: Option<String>,
    data_type: Option<String>,
    source_ip: String,
}

fuzz_target!(|input: FuzzInput| {
    let classifier = Classifier::new().expect("builtin pattern compiles");

    let raw = if input.as_json {
        let mut obj = serde_json::Map::new();
        obj.insert("text".to_owned(), input.text.clone().into());
        for (key, value) in [
            ("level", input.level),
            ("tag", input.tag),
            ("message", input.message),
            ("app_package", input.app_package),
            ("data_type", input.data_type),
        ] {
            if let Some(v) = value {
                obj.insert(key.to_owned(), v.into());
            }
        }
        serde_json::Value::Object(obj).to_string()
    } else {
        input.text
    };

    let record = classifier.classify(&raw, &input.source_ip);

    // 분류는 항상 레코드를 반환하고 송신 주소는 바뀌지 않음
    assert!(Level::ALL.contains(&record.level));
    assert_eq!(record.source_ip, input.source_ip);
});
