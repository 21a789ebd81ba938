//! JSON 구조화 오버라이드
//!
//! 송신자가 JSON 객체를 보내면 [`LogOverrides`]로 역직렬화하여 휴리스틱 결과 위에
//! 필드 단위로 병합합니다. 타입이 맞지 않거나 알 수 없는 값은 해당 필드만 무시하며,
//! 수신 맥락에서 온 필드(`source_ip`, `raw_data`, `timestamp`)는 덮어쓰지 않습니다.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use hooklog_core::types::{DataType, Level, LogRecord};

/// 송신자가 지정할 수 있는 필드 집합
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct LogOverrides {
    /// 로그 레벨 (별칭 허용, 알 수 없는 값은 무시)
    #[serde(default, deserialize_with = "lenient_level")]
    pub level: Option<Level>,
    /// 태그 (빈 문자열은 무시)
    #[serde(default, deserialize_with = "lenient_non_empty")]
    pub tag: Option<String>,
    /// 메시지 (빈 문자열은 무시)
    #[serde(default, deserialize_with = "lenient_non_empty")]
    pub message: Option<String>,
    /// 앱 패키지명
    #[serde(default, deserialize_with = "lenient_string")]
    pub app_package: Option<String>,
    /// 훅 지점
    #[serde(default, deserialize_with = "lenient_string")]
    pub hook_point: Option<String>,
    /// 분류 플래그 (알 수 없는 값은 무시)
    #[serde(default, deserialize_with = "lenient_data_type")]
    pub data_type: Option<DataType>,
}

impl LogOverrides {
    /// 원본 라인이 JSON 객체 형태일 때만 파싱을 시도합니다.
    ///
    /// `{`로 시작하고 `}`로 끝나지 않거나, 객체로 파싱되지 않으면 `None`입니다.
    /// 같은 키가 여러 번 나오면 마지막 값을 사용합니다.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
            return None;
        }
        let object: Map<String, Value> = serde_json::from_str(trimmed).ok()?;
        serde_json::from_value(Value::Object(object)).ok()
    }

    /// 지정된 필드가 하나도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// 레코드에 오버라이드를 병합합니다.
    ///
    /// | 필드          | 규칙                   |
    /// |---------------|------------------------|
    /// | `level`       | 유효한 레벨이면 교체    |
    /// | `tag`         | 비어있지 않으면 교체    |
    /// | `message`     | 비어있지 않으면 교체    |
    /// | `app_package` | 있으면 교체             |
    /// | `hook_point`  | 있으면 교체             |
    /// | `data_type`   | 유효한 값이면 교체      |
    /// | 나머지        | 수신 맥락 유지          |
    pub fn apply(self, record: &mut LogRecord) {
        if let Some(level) = self.level {
            record.level = level;
        }
        if let Some(tag) = self.tag {
            record.tag = tag;
        }
        if let Some(message) = self.message {
            record.message = message;
        }
        if let Some(app) = self.app_package {
            record.app_package = Some(app);
        }
        if let Some(hook_point) = self.hook_point {
            record.hook_point = Some(hook_point);
        }
        if let Some(data_type) = self.data_type {
            record.data_type = Some(data_type);
        }
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(value.as_str().map(str::to_owned))
}

fn lenient_non_empty<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(lenient_string(d)?.filter(|s| !s.trim().is_empty()))
}

fn lenient_level<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Level>, D::Error> {
    Ok(lenient_string(d)?.and_then(|s| Level::from_str_loose(&s)))
}

fn lenient_data_type<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DataType>, D::Error> {
    Ok(lenient_string(d)?.and_then(|s| DataType::from_str_loose(&s)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn base_record() -> LogRecord {
        LogRecord {
            timestamp: Utc::now(),
            level: Level::Info,
            tag: "Xposed".to_owned(),
            message: "m".to_owned(),
            source_ip: "10.0.0.1".to_owned(),
            app_package: None,
            hook_point: None,
            data_type: None,
            raw_data: "m".to_owned(),
        }
    }

    #[test]
    fn parse_requires_braces() {
        assert!(LogOverrides::parse(r#"[1,2]"#).is_none());
        assert!(LogOverrides::parse(r#"{"level":"ERROR""#).is_none());
        assert!(LogOverrides::parse("plain text").is_none());
    }

    #[test]
    fn parse_ignores_malformed_json() {
        assert!(LogOverrides::parse("{not json}").is_none());
    }

    #[test]
    fn parse_extracts_known_fields() {
        let o = LogOverrides::parse(
            r#"{"level":"error","tag":"Custom","message":"x","hook_point":"onCreate","extra":1}"#,
        )
        .unwrap();
        assert_eq!(o.level, Some(Level::Error));
        assert_eq!(o.tag.as_deref(), Some("Custom"));
        assert_eq!(o.message.as_deref(), Some("x"));
        assert_eq!(o.hook_point.as_deref(), Some("onCreate"));
    }

    #[test]
    fn repeated_key_uses_last_value() {
        let o = LogOverrides::parse(r#"{"tag":"a","level":"debug","tag":"b"}"#).unwrap();
        assert_eq!(o.tag.as_deref(), Some("b"));
        assert_eq!(o.level, Some(Level::Debug));
    }

    #[test]
    fn unknown_level_and_data_type_are_ignored() {
        let o = LogOverrides::parse(r#"{"level":"LOUD","data_type":"secret"}"#).unwrap();
        assert!(o.level.is_none());
        assert!(o.data_type.is_none());
        assert!(o.is_empty());
    }

    #[test]
    fn wrongly_typed_fields_are_ignored_individually() {
        let o = LogOverrides::parse(r#"{"level":3,"tag":["a"],"message":"kept"}"#).unwrap();
        assert!(o.level.is_none());
        assert!(o.tag.is_none());
        assert_eq!(o.message.as_deref(), Some("kept"));
    }

    #[test]
    fn apply_preserves_ingestion_context() {
        let mut record = base_record();
        let o = LogOverrides::parse(
            r#"{"source_ip":"6.6.6.6","raw_data":"forged","timestamp":"2001-01-01T00:00:00Z","tag":"T"}"#,
        )
        .unwrap();
        let ts = record.timestamp;
        o.apply(&mut record);
        assert_eq!(record.source_ip, "10.0.0.1");
        assert_eq!(record.raw_data, "m");
        assert_eq!(record.timestamp, ts);
        assert_eq!(record.tag, "T");
    }

    #[test]
    fn empty_tag_does_not_replace() {
        let mut record = base_record();
        LogOverrides::parse(r#"{"tag":"  "}"#).unwrap().apply(&mut record);
        assert_eq!(record.tag, "Xposed");
    }
}
