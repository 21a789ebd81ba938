//! 휴리스틱 분류기 -- 원시 라인을 [`LogRecord`]로 변환합니다.
//!
//! 분류는 동기 함수이며 모든 입력에 대해 레코드를 반환합니다.
//! 단계별 우선순위는 고정되어 있습니다.
//!
//! 1. 레벨 추론 (ERROR > WARN > DEBUG > INFO)
//! 2. 앱 서명 (위챗) -- 레벨은 유지
//! 3. 민감 데이터 -- WARN 강제, 태그는 `Sensitive` 또는 `Phone`. 2단계의
//!    `app_package`/`data_type`은 유지
//! 4. 훅 활동 -- 3단계가 태그를 가져가지 않았을 때만 `Hook`
//! 5. JSON 오버라이드 -- 필드 단위 병합
//!
//! 내부 단계는 [`ClassifyError`]를 반환하며, [`Classifier::classify`]가
//! 이를 `ParseError` 레코드로 바꾸는 유일한 경계입니다.

pub mod keywords;
pub mod overrides;

pub use overrides::LogOverrides;

use chrono::Utc;
use regex::Regex;
use tracing::debug;

use hooklog_core::types::{DataType, Level, LogRecord};

use crate::error::LogPipelineError;

/// 한 라인의 최대 크기 (바이트)
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// 폴백 레코드 메시지에 포함할 원본 미리보기 길이 (문자)
const FALLBACK_PREVIEW_CHARS: usize = 50;

/// 분류 실패 사유
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifyError {
    /// trim 후 빈 입력
    #[error("empty line")]
    Empty,

    /// 최대 크기 초과
    #[error("line too large: {size} bytes (max {max})")]
    TooLarge {
        /// 입력 크기
        size: usize,
        /// 허용 최대 크기
        max: usize,
    },
}

/// 휴리스틱 분류기
///
/// 전화번호 정규식을 한 번만 컴파일해 보관합니다. 상태가 없으므로
/// `Arc`로 여러 태스크에서 공유할 수 있습니다.
#[derive(Debug, Clone)]
pub struct Classifier {
    phone: Regex,
}

impl Classifier {
    /// 새 분류기를 생성합니다.
    pub fn new() -> Result<Self, LogPipelineError> {
        Ok(Self {
            phone: Regex::new(keywords::PHONE_PATTERN)?,
        })
    }

    /// 원시 라인을 분류합니다. 실패하면 `ParseError` 레코드를 반환합니다.
    pub fn classify(&self, raw: &str, source_ip: &str) -> LogRecord {
        match self.try_classify(raw, source_ip) {
            Ok(record) => record,
            Err(e) => {
                debug!(error = %e, source_ip, "classification failed, using fallback record");
                fallback_record(raw, source_ip)
            }
        }
    }

    /// 원시 라인을 분류합니다.
    pub fn try_classify(&self, raw: &str, source_ip: &str) -> Result<LogRecord, ClassifyError> {
        if raw.len() > MAX_LINE_BYTES {
            return Err(ClassifyError::TooLarge {
                size: raw.len(),
                max: MAX_LINE_BYTES,
            });
        }

        let message = raw.trim();
        if message.is_empty() {
            return Err(ClassifyError::Empty);
        }

        let lowered = message.to_lowercase();
        let (level, tag) = infer_level(&lowered);

        let mut record = LogRecord {
            timestamp: Utc::now(),
            level,
            tag: tag.to_owned(),
            message: message.to_owned(),
            source_ip: source_ip.to_owned(),
            app_package: None,
            hook_point: None,
            data_type: None,
            raw_data: raw.to_owned(),
        };

        if keywords::contains_any(&lowered, keywords::WECHAT) {
            record.tag = "WeChat".to_owned();
            record.app_package = Some(keywords::WECHAT_PACKAGE.to_owned());
            record.data_type = Some(DataType::Wechat);
        }

        let phone = self.phone.is_match(message);
        let sensitive = phone || keywords::contains_any(&lowered, keywords::SENSITIVE);
        if sensitive {
            record.level = Level::Warn;
            record.tag = if phone { "Phone" } else { "Sensitive" }.to_owned();
            record.data_type.get_or_insert(DataType::Sensitive);
        } else if keywords::contains_any(&lowered, keywords::HOOK) {
            record.tag = "Hook".to_owned();
        }

        if let Some(overrides) = LogOverrides::parse(raw) {
            overrides.apply(&mut record);
        }

        Ok(record)
    }
}

fn infer_level(lowered: &str) -> (Level, &'static str) {
    if keywords::contains_any(lowered, keywords::ERROR) {
        (Level::Error, "Error")
    } else if keywords::contains_any(lowered, keywords::WARN) {
        (Level::Warn, "Warning")
    } else if keywords::contains_any(lowered, keywords::DEBUG) {
        (Level::Debug, "Debug")
    } else {
        (Level::Info, "Xposed")
    }
}

/// 분류 실패 시 사용하는 최소 레코드
fn fallback_record(raw: &str, source_ip: &str) -> LogRecord {
    let preview: String = raw.chars().take(FALLBACK_PREVIEW_CHARS).collect();
    LogRecord {
        timestamp: Utc::now(),
        level: Level::Error,
        tag: "ParseError".to_owned(),
        message: format!("log processing failed: {preview}..."),
        source_ip: source_ip.to_owned(),
        app_package: None,
        hook_point: None,
        data_type: None,
        raw_data: truncate_at_boundary(raw, MAX_LINE_BYTES).to_owned(),
    }
}

fn truncate_at_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
