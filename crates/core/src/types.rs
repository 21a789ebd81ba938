//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 타입
//!
//! 수신기, 분류기, 버퍼, 스토어, 허브가 모두 공유하는 데이터 구조를 정의합니다.
//! 중심 엔티티는 [`LogRecord`]이며, 분류기가 한 번에 생성한 뒤에는 어떤
//! 컴포넌트도 필드를 수정하지 않습니다.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 로그 레벨
///
/// 허용되는 값은 네 가지뿐입니다. 정렬 순서는 `Debug < Info < Warn < Error`입니다.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    /// 디버그
    Debug,
    /// 일반 정보 (기본값)
    #[default]
    Info,
    /// 경고
    Warn,
    /// 에러
    Error,
}

impl Level {
    /// 모든 레벨 (오름차순)
    pub const ALL: [Level; 4] = [Level::Debug, Level::Info, Level::Warn, Level::Error];

    /// 저장/전송에 사용하는 대문자 이름을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }

    /// 문자열에서 레벨을 파싱합니다.
    ///
    /// 대소문자를 구분하지 않으며 흔한 별칭(`warning`, `err`, `trace` 등)을 허용합니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "debug" | "trace" | "verbose" | "d" | "v" => Some(Self::Debug),
            "info" | "information" | "i" => Some(Self::Info),
            "warn" | "warning" | "w" => Some(Self::Warn),
            "error" | "err" | "fatal" | "e" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_loose(s).ok_or_else(|| format!("unknown log level: {s}"))
    }
}

/// 분류 플래그
///
/// 분류기가 알려진 앱 서명이나 민감 데이터를 감지했을 때만 설정됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// 위챗 관련 로그
    Wechat,
    /// 민감 데이터 포함 로그
    Sensitive,
}

impl DataType {
    /// 소문자 이름을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wechat => "wechat",
            Self::Sensitive => "sensitive",
        }
    }

    /// 문자열에서 분류 플래그를 파싱합니다 (대소문자 무시).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "wechat" => Some(Self::Wechat),
            "sensitive" => Some(Self::Sensitive),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 분류된 로그 레코드
///
/// 분류기가 수집 시점에 생성합니다. `timestamp`는 송신자가 보낸 값이 아니라
/// 수신 측 시각입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// 생성 시각 (수집 시점)
    pub timestamp: DateTime<Utc>,
    /// 로그 레벨
    pub level: Level,
    /// 짧은 분류 라벨 (예: "WeChat", "Hook", "Sensitive")
    pub tag: String,
    /// 디코딩 및 trim된 메시지
    pub message: String,
    /// 전송 계층 출발지 주소
    pub source_ip: String,
    /// 추론된 애플리케이션 패키지명
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_package: Option<String>,
    /// 송신자가 선언한 훅 지점 (JSON 페이로드에서만 설정)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook_point: Option<String>,
    /// 분류 플래그
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,
    /// 원본 페이로드 (감사/디버깅용)
    pub raw_data: String,
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}: {}",
            self.level, self.source_ip, self.tag, self.message,
        )
    }
}

/// 스토어에 저장된 레코드
///
/// `id`는 삽입 순서대로 단조 증가합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredLog {
    /// 스토어가 부여한 ID
    pub id: i64,
    /// 레코드 본문
    #[serde(flatten)]
    pub record: LogRecord,
}

/// 집계 통계 스냅샷
///
/// 저장하지 않고 요청 시마다 스토어에서 다시 계산합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStats {
    /// 전체 레코드 수
    pub total: u64,
    /// 레벨별 레코드 수
    pub per_level: BTreeMap<Level, u64>,
    /// 앱별 레코드 수 (건수 내림차순, 상위 N개)
    pub per_app: Vec<(String, u64)>,
    /// 오늘(로컬 달력 기준) 레코드 수
    pub today: u64,
}

impl LogStats {
    /// 특정 레벨의 레코드 수를 반환합니다.
    pub fn level_count(&self, level: Level) -> u64 {
        self.per_level.get(&level).copied().unwrap_or(0)
    }
}
