//! 설정 관리 -- hooklog.toml 파싱 및 런타임 설정
//!
//! [`HooklogConfig`]는 모든 컴포넌트의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`HOOKLOG_RECEIVER_BIND=0.0.0.0:9999` 형식)
//! 3. 설정 파일 (`hooklog.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), hooklog_core::error::HooklogError> {
//! use hooklog_core::config::HooklogConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = HooklogConfig::load("hooklog.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = HooklogConfig::parse("[buffer]\ncapacity = 500")?;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, HooklogError};

/// UDP 데이터그램 최대 크기 (64 KiB)
pub const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

/// 링 버퍼 최대 용량
pub const MAX_BUFFER_CAPACITY: usize = 1_000_000;

/// 영속화 큐 최대 용량
pub const MAX_QUEUE_CAPACITY: usize = 1_000_000;

/// hooklog 통합 설정
///
/// `hooklog.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 컴포넌트는 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HooklogConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 데이터그램 수신기 설정
    #[serde(default)]
    pub receiver: ReceiverConfig,
    /// 링 버퍼 설정
    #[serde(default)]
    pub buffer: BufferConfig,
    /// 영구 저장소 설정
    #[serde(default)]
    pub storage: StorageConfig,
    /// 브로드캐스트 허브 설정
    #[serde(default)]
    pub hub: HubConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl HooklogConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, HooklogError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, HooklogError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                HooklogError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                HooklogError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, HooklogError> {
        toml::from_str(toml_str).map_err(|e| {
            HooklogError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `HOOKLOG_{SECTION}_{FIELD}`
    /// 예: `HOOKLOG_STORAGE_PATH=/data/logs.db`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "HOOKLOG_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "HOOKLOG_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.pid_file, "HOOKLOG_GENERAL_PID_FILE");

        // Receiver
        override_bool(&mut self.receiver.enabled, "HOOKLOG_RECEIVER_ENABLED");
        override_string(&mut self.receiver.bind, "HOOKLOG_RECEIVER_BIND");
        override_usize(
            &mut self.receiver.max_datagram_size,
            "HOOKLOG_RECEIVER_MAX_DATAGRAM_SIZE",
        );
        override_u64(
            &mut self.receiver.stats_interval_secs,
            "HOOKLOG_RECEIVER_STATS_INTERVAL_SECS",
        );

        // Buffer
        override_usize(&mut self.buffer.capacity, "HOOKLOG_BUFFER_CAPACITY");

        // Storage
        override_string(&mut self.storage.path, "HOOKLOG_STORAGE_PATH");
        override_u64(&mut self.storage.max_records, "HOOKLOG_STORAGE_MAX_RECORDS");
        override_usize(
            &mut self.storage.queue_capacity,
            "HOOKLOG_STORAGE_QUEUE_CAPACITY",
        );
        override_u64(&mut self.storage.prune_every, "HOOKLOG_STORAGE_PRUNE_EVERY");

        // Hub
        override_usize(
            &mut self.hub.subscriber_capacity,
            "HOOKLOG_HUB_SUBSCRIBER_CAPACITY",
        );
        override_usize(&mut self.hub.recent_count, "HOOKLOG_HUB_RECENT_COUNT");

        // Metrics
        override_bool(&mut self.metrics.enabled, "HOOKLOG_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "HOOKLOG_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "HOOKLOG_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), HooklogError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.receiver.enabled && self.receiver.bind.parse::<SocketAddr>().is_err() {
            return Err(invalid(
                "receiver.bind",
                format!("'{}' is not a valid socket address", self.receiver.bind),
            ));
        }

        if self.receiver.max_datagram_size == 0
            || self.receiver.max_datagram_size > MAX_DATAGRAM_SIZE
        {
            return Err(invalid(
                "receiver.max_datagram_size",
                format!("must be 1-{MAX_DATAGRAM_SIZE}"),
            ));
        }

        if self.receiver.stats_interval_secs == 0 {
            return Err(invalid("receiver.stats_interval_secs", "must be greater than 0"));
        }

        if self.buffer.capacity == 0 || self.buffer.capacity > MAX_BUFFER_CAPACITY {
            return Err(invalid(
                "buffer.capacity",
                format!("must be 1-{MAX_BUFFER_CAPACITY}"),
            ));
        }

        if self.storage.path.is_empty() {
            return Err(invalid("storage.path", "must not be empty"));
        }

        if self.storage.max_records == 0 {
            return Err(invalid("storage.max_records", "must be greater than 0"));
        }

        if self.storage.queue_capacity == 0 || self.storage.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(invalid(
                "storage.queue_capacity",
                format!("must be 1-{MAX_QUEUE_CAPACITY}"),
            ));
        }

        if self.storage.prune_every == 0 {
            return Err(invalid("storage.prune_every", "must be greater than 0"));
        }

        if self.hub.subscriber_capacity == 0 {
            return Err(invalid("hub.subscriber_capacity", "must be greater than 0"));
        }

        if self.hub.recent_count == 0 || self.hub.recent_count > self.buffer.capacity {
            return Err(invalid(
                "hub.recent_count",
                format!("must be 1-{} (buffer.capacity)", self.buffer.capacity),
            ));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid("metrics.port", "must be greater than 0"));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> HooklogError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// PID 파일 경로 (빈 문자열이면 사용하지 않음)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            pid_file: String::new(),
        }
    }
}

/// 데이터그램 수신기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub bind: String,
    /// 데이터그램 최대 크기 (바이트)
    pub max_datagram_size: usize,
    /// 수신 통계 보고 주기 (초)
    pub stats_interval_secs: u64,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "0.0.0.0:9999".to_owned(),
            max_datagram_size: MAX_DATAGRAM_SIZE,
            stats_interval_secs: 30,
        }
    }
}

/// 링 버퍼 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// 최대 보관 레코드 수
    pub capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self { capacity: 1000 }
    }
}

/// 영구 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite 데이터베이스 파일 경로
    pub path: String,
    /// 보관 상한 (이를 넘으면 오래된 레코드부터 삭제)
    pub max_records: u64,
    /// 영속화 큐 용량
    pub queue_capacity: usize,
    /// 보관 상한 점검 주기 (삽입 건수)
    pub prune_every: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "logs.db".to_owned(),
            max_records: 10_000,
            queue_capacity: 4096,
            prune_every: 100,
        }
    }
}

/// 브로드캐스트 허브 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// 구독자별 채널 용량
    pub subscriber_capacity: usize,
    /// `request_recent`가 반환하는 레코드 수
    pub recent_count: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            subscriber_capacity: 256,
            recent_count: 10,
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 리슨 주소
    pub listen_addr: String,
    /// 리슨 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}
