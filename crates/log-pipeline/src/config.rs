//! 로그 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`HooklogConfig`]에서 파이프라인이 사용하는
//! 섹션(receiver, buffer, storage, hub)만 평탄화하여 담습니다.
//!
//! # 사용 예시
//! ```ignore
//! use hooklog_core::config::HooklogConfig;
//! use hooklog_pipeline::config::PipelineConfig;
//!
//! let core_config = HooklogConfig::default();
//! let config = PipelineConfig::from_core(&core_config);
//! ```

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use hooklog_core::config::{
    HooklogConfig, MAX_BUFFER_CAPACITY, MAX_DATAGRAM_SIZE, MAX_QUEUE_CAPACITY,
};

use crate::error::LogPipelineError;

/// 로그 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 수신기 활성화 여부
    pub receiver_enabled: bool,
    /// UDP 바인드 주소
    pub bind: String,
    /// 데이터그램 최대 크기 (바이트)
    pub max_datagram_size: usize,
    /// 수신 통계 보고 주기 (초)
    pub stats_interval_secs: u64,
    /// 링 버퍼 용량
    pub buffer_capacity: usize,
    /// SQLite 파일 경로
    pub store_path: String,
    /// 스토어 보관 상한
    pub max_records: u64,
    /// 영속화 큐 용량
    pub queue_capacity: usize,
    /// 보관 상한 점검 주기 (삽입 건수)
    pub prune_every: u64,
    /// 구독자별 채널 용량
    pub subscriber_capacity: usize,
    /// `request_recent` 반환 건수
    pub recent_count: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_core(&HooklogConfig::default())
    }
}

impl PipelineConfig {
    /// core의 `HooklogConfig`에서 파이프라인 설정을 생성합니다.
    pub fn from_core(core: &HooklogConfig) -> Self {
        Self {
            receiver_enabled: core.receiver.enabled,
            bind: core.receiver.bind.clone(),
            max_datagram_size: core.receiver.max_datagram_size,
            stats_interval_secs: core.receiver.stats_interval_secs,
            buffer_capacity: core.buffer.capacity,
            store_path: core.storage.path.clone(),
            max_records: core.storage.max_records,
            queue_capacity: core.storage.queue_capacity,
            prune_every: core.storage.prune_every,
            subscriber_capacity: core.hub.subscriber_capacity,
            recent_count: core.hub.recent_count,
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        if self.receiver_enabled && self.bind.parse::<SocketAddr>().is_err() {
            return Err(config_err(
                "bind",
                format!("'{}' is not a valid socket address", self.bind),
            ));
        }

        if self.max_datagram_size == 0 || self.max_datagram_size > MAX_DATAGRAM_SIZE {
            return Err(config_err(
                "max_datagram_size",
                format!("must be 1-{MAX_DATAGRAM_SIZE}"),
            ));
        }

        if self.stats_interval_secs == 0 {
            return Err(config_err("stats_interval_secs", "must be greater than 0"));
        }

        if self.buffer_capacity == 0 || self.buffer_capacity > MAX_BUFFER_CAPACITY {
            return Err(config_err(
                "buffer_capacity",
                format!("must be 1-{MAX_BUFFER_CAPACITY}"),
            ));
        }

        if self.store_path.is_empty() {
            return Err(config_err("store_path", "must not be empty"));
        }

        if self.max_records == 0 {
            return Err(config_err("max_records", "must be greater than 0"));
        }

        if self.queue_capacity == 0 || self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(config_err(
                "queue_capacity",
                format!("must be 1-{MAX_QUEUE_CAPACITY}"),
            ));
        }

        if self.prune_every == 0 {
            return Err(config_err("prune_every", "must be greater than 0"));
        }

        if self.subscriber_capacity == 0 {
            return Err(config_err("subscriber_capacity", "must be greater than 0"));
        }

        if self.recent_count == 0 || self.recent_count > self.buffer_capacity {
            return Err(config_err(
                "recent_count",
                format!("must be 1-{}", self.buffer_capacity),
            ));
        }

        Ok(())
    }
}

fn config_err(field: &str, reason: impl Into<String>) -> LogPipelineError {
    LogPipelineError::Config {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 수신기 활성화 여부를 설정합니다.
    pub fn receiver_enabled(mut self, enabled: bool) -> Self {
        self.config.receiver_enabled = enabled;
        self
    }

    /// UDP 바인드 주소를 설정합니다.
    pub fn bind(mut self, bind: impl Into<String>) -> Self {
        self.config.bind = bind.into();
        self
    }

    /// 수신 통계 보고 주기(초)를 설정합니다.
    pub fn stats_interval_secs(mut self, secs: u64) -> Self {
        self.config.stats_interval_secs = secs;
        self
    }

    /// 링 버퍼 용량을 설정합니다.
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity;
        self
    }

    /// SQLite 파일 경로를 설정합니다.
    pub fn store_path(mut self, path: impl Into<String>) -> Self {
        self.config.store_path = path.into();
        self
    }

    /// 스토어 보관 상한을 설정합니다.
    pub fn max_records(mut self, max: u64) -> Self {
        self.config.max_records = max;
        self
    }

    /// 영속화 큐 용량을 설정합니다.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// 보관 상한 점검 주기를 설정합니다.
    pub fn prune_every(mut self, every: u64) -> Self {
        self.config.prune_every = every;
        self
    }

    /// 구독자별 채널 용량을 설정합니다.
    pub fn subscriber_capacity(mut self, capacity: usize) -> Self {
        self.config.subscriber_capacity = capacity;
        self
    }

    /// `request_recent` 반환 건수를 설정합니다.
    pub fn recent_count(mut self, count: usize) -> Self {
        self.config.recent_count = count;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, LogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn from_core_preserves_values() {
        let mut core = HooklogConfig::default();
        core.receiver.bind = "127.0.0.1:5140".to_owned();
        core.buffer.capacity = 200;
        core.storage.path = "/tmp/x.db".to_owned();
        core.hub.recent_count = 5;

        let config = PipelineConfig::from_core(&core);
        assert_eq!(config.bind, "127.0.0.1:5140");
        assert_eq!(config.buffer_capacity, 200);
        assert_eq!(config.store_path, "/tmp/x.db");
        assert_eq!(config.recent_count, 5);
        assert_eq!(config.max_records, 10_000);
    }

    #[test]
    fn validate_rejects_zero_buffer_capacity() {
        let config = PipelineConfig {
            buffer_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_bind_only_when_enabled() {
        let mut config = PipelineConfig {
            bind: "nope".to_owned(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
        config.receiver_enabled = false;
        config.validate().unwrap();
    }

    #[test]
    fn core_and_pipeline_validation_agree_on_capacity_limits() {
        for capacity in [MAX_BUFFER_CAPACITY, MAX_BUFFER_CAPACITY + 1] {
            let mut core = HooklogConfig::default();
            core.buffer.capacity = capacity;
            let pipeline = PipelineConfig::from_core(&core);
            assert_eq!(core.validate().is_ok(), pipeline.validate().is_ok());
        }

        for capacity in [MAX_QUEUE_CAPACITY, MAX_QUEUE_CAPACITY + 1] {
            let mut core = HooklogConfig::default();
            core.storage.queue_capacity = capacity;
            let pipeline = PipelineConfig::from_core(&core);
            assert_eq!(core.validate().is_ok(), pipeline.validate().is_ok());
        }
    }

    #[test]
    fn builder_creates_valid_config() {
        let config = PipelineConfigBuilder::new()
            .bind("127.0.0.1:0")
            .buffer_capacity(50)
            .recent_count(5)
            .store_path("/tmp/hooklog.db")
            .build()
            .unwrap();
        assert_eq!(config.buffer_capacity, 50);
        assert_eq!(config.recent_count, 5);
        assert_eq!(config.store_path, "/tmp/hooklog.db");
    }

    #[test]
    fn builder_rejects_recent_count_above_capacity() {
        let result = PipelineConfigBuilder::new()
            .buffer_capacity(3)
            .recent_count(10)
            .build();
        assert!(result.is_err());
    }
}
