//! # hooklog-core
//!
//! hooklog 워크스페이스의 공통 기반 크레이트입니다.
//! 도메인 타입, 설정, 에러, 파이프라인 생명주기 trait, 메트릭 이름을 정의하며
//! 다른 모든 크레이트가 이 크레이트에 의존합니다.

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, HooklogError, PipelineError, StorageError};

// 설정
pub use config::HooklogConfig;

// 파이프라인 trait
pub use pipeline::{HealthStatus, Pipeline};

// 도메인 타입
pub use types::{DataType, Level, LogRecord, LogStats, StoredLog};
