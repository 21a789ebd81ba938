//! 에러 타입 -- 도메인별 에러 정의

/// hooklog 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum HooklogError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 스토리지 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 이미 실행 중
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline not running")]
    NotRunning,
}

/// 스토리지 에러
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 스토어 열기 실패
    #[error("open failed: {0}")]
    Open(String),

    /// 쿼리 실패
    #[error("query failed: {0}")]
    Query(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_to_top_level() {
        let err: HooklogError = ConfigError::InvalidValue {
            field: "buffer.capacity".to_owned(),
            reason: "must be at least 1".to_owned(),
        }
        .into();
        assert!(matches!(err, HooklogError::Config(_)));
        assert!(err.to_string().contains("buffer.capacity"));
    }

    #[test]
    fn pipeline_state_errors_display() {
        assert_eq!(
            PipelineError::AlreadyRunning.to_string(),
            "pipeline already running"
        );
        assert_eq!(PipelineError::NotRunning.to_string(), "pipeline not running");
    }

    #[test]
    fn storage_error_display() {
        let err = HooklogError::from(StorageError::Query("disk I/O error".to_owned()));
        assert!(err.to_string().contains("disk I/O error"));
    }
}
