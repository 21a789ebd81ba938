//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 로그 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<LogPipelineError> for HooklogError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use hooklog_core::error::{HooklogError, PipelineError, StorageError};

/// 로그 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 소켓 바인드 실패
    #[error("bind error: {addr}: {reason}")]
    Bind {
        /// 바인드 주소
        addr: String,
        /// 실패 사유
        reason: String,
    },

    /// 데이터그램 디코딩 실패
    #[error("decode error: {0}")]
    Decode(String),

    /// 스토어 에러 (스키마, 경로 등)
    #[error("storage error: {0}")]
    Storage(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite 에러
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// 정규식 컴파일 실패
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<LogPipelineError> for HooklogError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::Storage(reason) => HooklogError::Storage(StorageError::Open(reason)),
            LogPipelineError::Sqlite(e) => HooklogError::Storage(StorageError::Query(e.to_string())),
            LogPipelineError::Io(e) => HooklogError::Io(e),
            other => HooklogError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_error_display() {
        let err = LogPipelineError::Bind {
            addr: "0.0.0.0:9999".to_owned(),
            reason: "address in use".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("0.0.0.0:9999"));
        assert!(msg.contains("address in use"));
    }

    #[test]
    fn converts_to_hooklog_error() {
        let err = LogPipelineError::Decode("3 bytes with no decodable text".to_owned());
        let top: HooklogError = err.into();
        assert!(matches!(top, HooklogError::Pipeline(_)));
    }

    #[test]
    fn storage_errors_map_to_storage_variant() {
        let top: HooklogError = LogPipelineError::Storage("cannot open".to_owned()).into();
        assert!(matches!(top, HooklogError::Storage(StorageError::Open(_))));

        let top: HooklogError =
            LogPipelineError::Sqlite(rusqlite::Error::InvalidQuery).into();
        assert!(matches!(top, HooklogError::Storage(StorageError::Query(_))));
    }

    #[test]
    fn regex_error_converts() {
        let err: LogPipelineError = regex::Regex::new("(").unwrap_err().into();
        assert!(err.to_string().starts_with("regex error"));
    }

    #[test]
    fn config_error_display() {
        let err = LogPipelineError::Config {
            field: "buffer_capacity".to_owned(),
            reason: "must be at least 1".to_owned(),
        };
        assert!(err.to_string().contains("buffer_capacity"));
    }
}
