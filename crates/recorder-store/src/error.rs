//! 저장소 에러 타입.

use thiserror::Error;

/// 저장소 관련 에러.
#[derive(Debug, Error)]
pub enum StoreError {
    /// 파일 I/O 에러
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV 읽기/쓰기 에러
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// 직렬화/역직렬화 에러
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 검색 인덱스 에러
    #[error("Index error: {0}")]
    Index(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Index(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
