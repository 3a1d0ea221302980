//! 에러 타입 정의.

use std::fmt;

use recorder_exchange::SourceError;
use recorder_store::StoreError;

/// Collector 에러 타입
#[derive(Debug)]
pub enum CollectorError {
    /// 시장 데이터 소스 에러
    Source(SourceError),
    /// 로컬 저장소 에러
    Store(StoreError),
    /// 설정 에러
    Config(String),
    /// 일반 에러
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(e) => write!(f, "Source error: {}", e),
            Self::Store(e) => write!(f, "Store error: {}", e),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Other(e) => write!(f, "Error: {}", e),
        }
    }
}

impl std::error::Error for CollectorError {}

impl From<SourceError> for CollectorError {
    fn from(err: SourceError) -> Self {
        Self::Source(err)
    }
}

impl From<StoreError> for CollectorError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CollectorError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::Other(err)
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
