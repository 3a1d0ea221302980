//! 시장 데이터 소스 에러 타입.

use thiserror::Error;

/// 시장 데이터 소스 관련 에러.
#[derive(Debug, Error)]
pub enum SourceError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 소스 연결 끊김
    #[error("Disconnected: {0}")]
    Disconnected(String),

    /// 인증/권한 에러
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 요청 한도 초과
    #[error("Rate limit exceeded")]
    RateLimited,

    /// API 에러 코드
    #[error("API error {code}: {message}")]
    ApiError { code: i32, message: String },

    /// 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 지원되지 않는 작업
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// 잘못된 소스 설정
    #[error("Invalid source config: {0}")]
    InvalidConfig(String),

    /// 알 수 없는 에러
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl SourceError {
    /// 재시도 가능한 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SourceError::NetworkError(_)
                | SourceError::Disconnected(_)
                | SourceError::RateLimited
                | SourceError::Timeout(_)
        )
    }

    /// 권장 재시도 대기 시간(밀리초) 반환.
    pub fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            SourceError::RateLimited => Some(60000), // 1분
            SourceError::NetworkError(_) => Some(1000),
            SourceError::Disconnected(_) => Some(5000),
            SourceError::Timeout(_) => Some(500),
            _ => None,
        }
    }

    /// 재시도하면 안 되는 치명적 에러인지 확인.
    ///
    /// 치명적 에러는 해당 증권의 수집 루프를 종료시킵니다.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SourceError::Unauthorized(_)
                | SourceError::NotSupported(_)
                | SourceError::InvalidConfig(_)
        )
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout(err.to_string())
        } else if err.is_connect() {
            SourceError::NetworkError(err.to_string())
        } else {
            SourceError::Unknown(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::ParseError(err.to_string())
    }
}
