//! 거래소 시장 데이터 소스.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - MarketDataSource trait: 통합 시장 데이터 조회 인터페이스
//! - Binance 커넥터 (REST, 캔들/체결/마켓 목록)
//! - OKX 커넥터 (REST, 캔들/체결/마켓 목록)
//! - 소스 레지스트리: 이름으로 커넥터 생성
//! - 에러 분류 및 재시도 힌트

pub mod connector;
pub mod error;
pub mod traits;

pub use connector::{build_source, BinanceConfig, BinanceSource, OkxConfig, OkxSource};
pub use error::*;
pub use traits::*;
