//! 시장 데이터 소스 trait 정의.

use async_trait::async_trait;
use recorder_core::Level;

use crate::SourceError;

/// 소스 작업을 위한 Result 타입.
pub type SourceResult<T> = Result<T, SourceError>;

/// 소스가 제공하는 기능 프로필.
///
/// 수집 드라이버는 루프를 시작하기 전에 요청된 작업이
/// 소스에서 지원되는지 이 프로필로 확인합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// 캔들스틱(kdata) 조회 지원 여부
    pub candles: bool,
    /// 개별 체결(tick) 조회 지원 여부
    pub trades: bool,
    /// 캔들 조회 시 시작 시각 파라미터 지원 여부
    pub since_param: bool,
}

/// 캔들 조회 요청 범위.
#[derive(Debug, Clone, Copy)]
pub struct FetchWindow {
    /// 최대 반환 개수
    pub limit: u32,
    /// 시작 시각(epoch 밀리초). 소스가 지원할 때만 전달됩니다.
    pub since_ms: Option<i64>,
}

impl FetchWindow {
    /// 개수 제한만 있는 범위 생성.
    pub fn with_limit(limit: u32) -> Self {
        Self {
            limit,
            since_ms: None,
        }
    }

    /// 시작 시각이 있는 범위 생성.
    pub fn since(limit: u32, since_ms: i64) -> Self {
        Self {
            limit,
            since_ms: Some(since_ms),
        }
    }
}

/// 소스가 제공하는 마켓(거래쌍) 정보.
#[derive(Debug, Clone)]
pub struct MarketInfo {
    /// 정규화된 거래쌍 이름 (예: "BTC/USDT")
    pub symbol: String,
    /// 기초 자산 (예: "BTC")
    pub base: String,
    /// 호가 자산 (예: "USDT")
    pub quote: String,
    /// 현재 거래 가능 여부
    pub active: bool,
    /// 소스가 반환한 원본 마켓 정보
    pub info: serde_json::Value,
}

/// 소스에서 받은 원시 캔들.
///
/// 가격/거래량은 소스가 준 문자열 그대로 유지하고
/// 숫자 변환은 병합 단계에서 수행합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCandle {
    /// 캔들 시작 시각 (epoch 밀리초)
    pub timestamp_ms: i64,
    /// 시가
    pub open: String,
    /// 고가
    pub high: String,
    /// 저가
    pub low: String,
    /// 종가
    pub close: String,
    /// 거래량
    pub volume: String,
}

/// 소스에서 받은 원시 체결.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTrade {
    /// 체결 ID. 소스가 제공하지 않으면 빈 문자열.
    pub id: String,
    /// 주문 ID (제공되는 소스만)
    pub order_id: Option<String>,
    /// 체결 시각 (epoch 밀리초)
    pub timestamp_ms: i64,
    /// 체결 가격
    pub price: String,
    /// 체결 수량
    pub amount: String,
    /// 체결 방향 ("buy" / "sell", 제공되는 소스만)
    pub side: Option<String>,
    /// 주문 유형 (제공되는 소스만)
    pub order_type: Option<String>,
}

/// 통합 시장 데이터 조회 인터페이스.
///
/// 모든 조회 결과는 타임스탬프 오름차순으로 정렬되어 반환됩니다.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// 소스 이름 반환 (예: "binance").
    fn name(&self) -> &str;

    /// 소스 기능 프로필 반환.
    fn capabilities(&self) -> Capabilities;

    /// 거래 가능한 마켓 목록 조회.
    async fn fetch_markets(&self) -> SourceResult<Vec<MarketInfo>>;

    /// 거래쌍의 캔들스틱 조회.
    ///
    /// `pair`는 정규화된 형식("BTC/USDT")이며 커넥터가
    /// 소스별 심볼 형식으로 변환합니다.
    async fn fetch_candles(
        &self,
        pair: &str,
        level: Level,
        window: FetchWindow,
    ) -> SourceResult<Vec<RawCandle>>;

    /// 거래쌍의 최근 체결 조회.
    async fn fetch_trades(&self, pair: &str, limit: u32) -> SourceResult<Vec<RawTrade>>;
}
