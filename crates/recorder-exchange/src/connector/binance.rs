//! Binance 시장 데이터 커넥터.
//!
//! Binance Spot REST API로 마켓 목록, 캔들, 체결을 조회합니다.

#![allow(dead_code)] // API 응답 필드 전체 매핑 (일부만 사용)

use std::fmt;

use async_trait::async_trait;
use recorder_core::{Level, SourceConfig};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error};

use crate::error::SourceError;
use crate::traits::{
    Capabilities, FetchWindow, MarketDataSource, MarketInfo, RawCandle, RawTrade, SourceResult,
};

// ============================================================================
// 설정
// ============================================================================

/// Binance 커넥터 설정.
///
/// # 보안
/// - `Debug` 구현은 민감 정보(`api_key`)를 마스킹합니다.
#[derive(Clone)]
pub struct BinanceConfig {
    /// API 키 (공개 시장 데이터에는 선택, 요청 한도 상향용)
    pub api_key: String,
    /// HTTP 프록시 URL
    pub proxy: Option<String>,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// REST 기본 URL 재정의 (테스트용)
    pub base_url: Option<String>,
}

impl fmt::Debug for BinanceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked_key = if self.api_key.len() > 8 {
            format!(
                "{}...{}",
                &self.api_key[..4],
                &self.api_key[self.api_key.len() - 4..]
            )
        } else if self.api_key.is_empty() {
            "<none>".to_string()
        } else {
            "***REDACTED***".to_string()
        };

        f.debug_struct("BinanceConfig")
            .field("api_key", &masked_key)
            .field("proxy", &self.proxy)
            .field("timeout_secs", &self.timeout_secs)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl BinanceConfig {
    /// 새 설정 생성.
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            proxy: None,
            timeout_secs: 30,
            base_url: None,
        }
    }

    /// 레코더 소스 설정에서 생성.
    pub fn from_source(config: &SourceConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            proxy: config.proxy.clone(),
            timeout_secs: config.timeout_secs,
            base_url: None,
        }
    }

    /// REST 기본 URL 재정의.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// REST API 기본 URL 반환.
    pub fn rest_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or("https://api.binance.com")
    }
}

// ============================================================================
// API 응답 타입
// ============================================================================

#[derive(Debug, Deserialize)]
struct BinanceKline(
    i64,    // 0: Open time
    String, // 1: Open
    String, // 2: High
    String, // 3: Low
    String, // 4: Close
    String, // 5: Volume
    i64,    // 6: Close time
    String, // 7: Quote asset volume
    i64,    // 8: Number of trades
    String, // 9: Taker buy base asset volume
    String, // 10: Taker buy quote asset volume
    String, // 11: Ignore
);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceTradeRecord {
    id: i64,
    price: String,
    qty: String,
    time: i64,
    is_buyer_maker: bool,
}

#[derive(Debug, Deserialize)]
struct BinanceExchangeInfo {
    symbols: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceSymbolInfo {
    symbol: String,
    base_asset: String,
    quote_asset: String,
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceError {
    code: i32,
    msg: String,
}

// ============================================================================
// Binance 소스
// ============================================================================

/// Binance 시장 데이터 소스.
pub struct BinanceSource {
    config: BinanceConfig,
    client: Client,
}

impl BinanceSource {
    /// 새 Binance 소스 생성.
    ///
    /// # Errors
    /// 프록시 URL이 잘못되면 `SourceError::InvalidConfig`,
    /// HTTP 클라이언트 생성에 실패하면 `SourceError::NetworkError`를 반환합니다.
    pub fn new(config: BinanceConfig) -> SourceResult<Self> {
        let mut builder =
            Client::builder().timeout(std::time::Duration::from_secs(config.timeout_secs));

        if let Some(proxy_url) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
                SourceError::InvalidConfig(format!("invalid proxy url '{}': {}", proxy_url, e))
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| SourceError::NetworkError(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self { config, client })
    }

    /// 정규화된 거래쌍을 Binance 심볼 형식으로 변환.
    fn from_pair(pair: &str) -> String {
        // "EOS/USDT" -> "EOSUSDT"
        pair.replace(['/', '-'], "")
    }

    /// 파라미터에서 쿼리 문자열 생성.
    fn build_query(params: &[(&str, String)]) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// 공개 API 요청 (서명 불필요).
    async fn public_get<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> SourceResult<T> {
        let url = format!("{}{}", self.config.rest_base_url(), endpoint);
        let query = Self::build_query(params);

        let full_url = if query.is_empty() {
            url
        } else {
            format!("{}?{}", url, query)
        };

        debug!("GET {}", full_url);

        let mut request = self.client.get(&full_url);
        if !self.config.api_key.is_empty() {
            request = request.header("X-MBX-APIKEY", &self.config.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::NetworkError(e.to_string()))?;

        self.handle_response(response).await
    }

    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> SourceResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::NetworkError(e.to_string()))?;

        if status.is_success() {
            serde_json::from_str(&body).map_err(|e| {
                error!("Failed to parse response: {} - Body: {}", e, body);
                SourceError::ParseError(e.to_string())
            })
        } else if status.as_u16() == 429 || status.as_u16() == 418 {
            // 418은 반복 위반 후 IP 차단 상태
            Err(SourceError::RateLimited)
        } else {
            // 에러 응답 파싱 시도
            if let Ok(error) = serde_json::from_str::<BinanceError>(&body) {
                Err(self.map_error_code(error.code, &error.msg))
            } else {
                Err(SourceError::ApiError {
                    code: status.as_u16() as i32,
                    message: body,
                })
            }
        }
    }

    /// Binance 에러 코드를 SourceError로 매핑.
    fn map_error_code(&self, code: i32, msg: &str) -> SourceError {
        match code {
            -1000 => SourceError::Unknown(msg.to_string()),
            -1001 => SourceError::Disconnected(msg.to_string()),
            -1002 | -1022 => SourceError::Unauthorized(msg.to_string()),
            -1003 => SourceError::RateLimited,
            _ => SourceError::ApiError {
                code,
                message: msg.to_string(),
            },
        }
    }
}

#[async_trait]
impl MarketDataSource for BinanceSource {
    fn name(&self) -> &str {
        "binance"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            candles: true,
            trades: true,
            since_param: true,
        }
    }

    async fn fetch_markets(&self) -> SourceResult<Vec<MarketInfo>> {
        let resp: BinanceExchangeInfo = self.public_get("/api/v3/exchangeInfo", &[]).await?;

        let mut markets = Vec::with_capacity(resp.symbols.len());
        for raw in resp.symbols {
            let parsed: BinanceSymbolInfo = match serde_json::from_value(raw.clone()) {
                Ok(info) => info,
                Err(e) => {
                    debug!("skipping malformed symbol entry: {}", e);
                    continue;
                }
            };

            markets.push(MarketInfo {
                symbol: format!("{}/{}", parsed.base_asset, parsed.quote_asset),
                base: parsed.base_asset,
                quote: parsed.quote_asset,
                active: parsed.status == "TRADING",
                info: raw,
            });
        }

        Ok(markets)
    }

    async fn fetch_candles(
        &self,
        pair: &str,
        level: Level,
        window: FetchWindow,
    ) -> SourceResult<Vec<RawCandle>> {
        let symbol = Self::from_pair(pair);
        let mut params = vec![
            ("symbol", symbol),
            ("interval", level.to_timeframe().to_string()),
            ("limit", window.limit.to_string()),
        ];
        if let Some(since_ms) = window.since_ms {
            params.push(("startTime", since_ms.to_string()));
        }

        let resp: Vec<BinanceKline> = self.public_get("/api/v3/klines", &params).await?;

        // Binance는 오름차순으로 반환
        Ok(resp
            .into_iter()
            .map(|k| RawCandle {
                timestamp_ms: k.0,
                open: k.1,
                high: k.2,
                low: k.3,
                close: k.4,
                volume: k.5,
            })
            .collect())
    }

    async fn fetch_trades(&self, pair: &str, limit: u32) -> SourceResult<Vec<RawTrade>> {
        let symbol = Self::from_pair(pair);
        let resp: Vec<BinanceTradeRecord> = self
            .public_get(
                "/api/v3/trades",
                &[("symbol", symbol), ("limit", limit.to_string())],
            )
            .await?;

        // is_buyer_maker=true면 테이커가 매도자
        Ok(resp
            .into_iter()
            .map(|t| {
                let side = if t.is_buyer_maker { "sell" } else { "buy" };
                RawTrade {
                    id: t.id.to_string(),
                    order_id: None,
                    timestamp_ms: t.time,
                    price: t.price,
                    amount: t.qty,
                    side: Some(side.to_string()),
                    order_type: None,
                }
            })
            .collect())
    }
}

// ============================================================================
// 테스트
// ============================================================================
