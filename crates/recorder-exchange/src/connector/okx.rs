//! OKX 시장 데이터 커넥터.
//!
//! OKX v5 REST API로 마켓 목록, 캔들, 체결을 조회합니다.
//! 모든 응답은 `{code, msg, data}` 봉투로 감싸져 있고
//! 캔들/체결 목록은 최신순이라 오름차순으로 뒤집어 반환합니다.

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

/// OKX 커넥터 설정.
///
/// # 보안
/// - `Debug` 구현은 민감 정보(`api_key`)를 마스킹합니다.
#[derive(Clone)]
pub struct OkxConfig {
    /// API 키 (공개 시장 데이터에는 불필요)
    pub api_key: String,
    /// HTTP 프록시 URL
    pub proxy: Option<String>,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// REST 기본 URL 재정의 (테스트용)
    pub base_url: Option<String>,
}

impl fmt::Debug for OkxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked_key = if self.api_key.is_empty() {
            "<none>".to_string()
        } else {
            "***REDACTED***".to_string()
        };

        f.debug_struct("OkxConfig")
            .field("api_key", &masked_key)
            .field("proxy", &self.proxy)
            .field("timeout_secs", &self.timeout_secs)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OkxConfig {
    /// 새 설정 생성.
    pub fn new() -> Self {
        Self {
            api_key: String::new(),
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
        self.base_url.as_deref().unwrap_or("https://www.okx.com")
    }
}

impl Default for OkxConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// API 응답 타입
// ============================================================================

/// OKX v5 공통 응답 봉투.
#[derive(Debug, Deserialize)]
struct OkxEnvelope<T> {
    code: String,
    msg: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OkxInstrument {
    inst_id: String,
    base_ccy: String,
    quote_ccy: String,
    state: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OkxTradeRecord {
    inst_id: String,
    trade_id: String,
    px: String,
    sz: String,
    side: String,
    ts: String,
}

// ============================================================================
// OKX 소스
// ============================================================================

/// OKX 시장 데이터 소스.
pub struct OkxSource {
    config: OkxConfig,
    client: Client,
}

impl OkxSource {
    /// 새 OKX 소스 생성.
    ///
    /// # Errors
    /// 프록시 URL이 잘못되면 `SourceError::InvalidConfig`,
    /// HTTP 클라이언트 생성에 실패하면 `SourceError::NetworkError`를 반환합니다.
    pub fn new(config: OkxConfig) -> SourceResult<Self> {
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

    /// 정규화된 거래쌍을 OKX instId 형식으로 변환.
    fn from_pair(pair: &str) -> String {
        // "BTC/USDT" -> "BTC-USDT"
        pair.replace('/', "-")
    }

    /// 레벨을 OKX bar 토큰으로 변환.
    ///
    /// OKX는 시간/일 단위 bar에 대문자를 사용합니다 ("1H", "1D").
    fn bar_token(level: Level) -> &'static str {
        match level {
            Level::Min1 => "1m",
            Level::Min5 => "5m",
            Level::Min15 => "15m",
            Level::Min30 => "30m",
            Level::Min60 => "1H",
            Level::Day => "1D",
        }
    }

    /// 공개 API 요청.
    async fn public_get<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> SourceResult<T> {
        let url = format!("{}{}", self.config.rest_base_url(), endpoint);
        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let full_url = if query.is_empty() {
            url
        } else {
            format!("{}?{}", url, query)
        };

        debug!("GET {}", full_url);

        let response = self
            .client
            .get(&full_url)
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

        if status.as_u16() == 429 {
            return Err(SourceError::RateLimited);
        }
        if !status.is_success() {
            return Err(SourceError::ApiError {
                code: status.as_u16() as i32,
                message: body,
            });
        }

        let envelope: OkxEnvelope<T> = serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse response: {} - Body: {}", e, body);
            SourceError::ParseError(e.to_string())
        })?;

        if envelope.code != "0" {
            return Err(self.map_error_code(&envelope.code, &envelope.msg));
        }

        envelope
            .data
            .ok_or_else(|| SourceError::ParseError("envelope has no data field".to_string()))
    }

    /// OKX 에러 코드를 SourceError로 매핑.
    fn map_error_code(&self, code: &str, msg: &str) -> SourceError {
        match code {
            "50011" => SourceError::RateLimited,
            "50111" | "50113" | "50114" => SourceError::Unauthorized(msg.to_string()),
            _ => SourceError::ApiError {
                code: code.parse().unwrap_or(-1),
                message: msg.to_string(),
            },
        }
    }

    /// 캔들 행을 RawCandle로 변환. 필드가 모자라거나 시각이 깨진 행은 None.
    fn parse_candle_row(row: &[String]) -> Option<RawCandle> {
        if row.len() < 6 {
            return None;
        }
        let timestamp_ms = row[0].parse::<i64>().ok()?;
        Some(RawCandle {
            timestamp_ms,
            open: row[1].clone(),
            high: row[2].clone(),
            low: row[3].clone(),
            close: row[4].clone(),
            volume: row[5].clone(),
        })
    }
}

#[async_trait]
impl MarketDataSource for OkxSource {
    fn name(&self) -> &str {
        "okx"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            candles: true,
            trades: true,
            // 캔들 조회가 시작 시각 대신 before/after 커서를 받음
            since_param: false,
        }
    }

    async fn fetch_markets(&self) -> SourceResult<Vec<MarketInfo>> {
        let data: Vec<serde_json::Value> = self
            .public_get(
                "/api/v5/public/instruments",
                &[("instType", "SPOT".to_string())],
            )
            .await?;

        let mut markets = Vec::with_capacity(data.len());
        for raw in data {
            let parsed: OkxInstrument = match serde_json::from_value(raw.clone()) {
                Ok(inst) => inst,
                Err(e) => {
                    debug!("skipping malformed instrument entry: {}", e);
                    continue;
                }
            };

            markets.push(MarketInfo {
                symbol: format!("{}/{}", parsed.base_ccy, parsed.quote_ccy),
                base: parsed.base_ccy,
                quote: parsed.quote_ccy,
                active: parsed.state == "live",
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
        let inst_id = Self::from_pair(pair);
        let data: Vec<Vec<String>> = self
            .public_get(
                "/api/v5/market/candles",
                &[
                    ("instId", inst_id),
                    ("bar", Self::bar_token(level).to_string()),
                    ("limit", window.limit.to_string()),
                ],
            )
            .await?;

        let mut skipped = 0usize;
        let mut candles: Vec<RawCandle> = data
            .iter()
            .filter_map(|row| {
                let candle = Self::parse_candle_row(row);
                if candle.is_none() {
                    skipped += 1;
                }
                candle
            })
            .collect();
        if skipped > 0 {
            debug!(count = skipped, "skipped malformed candle rows");
        }

        // OKX는 최신순으로 반환
        candles.reverse();
        Ok(candles)
    }

    async fn fetch_trades(&self, pair: &str, limit: u32) -> SourceResult<Vec<RawTrade>> {
        let inst_id = Self::from_pair(pair);
        let data: Vec<OkxTradeRecord> = self
            .public_get(
                "/api/v5/market/trades",
                &[("instId", inst_id), ("limit", limit.to_string())],
            )
            .await?;

        let mut skipped = 0usize;
        let mut trades: Vec<RawTrade> = data
            .into_iter()
            .filter_map(|t| {
                let timestamp_ms = match t.ts.parse::<i64>() {
                    Ok(ts) => ts,
                    Err(_) => {
                        skipped += 1;
                        return None;
                    }
                };
                Some(RawTrade {
                    id: t.trade_id,
                    order_id: None,
                    timestamp_ms,
                    price: t.px,
                    amount: t.sz,
                    side: Some(t.side),
                    order_type: None,
                })
            })
            .collect();
        if skipped > 0 {
            debug!(count = skipped, "skipped malformed trade rows");
        }

        // OKX는 최신순으로 반환
        trades.reverse();
        Ok(trades)
    }
}

// ============================================================================
// 테스트
// ============================================================================
