//! 수집 대상 증권 식별 타입.
//!
//! 증권 id는 `{type}_{exchange}_{code}` 형태로 만들어지며, 저장 경로와
//! 검색 인덱스 문서 id의 기준이 됩니다.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 증권 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityType {
    /// 암호화폐
    Coin,
    /// 주식
    Stock,
}

impl SecurityType {
    /// 경로와 id에 사용하는 문자열을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityType::Coin => "coin",
            SecurityType::Stock => "stock",
        }
    }
}

impl fmt::Display for SecurityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SecurityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "coin" => Ok(SecurityType::Coin),
            "stock" => Ok(SecurityType::Stock),
            _ => Err(format!("Unknown security type: {}", s)),
        }
    }
}

/// 수집 대상 증권.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Security {
    /// 증권 id (`{type}_{exchange}_{code}`)
    pub id: String,
    /// 증권 유형
    #[serde(rename = "type")]
    pub security_type: SecurityType,
    /// 거래소 이름
    pub exchange: String,
    /// 저장용 코드 (페어 이름의 `/`를 `-`로 치환)
    pub code: String,
    /// 데이터 소스의 페어 이름 (예: "EOS/USDT")
    pub name: String,
    /// 상장일 (알 수 없으면 None)
    #[serde(default)]
    pub list_date: Option<NaiveDate>,
}

impl Security {
    /// 페어 이름으로부터 증권 항목을 생성합니다.
    pub fn new(security_type: SecurityType, exchange: impl Into<String>, pair_name: &str) -> Self {
        let exchange = exchange.into();
        let code = pair_name.replace('/', "-");
        let id = format!("{}_{}_{}", security_type, exchange, code);

        Self {
            id,
            security_type,
            exchange,
            code,
            name: pair_name.to_string(),
            list_date: None,
        }
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}
