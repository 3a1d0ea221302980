//! 체결 틱 레코드.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 정규화된 체결 틱 레코드.
///
/// 하나의 증권 안에서 `trade_id`는 유일하며, 같은 타임스탬프의 틱이
/// 여러 개 존재할 수 있습니다. 달력 날짜 단위 파일로 나뉘어 저장됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickRow {
    /// 증권 id
    pub security_id: String,
    /// 체결 id
    pub trade_id: String,
    /// 주문 id (소스가 제공하는 경우)
    #[serde(default)]
    pub order_id: Option<String>,
    /// 체결 시간
    pub timestamp: DateTime<Utc>,
    /// 체결 시간 (epoch 밀리초)
    pub timestamp_ms: i64,
    /// 체결 가격
    pub price: Decimal,
    /// 체결 수량
    pub volume: Decimal,
    /// 체결 방향 (매수=1, 매도=-1, 불명=0)
    pub direction: i8,
    /// 주문 유형 (소스가 제공하는 경우)
    #[serde(default)]
    pub order_type: Option<String>,
    /// 거래대금 (가격 x 수량)
    pub turnover: Decimal,
}

impl TickRow {
    /// 체결 날짜(UTC)를 반환합니다.
    pub fn trade_date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// 체결 방향 문자열을 정수 방향으로 변환합니다.
pub fn side_to_direction(side: Option<&str>) -> i8 {
    match side {
        Some("buy") => 1,
        Some("sell") => -1,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_to_direction() {
        assert_eq!(side_to_direction(Some("buy")), 1);
        assert_eq!(side_to_direction(Some("sell")), -1);
        assert_eq!(side_to_direction(Some("unknown")), 0);
        assert_eq!(side_to_direction(None), 0);
    }
}
