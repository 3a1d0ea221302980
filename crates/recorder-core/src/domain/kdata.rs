//! 캔들(kdata) 레코드.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 정규화된 캔들 레코드.
///
/// 하나의 증권+레벨 저장 파일 안에서 `timestamp`는 유일하며
/// 오름차순으로 정렬되어 저장됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KdataRow {
    /// 봉 시작 시간
    pub timestamp: DateTime<Utc>,
    /// 봉 시작 시간 (epoch 밀리초, 보조 정렬 키)
    pub timestamp_ms: i64,
    /// 증권 id
    pub security_id: String,
    /// 증권 코드
    pub code: String,
    /// 페어 이름
    pub name: String,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가
    pub close: Decimal,
    /// 거래량
    pub volume: Decimal,
}

impl KdataRow {
    /// 봉의 날짜(UTC)를 반환합니다.
    pub fn bucket_date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_bucket_date() {
        let row = KdataRow {
            timestamp: DateTime::from_timestamp_millis(1_514_764_800_000).unwrap(),
            timestamp_ms: 1_514_764_800_000,
            security_id: "coin_binance_EOS-USDT".to_string(),
            code: "EOS-USDT".to_string(),
            name: "EOS/USDT".to_string(),
            open: dec!(8.1),
            high: dec!(8.5),
            low: dec!(7.9),
            close: dec!(8.3),
            volume: dec!(1000),
        };

        assert_eq!(row.bucket_date().to_string(), "2018-01-01");
    }
}
