//! 증분 병합 엔진.
//!
//! 소스에서 받은 원시 캔들/체결을 저장 가능한 행으로 바꿉니다.
//! 순수 함수라 저장소/네트워크 없이 그대로 테스트할 수 있습니다.
//!
//! kdata 규칙:
//! 1. 마지막 원시 캔들은 아직 닫히지 않았으므로 항상 버린다
//! 2. 커서 이하의 캔들은 중복으로 건너뛴다
//! 3. 일봉에서 오늘 날짜의 캔들은 저장하지 않는다
//! 4. 중복이 하나도 없으면 커서와 첫 캔들 사이를 간극으로 보고한다
//! 5. 커서는 실제로 남긴 행이 있을 때만 전진한다
//!
//! tick 규칙:
//! 1. 이미 저장된 id 또는 커서 이전 시각의 체결은 버린다
//! 2. 날짜가 바뀌면 거기서 멈추고 나머지는 다음 사이클로 미룬다
//! 3. 커서는 남긴 배치의 마지막 시각과 전체 id 집합으로 갱신한다

use chrono::{DateTime, NaiveDate, Utc};
use recorder_core::{side_to_direction, KdataCursor, KdataRow, Level, Security, TickCursor, TickRow};
use recorder_exchange::{RawCandle, RawTrade};
use rust_decimal::Decimal;
use tracing::debug;

/// 수집 간극. 커서와 이번 배치 첫 레코드 사이에 받지 못한 구간이 있습니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gap {
    /// 저장된 마지막 레코드 시각
    pub from: DateTime<Utc>,
    /// 이번 배치 첫 레코드 시각
    pub to: DateTime<Utc>,
}

/// kdata 병합 결과.
#[derive(Debug, Clone)]
pub struct KdataMergeOutcome {
    /// 저장할 행 (타임스탬프 오름차순)
    pub rows: Vec<KdataRow>,
    /// 병합 후 커서
    pub cursor: Option<KdataCursor>,
    /// 감지된 간극
    pub gap: Option<Gap>,
    /// 일봉이 오늘까지 따라잡았는지
    pub caught_up: bool,
    /// 건너뛴 깨진 캔들 수
    pub malformed: usize,
}

/// tick 병합 결과.
#[derive(Debug, Clone)]
pub struct TickMergeOutcome {
    /// 저장할 행 (모두 같은 날짜)
    pub rows: Vec<TickRow>,
    /// 날짜 경계 때문에 미뤄진 체결 (다음 사이클에 우선 처리)
    pub deferred: Vec<RawTrade>,
    /// 병합 후 커서
    pub cursor: Option<TickCursor>,
    /// 감지된 간극
    pub gap: Option<Gap>,
    /// 건너뛴 깨진 체결 수
    pub malformed: usize,
}

/// 원시 캔들 배치를 저장할 행으로 병합.
pub fn merge_kdata(
    security: &Security,
    level: Level,
    raw: &[RawCandle],
    cursor: Option<&KdataCursor>,
    now: DateTime<Utc>,
) -> KdataMergeOutcome {
    let today = now.date_naive();

    // 일봉 따라잡음 판정은 버리기 전의 마지막 원시 캔들로 한다
    let caught_up = level.is_day()
        && raw
            .last()
            .and_then(|candle| DateTime::from_timestamp_millis(candle.timestamp_ms))
            .map(|ts| ts.date_naive() == today)
            .unwrap_or(false);

    // 마지막 캔들은 아직 닫히지 않았다
    let body = if raw.is_empty() {
        &raw[..0]
    } else {
        &raw[..raw.len() - 1]
    };

    let cursor_ms = cursor.map(KdataCursor::timestamp_ms);
    let mut rows = Vec::with_capacity(body.len());
    let mut has_duplicate = false;
    let mut malformed = 0usize;

    for candle in body {
        if let Some(cursor_ms) = cursor_ms {
            if candle.timestamp_ms <= cursor_ms {
                has_duplicate = true;
                continue;
            }
        }

        let Some(timestamp) = DateTime::from_timestamp_millis(candle.timestamp_ms) else {
            malformed += 1;
            debug!(timestamp_ms = candle.timestamp_ms, "캔들 시각이 깨져 건너뜀");
            continue;
        };

        // 오늘의 일봉은 아직 완성되지 않았으므로 저장하지 않는다
        if level.is_day() && timestamp.date_naive() == today {
            continue;
        }

        match parse_candle(security, candle, timestamp) {
            Some(row) => rows.push(row),
            None => {
                malformed += 1;
                debug!(timestamp_ms = candle.timestamp_ms, "캔들 값이 깨져 건너뜀");
            }
        }
    }

    // 겹침 재조회에서 중복이 하나도 안 나왔으면 사이에 빈 구간이 있다
    let gap = match (cursor, raw.first()) {
        (Some(cursor), Some(first)) if !has_duplicate => {
            DateTime::from_timestamp_millis(first.timestamp_ms).map(|to| Gap {
                from: cursor.timestamp,
                to,
            })
        }
        _ => None,
    };

    let cursor = match rows.last() {
        Some(last) => Some(KdataCursor::new(last.timestamp)),
        None => cursor.cloned(),
    };

    KdataMergeOutcome {
        rows,
        cursor,
        gap,
        caught_up,
        malformed,
    }
}

/// 원시 체결 배치를 저장할 행으로 병합.
///
/// 입력은 타임스탬프 오름차순이어야 합니다 (소스 계약).
pub fn merge_ticks(
    security: &Security,
    raw: Vec<RawTrade>,
    cursor: Option<&TickCursor>,
) -> TickMergeOutcome {
    let cursor_ms = cursor.map(|c| c.timestamp.timestamp_millis());

    // 이미 저장된 구간 걸러내기
    let mut filtered = Vec::with_capacity(raw.len());
    let mut removed = 0usize;
    for trade in raw {
        let duplicate = match (cursor, cursor_ms) {
            (Some(cursor), Some(cursor_ms)) => {
                (!trade.id.is_empty() && cursor.contains(&trade.id))
                    || trade.timestamp_ms < cursor_ms
            }
            _ => false,
        };
        if duplicate {
            removed += 1;
            continue;
        }
        filtered.push(trade);
    }

    // 하나도 안 걸러졌으면 저장된 구간과 이어지지 않는다는 뜻
    let gap = match (cursor, filtered.first()) {
        (Some(cursor), Some(first)) if removed == 0 => {
            DateTime::from_timestamp_millis(first.timestamp_ms).map(|to| Gap {
                from: cursor.timestamp,
                to,
            })
        }
        _ => None,
    };

    let mut rows: Vec<TickRow> = Vec::with_capacity(filtered.len());
    let mut deferred: Vec<RawTrade> = Vec::new();
    let mut malformed = 0usize;
    let mut batch_date: Option<NaiveDate> = None;

    let mut iter = filtered.into_iter();
    while let Some(trade) = iter.next() {
        let Some(timestamp) = DateTime::from_timestamp_millis(trade.timestamp_ms) else {
            malformed += 1;
            debug!(timestamp_ms = trade.timestamp_ms, "체결 시각이 깨져 건너뜀");
            continue;
        };

        let date = timestamp.date_naive();
        match batch_date {
            None => batch_date = Some(date),
            Some(current) if current != date => {
                // 날짜가 바뀌면 남은 체결은 다음 사이클로
                deferred.push(trade);
                deferred.extend(iter);
                break;
            }
            _ => {}
        }

        match parse_trade(security, &trade, timestamp) {
            Some(row) => rows.push(row),
            None => {
                malformed += 1;
                debug!(trade_id = %trade.id, "체결 값이 깨져 건너뜀");
            }
        }
    }

    let cursor = match rows.last() {
        Some(last) => {
            let seen_ids = rows
                .iter()
                .filter(|row| !row.trade_id.is_empty())
                .map(|row| row.trade_id.clone())
                .collect();
            Some(TickCursor::new(last.timestamp, seen_ids))
        }
        None => cursor.cloned(),
    };

    TickMergeOutcome {
        rows,
        deferred,
        cursor,
        gap,
        malformed,
    }
}

fn parse_candle(
    security: &Security,
    candle: &RawCandle,
    timestamp: DateTime<Utc>,
) -> Option<KdataRow> {
    let open: Decimal = candle.open.parse().ok()?;
    let high: Decimal = candle.high.parse().ok()?;
    let low: Decimal = candle.low.parse().ok()?;
    let close: Decimal = candle.close.parse().ok()?;
    let volume: Decimal = candle.volume.parse().ok()?;

    Some(KdataRow {
        timestamp,
        timestamp_ms: candle.timestamp_ms,
        security_id: security.id.clone(),
        code: security.code.clone(),
        name: security.name.clone(),
        open,
        high,
        low,
        close,
        volume,
    })
}

fn parse_trade(
    security: &Security,
    trade: &RawTrade,
    timestamp: DateTime<Utc>,
) -> Option<TickRow> {
    let price: Decimal = trade.price.parse().ok()?;
    let volume: Decimal = trade.amount.parse().ok()?;

    Some(TickRow {
        security_id: security.id.clone(),
        trade_id: trade.id.clone(),
        order_id: trade.order_id.clone(),
        timestamp,
        timestamp_ms: trade.timestamp_ms,
        price,
        volume,
        direction: side_to_direction(trade.side.as_deref()),
        order_type: trade.order_type.clone(),
        turnover: price * volume,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use recorder_core::SecurityType;
    use rust_decimal_macros::dec;

    const DAY_MS: i64 = 86_400_000;
    /// 2018-01-01T00:00:00Z
    const EPOCH_2018: i64 = 1_514_764_800_000;

    fn security() -> Security {
        Security::new(SecurityType::Coin, "binance", "EOS/USDT")
    }

    fn day_ts(day_offset: i64) -> i64 {
        EPOCH_2018 + day_offset * DAY_MS
    }

    fn candle(ts_ms: i64, close: &str) -> RawCandle {
        RawCandle {
            timestamp_ms: ts_ms,
            open: "8.0".to_string(),
            high: "9.0".to_string(),
            low: "7.0".to_string(),
            close: close.to_string(),
            volume: "1000".to_string(),
        }
    }

    fn trade(id: &str, ts_ms: i64) -> RawTrade {
        RawTrade {
            id: id.to_string(),
            order_id: None,
            timestamp_ms: ts_ms,
            price: "9.1".to_string(),
            amount: "2".to_string(),
            side: Some("buy".to_string()),
            order_type: None,
        }
    }

    fn cursor_at(ts_ms: i64) -> KdataCursor {
        KdataCursor::new(DateTime::from_timestamp_millis(ts_ms).unwrap())
    }

    /// now = 2018-01-10 12:00 UTC
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 1, 10, 12, 0, 0).unwrap()
    }

    // ========================================================================
    // kdata
    // ========================================================================

    #[test]
    fn test_kdata_last_raw_candle_is_dropped() {
        let raw = vec![candle(day_ts(0), "8.1"), candle(day_ts(1), "8.2")];
        let outcome = merge_kdata(&security(), Level::Day, &raw, None, now());

        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].timestamp_ms, day_ts(0));
    }

    #[test]
    fn test_kdata_single_candle_yields_nothing() {
        let raw = vec![candle(day_ts(5), "8.1")];
        let outcome = merge_kdata(&security(), Level::Day, &raw, None, now());

        assert!(outcome.rows.is_empty());
        assert!(outcome.cursor.is_none());
    }

    #[test]
    fn test_kdata_duplicates_below_cursor_are_skipped() {
        let cursor = cursor_at(day_ts(8));
        let raw = vec![
            candle(day_ts(7), "8.1"),
            candle(day_ts(8), "8.2"),
            candle(day_ts(9), "8.3"),
            candle(day_ts(10), "8.4"),
        ];
        let outcome = merge_kdata(&security(), Level::Day, &raw, Some(&cursor), now());

        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].timestamp_ms, day_ts(9));
        assert!(outcome.gap.is_none());
        assert_eq!(outcome.cursor.unwrap().timestamp_ms(), day_ts(9));
    }

    #[test]
    fn test_kdata_gap_reported_when_no_overlap() {
        let cursor = cursor_at(day_ts(5));
        let raw = vec![
            candle(day_ts(7), "8.1"),
            candle(day_ts(8), "8.2"),
            candle(day_ts(9), "8.3"),
        ];
        let outcome = merge_kdata(&security(), Level::Day, &raw, Some(&cursor), now());

        let gap = outcome.gap.expect("gap");
        assert_eq!(gap.from.timestamp_millis(), day_ts(5));
        assert_eq!(gap.to.timestamp_millis(), day_ts(7));
        // 간극이 있어도 받은 구간은 그대로 저장한다
        assert_eq!(outcome.rows.len(), 2);
    }

    #[test]
    fn test_kdata_gap_reported_even_when_body_empty() {
        let cursor = cursor_at(day_ts(5));
        let raw = vec![candle(day_ts(9), "8.3")];
        let outcome = merge_kdata(&security(), Level::Day, &raw, Some(&cursor), now());

        assert!(outcome.rows.is_empty());
        assert!(outcome.gap.is_some());
        // 남긴 행이 없으면 커서는 그대로
        assert_eq!(outcome.cursor.unwrap().timestamp_ms(), day_ts(5));
    }

    #[test]
    fn test_kdata_empty_raw_carries_cursor() {
        let cursor = cursor_at(day_ts(5));
        let outcome = merge_kdata(&security(), Level::Day, &[], Some(&cursor), now());

        assert!(outcome.rows.is_empty());
        assert!(outcome.gap.is_none());
        assert!(!outcome.caught_up);
        assert_eq!(outcome.cursor.unwrap().timestamp_ms(), day_ts(5));
    }

    #[test]
    fn test_kdata_todays_daily_bar_is_not_persisted() {
        // now는 2018-01-10, 마지막 원시 캔들은 1-11 (다음 날로 넘어간 직후)
        let raw = vec![
            candle(day_ts(8), "8.1"),
            candle(day_ts(9), "8.2"),
            candle(day_ts(10), "8.3"),
        ];
        let outcome = merge_kdata(&security(), Level::Day, &raw, None, now());

        // 몸통은 [1-08, 1-09], 1-10은 마지막이라 버려짐
        assert_eq!(outcome.rows.len(), 2);
        assert!(outcome.caught_up);

        // 오늘 캔들이 몸통 안에 있으면 건너뛴다
        let raw = vec![
            candle(day_ts(9), "8.2"),
            candle(day_ts(10), "8.3"),
            candle(day_ts(11), "8.4"),
        ];
        let outcome = merge_kdata(&security(), Level::Day, &raw, None, now());
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].timestamp_ms, day_ts(9));
    }

    #[test]
    fn test_kdata_minute_level_keeps_todays_bars() {
        let base = now().timestamp_millis() - 10 * 60_000;
        let raw: Vec<RawCandle> = (0..5).map(|i| candle(base + i * 60_000, "8.1")).collect();
        let outcome = merge_kdata(&security(), Level::Min1, &raw, None, now());

        assert_eq!(outcome.rows.len(), 4);
        assert!(!outcome.caught_up);
    }

    #[test]
    fn test_kdata_malformed_values_are_counted() {
        let raw = vec![
            candle(day_ts(0), "8.1"),
            candle(day_ts(1), "not-a-number"),
            candle(day_ts(2), "8.3"),
            candle(day_ts(3), "8.4"),
        ];
        let outcome = merge_kdata(&security(), Level::Day, &raw, None, now());

        assert_eq!(outcome.malformed, 1);
        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(outcome.rows[1].timestamp_ms, day_ts(2));
    }

    #[test]
    fn test_kdata_row_fields_are_normalized() {
        let raw = vec![candle(day_ts(0), "8.25"), candle(day_ts(1), "8.3")];
        let outcome = merge_kdata(&security(), Level::Day, &raw, None, now());

        let row = &outcome.rows[0];
        assert_eq!(row.security_id, "coin_binance_EOS-USDT");
        assert_eq!(row.code, "EOS-USDT");
        assert_eq!(row.name, "EOS/USDT");
        assert_eq!(row.close, dec!(8.25));
        assert_eq!(row.timestamp.timestamp_millis(), row.timestamp_ms);
    }

    // ========================================================================
    // tick
    // ========================================================================

    #[test]
    fn test_ticks_cold_start_keeps_all_same_day() {
        let raw = vec![trade("1", day_ts(0)), trade("2", day_ts(0) + 1000)];
        let outcome = merge_ticks(&security(), raw, None);

        assert_eq!(outcome.rows.len(), 2);
        assert!(outcome.deferred.is_empty());
        assert!(outcome.gap.is_none());

        let cursor = outcome.cursor.unwrap();
        assert_eq!(cursor.timestamp.timestamp_millis(), day_ts(0) + 1000);
        assert!(cursor.contains("1"));
        assert!(cursor.contains("2"));
    }

    #[test]
    fn test_ticks_dedup_by_id_and_timestamp() {
        let seen = ["2".to_string()].into_iter().collect();
        let cursor = TickCursor::new(
            DateTime::from_timestamp_millis(day_ts(0) + 2000).unwrap(),
            seen,
        );

        let raw = vec![
            trade("1", day_ts(0) + 1000), // 커서 이전 시각
            trade("2", day_ts(0) + 2000), // 이미 저장된 id
            trade("3", day_ts(0) + 2000), // 같은 시각, 새 id → 유지
            trade("4", day_ts(0) + 3000),
        ];
        let outcome = merge_ticks(&security(), raw, Some(&cursor));

        let ids: Vec<&str> = outcome.rows.iter().map(|r| r.trade_id.as_str()).collect();
        assert_eq!(ids, vec!["3", "4"]);
        assert!(outcome.gap.is_none());
    }

    #[test]
    fn test_ticks_gap_when_nothing_removed() {
        let cursor = TickCursor::new(
            DateTime::from_timestamp_millis(day_ts(0)).unwrap(),
            Default::default(),
        );
        let raw = vec![trade("9", day_ts(0) + 50_000), trade("10", day_ts(0) + 51_000)];
        let outcome = merge_ticks(&security(), raw, Some(&cursor));

        let gap = outcome.gap.expect("gap");
        assert_eq!(gap.from.timestamp_millis(), day_ts(0));
        assert_eq!(gap.to.timestamp_millis(), day_ts(0) + 50_000);
        assert_eq!(outcome.rows.len(), 2);
    }

    #[test]
    fn test_ticks_day_boundary_defers_remainder() {
        let raw = vec![
            trade("1", day_ts(1) - 1000), // 1-01 23:59:59
            trade("2", day_ts(1) + 1000), // 1-02 00:00:01
            trade("3", day_ts(1) + 2000),
        ];
        let outcome = merge_ticks(&security(), raw, None);

        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].trade_id, "1");
        assert_eq!(outcome.deferred.len(), 2);
        assert_eq!(outcome.deferred[0].id, "2");

        // 커서는 저장된 배치 기준
        let cursor = outcome.cursor.unwrap();
        assert_eq!(cursor.timestamp.timestamp_millis(), day_ts(1) - 1000);
        assert!(cursor.contains("1"));
        assert!(!cursor.contains("2"));
    }

    #[test]
    fn test_ticks_empty_ids_are_never_deduped_by_id() {
        let seen = std::collections::HashSet::new();
        let cursor = TickCursor::new(DateTime::from_timestamp_millis(day_ts(0)).unwrap(), seen);

        let mut raw = vec![trade("", day_ts(0)), trade("", day_ts(0))];
        raw.push(trade("1", day_ts(0) + 1000));
        let outcome = merge_ticks(&security(), raw, Some(&cursor));

        // ts == 커서 시각은 유지 (같은 초의 체결일 수 있음)
        assert_eq!(outcome.rows.len(), 3);
        let cursor = outcome.cursor.unwrap();
        assert!(cursor.contains("1"));
        assert_eq!(cursor.seen_ids.len(), 1);
    }

    #[test]
    fn test_ticks_direction_and_turnover() {
        let mut sell = trade("1", day_ts(0));
        sell.side = Some("sell".to_string());
        sell.price = "4.5".to_string();
        sell.amount = "2".to_string();
        let mut unknown = trade("2", day_ts(0) + 1000);
        unknown.side = None;

        let outcome = merge_ticks(&security(), vec![sell, unknown], None);

        assert_eq!(outcome.rows[0].direction, -1);
        assert_eq!(outcome.rows[0].turnover, dec!(9.0));
        assert_eq!(outcome.rows[1].direction, 0);
    }

    #[test]
    fn test_ticks_malformed_are_counted() {
        let mut bad = trade("1", day_ts(0));
        bad.price = "n/a".to_string();
        let outcome = merge_ticks(&security(), vec![bad, trade("2", day_ts(0) + 1000)], None);

        assert_eq!(outcome.malformed, 1);
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].trade_id, "2");
    }

    // ========================================================================
    // 재병합 멱등성
    // ========================================================================

    mod idempotence {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// 같은 배치를 병합 후 커서로 다시 병합하면 아무것도 남지 않는다.
            #[test]
            fn merging_same_batch_twice_yields_nothing(
                offsets in proptest::collection::btree_set(0i64..5000, 2..30)
            ) {
                let base = EPOCH_2018;
                let raw: Vec<RawCandle> = offsets
                    .iter()
                    .map(|offset| candle(base + offset * 60_000, "8.1"))
                    .collect();
                let now = DateTime::from_timestamp_millis(
                    base + (5000 + 10) * 60_000,
                ).unwrap();

                let first = merge_kdata(&security(), Level::Min1, &raw, None, now);
                prop_assert_eq!(first.rows.len(), raw.len() - 1);

                let second = merge_kdata(
                    &security(),
                    Level::Min1,
                    &raw,
                    first.cursor.as_ref(),
                    now,
                );
                prop_assert!(second.rows.is_empty());
                prop_assert_eq!(second.cursor, first.cursor);
            }
        }
    }
}
