//! tick CSV 저장소.
//!
//! 체결은 일자별 파일에 보관합니다. 체결 id로 중복을 걸러내되
//! id가 빈 행은 항상 추가합니다 (id를 주지 않는 소스용).
//! 같은 타임스탬프의 체결이 여럿인 것은 정상이므로 안정 정렬로
//! 도착 순서를 보존합니다.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use recorder_core::{Security, TickCursor, TickRow};
use tracing::{debug, warn};

use crate::contract;
use crate::error::Result;

/// tick 파일 저장소.
#[derive(Debug, Clone)]
pub struct TickStore {
    data_dir: PathBuf,
}

impl TickStore {
    /// 새 저장소 생성.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// 증권/일자의 tick 파일 경로.
    pub fn path(&self, security: &Security, date: NaiveDate) -> PathBuf {
        contract::tick_path(&self.data_dir, security, date)
    }

    /// 일자 파일 로드.
    ///
    /// 파일이 없으면 빈 목록을 반환합니다.
    pub fn load_day(&self, security: &Security, date: NaiveDate) -> Result<Vec<TickRow>> {
        let path = self.path(security, date);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&path)?;
        let mut rows = Vec::new();
        let mut malformed = 0usize;
        for record in reader.deserialize::<TickRow>() {
            match record {
                Ok(row) => rows.push(row),
                Err(e) => {
                    malformed += 1;
                    debug!("malformed tick row in {}: {}", path.display(), e);
                }
            }
        }
        if malformed > 0 {
            warn!(
                path = %path.display(),
                count = malformed,
                "깨진 tick 행을 건너뛰었습니다"
            );
        }

        Ok(rows)
    }

    /// 저장된 마지막 체결에서 커서 계산.
    ///
    /// 가장 최근 일자 파일부터 내려가며 행이 있는 첫 파일을 찾고,
    /// 마지막 타임스탬프와 그 시각에 저장된 id 집합을 반환합니다.
    /// 저장된 체결이 없으면 `None`입니다.
    pub fn latest_cursor(&self, security: &Security) -> Result<Option<TickCursor>> {
        let mut dates = self.stored_dates(security)?;
        dates.sort_unstable();

        for date in dates.into_iter().rev() {
            let rows = self.load_day(security, date)?;
            let Some(latest) = rows.iter().map(|row| row.timestamp).max() else {
                continue;
            };
            let seen_ids: HashSet<String> = rows
                .iter()
                .filter(|row| row.timestamp == latest && !row.trade_id.is_empty())
                .map(|row| row.trade_id.clone())
                .collect();
            return Ok(Some(TickCursor::new(latest, seen_ids)));
        }

        Ok(None)
    }

    /// 새 체결을 일자 파일에 병합 추가.
    ///
    /// 이미 저장된 `trade_id`는 건너뜁니다. 반환값은 실제로 추가된 행 수.
    pub fn append_day(
        &self,
        security: &Security,
        date: NaiveDate,
        rows: &[TickRow],
    ) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut merged = self.load_day(security, date)?;
        let mut seen: HashSet<String> = merged
            .iter()
            .filter(|row| !row.trade_id.is_empty())
            .map(|row| row.trade_id.clone())
            .collect();
        let before = merged.len();

        for row in rows {
            if !row.trade_id.is_empty() && !seen.insert(row.trade_id.clone()) {
                continue;
            }
            merged.push(row.clone());
        }
        let appended = merged.len() - before;

        // 같은 타임스탬프끼리는 도착 순서 유지
        merged.sort_by_key(|row| row.timestamp_ms);

        let path = self.path(security, date);
        write_csv(&path, merged.iter())?;

        debug!(
            security = %security.id,
            date = %date,
            appended,
            total = merged.len(),
            "tick 병합 저장 완료"
        );
        Ok(appended)
    }

    /// 일자 파일이 존재하는 날짜 목록.
    fn stored_dates(&self, security: &Security) -> Result<Vec<NaiveDate>> {
        let dir = contract::tick_dir(&self.data_dir, security);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut dates = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Ok(date) = NaiveDate::parse_from_str(stem, "%Y-%m-%d") {
                dates.push(date);
            }
        }
        Ok(dates)
    }
}

/// 임시 파일에 쓴 뒤 원자적으로 교체.
fn write_csv<'a, I>(path: &Path, rows: I) -> Result<()>
where
    I: IntoIterator<Item = &'a TickRow>,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("csv.tmp");
    {
        let mut writer = csv::Writer::from_path(&tmp)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use recorder_core::SecurityType;
    use rust_decimal_macros::dec;

    fn security() -> Security {
        Security::new(SecurityType::Coin, "binance", "EOS/USDT")
    }

    fn tick(id: &str, ts_ms: i64) -> TickRow {
        let security = security();
        let timestamp: DateTime<Utc> = DateTime::from_timestamp_millis(ts_ms).unwrap();
        TickRow {
            security_id: security.id.clone(),
            trade_id: id.to_string(),
            order_id: None,
            timestamp,
            timestamp_ms: ts_ms,
            price: dec!(9.1),
            volume: dec!(2.0),
            direction: 1,
            order_type: None,
            turnover: dec!(18.2),
        }
    }

    fn day(ts_ms: i64) -> NaiveDate {
        DateTime::from_timestamp_millis(ts_ms).unwrap().date_naive()
    }

    #[test]
    fn test_append_day_dedups_by_trade_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = TickStore::new(dir.path());
        let sec = security();
        let date = day(1000);

        let first = vec![tick("1", 1000), tick("2", 2000)];
        assert_eq!(store.append_day(&sec, date, &first).unwrap(), 2);

        let second = vec![tick("2", 2000), tick("3", 3000)];
        assert_eq!(store.append_day(&sec, date, &second).unwrap(), 1);

        let rows = store.load_day(&sec, date).unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_append_day_keeps_empty_id_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = TickStore::new(dir.path());
        let sec = security();
        let date = day(1000);

        let batch = vec![tick("", 1000), tick("", 1000)];
        assert_eq!(store.append_day(&sec, date, &batch).unwrap(), 2);
        assert_eq!(store.append_day(&sec, date, &batch).unwrap(), 2);
    }

    #[test]
    fn test_timestamp_ties_keep_arrival_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = TickStore::new(dir.path());
        let sec = security();
        let date = day(1000);

        let batch = vec![tick("a", 1000), tick("b", 1000), tick("c", 500)];
        store.append_day(&sec, date, &batch).unwrap();

        let rows = store.load_day(&sec, date).unwrap();
        let ids: Vec<&str> = rows.iter().map(|row| row.trade_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_latest_cursor_collects_ids_at_last_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let store = TickStore::new(dir.path());
        let sec = security();

        // 이틀치 파일, 커서는 최신 파일의 마지막 시각에서 계산
        let day1 = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2018, 1, 2).unwrap();
        store
            .append_day(&sec, day1, &[tick("1", 1_514_764_800_000)])
            .unwrap();
        store
            .append_day(
                &sec,
                day2,
                &[
                    tick("2", 1_514_851_200_000),
                    tick("3", 1_514_851_260_000),
                    tick("4", 1_514_851_260_000),
                ],
            )
            .unwrap();

        let cursor = store.latest_cursor(&sec).unwrap().unwrap();
        assert_eq!(cursor.timestamp.timestamp_millis(), 1_514_851_260_000);
        assert!(cursor.contains("3"));
        assert!(cursor.contains("4"));
        assert!(!cursor.contains("2"));
    }

    #[test]
    fn test_latest_cursor_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = TickStore::new(dir.path());
        assert!(store.latest_cursor(&security()).unwrap().is_none());
    }
}
