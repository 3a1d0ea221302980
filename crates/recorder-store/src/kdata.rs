//! kdata CSV 저장소.
//!
//! 레벨별 파일 하나에 캔들을 타임스탬프 오름차순으로 보관합니다.
//! 추가는 항상 읽기-병합-재작성 방식이라 같은 구간을 다시 받아도
//! 파일은 중복 없이 유지됩니다.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use recorder_core::{KdataCursor, KdataRow, Level, Security};
use tracing::{debug, warn};

use crate::contract;
use crate::error::Result;

/// kdata 파일 저장소.
#[derive(Debug, Clone)]
pub struct KdataStore {
    data_dir: PathBuf,
}

impl KdataStore {
    /// 새 저장소 생성.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// 증권/레벨의 kdata 파일 경로.
    pub fn path(&self, security: &Security, level: Level) -> PathBuf {
        contract::kdata_path(&self.data_dir, security, level)
    }

    /// 저장된 캔들 전체 로드.
    ///
    /// 파일이 없으면 빈 목록을 반환합니다. 깨진 행은 건너뛰고
    /// 개수만 경고로 남깁니다.
    pub fn load(&self, security: &Security, level: Level) -> Result<Vec<KdataRow>> {
        let path = self.path(security, level);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&path)?;
        let mut rows = Vec::new();
        let mut malformed = 0usize;
        for record in reader.deserialize::<KdataRow>() {
            match record {
                Ok(row) => rows.push(row),
                Err(e) => {
                    malformed += 1;
                    debug!("malformed kdata row in {}: {}", path.display(), e);
                }
            }
        }
        if malformed > 0 {
            warn!(
                path = %path.display(),
                count = malformed,
                "깨진 kdata 행을 건너뛰었습니다"
            );
        }

        Ok(rows)
    }

    /// 저장된 마지막 봉에서 커서 계산.
    ///
    /// 저장된 캔들이 없으면 `None`입니다.
    pub fn latest_cursor(&self, security: &Security, level: Level) -> Result<Option<KdataCursor>> {
        let rows = self.load(security, level)?;
        Ok(rows
            .iter()
            .map(|row| row.timestamp)
            .max()
            .map(KdataCursor::new))
    }

    /// 새 캔들을 기존 파일에 병합 추가.
    ///
    /// `timestamp_ms`가 같은 행은 새 행이 이깁니다. 반환값은
    /// 파일에 실제로 늘어난 행 수입니다.
    pub fn append_merge(
        &self,
        security: &Security,
        level: Level,
        rows: &[KdataRow],
    ) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let existing = self.load(security, level)?;
        let mut merged: BTreeMap<i64, KdataRow> = existing
            .into_iter()
            .map(|row| (row.timestamp_ms, row))
            .collect();
        let before = merged.len();

        for row in rows {
            merged.insert(row.timestamp_ms, row.clone());
        }
        let appended = merged.len() - before;

        let path = self.path(security, level);
        write_csv(&path, merged.values())?;

        debug!(
            security = %security.id,
            level = %level,
            appended,
            total = merged.len(),
            "kdata 병합 저장 완료"
        );
        Ok(appended)
    }
}

/// 임시 파일에 쓴 뒤 원자적으로 교체.
fn write_csv<'a, I>(path: &Path, rows: I) -> Result<()>
where
    I: IntoIterator<Item = &'a KdataRow>,
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
    use chrono::DateTime;
    use recorder_core::SecurityType;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn security() -> Security {
        Security::new(SecurityType::Coin, "binance", "EOS/USDT")
    }

    fn row(ts_ms: i64, close: Decimal) -> KdataRow {
        let security = security();
        let timestamp = DateTime::from_timestamp_millis(ts_ms).unwrap();
        KdataRow {
            timestamp,
            timestamp_ms: ts_ms,
            security_id: security.id.clone(),
            code: security.code.clone(),
            name: security.code.clone(),
            open: dec!(1.0),
            high: dec!(2.0),
            low: dec!(0.5),
            close,
            volume: dec!(100),
        }
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = KdataStore::new(dir.path());
        let rows = store.load(&security(), Level::Day).unwrap();
        assert!(rows.is_empty());
        assert!(store.latest_cursor(&security(), Level::Day).unwrap().is_none());
    }

    #[test]
    fn test_append_merge_counts_only_new_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = KdataStore::new(dir.path());
        let sec = security();

        let first = vec![row(1000, dec!(1.1)), row(2000, dec!(1.2))];
        assert_eq!(store.append_merge(&sec, Level::Day, &first).unwrap(), 2);

        // 겹치는 행 하나 + 새 행 하나
        let second = vec![row(2000, dec!(9.9)), row(3000, dec!(1.3))];
        assert_eq!(store.append_merge(&sec, Level::Day, &second).unwrap(), 1);

        let rows = store.load(&sec, Level::Day).unwrap();
        assert_eq!(rows.len(), 3);
        // 같은 타임스탬프는 새 행이 이김
        assert_eq!(rows[1].close, dec!(9.9));
        // 항상 오름차순
        assert!(rows.windows(2).all(|w| w[0].timestamp_ms < w[1].timestamp_ms));
    }

    #[test]
    fn test_append_merge_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = KdataStore::new(dir.path());
        let sec = security();

        let batch = vec![row(1000, dec!(1.1)), row(2000, dec!(1.2))];
        assert_eq!(store.append_merge(&sec, Level::Day, &batch).unwrap(), 2);
        assert_eq!(store.append_merge(&sec, Level::Day, &batch).unwrap(), 0);
        assert_eq!(store.load(&sec, Level::Day).unwrap().len(), 2);
    }

    #[test]
    fn test_latest_cursor_returns_max_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let store = KdataStore::new(dir.path());
        let sec = security();

        let batch = vec![row(3000, dec!(1.3)), row(1000, dec!(1.1))];
        store.append_merge(&sec, Level::Day, &batch).unwrap();

        let cursor = store.latest_cursor(&sec, Level::Day).unwrap().unwrap();
        assert_eq!(cursor.timestamp_ms(), 3000);
    }

    #[test]
    fn test_load_skips_malformed_rows() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let store = KdataStore::new(dir.path());
        let sec = security();

        let batch = vec![row(1000, dec!(1.1)), row(2000, dec!(1.2))];
        store.append_merge(&sec, Level::Day, &batch).unwrap();

        // 열 수가 맞지 않는 행을 파일에 끼워 넣는다
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(store.path(&sec, Level::Day))
            .unwrap();
        writeln!(file, "garbage,1,2").unwrap();

        let rows = store.load(&sec, Level::Day).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(store.latest_cursor(&sec, Level::Day).unwrap().is_some());
    }

    #[test]
    fn test_levels_are_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = KdataStore::new(dir.path());
        let sec = security();

        store
            .append_merge(&sec, Level::Day, &[row(1000, dec!(1.1))])
            .unwrap();
        store
            .append_merge(&sec, Level::Min1, &[row(1000, dec!(2.2)), row(2000, dec!(2.3))])
            .unwrap();

        assert_eq!(store.load(&sec, Level::Day).unwrap().len(), 1);
        assert_eq!(store.load(&sec, Level::Min1).unwrap().len(), 2);
    }
}
