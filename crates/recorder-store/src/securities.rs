//! 증권 목록/메타 저장소.
//!
//! 거래소별 `security_list.csv`와 증권별 `meta.json`을 관리하고
//! 증권 디렉터리 골격(kdata/, ticks/)을 만듭니다.

use std::fs;
use std::path::PathBuf;

use recorder_core::{Security, SecurityType};
use tracing::debug;

use crate::contract;
use crate::error::Result;

/// 증권 목록 저장소.
#[derive(Debug, Clone)]
pub struct SecurityStore {
    data_dir: PathBuf,
}

impl SecurityStore {
    /// 새 저장소 생성.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// 증권 디렉터리 골격 생성.
    pub fn init_security_dirs(&self, security: &Security) -> Result<()> {
        let dir = contract::security_dir(&self.data_dir, security);
        fs::create_dir_all(dir.join("kdata"))?;
        fs::create_dir_all(dir.join("ticks"))?;
        Ok(())
    }

    /// 거래소별 증권 목록 저장.
    pub fn save_list(
        &self,
        security_type: SecurityType,
        exchange: &str,
        securities: &[Security],
    ) -> Result<()> {
        let path = contract::security_list_path(&self.data_dir, security_type, exchange);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp)?;
            for security in securities {
                writer.serialize(security)?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, &path)?;

        debug!(
            exchange,
            count = securities.len(),
            "증권 목록 저장 완료"
        );
        Ok(())
    }

    /// 거래소별 증권 목록 로드.
    ///
    /// 파일이 없으면 빈 목록을 반환합니다.
    pub fn load_list(
        &self,
        security_type: SecurityType,
        exchange: &str,
    ) -> Result<Vec<Security>> {
        let path = contract::security_list_path(&self.data_dir, security_type, exchange);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&path)?;
        let mut securities = Vec::new();
        for record in reader.deserialize::<Security>() {
            securities.push(record?);
        }
        Ok(securities)
    }

    /// 소스가 준 원본 마켓 정보를 meta.json으로 저장.
    pub fn save_meta(&self, security: &Security, meta: &serde_json::Value) -> Result<()> {
        let path = contract::security_meta_path(&self.data_dir, security);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(meta)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn securities() -> Vec<Security> {
        vec![
            Security::new(SecurityType::Coin, "binance", "BTC/USDT"),
            Security::new(SecurityType::Coin, "binance", "EOS/USDT"),
        ]
    }

    #[test]
    fn test_save_and_load_list_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SecurityStore::new(dir.path());
        let list = securities();

        store.save_list(SecurityType::Coin, "binance", &list).unwrap();
        let loaded = store.load_list(SecurityType::Coin, "binance").unwrap();

        assert_eq!(loaded, list);
        assert_eq!(loaded[0].id, "coin_binance_BTC-USDT");
    }

    #[test]
    fn test_load_list_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SecurityStore::new(dir.path());
        assert!(store.load_list(SecurityType::Coin, "okx").unwrap().is_empty());
    }

    #[test]
    fn test_init_dirs_and_meta() {
        let dir = tempfile::tempdir().unwrap();
        let store = SecurityStore::new(dir.path());
        let security = Security::new(SecurityType::Coin, "binance", "BTC/USDT");

        store.init_security_dirs(&security).unwrap();
        store
            .save_meta(&security, &json!({"symbol": "BTCUSDT", "status": "TRADING"}))
            .unwrap();

        let base = dir.path().join("coin/binance/BTC-USDT");
        assert!(base.join("kdata").is_dir());
        assert!(base.join("ticks").is_dir());

        let meta: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(base.join("meta.json")).unwrap()).unwrap();
        assert_eq!(meta["symbol"], "BTCUSDT");
    }
}
