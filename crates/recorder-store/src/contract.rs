//! 저장 경로 계약.
//!
//! 모든 저장 파일의 위치는 이 모듈의 함수로만 계산합니다.
//!
//! ```text
//! {data_dir}/{type}/{exchange}/security_list.csv
//! {data_dir}/{type}/{exchange}/{code}/meta.json
//! {data_dir}/{type}/{exchange}/{code}/kdata/{level}.csv
//! {data_dir}/{type}/{exchange}/{code}/ticks/{YYYY-MM-DD}.csv
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use recorder_core::{Level, Security, SecurityType};

/// 거래소 디렉터리.
pub fn exchange_dir(data_dir: &Path, security_type: SecurityType, exchange: &str) -> PathBuf {
    data_dir.join(security_type.as_str()).join(exchange)
}

/// 거래소별 증권 목록 파일.
pub fn security_list_path(data_dir: &Path, security_type: SecurityType, exchange: &str) -> PathBuf {
    exchange_dir(data_dir, security_type, exchange).join("security_list.csv")
}

/// 증권 디렉터리.
pub fn security_dir(data_dir: &Path, security: &Security) -> PathBuf {
    exchange_dir(data_dir, security.security_type, &security.exchange).join(&security.code)
}

/// 증권 메타 파일.
pub fn security_meta_path(data_dir: &Path, security: &Security) -> PathBuf {
    security_dir(data_dir, security).join("meta.json")
}

/// 레벨별 kdata 파일.
pub fn kdata_path(data_dir: &Path, security: &Security, level: Level) -> PathBuf {
    security_dir(data_dir, security)
        .join("kdata")
        .join(format!("{}.csv", level.storage_name()))
}

/// tick 디렉터리.
pub fn tick_dir(data_dir: &Path, security: &Security) -> PathBuf {
    security_dir(data_dir, security).join("ticks")
}

/// 일자별 tick 파일.
pub fn tick_path(data_dir: &Path, security: &Security, date: NaiveDate) -> PathBuf {
    tick_dir(data_dir, security).join(format!("{}.csv", date.format("%Y-%m-%d")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn security() -> Security {
        Security::new(SecurityType::Coin, "binance", "EOS/USDT")
    }

    #[test]
    fn test_security_list_path() {
        let path = security_list_path(Path::new("/data"), SecurityType::Coin, "binance");
        assert_eq!(path, Path::new("/data/coin/binance/security_list.csv"));
    }

    #[test]
    fn test_kdata_path_uses_storage_name() {
        let path = kdata_path(Path::new("/data"), &security(), Level::Day);
        assert_eq!(path, Path::new("/data/coin/binance/EOS-USDT/kdata/day.csv"));

        let path = kdata_path(Path::new("/data"), &security(), Level::Min1);
        assert_eq!(path, Path::new("/data/coin/binance/EOS-USDT/kdata/1min.csv"));
    }

    #[test]
    fn test_tick_path_is_per_day() {
        let date = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
        let path = tick_path(Path::new("/data"), &security(), date);
        assert_eq!(
            path,
            Path::new("/data/coin/binance/EOS-USDT/ticks/2018-01-01.csv")
        );
    }

    #[test]
    fn test_meta_path() {
        let path = security_meta_path(Path::new("/data"), &security());
        assert_eq!(path, Path::new("/data/coin/binance/EOS-USDT/meta.json"));
    }
}
