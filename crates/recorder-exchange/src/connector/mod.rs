//! 시장 데이터 소스 커넥터.

pub mod binance;
pub mod okx;

pub use binance::{BinanceConfig, BinanceSource};
pub use okx::{OkxConfig, OkxSource};

use std::sync::Arc;

use recorder_core::SourceConfig;

use crate::error::SourceError;
use crate::traits::{MarketDataSource, SourceResult};

/// 이름으로 소스 커넥터 생성.
///
/// 설정에 등록된 소스 이름을 커넥터 구현으로 연결하는 레지스트리입니다.
/// 등록되지 않은 이름은 `SourceError::NotSupported`를 반환합니다.
pub fn build_source(name: &str, config: &SourceConfig) -> SourceResult<Arc<dyn MarketDataSource>> {
    match name.to_lowercase().as_str() {
        "binance" => {
            let source = BinanceSource::new(BinanceConfig::from_source(config))?;
            Ok(Arc::new(source))
        }
        "okx" => {
            let source = OkxSource::new(OkxConfig::from_source(config))?;
            Ok(Arc::new(source))
        }
        other => Err(SourceError::NotSupported(format!(
            "no connector registered for source '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_config() -> SourceConfig {
        SourceConfig {
            enabled: true,
            api_key: String::new(),
            api_secret: String::new(),
            proxy: None,
            timeout_secs: 30,
            kdata_limit: 500,
            tick_limit: 500,
            safe_sleep_ms: 1000,
            support_since: true,
            pairs: vec!["BTC/USDT".to_string()],
            levels: vec![],
        }
    }

    #[test]
    fn test_build_source_known_names() {
        let config = source_config();
        assert_eq!(build_source("binance", &config).unwrap().name(), "binance");
        assert_eq!(build_source("Binance", &config).unwrap().name(), "binance");
        assert_eq!(build_source("okx", &config).unwrap().name(), "okx");
    }

    #[test]
    fn test_build_source_unknown_name() {
        let config = source_config();
        let err = build_source("kraken", &config).err().unwrap();
        assert!(matches!(err, SourceError::NotSupported(_)));
    }
}
