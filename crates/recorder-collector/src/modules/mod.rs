//! 수집 워크플로 모듈.

pub mod kdata_record;
pub mod market_sync;
pub mod tick_record;

pub use kdata_record::record_kdata;
pub use market_sync::sync_markets;
pub use tick_record::record_ticks;

use recorder_core::{Security, SecurityType, SourceConfig};

/// 쉼표로 구분된 코드 목록 파싱 (예: "BTC-USDT,EOS-USDT").
pub(crate) fn parse_codes(codes: &Option<String>) -> Option<Vec<String>> {
    codes.as_ref().map(|s| {
        s.split(',')
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty())
            .collect()
    })
}

/// 설정된 페어에서 수집 대상 증권 목록을 만든다.
pub(crate) fn target_securities(
    source_name: &str,
    config: &SourceConfig,
    code_filter: Option<&[String]>,
) -> Vec<Security> {
    config
        .pairs
        .iter()
        .map(|pair| Security::new(SecurityType::Coin, source_name, pair))
        .filter(|security| match code_filter {
            Some(codes) => codes.iter().any(|code| code == &security.code),
            None => true,
        })
        .collect()
}
