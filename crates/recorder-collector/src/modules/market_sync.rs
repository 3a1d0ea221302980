//! 마켓 목록 동기화 모듈.

use crate::{RecordingStats, Result};
use recorder_core::{RecorderConfig, Security, SecurityType};
use recorder_exchange::build_source;
use recorder_store::SecurityStore;
use std::time::Instant;

/// 활성 소스의 마켓 목록을 받아 증권 카탈로그를 초기화합니다.
///
/// 설정된 페어마다 디렉터리 골격(kdata/, ticks/)을 만들고 소스가 준
/// 원본 마켓 정보를 meta.json으로 남깁니다. 목록 전체는 거래소별
/// security_list.csv에 저장됩니다.
pub async fn sync_markets(recorder: &RecorderConfig) -> Result<RecordingStats> {
    let start = Instant::now();
    let mut stats = RecordingStats::new();

    tracing::info!("마켓 동기화 시작");

    let store = SecurityStore::new(&recorder.data_dir);

    for (name, source_config) in recorder.enabled_sources() {
        let source = match build_source(name, source_config) {
            Ok(source) => source,
            Err(e) => {
                stats.errors += 1;
                tracing::error!(source = name, error = %e, "커넥터 생성 실패");
                continue;
            }
        };

        // 1. 소스에서 전체 마켓 조회
        let markets = match source.fetch_markets().await {
            Ok(markets) => markets,
            Err(e) => {
                stats.errors += 1;
                tracing::error!(source = name, error = %e, "마켓 조회 실패");
                continue;
            }
        };
        tracing::info!(source = name, count = markets.len(), "마켓 조회 완료");

        // 2. 설정된 페어만 카탈로그에 올린다
        let mut securities = Vec::new();
        for pair in &source_config.pairs {
            stats.total += 1;

            let market = match markets.iter().find(|m| &m.symbol == pair) {
                Some(market) => market,
                None => {
                    stats.skipped += 1;
                    tracing::warn!(
                        source = name,
                        pair = pair.as_str(),
                        "소스에 없는 페어, 건너뜁니다"
                    );
                    continue;
                }
            };
            if !market.active {
                tracing::warn!(source = name, pair = pair.as_str(), "거래 중지 상태의 페어");
            }

            let security = Security::new(SecurityType::Coin, name, pair);
            store.init_security_dirs(&security)?;
            store.save_meta(&security, &market.info)?;
            securities.push(security);
            stats.success += 1;
        }

        store.save_list(SecurityType::Coin, name, &securities)?;
        tracing::info!(source = name, count = securities.len(), "증권 목록 저장 완료");
    }

    stats.elapsed = start.elapsed();
    Ok(stats)
}
