//! kdata(캔들) 증분 수집 모듈.

use crate::driver::{self, LoopState};
use crate::{CollectorConfig, RecordingStats, Result};
use recorder_core::{recording_span, Level, RecorderConfig};
use recorder_exchange::build_source;
use recorder_store::{KdataStore, SearchIndex};
use std::time::Instant;
use tracing::Instrument;

/// 설정된 (소스, 페어, 레벨) 조합의 kdata를 따라잡을 때까지 수집합니다.
///
/// 증권 하나가 실패해도 나머지는 계속 진행합니다.
pub async fn record_kdata(
    recorder: &RecorderConfig,
    collector: &CollectorConfig,
    source_filter: Option<String>,
    codes: Option<String>,
    level_filter: Option<Level>,
) -> Result<RecordingStats> {
    let start = Instant::now();
    let mut stats = RecordingStats::new();

    tracing::info!("kdata 수집 시작");

    let store = KdataStore::new(&recorder.data_dir);
    let index = SearchIndex::from_config(&recorder.index)?;
    if index.is_some() {
        tracing::info!(base_url = recorder.index.base_url.as_str(), "검색 인덱스 적재 활성화");
    }
    let code_list = super::parse_codes(&codes);

    for (name, source_config) in recorder.enabled_sources() {
        if let Some(filter) = &source_filter {
            if filter != name {
                continue;
            }
        }

        let source = match build_source(name, source_config) {
            Ok(source) => source,
            Err(e) => {
                stats.errors += 1;
                tracing::error!(source = name, error = %e, "커넥터 생성 실패");
                continue;
            }
        };

        let securities = super::target_securities(name, source_config, code_list.as_deref());
        if securities.is_empty() {
            tracing::warn!(source = name, "수집할 페어가 없습니다");
            continue;
        }

        let levels: Vec<Level> = match level_filter {
            Some(level) => vec![level],
            None => source_config.levels.clone(),
        };

        tracing::info!(
            source = name,
            securities = securities.len(),
            levels = levels.len(),
            "수집 범위 설정 완료"
        );

        for security in &securities {
            for &level in &levels {
                stats.total += 1;

                let result = driver::run_kdata_loop(
                    source.as_ref(),
                    &store,
                    index.as_ref(),
                    security,
                    level,
                    source_config,
                    &collector.recording,
                )
                .instrument(recording_span!("record_kdata", security.id, level))
                .await;

                match result {
                    Ok(summary) => {
                        stats.gaps += summary.gaps;
                        stats.total_rows += summary.rows_appended;
                        match summary.state {
                            LoopState::CaughtUp if summary.rows_appended > 0 => {
                                stats.success += 1;
                                tracing::info!(
                                    security = %security.id,
                                    level = %level,
                                    rows = summary.rows_appended,
                                    cycles = summary.cycles,
                                    "수집 및 저장 완료"
                                );
                            }
                            LoopState::CaughtUp => {
                                stats.empty += 1;
                                tracing::debug!(security = %security.id, level = %level, "새 데이터 없음");
                            }
                            _ => {
                                // 실패 원인은 루프 안에서 이미 로그로 남음
                                stats.skipped += 1;
                            }
                        }
                    }
                    Err(e) => {
                        stats.errors += 1;
                        tracing::error!(
                            security = %security.id,
                            level = %level,
                            error = %e,
                            "수집 실패"
                        );
                    }
                }

                // Rate limiting
                tokio::time::sleep(source_config.safe_sleep()).await;
            }
        }
    }

    stats.elapsed = start.elapsed();
    Ok(stats)
}
