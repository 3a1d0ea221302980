//! 증권 단위 수집 루프.
//!
//! 한 증권(+레벨)의 수집을 따라잡을 때까지 반복합니다. 사이클마다
//! 계획 → 조회 → 병합 → 저장 → 인덱스 push 순서로 진행하고, 결과와
//! 무관하게 소스 설정의 안전 대기 시간만큼 쉰 뒤 다음 사이클로 갑니다.
//!
//! 상태 전이:
//! - 커서 없음 → `Backfilling`, 커서 있음 → `Resuming`
//! - 행이 저장되면 `Backfilling` → `Resuming`
//! - 일봉 오늘 도달, 일봉 사전 확인, 연속 무수확 → `CaughtUp`
//! - 복구 불가 소스 에러(인증/미지원/설정) → `Failed`
//! - 일시 에러(네트워크/한도/타임아웃)는 상태를 바꾸지 않고 재시도

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use recorder_core::{Level, Security, SourceConfig};
use recorder_exchange::{MarketDataSource, RawTrade};
use recorder_store::{KdataStore, SearchIndex, TickStore};
use tracing::{debug, error, info, warn};

use crate::config::RecordingConfig;
use crate::error::Result;
use crate::merge;
use crate::planner;

/// 수집 루프 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// 저장된 데이터 없이 처음부터 채우는 중
    Backfilling,
    /// 커서 이후 증분을 받는 중
    Resuming,
    /// 현재 시점까지 따라잡음
    CaughtUp,
    /// 복구 불가 에러로 중단됨
    Failed,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Backfilling => "backfilling",
            LoopState::Resuming => "resuming",
            LoopState::CaughtUp => "caught_up",
            LoopState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// 수집 루프 요약.
#[derive(Debug, Clone)]
pub struct LoopSummary {
    /// 종료 시점 상태
    pub state: LoopState,
    /// 수행한 사이클 수
    pub cycles: u32,
    /// 저장소에 실제로 추가된 행 수
    pub rows_appended: usize,
    /// 감지된 간극 수
    pub gaps: usize,
    /// 건너뛴 깨진 레코드 수
    pub malformed: usize,
}

impl LoopSummary {
    fn new(state: LoopState) -> Self {
        Self {
            state,
            cycles: 0,
            rows_appended: 0,
            gaps: 0,
            malformed: 0,
        }
    }

    fn caught_up() -> Self {
        Self::new(LoopState::CaughtUp)
    }

    fn failed() -> Self {
        Self::new(LoopState::Failed)
    }
}

/// 한 증권+레벨의 kdata 수집 루프 실행.
///
/// 설정/기능 문제는 루프를 시작하지 않고 `Failed` 요약으로 돌아갑니다.
/// 커서 조회 실패만 에러로 전파됩니다.
pub async fn run_kdata_loop(
    source: &dyn MarketDataSource,
    store: &KdataStore,
    index: Option<&SearchIndex>,
    security: &Security,
    level: Level,
    source_config: &SourceConfig,
    recording: &RecordingConfig,
) -> Result<LoopSummary> {
    let caps = source.capabilities();
    if !caps.candles {
        error!(source = source.name(), "소스가 캔들 조회를 지원하지 않습니다");
        return Ok(LoopSummary::failed());
    }

    let mut cursor = store.latest_cursor(security, level)?;

    // 저장된 과거분을 인덱스에 다시 밀어 넣는다 (best-effort)
    if let Some(index) = index {
        match reindex_history(store, index, security, level).await {
            Ok(count) if count > 0 => debug!(count, "기존 kdata 재색인 완료"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "기존 kdata 재색인 실패"),
        }
    }

    // 어제 봉까지 저장돼 있으면 오늘은 받을 것이 없다
    if level.is_day() {
        if let Some(cursor) = &cursor {
            if next_day_is_today(cursor.timestamp, Utc::now()) {
                info!("일봉이 이미 최신입니다");
                return Ok(LoopSummary::caught_up());
            }
        }
    }

    let mut summary = LoopSummary::new(if cursor.is_some() {
        LoopState::Resuming
    } else {
        LoopState::Backfilling
    });
    let mut idle_rounds = 0u32;
    let mut first_cycle = true;
    let support_since = source_config.support_since && caps.since_param;

    loop {
        summary.cycles += 1;
        let now = Utc::now();
        let window = if first_cycle {
            planner::initial_kdata_window(
                level,
                cursor.as_ref(),
                source_config.kdata_limit,
                support_since,
                now,
            )
        } else {
            planner::resume_kdata_window(level, support_since, now)
        };
        first_cycle = false;

        let mut delay = source_config.safe_sleep();

        match source.fetch_candles(&security.name, level, window).await {
            Ok(raw) => {
                let outcome = merge::merge_kdata(security, level, &raw, cursor.as_ref(), now);
                if let Some(gap) = &outcome.gap {
                    warn!(from = %gap.from, to = %gap.to, "kdata 간극 감지");
                    summary.gaps += 1;
                }
                if outcome.malformed > 0 {
                    warn!(count = outcome.malformed, "깨진 캔들을 건너뛰었습니다");
                    summary.malformed += outcome.malformed;
                }

                if outcome.rows.is_empty() {
                    idle_rounds += 1;
                } else {
                    match store.append_merge(security, level, &outcome.rows) {
                        Ok(appended) => {
                            summary.rows_appended += appended;
                            if let Some(index) = index {
                                let index_name = SearchIndex::kdata_index_name(security, level);
                                if let Err(e) =
                                    index.bulk_upsert_kdata(&index_name, &outcome.rows).await
                                {
                                    warn!(error = %e, "인덱스 push 실패, 로컬 저장은 유지됩니다");
                                }
                            }
                            // 커서는 저장이 끝난 뒤에만 전진한다
                            cursor = outcome.cursor;
                            idle_rounds = 0;
                            if summary.state == LoopState::Backfilling {
                                summary.state = LoopState::Resuming;
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "저장 실패, 이번 배치를 버리고 다음 사이클에 다시 받습니다");
                        }
                    }
                }

                if outcome.caught_up {
                    info!(rows = summary.rows_appended, "일봉이 오늘까지 따라잡았습니다");
                    summary.state = LoopState::CaughtUp;
                } else if idle_rounds >= recording.idle_rounds_to_stop {
                    info!(rounds = idle_rounds, "연속 무수확으로 수집을 멈춥니다");
                    summary.state = LoopState::CaughtUp;
                }
            }
            Err(e) if e.is_fatal() => {
                error!(error = %e, "복구 불가 소스 에러로 수집을 멈춥니다");
                summary.state = LoopState::Failed;
            }
            Err(e) => {
                if let Some(retry_ms) = e.retry_delay_ms() {
                    delay = delay.max(Duration::from_millis(retry_ms));
                }
                warn!(
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "조회 실패, 쉬었다가 재시도합니다"
                );
            }
        }

        if summary.state == LoopState::CaughtUp || summary.state == LoopState::Failed {
            break;
        }

        tokio::time::sleep(delay).await;
    }

    Ok(summary)
}

/// 한 증권의 tick 수집 루프 실행.
///
/// 날짜 경계에서 미뤄진 체결은 다음 사이클에 조회 없이 먼저 처리합니다.
pub async fn run_tick_loop(
    source: &dyn MarketDataSource,
    store: &TickStore,
    security: &Security,
    source_config: &SourceConfig,
    recording: &RecordingConfig,
) -> Result<LoopSummary> {
    let caps = source.capabilities();
    if !caps.trades {
        error!(source = source.name(), "소스가 체결 조회를 지원하지 않습니다");
        return Ok(LoopSummary::failed());
    }

    let mut cursor = store.latest_cursor(security)?;
    let mut summary = LoopSummary::new(if cursor.is_some() {
        LoopState::Resuming
    } else {
        LoopState::Backfilling
    });
    let mut idle_rounds = 0u32;
    let mut first_fetch = true;
    let mut pending: Vec<RawTrade> = Vec::new();

    loop {
        summary.cycles += 1;
        let mut delay = source_config.safe_sleep();

        // 미뤄진 체결이 있으면 조회 대신 그것부터 처리
        let raw = if pending.is_empty() {
            let limit = if first_fetch {
                planner::initial_tick_limit(source_config.tick_limit)
            } else {
                planner::resume_tick_limit()
            };
            first_fetch = false;
            match source.fetch_trades(&security.name, limit).await {
                Ok(raw) => raw,
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "복구 불가 소스 에러로 수집을 멈춥니다");
                    summary.state = LoopState::Failed;
                    break;
                }
                Err(e) => {
                    if let Some(retry_ms) = e.retry_delay_ms() {
                        delay = delay.max(Duration::from_millis(retry_ms));
                    }
                    warn!(
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "조회 실패, 쉬었다가 재시도합니다"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
            }
        } else {
            std::mem::take(&mut pending)
        };

        let outcome = merge::merge_ticks(security, raw, cursor.as_ref());
        if let Some(gap) = &outcome.gap {
            warn!(from = %gap.from, to = %gap.to, "tick 간극 감지");
            summary.gaps += 1;
        }
        if outcome.malformed > 0 {
            warn!(count = outcome.malformed, "깨진 체결을 건너뛰었습니다");
            summary.malformed += outcome.malformed;
        }

        if outcome.rows.is_empty() {
            pending = outcome.deferred;
            idle_rounds += 1;
        } else {
            let date = outcome.rows[0].trade_date();
            match store.append_day(security, date, &outcome.rows) {
                Ok(appended) => {
                    summary.rows_appended += appended;
                    debug!(date = %date, appended, "tick 저장 완료");
                    // 커서는 저장이 끝난 뒤에만 전진한다
                    cursor = outcome.cursor;
                    pending = outcome.deferred;
                    idle_rounds = 0;
                    if summary.state == LoopState::Backfilling {
                        summary.state = LoopState::Resuming;
                    }
                }
                Err(e) => {
                    error!(error = %e, "저장 실패, 이번 배치를 버리고 다음 사이클에 다시 받습니다");
                }
            }
        }

        if idle_rounds >= recording.idle_rounds_to_stop && pending.is_empty() {
            info!(rounds = idle_rounds, "연속 무수확으로 수집을 멈춥니다");
            summary.state = LoopState::CaughtUp;
            break;
        }

        tokio::time::sleep(delay).await;
    }

    Ok(summary)
}

/// 저장 파일의 기존 kdata를 인덱스에 다시 밀어 넣는다.
async fn reindex_history(
    store: &KdataStore,
    index: &SearchIndex,
    security: &Security,
    level: Level,
) -> Result<usize> {
    let rows = store.load(security, level)?;
    if rows.is_empty() {
        return Ok(0);
    }
    let index_name = SearchIndex::kdata_index_name(security, level);
    Ok(index.bulk_upsert_kdata(&index_name, &rows).await?)
}

/// 커서 다음 날이 오늘인지 확인 (일봉 사전 확인용).
fn next_day_is_today(cursor_ts: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    cursor_ts.date_naive().succ_opt() == Some(now.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_next_day_is_today() {
        let yesterday = Utc.with_ymd_and_hms(2018, 1, 9, 0, 0, 0).unwrap();
        let two_days_ago = Utc.with_ymd_and_hms(2018, 1, 8, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2018, 1, 10, 12, 0, 0).unwrap();

        assert!(next_day_is_today(yesterday, now));
        assert!(!next_day_is_today(two_days_ago, now));
        assert!(!next_day_is_today(now, now));
    }

    #[test]
    fn test_loop_state_display() {
        assert_eq!(LoopState::Backfilling.to_string(), "backfilling");
        assert_eq!(LoopState::CaughtUp.to_string(), "caught_up");
    }
}
