//! 조회 범위 계획.
//!
//! 커서와 현재 시각으로 이번 사이클에 몇 개의 캔들을 요청할지 정합니다.
//! 재조회 구간을 `OVERLAP_MARGIN`만큼 겹치게 잡아 경계 유실을 막고,
//! 첫 사이클 이후에는 작은 재개 한도로 줄여 호출을 가볍게 유지합니다.

use chrono::{DateTime, Utc};
use recorder_core::{KdataCursor, Level};
use recorder_exchange::FetchWindow;
use tracing::warn;

/// 커서 이후 구간을 다시 받을 때 겹쳐 받는 캔들 수.
pub const OVERLAP_MARGIN: u32 = 10;

/// 첫 사이클 이후의 kdata 재개 한도.
pub const KDATA_RESUME_LIMIT: u32 = 10;

/// 첫 사이클 이후의 tick 재개 한도.
pub const TICK_RESUME_LIMIT: u32 = 500;

/// 커서에서 지금까지 지난 봉 수 추정.
pub fn estimate_bars_to_now(level: Level, cursor: &KdataCursor, now: DateTime<Utc>) -> u32 {
    let elapsed_ms = now.timestamp_millis().saturating_sub(cursor.timestamp_ms());
    if elapsed_ms <= 0 {
        return 0;
    }
    (elapsed_ms / level.interval_ms()).min(u32::MAX as i64) as u32
}

/// 첫 사이클의 kdata 조회 범위.
///
/// 커서가 있으면 남은 구간 추정치에 겹침을 더하고 설정 한도로 자릅니다.
/// 커서가 없으면(콜드 스타트) 설정 한도 전체를 요청합니다.
pub fn initial_kdata_window(
    level: Level,
    cursor: Option<&KdataCursor>,
    configured_limit: u32,
    support_since: bool,
    now: DateTime<Utc>,
) -> FetchWindow {
    let limit = match cursor {
        Some(cursor) => {
            let estimate = estimate_bars_to_now(level, cursor, now);
            if estimate > configured_limit {
                warn!(
                    level = %level,
                    estimate,
                    limit = configured_limit,
                    "남은 구간이 조회 한도를 넘습니다, 여러 사이클에 걸쳐 따라잡습니다"
                );
            }
            estimate.saturating_add(OVERLAP_MARGIN).min(configured_limit)
        }
        None => configured_limit,
    };

    kdata_window(level, limit, support_since, now)
}

/// 첫 사이클 이후의 kdata 조회 범위.
pub fn resume_kdata_window(level: Level, support_since: bool, now: DateTime<Utc>) -> FetchWindow {
    kdata_window(level, KDATA_RESUME_LIMIT, support_since, now)
}

/// 첫 사이클의 tick 조회 한도.
pub fn initial_tick_limit(configured_limit: u32) -> u32 {
    configured_limit
}

/// 첫 사이클 이후의 tick 조회 한도.
pub fn resume_tick_limit() -> u32 {
    TICK_RESUME_LIMIT
}

/// 한도에서 조회 범위 구성. 소스가 지원하면 시작 시각을 계산해 넣습니다.
fn kdata_window(level: Level, limit: u32, support_since: bool, now: DateTime<Utc>) -> FetchWindow {
    if support_since {
        let since_ms = now.timestamp_millis() - level.interval_ms() * i64::from(limit);
        FetchWindow::since(limit, since_ms)
    } else {
        FetchWindow::with_limit(limit)
    }
}
