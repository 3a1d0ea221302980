//! 증분 수집 커서.
//!
//! 커서는 저장소에 남아 있는 마지막 레코드에서 매 실행 시 다시 계산되며,
//! 프로세스 재시작 간에 별도로 캐시하지 않습니다.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// 캔들 수집 재개 지점.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdataCursor {
    /// 저장된 마지막 봉 시작 시간
    pub timestamp: DateTime<Utc>,
}

impl KdataCursor {
    /// 새 커서를 생성합니다.
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self { timestamp }
    }

    /// 커서 시간을 epoch 밀리초로 반환합니다.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

/// 틱 수집 재개 지점.
///
/// 틱은 같은 타임스탬프를 공유할 수 있으므로, 시간 비교만으로는
/// 중복을 가려낼 수 없습니다. `seen_ids`가 타이브레이커 역할을 합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickCursor {
    /// 저장된 마지막 체결 시간
    pub timestamp: DateTime<Utc>,
    /// 이미 저장된 체결 id 집합
    pub seen_ids: HashSet<String>,
}

impl TickCursor {
    /// 새 커서를 생성합니다.
    pub fn new(timestamp: DateTime<Utc>, seen_ids: HashSet<String>) -> Self {
        Self {
            timestamp,
            seen_ids,
        }
    }

    /// 이미 저장된 체결인지 확인합니다.
    pub fn contains(&self, trade_id: &str) -> bool {
        self.seen_ids.contains(trade_id)
    }
}
