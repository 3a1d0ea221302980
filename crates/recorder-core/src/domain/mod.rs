//! 수집 도메인 모델.
//!
//! 이 모듈은 레코더가 다루는 데이터 구조를 정의합니다:
//! - `Security` - 수집 대상 증권
//! - `KdataRow` - 캔들 레코드
//! - `TickRow` - 체결 틱 레코드
//! - `KdataCursor` / `TickCursor` - 증분 수집 재개 지점

pub mod cursor;
pub mod kdata;
pub mod security;
pub mod tick;

pub use cursor::{KdataCursor, TickCursor};
pub use kdata::KdataRow;
pub use security::{Security, SecurityType};
pub use tick::{side_to_direction, TickRow};
