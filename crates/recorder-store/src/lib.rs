//! 레코더 로컬 저장소.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 저장 경로 계약 (모든 파일 위치의 단일 기준)
//! - 증권 목록/메타 저장소
//! - kdata CSV 저장소 (커서 조회, 병합 추가)
//! - tick CSV 저장소 (일 단위 파일, id 중복 제거)
//! - 검색 인덱스 어댑터 (best-effort bulk upsert)
//!
//! 모든 쓰기는 임시 파일에 기록한 뒤 원자적으로 교체합니다.

pub mod contract;
pub mod error;
pub mod index;
pub mod kdata;
pub mod securities;
pub mod tick;

pub use error::{Result, StoreError};
pub use index::SearchIndex;
pub use kdata::KdataStore;
pub use securities::SecurityStore;
pub use tick::TickStore;
