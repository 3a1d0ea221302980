//! Standalone incremental market data recorder.
//!
//! 이 crate는 거래소 시장 데이터를 증분 수집하는 바이너리를 제공합니다:
//! - 마켓(거래쌍) 목록 동기화 및 증권 디렉터리 초기화
//! - kdata(캔들) 증분 수집: 겹침 재조회 → 병합 → 저장 → 인덱스 push
//! - tick(체결) 증분 수집: id/시간 기반 중복 제거, 일자별 저장
//!
//! 수집 파이프라인은 계획(planner) → 병합(merge) → 루프(driver) →
//! 워크플로우(modules)로 나뉘며, 저장소가 유일한 진실 소스입니다.

pub mod config;
pub mod driver;
pub mod error;
pub mod merge;
pub mod modules;
pub mod planner;
pub mod stats;

pub use config::CollectorConfig;
pub use error::{CollectorError, Result};
pub use stats::RecordingStats;
