//! # Recorder Core
//!
//! 시장 데이터 레코더의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 수집 시스템 전반에서 사용되는 기본 타입을 제공합니다:
//! - 증권(수집 대상) 식별 타입
//! - 캔들(kdata) 및 체결 틱 레코드
//! - 수집 레벨(봉 주기) 정의
//! - 증분 수집 커서
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use logging::*;
pub use types::*;
