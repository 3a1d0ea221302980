//! 환경변수 기반 설정 모듈.
//!
//! 소스/증권 설정은 `RecorderConfig`(설정 파일)가 담당하고,
//! 이 모듈은 collector 프로세스 자체의 동작만 환경변수로 제어합니다.

use std::time::Duration;

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 레코더 설정 파일 경로
    pub config_path: String,
    /// 수집 루프 설정
    pub recording: RecordingConfig,
    /// 데몬 모드 설정
    pub daemon: DaemonConfig,
}

/// 수집 루프 설정
#[derive(Debug, Clone)]
pub struct RecordingConfig {
    /// 연속 무수확 주기 허용 횟수 (이후 해당 증권은 따라잡음 처리)
    pub idle_rounds_to_stop: u32,
}

/// 데몬 모드 설정
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// 워크플로우 실행 주기 (분 단위)
    pub interval_minutes: u64,
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            config_path: std::env::var("RECORDER_CONFIG")
                .unwrap_or_else(|_| "config/default.toml".to_string()),
            recording: RecordingConfig {
                idle_rounds_to_stop: env_var_parse("RECORDER_IDLE_ROUNDS", 3),
            },
            daemon: DaemonConfig {
                interval_minutes: env_var_parse("DAEMON_INTERVAL_MINUTES", 60),
            },
        }
    }
}

impl DaemonConfig {
    /// 워크플로우 실행 주기를 Duration으로 반환
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
