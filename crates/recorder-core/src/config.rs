//! 설정 관리.
//!
//! 이 모듈은 레코더 설정을 정의하고 관리합니다. 설정은 시작 시 한 번
//! 로드되어 불변 구조체로 각 컴포넌트에 전달됩니다.

use crate::types::Level;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// 레코더 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecorderConfig {
    /// 플랫 파일 저장소 루트 디렉토리
    pub data_dir: String,
    /// 검색 인덱스 설정
    #[serde(default)]
    pub index: IndexConfig,
    /// 데이터 소스 설정
    pub sources: HashMap<String, SourceConfig>,
}

/// 검색 인덱스 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    /// 인덱스 적재 활성화 여부
    pub enabled: bool,
    /// 인덱스 서버 기본 URL
    #[serde(default)]
    pub base_url: String,
    /// 요청 타임아웃 (초)
    #[serde(default = "default_index_timeout")]
    pub timeout_secs: u64,
    /// bulk 요청당 레코드 수
    #[serde(default = "default_bulk_size")]
    pub bulk_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
            timeout_secs: default_index_timeout(),
            bulk_size: default_bulk_size(),
        }
    }
}

/// 데이터 소스 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// 이 소스 활성화 여부
    pub enabled: bool,
    /// API 키 (공개 엔드포인트에는 없어도 됨)
    #[serde(default)]
    pub api_key: String,
    /// API 시크릿
    #[serde(default)]
    pub api_secret: String,
    /// HTTP 프록시 URL
    #[serde(default)]
    pub proxy: Option<String>,
    /// 요청 타임아웃 (초)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// 캔들 요청당 최대 레코드 수
    #[serde(default = "default_kdata_limit")]
    pub kdata_limit: u32,
    /// 틱 요청당 최대 레코드 수
    #[serde(default = "default_tick_limit")]
    pub tick_limit: u32,
    /// 연속 호출 사이의 대기 시간 (밀리초)
    #[serde(default = "default_safe_sleep_ms")]
    pub safe_sleep_ms: u64,
    /// since 파라미터 사용 여부
    #[serde(default)]
    pub support_since: bool,
    /// 수집할 페어 목록 (예: "EOS/USDT")
    #[serde(default)]
    pub pairs: Vec<String>,
    /// 수집할 캔들 레벨 목록
    #[serde(default = "default_levels")]
    pub levels: Vec<Level>,
}

impl SourceConfig {
    /// 연속 호출 사이의 대기 시간을 Duration으로 반환합니다.
    pub fn safe_sleep(&self) -> Duration {
        Duration::from_millis(self.safe_sleep_ms)
    }
}

fn default_index_timeout() -> u64 {
    10
}
fn default_bulk_size() -> usize {
    500
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_kdata_limit() -> u32 {
    500
}
fn default_tick_limit() -> u32 {
    500
}
fn default_safe_sleep_ms() -> u64 {
    1000
}
fn default_levels() -> Vec<Level> {
    vec![Level::Day]
}

impl RecorderConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            // 기본값으로 시작
            .set_default("data_dir", "./data")?
            // 파일에서 로드
            .add_source(config::File::from(path.as_ref()))
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("RECORDER")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load("config/default.toml")
    }

    /// 활성화된 소스를 이름순으로 반환합니다.
    pub fn enabled_sources(&self) -> Vec<(&str, &SourceConfig)> {
        let mut sources: Vec<_> = self
            .sources
            .iter()
            .filter(|(_, cfg)| cfg.enabled)
            .map(|(name, cfg)| (name.as_str(), cfg))
            .collect();
        sources.sort_by_key(|(name, _)| *name);
        sources
    }

    /// 이름으로 소스 설정을 조회합니다.
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.get(name)
    }
}
