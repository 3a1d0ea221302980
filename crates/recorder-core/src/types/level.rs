//! 캔들 데이터 수집 레벨(봉 주기) 정의.
//!
//! 이 모듈은 수집과 저장 경로에서 사용되는 봉 주기 타입을 정의합니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 캔들 수집 레벨.
///
/// 저장 경로에는 `1min`/`day` 형태의 이름을, 데이터 소스 요청에는
/// `1m`/`1d` 형태의 타임프레임 문자열을 사용합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    /// 1분봉
    #[serde(rename = "1min")]
    Min1,
    /// 5분봉
    #[serde(rename = "5min")]
    Min5,
    /// 15분봉
    #[serde(rename = "15min")]
    Min15,
    /// 30분봉
    #[serde(rename = "30min")]
    Min30,
    /// 60분봉
    #[serde(rename = "60min")]
    Min60,
    /// 일봉
    #[serde(rename = "day")]
    Day,
}

impl Level {
    /// 이 레벨의 한 봉 주기를 밀리초로 반환합니다.
    pub fn interval_ms(&self) -> i64 {
        match self {
            Level::Min1 => 60 * 1000,
            Level::Min5 => 5 * 60 * 1000,
            Level::Min15 => 15 * 60 * 1000,
            Level::Min30 => 30 * 60 * 1000,
            Level::Min60 => 60 * 60 * 1000,
            Level::Day => 24 * 60 * 60 * 1000,
        }
    }

    /// 이 레벨의 기간을 반환합니다.
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.interval_ms() as u64)
    }

    /// 일봉 레벨인지 확인합니다.
    pub fn is_day(&self) -> bool {
        matches!(self, Level::Day)
    }

    /// 저장 경로에 사용하는 이름을 반환합니다.
    pub fn storage_name(&self) -> &'static str {
        match self {
            Level::Min1 => "1min",
            Level::Min5 => "5min",
            Level::Min15 => "15min",
            Level::Min30 => "30min",
            Level::Min60 => "60min",
            Level::Day => "day",
        }
    }

    /// 데이터 소스 타임프레임 문자열로 변환합니다.
    pub fn to_timeframe(&self) -> &'static str {
        match self {
            Level::Min1 => "1m",
            Level::Min5 => "5m",
            Level::Min15 => "15m",
            Level::Min30 => "30m",
            Level::Min60 => "1h",
            Level::Day => "1d",
        }
    }

    /// 타임프레임 문자열에서 파싱합니다.
    pub fn from_timeframe(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(Level::Min1),
            "5m" => Some(Level::Min5),
            "15m" => Some(Level::Min15),
            "30m" => Some(Level::Min30),
            "1h" => Some(Level::Min60),
            "1d" => Some(Level::Day),
            _ => None,
        }
    }

    /// 저장 이름에서 파싱합니다.
    pub fn from_storage_name(s: &str) -> Option<Self> {
        match s {
            "1min" => Some(Level::Min1),
            "5min" => Some(Level::Min5),
            "15min" => Some(Level::Min15),
            "30min" => Some(Level::Min30),
            "60min" => Some(Level::Min60),
            "day" => Some(Level::Day),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.storage_name())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_storage_name(s)
            .or_else(|| Self::from_timeframe(s))
            .ok_or_else(|| format!("Invalid level: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_interval() {
        assert_eq!(Level::Min1.interval_ms(), 60_000);
        assert_eq!(Level::Min60.interval_ms(), 3_600_000);
        assert_eq!(Level::Day.interval_ms(), 86_400_000);
    }

    #[test]
    fn test_level_timeframe() {
        assert_eq!(Level::Min5.to_timeframe(), "5m");
        assert_eq!(Level::from_timeframe("1d"), Some(Level::Day));
        assert_eq!(Level::from_timeframe("2h"), None);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!("day".parse::<Level>().unwrap(), Level::Day);
        assert_eq!("1min".parse::<Level>().unwrap(), Level::Min1);
        // 타임프레임 표기도 허용
        assert_eq!("15m".parse::<Level>().unwrap(), Level::Min15);
        assert!("2min".parse::<Level>().is_err());
    }

    #[test]
    fn test_level_display() {
        assert_eq!(Level::Day.to_string(), "day");
        assert_eq!(Level::Min60.to_string(), "60min");
    }
}
