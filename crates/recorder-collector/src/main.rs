//! Standalone market data recorder CLI.

use clap::{Parser, Subcommand};
use recorder_collector::{modules, CollectorConfig};
use recorder_core::logging::{init_logging, LogConfig, LogFormat};
use recorder_core::{Level, RecorderConfig};

#[derive(Parser)]
#[command(name = "recorder-collector")]
#[command(about = "Incremental Market Data Recorder", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 마켓 목록 동기화 및 증권 카탈로그 초기화
    InitMarkets,

    /// kdata(캔들) 증분 수집
    RecordKdata {
        /// 특정 소스만 수집 (예: "binance")
        #[arg(long)]
        source: Option<String>,

        /// 특정 코드만 수집 (쉼표로 구분, 예: "BTC-USDT,EOS-USDT")
        #[arg(long)]
        codes: Option<String>,

        /// 특정 레벨만 수집 (예: "day", "1min")
        #[arg(long)]
        level: Option<Level>,
    },

    /// tick(체결) 증분 수집
    RecordTicks {
        /// 특정 소스만 수집 (예: "binance")
        #[arg(long)]
        source: Option<String>,

        /// 특정 코드만 수집 (쉼표로 구분)
        #[arg(long)]
        codes: Option<String>,
    },

    /// 전체 워크플로우 실행 (마켓 동기화 → kdata → tick)
    RunAll,

    /// 데몬 모드: 주기적으로 전체 워크플로우 실행
    Daemon,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 로깅 초기화 (RUST_LOG가 있으면 그것이 우선)
    let level_filter = format!(
        "recorder_collector={0},recorder_exchange={0},recorder_store={0},recorder_core={0}",
        cli.log_level
    );
    let format = std::env::var("LOG_FORMAT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LogFormat::Compact);
    init_logging(LogConfig::new(level_filter).with_format(format))?;

    tracing::info!("Market Data Recorder 시작");

    // 설정 로드
    let collector = CollectorConfig::from_env();
    let recorder = RecorderConfig::load(&collector.config_path)?;
    tracing::debug!(
        config_path = %collector.config_path,
        data_dir = %recorder.data_dir,
        sources = recorder.enabled_sources().len(),
        "설정 로드 완료"
    );

    // 명령 실행
    match cli.command {
        Commands::InitMarkets => {
            let stats = modules::sync_markets(&recorder).await?;
            stats.log_summary("마켓 동기화");
        }
        Commands::RecordKdata {
            source,
            codes,
            level,
        } => {
            let stats = modules::record_kdata(&recorder, &collector, source, codes, level).await?;
            stats.log_summary("kdata 수집");
        }
        Commands::RecordTicks { source, codes } => {
            let stats = modules::record_ticks(&recorder, &collector, source, codes).await?;
            stats.log_summary("tick 수집");
        }
        Commands::RunAll => {
            tracing::info!("=== 전체 워크플로우 시작 ===");

            // 1. 마켓 동기화
            tracing::info!("Step 1/3: 마켓 동기화");
            let sync_stats = modules::sync_markets(&recorder).await?;
            sync_stats.log_summary("마켓 동기화");

            // 2. kdata 수집
            tracing::info!("Step 2/3: kdata 수집");
            let kdata_stats = modules::record_kdata(&recorder, &collector, None, None, None).await?;
            kdata_stats.log_summary("kdata 수집");

            // 3. tick 수집
            tracing::info!("Step 3/3: tick 수집");
            let tick_stats = modules::record_ticks(&recorder, &collector, None, None).await?;
            tick_stats.log_summary("tick 수집");

            tracing::info!("=== 전체 워크플로우 완료 ===");
        }
        Commands::Daemon => {
            tracing::info!(
                "=== 데몬 모드 시작 (주기: {}분) ===",
                collector.daemon.interval_minutes
            );

            let mut interval = tokio::time::interval(collector.daemon.interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("종료 신호 수신, 데몬 종료 중...");
                        break;
                    }
                    _ = interval.tick() => {
                        tracing::info!("=== 워크플로우 실행 시작 ===");

                        // 1. 마켓 동기화
                        match modules::sync_markets(&recorder).await {
                            Ok(stats) => {
                                stats.log_summary("마켓 동기화");
                            }
                            Err(e) => {
                                tracing::error!("마켓 동기화 실패: {}", e);
                            }
                        }

                        // 2. kdata 수집
                        match modules::record_kdata(&recorder, &collector, None, None, None).await {
                            Ok(stats) => {
                                stats.log_summary("kdata 수집");
                            }
                            Err(e) => {
                                tracing::error!("kdata 수집 실패: {}", e);
                            }
                        }

                        // 3. tick 수집
                        match modules::record_ticks(&recorder, &collector, None, None).await {
                            Ok(stats) => {
                                stats.log_summary("tick 수집");
                            }
                            Err(e) => {
                                tracing::error!("tick 수집 실패: {}", e);
                            }
                        }

                        tracing::info!(
                            "=== 워크플로우 완료, 다음 실행: {}분 후 ===",
                            collector.daemon.interval_minutes
                        );
                    }
                }
            }
        }
    }

    tracing::info!("Market Data Recorder 종료");

    Ok(())
}
