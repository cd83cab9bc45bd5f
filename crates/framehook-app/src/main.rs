//! # framehook-app
//!
//! FRAMEHOOK 바이너리 진입점.
//! 설정 로드, 소스/워커 풀/트리거 조립, 스케줄링 시작, 종료 처리.

mod lifecycle;
mod wiring;

use anyhow::{Context, Result};
use clap::Parser;
use framehook_core::config::{AppConfig, Discipline};
use framehook_core::config_manager::ConfigManager;
use framehook_vision::orchestrator::Orchestrator;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::lifecycle::LifecycleManager;

/// 프레임 소스에 트리거를 걸어 크롭/OCR 결과를 받아보는 도구
#[derive(Parser, Debug)]
#[command(name = "framehook")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리의 config.json)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// 입력 경로 (이미지 파일 또는 ffmpeg 입력). source.path를 덮어씀
    #[arg(long, short = 'i')]
    input: Option<String>,

    /// 스케줄링 방식 (once, debounced, interval, realtime, auto)
    #[arg(long, short = 'd')]
    discipline: Option<String>,

    /// interval 방식 대기 시간 (밀리초)
    #[arg(long)]
    interval_ms: Option<u64>,

    /// 인식 워커 수
    #[arg(long, short = 'w')]
    workers: Option<usize>,

    /// 크롭/전처리 단계 이미지를 저장할 디렉토리. scheduler.debug_dir를 덮어씀
    #[arg(long)]
    debug_dir: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,
}

/// CLI 인자로 설정 덮어쓰기
fn apply_overrides(config: &mut AppConfig, args: &Args) -> Result<()> {
    if let Some(input) = &args.input {
        config.source.path = Some(input.clone());
    }
    if let Some(discipline) = &args.discipline {
        config.scheduler.discipline = parse_discipline(discipline)?;
    }
    if let Some(interval_ms) = args.interval_ms {
        config.scheduler.interval_ms = interval_ms;
    }
    if let Some(workers) = args.workers {
        config.workers.num_workers = workers;
    }
    if let Some(dir) = &args.debug_dir {
        config.scheduler.debug_dir = Some(dir.clone());
    }
    Ok(())
}

fn parse_discipline(value: &str) -> Result<Discipline> {
    serde_json::from_value(serde_json::Value::String(value.to_lowercase()))
        .with_context(|| format!("알 수 없는 스케줄링 방식: {value}"))
}

fn load_config(path: Option<PathBuf>) -> Result<AppConfig> {
    let manager = match path {
        Some(path) => ConfigManager::with_path(path)?,
        None => ConfigManager::new()?,
    };
    info!("설정 파일: {}", manager.config_path().display());
    Ok(manager.get())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_filter = format!(
        "framehook={},framehook_app={},framehook_core={},framehook_vision={}",
        args.log_level, args.log_level, args.log_level, args.log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .init();

    info!("FRAMEHOOK 시작");

    let mut config = load_config(args.config.clone())?;
    apply_overrides(&mut config, &args)?;
    config.validate().context("설정 검증 실패")?;
    debug!("적용된 설정: {}", serde_json::to_string(&config)?);

    // ── 조립 ──
    let wiring::SourceHandle {
        source,
        mut decoder,
    } = wiring::build_source(&config.source).await?;
    let pool = wiring::build_pool(&config).await?;

    let orchestrator = Orchestrator::with_config(Arc::new(source), &config.scheduler);
    let registered = wiring::register_triggers(&orchestrator, &config, pool.as_ref()).await?;
    if registered == 0 {
        warn!("등록된 트리거 없음");
    }

    // ── 실행 ──
    let lifecycle = LifecycleManager::new();
    let once = config.scheduler.discipline == Discipline::Once;
    let result = wiring::launch(&orchestrator, &config).await;

    let (loop_handle, outcome) = match result {
        Ok(handle) => {
            let outcome = if once {
                Ok(())
            } else {
                info!("실행 중 (Ctrl+C로 종료)");
                lifecycle.wait_for_signal().await.map(|reason| {
                    debug!(?reason, "스케줄링 정지");
                })
            };
            (handle, outcome)
        }
        Err(e) => (None, Err(e)),
    };

    // ── 종료 ──
    orchestrator.stop();
    if let Some(handle) = loop_handle {
        if let Err(e) = handle.await {
            warn!("스케줄링 태스크 종료 실패: {e}");
        }
    }
    if let Some(decoder) = decoder.as_mut() {
        if let Err(e) = decoder.stop() {
            warn!("ffmpeg 디코더 종료 실패: {e}");
        }
    }
    if let Some(pool) = pool {
        pool.shutdown();
    }

    info!("FRAMEHOOK 종료");
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["framehook"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn overrides_replace_config_values() {
        let mut config = AppConfig::default();
        let args = args(&[
            "--input",
            "frame.png",
            "--discipline",
            "Interval",
            "--interval-ms",
            "250",
            "--workers",
            "4",
        ]);
        apply_overrides(&mut config, &args).unwrap();

        assert_eq!(config.source.path.as_deref(), Some("frame.png"));
        assert_eq!(config.scheduler.discipline, Discipline::Interval);
        assert_eq!(config.scheduler.interval_ms, 250);
        assert_eq!(config.workers.num_workers, 4);
    }

    #[test]
    fn debug_dir_override() {
        let mut config = AppConfig::default();
        apply_overrides(&mut config, &args(&["--debug-dir", "/tmp/steps"])).unwrap();
        assert_eq!(config.scheduler.debug_dir, Some(PathBuf::from("/tmp/steps")));
    }

    #[test]
    fn no_overrides_keeps_defaults() {
        let mut config = AppConfig::default();
        apply_overrides(&mut config, &args(&[])).unwrap();
        assert_eq!(config.scheduler.discipline, Discipline::Once);
        assert_eq!(config.source.path, None);
    }

    #[test]
    fn unknown_discipline_rejected() {
        let mut config = AppConfig::default();
        assert!(apply_overrides(&mut config, &args(&["--discipline", "hourly"])).is_err());
    }

    #[test]
    fn zero_workers_fails_validation() {
        let mut config = AppConfig::default();
        apply_overrides(&mut config, &args(&["--workers", "0"])).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_config_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = load_config(Some(path.clone())).unwrap();
        assert!(path.exists());
        assert_eq!(config.workers.num_workers, 2);
    }
}
