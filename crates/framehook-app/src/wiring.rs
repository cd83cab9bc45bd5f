//! 설정 → 런타임 객체 조립.
//!
//! 소스, 워커 풀, 분류 엔진, 트리거를 만들고 오케스트레이터에 연결한다.

use anyhow::{Context, Result};
use framehook_core::config::{
    AppConfig, Discipline, SourceConfig, TriggerConfig, TriggerConfigKind,
};
use framehook_core::models::frame::Dimensions;
use framehook_core::ports::classifier::ClassificationEngine;
use framehook_vision::ffmpeg::{spawn_decoder, FfmpegDecoder, FfmpegInput};
use framehook_vision::orchestrator::Orchestrator;
use framehook_vision::source::{DrawableSurface, Source, StillImageSource, VideoSource};
use framehook_vision::step_dump::StepDump;
use framehook_vision::trigger::Trigger;
use framehook_vision::worker_pool::WorkerPool;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 캔버스 크기 미지정 시 기본값
const DEFAULT_CANVAS_SIZE: Dimensions = Dimensions {
    width: 640,
    height: 480,
};

/// 조립된 소스와 (비디오일 때) 디코더
pub struct SourceHandle {
    pub source: Source,
    pub decoder: Option<FfmpegDecoder>,
}

/// 설정의 `source.kind`에 맞는 소스 생성
pub async fn build_source(config: &SourceConfig) -> Result<SourceHandle> {
    let (source, decoder) = match config.kind.as_str() {
        "image" => {
            let still = StillImageSource::new();
            match &config.path {
                Some(path) => {
                    let dims = still
                        .load(path)
                        .await
                        .with_context(|| format!("이미지 로드 실패: {path}"))?;
                    info!("이미지 소스: {} ({}x{})", path, dims.width, dims.height);
                }
                None => warn!("이미지 경로 없음: 로드 전까지 캡처 불가"),
            }
            (Source::from(still), None)
        }
        "video" => {
            let video = VideoSource::new();
            let input = FfmpegInput::from_config(config)?;
            let decoder = spawn_decoder(&input, video.clone())?;
            (Source::from(video), Some(decoder))
        }
        "screen" => (Source::from(DrawableSurface::screen(config.monitor)), None),
        "canvas" => {
            let size = config.size.unwrap_or(DEFAULT_CANVAS_SIZE);
            (
                Source::from(DrawableSurface::canvas(size.width, size.height)),
                None,
            )
        }
        other => {
            warn!("지원하지 않는 소스 종류: {}", other);
            (Source::unsupported(other), None)
        }
    };
    Ok(SourceHandle { source, decoder })
}

/// 인식 트리거가 있을 때만 워커 풀 초기화
#[cfg(feature = "ocr")]
pub async fn build_pool(config: &AppConfig) -> Result<Option<Arc<WorkerPool>>> {
    use framehook_vision::ocr::TesseractFactory;

    if !config.needs_worker_pool() {
        return Ok(None);
    }
    let pool = WorkerPool::initialize(config.workers.clone(), Arc::new(TesseractFactory::new()))
        .await
        .context("인식 워커 풀 초기화 실패")?;
    Ok(Some(pool))
}

#[cfg(not(feature = "ocr"))]
pub async fn build_pool(config: &AppConfig) -> Result<Option<Arc<WorkerPool>>> {
    if config.needs_worker_pool() {
        warn!("ocr feature 없이 빌드됨: 인식 트리거는 건너뜀");
    }
    Ok(None)
}

/// 분류 트리거 하나의 ONNX 모델 로드
#[cfg(feature = "onnx")]
pub async fn build_classifier(
    trigger: &TriggerConfig,
) -> Result<Option<Arc<dyn ClassificationEngine>>> {
    use framehook_vision::classifier::ModelClassifier;
    use framehook_vision::onnx::OnnxModel;

    let Some(classifier) = trigger.classifier.clone() else {
        return Ok(None);
    };
    let name = format!("onnx:{}", classifier.model.display());
    let model = tokio::task::spawn_blocking(move || {
        OnnxModel::load(&classifier.model, classifier.input_side)
            .map(|model| (model, classifier.labels))
    })
    .await
    .context("모델 로드 작업 실패")?
    .with_context(|| format!("분류 트리거 '{}' 모델 로드 실패", trigger.title))?;

    let (model, labels) = model;
    let engine: Arc<dyn ClassificationEngine> =
        Arc::new(ModelClassifier::new(name, Box::new(model), labels));
    Ok(Some(engine))
}

#[cfg(not(feature = "onnx"))]
pub async fn build_classifier(
    trigger: &TriggerConfig,
) -> Result<Option<Arc<dyn ClassificationEngine>>> {
    warn!(
        "onnx feature 없이 빌드됨: 분류 트리거 '{}'는 건너뜀",
        trigger.title
    );
    Ok(None)
}

/// 설정의 트리거 목록을 오케스트레이터에 등록. 등록된 개수 반환
///
/// 워커 풀이나 분류 엔진을 만들 수 없는 트리거는 경고 후 건너뛴다.
/// `scheduler.debug_dir`가 있으면 모든 트리거에 단계 이미지 덤프를 붙인다.
pub async fn register_triggers(
    orchestrator: &Orchestrator,
    config: &AppConfig,
    pool: Option<&Arc<WorkerPool>>,
) -> Result<usize> {
    let dump = config.scheduler.debug_dir.as_ref().map(|dir| {
        info!("단계 이미지 덤프: {}", dir.display());
        Arc::new(StepDump::new(dir))
    });

    let mut registered = 0;
    for trigger_config in &config.triggers {
        if trigger_config.kind == TriggerConfigKind::Recognition && pool.is_none() {
            warn!("트리거 '{}' 건너뜀: 워커 풀 없음", trigger_config.title);
            continue;
        }
        let engine = match trigger_config.kind {
            TriggerConfigKind::Classification if trigger_config.enabled => {
                match build_classifier(trigger_config).await? {
                    Some(engine) => Some(engine),
                    None => continue,
                }
            }
            TriggerConfigKind::Classification => {
                debug!("비활성 분류 트리거 '{}' 건너뜀", trigger_config.title);
                continue;
            }
            _ => None,
        };

        let mut trigger = Trigger::from_config(trigger_config, pool, engine)?;
        if let Some(dump) = &dump {
            if trigger_config.kind != TriggerConfigKind::Plain {
                trigger = trigger.with_step_dump(dump.clone());
            }
        }
        let trigger = match trigger_config.kind {
            TriggerConfigKind::Plain => trigger.on_frame(|frame| {
                let dims = frame.dimensions();
                info!(
                    "프레임 #{} ({}x{})",
                    frame.frame_num, dims.width, dims.height
                );
                Ok(())
            }),
            TriggerConfigKind::Recognition => {
                let title = trigger_config.title.clone();
                trigger.on_text(move |output| {
                    info!("[{}] #{}: {}", title, output.frame_num, output.text);
                    Ok(())
                })
            }
            TriggerConfigKind::Classification => {
                let title = trigger_config.title.clone();
                trigger.on_label(move |output| {
                    info!(
                        "[{}] #{}: {} ({:.2})",
                        title,
                        output.frame_num,
                        output.classification.label,
                        output.classification.confidence
                    );
                    Ok(())
                })
            }
        };

        let trigger = orchestrator.add_trigger(trigger);
        info!("트리거 등록: {} ({})", trigger.id(), trigger.title());
        registered += 1;
    }
    Ok(registered)
}

/// 설정된 스케줄링 방식 시작
///
/// `Once`는 한 번 실행하고 끝나며 에러를 그대로 돌려준다.
pub async fn launch(
    orchestrator: &Orchestrator,
    config: &AppConfig,
) -> Result<Option<JoinHandle<()>>> {
    let scheduler = &config.scheduler;
    let handle = match scheduler.discipline {
        Discipline::Once => {
            let report = orchestrator.run().await?;
            info!(
                "1회 실행 완료: 프레임 #{}, 트리거 {}개, {:?}",
                report.frame_num, report.triggers_run, report.elapsed
            );
            None
        }
        Discipline::Debounced => Some(orchestrator.run_debounced(scheduler.debounce())),
        Discipline::Interval => Some(orchestrator.run_on_interval(scheduler.interval())),
        Discipline::Realtime => Some(orchestrator.run_realtime()),
        Discipline::Auto => Some(orchestrator.auto_run()),
    };
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use framehook_core::config::ClassifierConfig;
    use framehook_core::models::source::SourceKind;
    use framehook_core::ports::source::SourceAdapter;

    #[tokio::test]
    async fn unknown_kind_builds_unsupported_source() {
        let config = SourceConfig {
            kind: "webcam".to_string(),
            ..SourceConfig::default()
        };
        let handle = build_source(&config).await.unwrap();
        assert_eq!(
            handle.source.kind(),
            SourceKind::Unsupported("webcam".to_string())
        );
        assert!(handle.decoder.is_none());
    }

    #[tokio::test]
    async fn canvas_uses_configured_size() {
        let config = SourceConfig {
            kind: "canvas".to_string(),
            size: Some(Dimensions::new(320, 200)),
            ..SourceConfig::default()
        };
        let handle = build_source(&config).await.unwrap();
        assert_eq!(handle.source.dimensions(), Some(Dimensions::new(320, 200)));
    }

    #[tokio::test]
    async fn image_without_path_is_not_ready() {
        let handle = build_source(&SourceConfig::default()).await.unwrap();
        assert_eq!(handle.source.kind(), SourceKind::StillImage);
        assert_eq!(handle.source.dimensions(), None);
    }

    #[tokio::test]
    async fn missing_image_file_fails() {
        let config = SourceConfig {
            path: Some("/nonexistent/frame.png".to_string()),
            ..SourceConfig::default()
        };
        assert!(build_source(&config).await.is_err());
    }

    #[tokio::test]
    async fn video_without_path_fails() {
        let config = SourceConfig {
            kind: "video".to_string(),
            ..SourceConfig::default()
        };
        assert!(build_source(&config).await.is_err());
    }

    #[tokio::test]
    async fn recognition_triggers_skipped_without_pool() {
        let source = Arc::new(Source::from(DrawableSurface::canvas(8, 8)));
        let orchestrator = Orchestrator::new(source);
        let config = AppConfig {
            triggers: vec![
                TriggerConfig {
                    id: Some("plain".to_string()),
                    title: "plain".to_string(),
                    kind: TriggerConfigKind::Plain,
                    ..TriggerConfig::default()
                },
                TriggerConfig {
                    id: Some("ocr".to_string()),
                    title: "ocr".to_string(),
                    kind: TriggerConfigKind::Recognition,
                    ..TriggerConfig::default()
                },
            ],
            ..AppConfig::default()
        };

        let registered = register_triggers(&orchestrator, &config, None).await.unwrap();
        assert_eq!(registered, 1);
        assert_eq!(orchestrator.triggers()[0].id(), "plain");
    }

    #[cfg(not(feature = "onnx"))]
    #[tokio::test]
    async fn classification_skipped_without_onnx_feature() {
        let orchestrator = Orchestrator::new(Arc::new(Source::from(DrawableSurface::canvas(8, 8))));
        let config = AppConfig {
            triggers: vec![TriggerConfig {
                title: "hero".to_string(),
                kind: TriggerConfigKind::Classification,
                classifier: Some(ClassifierConfig {
                    model: "/nonexistent/hero.onnx".into(),
                    labels: Vec::new(),
                    input_side: 224,
                }),
                ..TriggerConfig::default()
            }],
            ..AppConfig::default()
        };

        assert_eq!(register_triggers(&orchestrator, &config, None).await.unwrap(), 0);
        assert!(orchestrator.triggers().is_empty());
    }

    #[cfg(feature = "onnx")]
    #[tokio::test]
    async fn missing_model_fails_registration() {
        let orchestrator = Orchestrator::new(Arc::new(Source::from(DrawableSurface::canvas(8, 8))));
        let config = AppConfig {
            triggers: vec![TriggerConfig {
                title: "hero".to_string(),
                kind: TriggerConfigKind::Classification,
                classifier: Some(ClassifierConfig {
                    model: "/nonexistent/hero.onnx".into(),
                    labels: Vec::new(),
                    input_side: 224,
                }),
                ..TriggerConfig::default()
            }],
            ..AppConfig::default()
        };

        assert!(register_triggers(&orchestrator, &config, None).await.is_err());
    }

    #[tokio::test]
    async fn debug_dir_dumps_recognition_steps() {
        use framehook_core::config::WorkerPoolConfig;
        use framehook_core::error::CoreError;
        use framehook_core::ports::recognizer::{RecognitionWorker, WorkerFactory};
        use image::RgbaImage;

        struct EchoWorker;

        impl RecognitionWorker for EchoWorker {
            fn recognize(&mut self, _image: &RgbaImage) -> Result<String, CoreError> {
                Ok("ok".to_string())
            }
        }

        struct EchoFactory;

        impl WorkerFactory for EchoFactory {
            fn create(
                &self,
                _index: usize,
                _config: &WorkerPoolConfig,
            ) -> Result<Box<dyn RecognitionWorker>, CoreError> {
                Ok(Box::new(EchoWorker))
            }

            fn engine_name(&self) -> &str {
                "echo"
            }
        }

        let dir = tempfile::TempDir::new().unwrap();
        let pool = WorkerPool::initialize(
            WorkerPoolConfig {
                num_workers: 1,
                ..WorkerPoolConfig::default()
            },
            Arc::new(EchoFactory),
        )
        .await
        .unwrap();
        let orchestrator = Orchestrator::new(Arc::new(Source::from(DrawableSurface::canvas(16, 16))));
        let mut config = AppConfig {
            triggers: vec![TriggerConfig {
                id: Some("score".to_string()),
                kind: TriggerConfigKind::Recognition,
                ..TriggerConfig::default()
            }],
            ..AppConfig::default()
        };
        config.scheduler.debug_dir = Some(dir.path().to_path_buf());

        register_triggers(&orchestrator, &config, Some(&pool)).await.unwrap();
        orchestrator.run().await.unwrap();

        let step = StepDump::new(dir.path());
        assert!(step.path_for("score", 0, "crop").is_file());
        assert!(step.path_for("score", 0, "prepared").is_file());
        pool.shutdown();
    }

    #[tokio::test]
    async fn once_runs_immediately() {
        let source = Arc::new(Source::from(DrawableSurface::canvas(8, 8)));
        let orchestrator = Orchestrator::new(source);
        orchestrator.add_trigger(Trigger::plain());

        let handle = launch(&orchestrator, &AppConfig::default()).await.unwrap();
        assert!(handle.is_none());
        assert!(!orchestrator.is_running());
    }

    #[tokio::test]
    async fn once_on_unsupported_source_fails() {
        let orchestrator = Orchestrator::new(Arc::new(Source::unsupported("webcam")));
        assert!(launch(&orchestrator, &AppConfig::default()).await.is_err());
    }
}
