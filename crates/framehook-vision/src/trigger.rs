//! 트리거.
//!
//! 프레임마다 실행되는 사용자 작업. 종류는 닫힌 집합(`TriggerKind`)이다:
//! - `Plain`: 프레임을 그대로 콜백에 전달
//! - `Recognition`: 크롭 → 전처리 → 워커 풀 OCR → 텍스트 콜백
//! - `Classification`: 크롭 → 정사각 리사이즈 → 분류 엔진 → 레이블 콜백
//!
//! 크롭과 전처리는 `spawn_blocking`에서 실행해서 런타임 스레드를 막지 않는다.
//! 인식/분류 실패는 트리거 경계에서 `warn!`으로 기록하고 넘어간다.
//! 콜백 자체의 에러는 잡지 않고 `CoreError::Callback`으로 돌려준다.

use framehook_core::config::{TriggerConfig, TriggerConfigKind};
use framehook_core::error::{BoxError, CoreError};
use framehook_core::models::filter::ThresholdFilter;
use framehook_core::models::frame::Frame;
use framehook_core::models::recognition::{
    Classification, ClassificationOutput, RecognitionOutput,
};
use framehook_core::models::region::{CropSpec, Region};
use framehook_core::ports::classifier::ClassificationEngine;
use image::RgbaImage;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::region::resolve_for_frame;
use crate::step_dump::{StepDump, STEP_CROP, STEP_PREPARED};
use crate::transform::{self, CLASSIFIER_INPUT_SIDE};
use crate::worker_pool::WorkerPool;

/// 콜백 반환 타입
pub type CallbackResult = Result<(), BoxError>;

pub type FrameCallback = Arc<dyn Fn(&Frame) -> CallbackResult + Send + Sync>;
pub type RecognitionCallback = Arc<dyn Fn(RecognitionOutput) -> CallbackResult + Send + Sync>;
pub type ClassificationCallback =
    Arc<dyn Fn(ClassificationOutput) -> CallbackResult + Send + Sync>;

/// 트리거 종류
pub enum TriggerKind {
    Plain {
        callback: Option<FrameCallback>,
    },
    Recognition {
        crop: CropSpec,
        filter: Option<ThresholdFilter>,
        pool: Arc<WorkerPool>,
        callback: Option<RecognitionCallback>,
    },
    Classification {
        crop: CropSpec,
        engine: Arc<dyn ClassificationEngine>,
        /// 분류 입력 변 길이
        input_side: u32,
        callback: Option<ClassificationCallback>,
    },
}

impl TriggerKind {
    fn name(&self) -> &'static str {
        match self {
            TriggerKind::Plain { .. } => "plain",
            TriggerKind::Recognition { .. } => "recognition",
            TriggerKind::Classification { .. } => "classification",
        }
    }
}

/// 등록 가능한 트리거
pub struct Trigger {
    id: String,
    title: String,
    enabled: AtomicBool,
    kind: TriggerKind,
    dump: Option<Arc<StepDump>>,
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("enabled", &self.is_enabled())
            .field("kind", &self.kind.name())
            .finish()
    }
}

impl Trigger {
    fn new(kind: TriggerKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: String::new(),
            enabled: AtomicBool::new(true),
            kind,
            dump: None,
        }
    }

    /// 프레임 전달 트리거
    pub fn plain() -> Self {
        Self::new(TriggerKind::Plain { callback: None })
    }

    /// OCR 트리거 (기본 크롭 = 전체 프레임)
    pub fn recognition(pool: Arc<WorkerPool>) -> Self {
        Self::new(TriggerKind::Recognition {
            crop: CropSpec::default(),
            filter: None,
            pool,
            callback: None,
        })
    }

    /// 분류 트리거 (입력 224x224)
    pub fn classification(engine: Arc<dyn ClassificationEngine>) -> Self {
        Self::new(TriggerKind::Classification {
            crop: CropSpec::default(),
            engine,
            input_side: CLASSIFIER_INPUT_SIDE,
            callback: None,
        })
    }

    /// 설정에서 생성. 인식 트리거는 워커 풀이, 분류 트리거는 엔진이 있어야 한다.
    pub fn from_config(
        config: &TriggerConfig,
        pool: Option<&Arc<WorkerPool>>,
        engine: Option<Arc<dyn ClassificationEngine>>,
    ) -> Result<Self, CoreError> {
        let trigger = match config.kind {
            TriggerConfigKind::Plain => Self::plain(),
            TriggerConfigKind::Recognition => {
                let pool = pool.ok_or_else(|| {
                    CoreError::Configuration(format!(
                        "인식 트리거 '{}'에 워커 풀이 없음",
                        config.title
                    ))
                })?;
                let mut trigger = Self::recognition(pool.clone()).with_crop(config.crop);
                if let Some(filter) = config.filter {
                    trigger = trigger.with_filter(filter);
                }
                trigger
            }
            TriggerConfigKind::Classification => {
                let engine = engine.ok_or_else(|| {
                    CoreError::Configuration(format!(
                        "분류 트리거 '{}'에 분류 엔진이 없음",
                        config.title
                    ))
                })?;
                let mut trigger = Self::classification(engine).with_crop(config.crop);
                if let Some(classifier) = &config.classifier {
                    trigger = trigger.with_input_side(classifier.input_side);
                }
                trigger
            }
        };

        let mut trigger = trigger.with_title(config.title.clone());
        if let Some(id) = &config.id {
            trigger = trigger.with_id(id.clone());
        }
        if !config.enabled {
            trigger = trigger.disabled();
        }
        Ok(trigger)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// 크롭 지정 (Plain 트리거는 무시)
    pub fn with_crop(mut self, new_crop: CropSpec) -> Self {
        match &mut self.kind {
            TriggerKind::Recognition { crop, .. } | TriggerKind::Classification { crop, .. } => {
                *crop = new_crop
            }
            TriggerKind::Plain { .. } => self.ignored("with_crop"),
        }
        self
    }

    pub fn with_filter(mut self, new_filter: ThresholdFilter) -> Self {
        match &mut self.kind {
            TriggerKind::Recognition { filter, .. } => *filter = Some(new_filter),
            _ => self.ignored("with_filter"),
        }
        self
    }

    /// 분류 입력 변 길이
    pub fn with_input_side(mut self, side: u32) -> Self {
        match &mut self.kind {
            TriggerKind::Classification { input_side, .. } => *input_side = side,
            _ => self.ignored("with_input_side"),
        }
        self
    }

    pub fn on_frame<F>(mut self, f: F) -> Self
    where
        F: Fn(&Frame) -> CallbackResult + Send + Sync + 'static,
    {
        match &mut self.kind {
            TriggerKind::Plain { callback } => *callback = Some(Arc::new(f)),
            _ => self.ignored("on_frame"),
        }
        self
    }

    pub fn on_text<F>(mut self, f: F) -> Self
    where
        F: Fn(RecognitionOutput) -> CallbackResult + Send + Sync + 'static,
    {
        match &mut self.kind {
            TriggerKind::Recognition { callback, .. } => *callback = Some(Arc::new(f)),
            _ => self.ignored("on_text"),
        }
        self
    }

    pub fn on_label<F>(mut self, f: F) -> Self
    where
        F: Fn(ClassificationOutput) -> CallbackResult + Send + Sync + 'static,
    {
        match &mut self.kind {
            TriggerKind::Classification { callback, .. } => *callback = Some(Arc::new(f)),
            _ => self.ignored("on_label"),
        }
        self
    }

    /// 크롭/전처리 단계 이미지를 `dump`에 저장 (Plain 트리거는 무시)
    pub fn with_step_dump(mut self, dump: Arc<StepDump>) -> Self {
        match self.kind {
            TriggerKind::Plain { .. } => self.ignored("with_step_dump"),
            _ => self.dump = Some(dump),
        }
        self
    }

    /// 비활성 상태로 생성
    pub fn disabled(self) -> Self {
        self.enabled.store(false, Ordering::SeqCst);
        self
    }

    fn ignored(&self, setter: &str) {
        warn!(
            "트리거 {} ({}): {} 설정은 이 종류에 해당 없음",
            self.id,
            self.kind.name(),
            setter
        );
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn kind(&self) -> &TriggerKind {
        &self.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// 프레임 하나에 대해 실행
    ///
    /// 인식/분류 실패는 로그만 남기고 `Ok(())`. 콜백 에러만 전파된다.
    pub async fn run(&self, frame: &Frame) -> Result<(), CoreError> {
        match &self.kind {
            TriggerKind::Plain { callback } => match callback {
                Some(cb) => cb(frame).map_err(CoreError::Callback),
                None => Ok(()),
            },
            TriggerKind::Recognition {
                crop,
                filter,
                pool,
                callback,
            } => {
                let started = Instant::now();
                let text = match self.recognize(frame, crop, filter.as_ref(), pool).await {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("트리거 {} 인식 실패 (프레임 #{}): {}", self.id, frame.frame_num, e);
                        return Ok(());
                    }
                };
                let output = RecognitionOutput {
                    trigger_id: self.id.clone(),
                    text,
                    elapsed: started.elapsed(),
                    frame_num: frame.frame_num,
                };
                debug!(
                    "트리거 {} 인식 결과: {:?} ({:?})",
                    self.id, output.text, output.elapsed
                );
                match callback {
                    Some(cb) => cb(output).map_err(CoreError::Callback),
                    None => Ok(()),
                }
            }
            TriggerKind::Classification {
                crop,
                engine,
                input_side,
                callback,
            } => {
                let started = Instant::now();
                let classification =
                    match self.classify(frame, crop, engine.as_ref(), *input_side).await {
                        Ok(c) => c,
                        Err(e) => {
                            warn!(
                                "트리거 {} 분류 실패 (프레임 #{}): {}",
                                self.id, frame.frame_num, e
                            );
                            return Ok(());
                        }
                    };
                let output = ClassificationOutput {
                    trigger_id: self.id.clone(),
                    classification,
                    elapsed: started.elapsed(),
                    frame_num: frame.frame_num,
                };
                debug!(
                    "트리거 {} 분류 결과: {} ({:.2})",
                    self.id, output.classification.label, output.classification.confidence
                );
                match callback {
                    Some(cb) => cb(output).map_err(CoreError::Callback),
                    None => Ok(()),
                }
            }
        }
    }

    async fn recognize(
        &self,
        frame: &Frame,
        crop: &CropSpec,
        filter: Option<&ThresholdFilter>,
        pool: &WorkerPool,
    ) -> Result<String, CoreError> {
        let region = resolve_for_frame(crop, frame);
        if region.is_empty() {
            return Err(CoreError::Recognition(format!("빈 크롭 영역: {region:?}")));
        }
        let filter = filter.copied();
        let prepared = self
            .prepare(frame, region, move |cropped| {
                transform::prepare_for_ocr(cropped, filter.as_ref())
            })
            .await?;
        let text = pool.submit(prepared).await?;
        Ok(text.trim().to_string())
    }

    async fn classify(
        &self,
        frame: &Frame,
        crop: &CropSpec,
        engine: &dyn ClassificationEngine,
        side: u32,
    ) -> Result<Classification, CoreError> {
        let region = resolve_for_frame(crop, frame);
        if region.is_empty() {
            return Err(CoreError::Classification(format!(
                "빈 크롭 영역: {region:?}"
            )));
        }
        let prepared = self
            .prepare(frame, region, move |cropped| {
                transform::prepare_for_classification(cropped, side)
            })
            .await?;
        engine.classify(prepared).await
    }

    /// 크롭 후 `step`으로 전처리 (블로킹 스레드). 덤프가 있으면 단계 이미지를 남긴다.
    async fn prepare<F>(&self, frame: &Frame, region: Region, step: F) -> Result<RgbaImage, CoreError>
    where
        F: FnOnce(&RgbaImage) -> Result<RgbaImage, CoreError> + Send + 'static,
    {
        let frame = frame.clone();
        let dump = self.dump.clone();
        let id = self.id.clone();
        tokio::task::spawn_blocking(move || {
            let cropped = transform::crop(frame.image(), region);
            if let Some(dump) = &dump {
                dump.save(&id, frame.frame_num, STEP_CROP, &cropped);
            }
            let prepared = step(&cropped)?;
            if let Some(dump) = &dump {
                dump.save(&id, frame.frame_num, STEP_PREPARED, &prepared);
            }
            Ok(prepared)
        })
        .await
        .map_err(|e| CoreError::Internal(format!("전처리 작업 실패: {e}")))?
    }
}
