//! 애플리케이션 설정 구조체.
//!
//! 소스, 스케줄러, 워커 풀, 트리거 목록 등 런타임 설정을 정의한다.
//! `ConfigManager`가 JSON 파일에서 로드/저장한다.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::CoreError;
use crate::models::filter::ThresholdFilter;
use crate::models::frame::Dimensions;
use crate::models::region::CropSpec;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 입력 소스 설정
    #[serde(default)]
    pub source: SourceConfig,
    /// 스케줄링 설정
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// 인식 워커 풀 설정
    #[serde(default)]
    pub workers: WorkerPoolConfig,
    /// 트리거 목록 (목록 순서 = 순차 실행 순서)
    #[serde(default)]
    pub triggers: Vec<TriggerConfig>,
}

impl AppConfig {
    /// 설정값 유효성 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.workers.num_workers == 0 {
            return Err(CoreError::Configuration(
                "workers.num_workers는 1 이상이어야 함".to_string(),
            ));
        }
        if self.scheduler.interval_ms == 0 {
            return Err(CoreError::Configuration(
                "scheduler.interval_ms는 0일 수 없음".to_string(),
            ));
        }
        if self.scheduler.refresh_hz == 0 {
            return Err(CoreError::Configuration(
                "scheduler.refresh_hz는 0일 수 없음".to_string(),
            ));
        }
        if self.source.fps <= 0.0 {
            return Err(CoreError::Configuration(
                "source.fps는 양수여야 함".to_string(),
            ));
        }
        for trigger in self.triggers.iter().filter(|t| t.enabled) {
            if trigger.kind != TriggerConfigKind::Classification {
                continue;
            }
            match &trigger.classifier {
                None => {
                    return Err(CoreError::Configuration(format!(
                        "분류 트리거 '{}'에 classifier 설정이 없음",
                        trigger.title
                    )))
                }
                Some(c) if c.input_side == 0 => {
                    return Err(CoreError::Configuration(format!(
                        "분류 트리거 '{}'의 input_side는 0일 수 없음",
                        trigger.title
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// 인식 트리거가 하나라도 있는지 (워커 풀 필요 여부)
    pub fn needs_worker_pool(&self) -> bool {
        self.triggers
            .iter()
            .any(|t| t.enabled && t.kind == TriggerConfigKind::Recognition)
    }
}

// ============================================================
// 소스 설정
// ============================================================

/// 입력 소스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// 소스 종류 ("image", "video", "screen", "canvas"). 그 외는 미지원 소스로 취급
    #[serde(default = "default_source_kind")]
    pub kind: String,
    /// 이미지 파일 경로 또는 ffmpeg 입력 (`-i`)
    #[serde(default)]
    pub path: Option<String>,
    /// ffmpeg 실행 파일
    #[serde(default = "default_ffmpeg_exe")]
    pub ffmpeg_exe: String,
    /// ffmpeg 입력 포맷 (`-f`, 예: "lavfi", "gdigrab")
    #[serde(default)]
    pub input_format: Option<String>,
    /// 비디오 샘플링 프레임레이트
    #[serde(default = "default_fps")]
    pub fps: f64,
    /// 디코딩 출력 크기 (비디오) 또는 캔버스 크기. 비디오에서 None이면 ffmpeg 로그에서 파싱
    #[serde(default)]
    pub size: Option<Dimensions>,
    /// 화면 캡처 모니터 인덱스 (None이면 주 모니터)
    #[serde(default)]
    pub monitor: Option<usize>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: default_source_kind(),
            path: None,
            ffmpeg_exe: default_ffmpeg_exe(),
            input_format: None,
            fps: default_fps(),
            size: None,
            monitor: None,
        }
    }
}

fn default_source_kind() -> String {
    "image".to_string()
}

fn default_ffmpeg_exe() -> String {
    "ffmpeg".to_string()
}

fn default_fps() -> f64 {
    2.0
}

// ============================================================
// 스케줄러 설정
// ============================================================

/// 스케줄링 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Discipline {
    /// 한 번 실행
    #[default]
    Once,
    /// 조용해진 뒤 한 번 실행
    Debounced,
    /// 실행 완료 후 간격만큼 대기하고 반복
    Interval,
    /// 화면 갱신 주기에 맞춰 반복
    Realtime,
    /// 소스 변경 알림에 맞춰 실행
    Auto,
}

/// 한 틱 안에서 트리거 실행 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// 모든 트리거를 동시에 시작하고 전부 끝날 때까지 대기
    #[default]
    FanOut,
    /// 목록 순서대로 하나씩 (워커 풀 같은 공유 자원을 쓸 때)
    Sequential,
}

/// 스케줄러 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub discipline: Discipline,
    /// Interval 방식 대기 시간 (밀리초)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Debounced 방식 대기 시간 (밀리초)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Realtime 방식 갱신 주파수
    #[serde(default = "default_refresh_hz")]
    pub refresh_hz: u32,
    #[serde(default)]
    pub execution: ExecutionMode,
    /// 설정하면 트리거마다 크롭/전처리 단계 이미지를 이 디렉토리에 PNG로 저장
    #[serde(default)]
    pub debug_dir: Option<PathBuf>,
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// 갱신 주기 (refresh_hz 기준)
    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.refresh_hz.max(1) as f64)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            discipline: Discipline::default(),
            interval_ms: default_interval_ms(),
            debounce_ms: default_debounce_ms(),
            refresh_hz: default_refresh_hz(),
            execution: ExecutionMode::default(),
            debug_dir: None,
        }
    }
}

fn default_interval_ms() -> u64 {
    1_000
}

fn default_debounce_ms() -> u64 {
    250
}

fn default_refresh_hz() -> u32 {
    60
}

// ============================================================
// 워커 풀 설정
// ============================================================

/// 인식 워커 풀 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    /// 요청 워커 수 (1 이상)
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    /// 인식 언어 (Tesseract 언어 코드)
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    /// traineddata 디렉토리 (None이면 시스템 기본값)
    #[serde(default)]
    pub tessdata_path: Option<PathBuf>,
    /// 워커별 엔진 초기화 옵션 (Tesseract 변수 등)
    #[serde(default)]
    pub init_options: BTreeMap<String, String>,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            num_workers: default_num_workers(),
            languages: default_languages(),
            tessdata_path: None,
            init_options: BTreeMap::new(),
        }
    }
}

fn default_num_workers() -> usize {
    2
}

fn default_languages() -> Vec<String> {
    vec!["eng".to_string()]
}

// ============================================================
// 트리거 설정
// ============================================================

/// 설정 파일로 만들 수 있는 트리거 종류
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerConfigKind {
    /// 프레임 정보만 로그
    #[default]
    Plain,
    /// 크롭 → 필터 → OCR
    Recognition,
    /// 크롭 → 정사각 리사이즈 → 분류 모델
    Classification,
}

/// 분류 트리거의 모델 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// 모델 파일 경로 (ONNX)
    pub model: PathBuf,
    /// 클래스 인덱스 순서의 레이블. 비어 있으면 인덱스를 레이블로 사용
    #[serde(default)]
    pub labels: Vec<String>,
    /// 모델 입력 변 길이
    #[serde(default = "default_input_side")]
    pub input_side: u32,
}

fn default_input_side() -> u32 {
    224
}

/// 트리거 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// 트리거 ID (None이면 UUID 생성)
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub kind: TriggerConfigKind,
    #[serde(default)]
    pub crop: CropSpec,
    #[serde(default)]
    pub filter: Option<ThresholdFilter>,
    /// 분류 트리거 전용
    #[serde(default)]
    pub classifier: Option<ClassifierConfig>,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            id: None,
            title: String::new(),
            enabled: true,
            kind: TriggerConfigKind::default(),
            crop: CropSpec::default(),
            filter: None,
            classifier: None,
        }
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn empty_json_uses_defaults() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.source.kind, "image");
        assert_eq!(config.source.ffmpeg_exe, "ffmpeg");
        assert_eq!(config.scheduler.discipline, Discipline::Once);
        assert_eq!(config.scheduler.execution, ExecutionMode::FanOut);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn trigger_config_parsing() {
        let json = r#"{
            "triggers": [
                {"title": "점수", "kind": "recognition",
                 "crop": {"x": 80, "y": 35, "width": 10, "height": 29, "x_unit": "percent",
                          "y_unit": "percent", "width_unit": "percent", "height_unit": "percent"},
                 "filter": {"r": 255, "g": 255, "b": 255, "threshold": 42}},
                {"title": "로그", "enabled": false}
            ]
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.triggers.len(), 2);
        assert_eq!(config.triggers[0].kind, TriggerConfigKind::Recognition);
        assert_eq!(config.triggers[0].filter.unwrap().threshold, 42);
        assert!(config.triggers[0].enabled);
        assert!(!config.triggers[1].enabled);
        assert!(config.needs_worker_pool());
    }

    #[test]
    fn disabled_recognition_does_not_need_pool() {
        let mut config = AppConfig::default();
        config.triggers.push(TriggerConfig {
            enabled: false,
            kind: TriggerConfigKind::Recognition,
            ..TriggerConfig::default()
        });
        assert!(!config.needs_worker_pool());
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let mut config = AppConfig::default();
        config.workers.num_workers = 0;
        assert_matches!(config.validate(), Err(CoreError::Configuration(_)));
    }

    #[test]
    fn validate_rejects_zero_refresh() {
        let mut config = AppConfig::default();
        config.scheduler.refresh_hz = 0;
        assert_matches!(config.validate(), Err(CoreError::Configuration(_)));
    }

    #[test]
    fn classification_trigger_parsing() {
        let json = r#"{
            "scheduler": {"debug_dir": "/tmp/framehook-steps"},
            "triggers": [
                {"id": "hero", "kind": "classification",
                 "classifier": {"model": "models/hero.onnx", "labels": ["none", "hero"]}}
            ]
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        let classifier = config.triggers[0].classifier.as_ref().unwrap();
        assert_eq!(config.triggers[0].kind, TriggerConfigKind::Classification);
        assert_eq!(classifier.model, PathBuf::from("models/hero.onnx"));
        assert_eq!(classifier.input_side, 224);
        assert_eq!(
            config.scheduler.debug_dir,
            Some(PathBuf::from("/tmp/framehook-steps"))
        );
        assert!(!config.needs_worker_pool());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn classification_without_model_is_rejected() {
        let mut config = AppConfig::default();
        config.triggers.push(TriggerConfig {
            title: "hero".to_string(),
            kind: TriggerConfigKind::Classification,
            ..TriggerConfig::default()
        });
        assert_matches!(config.validate(), Err(CoreError::Configuration(msg)) if msg.contains("hero"));

        config.triggers[0].classifier = Some(ClassifierConfig {
            model: PathBuf::from("m.onnx"),
            labels: Vec::new(),
            input_side: 0,
        });
        assert_matches!(config.validate(), Err(CoreError::Configuration(_)));

        config.triggers[0].enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn refresh_period_from_hz() {
        let config = SchedulerConfig {
            refresh_hz: 50,
            ..SchedulerConfig::default()
        };
        assert_eq!(config.refresh_period(), Duration::from_millis(20));
    }
}
