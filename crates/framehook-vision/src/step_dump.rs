//! 파이프라인 단계 이미지 덤프.
//!
//! 트리거가 만든 중간 이미지(크롭, 전처리 결과)를 PNG로 남겨서
//! 크롭 좌표나 필터 값을 눈으로 확인할 수 있게 한다.
//! 구조: `<dir>/<trigger_id>/<frame_num:06>-<step>.png`

use image::{ImageFormat, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

/// 크롭 직후
pub const STEP_CROP: &str = "crop";
/// 엔진에 넘기기 직전
pub const STEP_PREPARED: &str = "prepared";

/// 단계 이미지 저장소
#[derive(Debug, Clone)]
pub struct StepDump {
    dir: PathBuf,
}

impl StepDump {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 단계 이미지 경로. 트리거 ID의 경로 구분자 등은 `_`로 바꾼다.
    pub fn path_for(&self, trigger_id: &str, frame_num: u64, step: &str) -> PathBuf {
        let folder: String = trigger_id
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir
            .join(folder)
            .join(format!("{frame_num:06}-{step}.png"))
    }

    /// PNG 저장 (블로킹 I/O). 실패는 로그만 남긴다.
    pub fn save(&self, trigger_id: &str, frame_num: u64, step: &str, image: &RgbaImage) {
        let path = self.path_for(trigger_id, frame_num, step);
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("덤프 디렉토리 생성 실패 ({}): {}", parent.display(), e);
                return;
            }
        }
        match image.save_with_format(&path, ImageFormat::Png) {
            Ok(()) => trace!(
                "단계 이미지 저장: {} ({}x{})",
                path.display(),
                image.width(),
                image.height()
            ),
            Err(e) => warn!("단계 이미지 저장 실패 ({}): {}", path.display(), e),
        }
    }
}
