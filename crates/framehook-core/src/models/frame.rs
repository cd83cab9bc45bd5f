//! 프레임 모델.
//!
//! 소스 어댑터가 캡처할 때마다 새로 만드는 디코딩된 픽셀 데이터.
//! 한 틱 안의 모든 트리거가 같은 인스턴스를 공유하므로 수정하지 않는다.

use chrono::{DateTime, Utc};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 소스의 원본 픽셀 크기
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 넓이가 0인지 여부
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// 캡처된 프레임 (불변)
///
/// 크롭/필터는 항상 파생 복사본을 만든다. 틱이 끝나면 버려진다.
/// 픽셀 버퍼는 `Arc`로 공유하므로 복제해도 픽셀을 복사하지 않는다.
#[derive(Debug, Clone)]
pub struct Frame {
    image: Arc<RgbaImage>,
    /// 오케스트레이터 기준 캡처 순번 (0부터 1씩 증가)
    pub frame_num: u64,
    /// 캡처 시각
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    /// 새 프레임 생성
    pub fn new(image: RgbaImage, frame_num: u64) -> Self {
        Self {
            image: Arc::new(image),
            frame_num,
            captured_at: Utc::now(),
        }
    }

    /// 픽셀 데이터 (읽기 전용)
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// 프레임 크기
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.image.width(), self.image.height())
    }

    /// 순번을 다시 매긴 프레임 (소스가 만든 프레임에 오케스트레이터 순번 부여)
    pub fn renumbered(mut self, frame_num: u64) -> Self {
        self.frame_num = frame_num;
        self
    }
}
