//! 분류 엔진 포트.
//!
//! 추론 자체는 외부 엔진의 책임이다. 코어는 전처리된 정사각 이미지를 넘기고
//! 레이블만 받는다.

use async_trait::async_trait;
use image::RgbaImage;

use crate::error::CoreError;
use crate::models::recognition::Classification;

/// 이미지 분류 엔진
#[async_trait]
pub trait ClassificationEngine: Send + Sync {
    /// 전처리된 이미지 분류
    async fn classify(&self, image: RgbaImage) -> Result<Classification, CoreError>;

    /// 엔진 이름 (예: "mobilenet-v2")
    fn engine_name(&self) -> &str;
}
