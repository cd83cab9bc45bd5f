//! 임계값 필터 설정.
//!
//! 지정 색상과의 지각적 색차(ΔE)로 이진화하는 필터 파라미터.
//! 실제 픽셀 연산은 `framehook-vision::transform`에 있다.

use serde::{Deserialize, Serialize};

/// 색차 기반 임계값 필터
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdFilter {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// ΔE가 이 값 이상이면 흰색, 미만이면 검은색
    pub threshold: u8,
}

impl ThresholdFilter {
    pub fn new(r: u8, g: u8, b: u8, threshold: u8) -> Self {
        Self { r, g, b, threshold }
    }
}
