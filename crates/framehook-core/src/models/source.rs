//! 소스 종류.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 시각 소스 종류 (닫힌 집합)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    /// 정지 이미지
    StillImage,
    /// 라이브 비디오 (디코더가 프레임을 공급)
    LiveVideo,
    /// 그리기 표면 (캔버스, 화면)
    Surface,
    /// 읽을 수 없는 종류: 캡처 시 설정 에러
    Unsupported(String),
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::StillImage => write!(f, "still-image"),
            SourceKind::LiveVideo => write!(f, "live-video"),
            SourceKind::Surface => write!(f, "surface"),
            SourceKind::Unsupported(kind) => write!(f, "unsupported({kind})"),
        }
    }
}
