//! 소스 어댑터.
//!
//! 닫힌 소스 종류 집합(`Source`)이 `SourceAdapter` 포트를 구현한다.
//! 종류별 동작은 variant 태그로 분기한다.

mod still;
mod surface;
mod video;

pub use still::StillImageSource;
pub use surface::DrawableSurface;
pub use video::VideoSource;

use framehook_core::error::CoreError;
use framehook_core::models::frame::{Dimensions, Frame};
use framehook_core::models::source::SourceKind;
use framehook_core::ports::source::SourceAdapter;
use tokio::sync::watch;

/// 시각 소스
#[derive(Clone)]
pub enum Source {
    StillImage(StillImageSource),
    LiveVideo(VideoSource),
    Surface(DrawableSurface),
    /// 읽을 수 없는 종류. 캡처하면 항상 설정 에러.
    Unsupported { kind: String },
}

impl Source {
    pub fn unsupported(kind: impl Into<String>) -> Self {
        Source::Unsupported { kind: kind.into() }
    }
}

impl From<StillImageSource> for Source {
    fn from(source: StillImageSource) -> Self {
        Source::StillImage(source)
    }
}

impl From<VideoSource> for Source {
    fn from(source: VideoSource) -> Self {
        Source::LiveVideo(source)
    }
}

impl From<DrawableSurface> for Source {
    fn from(source: DrawableSurface) -> Self {
        Source::Surface(source)
    }
}

impl SourceAdapter for Source {
    fn kind(&self) -> SourceKind {
        match self {
            Source::StillImage(_) => SourceKind::StillImage,
            Source::LiveVideo(_) => SourceKind::LiveVideo,
            Source::Surface(_) => SourceKind::Surface,
            Source::Unsupported { kind } => SourceKind::Unsupported(kind.clone()),
        }
    }

    fn capture_frame(&self) -> Result<Frame, CoreError> {
        match self {
            Source::StillImage(still) => still.capture_frame(),
            Source::LiveVideo(video) => video.capture_frame(),
            Source::Surface(surface) => surface.capture_frame(),
            Source::Unsupported { kind } => Err(CoreError::Configuration(format!(
                "지원하지 않는 소스 종류: {kind}"
            ))),
        }
    }

    fn dimensions(&self) -> Option<Dimensions> {
        match self {
            Source::StillImage(still) => still.dimensions(),
            Source::LiveVideo(video) => video.dimensions(),
            Source::Surface(surface) => surface.dimensions(),
            Source::Unsupported { .. } => None,
        }
    }

    fn subscribe_changes(&self) -> Option<watch::Receiver<u64>> {
        match self {
            Source::StillImage(still) => Some(still.subscribe()),
            Source::LiveVideo(video) => Some(video.subscribe()),
            Source::Surface(_) | Source::Unsupported { .. } => None,
        }
    }
}
