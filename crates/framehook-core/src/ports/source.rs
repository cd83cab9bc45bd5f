//! 소스 어댑터 포트.
//!
//! 구현: `framehook-vision::source::Source` (정지 이미지, 라이브 비디오, 그리기 표면)

use tokio::sync::watch;

use crate::error::CoreError;
use crate::models::frame::{Dimensions, Frame};
use crate::models::source::SourceKind;

/// 시각 소스 캡처 능력
pub trait SourceAdapter: Send + Sync {
    /// 소스 종류
    fn kind(&self) -> SourceKind;

    /// 현재 프레임 캡처 (동기).
    ///
    /// 미지원 종류이거나 아직 내용이 없으면 `CoreError::Configuration`.
    fn capture_frame(&self) -> Result<Frame, CoreError>;

    /// 원본 픽셀 크기 (표시 크기가 아닌 디코딩 크기). 내용이 없으면 `None`.
    fn dimensions(&self) -> Option<Dimensions>;

    /// 새 내용 알림 구독.
    ///
    /// 값은 변경 카운터이며 새 내용마다 증가한다.
    /// 자체 변경 신호가 없는 소스는 `None`.
    fn subscribe_changes(&self) -> Option<watch::Receiver<u64>>;
}
