//! 정지 이미지 소스.

use framehook_core::error::CoreError;
use framehook_core::models::frame::{Dimensions, Frame};
use image::RgbaImage;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// 정지 이미지 소스 (복제해도 같은 이미지를 공유하는 핸들)
///
/// 이미지가 로드/교체될 때마다 변경 카운터가 증가한다.
#[derive(Clone)]
pub struct StillImageSource {
    image: Arc<RwLock<Option<RgbaImage>>>,
    changes: Arc<watch::Sender<u64>>,
}

impl StillImageSource {
    /// 로드 전 상태로 생성
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            image: Arc::new(RwLock::new(None)),
            changes: Arc::new(changes),
        }
    }

    /// 이미 디코딩된 이미지로 생성
    pub fn from_image(image: RgbaImage) -> Self {
        let source = Self::new();
        source.set_image(image);
        source
    }

    /// 파일에서 이미지 로드 (디코딩은 블로킹 스레드에서)
    pub async fn load(&self, path: impl AsRef<Path>) -> Result<Dimensions, CoreError> {
        let path = path.as_ref().to_path_buf();
        let shown = path.display().to_string();

        let decoded = tokio::task::spawn_blocking(move || image::open(&path))
            .await
            .map_err(|e| CoreError::Internal(format!("이미지 디코딩 작업 실패: {e}")))??
            .to_rgba8();

        let dims = Dimensions::new(decoded.width(), decoded.height());
        self.set_image(decoded);
        info!("이미지 로드 완료: {} ({}x{})", shown, dims.width, dims.height);
        Ok(dims)
    }

    /// 이미지 교체 및 변경 알림
    pub fn set_image(&self, image: RgbaImage) {
        debug!("정지 이미지 교체: {}x{}", image.width(), image.height());
        *self.image.write() = Some(image);
        self.changes.send_modify(|n| *n += 1);
    }

    /// 이미지가 로드되었는지
    pub fn is_loaded(&self) -> bool {
        self.image.read().is_some()
    }

    pub(crate) fn capture_frame(&self) -> Result<Frame, CoreError> {
        match self.image.read().as_ref() {
            Some(image) => Ok(Frame::new(image.clone(), 0)),
            None => Err(CoreError::Configuration(
                "이미지가 아직 로드되지 않음".to_string(),
            )),
        }
    }

    pub(crate) fn dimensions(&self) -> Option<Dimensions> {
        self.image
            .read()
            .as_ref()
            .map(|img| Dimensions::new(img.width(), img.height()))
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}

impl Default for StillImageSource {
    fn default() -> Self {
        Self::new()
    }
}
