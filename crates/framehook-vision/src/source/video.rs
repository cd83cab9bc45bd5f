//! 라이브 비디오 소스.
//!
//! 디코더(ffmpeg 등)가 `push_frame`으로 최신 프레임을 밀어 넣는다.
//! 캡처는 항상 가장 최근에 디코딩된 프레임을 반환한다.

use framehook_core::error::CoreError;
use framehook_core::models::frame::{Dimensions, Frame};
use image::RgbaImage;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

struct VideoState {
    latest: RwLock<Option<RgbaImage>>,
    ended: AtomicBool,
    changes: watch::Sender<u64>,
}

/// 라이브 비디오 소스 핸들 (디코더와 오케스트레이터가 복제해서 공유)
#[derive(Clone)]
pub struct VideoSource {
    state: Arc<VideoState>,
}

impl VideoSource {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            state: Arc::new(VideoState {
                latest: RwLock::new(None),
                ended: AtomicBool::new(false),
                changes,
            }),
        }
    }

    /// 새로 디코딩된 프레임 공급
    pub fn push_frame(&self, image: RgbaImage) {
        *self.state.latest.write() = Some(image);
        self.state.changes.send_modify(|n| *n += 1);
    }

    /// 스트림 종료 표시 (마지막 프레임은 계속 캡처 가능)
    pub fn end_of_stream(&self) {
        if !self.state.ended.swap(true, Ordering::SeqCst) {
            info!(
                "비디오 스트림 종료 (디코딩 프레임 {}개)",
                self.frames_decoded()
            );
        }
    }

    pub fn is_ended(&self) -> bool {
        self.state.ended.load(Ordering::SeqCst)
    }

    /// 지금까지 디코딩된 프레임 수
    pub fn frames_decoded(&self) -> u64 {
        *self.state.changes.borrow()
    }

    pub(crate) fn capture_frame(&self) -> Result<Frame, CoreError> {
        let latest = self.state.latest.read();
        match latest.as_ref() {
            Some(image) => {
                debug!("비디오 프레임 캡처: #{}", self.frames_decoded());
                Ok(Frame::new(image.clone(), 0))
            }
            None => Err(CoreError::Configuration(
                "아직 디코딩된 비디오 프레임 없음".to_string(),
            )),
        }
    }

    pub(crate) fn dimensions(&self) -> Option<Dimensions> {
        self.state
            .latest
            .read()
            .as_ref()
            .map(|img| Dimensions::new(img.width(), img.height()))
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<u64> {
        self.state.changes.subscribe()
    }
}

impl Default for VideoSource {
    fn default() -> Self {
        Self::new()
    }
}
