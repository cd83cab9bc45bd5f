//! 그리기 표면 소스.
//!
//! 메모리 캔버스 또는 xcap 기반 모니터 화면. 자체 변경 신호는 없다.

use framehook_core::error::CoreError;
use framehook_core::models::frame::{Dimensions, Frame};
use image::RgbaImage;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;
use xcap::Monitor;

#[derive(Clone)]
enum Backend {
    Canvas(Arc<RwLock<RgbaImage>>),
    Screen { monitor: Option<usize> },
}

/// 그리기 표면 (캔버스 또는 화면)
#[derive(Clone)]
pub struct DrawableSurface {
    backend: Backend,
}

impl DrawableSurface {
    /// 투명한 메모리 캔버스
    pub fn canvas(width: u32, height: u32) -> Self {
        Self {
            backend: Backend::Canvas(Arc::new(RwLock::new(RgbaImage::new(width, height)))),
        }
    }

    /// 모니터 화면 (None이면 주 모니터)
    pub fn screen(monitor: Option<usize>) -> Self {
        Self {
            backend: Backend::Screen { monitor },
        }
    }

    /// 캔버스에 그리기. 화면 표면이면 설정 에러.
    pub fn draw<F>(&self, painter: F) -> Result<(), CoreError>
    where
        F: FnOnce(&mut RgbaImage),
    {
        match &self.backend {
            Backend::Canvas(canvas) => {
                painter(&mut canvas.write());
                Ok(())
            }
            Backend::Screen { .. } => Err(CoreError::Configuration(
                "화면 표면에는 그릴 수 없음".to_string(),
            )),
        }
    }

    /// 캔버스 크기 변경 (내용은 지워짐)
    pub fn resize(&self, width: u32, height: u32) -> Result<(), CoreError> {
        self.draw(|canvas| *canvas = RgbaImage::new(width, height))
    }

    pub(crate) fn capture_frame(&self) -> Result<Frame, CoreError> {
        match &self.backend {
            Backend::Canvas(canvas) => Ok(Frame::new(canvas.read().clone(), 0)),
            Backend::Screen { monitor } => {
                let image = capture_monitor(*monitor)?;
                Ok(Frame::new(image, 0))
            }
        }
    }

    pub(crate) fn dimensions(&self) -> Option<Dimensions> {
        match &self.backend {
            Backend::Canvas(canvas) => {
                let canvas = canvas.read();
                Some(Dimensions::new(canvas.width(), canvas.height()))
            }
            Backend::Screen { monitor } => {
                let monitor = find_monitor(*monitor).ok()?;
                Some(Dimensions::new(monitor.width().ok()?, monitor.height().ok()?))
            }
        }
    }
}

fn find_monitor(index: Option<usize>) -> Result<Monitor, CoreError> {
    let mut monitors = Monitor::all()
        .map_err(|e| CoreError::Configuration(format!("모니터 목록 조회 실패: {e}")))?;

    let position = match index {
        Some(i) => (i < monitors.len()).then_some(i),
        None => monitors
            .iter()
            .position(|m| m.is_primary().unwrap_or(false))
            .or((!monitors.is_empty()).then_some(0)),
    };
    let monitor = position.map(|i| monitors.swap_remove(i));
    monitor.ok_or_else(|| CoreError::Configuration("모니터를 찾을 수 없음".to_string()))
}

fn capture_monitor(index: Option<usize>) -> Result<RgbaImage, CoreError> {
    let monitor = find_monitor(index)?;
    let image = monitor
        .capture_image()
        .map_err(|e| CoreError::Image(format!("스크린 캡처 실패: {e}")))?;
    debug!("스크린 캡처 완료: {}x{}", image.width(), image.height());
    Ok(image)
}
