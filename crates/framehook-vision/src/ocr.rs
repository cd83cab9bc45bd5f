//! Tesseract 인식 워커.
//!
//! `leptess` 기반. `ocr` feature flag 활성화 시에만 빌드된다.
//! 워커마다 `LepTess` 인스턴스 하나를 초기화해서 계속 재사용한다.

use framehook_core::config::WorkerPoolConfig;
use framehook_core::error::CoreError;
use framehook_core::ports::recognizer::{RecognitionWorker, WorkerFactory};
use image::{ImageFormat, RgbaImage};
use leptess::{LepTess, Variable};
use std::io::Cursor;
use std::str::FromStr;
use tracing::debug;

/// 입력 이미지 해상도 (dpi). 지정하지 않으면 Tesseract가 경고를 낸다.
const SOURCE_RESOLUTION: i32 = 96;

/// Tesseract 워커 생성기
#[derive(Debug, Default, Clone)]
pub struct TesseractFactory;

impl TesseractFactory {
    pub fn new() -> Self {
        Self
    }
}

impl WorkerFactory for TesseractFactory {
    fn create(
        &self,
        index: usize,
        config: &WorkerPoolConfig,
    ) -> Result<Box<dyn RecognitionWorker>, CoreError> {
        let languages = config.languages.join("+");
        let tessdata = config
            .tessdata_path
            .as_ref()
            .map(|p| p.to_string_lossy().to_string());

        let mut tess = LepTess::new(tessdata.as_deref(), &languages).map_err(|e| {
            CoreError::WorkerInit {
                index,
                message: format!("Tesseract 초기화 실패 ({languages}): {e}"),
            }
        })?;

        for (name, value) in &config.init_options {
            let variable = Variable::from_str(name).map_err(|_| CoreError::WorkerInit {
                index,
                message: format!("알 수 없는 Tesseract 변수: {name}"),
            })?;
            tess.set_variable(variable, value)
                .map_err(|e| CoreError::WorkerInit {
                    index,
                    message: format!("Tesseract 변수 설정 실패 ({name}={value}): {e}"),
                })?;
        }

        debug!("Tesseract 워커 #{} 초기화 ({})", index, languages);
        Ok(Box::new(TesseractWorker { tess }))
    }

    fn engine_name(&self) -> &str {
        "tesseract"
    }
}

/// 초기화된 Tesseract 인스턴스
struct TesseractWorker {
    tess: LepTess,
}

impl RecognitionWorker for TesseractWorker {
    fn recognize(&mut self, image: &RgbaImage) -> Result<String, CoreError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(CoreError::Recognition(
                "빈 이미지: 너비 또는 높이가 0".to_string(),
            ));
        }

        let mut encoded = Cursor::new(Vec::new());
        image
            .write_to(&mut encoded, ImageFormat::Png)
            .map_err(|e| CoreError::Recognition(format!("이미지 인코딩 실패: {e}")))?;

        self.tess
            .set_image_from_mem(encoded.get_ref())
            .map_err(|e| CoreError::Recognition(format!("OCR 이미지 설정 실패: {e}")))?;
        self.tess.set_source_resolution(SOURCE_RESOLUTION);

        let text = self
            .tess
            .get_utf8_text()
            .map_err(|e| CoreError::Recognition(format!("OCR 텍스트 추출 실패: {e}")))?;

        let text = text.trim().to_string();
        if text.is_empty() {
            debug!("OCR 결과 없음 ({}x{})", image.width(), image.height());
        }
        Ok(text)
    }
}
