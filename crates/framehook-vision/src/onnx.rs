//! ONNX Runtime 분류 모델.
//!
//! 입력은 `[1, side, side, 3]` NHWC f32 (RGB, 0..1), 출력 첫 텐서를 클래스별
//! 점수로 읽는다. 로드 직후 검은 이미지로 한 번 추론해서 세션을 예열한다.

use framehook_core::error::CoreError;
use image::RgbaImage;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;
use std::time::Instant;
use tracing::info;

use crate::classifier::ScoreModel;

/// ONNX 세션 하나 (세션은 `&mut`로만 실행)
pub struct OnnxModel {
    session: Session,
    side: u32,
}

impl OnnxModel {
    /// 모델 파일 로드 및 예열
    pub fn load(path: &Path, side: u32) -> Result<Self, CoreError> {
        let started = Instant::now();
        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.commit_from_file(path))
            .map_err(|e| {
                CoreError::Classification(format!("모델 로드 실패 ({}): {e}", path.display()))
            })?;

        let mut model = Self { session, side };
        model.scores(&RgbaImage::new(side, side))?;
        info!(
            "ONNX 모델 로드: {} ({}x{}, {:?})",
            path.display(),
            side,
            side,
            started.elapsed()
        );
        Ok(model)
    }
}

impl ScoreModel for OnnxModel {
    fn scores(&mut self, image: &RgbaImage) -> Result<Vec<f32>, CoreError> {
        if image.dimensions() != (self.side, self.side) {
            return Err(CoreError::Classification(format!(
                "입력 크기 불일치: {}x{} (기대 {}x{})",
                image.width(),
                image.height(),
                self.side,
                self.side
            )));
        }

        let side = self.side as usize;
        let input = Tensor::from_array(([1usize, side, side, 3], nhwc_rgb(image)))
            .map_err(|e| CoreError::Classification(format!("입력 텐서 생성 실패: {e}")))?;
        let outputs = self
            .session
            .run(ort::inputs![input])
            .map_err(|e| CoreError::Classification(format!("추론 실패: {e}")))?;
        let (_, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| CoreError::Classification(format!("출력 해석 실패: {e}")))?;
        Ok(scores.to_vec())
    }
}

/// RGBA → RGB f32 (0..1), 행 우선
fn nhwc_rgb(image: &RgbaImage) -> Vec<f32> {
    image
        .pixels()
        .flat_map(|p| [p.0[0], p.0[1], p.0[2]])
        .map(|v| v as f32 / 255.0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn nhwc_drops_alpha_and_scales() {
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(0, 0, Rgba([255, 0, 51, 10]));
        image.put_pixel(1, 0, Rgba([0, 255, 0, 255]));
        let data = nhwc_rgb(&image);
        assert_eq!(data.len(), 6);
        assert_eq!(data[..3], [1.0, 0.0, 0.2]);
        assert_eq!(data[3..], [0.0, 1.0, 0.0]);
    }

    #[test]
    fn missing_model_file_is_classification_error() {
        let result = OnnxModel::load(Path::new("/nonexistent/model.onnx"), 224);
        assert!(matches!(result, Err(CoreError::Classification(_))));
    }
}
