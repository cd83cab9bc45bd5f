//! 분류 엔진 어댑터.
//!
//! 동기 점수 모델(`ScoreModel`)을 `ClassificationEngine`으로 감싼다.
//! 추론은 블로킹 스레드에서 실행하고, 최고 점수 인덱스를 레이블로 바꾼다.

use async_trait::async_trait;
use framehook_core::error::CoreError;
use framehook_core::models::recognition::Classification;
use framehook_core::ports::classifier::ClassificationEngine;
use image::RgbaImage;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// 클래스별 점수를 내는 모델 (예: ONNX 세션)
pub trait ScoreModel: Send {
    /// 전처리된 정사각 이미지 → 클래스별 점수
    fn scores(&mut self, image: &RgbaImage) -> Result<Vec<f32>, CoreError>;
}

/// 점수 모델 기반 분류 엔진
pub struct ModelClassifier {
    name: String,
    labels: Arc<Vec<String>>,
    model: Arc<Mutex<Box<dyn ScoreModel>>>,
}

impl ModelClassifier {
    /// `labels[i]`가 클래스 `i`의 이름. 비어 있으면 인덱스를 그대로 레이블로 쓴다.
    pub fn new(name: impl Into<String>, model: Box<dyn ScoreModel>, labels: Vec<String>) -> Self {
        Self {
            name: name.into(),
            labels: Arc::new(labels),
            model: Arc::new(Mutex::new(model)),
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

#[async_trait]
impl ClassificationEngine for ModelClassifier {
    async fn classify(&self, image: RgbaImage) -> Result<Classification, CoreError> {
        let model = self.model.clone();
        let labels = self.labels.clone();
        tokio::task::spawn_blocking(move || {
            let scores = model.lock().scores(&image)?;
            top_label(&scores, &labels)
        })
        .await
        .map_err(|e| CoreError::Internal(format!("분류 작업 실패: {e}")))?
    }

    fn engine_name(&self) -> &str {
        &self.name
    }
}

/// 최고 점수 클래스 선택
///
/// 점수가 이미 확률 분포(모두 0..=1, 합 ≈ 1)면 그대로, 아니면 softmax를 거친
/// 값을 신뢰도로 쓴다. NaN은 무시한다.
pub fn top_label(scores: &[f32], labels: &[String]) -> Result<Classification, CoreError> {
    let (index, best) = scores
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, s)| !s.is_nan())
        .fold(None, |acc: Option<(usize, f32)>, (i, s)| match acc {
            Some((_, top)) if top >= s => acc,
            _ => Some((i, s)),
        })
        .ok_or_else(|| CoreError::Classification("모델 출력에 점수가 없음".to_string()))?;

    let confidence = if is_distribution(scores) {
        best
    } else {
        let total: f32 = scores
            .iter()
            .filter(|s| !s.is_nan())
            .map(|s| (s - best).exp())
            .sum();
        1.0 / total
    };

    let label = labels
        .get(index)
        .cloned()
        .unwrap_or_else(|| index.to_string());
    debug!("분류 결과: {} (#{}, {:.3})", label, index, confidence);
    Ok(Classification { label, confidence })
}

fn is_distribution(scores: &[f32]) -> bool {
    let in_range = scores.iter().all(|s| (0.0..=1.0).contains(s));
    let sum: f32 = scores.iter().sum();
    in_range && (sum - 1.0).abs() < 1e-3
}
