//! 인식·분류 결과 모델.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 인식 워커 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    /// 로드/초기화 진행 중
    Initializing,
    /// 작업 수신 가능
    Ready,
    /// 초기화 실패 또는 작업 중 패닉 (영구 제외)
    Failed,
}

/// 인식 트리거 콜백으로 전달되는 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionOutput {
    /// 결과를 만든 트리거 ID
    pub trigger_id: String,
    /// 인식된 텍스트 (앞뒤 공백 제거)
    pub text: String,
    /// 크롭부터 인식 완료까지 걸린 시간
    pub elapsed: Duration,
    /// 원본 프레임 순번
    pub frame_num: u64,
}

/// 분류 엔진 출력
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// 예측 레이블
    pub label: String,
    /// 신뢰도 (0.0 ~ 1.0)
    pub confidence: f32,
}

/// 분류 트리거 콜백으로 전달되는 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationOutput {
    pub trigger_id: String,
    pub classification: Classification,
    pub elapsed: Duration,
    pub frame_num: u64,
}
