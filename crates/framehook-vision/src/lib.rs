//! # framehook-vision
//!
//! 비전 파이프라인 크레이트.
//! 소스 어댑터(정지 이미지, ffmpeg 비디오, 캔버스/화면)에서 프레임을 캡처하고,
//! 크롭 영역 해석 → 이미지 전처리 → 인식 워커 풀/분류 엔진 → 트리거 콜백까지
//! 오케스트레이터가 스케줄링 방식에 따라 실행한다.

pub mod classifier;
pub mod ffmpeg;
#[cfg(feature = "ocr")]
pub mod ocr;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod orchestrator;
pub mod region;
pub mod source;
pub mod step_dump;
pub mod transform;
pub mod trigger;
pub mod worker_pool;
