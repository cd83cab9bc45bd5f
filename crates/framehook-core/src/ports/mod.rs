//! 포트 인터페이스 (trait).
//!
//! Hexagonal Architecture의 포트 레이어.
//! `framehook-vision`이 소스 어댑터와 Tesseract 워커를 구현하고,
//! 분류 엔진은 호출자가 주입한다. 테스트에서는 가짜 구현을 끼운다.
//!
//! 비동기 trait은 `async_trait` 매크로로 object safety를 보장한다.

pub mod classifier;
pub mod recognizer;
pub mod source;
