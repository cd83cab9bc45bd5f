//! FRAMEHOOK 도메인 모델.
//!
//! 프레임, 크롭 명세/해석된 영역, 인식·분류 결과 등
//! 크레이트 간에 공유하는 데이터 구조체를 정의한다.

pub mod filter;
pub mod frame;
pub mod recognition;
pub mod region;
pub mod source;
