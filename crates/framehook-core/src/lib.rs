//! # framehook-core
//!
//! FRAMEHOOK 도메인 모델, 포트(trait) 정의, 에러 타입.
//! 모든 크레이트가 공유하는 핵심 타입과 인터페이스를 제공한다.
//!
//! ## 구조
//!
//! - [`models`]: 프레임, 크롭/영역, 인식 결과 등 도메인 구조체
//! - [`ports`]: 소스 어댑터, 인식 워커, 분류 엔진 포트 (trait)
//! - [`error`]: 핵심 에러 타입 (thiserror)
//! - [`config`]: 애플리케이션 설정 구조체
//! - [`config_manager`]: 설정 파일 관리 (로드/저장)

pub mod config;
pub mod config_manager;
pub mod error;
pub mod models;
pub mod ports;

#[cfg(test)]
mod tests {
    use crate::models::region::{CropSpec, Unit, YAnchor};

    #[test]
    fn crop_spec_serde_roundtrip() {
        let crop = CropSpec::percent(10.0, 20.0, 30.0, 40.0).anchor_bottom();

        let json = serde_json::to_string(&crop).unwrap();
        let deserialized: CropSpec = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized, crop);
        assert_eq!(deserialized.y_anchor, YAnchor::Bottom);
        assert_eq!(deserialized.width_unit, Unit::Percent);
    }

    #[test]
    fn config_defaults() {
        let config = crate::config::AppConfig::default();
        assert_eq!(config.scheduler.interval_ms, 1_000);
        assert_eq!(config.scheduler.debounce_ms, 250);
        assert_eq!(config.scheduler.refresh_hz, 60);
        assert_eq!(config.workers.num_workers, 2);
        assert_eq!(config.workers.languages, vec!["eng".to_string()]);
        assert!(config.triggers.is_empty());
    }
}
