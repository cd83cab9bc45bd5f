//! FRAMEHOOK 핵심 에러 타입.
//!
//! 어댑터 crate는 외부 라이브러리 에러를 이 타입으로 매핑해서 반환한다.

use thiserror::Error;

/// 사용자 콜백이 반환하는 에러 (박싱된 표준 에러)
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 코어 레이어 에러.
/// 소스 설정, 워커 초기화, 인식/분류, 사용자 콜백 에러를 정의한다.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 설정 오류 (미지원 소스 종류, 아직 준비되지 않은 소스, 잘못된 설정값)
    #[error("설정 에러: {0}")]
    Configuration(String),

    /// 개별 워커 초기화 실패 (풀 크기만 줄어든다)
    #[error("워커 #{index} 초기화 실패: {message}")]
    WorkerInit {
        /// 워커 인덱스
        index: usize,
        /// 실패 사유
        message: String,
    },

    /// 요청한 워커가 전부 초기화에 실패함
    #[error("워커 풀 초기화 실패: 요청 {requested}개 중 준비된 워커 없음")]
    WorkerPoolEmpty {
        /// 요청한 워커 수
        requested: usize,
    },

    /// 인식(OCR) 작업 실패
    #[error("인식 에러: {0}")]
    Recognition(String),

    /// 분류 작업 실패
    #[error("분류 에러: {0}")]
    Classification(String),

    /// 사용자 콜백 실패 (트리거 경계에서 잡지 않고 호출자에게 전파)
    #[error("콜백 에러: {0}")]
    Callback(#[source] BoxError),

    /// 이미지 처리 실패
    #[error("이미지 에러: {0}")]
    Image(String),

    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),
}

impl CoreError {
    /// 설정 에러 여부 (루프 스케줄러는 다음 틱에 재시도한다)
    pub fn is_configuration(&self) -> bool {
        matches!(self, CoreError::Configuration(_))
    }
}

impl From<image::ImageError> for CoreError {
    fn from(e: image::ImageError) -> Self {
        CoreError::Image(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn error_display_messages() {
        let e = CoreError::Configuration("미지원 소스".to_string());
        assert!(e.to_string().contains("설정"));
        assert!(e.is_configuration());

        let e = CoreError::WorkerInit {
            index: 2,
            message: "traineddata 없음".to_string(),
        };
        assert!(e.to_string().contains("#2"));
        assert!(!e.is_configuration());

        let e = CoreError::WorkerPoolEmpty { requested: 3 };
        assert!(e.to_string().contains("3개"));
    }

    #[test]
    fn callback_error_keeps_source() {
        let inner: BoxError = "사용자 로직 실패".into();
        let e = CoreError::Callback(inner);
        assert!(std::error::Error::source(&e).is_some());
        assert!(e.to_string().contains("사용자 로직 실패"));
    }

    #[test]
    fn io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "없음");
        let e: CoreError = io.into();
        assert_matches!(e, CoreError::Io(_));
    }
}
