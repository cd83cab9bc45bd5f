//! 인식 워커 포트.
//!
//! 워커 풀은 각 워커를 독립 스레드에서 `WorkerFactory::create`로 초기화하고,
//! 이후 그 스레드 안에서만 `RecognitionWorker::recognize`를 호출한다.
//!
//! 구현: `framehook-vision::ocr::TesseractFactory` (`ocr` feature)

use image::RgbaImage;

use crate::config::WorkerPoolConfig;
use crate::error::CoreError;

/// 초기화가 끝난 인식 워커 하나 (블로킹 호출)
///
/// 자신을 만든 워커 스레드 안에서만 사용된다.
pub trait RecognitionWorker {
    /// 이미지에서 텍스트 인식
    fn recognize(&mut self, image: &RgbaImage) -> Result<String, CoreError>;
}

/// 워커 생성기: 워커 스레드 안에서 로드/초기화 시퀀스를 수행
pub trait WorkerFactory: Send + Sync {
    /// `index`번 워커 초기화. 실패하면 해당 워커만 풀에서 제외된다.
    fn create(
        &self,
        index: usize,
        config: &WorkerPoolConfig,
    ) -> Result<Box<dyn RecognitionWorker>, CoreError>;

    /// 엔진 이름 (로그용)
    fn engine_name(&self) -> &str;
}
