//! 이미지 변환.
//!
//! 크롭, 색차 임계값 필터, 최소 크기 보장, 패딩, 정사각 크롭, 리사이즈.
//! 모든 함수는 입력을 수정하지 않고 새 이미지를 만든다 (프레임은 공유 불변).
//!
//! 리사이즈는 fast_image_resize (Lanczos3) 기반.

use fast_image_resize::{images::Image as FirImage, PixelType, ResizeAlg, ResizeOptions, Resizer};
use framehook_core::error::CoreError;
use framehook_core::models::filter::ThresholdFilter;
use framehook_core::models::region::Region;
use image::{imageops, Rgba, RgbaImage};
use tracing::trace;

/// Tesseract 입력 최소 변 길이 (패딩 폭으로도 사용)
pub const MIN_OCR_SIZE: u32 = 32;

/// 분류 엔진 기본 입력 변 길이
pub const CLASSIFIER_INPUT_SIDE: u32 = 224;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// 픽셀 필터
pub trait ImageFilter {
    fn apply(&self, image: &RgbaImage) -> RgbaImage;
}

impl ImageFilter for ThresholdFilter {
    /// 목표 색상과의 ΔE가 임계값 이상이면 흰색, 미만이면 검은색 (알파 255)
    fn apply(&self, image: &RgbaImage) -> RgbaImage {
        let target = [self.r, self.g, self.b];
        let target_lab = rgb_to_lab(target);
        let threshold = self.threshold as f64;

        let mut out = RgbaImage::new(image.width(), image.height());
        for (src, dst) in image.pixels().zip(out.pixels_mut()) {
            let lab = rgb_to_lab([src[0], src[1], src[2]]);
            let v = if delta_e_lab(lab, target_lab) >= threshold {
                255
            } else {
                0
            };
            *dst = Rgba([v, v, v, 255]);
        }
        out
    }
}

/// CIE L*a*b* 좌표
pub type Lab = (f64, f64, f64);

/// sRGB → CIE L*a*b* (D65)
pub fn rgb_to_lab(rgb: [u8; 3]) -> Lab {
    let linear = |c: u8| {
        let c = c as f64 / 255.0;
        if c > 0.04045 {
            ((c + 0.055) / 1.055).powf(2.4)
        } else {
            c / 12.92
        }
    };
    let (r, g, b) = (linear(rgb[0]), linear(rgb[1]), linear(rgb[2]));

    let f = |t: f64| {
        if t > 0.008856 {
            t.cbrt()
        } else {
            7.787 * t + 16.0 / 116.0
        }
    };
    let x = f((r * 0.4124 + g * 0.3576 + b * 0.1805) / 0.95047);
    let y = f(r * 0.2126 + g * 0.7152 + b * 0.0722);
    let z = f((r * 0.0193 + g * 0.1192 + b * 0.9505) / 1.08883);

    (116.0 * y - 16.0, 500.0 * (x - y), 200.0 * (y - z))
}

/// 두 RGB 색상의 지각적 색차 (CIE94 그래픽 가중치)
pub fn delta_e(a: [u8; 3], b: [u8; 3]) -> f64 {
    delta_e_lab(rgb_to_lab(a), rgb_to_lab(b))
}

fn delta_e_lab(a: Lab, b: Lab) -> f64 {
    let delta_l = a.0 - b.0;
    let delta_a = a.1 - b.1;
    let delta_b = a.2 - b.2;
    let c1 = (a.1 * a.1 + a.2 * a.2).sqrt();
    let c2 = (b.1 * b.1 + b.2 * b.2).sqrt();
    let delta_c = c1 - c2;
    let delta_h_sq = delta_a * delta_a + delta_b * delta_b - delta_c * delta_c;
    let delta_h = if delta_h_sq < 0.0 { 0.0 } else { delta_h_sq.sqrt() };
    let sc = 1.0 + 0.045 * c1;
    let sh = 1.0 + 0.015 * c1;

    let dc = delta_c / sc;
    let dh = delta_h / sh;
    let sum = delta_l * delta_l + dc * dc + dh * dh;
    if sum < 0.0 {
        0.0
    } else {
        sum.sqrt()
    }
}

/// 영역 복사 (영역은 이미지 경계로 다시 클램프)
pub fn crop(image: &RgbaImage, region: Region) -> RgbaImage {
    let x = region.x.min(image.width());
    let y = region.y.min(image.height());
    let width = region.width.min(image.width() - x);
    let height = region.height.min(image.height() - y);
    imageops::crop_imm(image, x, y, width, height).to_image()
}

/// Lanczos3 리사이즈 (종횡비 무시)
pub fn resize(image: &RgbaImage, width: u32, height: u32) -> Result<RgbaImage, CoreError> {
    let (src_w, src_h) = image.dimensions();
    if src_w == width && src_h == height {
        return Ok(image.clone());
    }
    if src_w == 0 || src_h == 0 {
        return Err(CoreError::Image("소스 이미지 크기 0".to_string()));
    }
    if width == 0 || height == 0 {
        return Err(CoreError::Image("목표 이미지 크기 0".to_string()));
    }

    let src_image = FirImage::from_vec_u8(src_w, src_h, image.as_raw().clone(), PixelType::U8x4)
        .map_err(|e| CoreError::Image(format!("소스 이미지 생성 실패: {e}")))?;
    let mut dst_image = FirImage::new(width, height, PixelType::U8x4);

    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(
        fast_image_resize::FilterType::Lanczos3,
    ));
    Resizer::new()
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|e| CoreError::Image(format!("리사이즈 실패: {e}")))?;

    trace!("리사이즈: {}x{} → {}x{}", src_w, src_h, width, height);

    RgbaImage::from_raw(width, height, dst_image.into_vec())
        .ok_or_else(|| CoreError::Image("결과 이미지 생성 실패".to_string()))
}

/// 한 변이라도 `min_size`보다 작으면 종횡비를 유지하며 확대
pub fn ensure_minimum_size(image: &RgbaImage, min_size: u32) -> Result<RgbaImage, CoreError> {
    let (src_w, src_h) = image.dimensions();
    if src_w == 0 || src_h == 0 {
        return Err(CoreError::Image("빈 이미지: 너비 또는 높이가 0".to_string()));
    }

    let (mut width, mut height) = (src_w as f64, src_h as f64);
    let min = min_size as f64;
    if width < min {
        let scale = min / width;
        width *= scale;
        height *= scale;
    }
    if height < min {
        let scale = min / height;
        width *= scale;
        height *= scale;
    }

    let (width, height) = (width.round() as u32, height.round() as u32);
    if width == src_w && height == src_h {
        Ok(image.clone())
    } else {
        resize(image, width, height)
    }
}

/// 사방에 같은 폭의 단색 패딩 추가
pub fn pad_uniform(image: &RgbaImage, padding: u32, color: Rgba<u8>) -> RgbaImage {
    let mut out = RgbaImage::from_pixel(
        image.width() + padding * 2,
        image.height() + padding * 2,
        color,
    );
    imageops::replace(&mut out, image, padding as i64, padding as i64);
    out
}

/// 정사각형이 아니면 가운데 정사각 영역으로 크롭
pub fn ensure_square(image: &RgbaImage) -> RgbaImage {
    let (w, h) = image.dimensions();
    if w == h {
        return image.clone();
    }
    let side = w.min(h);
    crop(image, Region::new((w - side) / 2, (h - side) / 2, side, side))
}

/// 정확히 `width`x`height`로 리사이즈 (종횡비 무시)
pub fn ensure_size(image: &RgbaImage, width: u32, height: u32) -> Result<RgbaImage, CoreError> {
    resize(image, width, height)
}

/// OCR 전처리: 최소 크기 보장 → 필터 → 흰색 패딩
pub fn prepare_for_ocr(
    image: &RgbaImage,
    filter: Option<&ThresholdFilter>,
) -> Result<RgbaImage, CoreError> {
    let mut prepared = ensure_minimum_size(image, MIN_OCR_SIZE)?;
    if let Some(filter) = filter {
        prepared = filter.apply(&prepared);
    }
    Ok(pad_uniform(&prepared, MIN_OCR_SIZE, WHITE))
}

/// 분류 전처리: 가운데 정사각 크롭 → `side`x`side` 리사이즈
pub fn prepare_for_classification(image: &RgbaImage, side: u32) -> Result<RgbaImage, CoreError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(CoreError::Image("빈 이미지: 너비 또는 높이가 0".to_string()));
    }
    ensure_size(&ensure_square(image), side, side)
}
