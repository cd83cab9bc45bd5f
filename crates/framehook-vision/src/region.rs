//! 크롭 영역 해석.
//!
//! `CropSpec`(앵커 + 단위)을 소스 원본 크기 기준 픽셀 `Region`으로 바꾼다.
//! 결과는 항상 소스 경계 안으로 클램프된다.

use framehook_core::models::frame::{Dimensions, Frame};
use framehook_core::models::region::{CropSpec, Region, Unit, XAnchor, YAnchor};

/// 크롭 명세를 소스 크기에 맞춰 해석
///
/// 축마다: 백분율 → `dimension / 100` 배율, 먼 쪽 앵커(오른쪽/아래)는
/// `dimension - value`로 반사, 크기는 앵커와 무관하게 같은 배율.
/// 배율 적용 후 가장 가까운 정수로 반올림하고 클램프한다.
pub fn resolve(crop: &CropSpec, dims: Dimensions) -> Region {
    let (x, width) = resolve_axis(
        crop.x,
        crop.x_unit,
        crop.x_anchor == XAnchor::Right,
        crop.width,
        crop.width_unit,
        dims.width,
    );
    let (y, height) = resolve_axis(
        crop.y,
        crop.y_unit,
        crop.y_anchor == YAnchor::Bottom,
        crop.height,
        crop.height_unit,
        dims.height,
    );
    Region::new(x, y, width, height)
}

/// 프레임 크기 기준 해석
pub fn resolve_for_frame(crop: &CropSpec, frame: &Frame) -> Region {
    resolve(crop, frame.dimensions())
}

fn resolve_axis(
    pos: f64,
    pos_unit: Unit,
    far_anchor: bool,
    size: f64,
    size_unit: Unit,
    dimension: u32,
) -> (u32, u32) {
    let dim = dimension as f64;

    let mut pos = scale(pos, pos_unit, dim);
    if far_anchor {
        pos = dim - pos;
    }
    let size = scale(size, size_unit, dim);

    let start = clamp_round(pos, 0.0, dim);
    let remaining = dimension - start;
    let len = clamp_round(size, 0.0, remaining as f64);
    (start, len)
}

fn scale(value: f64, unit: Unit, dim: f64) -> f64 {
    match unit {
        Unit::Px => value,
        Unit::Percent => value * dim / 100.0,
    }
}

fn clamp_round(value: f64, min: f64, max: f64) -> u32 {
    if value.is_nan() {
        return min as u32;
    }
    value.round().clamp(min, max) as u32
}
