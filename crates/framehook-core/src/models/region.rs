//! 크롭 명세와 해석된 영역.
//!
//! `CropSpec`은 앵커/단위가 붙은 원시 명세이고,
//! `Region`은 특정 소스 크기에 대해 해석·클램프된 픽셀 사각형이다.

use serde::{Deserialize, Serialize};

/// X축 기준점
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum XAnchor {
    #[default]
    Left,
    Right,
}

/// Y축 기준점
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YAnchor {
    #[default]
    Top,
    Bottom,
}

/// 값의 단위
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    /// 픽셀
    #[default]
    Px,
    /// 소스 크기 대비 백분율
    Percent,
}

/// 크롭 명세 (해석 전)
///
/// 넓이 0인 명세도 허용된다 (해석 결과가 빈 영역일 뿐).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropSpec {
    pub x_anchor: XAnchor,
    pub y_anchor: YAnchor,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub x_unit: Unit,
    pub y_unit: Unit,
    pub width_unit: Unit,
    pub height_unit: Unit,
}

impl Default for CropSpec {
    /// 전체 프레임
    fn default() -> Self {
        Self::percent(0.0, 0.0, 100.0, 100.0)
    }
}

impl CropSpec {
    /// 모든 값이 백분율인 좌상단 기준 명세
    pub fn percent(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::with_unit(x, y, width, height, Unit::Percent)
    }

    /// 모든 값이 픽셀인 좌상단 기준 명세
    pub fn pixels(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::with_unit(x, y, width, height, Unit::Px)
    }

    fn with_unit(x: f64, y: f64, width: f64, height: f64, unit: Unit) -> Self {
        Self {
            x_anchor: XAnchor::Left,
            y_anchor: YAnchor::Top,
            x,
            y,
            width,
            height,
            x_unit: unit,
            y_unit: unit,
            width_unit: unit,
            height_unit: unit,
        }
    }

    /// X 위치를 오른쪽 끝 기준으로
    pub fn anchor_right(mut self) -> Self {
        self.x_anchor = XAnchor::Right;
        self
    }

    /// Y 위치를 아래쪽 끝 기준으로
    pub fn anchor_bottom(mut self) -> Self {
        self.y_anchor = YAnchor::Bottom;
        self
    }
}

/// 해석된 픽셀 영역 (소스 경계 안으로 클램프됨)
///
/// 해석 시점의 소스 크기에 종속되므로 프레임 간에 캐시하지 않는다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 빈 영역 여부
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}
