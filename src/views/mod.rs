pub mod crop;
pub mod regions;
pub mod synth;

use serde::{Deserialize, Serialize};

pub use crop::crop_resize;
pub use regions::{evaluate_view, plan_views, RegionRules, ViewOutcome, ViewPlan};
pub use synth::{encode_png, synthesize, SynthesisOptions, SynthesizedViews, ViewSet};

/// 生成するビューの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewName {
    Full,
    Neck,
    Sleeve,
    Waist,
    Length,
    Zoomed,
}

impl ViewName {
    /// 評価順
    pub const ALL: [ViewName; 6] = [
        Self::Full,
        Self::Neck,
        Self::Sleeve,
        Self::Waist,
        Self::Length,
        Self::Zoomed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Neck => "neck",
            Self::Sleeve => "sleeve",
            Self::Waist => "waist",
            Self::Length => "length",
            Self::Zoomed => "zoomed",
        }
    }

    /// 欠損時にスキップできるビューか（waistのみ）
    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Waist)
    }

    /// アップロード時のファイル名
    pub fn file_name(&self) -> String {
        format!("{}.png", self.as_str())
    }
}

impl std::fmt::Display for ViewName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// BBox（ソース画像のピクセル座標、クランプ前は範囲外も可）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 左上・右下の座標から作成
    pub fn from_corners(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self::new(left, top, right - left, bottom - top)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// キャンバス [0,W]×[0,H] にクランプし、幅・高さは最低1ピクセル
    ///
    /// 原点は [0,W-1]×[0,H-1] に収めるので、1ピクセルに広げても右端・下端は
    /// キャンバスを越えない。
    pub fn clamp_to_canvas(&self, canvas_w: u32, canvas_h: u32) -> Self {
        let w = canvas_w as f32;
        let h = canvas_h as f32;
        let x = self.x.clamp(0.0, (w - 1.0).max(0.0));
        let y = self.y.clamp(0.0, (h - 1.0).max(0.0));
        let max_x = self.right().clamp(0.0, w);
        let max_y = self.bottom().clamp(0.0, h);
        Self {
            x,
            y,
            width: (max_x - x).max(1.0),
            height: (max_y - y).max(1.0),
        }
    }
}

/// ビュー名と切り出し領域。None はソース画像そのまま
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewSpec {
    pub name: ViewName,
    pub region: Option<BoundingBox>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_name_serde_lowercase() {
        let json = serde_json::to_string(&ViewName::Zoomed).unwrap();
        assert_eq!(json, "\"zoomed\"");
        let parsed: ViewName = serde_json::from_str("\"sleeve\"").unwrap();
        assert_eq!(parsed, ViewName::Sleeve);
    }

    #[test]
    fn test_only_waist_is_optional() {
        let optional: Vec<_> = ViewName::ALL.iter().filter(|v| v.is_optional()).collect();
        assert_eq!(optional, vec![&ViewName::Waist]);
    }

    #[test]
    fn test_clamp_to_canvas_inside_is_unchanged() {
        let b = BoundingBox::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(b.clamp_to_canvas(100, 100), b);
    }

    #[test]
    fn test_clamp_to_canvas_trims_overhang() {
        let b = BoundingBox::from_corners(-10.0, -5.0, 450.0, 700.0);
        let c = b.clamp_to_canvas(400, 600);
        assert_eq!(c, BoundingBox::new(0.0, 0.0, 400.0, 600.0));
    }

    #[test]
    fn test_clamp_to_canvas_min_one_pixel() {
        let b = BoundingBox::new(500.0, 50.0, 20.0, -30.0);
        let c = b.clamp_to_canvas(400, 600);
        assert_eq!(c, BoundingBox::new(399.0, 50.0, 1.0, 1.0));
        assert!(c.right() <= 400.0);
    }

    #[test]
    fn test_clamp_to_canvas_past_bottom_right_stays_inside() {
        let b = BoundingBox::new(410.0, 650.0, 30.0, 40.0);
        let c = b.clamp_to_canvas(400, 600);
        assert_eq!(c, BoundingBox::new(399.0, 599.0, 1.0, 1.0));
        assert!(c.right() <= 400.0 && c.bottom() <= 600.0);
    }
}
