use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use super::BoundingBox;

/// ソース画像内に収めた切り出し矩形（整数ピクセル）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// BBoxをソース境界にクリップ
///
/// - 原点を [0,W]×[0,H] に収める
/// - 幅・高さは原点から右端/下端までに制限（原点がずれても幅は保持される）
/// - 端数は外側に丸める
///
/// 重なりがなければ None。
pub fn clip_to_source(region: &BoundingBox, source_w: u32, source_h: u32) -> Option<PixelRect> {
    let fw = source_w as f32;
    let fh = source_h as f32;
    if !(region.x.is_finite()
        && region.y.is_finite()
        && region.width.is_finite()
        && region.height.is_finite())
    {
        return None;
    }

    let x = region.x.clamp(0.0, fw);
    let y = region.y.clamp(0.0, fh);
    let w = region.width.clamp(0.0, fw - x);
    let h = region.height.clamp(0.0, fh - y);
    if w <= 0.0 || h <= 0.0 {
        return None;
    }

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = ((x + w).ceil() as u32).min(source_w);
    let y1 = ((y + h).ceil() as u32).min(source_h);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some(PixelRect {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    })
}

/// 領域を切り出し、target_w×target_h にリサイズ
///
/// 重なりのない領域は background 単色で埋める。同じ入力には常に同じ出力を返す。
pub fn crop_resize(
    source: &RgbaImage,
    region: &BoundingBox,
    target_w: u32,
    target_h: u32,
    background: Rgba<u8>,
) -> RgbaImage {
    let Some(rect) = clip_to_source(region, source.width(), source.height()) else {
        return RgbaImage::from_pixel(target_w, target_h, background);
    };
    if target_w == 0 || target_h == 0 {
        return RgbaImage::new(target_w, target_h);
    }

    let cropped = imageops::crop_imm(source, rect.x, rect.y, rect.width, rect.height).to_image();
    if cropped.dimensions() == (target_w, target_h) {
        return cropped;
    }
    imageops::resize(&cropped, target_w, target_h, FilterType::Triangle)
}
