use std::collections::BTreeMap;
use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::error::{ViewError, ViewWarning};
use crate::pose::{KeypointSet, PoseEstimator};

use super::crop::crop_resize;
use super::regions::{plan_views, RegionRules};
use super::ViewName;

/// ビュー生成の設定
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthesisOptions {
    pub rules: RegionRules,
    /// 切り出し領域がキャンバス外のときの塗りつぶし色
    pub background: Rgba<u8>,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            rules: RegionRules::default(),
            background: Rgba([0, 0, 0, 0]),
        }
    }
}

/// ビュー名 → 画像
#[derive(Debug, Clone, Default)]
pub struct ViewSet {
    views: BTreeMap<ViewName, RgbaImage>,
}

impl ViewSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: ViewName, image: RgbaImage) {
        self.views.insert(name, image);
    }

    pub fn get(&self, name: ViewName) -> Option<&RgbaImage> {
        self.views.get(&name)
    }

    pub fn contains(&self, name: ViewName) -> bool {
        self.views.contains_key(&name)
    }

    pub fn names(&self) -> Vec<ViewName> {
        self.views.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ViewName, &RgbaImage)> {
        self.views.iter().map(|(name, image)| (*name, image))
    }
}

impl FromIterator<(ViewName, RgbaImage)> for ViewSet {
    fn from_iter<T: IntoIterator<Item = (ViewName, RgbaImage)>>(iter: T) -> Self {
        Self {
            views: iter.into_iter().collect(),
        }
    }
}

/// 生成結果（ビューとスキップ警告）
#[derive(Debug, Clone)]
pub struct SynthesizedViews {
    pub views: ViewSet,
    pub warnings: Vec<ViewWarning>,
}

/// キーポイントからビュー一式を生成
///
/// 1. 全ビューの領域を計算（必須ビュー欠損ならここで失敗）
/// 2. 各ビューを並列に切り出し、ソースと同じサイズにリサイズ
///
/// full はソース画像そのもの。
pub fn synthesize(
    source: &RgbaImage,
    keypoints: &KeypointSet,
    options: &SynthesisOptions,
) -> Result<SynthesizedViews, ViewError> {
    let (w, h) = source.dimensions();
    let plan = plan_views(keypoints, w, h, &options.rules)?;

    let views: ViewSet = plan
        .views
        .par_iter()
        .map(|spec| {
            let image = match spec.region {
                Some(region) => crop_resize(source, &region, w, h, options.background),
                None => source.clone(),
            };
            (spec.name, image)
        })
        .collect::<Vec<_>>()
        .into_iter()
        .collect();

    Ok(SynthesizedViews {
        views,
        warnings: plan.warnings,
    })
}

/// 推定器でキーポイントを求めてからビューを生成
pub fn estimate_and_synthesize<E: PoseEstimator>(
    estimator: &mut E,
    source: &RgbaImage,
    options: &SynthesisOptions,
) -> anyhow::Result<SynthesizedViews> {
    let keypoints = estimator.estimate(source)?;
    Ok(synthesize(source, &keypoints, options)?)
}

/// PNGにエンコード
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}
