use anyhow::{Context, Result};
use image::RgbaImage;
use serde::Deserialize;
use std::path::Path;

use super::keypoint::{KeypointSet, RawKeypoint};

/// 画像からキーポイントを推定する外部モデルの境界
pub trait PoseEstimator {
    fn estimate(&mut self, image: &RgbaImage) -> Result<KeypointSet>;
}

/// ポーズモデル出力JSON（配列、または `{keypoints: [...]}`）
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PoseDocument {
    Bare(Vec<RawKeypoint>),
    Wrapped { keypoints: Vec<RawKeypoint> },
}

impl PoseDocument {
    fn into_keypoints(self) -> Vec<RawKeypoint> {
        match self {
            PoseDocument::Bare(kps) | PoseDocument::Wrapped { keypoints: kps } => kps,
        }
    }
}

/// 事前に推定済みのキーポイントを返す推定器
///
/// モデルを別プロセスで走らせ、その出力JSONを読み込む場合に使う。
pub struct PrecomputedPose {
    keypoints: KeypointSet,
}

impl PrecomputedPose {
    pub fn new(keypoints: KeypointSet) -> Self {
        Self { keypoints }
    }

    /// JSON文字列から読み込み
    pub fn from_json(json: &str, min_confidence: f32) -> Result<Self> {
        let doc: PoseDocument =
            serde_json::from_str(json).context("Failed to parse pose keypoints JSON")?;
        let raw = doc.into_keypoints();
        Ok(Self::new(KeypointSet::from_raw(&raw, min_confidence)))
    }

    /// JSONファイルから読み込み
    pub fn load<P: AsRef<Path>>(path: P, min_confidence: f32) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read keypoints file {}", path.display()))?;
        Self::from_json(&content, min_confidence)
    }
}

impl PoseEstimator for PrecomputedPose {
    fn estimate(&mut self, _image: &RgbaImage) -> Result<KeypointSet> {
        Ok(self.keypoints.clone())
    }
}
