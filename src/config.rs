use anyhow::{Context, Result};
use image::Rgba;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::upload::UploadOptions;
use crate::views::{RegionRules, SynthesisOptions};

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub views: ViewsConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ApiConfig {
    /// バックエンドのベースURL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_presign_path")]
    pub presign_path: String,
    #[serde(default = "default_image_path")]
    pub image_path: String,
    #[serde(default = "default_batch_path")]
    pub batch_path: String,
    #[serde(default = "default_images_list_path")]
    pub images_list_path: String,
    #[serde(default = "default_batches_list_path")]
    pub batches_list_path: String,
    /// API呼び出しのタイムアウト（秒）
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct UploadConfig {
    /// PUT 1件あたりのタイムアウト（秒）
    #[serde(default = "default_put_timeout")]
    pub put_timeout_secs: u64,
    /// 失敗した転送の再試行回数（0 = 再試行なし）
    #[serde(default)]
    pub transfer_retries: u32,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ViewsConfig {
    /// これ未満の信頼度のキーポイントは欠損扱い
    #[serde(default)]
    pub min_confidence: f32,
    /// zoomed ビューもキャンバスにクランプする
    #[serde(default)]
    pub clamp_zoomed: bool,
    /// キャンバス外を切り出したときの塗りつぶし色 (RGBA)
    #[serde(default = "default_background")]
    pub background: [u8; 4],
    #[serde(default = "default_length_margin_y")]
    pub length_margin_y: f32,
    #[serde(default = "default_length_margin_x")]
    pub length_margin_x: f32,
    #[serde(default = "default_zoom_size")]
    pub zoom_size: f32,
}

fn default_base_url() -> String { "http://localhost:5000/api".to_string() }
fn default_presign_path() -> String { "/s3/generate-presigned-urls".to_string() }
fn default_image_path() -> String { "/upload/image".to_string() }
fn default_batch_path() -> String { "/upload/batch".to_string() }
fn default_images_list_path() -> String { "/upload/images".to_string() }
fn default_batches_list_path() -> String { "/upload/batches".to_string() }
fn default_request_timeout() -> u64 { 30 }
fn default_put_timeout() -> u64 { 60 }
fn default_background() -> [u8; 4] { [0, 0, 0, 0] }
fn default_length_margin_y() -> f32 { 30.0 }
fn default_length_margin_x() -> f32 { 60.0 }
fn default_zoom_size() -> f32 { 150.0 }

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            presign_path: default_presign_path(),
            image_path: default_image_path(),
            batch_path: default_batch_path(),
            images_list_path: default_images_list_path(),
            batches_list_path: default_batches_list_path(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            put_timeout_secs: default_put_timeout(),
            transfer_retries: 0,
        }
    }
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.0,
            clamp_zoomed: false,
            background: default_background(),
            length_margin_y: default_length_margin_y(),
            length_margin_x: default_length_margin_x(),
            zoom_size: default_zoom_size(),
        }
    }
}

impl UploadConfig {
    pub fn upload_options(&self) -> UploadOptions {
        UploadOptions {
            put_timeout: Duration::from_secs(self.put_timeout_secs),
            transfer_retries: self.transfer_retries,
            on_state: None,
        }
    }
}

impl ViewsConfig {
    pub fn synthesis_options(&self) -> SynthesisOptions {
        SynthesisOptions {
            rules: RegionRules {
                length_margin_y: self.length_margin_y,
                length_margin_x: self.length_margin_x,
                zoom_size: self.zoom_size,
                clamp_zoomed: self.clamp_zoomed,
            },
            background: Rgba(self.background),
        }
    }
}

impl Config {
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config")?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&content)
    }

    /// ファイルがなければデフォルト設定
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}
