use crate::error::{ReceiptScanError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";
pub const API_BASE_URL_ENV: &str = "RECEIPT_API_BASE_URL";
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// 構造化サービスへの入力方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructuringMode {
    /// OCRテキストを構造化する
    #[default]
    Text,
    /// 画像を直接構造化する（OCRを呼ばない）
    Image,
}

impl std::str::FromStr for StructuringMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "ocr" => Ok(StructuringMode::Text),
            "image" | "vision" => Ok(StructuringMode::Image),
            _ => Err(format!("Unknown structuring mode: {}. Use text or image", s)),
        }
    }
}

impl std::fmt::Display for StructuringMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StructuringMode::Text => write!(f, "text"),
            StructuringMode::Image => write!(f, "image"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub structuring_mode: StructuringMode,
    pub max_image_size: u32,
    pub timeout_seconds: u64,
    /// 撮影コマンド（`{output}` を保存先パスに置換）
    pub camera_command: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: None,
            gemini_api_key: None,
            gemini_model: "gemini-2.0-flash".into(),
            structuring_mode: StructuringMode::Text,
            max_image_size: 1600, // レシートの細かい文字が潰れない程度
            timeout_seconds: 120,
            camera_command: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &std::path::Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &std::path::Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| ReceiptScanError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("receipt-scan"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// APIの接続先（環境変数 > 設定ファイル > 既定値）
    pub fn api_base_url(&self) -> String {
        let from_env = std::env::var(API_BASE_URL_ENV).ok();
        resolve_base_url(from_env.as_deref(), self.api_base_url.as_deref())
    }

    pub fn get_gemini_api_key(&self) -> Result<String> {
        // 環境変数を優先
        if let Ok(key) = std::env::var(GEMINI_API_KEY_ENV) {
            if !key.trim().is_empty() {
                return Ok(key);
            }
        }

        self.gemini_api_key.clone().ok_or(ReceiptScanError::MissingApiKey)
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }
}

/// 接続先の決定。末尾の `/` は取り除く。
pub fn resolve_base_url(from_env: Option<&str>, from_config: Option<&str>) -> String {
    let chosen = [from_env, from_config]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|url| !url.is_empty())
        .unwrap_or(DEFAULT_API_BASE_URL);
    chosen.trim_end_matches('/').to_string()
}
