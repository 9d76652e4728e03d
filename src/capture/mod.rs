//! 画像の取得とエンコード
//!
//! - ImageSource: 撮影・ライブラリ選択（キャンセルは `None`）
//! - ImageEncoder: 画像を送信用のBase64に変換

mod codec;
mod terminal;

pub use codec::{mime_for_path, ImageCodec};
pub use terminal::{scan_images, TerminalImageSource};

use crate::error::{ReceiptScanError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// 端末上の画像への参照（1回の取り込みの間だけ有効）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHandle {
    path: PathBuf,
}

impl ImageHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

impl std::fmt::Display for ImageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// 画像の取得方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// レシートを撮影
    Camera,
    /// 画像を添付
    Library,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Camera => write!(f, "レシートを撮影"),
            SourceKind::Library => write!(f, "画像を添付"),
        }
    }
}

/// 送信用にエンコードした画像
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: String,
    pub base64: String,
}

#[async_trait]
pub trait ImageSource: Send + Sync {
    /// 画像を取得する。ユーザーがキャンセルした場合は `Ok(None)`。
    async fn acquire(&self, kind: SourceKind) -> Result<Option<ImageHandle>>;
}

#[async_trait]
pub trait ImageEncoder: Send + Sync {
    async fn encode(&self, image: &ImageHandle) -> Result<EncodedImage>;
}

/// 指定済みのファイルを返すだけの取得元（`scan --image`）
pub struct PathImageSource {
    path: PathBuf,
}

impl PathImageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ImageSource for PathImageSource {
    async fn acquire(&self, _kind: SourceKind) -> Result<Option<ImageHandle>> {
        if !self.path.is_file() {
            return Err(ReceiptScanError::FileNotFound(self.path.display().to_string()));
        }
        Ok(Some(ImageHandle::new(&self.path)))
    }
}
