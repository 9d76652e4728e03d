//! 画像エンコード
//!
//! 長辺が `max_image_size` を超える画像は縮小してJPEGで再エンコードする。
//! デコードできない形式（HEIC等）はそのまま送り、読み取り可否はOCR側に任せる。

use super::{EncodedImage, ImageEncoder, ImageHandle};
use crate::error::{ReceiptScanError, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use std::path::Path;

const JPEG_QUALITY: u8 = 85;

#[derive(Debug, Clone, Copy)]
pub struct ImageCodec {
    max_image_size: u32,
}

impl ImageCodec {
    /// `max_image_size` が0なら縮小しない
    pub fn new(max_image_size: u32) -> Self {
        Self { max_image_size }
    }

    pub fn encode_bytes(&self, bytes: &[u8], mime_type: &str) -> Result<EncodedImage> {
        if bytes.is_empty() {
            return Err(ReceiptScanError::ImageLoad("画像ファイルが空です".into()));
        }

        let img = match image::load_from_memory(bytes) {
            Ok(img) => img,
            Err(e) => {
                log::debug!("画像をデコードできないため元データを送信: {}", e);
                return Ok(EncodedImage {
                    mime_type: mime_type.to_string(),
                    base64: STANDARD.encode(bytes),
                });
            }
        };

        let (width, height) = img.dimensions();
        if self.max_image_size == 0 || width.max(height) <= self.max_image_size {
            return Ok(EncodedImage {
                mime_type: mime_type.to_string(),
                base64: STANDARD.encode(bytes),
            });
        }

        let resized = img.resize(self.max_image_size, self.max_image_size, FilterType::Lanczos3);
        log::debug!(
            "画像を縮小: {}x{} → {}x{}",
            width,
            height,
            resized.width(),
            resized.height()
        );

        let mut buffer = Vec::new();
        DynamicImage::ImageRgb8(resized.to_rgb8())
            .write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY))
            .map_err(|e| ReceiptScanError::ImageLoad(format!("JPEG変換エラー: {}", e)))?;

        Ok(EncodedImage {
            mime_type: "image/jpeg".into(),
            base64: STANDARD.encode(&buffer),
        })
    }
}

#[async_trait]
impl ImageEncoder for ImageCodec {
    async fn encode(&self, image: &ImageHandle) -> Result<EncodedImage> {
        let path = image.path();
        if !path.is_file() {
            return Err(ReceiptScanError::FileNotFound(path.display().to_string()));
        }
        let bytes = tokio::fs::read(path).await?;
        let mime_type = mime_for_path(path);

        // デコード・縮小はブロッキングスレッドで行う
        let codec = *self;
        tokio::task::spawn_blocking(move || codec.encode_bytes(&bytes, mime_type))
            .await
            .map_err(|e| ReceiptScanError::ImageLoad(format!("画像処理が中断されました: {}", e)))?
    }
}

/// 拡張子からMIMEタイプを推定（不明ならJPEG）
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        _ => "image/jpeg",
    }
}
