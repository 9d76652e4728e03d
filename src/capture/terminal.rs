//! 端末からの画像取得
//!
//! - 撮影: 設定の撮影コマンドを実行（`{output}` を保存先パスに置換）
//! - 添付: ファイルを直接指定、またはフォルダ内の画像から選択
//!
//! Escや空入力はキャンセルとして `None` を返す。

use super::{ImageHandle, ImageSource, SourceKind};
use crate::error::{ReceiptScanError, Result};
use async_trait::async_trait;
use dialoguer::{Input, Select};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "heic"];

pub struct TerminalImageSource {
    camera_command: Option<String>,
    capture_dir: PathBuf,
    library_dir: PathBuf,
}

impl TerminalImageSource {
    pub fn new(camera_command: Option<String>, capture_dir: PathBuf, library_dir: PathBuf) -> Self {
        Self {
            camera_command,
            capture_dir,
            library_dir,
        }
    }

    async fn capture(&self) -> Result<Option<ImageHandle>> {
        let template = self
            .camera_command
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                ReceiptScanError::CameraUnavailable(
                    "撮影コマンドが未設定です（config --set-camera-command）".into(),
                )
            })?;

        std::fs::create_dir_all(&self.capture_dir)?;
        let output = self.capture_dir.join(format!(
            "receipt-{}.jpg",
            chrono::Local::now().format("%Y%m%d-%H%M%S")
        ));

        let (program, args) = build_capture_command(template, &output)?;
        log::debug!("撮影コマンド: {} {:?}", program, args);

        let status = tokio::process::Command::new(&program)
            .args(&args)
            .status()
            .await
            .map_err(|e| ReceiptScanError::CameraUnavailable(format!("{}: {}", program, e)))?;

        if !status.success() {
            return Err(ReceiptScanError::AcquisitionFailed(format!(
                "撮影コマンドが失敗しました (code {:?})",
                status.code()
            )));
        }

        // 撮影せずに終了した場合はキャンセル扱い
        if output.is_file() {
            Ok(Some(ImageHandle::new(output)))
        } else {
            Ok(None)
        }
    }

    fn pick_from_library(&self) -> Result<Option<ImageHandle>> {
        let input: String = Input::new()
            .with_prompt("画像ファイルまたはフォルダ（空欄でキャンセル）")
            .with_initial_text(self.library_dir.display().to_string())
            .allow_empty(true)
            .interact_text()
            .map_err(|e| ReceiptScanError::CliExecution(e.to_string()))?;

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let path = PathBuf::from(trimmed);
        if path.is_file() {
            return Ok(Some(ImageHandle::new(path)));
        }

        let images = scan_images(&path)?;
        if images.is_empty() {
            println!("  画像が見つかりません: {}", path.display());
            return Ok(None);
        }

        let names: Vec<String> = images
            .iter()
            .map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default())
            .collect();

        let selection = Select::new()
            .with_prompt("添付する画像を選択（Escでキャンセル）")
            .items(&names)
            .default(0)
            .interact_opt()
            .map_err(|e| ReceiptScanError::CliExecution(e.to_string()))?;

        Ok(selection.map(|idx| ImageHandle::new(images[idx].clone())))
    }
}

#[async_trait]
impl ImageSource for TerminalImageSource {
    async fn acquire(&self, kind: SourceKind) -> Result<Option<ImageHandle>> {
        match kind {
            SourceKind::Camera => self.capture().await,
            SourceKind::Library => self.pick_from_library(),
        }
    }
}

/// 撮影コマンドのテンプレートを展開する
fn build_capture_command(template: &str, output: &Path) -> Result<(String, Vec<String>)> {
    let output = output.display().to_string();
    let mut parts = template
        .split_whitespace()
        .map(|part| part.replace("{output}", &output));

    let program = parts
        .next()
        .ok_or_else(|| ReceiptScanError::CameraUnavailable("撮影コマンドが空です".into()))?;
    let mut args: Vec<String> = parts.collect();

    // プレースホルダが無ければ保存先を末尾に付ける
    if !template.contains("{output}") {
        args.push(output);
    }

    Ok((program, args))
}

/// フォルダ直下の画像をファイル名順で列挙する
pub fn scan_images(folder: &Path) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        return Err(ReceiptScanError::FileNotFound(folder.display().to_string()));
    }

    let mut images: Vec<PathBuf> = WalkDir::new(folder)
        .max_depth(1) // 直下のみ（再帰しない）
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|path| path.is_file() && is_image_path(path))
        .collect();

    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    Ok(images)
}

fn is_image_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}
