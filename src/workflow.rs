//! レシート取り込みワークフロー
//!
//! select（画像選択）→ confirm（画像確認）→ result（内容確認・登録）の3状態。
//! confirm で「はい」を選ぶと エンコード → OCR → 構造化 を順に実行し、
//! 成否にかかわらず result に進む（失敗時は空の下書き＋メッセージ）。
//!
//! 解析中は busy になり、同じワークフローで2本目のパイプラインは走らない。
//! やり直し・却下でセッションIDが進むため、古い解析結果は破棄される。

use crate::api::{OcrService, ReceiptStore, StructuringInput, StructuringService};
use crate::capture::{ImageEncoder, ImageHandle, ImageSource, SourceKind};
use crate::config::StructuringMode;
use crate::error::{ReceiptScanError, Result};
use receipt_scan_common::{
    parse_structured_value, AuthContext, DraftField, ItemField, OcrOutput, ReceiptDraft,
    ReceiptDraftEditor, StructuredReceipt,
};
use std::sync::Arc;
use std::time::Duration;

pub const MSG_PROCESSING_FAILED: &str = "処理に失敗しました";
pub const MSG_UNREADABLE: &str = "解析結果を読み取れませんでした";
pub const MSG_NOT_SIGNED_IN: &str = "ログイン情報がありません";
pub const MSG_SUBMIT_FAILED: &str = "登録に失敗しました";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStep {
    Select,
    Confirm,
    Result,
}

impl std::fmt::Display for CaptureStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureStep::Select => write!(f, "画像選択"),
            CaptureStep::Confirm => write!(f, "画像確認"),
            CaptureStep::Result => write!(f, "内容確認"),
        }
    }
}

/// 解析パイプラインの失敗理由
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineFailure {
    Encode(String),
    Ocr(String),
    /// OCRは成功したが読み取れた内容が無い
    NoText,
    Structuring(String),
    /// 構造化結果がレシートの形になっていない
    Malformed(String),
    Timeout,
}

impl PipelineFailure {
    pub fn user_message(&self) -> &'static str {
        match self {
            PipelineFailure::NoText | PipelineFailure::Malformed(_) => MSG_UNREADABLE,
            PipelineFailure::Encode(_)
            | PipelineFailure::Ocr(_)
            | PipelineFailure::Structuring(_)
            | PipelineFailure::Timeout => MSG_PROCESSING_FAILED,
        }
    }
}

impl std::fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineFailure::Encode(e) => write!(f, "エンコード失敗: {}", e),
            PipelineFailure::Ocr(e) => write!(f, "OCR失敗: {}", e),
            PipelineFailure::NoText => write!(f, "OCR結果なし"),
            PipelineFailure::Structuring(e) => write!(f, "構造化失敗: {}", e),
            PipelineFailure::Malformed(e) => write!(f, "構造化結果が不正: {}", e),
            PipelineFailure::Timeout => write!(f, "タイムアウト"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub draft: ReceiptDraft,
    pub failure: Option<PipelineFailure>,
}

/// パイプラインが使うサービス一式
#[derive(Clone)]
pub struct PipelineServices {
    pub encoder: Arc<dyn ImageEncoder>,
    pub ocr: Arc<dyn OcrService>,
    pub structuring: Arc<dyn StructuringService>,
    pub mode: StructuringMode,
    pub timeout: Option<Duration>,
}

/// `begin_confirm` が発行する解析の引換券
#[derive(Debug, Clone)]
pub struct PipelineTicket {
    session: u64,
    image: ImageHandle,
}

impl PipelineTicket {
    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn image(&self) -> &ImageHandle {
        &self.image
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Registered,
}

/// 画像を解析して下書きを作る
///
/// 失敗しても必ず下書き（空）を返す。全体に `services.timeout` の期限をかける。
pub async fn run_pipeline(services: &PipelineServices, image: &ImageHandle) -> PipelineOutcome {
    let result = match services.timeout {
        Some(limit) => tokio::time::timeout(limit, pipeline_stages(services, image))
            .await
            .unwrap_or(Err(PipelineFailure::Timeout)),
        None => pipeline_stages(services, image).await,
    };

    match result {
        Ok(structured) => PipelineOutcome {
            draft: ReceiptDraft::from_structured(&structured),
            failure: None,
        },
        Err(failure) => {
            log::warn!("解析失敗 ({}): {}", image.file_name(), failure);
            PipelineOutcome {
                draft: ReceiptDraft::empty(),
                failure: Some(failure),
            }
        }
    }
}

async fn pipeline_stages(
    services: &PipelineServices,
    image: &ImageHandle,
) -> std::result::Result<StructuredReceipt, PipelineFailure> {
    let encoded = services
        .encoder
        .encode(image)
        .await
        .map_err(|e| PipelineFailure::Encode(e.to_string()))?;
    log::debug!("エンコード完了: {} ({})", image.file_name(), encoded.mime_type);

    if services.mode == StructuringMode::Image {
        return services
            .structuring
            .structure(StructuringInput::Image(&encoded))
            .await
            .map_err(structuring_failure);
    }

    let output = services
        .ocr
        .recognize(&encoded)
        .await
        .map_err(|e| PipelineFailure::Ocr(e.to_string()))?
        .ok_or(PipelineFailure::NoText)?;

    match output {
        OcrOutput::Formatted(value) => {
            log::debug!("OCR結果は構造化済み");
            parse_structured_value(&value).map_err(|e| PipelineFailure::Malformed(e.to_string()))
        }
        OcrOutput::Text(text) => {
            log::debug!("OCRテキスト: {} chars", text.chars().count());
            services
                .structuring
                .structure(StructuringInput::Text(&text))
                .await
                .map_err(structuring_failure)
        }
    }
}

fn structuring_failure(e: ReceiptScanError) -> PipelineFailure {
    match e {
        ReceiptScanError::ApiParse(msg) => PipelineFailure::Malformed(msg),
        ReceiptScanError::Common(err) => PipelineFailure::Malformed(err.to_string()),
        other => PipelineFailure::Structuring(other.to_string()),
    }
}

pub struct CaptureWorkflow {
    services: PipelineServices,
    store: Arc<dyn ReceiptStore>,
    step: CaptureStep,
    image: Option<ImageHandle>,
    editor: Option<ReceiptDraftEditor>,
    error_message: Option<String>,
    last_failure: Option<PipelineFailure>,
    busy: bool,
    session: u64,
}

impl CaptureWorkflow {
    pub fn new(services: PipelineServices, store: Arc<dyn ReceiptStore>) -> Self {
        Self {
            services,
            store,
            step: CaptureStep::Select,
            image: None,
            editor: None,
            error_message: None,
            last_failure: None,
            busy: false,
            session: 0,
        }
    }

    pub fn step(&self) -> CaptureStep {
        self.step
    }

    pub fn image(&self) -> Option<&ImageHandle> {
        self.image.as_ref()
    }

    pub fn draft(&self) -> Option<&ReceiptDraft> {
        self.editor.as_ref().map(|e| e.draft())
    }

    pub fn subtotal(&self) -> f64 {
        self.editor.as_ref().map(|e| e.subtotal()).unwrap_or(0.0)
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn last_failure(&self) -> Option<&PipelineFailure> {
        self.last_failure.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn session_id(&self) -> u64 {
        self.session
    }

    pub fn services(&self) -> &PipelineServices {
        &self.services
    }

    fn require(&self, step: CaptureStep, action: &str) -> Result<()> {
        if self.step != step || self.busy {
            let current = if self.busy {
                format!("{}（解析中）", self.step)
            } else {
                self.step.to_string()
            };
            return Err(ReceiptScanError::InvalidTransition {
                step: current,
                action: action.to_string(),
            });
        }
        Ok(())
    }

    /// 画像とセッションを破棄して select に戻る
    fn restart(&mut self) {
        self.session += 1;
        self.image = None;
        self.editor = None;
        self.error_message = None;
        self.last_failure = None;
        self.busy = false;
        self.step = CaptureStep::Select;
    }

    /// 画像を取得する。取得できたら `true`（confirm へ）、キャンセルなら `false`。
    pub async fn select_image(
        &mut self,
        source: &dyn ImageSource,
        kind: SourceKind,
    ) -> Result<bool> {
        self.require(CaptureStep::Select, "画像選択")?;
        self.error_message = None;

        match source.acquire(kind).await {
            Ok(Some(image)) => {
                log::debug!("画像取得: {}", image);
                self.image = Some(image);
                self.step = CaptureStep::Confirm;
                Ok(true)
            }
            Ok(None) => {
                log::debug!("画像取得キャンセル ({})", kind);
                Ok(false)
            }
            Err(e) => {
                self.error_message = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// 確認画面で「いいえ」。解析中でも受け付け、その結果は破棄される。
    pub fn reject(&mut self) -> Result<()> {
        if self.step != CaptureStep::Confirm {
            return Err(ReceiptScanError::InvalidTransition {
                step: self.step.to_string(),
                action: "画像の却下".into(),
            });
        }
        self.restart();
        Ok(())
    }

    /// 内容確認画面から撮り直す
    pub fn retry(&mut self) -> Result<()> {
        self.require(CaptureStep::Result, "撮り直し")?;
        self.restart();
        Ok(())
    }

    pub fn begin_confirm(&mut self) -> Result<PipelineTicket> {
        self.require(CaptureStep::Confirm, "解析開始")?;
        let image = self.image.clone().ok_or_else(|| ReceiptScanError::InvalidTransition {
            step: self.step.to_string(),
            action: "解析開始（画像なし）".into(),
        })?;

        self.busy = true;
        self.error_message = None;
        Ok(PipelineTicket {
            session: self.session,
            image,
        })
    }

    /// 解析結果を反映する。セッションが変わっていれば破棄して `false`。
    pub fn finish_confirm(&mut self, ticket: PipelineTicket, outcome: PipelineOutcome) -> bool {
        if ticket.session != self.session || !self.busy {
            log::debug!(
                "古い解析結果を破棄 (session {} / current {})",
                ticket.session,
                self.session
            );
            return false;
        }

        self.busy = false;
        self.error_message = outcome.failure.as_ref().map(|f| f.user_message().to_string());
        self.last_failure = outcome.failure;
        self.editor = Some(ReceiptDraftEditor::new(outcome.draft));
        self.step = CaptureStep::Result;
        true
    }

    /// 確認画面で「はい」。解析が終わるまで待ち、result に進む。
    pub async fn confirm(&mut self) -> Result<()> {
        let ticket = self.begin_confirm()?;
        let outcome = run_pipeline(&self.services, ticket.image()).await;
        self.finish_confirm(ticket, outcome);
        Ok(())
    }

    fn editor_mut(&mut self, action: &str) -> Result<&mut ReceiptDraftEditor> {
        self.require(CaptureStep::Result, action)?;
        let step = self.step.to_string();
        self.editor.as_mut().ok_or_else(|| ReceiptScanError::InvalidTransition {
            step,
            action: action.to_string(),
        })
    }

    pub fn set_field(&mut self, field: DraftField, value: impl Into<String>) -> Result<()> {
        self.editor_mut("下書きの編集")?.set_field(field, value);
        Ok(())
    }

    pub fn update_item(
        &mut self,
        index: usize,
        field: ItemField,
        value: impl Into<String>,
    ) -> Result<()> {
        self.editor_mut("購入品の編集")?.update_item(index, field, value)?;
        Ok(())
    }

    pub fn add_item(&mut self) -> Result<()> {
        self.editor_mut("購入品の追加")?.add_item();
        Ok(())
    }

    /// 下書きを登録する
    ///
    /// ログイン情報が無ければ通信せずに `NotSignedIn`。
    /// 失敗時は result に留まり、下書きはそのまま残る。
    pub async fn submit(&mut self, auth: Option<&AuthContext>) -> Result<SubmitOutcome> {
        self.require(CaptureStep::Result, "登録")?;
        let payload = match &self.editor {
            Some(editor) => editor.draft().to_submission(),
            None => {
                return Err(ReceiptScanError::InvalidTransition {
                    step: self.step.to_string(),
                    action: "登録（下書きなし）".into(),
                })
            }
        };

        let Some(auth) = auth else {
            self.error_message = Some(MSG_NOT_SIGNED_IN.to_string());
            return Err(ReceiptScanError::NotSignedIn);
        };

        match self.store.submit(auth, &payload).await {
            Ok(()) => {
                log::debug!("登録完了: {} {}", payload.store, payload.date);
                self.restart();
                Ok(SubmitOutcome::Registered)
            }
            Err(e) => {
                log::warn!("登録失敗: {}", e);
                self.error_message = Some(MSG_SUBMIT_FAILED.to_string());
                Err(e)
            }
        }
    }
}
