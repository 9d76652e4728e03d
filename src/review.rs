//! 対話式レシート取り込み
//!
//! 画像選択 → 画像確認 → 内容確認（編集・登録）を端末上で進める。

use crate::capture::{ImageSource, SourceKind};
use crate::error::{ReceiptScanError, Result};
use crate::session::SessionStore;
use crate::view;
use crate::workflow::{CaptureStep, CaptureWorkflow};
use dialoguer::{Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use receipt_scan_common::{DraftField, ItemField, ReceiptDraft};
use std::time::Duration;

/// 内容確認画面の操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    EditField(DraftField),
    EditItem,
    AddItem,
    Submit,
    /// 撮り直し
    Retry,
    Quit,
}

impl ReviewAction {
    pub const MENU: [ReviewAction; 8] = [
        ReviewAction::Submit,
        ReviewAction::EditField(DraftField::Store),
        ReviewAction::EditField(DraftField::Date),
        ReviewAction::EditField(DraftField::Total),
        ReviewAction::EditItem,
        ReviewAction::AddItem,
        ReviewAction::Retry,
        ReviewAction::Quit,
    ];

    pub fn label(&self) -> String {
        match self {
            ReviewAction::EditField(field) => format!("{}を修正", field),
            ReviewAction::EditItem => "購入品を修正".into(),
            ReviewAction::AddItem => "購入品を追加".into(),
            ReviewAction::Submit => "この内容で登録".into(),
            ReviewAction::Retry => "撮り直す".into(),
            ReviewAction::Quit => "登録せずに終了".into(),
        }
    }
}

fn cli_err(e: dialoguer::Error) -> ReceiptScanError {
    ReceiptScanError::CliExecution(e.to_string())
}

/// 取り込みを対話で進める。登録できたら `true`、途中で終了したら `false`。
///
/// `preset` があれば最初の1回だけ画像選択を省略してその画像を使う。
pub async fn run_interactive_scan(
    workflow: &mut CaptureWorkflow,
    source: &dyn ImageSource,
    mut preset: Option<&dyn ImageSource>,
    sessions: &SessionStore,
) -> Result<bool> {
    loop {
        match workflow.step() {
            CaptureStep::Select => {
                let (src, kind) = match preset.take() {
                    Some(p) => (p, SourceKind::Library),
                    None => match prompt_source()? {
                        Some(kind) => (source, kind),
                        None => return Ok(false),
                    },
                };

                match workflow.select_image(src, kind).await {
                    Ok(true) => {}
                    Ok(false) => println!("  → キャンセルしました\n"),
                    Err(e) => println!("  ⚠ {}\n", e),
                }
            }

            CaptureStep::Confirm => {
                if let Some(image) = workflow.image() {
                    println!("画像: {}", image);
                }
                let yes = Confirm::new()
                    .with_prompt("この画像を解析しますか？")
                    .default(true)
                    .interact()
                    .map_err(cli_err)?;

                if yes {
                    let spinner = busy_spinner("レシートを解析中...");
                    let result = workflow.confirm().await;
                    spinner.finish_and_clear();
                    result?;
                } else {
                    workflow.reject()?;
                    println!("  → 画像を選び直します\n");
                }
            }

            CaptureStep::Result => {
                if let Some(draft) = workflow.draft() {
                    print!(
                        "\n{}",
                        view::render_draft(draft, workflow.subtotal(), workflow.error_message())
                    );
                }

                match prompt_review_action()? {
                    ReviewAction::EditField(field) => {
                        let current = workflow
                            .draft()
                            .map(|d| field_value(d, field))
                            .unwrap_or_default();
                        let value = prompt_text(&field.to_string(), &current)?;
                        workflow.set_field(field, value)?;
                    }
                    ReviewAction::EditItem => {
                        if let Some((index, name, price)) = prompt_item_edit(workflow.draft())? {
                            workflow.update_item(index, ItemField::Name, name)?;
                            workflow.update_item(index, ItemField::Price, price)?;
                        }
                    }
                    ReviewAction::AddItem => workflow.add_item()?,
                    ReviewAction::Submit => {
                        let auth = sessions.load().and_then(|s| s.auth());
                        let spinner = busy_spinner("登録中...");
                        let result = workflow.submit(auth.as_ref()).await;
                        spinner.finish_and_clear();
                        match result {
                            Ok(_) => {
                                println!("✔ レシートを登録しました");
                                return Ok(true);
                            }
                            Err(e) => log::debug!("登録エラー: {}", e),
                        }
                    }
                    ReviewAction::Retry => {
                        workflow.retry()?;
                        println!("  → 撮り直します\n");
                    }
                    ReviewAction::Quit => return Ok(false),
                }
            }
        }
    }
}

fn busy_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn field_value(draft: &ReceiptDraft, field: DraftField) -> String {
    match field {
        DraftField::Store => draft.store.clone(),
        DraftField::Date => draft.date.clone(),
        DraftField::Total => draft.total.clone(),
    }
}

/// 画像の取得方法を選ぶ（Escで終了）
fn prompt_source() -> Result<Option<SourceKind>> {
    let kinds = [SourceKind::Camera, SourceKind::Library];
    let labels: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();

    let selection = Select::new()
        .with_prompt("レシート画像（Escで終了）")
        .items(&labels)
        .default(0)
        .interact_opt()
        .map_err(cli_err)?;

    Ok(selection.map(|i| kinds[i]))
}

fn prompt_review_action() -> Result<ReviewAction> {
    let labels: Vec<String> = ReviewAction::MENU.iter().map(|a| a.label()).collect();
    let selection = Select::new()
        .with_prompt("操作")
        .items(&labels)
        .default(0)
        .interact_opt()
        .map_err(cli_err)?;

    Ok(selection.map(|i| ReviewAction::MENU[i]).unwrap_or(ReviewAction::Quit))
}

fn prompt_text(label: &str, initial: &str) -> Result<String> {
    Input::new()
        .with_prompt(label)
        .with_initial_text(initial)
        .allow_empty(true)
        .interact_text()
        .map_err(cli_err)
}

/// 修正する購入品を選び、商品名と金額を入力する
fn prompt_item_edit(draft: Option<&ReceiptDraft>) -> Result<Option<(usize, String, String)>> {
    let Some(draft) = draft.filter(|d| !d.items.is_empty()) else {
        println!("  購入品がありません（「購入品を追加」で追加できます）");
        return Ok(None);
    };

    let labels: Vec<String> = draft
        .items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}  {}", i + 1, item.name, item.price))
        .collect();

    let Some(index) = Select::new()
        .with_prompt("修正する購入品（Escで戻る）")
        .items(&labels)
        .default(0)
        .interact_opt()
        .map_err(cli_err)?
    else {
        return Ok(None);
    };

    let item = &draft.items[index];
    let name = prompt_text(&ItemField::Name.to_string(), &item.name)?;
    let price = prompt_text(&ItemField::Price.to_string(), &item.price)?;
    Ok(Some((index, name, price)))
}
