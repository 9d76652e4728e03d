//! レシート下書きの編集
//!
//! 確認画面でユーザーが修正する下書きを扱う。
//! 金額はテキストのまま保持し、数値化は小計計算と登録時のみ行う。

use crate::error::{Error, Result};
use crate::types::{ReceiptDraft, ReceiptItem, StructuredReceipt, SubmitItem, SubmitPayload};

/// 下書きの上位フィールド
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Store,
    Date,
    Total,
}

impl std::fmt::Display for DraftField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DraftField::Store => write!(f, "店舗名"),
            DraftField::Date => write!(f, "日付"),
            DraftField::Total => write!(f, "合計金額"),
        }
    }
}

/// 購入品のフィールド
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemField {
    Name,
    Price,
}

impl std::fmt::Display for ItemField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemField::Name => write!(f, "商品名"),
            ItemField::Price => write!(f, "金額"),
        }
    }
}

/// 10進表記のテキストを数値化する
///
/// 空文字・数値でないテキストは `None`。前後の空白は無視する。
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    // f64::from_str は "inf" や "NaN" も受け付けるので有限値に限る
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | 'e' | 'E'))
    {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// 金額をテキスト化する（整数なら小数点なし）
pub fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 && amount.abs() < i64::MAX as f64 {
        format!("{}", amount as i64)
    } else {
        format!("{}", amount)
    }
}

impl ReceiptDraft {
    /// 全フィールド空の下書き（解析失敗時の手入力用）
    pub fn empty() -> Self {
        Self::default()
    }

    /// 構造化結果から下書きを作る
    pub fn from_structured(structured: &StructuredReceipt) -> Self {
        Self {
            store: structured.store.clone().unwrap_or_default(),
            date: structured.date.clone().unwrap_or_default(),
            total: structured.total.map(format_amount).unwrap_or_default(),
            items: structured
                .items
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|item| ReceiptItem {
                    name: item.name.clone().unwrap_or_default(),
                    price: item.price.map(format_amount).unwrap_or_default(),
                })
                .collect(),
        }
    }

    /// 上位フィールドを1つ差し替えた新しい下書き
    pub fn with_field(&self, field: DraftField, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        let value = value.into();
        match field {
            DraftField::Store => next.store = value,
            DraftField::Date => next.date = value,
            DraftField::Total => next.total = value,
        }
        next
    }

    /// 購入品1件のフィールドを差し替えた新しい下書き
    pub fn with_item_field(
        &self,
        index: usize,
        field: ItemField,
        value: impl Into<String>,
    ) -> Result<Self> {
        let len = self.items.len();
        let mut next = self.clone();
        let item = next
            .items
            .get_mut(index)
            .ok_or(Error::ItemIndexOutOfRange { index, len })?;
        match field {
            ItemField::Name => item.name = value.into(),
            ItemField::Price => item.price = value.into(),
        }
        Ok(next)
    }

    /// 空の購入品を末尾に追加した新しい下書き
    pub fn with_new_item(&self) -> Self {
        let mut next = self.clone();
        next.items.push(ReceiptItem::default());
        next
    }

    /// 購入品の小計（数値でない金額は0として扱う）
    pub fn items_subtotal(&self) -> f64 {
        self.items
            .iter()
            .map(|item| parse_number(&item.price).unwrap_or(0.0))
            .sum()
    }

    /// 登録APIへ送る内容を組み立てる
    ///
    /// 空欄チェックは行わない。呼び出し側の業務ルールに任せる。
    pub fn to_submission(&self) -> SubmitPayload {
        SubmitPayload {
            store: self.store.clone(),
            date: self.date.clone(),
            total: parse_number(&self.total).unwrap_or(0.0),
            items: self
                .items
                .iter()
                .map(|item| SubmitItem {
                    name: item.name.clone(),
                    price: parse_number(&item.price).unwrap_or(0.0),
                })
                .collect(),
        }
    }
}

/// 確認画面の下書きエディタ
///
/// 各操作は新しい下書きに置き換える。`draft()` で得た参照は次の編集で古くなる。
#[derive(Debug, Clone, Default)]
pub struct ReceiptDraftEditor {
    draft: ReceiptDraft,
}

impl ReceiptDraftEditor {
    pub fn new(draft: ReceiptDraft) -> Self {
        Self { draft }
    }

    pub fn draft(&self) -> &ReceiptDraft {
        &self.draft
    }

    pub fn into_draft(self) -> ReceiptDraft {
        self.draft
    }

    pub fn set_field(&mut self, field: DraftField, value: impl Into<String>) {
        self.draft = self.draft.with_field(field, value);
    }

    pub fn update_item(
        &mut self,
        index: usize,
        field: ItemField,
        value: impl Into<String>,
    ) -> Result<()> {
        self.draft = self.draft.with_item_field(index, field, value)?;
        Ok(())
    }

    pub fn add_item(&mut self) {
        self.draft = self.draft.with_new_item();
    }

    pub fn subtotal(&self) -> f64 {
        self.draft.items_subtotal()
    }
}
