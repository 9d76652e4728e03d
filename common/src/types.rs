//! レシートの型定義
//!
//! CLIとライブラリで共有される型:
//! - ReceiptDraft: 確認・修正中のレシート（金額はテキストのまま保持）
//! - StructuredReceipt: 構造化サービスの出力
//! - SubmitPayload: 登録APIへ送る内容（金額は数値）
//! - StoredReceipt: サーバー上の登録済みレシート（正規化済み）

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 購入品（編集中）
///
/// `price` は入力途中の値を失わないようテキストで保持する。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptItem {
    pub name: String,
    pub price: String,
}

impl ReceiptItem {
    pub fn new(name: impl Into<String>, price: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            price: price.into(),
        }
    }
}

/// 確認・修正中のレシート
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiptDraft {
    pub store: String,
    pub date: String,
    pub total: String,
    pub items: Vec<ReceiptItem>,
}

/// 構造化サービスが返す購入品
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredItem {
    #[serde(deserialize_with = "deserialize_lenient_string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "deserialize_lenient_number")]
    pub price: Option<f64>,
}

/// 構造化サービスの出力
///
/// LLMは数値を文字列で返すことがあるため、金額は数値・数値文字列の両方を受け付ける。
/// 型の合わないフィールドは未設定扱い、読めない購入品は空の購入品になる。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredReceipt {
    #[serde(deserialize_with = "deserialize_lenient_string")]
    pub store: Option<String>,
    #[serde(deserialize_with = "deserialize_lenient_string")]
    pub date: Option<String>,
    #[serde(deserialize_with = "deserialize_lenient_number")]
    pub total: Option<f64>,
    #[serde(deserialize_with = "deserialize_lenient_items")]
    pub items: Option<Vec<StructuredItem>>,
}

/// 登録APIへ送る購入品
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubmitItem {
    pub name: String,
    #[serde(serialize_with = "serialize_amount")]
    pub price: f64,
}

/// 登録APIへ送る内容
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubmitPayload {
    pub store: String,
    pub date: String,
    #[serde(serialize_with = "serialize_amount")]
    pub total: f64,
    pub items: Vec<SubmitItem>,
}

/// 登録済みレシート（同義キーを解決した正規形）
///
/// `date` は日付系キーのうち最初に存在した値。どれも無ければ空文字。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoredReceipt {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
}

impl StoredReceipt {
    /// 店舗名（未登録なら表示用の既定文言）
    pub fn store_label(&self) -> &str {
        self.store.as_deref().unwrap_or("店舗名未登録")
    }

    pub fn total_or_zero(&self) -> f64 {
        self.total.unwrap_or(0.0)
    }
}

/// OCRエンドポイントの解釈結果
#[derive(Debug, Clone, PartialEq)]
pub enum OcrOutput {
    /// バックエンドが構造化まで済ませたオブジェクト
    Formatted(serde_json::Value),
    /// 読み取った生テキスト
    Text(String),
}

/// 金額を数値・数値文字列のどちらからでも読む
fn deserialize_lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(lenient_number))
}

/// 文字列はそのまま、数値・真偽値はテキストとして読む
fn deserialize_lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// 購入品の配列を1件ずつ読む（オブジェクトでない要素は空の購入品）
fn deserialize_lenient_items<'de, D>(
    deserializer: D,
) -> Result<Option<Vec<StructuredItem>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Array(entries)) => Some(
            entries
                .into_iter()
                .map(|entry| serde_json::from_value::<StructuredItem>(entry).unwrap_or_default())
                .collect(),
        ),
        _ => None,
    })
}

/// JSON値から金額を取り出す（数値、または数値として読める文字列）
pub fn lenient_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => crate::draft::parse_number(s),
        _ => None,
    }
}

/// 整数値は整数としてシリアライズする（`1200.0` ではなく `1200`）
fn serialize_amount<S>(amount: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if amount.fract() == 0.0 && amount.abs() < i64::MAX as f64 {
        serializer.serialize_i64(*amount as i64)
    } else {
        serializer.serialize_f64(*amount)
    }
}
