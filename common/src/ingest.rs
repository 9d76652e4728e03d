//! サーバーレスポンスの取り込み
//!
//! レスポンス形状の揺れはここだけで吸収する:
//! - 一覧: 配列そのもの / `{ receipts: [...] }` / `{ data: [...] }`
//! - レコード: 同義キー（`storeName`, `receiptDate`, `purchaseDate`, `totalAmount`）
//! - OCR: `{ formatted: {...} }` / テキスト

use crate::types::{lenient_number, OcrOutput, StoredReceipt};
use serde_json::{Map, Value};

/// 店舗名として認めるキー（先頭優先）
pub const STORE_KEYS: &[&str] = &["store", "storeName"];
/// 日付として認めるキー（先頭優先）
pub const DATE_KEYS: &[&str] = &["date", "receiptDate", "purchaseDate"];
/// 合計金額として認めるキー（先頭優先）
pub const TOTAL_KEYS: &[&str] = &["total", "totalAmount"];

/// 一覧を包むキー
const LIST_KEYS: &[&str] = &["receipts", "data"];

/// OCRテキストとして認めるキー
const OCR_TEXT_KEYS: &[&str] = &["text", "rawText", "fullText"];

/// 最初に存在する（nullでない）キーの値
fn first_present<'a>(record: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find(|value| !value.is_null())
}

impl StoredReceipt {
    /// JSONレコードを正規形に変換する（オブジェクト以外は `None`）
    pub fn from_value(value: &Value) -> Option<Self> {
        let record = value.as_object()?;

        let store = first_present(record, STORE_KEYS).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
        let date = match first_present(record, DATE_KEYS) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        let total = first_present(record, TOTAL_KEYS).and_then(lenient_number);
        let id = record.get("id").and_then(|v| match v {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        });

        Some(Self { id, store, date, total })
    }
}

/// 一覧レスポンスを正規化する
///
/// 未知の形状は空の一覧として扱う。配列内のオブジェクト以外の要素は捨てる。
pub fn normalize_receipt_list(body: &Value) -> Vec<StoredReceipt> {
    let list = match body {
        Value::Array(items) => Some(items),
        Value::Object(map) => LIST_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(Value::as_array),
        _ => None,
    };

    list.map(|items| items.iter().filter_map(StoredReceipt::from_value).collect())
        .unwrap_or_default()
}

/// OCRエンドポイントの成功レスポンス本文を解釈する
///
/// 読み取り結果が無い場合は `None`。
pub fn parse_ocr_body(body: &str) -> Option<OcrOutput> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let value: Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        // JSONでない本文は生テキストとみなす
        Err(_) => return Some(OcrOutput::Text(trimmed.to_string())),
    };

    match value {
        Value::String(text) if !text.trim().is_empty() => Some(OcrOutput::Text(text)),
        Value::Object(map) => {
            if let Some(formatted) = map.get("formatted").filter(|v| v.is_object()) {
                return Some(OcrOutput::Formatted(formatted.clone()));
            }
            OCR_TEXT_KEYS
                .iter()
                .filter_map(|key| map.get(*key))
                .filter_map(Value::as_str)
                .find(|text| !text.trim().is_empty())
                .map(|text| OcrOutput::Text(text.to_string()))
        }
        _ => None,
    }
}
