//! 構造化レスポンスパーサー
//!
//! LLMのレスポンスからJSONを抽出し、構造化レシートとしてパースする

use crate::error::{Error, Result};
use crate::types::StructuredReceipt;
use serde_json::Value;

/// APIレスポンスからJSON部分を抽出
///
/// 抽出優先順位:
/// 1. ```json ... ``` ブロック
/// 2. 生の {...} オブジェクト
/// 3. エラー
///
/// # Examples
/// ```
/// use receipt_scan_common::extract_json;
///
/// let response = "結果: {\"store\": \"A\"} 以上";
/// let json = extract_json(response).unwrap();
/// assert_eq!(json, "{\"store\": \"A\"}");
/// ```
pub fn extract_json(response: &str) -> Result<&str> {
    // ```json ... ``` ブロックを探す
    if let Some(start_marker) = response.find("```json") {
        let start = start_marker + 7; // "```json" の長さ
        if let Some(end_offset) = response[start..].find("```") {
            let end = start + end_offset;
            return Ok(response[start..end].trim());
        }
    }

    // 生の {...} を探す
    if let Some(start) = response.find('{') {
        if let Some(end) = response.rfind('}') {
            if end >= start {
                return Ok(&response[start..=end]);
            }
        }
    }

    Err(Error::Parse("JSONが見つかりません".into()))
}

/// JSON値を構造化レシートとして解釈する
///
/// オブジェクト以外はエラー。型の合わないフィールドは未設定として読む。
pub fn parse_structured_value(value: &Value) -> Result<StructuredReceipt> {
    if !value.is_object() {
        return Err(Error::Parse("構造化結果がオブジェクトではありません".into()));
    }
    serde_json::from_value(value.clone())
        .map_err(|e| Error::Parse(format!("構造化結果 JSONパースエラー: {}", e)))
}

/// LLMレスポンス文字列を構造化レシートとしてパースする
pub fn parse_structured_response(response: &str) -> Result<StructuredReceipt> {
    let json_str = extract_json(response)?;
    let value: Value = serde_json::from_str(json_str.trim())
        .map_err(|e| Error::Parse(format!("構造化結果 JSONパースエラー: {}", e)))?;
    parse_structured_value(&value)
}
