//! 外部サービス連携
//!
//! - OcrService: 画像 → テキスト（またはバックエンドで構造化済みの結果）
//! - StructuringService: テキスト／画像 → 構造化レシート
//! - ReceiptStore: レシートの登録・一覧取得
//!
//! ApiClient はバックエンドAPI（OCR・登録・一覧・ログイン）を実装する。

pub mod gemini;

pub use gemini::GeminiStructuringClient;

use crate::capture::EncodedImage;
use crate::config::Config;
use crate::error::{ReceiptScanError, Result};
use async_trait::async_trait;
use receipt_scan_common::{
    normalize_receipt_list, parse_login_response, parse_ocr_body, AuthContext, OcrOutput, Session,
    StoredReceipt, StructuredReceipt, SubmitPayload,
};
use serde::Serialize;
use std::time::Duration;

/// 構造化サービスへの入力
#[derive(Debug, Clone, Copy)]
pub enum StructuringInput<'a> {
    Text(&'a str),
    Image(&'a EncodedImage),
}

#[async_trait]
pub trait OcrService: Send + Sync {
    /// 画像を読み取る。読み取れた内容が無ければ `Ok(None)`。
    async fn recognize(&self, image: &EncodedImage) -> Result<Option<OcrOutput>>;
}

#[async_trait]
pub trait StructuringService: Send + Sync {
    async fn structure(&self, input: StructuringInput<'_>) -> Result<StructuredReceipt>;
}

#[async_trait]
pub trait ReceiptStore: Send + Sync {
    async fn submit(&self, auth: &AuthContext, payload: &SubmitPayload) -> Result<()>;

    async fn list(&self, auth: &AuthContext) -> Result<Vec<StoredReceipt>>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OcrRequest<'a> {
    image_base64: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListRequest {
    user_id: i64,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// バックエンドAPIクライアント
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.api_base_url(), config.timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// ログインしてセッションを得る
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<Session> {
        let response = self
            .http
            .post(self.url("/api/login"))
            .json(&LoginRequest { username, password })
            .send()
            .await?;
        let response = ensure_success(response, "ログイン")?;

        // 本文が空・JSONでない場合も入力値からユーザーを組み立てる
        let body: serde_json::Value = response.json().await.unwrap_or(serde_json::Value::Null);
        Ok(parse_login_response(&body, username))
    }
}

fn ensure_success(response: reqwest::Response, context: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if !status.is_success() {
        log::warn!("{} API error: {}", context, status);
        return Err(ReceiptScanError::ApiStatus {
            status: status.as_u16(),
            context: context.to_string(),
        });
    }
    Ok(response)
}

#[async_trait]
impl OcrService for ApiClient {
    async fn recognize(&self, image: &EncodedImage) -> Result<Option<OcrOutput>> {
        let response = self
            .http
            .post(self.url("/api/ocr"))
            .json(&OcrRequest {
                image_base64: &image.base64,
            })
            .send()
            .await?;
        let response = ensure_success(response, "OCR")?;
        let body = response.text().await?;
        log::debug!("OCRレスポンス長: {} chars", body.len());
        Ok(parse_ocr_body(&body))
    }
}

#[async_trait]
impl ReceiptStore for ApiClient {
    async fn submit(&self, auth: &AuthContext, payload: &SubmitPayload) -> Result<()> {
        let response = self
            .http
            .post(self.url("/api/receipts"))
            .bearer_auth(&auth.token)
            .json(payload)
            .send()
            .await?;
        ensure_success(response, "登録")?;
        Ok(())
    }

    async fn list(&self, auth: &AuthContext) -> Result<Vec<StoredReceipt>> {
        let response = self
            .http
            .post(self.url("/api/receipts/by-user"))
            .bearer_auth(&auth.token)
            .json(&ListRequest { user_id: auth.user_id })
            .send()
            .await?;
        let response = ensure_success(response, "レシート取得")?;
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ReceiptScanError::ApiParse(format!("レシート一覧: {}", e)))?;
        Ok(normalize_receipt_list(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let client = ApiClient::new("http://localhost:8080/", None).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(client.url("/api/ocr"), "http://localhost:8080/api/ocr");
    }

    #[test]
    fn test_request_bodies_are_camel_case() {
        let ocr = serde_json::to_value(OcrRequest { image_base64: "AAA" }).unwrap();
        assert_eq!(ocr, serde_json::json!({"imageBase64": "AAA"}));

        let list = serde_json::to_value(ListRequest { user_id: 4 }).unwrap();
        assert_eq!(list, serde_json::json!({"userId": 4}));
    }
}
