//! Gemini API連携（レシート構造化）
//!
//! OCRテキスト、または画像を直接送り、構造化レシートのJSONを受け取る。

use super::{StructuringInput, StructuringService};
use crate::config::Config;
use crate::error::{ReceiptScanError, Result};
use async_trait::async_trait;
use receipt_scan_common::{
    build_image_prompt, build_text_prompt, parse_structured_response, StructuredReceipt,
};
use serde::{Deserialize, Serialize};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini APIリクエスト
#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

/// Gemini APIレスポンス
#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

pub struct GeminiStructuringClient {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
    endpoint_base: String,
}

impl GeminiStructuringClient {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            api_key,
            model: model.into(),
            endpoint_base: GEMINI_API_BASE.to_string(),
        })
    }

    /// APIキーが未設定でも作成できる（構造化時に `MissingApiKey` になる）
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.get_gemini_api_key().ok(), config.gemini_model.clone())
    }

    /// 接続先を差し替える（ローカルのモックサーバー等）
    pub fn with_endpoint_base(mut self, endpoint_base: impl Into<String>) -> Self {
        self.endpoint_base = endpoint_base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, api_key: &str) -> String {
        format!("{}/{}:generateContent?key={}", self.endpoint_base, self.model, api_key)
    }

    /// Gemini API呼び出し（共通処理）
    async fn call(&self, request: &GeminiRequest) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or(ReceiptScanError::MissingApiKey)?;

        let response = self.http.post(self.endpoint(api_key)).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ReceiptScanError::ApiStatus {
                status: status.as_u16(),
                context: "Gemini".into(),
            });
        }

        let payload: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ReceiptScanError::ApiParse(format!("Geminiレスポンス: {}", e)))?;

        payload
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| ReceiptScanError::ApiParse("Empty response".into()))
    }
}

fn build_request(input: StructuringInput<'_>) -> GeminiRequest {
    let parts = match input {
        StructuringInput::Text(text) => vec![Part::Text {
            text: build_text_prompt(text),
        }],
        StructuringInput::Image(image) => vec![
            Part::Text {
                text: build_image_prompt(),
            },
            Part::InlineData {
                inline_data: InlineData {
                    mime_type: image.mime_type.clone(),
                    data: image.base64.clone(),
                },
            },
        ],
    };

    GeminiRequest {
        contents: vec![Content { parts }],
        generation_config: GenerationConfig {
            temperature: 0.1,
            response_mime_type: "application/json".to_string(),
        },
    }
}

#[async_trait]
impl StructuringService for GeminiStructuringClient {
    async fn structure(&self, input: StructuringInput<'_>) -> Result<StructuredReceipt> {
        let request = build_request(input);
        let text = self.call(&request).await?;
        log::debug!("構造化レスポンス長: {} chars", text.len());

        parse_structured_response(&text).map_err(|e| ReceiptScanError::ApiParse(e.to_string()))
    }
}
