//! APIクライアントのテスト
//!
//! ローカルに1回だけ応答するHTTPサーバーを立てて、送信内容とレスポンスの解釈を検証

use receipt_scan::api::{
    ApiClient, GeminiStructuringClient, OcrService, ReceiptStore, StructuringInput,
    StructuringService,
};
use receipt_scan::capture::EncodedImage;
use receipt_scan::error::ReceiptScanError;
use receipt_scan_common::{AuthContext, OcrOutput, ReceiptDraft, ReceiptItem};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// 受け取ったリクエスト（ヘッダは小文字化）
struct CapturedRequest {
    head: String,
    body: String,
}

impl CapturedRequest {
    fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

async fn read_request(socket: &mut TcpStream) -> CapturedRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = find_header_end(&buf) {
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                return CapturedRequest {
                    head,
                    body: String::from_utf8_lossy(&buf[end + 4..end + 4 + length]).to_string(),
                };
            }
        }
    }

    CapturedRequest {
        head: String::from_utf8_lossy(&buf).to_lowercase(),
        body: String::new(),
    }
}

/// 1回だけ `status` と `body` を返すサーバー
async fn serve_once(status: u16, body: &'static str) -> (String, JoinHandle<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let response = format!(
            "HTTP/1.1 {} TEST\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        request
    });

    (format!("http://{}", addr), handle)
}

fn image() -> EncodedImage {
    EncodedImage {
        mime_type: "image/jpeg".into(),
        base64: "QUJD".into(),
    }
}

fn auth() -> AuthContext {
    AuthContext {
        user_id: 42,
        token: "secret-token".into(),
    }
}

// =============================================
// OCR
// =============================================

#[tokio::test]
async fn test_ocr_sends_image_and_reads_text() {
    let (base, server) = serve_once(200, r#"{"text": "ローソン 合計 540"}"#).await;
    let client = ApiClient::new(base, None).unwrap();

    let output = client.recognize(&image()).await.unwrap();
    assert_eq!(output, Some(OcrOutput::Text("ローソン 合計 540".into())));

    let request = server.await.unwrap();
    assert!(request.head.starts_with("post /api/ocr "));
    assert_eq!(request.json(), json!({"imageBase64": "QUJD"}));
}

#[tokio::test]
async fn test_ocr_formatted_response() {
    let (base, server) = serve_once(200, r#"{"formatted": {"store": "A", "total": 100}}"#).await;
    let client = ApiClient::new(base, None).unwrap();

    let output = client.recognize(&image()).await.unwrap();
    assert_eq!(
        output,
        Some(OcrOutput::Formatted(json!({"store": "A", "total": 100})))
    );
    server.await.unwrap();
}

#[tokio::test]
async fn test_ocr_without_text() {
    let (base, server) = serve_once(200, r#"{"status": "ok"}"#).await;
    let client = ApiClient::new(base, None).unwrap();

    assert_eq!(client.recognize(&image()).await.unwrap(), None);
    server.await.unwrap();
}

#[tokio::test]
async fn test_ocr_error_status() {
    let (base, server) = serve_once(500, r#"{"error": "boom"}"#).await;
    let client = ApiClient::new(base, None).unwrap();

    let err = client.recognize(&image()).await.unwrap_err();
    assert!(matches!(err, ReceiptScanError::ApiStatus { status: 500, .. }));
    server.await.unwrap();
}

// =============================================
// 登録・一覧
// =============================================

#[tokio::test]
async fn test_submit_sends_bearer_and_numeric_amounts() {
    let (base, server) = serve_once(201, r#"{"id": 1}"#).await;
    let client = ApiClient::new(format!("{}/", base), None).unwrap();

    let draft = ReceiptDraft {
        store: "A".into(),
        date: "2024-01-01".into(),
        total: "1200".into(),
        items: vec![ReceiptItem::new("x", "500"), ReceiptItem::new("y", "abc")],
    };
    client.submit(&auth(), &draft.to_submission()).await.unwrap();

    let request = server.await.unwrap();
    assert!(request.head.starts_with("post /api/receipts "));
    assert!(request.head.contains("authorization: bearer secret-token"));
    assert_eq!(
        request.json(),
        json!({
            "store": "A",
            "date": "2024-01-01",
            "total": 1200,
            "items": [{"name": "x", "price": 500}, {"name": "y", "price": 0}]
        })
    );
}

#[tokio::test]
async fn test_submit_error_status() {
    let (base, server) = serve_once(400, r#"{"message": "bad"}"#).await;
    let client = ApiClient::new(base, None).unwrap();

    let err = client
        .submit(&auth(), &ReceiptDraft::empty().to_submission())
        .await
        .unwrap_err();
    assert!(matches!(err, ReceiptScanError::ApiStatus { status: 400, .. }));
    server.await.unwrap();
}

#[tokio::test]
async fn test_list_accepts_wrapped_response() {
    let (base, server) = serve_once(
        200,
        r#"{"receipts": [
            {"id": 1, "storeName": "A", "receiptDate": "2024-01-15", "totalAmount": 300},
            {"id": 2, "store": "B", "date": "2024-01-20", "total": "1,000"}
        ]}"#,
    )
    .await;
    let client = ApiClient::new(base, None).unwrap();

    let receipts = client.list(&auth()).await.unwrap();
    assert_eq!(receipts.len(), 2);
    assert_eq!(receipts[0].store.as_deref(), Some("A"));
    assert_eq!(receipts[0].date, "2024-01-15");
    assert_eq!(receipts[0].total, Some(300.0));
    assert_eq!(receipts[1].store.as_deref(), Some("B"));

    let request = server.await.unwrap();
    assert!(request.head.starts_with("post /api/receipts/by-user "));
    assert!(request.head.contains("authorization: bearer secret-token"));
    assert_eq!(request.json(), json!({"userId": 42}));
}

#[tokio::test]
async fn test_list_unknown_shape_is_empty() {
    let (base, server) = serve_once(200, r#"{"items": []}"#).await;
    let client = ApiClient::new(base, None).unwrap();

    assert!(client.list(&auth()).await.unwrap().is_empty());
    server.await.unwrap();
}

// =============================================
// ログイン
// =============================================

#[tokio::test]
async fn test_sign_in_reads_user_and_token() {
    let (base, server) = serve_once(
        200,
        r#"{"user": {"userId": "15", "username": "hanako"}, "accessToken": "abc"}"#,
    )
    .await;
    let client = ApiClient::new(base, None).unwrap();

    let session = client.sign_in("hanako", "pw").await.unwrap();
    assert_eq!(session.user.id, 15);
    assert_eq!(session.user.username, "hanako");
    assert_eq!(session.token.as_deref(), Some("abc"));

    let request = server.await.unwrap();
    assert!(request.head.starts_with("post /api/login "));
    assert_eq!(request.json(), json!({"username": "hanako", "password": "pw"}));
}

#[tokio::test]
async fn test_sign_in_rejected() {
    let (base, server) = serve_once(401, r#"{"message": "invalid"}"#).await;
    let client = ApiClient::new(base, None).unwrap();

    let err = client.sign_in("hanako", "wrong").await.unwrap_err();
    assert!(matches!(err, ReceiptScanError::ApiStatus { status: 401, .. }));
    server.await.unwrap();
}

// =============================================
// Gemini構造化
// =============================================

#[tokio::test]
async fn test_gemini_structures_text() {
    let (base, server) = serve_once(
        200,
        r#"{"candidates": [{"content": {"parts": [{"text": "{\"store\": \"ローソン\", \"date\": \"2024-03-01\", \"total\": 540, \"items\": [{\"name\": \"お茶\", \"price\": \"140\"}]}"}]}}]}"#,
    )
    .await;
    let client = GeminiStructuringClient::new(Some("key".into()), "gemini-2.0-flash")
        .unwrap()
        .with_endpoint_base(format!("{}/v1beta/models", base));

    let receipt = client
        .structure(StructuringInput::Text("ローソン お茶 140 合計 540"))
        .await
        .unwrap();
    assert_eq!(receipt.store.as_deref(), Some("ローソン"));
    assert_eq!(receipt.total, Some(540.0));
    let items = receipt.items.unwrap();
    assert_eq!(items[0].price, Some(140.0));

    let request = server.await.unwrap();
    assert!(request
        .head
        .starts_with("post /v1beta/models/gemini-2.0-flash:generatecontent?key=key "));
    let body = request.json();
    assert!(body["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap()
        .contains("ローソン お茶 140 合計 540"));
}

#[tokio::test]
async fn test_gemini_non_json_answer_is_parse_error() {
    let (base, server) = serve_once(
        200,
        r#"{"candidates": [{"content": {"parts": [{"text": "読み取れませんでした"}]}}]}"#,
    )
    .await;
    let client = GeminiStructuringClient::new(Some("key".into()), "gemini-2.0-flash")
        .unwrap()
        .with_endpoint_base(base);

    let err = client.structure(StructuringInput::Text("???")).await.unwrap_err();
    assert!(matches!(err, ReceiptScanError::ApiParse(_)));
    server.await.unwrap();
}
