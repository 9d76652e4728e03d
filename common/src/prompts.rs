//! プロンプト生成モジュール
//!
//! 構造化サービス（LLM）向けのプロンプト:
//! - build_text_prompt: OCRテキストから構造化
//! - build_image_prompt: 画像から直接構造化

/// 出力形式の説明（テキスト・画像共通）
const OUTPUT_FORMAT: &str = r#"## 出力形式（厳密にこのJSONオブジェクト形式で出力）
{
  "store": "店舗名",
  "date": "YYYY-MM-DD",
  "total": 合計金額（数値）,
  "items": [
    { "name": "商品名", "price": 金額（数値） }
  ]
}

## 注意
- 金額は税込の数値のみ（"円" や "¥"、カンマは付けない）
- 日付が読み取れない場合は空文字
- 値引き行は負の金額の購入品として出力
- 小計・税・お預り・お釣りの行は購入品に含めない
- 推測せず、読み取れたものだけを記載
- JSONオブジェクトのみ出力。説明文は不要"#;

/// OCRテキストからの構造化プロンプト
pub fn build_text_prompt(ocr_text: &str) -> String {
    format!(
        r#"あなたは家計簿アプリのレシート読み取り担当です。以下はレシート画像をOCRしたテキストです。
店舗名・日付・合計金額・購入品を抽出してください。

{OUTPUT_FORMAT}

## OCRテキスト
{ocr_text}"#
    )
}

/// 画像からの構造化プロンプト
pub fn build_image_prompt() -> String {
    format!(
        r#"あなたは家計簿アプリのレシート読み取り担当です。添付のレシート画像を読み取り、
店舗名・日付・合計金額・購入品を抽出してください。

{OUTPUT_FORMAT}"#
    )
}
