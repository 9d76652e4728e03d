//! Receipt Scan Common Library
//!
//! CLIと各クライアントで共有される型と純粋なロジック（I/Oなし）

pub mod types;
pub mod error;
pub mod draft;
pub mod dates;
pub mod ingest;
pub mod parser;
pub mod prompts;
pub mod query;
pub mod session;

pub use types::{
    OcrOutput, ReceiptDraft, ReceiptItem, StoredReceipt, StructuredItem, StructuredReceipt,
    SubmitItem, SubmitPayload,
};
pub use error::{Error, Result};
pub use draft::{format_amount, parse_number, DraftField, ItemField, ReceiptDraftEditor};
pub use dates::{day_key, parse_date};
pub use ingest::{normalize_receipt_list, parse_ocr_body};
pub use parser::{extract_json, parse_structured_response, parse_structured_value};
pub use prompts::{build_image_prompt, build_text_prompt};
pub use query::{
    calendar_grid, group_receipts, group_receipts_newest_first, receipt_datetime, CalendarMonth,
    DayIndex, GroupedSection, GroupingMode,
};
pub use session::{parse_login_response, AuthContext, Session, SessionUser};
