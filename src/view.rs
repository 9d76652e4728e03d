//! 端末表示用の整形
//!
//! 一覧（期間ごとのセクション）、カレンダー、日別一覧、下書きをテキストにする。

use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};
use receipt_scan_common::{
    day_key, CalendarMonth, DayIndex, GroupedSection, ReceiptDraft, StoredReceipt,
};

const WEEKDAY_HEADER: [&str; 7] = ["日", "月", "火", "水", "木", "金", "土"];

/// 金額を `1,200円` 形式にする（小数は3桁まで）
pub fn format_yen(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    let rounded = (amount.abs() * 1000.0).round() / 1000.0;
    let integer = (rounded.trunc() as i64).to_formatted_string(&Locale::en);

    let fraction = rounded - rounded.trunc();
    let fraction_text = if fraction > 0.0 {
        let digits = format!("{:.3}", fraction);
        digits.trim_start_matches('0').trim_end_matches('0').to_string()
    } else {
        String::new()
    };

    format!("{}{}{}円", sign, integer, fraction_text)
}

pub fn render_receipt_row(receipt: &StoredReceipt) -> String {
    format!(
        "  {}  {}  {}",
        receipt.store_label(),
        receipt.date,
        format_yen(receipt.total_or_zero())
    )
}

pub fn render_sections(sections: &[GroupedSection]) -> String {
    if sections.is_empty() {
        return "レシートがありません。\n".to_string();
    }

    let mut out = String::new();
    for section in sections {
        let sum: f64 = section.data.iter().map(|r| r.total_or_zero()).sum();
        out.push_str(&format!(
            "■ {}（{}件 / {}）\n",
            section.title,
            section.data.len(),
            format_yen(sum)
        ));
        for receipt in &section.data {
            out.push_str(&render_receipt_row(receipt));
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

/// 日曜始まりのカレンダー。件数のある日は `15•2` のように件数を付ける。
pub fn render_calendar(
    month: &CalendarMonth,
    index: &DayIndex,
    selected: Option<NaiveDate>,
) -> String {
    let mut out = format!("{}\n", month.title());
    for label in WEEKDAY_HEADER {
        out.push_str(&format!(" {:<4}", label));
    }
    out.push('\n');

    let cells = month.grid();
    for week in cells.chunks(7) {
        for cell in week {
            let text = match cell {
                None => String::new(),
                Some(day) => {
                    let date = month.date(*day);
                    let count = date.map(|d| index.get_date(d).len()).unwrap_or(0);
                    let mark = if count > 0 { format!("•{}", count) } else { String::new() };
                    let body = format!("{}{}", day, mark);
                    if date.is_some() && date == selected {
                        format!("[{}]", body)
                    } else {
                        body
                    }
                }
            };
            out.push_str(&format!("{:>5} ", text));
        }
        out.push('\n');
    }
    out
}

/// 前月・翌月へ移動するための `--month` 指定
pub fn render_month_navigation(month: &CalendarMonth) -> String {
    let arg = |m: CalendarMonth| format!("{:04}-{:02}", m.year(), m.month());
    format!(
        "◀ 前月: --month {}    翌月: --month {} ▶\n",
        arg(month.previous()),
        arg(month.next())
    )
}

pub fn render_day(date: NaiveDate, index: &DayIndex) -> String {
    let key = day_key(date);
    let receipts = index.get(&key);
    let mut out = format!("{} のレシート\n", key);
    if receipts.is_empty() {
        out.push_str("  この日のレシートはありません。\n");
    } else {
        for receipt in receipts {
            out.push_str(&render_receipt_row(receipt));
            out.push('\n');
        }
    }
    out
}

/// 内容確認画面
pub fn render_draft(draft: &ReceiptDraft, subtotal: f64, error: Option<&str>) -> String {
    let mut out = String::from("── 解析結果 ──\n");
    if let Some(message) = error {
        out.push_str(&format!("⚠ {}\n", message));
    }

    out.push_str(&format!("  店舗名:   {}\n", display_or_blank(&draft.store)));
    out.push_str(&format!("  日付:     {}\n", display_or_blank(&draft.date)));
    out.push_str(&format!("  合計金額: {}\n", display_or_blank(&draft.total)));

    out.push_str("  購入品:\n");
    if draft.items.is_empty() {
        out.push_str("    （なし）\n");
    }
    for (i, item) in draft.items.iter().enumerate() {
        out.push_str(&format!(
            "    {}. {}  {}\n",
            i + 1,
            display_or_blank(&item.name),
            display_or_blank(&item.price)
        ));
    }
    out.push_str(&format!("  小計: {}\n", format_yen(subtotal)));
    out
}

fn display_or_blank(text: &str) -> &str {
    if text.trim().is_empty() {
        "（未入力）"
    } else {
        text
    }
}
