//! 日付の解釈と期間ラベル
//!
//! 受け付ける形式:
//! - `2024-01-15` / `2024/01/15` / `2024.01.15`
//! - `2024年1月15日`
//! - 上記に続く時刻 `[T ]HH:MM[:SS[.fff]]`、任意のオフセット `Z` / `+09:00`
//!
//! 日付のみの値はローカル時刻の0時として扱う。オフセット付きの値はローカル時刻に変換する。

use chrono::{Datelike, Days, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref NUMERIC_DATE: Regex = Regex::new(
        r"^(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})(?:[T ](\d{1,2}):(\d{2})(?::(\d{2})(?:\.(\d{1,9}))?)?)?\s*(Z|[+-]\d{2}:?\d{2})?$"
    )
    .expect("valid regex");
    static ref KANJI_DATE: Regex = Regex::new(
        r"^(\d{4})年(\d{1,2})月(\d{1,2})日(?:\s*(\d{1,2}):(\d{2})(?::(\d{2}))?)?$"
    )
    .expect("valid regex");
}

/// 日付テキストを解釈する（解釈できなければ `None`）
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let caps = NUMERIC_DATE
        .captures(text)
        .or_else(|| KANJI_DATE.captures(text))?;

    let num = |i: usize| -> Option<u32> { caps.get(i).and_then(|m| m.as_str().parse().ok()) };

    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, num(2)?, num(3)?)?;

    let nanos = caps
        .get(7)
        .map(|m| {
            let digits = m.as_str();
            let padded = format!("{:0<9}", digits);
            padded.parse::<u32>().unwrap_or(0)
        })
        .unwrap_or(0);
    let naive = date.and_hms_nano_opt(
        num(4).unwrap_or(0),
        num(5).unwrap_or(0),
        num(6).unwrap_or(0),
        nanos,
    )?;

    match caps.get(8).map(|m| m.as_str()) {
        None => Some(naive),
        Some(offset) => {
            let offset = parse_offset(offset)?;
            let fixed = offset.from_local_datetime(&naive).single()?;
            Some(fixed.with_timezone(&Local).naive_local())
        }
    }
}

fn parse_offset(text: &str) -> Option<FixedOffset> {
    if text == "Z" {
        return FixedOffset::east_opt(0);
    }
    let sign = if text.starts_with('-') { -1 } else { 1 };
    let digits: String = text[1..].chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 4 {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// 日単位のキー `YYYY-MM-DD`
pub fn day_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}

/// 月ラベル `2024年1月`
pub fn month_label(date: NaiveDate) -> String {
    format!("{}年{}月", date.year(), date.month())
}

/// 週ラベル（月曜始まりの7日間） `2024-01-15〜2024-01-21`
pub fn week_label(date: NaiveDate) -> String {
    let start = week_start(date);
    let end = start + Days::new(6);
    format!("{}〜{}", day_key(start), day_key(end))
}

/// 四半期ラベル `2024年1〜3月`
pub fn quarter_label(date: NaiveDate) -> String {
    let start_month = date.month0() / 3 * 3 + 1;
    format!("{}年{}〜{}月", date.year(), start_month, start_month + 2)
}

/// その日を含む週の月曜日
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.weekday().num_days_from_monday()))
}
