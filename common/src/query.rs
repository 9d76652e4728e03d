//! 登録済みレシートの期間グループ化・日別索引・カレンダー
//!
//! いずれも入力のスナップショットに対する純粋な変換で、状態を持たない。
//! 日付を解釈できないレコードはグループ化・日別索引の両方から除外する。

use crate::dates::{day_key, month_label, parse_date, quarter_label, week_label};
use crate::error::{Error, Result};
use crate::types::StoredReceipt;
use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// グループ化の単位
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupingMode {
    #[default]
    Month,
    Week,
    Quarter,
}

impl GroupingMode {
    pub const ALL: [GroupingMode; 3] =
        [GroupingMode::Month, GroupingMode::Week, GroupingMode::Quarter];

    /// 切り替えボタンの表示名
    pub fn display_name(&self) -> &'static str {
        match self {
            GroupingMode::Month => "1か月",
            GroupingMode::Week => "1週間",
            GroupingMode::Quarter => "3か月",
        }
    }

    /// 日付が属する期間のラベル
    pub fn period_label(&self, date: NaiveDate) -> String {
        match self {
            GroupingMode::Month => month_label(date),
            GroupingMode::Week => week_label(date),
            GroupingMode::Quarter => quarter_label(date),
        }
    }
}

impl std::str::FromStr for GroupingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "month" | "m" | "1か月" => Ok(GroupingMode::Month),
            "week" | "w" | "1週間" => Ok(GroupingMode::Week),
            "quarter" | "q" | "3か月" => Ok(GroupingMode::Quarter),
            _ => Err(format!("Unknown grouping: {}. Use month, week, or quarter", s)),
        }
    }
}

impl std::fmt::Display for GroupingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupingMode::Month => write!(f, "month"),
            GroupingMode::Week => write!(f, "week"),
            GroupingMode::Quarter => write!(f, "quarter"),
        }
    }
}

/// 期間ごとのセクション
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedSection {
    pub title: String,
    pub data: Vec<StoredReceipt>,
}

/// レコードの日付（解釈できなければ `None`）
pub fn receipt_datetime(receipt: &StoredReceipt) -> Option<NaiveDateTime> {
    parse_date(&receipt.date)
}

/// 日付の新しい順に並べる（同時刻は入力順を保つ）
fn sort_newest_first(entries: &mut [(NaiveDateTime, &StoredReceipt)]) {
    entries.sort_by(|a, b| b.0.cmp(&a.0));
}

/// 期間ごとにグループ化する
///
/// セクションは入力を走査して最初に現れた順に並ぶ（時系列順とは限らない）。
/// 時系列順のセクションが必要なら [`group_receipts_newest_first`] を使う。
pub fn group_receipts(receipts: &[StoredReceipt], mode: GroupingMode) -> Vec<GroupedSection> {
    let mut order: HashMap<String, usize> = HashMap::new();
    let mut buckets: Vec<(String, Vec<(NaiveDateTime, &StoredReceipt)>)> = Vec::new();

    for receipt in receipts {
        let Some(parsed) = receipt_datetime(receipt) else {
            continue;
        };
        let title = mode.period_label(parsed.date());
        let idx = *order.entry(title.clone()).or_insert_with(|| {
            buckets.push((title, Vec::new()));
            buckets.len() - 1
        });
        buckets[idx].1.push((parsed, receipt));
    }

    buckets
        .into_iter()
        .map(|(title, mut entries)| {
            sort_newest_first(&mut entries);
            GroupedSection {
                title,
                data: entries.into_iter().map(|(_, r)| r.clone()).collect(),
            }
        })
        .collect()
}

/// 全体を新しい順に並べてからグループ化する
///
/// 期間は互いに重ならないため、セクションも新しい期間から順に並ぶ。
pub fn group_receipts_newest_first(
    receipts: &[StoredReceipt],
    mode: GroupingMode,
) -> Vec<GroupedSection> {
    let mut entries: Vec<(NaiveDateTime, &StoredReceipt)> = receipts
        .iter()
        .filter_map(|r| receipt_datetime(r).map(|d| (d, r)))
        .collect();
    sort_newest_first(&mut entries);

    let sorted: Vec<StoredReceipt> = entries.into_iter().map(|(_, r)| r.clone()).collect();
    group_receipts(&sorted, mode)
}

/// 日別索引（`YYYY-MM-DD` → その日のレシート、新しい順）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayIndex {
    buckets: BTreeMap<String, Vec<StoredReceipt>>,
}

impl DayIndex {
    pub fn build(receipts: &[StoredReceipt]) -> Self {
        let mut staged: BTreeMap<String, Vec<(NaiveDateTime, &StoredReceipt)>> = BTreeMap::new();
        for receipt in receipts {
            if let Some(parsed) = receipt_datetime(receipt) {
                staged
                    .entry(day_key(parsed.date()))
                    .or_default()
                    .push((parsed, receipt));
            }
        }

        let buckets = staged
            .into_iter()
            .map(|(key, mut entries)| {
                sort_newest_first(&mut entries);
                (key, entries.into_iter().map(|(_, r)| r.clone()).collect())
            })
            .collect();

        Self { buckets }
    }

    /// その日のレシート（無ければ空）
    pub fn get(&self, day: &str) -> &[StoredReceipt] {
        self.buckets.get(day).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn get_date(&self, date: NaiveDate) -> &[StoredReceipt] {
        self.get(&day_key(date))
    }

    /// レシートのある日（昇順）
    pub fn days(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// カレンダーに表示する月
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarMonth {
    first: NaiveDate,
}

impl CalendarMonth {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(|first| Self { first })
            .ok_or(Error::InvalidMonth { year, month })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            first: date.with_day(1).unwrap_or(date),
        }
    }

    pub fn current() -> Self {
        Self::containing(Local::now().date_naive())
    }

    /// `2024-01` 形式を解釈する
    pub fn parse(text: &str) -> Result<Self> {
        let (year, month) = text
            .trim()
            .split_once(['-', '/'])
            .ok_or_else(|| Error::InvalidDate(text.to_string()))?;
        let year: i32 = year.parse().map_err(|_| Error::InvalidDate(text.to_string()))?;
        let month: u32 = month.parse().map_err(|_| Error::InvalidDate(text.to_string()))?;
        Self::new(year, month)
    }

    pub fn year(&self) -> i32 {
        self.first.year()
    }

    pub fn month(&self) -> u32 {
        self.first.month()
    }

    pub fn previous(&self) -> Self {
        Self::containing(self.first.pred_opt().unwrap_or(self.first))
    }

    pub fn next(&self) -> Self {
        let days = self.days_in_month();
        Self::containing(
            self.first
                .checked_add_days(chrono::Days::new(u64::from(days)))
                .unwrap_or(self.first),
        )
    }

    /// 見出し `2024年1月`
    pub fn title(&self) -> String {
        month_label(self.first)
    }

    pub fn days_in_month(&self) -> u32 {
        let (y, m) = if self.month() == 12 {
            (self.year() + 1, 1)
        } else {
            (self.year(), self.month() + 1)
        };
        NaiveDate::from_ymd_opt(y, m, 1)
            .and_then(|next| next.pred_opt())
            .map(|last| last.day())
            .unwrap_or(31)
    }

    /// 1日の曜日（日曜 = 0）
    pub fn first_weekday(&self) -> u32 {
        self.first.weekday().num_days_from_sunday()
    }

    pub fn date(&self, day: u32) -> Option<NaiveDate> {
        self.first.with_day(day)
    }

    /// カレンダーのセル列: 1日の曜日分の空白 + 1..=末日（末尾の空白は無し）
    pub fn grid(&self) -> Vec<Option<u32>> {
        let blanks = self.first_weekday() as usize;
        std::iter::repeat(None)
            .take(blanks)
            .chain((1..=self.days_in_month()).map(Some))
            .collect()
    }
}

/// 指定月のカレンダーセル列
pub fn calendar_grid(year: i32, month: u32) -> Result<Vec<Option<u32>>> {
    Ok(CalendarMonth::new(year, month)?.grid())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt(date: &str, total: f64) -> StoredReceipt {
        StoredReceipt {
            date: date.to_string(),
            total: Some(total),
            ..Default::default()
        }
    }

    fn dates(section: &GroupedSection) -> Vec<&str> {
        section.data.iter().map(|r| r.date.as_str()).collect()
    }

    #[test]
    fn test_group_by_month_scenario() {
        let receipts = vec![
            receipt("2024-01-15", 100.0),
            receipt("2024-01-20", 200.0),
            receipt("2024-02-01", 50.0),
        ];
        let sections = group_receipts(&receipts, GroupingMode::Month);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "2024年1月");
        assert_eq!(dates(&sections[0]), vec!["2024-01-20", "2024-01-15"]);
        assert_eq!(sections[1].title, "2024年2月");
        assert_eq!(dates(&sections[1]), vec!["2024-02-01"]);
    }

    #[test]
    fn test_group_preserves_first_seen_section_order() {
        let receipts = vec![
            receipt("2024-01-15", 1.0),
            receipt("2024-03-01", 2.0),
            receipt("2024-02-01", 3.0),
        ];
        let titles: Vec<String> = group_receipts(&receipts, GroupingMode::Month)
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, vec!["2024年1月", "2024年3月", "2024年2月"]);
    }

    #[test]
    fn test_group_newest_first_orders_sections() {
        let receipts = vec![
            receipt("2024-01-15", 1.0),
            receipt("2024-03-01", 2.0),
            receipt("2024-02-01", 3.0),
            receipt("2024-03-10", 4.0),
        ];
        let sections = group_receipts_newest_first(&receipts, GroupingMode::Month);
        let titles: Vec<&str> = sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["2024年3月", "2024年2月", "2024年1月"]);
        assert_eq!(dates(&sections[0]), vec!["2024-03-10", "2024-03-01"]);
    }

    #[test]
    fn test_group_excludes_unparseable() {
        let receipts = vec![
            receipt("2024-01-15", 1.0),
            receipt("", 2.0),
            receipt("昨日", 3.0),
        ];
        let sections = group_receipts(&receipts, GroupingMode::Week);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].data.len(), 1);
        assert!(DayIndex::build(&receipts).len() == 1);
    }

    #[test]
    fn test_group_stable_for_equal_dates() {
        let receipts = vec![
            receipt("2024-01-15", 1.0),
            receipt("2024-01-15", 2.0),
            receipt("2024-01-16", 3.0),
            receipt("2024-01-15", 4.0),
        ];
        let sections = group_receipts(&receipts, GroupingMode::Month);
        let totals: Vec<f64> = sections[0].data.iter().map(|r| r.total_or_zero()).collect();
        assert_eq!(totals, vec![3.0, 1.0, 2.0, 4.0]);
    }

    #[test]
    fn test_month_label_same_within_month_distinct_across() {
        let month = CalendarMonth::new(2024, 2).unwrap();
        let labels: Vec<String> = (1..=month.days_in_month())
            .map(|d| GroupingMode::Month.period_label(month.date(d).unwrap()))
            .collect();
        assert!(labels.iter().all(|l| l == "2024年2月"));

        let jan31 = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let mar1 = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_ne!(GroupingMode::Month.period_label(jan31), labels[0]);
        assert_ne!(GroupingMode::Month.period_label(mar1), labels[0]);
    }

    #[test]
    fn test_week_window_is_seven_days_from_monday() {
        let mut date = NaiveDate::from_ymd_opt(2023, 12, 1).unwrap();
        for _ in 0..120 {
            let label = GroupingMode::Week.period_label(date);
            if date.weekday() == chrono::Weekday::Mon {
                for offset in 1..7 {
                    let later = date + chrono::Days::new(offset);
                    assert_eq!(GroupingMode::Week.period_label(later), label);
                }
                let seventh = date + chrono::Days::new(7);
                assert_ne!(GroupingMode::Week.period_label(seventh), label);
            }
            date = date.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_quarter_blocks() {
        let label = |m: u32| {
            GroupingMode::Quarter.period_label(NaiveDate::from_ymd_opt(2024, m, 10).unwrap())
        };
        assert_eq!(label(1), label(2));
        assert_eq!(label(2), label(3));
        assert_ne!(label(3), label(4));
        assert_eq!(label(4), label(6));
        assert_ne!(label(6), label(7));
        assert_eq!(label(10), label(12));
    }

    #[test]
    fn test_grouping_is_idempotent() {
        let receipts = vec![
            receipt("2024-05-03", 1.0),
            receipt("2024-04-28T09:00", 2.0),
            receipt("2024-05-03T12:00", 3.0),
            receipt("bad", 4.0),
        ];
        for mode in GroupingMode::ALL {
            assert_eq!(group_receipts(&receipts, mode), group_receipts(&receipts, mode));
        }
    }

    #[test]
    fn test_sections_sorted_descending() {
        let receipts = vec![
            receipt("2024-05-03", 1.0),
            receipt("2024-05-20T10:00", 2.0),
            receipt("2024-05-20T08:00", 3.0),
            receipt("2024-06-01", 4.0),
            receipt("2024-05-11", 5.0),
        ];
        for mode in GroupingMode::ALL {
            for section in group_receipts(&receipts, mode) {
                for pair in section.data.windows(2) {
                    assert!(receipt_datetime(&pair[0]) >= receipt_datetime(&pair[1]));
                }
            }
        }
    }

    #[test]
    fn test_each_valid_record_grouped_exactly_once() {
        let receipts = vec![
            receipt("2024-05-03", 1.0),
            receipt("2024/05/04", 2.0),
            receipt("2024年5月5日", 3.0),
            receipt("nope", 4.0),
        ];
        for mode in GroupingMode::ALL {
            let count: usize = group_receipts(&receipts, mode).iter().map(|s| s.data.len()).sum();
            assert_eq!(count, 3);
        }
        assert_eq!(DayIndex::build(&receipts).len(), 3);
    }

    #[test]
    fn test_day_index() {
        let receipts = vec![
            receipt("2024-01-15T09:00", 1.0),
            receipt("2024-01-15T18:30", 2.0),
            receipt("2024-01-16", 3.0),
        ];
        let index = DayIndex::build(&receipts);
        let day = index.get("2024-01-15");
        assert_eq!(day.len(), 2);
        assert_eq!(day[0].total, Some(2.0));
        assert_eq!(day[1].total, Some(1.0));
        assert_eq!(index.get("2024-01-16").len(), 1);
        assert!(index.get("2024-01-17").is_empty());
        assert_eq!(index.days().collect::<Vec<_>>(), vec!["2024-01-15", "2024-01-16"]);
    }

    /// 同義の日付キーで届いた一覧もグループ化・日別索引に乗る
    #[test]
    fn test_synonym_date_keys_flow_through_grouping_and_index() {
        let body = serde_json::json!({"receipts": [
            {"id": 1, "storeName": "A", "receiptDate": "2024-01-15", "totalAmount": 300},
            {"id": 2, "store": "B", "purchaseDate": "2024-01-15T12:00", "total": 200},
            {"id": 3, "store": "C", "purchaseDate": "2024-02-03", "total": 50},
            {"id": 4, "store": "D", "receiptDate": "not a date", "total": 10}
        ]});
        let receipts = crate::ingest::normalize_receipt_list(&body);
        assert_eq!(receipts.len(), 4);

        let sections = group_receipts(&receipts, GroupingMode::Month);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "2024年1月");
        assert_eq!(
            sections[0].data.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![Some(2), Some(1)]
        );
        assert_eq!(sections[1].title, "2024年2月");
        assert_eq!(sections[1].data[0].store.as_deref(), Some("C"));

        let index = DayIndex::build(&receipts);
        assert_eq!(index.get("2024-01-15").len(), 2);
        assert_eq!(index.get("2024-02-03").len(), 1);
        assert_eq!(index.days().count(), 2);
    }

    #[test]
    fn test_calendar_grid_wednesday_start() {
        // 2023年11月1日は水曜日、30日まで
        let grid = calendar_grid(2023, 11).unwrap();
        assert_eq!(&grid[..3], &[None, None, None]);
        let days: Vec<u32> = grid[3..].iter().map(|c| c.unwrap()).collect();
        assert_eq!(days, (1..=30).collect::<Vec<_>>());
        assert_eq!(grid.len(), 33);
    }

    #[test]
    fn test_calendar_grid_sunday_start() {
        // 2024年9月1日は日曜日
        let grid = calendar_grid(2024, 9).unwrap();
        assert_eq!(grid[0], Some(1));
        assert_eq!(grid.len(), 30);
    }

    #[test]
    fn test_calendar_month_navigation() {
        let month = CalendarMonth::new(2024, 1).unwrap();
        assert_eq!(month.title(), "2024年1月");
        assert_eq!(month.previous(), CalendarMonth::new(2023, 12).unwrap());
        assert_eq!(month.next(), CalendarMonth::new(2024, 2).unwrap());
        assert_eq!(
            CalendarMonth::new(2024, 12).unwrap().next(),
            CalendarMonth::new(2025, 1).unwrap()
        );
        assert_eq!(CalendarMonth::new(2024, 2).unwrap().days_in_month(), 29);
        assert_eq!(CalendarMonth::new(2023, 2).unwrap().days_in_month(), 28);
    }

    #[test]
    fn test_calendar_month_parse() {
        assert_eq!(CalendarMonth::parse("2024-03").unwrap(), CalendarMonth::new(2024, 3).unwrap());
        assert_eq!(CalendarMonth::parse("2024/11").unwrap(), CalendarMonth::new(2024, 11).unwrap());
        assert!(CalendarMonth::parse("2024-13").is_err());
        assert!(CalendarMonth::parse("march").is_err());
        assert!(calendar_grid(2024, 0).is_err());
    }

    #[test]
    fn test_grouping_mode_from_str() {
        assert_eq!("month".parse::<GroupingMode>().unwrap(), GroupingMode::Month);
        assert_eq!("WEEK".parse::<GroupingMode>().unwrap(), GroupingMode::Week);
        assert_eq!("q".parse::<GroupingMode>().unwrap(), GroupingMode::Quarter);
        assert!("year".parse::<GroupingMode>().is_err());
    }
}
