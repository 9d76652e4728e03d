//! エラー型定義

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("日付を解釈できません: {0}")]
    InvalidDate(String),

    #[error("不正な年月です: {year}年{month}月")]
    InvalidMonth { year: i32, month: u32 },

    #[error("購入品の位置が範囲外です: {index} (件数 {len})")]
    ItemIndexOutOfRange { index: usize, len: usize },
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
