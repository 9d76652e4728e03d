//! Receipt Scan
//!
//! レシートを撮影・解析して登録し、登録済みレシートを期間別・日別に表示するCLI。

pub mod api;
pub mod capture;
pub mod cli;
pub mod config;
pub mod error;
pub mod review;
pub mod session;
pub mod view;
pub mod workflow;
