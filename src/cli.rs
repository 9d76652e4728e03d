use crate::config::StructuringMode;
use clap::{Parser, Subcommand};
use receipt_scan_common::GroupingMode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "receipt-scan")]
#[command(about = "レシート撮影・解析・登録ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// APIの接続先（環境変数・設定ファイルより優先）
    #[arg(long, global = true)]
    pub api_base_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// レシートを撮影・解析して登録
    Scan {
        /// 解析する画像ファイル（省略時は撮影/添付を選択）
        #[arg(short, long)]
        image: Option<PathBuf>,

        /// 添付時に最初に開くフォルダ（デフォルト: カレント）
        #[arg(short, long)]
        library: Option<PathBuf>,

        /// 構造化の入力方式 (text/image)
        #[arg(short, long)]
        mode: Option<StructuringMode>,
    },

    /// 登録済みレシートを期間ごとに表示
    Receipts {
        /// まとめ方 (month/week/quarter)
        #[arg(short, long, default_value = "month")]
        group: GroupingMode,

        /// JSONで出力
        #[arg(long)]
        json: bool,
    },

    /// カレンダーと日別のレシートを表示
    Calendar {
        /// 表示する月 (YYYY-MM、省略時は今月)
        #[arg(short, long)]
        month: Option<String>,

        /// 一覧を表示する日 (YYYY-MM-DD、省略時は今日)
        #[arg(short, long)]
        day: Option<String>,
    },

    /// ログイン
    Login {
        /// ユーザー名
        #[arg(short, long)]
        username: String,

        /// パスワード（省略時は入力を求める）
        #[arg(short, long)]
        password: Option<String>,
    },

    /// ログアウト（保存済みセッションを削除）
    Logout,

    /// 設定を表示/編集
    Config {
        /// APIの接続先を設定
        #[arg(long)]
        set_base_url: Option<String>,

        /// Gemini APIキーを設定
        #[arg(long)]
        set_gemini_key: Option<String>,

        /// 構造化の入力方式を設定 (text/image)
        #[arg(long)]
        set_structuring_mode: Option<StructuringMode>,

        /// 撮影コマンドを設定（`{output}` が保存先に置換される）
        #[arg(long)]
        set_camera_command: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}
