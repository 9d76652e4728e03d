use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use dialoguer::Password;
use receipt_scan::api::{ApiClient, GeminiStructuringClient, ReceiptStore};
use receipt_scan::capture::{ImageCodec, ImageSource, PathImageSource, TerminalImageSource};
use receipt_scan::cli::{Cli, Commands};
use receipt_scan::config::Config;
use receipt_scan::session::SessionStore;
use receipt_scan::workflow::{CaptureWorkflow, PipelineServices};
use receipt_scan::{review, view};
use receipt_scan_common::{group_receipts_newest_first, CalendarMonth, DayIndex};
use std::path::PathBuf;
use std::sync::Arc;

fn init_logger(verbose: bool) {
    let default_filter = if verbose {
        "receipt_scan=debug,receipt_scan_common=debug,warn"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let mut config = Config::load().context("設定ファイルを読み込めません")?;
    let sessions = SessionStore::default_location()?;
    let base_url = cli.api_base_url.clone().unwrap_or_else(|| config.api_base_url());
    log::debug!("API接続先: {}", base_url);

    match cli.command {
        Commands::Scan { image, library, mode } => {
            println!("🧾 receipt-scan - レシート登録\n");

            let api = Arc::new(ApiClient::new(&base_url, config.timeout())?);
            let services = PipelineServices {
                encoder: Arc::new(ImageCodec::new(config.max_image_size)),
                ocr: api.clone(),
                structuring: Arc::new(GeminiStructuringClient::from_config(&config)?),
                mode: mode.unwrap_or(config.structuring_mode),
                timeout: config.timeout(),
            };
            let mut workflow = CaptureWorkflow::new(services, api);

            let source = TerminalImageSource::new(
                config.camera_command.clone(),
                Config::config_dir()?.join("captures"),
                library.unwrap_or_else(|| PathBuf::from(".")),
            );
            let preset = image.map(PathImageSource::new);
            let preset_source = preset.as_ref().map(|p| p as &dyn ImageSource);

            let registered =
                review::run_interactive_scan(&mut workflow, &source, preset_source, &sessions)
                    .await?;
            if !registered {
                println!("登録せずに終了しました");
            }
        }

        Commands::Receipts { group, json } => {
            let auth = sessions.require_auth()?;
            let client = ApiClient::new(&base_url, config.timeout())?;
            let receipts = client
                .list(&auth)
                .await
                .context("レシートの取得に失敗しました")?;
            let sections = group_receipts_newest_first(&receipts, group);

            if json {
                println!("{}", serde_json::to_string_pretty(&sections)?);
            } else {
                println!("🧾 レシート一覧（{}ごと）\n", group.display_name());
                print!("{}", view::render_sections(&sections));
            }
        }

        Commands::Calendar { month, day } => {
            let selected = day
                .map(|text| NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d"))
                .transpose()
                .context("日付は YYYY-MM-DD で指定してください")?;
            let shown = match (month, selected) {
                (Some(text), _) => CalendarMonth::parse(&text)?,
                (None, Some(date)) => CalendarMonth::containing(date),
                (None, None) => CalendarMonth::current(),
            };
            let selected = selected.unwrap_or_else(|| Local::now().date_naive());

            let auth = sessions.require_auth()?;
            let client = ApiClient::new(&base_url, config.timeout())?;
            let receipts = client
                .list(&auth)
                .await
                .context("レシートの取得に失敗しました")?;
            let index = DayIndex::build(&receipts);

            print!("{}", view::render_calendar(&shown, &index, Some(selected)));
            print!("{}", view::render_month_navigation(&shown));
            println!();
            print!("{}", view::render_day(selected, &index));
        }

        Commands::Login { username, password } => {
            let password = match password {
                Some(p) => p,
                None => Password::new().with_prompt("パスワード").interact()?,
            };

            let client = ApiClient::new(&base_url, config.timeout())?;
            let session = client
                .sign_in(&username, &password)
                .await
                .context("ログインに失敗しました")?;
            sessions.save(&session)?;

            println!("✔ {} としてログインしました", session.user.username);
            if session.auth().is_none() {
                println!("⚠ トークンが返されなかったため、登録・一覧取得はできません");
            }
        }

        Commands::Logout => {
            if sessions.clear()? {
                println!("✔ ログアウトしました");
            } else {
                println!("ログインしていません");
            }
        }

        Commands::Config {
            set_base_url,
            set_gemini_key,
            set_structuring_mode,
            set_camera_command,
            show,
        } => {
            let changed = set_base_url.is_some()
                || set_gemini_key.is_some()
                || set_structuring_mode.is_some()
                || set_camera_command.is_some();

            if let Some(url) = set_base_url {
                config.api_base_url = Some(url);
            }
            if let Some(key) = set_gemini_key {
                config.gemini_api_key = Some(key);
            }
            if let Some(mode) = set_structuring_mode {
                config.structuring_mode = mode;
            }
            if let Some(command) = set_camera_command {
                config.camera_command = Some(command);
            }
            if changed {
                config.save()?;
                println!("✔ 設定を保存しました");
            }

            if show || !changed {
                println!("設定:");
                println!("  API接続先: {}", config.api_base_url());
                println!("  構造化方式: {}", config.structuring_mode);
                println!("  Geminiモデル: {}", config.gemini_model);
                println!(
                    "  Gemini APIキー: {}",
                    if config.get_gemini_api_key().is_ok() { "設定済み" } else { "未設定" }
                );
                println!("  最大画像サイズ: {}px", config.max_image_size);
                println!("  タイムアウト: {}秒", config.timeout_seconds);
                println!(
                    "  撮影コマンド: {}",
                    config.camera_command.as_deref().unwrap_or("未設定")
                );
                println!(
                    "  ログイン: {}",
                    sessions
                        .load()
                        .map(|s| s.user.username)
                        .unwrap_or_else(|| "未ログイン".into())
                );
            }
        }
    }

    Ok(())
}
