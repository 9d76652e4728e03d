//! セッション保存モジュール
//!
//! ログイン結果を設定ディレクトリの `session.json` に保存し、
//! 次回以降の登録・一覧取得で使う。

use crate::config::Config;
use crate::error::{ReceiptScanError, Result};
use receipt_scan_common::{AuthContext, Session};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

const SESSION_FILE_NAME: &str = "session.json";

pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// 既定の保存先（`~/.config/receipt-scan/session.json`）
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(Config::config_dir()?.join(SESSION_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 保存済みセッションを読み込む（無い・壊れている場合は `None`）
    pub fn load(&self) -> Option<Session> {
        let file = File::open(&self.path).ok()?;
        match serde_json::from_reader(BufReader::new(file)) {
            Ok(session) => Some(session),
            Err(e) => {
                log::warn!("セッションファイルを読めません ({}): {}", self.path.display(), e);
                None
            }
        }
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(writer, session)?;
        Ok(())
    }

    /// セッションを削除（削除した場合 `true`）
    pub fn clear(&self) -> Result<bool> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// 認証情報を取り出す。無ければ `NotSignedIn`。
    pub fn require_auth(&self) -> Result<AuthContext> {
        self.load()
            .and_then(|s| s.auth())
            .ok_or(ReceiptScanError::NotSignedIn)
    }
}
