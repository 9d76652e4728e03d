//! ログインセッション
//!
//! ログインAPIのレスポンスからユーザー情報とトークンを取り出す。
//! トークンは中身を解釈せず、そのまま Bearer として使う。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const ID_KEYS: &[&str] = &["id", "userId", "useId"];
const TOKEN_KEYS: &[&str] = &["token", "accessToken"];

/// ログイン中のユーザー
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
}

/// 保存されるセッション
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: SessionUser,
    #[serde(default)]
    pub token: Option<String>,
}

/// 認証付きAPI呼び出しに必要な情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: i64,
    pub token: String,
}

impl Session {
    /// ユーザーとトークンが揃っていれば認証情報を返す
    pub fn auth(&self) -> Option<AuthContext> {
        let token = self.token.as_deref().filter(|t| !t.trim().is_empty())?;
        Some(AuthContext {
            user_id: self.user.id,
            token: token.to_string(),
        })
    }
}

fn as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f as i64),
        _ => None,
    }
}

fn string_field<'a>(record: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| record.get(*key).and_then(Value::as_str))
}

/// ログインレスポンスからセッションを組み立てる
///
/// `user` オブジェクトがあればそれを、無ければルートをユーザー情報として読む。
/// IDが読めなければ0、ユーザー名が無ければ入力されたユーザー名を使う。
pub fn parse_login_response(body: &Value, username: &str) -> Session {
    let empty = Map::new();
    let root = body.as_object().unwrap_or(&empty);
    let candidate = root.get("user").and_then(Value::as_object).unwrap_or(root);

    let id = ID_KEYS
        .iter()
        .filter_map(|key| candidate.get(*key))
        .find(|v| !v.is_null())
        .and_then(as_id)
        .unwrap_or(0);

    let resolved_username = string_field(candidate, &["username"])
        .or_else(|| string_field(root, &["username"]))
        .unwrap_or(username)
        .to_string();

    let token = string_field(root, TOKEN_KEYS)
        .or_else(|| string_field(candidate, TOKEN_KEYS))
        .map(str::to_string);

    Session {
        user: SessionUser {
            id,
            username: resolved_username,
        },
        token,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_nested_user() {
        let body = json!({"user": {"id": 12, "username": "hanako"}, "token": "abc"});
        let session = parse_login_response(&body, "typed");
        assert_eq!(session.user, SessionUser { id: 12, username: "hanako".into() });
        assert_eq!(session.token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_parse_flat_user_with_synonym_id() {
        let body = json!({"userId": "34", "accessToken": "t"});
        let session = parse_login_response(&body, "taro");
        assert_eq!(session.user.id, 34);
        assert_eq!(session.user.username, "taro");
        assert_eq!(session.token.as_deref(), Some("t"));

        let body = json!({"useId": 5});
        assert_eq!(parse_login_response(&body, "x").user.id, 5);
    }

    #[test]
    fn test_parse_username_fallback_to_root() {
        let body = json!({"user": {"id": 1}, "username": "root-name"});
        assert_eq!(parse_login_response(&body, "typed").user.username, "root-name");
    }

    #[test]
    fn test_parse_non_object_body() {
        let session = parse_login_response(&json!(null), "taro");
        assert_eq!(session.user, SessionUser { id: 0, username: "taro".into() });
        assert!(session.token.is_none());
    }

    #[test]
    fn test_parse_non_numeric_id() {
        let body = json!({"id": "abc"});
        assert_eq!(parse_login_response(&body, "x").user.id, 0);
    }

    #[test]
    fn test_auth_requires_token() {
        let mut session = Session {
            user: SessionUser { id: 3, username: "a".into() },
            token: None,
        };
        assert!(session.auth().is_none());

        session.token = Some("  ".into());
        assert!(session.auth().is_none());

        session.token = Some("bearer-token".into());
        assert_eq!(
            session.auth(),
            Some(AuthContext { user_id: 3, token: "bearer-token".into() })
        );
    }
}
