use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use std::env;

/// Source of the bearer credential
pub trait TokenSource: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// A token fixed at construction; `None` models a signed-out user.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn signed_out() -> Self {
        Self(None)
    }
}

impl TokenSource for StaticToken {
    fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Reads the token from `CHESS_TOKEN` on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvToken;

impl TokenSource for EnvToken {
    fn token(&self) -> Option<String> {
        env::var("CHESS_TOKEN").ok().filter(|t| !t.trim().is_empty())
    }
}

#[derive(Deserialize)]
struct Claims {
    sub: Option<serde_json::Value>,
}

/// User id carried in the token's `sub` claim.
///
/// The signature is not checked here; the backend verifies every request.
pub fn user_id_from_token(token: &str) -> Option<String> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    match claims.sub? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) fn unsigned_token(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.signature")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_string_and_numeric_sub() {
        assert_eq!(
            user_id_from_token(&unsigned_token(&json!({ "sub": "17" }))),
            Some("17".to_string())
        );
        assert_eq!(
            user_id_from_token(&unsigned_token(&json!({ "sub": 17, "exp": 1 }))),
            Some("17".to_string())
        );
    }

    #[test]
    fn rejects_tokens_without_sub() {
        assert_eq!(user_id_from_token(&unsigned_token(&json!({ "exp": 1 }))), None);
        assert_eq!(user_id_from_token("not-a-jwt"), None);
        assert_eq!(user_id_from_token("a.!!!.c"), None);
    }

    #[test]
    fn signed_out_has_no_token() {
        assert_eq!(StaticToken::signed_out().token(), None);
        assert_eq!(StaticToken::new("abc").token().as_deref(), Some("abc"));
    }
}
