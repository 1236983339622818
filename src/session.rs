use axum::http::{HeaderMap, header};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "sid";
/// Session lifetime, fixed from creation (no sliding renewal).
pub const SESSION_TTL: Duration = Duration::from_secs(600);

struct Session {
    username: String,
    expires: Instant,
}

/// Token-keyed in-memory session store. Expired entries are removed the
/// next time their token is presented.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a token and open a session for `username`.
    pub async fn open(&self, username: &str) -> String {
        let token = new_token();
        self.insert(token.clone(), username.to_string(), SESSION_TTL).await;
        token
    }

    async fn insert(&self, token: String, username: String, ttl: Duration) {
        self.inner.write().await.insert(
            token,
            Session {
                username,
                expires: Instant::now() + ttl,
            },
        );
    }

    /// Resolve a token to its username, purging the entry if expired.
    pub async fn username(&self, token: &str) -> Option<String> {
        let mut sessions = self.inner.write().await;
        match sessions.get(token) {
            Some(s) if s.expires > Instant::now() => Some(s.username.clone()),
            Some(_) => {
                sessions.remove(token);
                None
            }
            None => None,
        }
    }

    pub async fn close(&self, token: &str) {
        self.inner.write().await.remove(token);
    }
}

// ── Cookie helpers ────────────────────────────────────────────────────────────

pub fn extract_session_cookie(headers: &HeaderMap) -> Option<String> {
    let cookie_str = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_str.split(';') {
        let part = part.trim();
        if let Some(val) = part.strip_prefix(&format!("{}=", SESSION_COOKIE)) {
            return Some(val.to_string());
        }
    }
    None
}

pub fn session_cookie(token: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
        SESSION_COOKIE,
        token,
        SESSION_TTL.as_secs()
    )
}

pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0", SESSION_COOKIE)
}

// ── Tokens and nonces ─────────────────────────────────────────────────────────

fn new_token() -> String {
    random_hex(32)
}

/// Per-request CSP nonce.
pub fn new_nonce() -> String {
    random_hex(16)
}

fn random_hex(len: usize) -> String {
    use rand::RngCore;
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn open_resolve_close() {
        let sessions = SessionStore::new();
        let token = sessions.open("alice123").await;
        assert_eq!(sessions.username(&token).await.as_deref(), Some("alice123"));
        sessions.close(&token).await;
        assert_eq!(sessions.username(&token).await, None);
    }

    #[tokio::test]
    async fn expired_sessions_are_purged() {
        let sessions = SessionStore::new();
        sessions
            .insert("tok".into(), "alice123".into(), Duration::ZERO)
            .await;
        assert_eq!(sessions.username("tok").await, None);
        // Purged, not just hidden.
        assert!(sessions.inner.read().await.is_empty());
    }

    #[test]
    fn cookie_roundtrip() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; sid=abc123; other=1"),
        );
        assert_eq!(extract_session_cookie(&headers).as_deref(), Some("abc123"));

        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark"));
        assert_eq!(extract_session_cookie(&headers), None);
    }

    #[test]
    fn tokens_are_hex_and_distinct() {
        let a = new_token();
        let b = new_token();
        assert_eq!(a.len(), 64);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
