//! Cookie session gate for the operator pages.
//!
//! One operator login, checked against configured constants. A successful
//! login registers a random token that the browser carries in a cookie.
//! Sessions expire `ttl` after login; expired tokens are pruned on each login.

use axum::http::{header, HeaderMap, HeaderValue};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const SESSION_COOKIE: &str = "soil_session";

/// session lifetime when nothing else is configured
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub struct SessionManager {
    username: String,
    password: String,
    ttl: Duration,
    /// token -> issued at
    active: Mutex<HashMap<String, Instant>>,
}

impl SessionManager {
    pub fn new(username: impl Into<String>, password: impl Into<String>, ttl: Duration) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ttl,
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Check credentials and open a session, returning its token
    pub fn login(&self, username: &str, password: &str) -> Option<String> {
        // evaluate both so a bad username costs the same as a bad password
        let user_ok = constant_time_compare(&self.username, username);
        let pass_ok = constant_time_compare(&self.password, password);
        if !(user_ok & pass_ok) {
            return None;
        }

        let token = generate_token();
        let now = Instant::now();
        let mut sessions = self.sessions();
        sessions.retain(|_, issued| now.duration_since(*issued) < self.ttl);
        sessions.insert(token.clone(), now);
        Some(token)
    }

    /// Whether the request carries a live, unexpired session cookie
    pub fn is_authenticated(&self, headers: &HeaderMap) -> bool {
        let Some(token) = session_token(headers) else {
            return false;
        };
        match self.sessions().get(token) {
            Some(issued) => issued.elapsed() < self.ttl,
            None => false,
        }
    }

    /// Close the session named by the request cookie, if any
    pub fn logout(&self, headers: &HeaderMap) {
        if let Some(token) = session_token(headers) {
            self.sessions().remove(token);
        }
    }

    fn sessions(&self) -> std::sync::MutexGuard<'_, HashMap<String, Instant>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// `Set-Cookie` value opening a session that lives for `ttl`
pub fn session_cookie(token: &str, ttl: Duration) -> HeaderValue {
    // tokens are hex so this can only fail on a broken generator
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        ttl.as_secs()
    ))
    .unwrap_or_else(|_| expired_cookie())
}

/// `Set-Cookie` value removing the session cookie
pub fn expired_cookie() -> HeaderValue {
    HeaderValue::from_static("soil_session=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0")
}

/// Find our cookie among every `Cookie` header on the request
fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| token)
        .filter(|token| !token.is_empty())
}

/// 32 random bytes, hex encoded
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// Constant-time string comparison to prevent timing attacks
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
