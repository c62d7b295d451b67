//! Session credentials
//!
//! The upload endpoint requires the anti-forgery token of the session in a
//! request header. The token is issued by the server as the `XSRF-TOKEN`
//! cookie, so it is read back from the forwarded `Cookie` header.

use docdrop_core::SessionCredentials;

pub const XSRF_COOKIE: &str = "XSRF-TOKEN";

/// Value of cookie `name` in a `Cookie` header string.
pub fn cookie_value(cookie_header: &str, name: &str) -> Option<String> {
    cookie_header
        .split(';')
        .filter_map(|part| part.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
}

/// Reads the XSRF token from a session cookie.
#[derive(Clone, Debug, Default)]
pub struct CookieCredentials {
    cookie: Option<String>,
}

impl CookieCredentials {
    pub fn new(cookie: Option<String>) -> Self {
        Self { cookie }
    }
}

impl SessionCredentials for CookieCredentials {
    fn xsrf_token(&self) -> Option<String> {
        let token = self
            .cookie
            .as_deref()
            .and_then(|c| cookie_value(c, XSRF_COOKIE));
        if token.is_none() {
            tracing::debug!("Session cookie carries no {} value", XSRF_COOKIE);
        }
        token
    }
}

/// Fixed token, for hosts that obtain it elsewhere.
#[derive(Clone, Debug, Default)]
pub struct StaticCredentials(pub Option<String>);

impl SessionCredentials for StaticCredentials {
    fn xsrf_token(&self) -> Option<String> {
        self.0.clone()
    }
}
