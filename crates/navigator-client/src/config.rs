use std::time::Duration;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;
const DEFAULT_HEALTH_TIMEOUT_SECS: u64 = 5;

/// Connection settings for [`NavigatorClient`](crate::NavigatorClient).
///
/// The backend protects every state-changing endpoint with a double-submit
/// CSRF token: the value of the `XSRF-TOKEN` cookie must be echoed back in
/// the `X-XSRF-TOKEN` header. The embedding application reads the cookie and
/// supplies the token here; GET requests are exempt.
pub struct NavigatorClientConfig {
    pub(crate) base_url: String,
    pub(crate) csrf_token: Option<String>,
    pub(crate) connect_timeout: Duration,
    pub(crate) request_timeout: Duration,
    pub(crate) health_timeout: Duration,
}

impl std::fmt::Debug for NavigatorClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigatorClientConfig")
            .field("base_url", &self.base_url)
            .field("csrf_token", &self.csrf_token.as_ref().map(|_| "[REDACTED]"))
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("health_timeout", &self.health_timeout)
            .finish()
    }
}

impl NavigatorClientConfig {
    /// The request timeout defaults to five minutes: non-streaming chat
    /// completions can legitimately take that long on local hardware. The
    /// streaming path only honors the connect timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            csrf_token: None,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            health_timeout: Duration::from_secs(DEFAULT_HEALTH_TIMEOUT_SECS),
        }
    }

    pub fn csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_csrf_token() {
        let config = NavigatorClientConfig::new("http://localhost:8080").csrf_token("secret-123");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-123"));
        assert!(rendered.contains("REDACTED"));
    }
}
