//! OAuth client configuration
//!
//! An explicitly constructed struct passed to the flow functions — there is
//! deliberately no module-level client or global registration. The endpoint
//! fields default to Google's real URLs; tests override them with a local
//! mock server.

use common::Secret;

use crate::constants::{AUTHORIZE_ENDPOINT, TOKEN_ENDPOINT, USERINFO_ENDPOINT};

/// Everything needed to drive the login handshake against Google.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// OAuth2 client id (public)
    pub client_id: String,
    /// OAuth2 client secret, redacted in logs
    pub client_secret: Secret<String>,
    /// Callback URL registered for this deployment environment
    pub redirect_uri: String,
    pub authorize_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
}

impl GoogleConfig {
    /// Build a config pointing at Google's production endpoints.
    pub fn new(client_id: String, client_secret: Secret<String>, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            authorize_endpoint: AUTHORIZE_ENDPOINT.to_owned(),
            token_endpoint: TOKEN_ENDPOINT.to_owned(),
            userinfo_endpoint: USERINFO_ENDPOINT.to_owned(),
        }
    }

    /// Repoint every endpoint at the given base URL. Test hook for driving
    /// the full flow against a local mock server.
    pub fn with_endpoint_base(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.authorize_endpoint = format!("{base}/o/oauth2/v2/auth");
        self.token_endpoint = format!("{base}/token");
        self.userinfo_endpoint = format!("{base}/oauth2/v2/userinfo");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> GoogleConfig {
        GoogleConfig::new(
            "client-123.apps.googleusercontent.com".into(),
            Secret::new("shhh".into()),
            "http://localhost:3000/auth/callback".into(),
        )
    }

    #[test]
    fn new_uses_production_endpoints() {
        let cfg = test_config();
        assert_eq!(cfg.authorize_endpoint, AUTHORIZE_ENDPOINT);
        assert_eq!(cfg.token_endpoint, TOKEN_ENDPOINT);
        assert_eq!(cfg.userinfo_endpoint, USERINFO_ENDPOINT);
    }

    #[test]
    fn endpoint_base_override_rewrites_all_endpoints() {
        let cfg = test_config().with_endpoint_base("http://127.0.0.1:9999/");
        assert_eq!(cfg.token_endpoint, "http://127.0.0.1:9999/token");
        assert_eq!(
            cfg.userinfo_endpoint,
            "http://127.0.0.1:9999/oauth2/v2/userinfo"
        );
        assert!(cfg.authorize_endpoint.starts_with("http://127.0.0.1:9999/"));
    }

    #[test]
    fn debug_redacts_client_secret() {
        let cfg = test_config();
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("shhh"), "secret leaked: {debug}");
        assert!(debug.contains("[REDACTED]"));
    }
}
