//! Verified profile fetch
//!
//! After the code exchange, the granted access token is presented to the
//! userinfo endpoint to learn who actually authorized us. The profile's id
//! is the provider-assigned identity every record in the gateway keys on.

use serde::Deserialize;

use crate::config::GoogleConfig;
use crate::error::{Error, Result};

/// The subset of the userinfo response the gateway persists.
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    /// Provider-assigned unique id, stable across logins
    pub id: String,
    pub email: String,
    /// Display name
    pub name: String,
}

/// Fetch the profile behind an access token.
///
/// A rejected token (expired, revoked upstream) surfaces as `Profile` error
/// with the provider's status — the caller treats any failure here as a
/// failed login, never as a partially-authenticated user.
pub async fn fetch_profile(
    client: &reqwest::Client,
    config: &GoogleConfig,
    access_token: &str,
) -> Result<Profile> {
    let response = client
        .get(&config.userinfo_endpoint)
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| Error::Http(format!("userinfo request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::Profile(format!(
            "userinfo endpoint returned {status}: {body}"
        )));
    }

    response
        .json::<Profile>()
        .await
        .map_err(|e| Error::Profile(format!("invalid userinfo response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Secret;

    fn test_config(base: &str) -> GoogleConfig {
        GoogleConfig::new(
            "client-123".into(),
            Secret::new("secret".into()),
            "http://localhost:3000/auth/callback".into(),
        )
        .with_endpoint_base(base)
    }

    #[test]
    fn profile_deserializes_and_ignores_extra_fields() {
        let json = r#"{
            "id": "107534812345678901234",
            "email": "creator@example.com",
            "verified_email": true,
            "name": "Creator Example",
            "given_name": "Creator",
            "picture": "https://lh3.googleusercontent.com/a/photo"
        }"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.id, "107534812345678901234");
        assert_eq!(profile.email, "creator@example.com");
        assert_eq!(profile.name, "Creator Example");
    }

    #[tokio::test]
    async fn fetch_profile_sends_bearer_token() {
        use axum::http::HeaderMap;
        use axum::routing::get;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = axum::Router::new().route(
            "/oauth2/v2/userinfo",
            get(|headers: HeaderMap| async move {
                assert_eq!(
                    headers.get("authorization").unwrap(),
                    "Bearer ya29.granted",
                    "userinfo must be called with the granted access token"
                );
                axum::Json(serde_json::json!({
                    "id": "g-1",
                    "email": "a@b.test",
                    "name": "A B"
                }))
            }),
        );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = reqwest::Client::new();
        let profile = fetch_profile(&client, &test_config(&format!("http://{addr}")), "ya29.granted")
            .await
            .unwrap();
        assert_eq!(profile.id, "g-1");
    }

    #[tokio::test]
    async fn fetch_profile_rejects_unauthorized_token() {
        use axum::http::StatusCode;
        use axum::routing::get;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = axum::Router::new().route(
            "/oauth2/v2/userinfo",
            get(|| async { (StatusCode::UNAUTHORIZED, "Invalid Credentials") }),
        );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = reqwest::Client::new();
        let err = fetch_profile(&client, &test_config(&format!("http://{addr}")), "ya29.dead")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Profile(_)), "got: {err:?}");
    }
}
