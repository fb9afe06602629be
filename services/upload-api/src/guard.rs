//! Access guard
//!
//! Every guarded handler runs the same checks. For a presented bearer token
//! the order is: denylist membership on the raw string, then signature
//! verification, then resolution to a stored user. Membership comes first so
//! that a just-revoked credential answers "invalidated" rather than falling
//! through signature failure into a generic "unauthenticated" — the denylist
//! holds provider tokens as well as our own JWTs.
//!
//! Without a bearer token, authentication falls back to the session cookie;
//! a session whose user record has vanished is treated as no session.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum_extra::extract::SignedCookieJar;

use auth_store::UserRecord;

use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::metrics;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "sid";

/// An authenticated caller: the resolved record plus how they proved it.
#[derive(Debug)]
pub struct AuthUser {
    pub user: UserRecord,
    /// Raw bearer token, when that was the authentication path
    pub bearer: Option<String>,
    /// Session id, when the cookie was the authentication path
    pub session_id: Option<String>,
}

/// Pull the token out of `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned)
}

/// Authenticate a request from its headers and cookie jar.
pub async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    jar: &SignedCookieJar,
) -> ApiResult<AuthUser> {
    if let Some(token) = bearer_token(headers) {
        if state.revocations.is_revoked(&token).await? {
            metrics::record_guard_rejection("token_invalidated");
            return Err(ApiError::TokenInvalidated);
        }

        let claims = bearer::verify(
            state.config.secrets.token_secret.expose().as_bytes(),
            &token,
        )
        .map_err(|e| {
            metrics::record_guard_rejection("invalid_credential");
            ApiError::InvalidCredential(e)
        })?;

        let user = state
            .users
            .find_by_google_id(&claims.sub)
            .await?
            .ok_or_else(|| {
                metrics::record_guard_rejection("unauthenticated");
                ApiError::Unauthenticated
            })?;

        return Ok(AuthUser {
            user,
            bearer: Some(token),
            session_id: None,
        });
    }

    let session_id = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_owned())
        .ok_or_else(|| {
            metrics::record_guard_rejection("unauthenticated");
            ApiError::Unauthenticated
        })?;

    let user_ref = state.sessions.resolve(&session_id).await?.ok_or_else(|| {
        metrics::record_guard_rejection("unauthenticated");
        ApiError::Unauthenticated
    })?;

    let user = state
        .users
        .find_by_google_id(&user_ref)
        .await?
        .ok_or_else(|| {
            metrics::record_guard_rejection("unauthenticated");
            ApiError::Unauthenticated
        })?;

    Ok(AuthUser {
        user,
        bearer: None,
        session_id: Some(session_id),
    })
}

/// The delegated upload action needs an upstream credential to act with.
pub fn require_delegated_access(auth: &AuthUser) -> ApiResult<&str> {
    let token = auth.user.access_token.as_str();
    if token.is_empty() {
        metrics::record_guard_rejection("missing_delegated_access");
        return Err(ApiError::MissingDelegatedAccess);
    }
    Ok(token)
}
