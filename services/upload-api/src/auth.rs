//! Login, session, and logout handlers
//!
//! The broker half of the gateway: drives the external handshake, resolves
//! or creates the user record, establishes the session, and runs the inverse
//! (revoke-then-teardown) on logout.
//!
//! Endpoints:
//! - GET /auth/login         — redirect to the provider with fresh CSRF state
//! - GET /auth/callback      — provider redirect target (code or denial)
//! - GET /auth/success       — session-only summary after a login
//! - GET /auth/failure       — generic login failure description
//! - GET /auth/consent-error — remediation for an explicit consent denial
//! - GET /auth/status        — guarded summary (auth + revocation check)
//! - GET /auth/logout        — guarded revoke-then-teardown

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use axum_extra::extract::SignedCookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use auth_store::{CredentialBundle, StoreError, UserRecord, UserStore};
use google_auth::Profile;

use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::guard::{self, SESSION_COOKIE};
use crate::metrics;

/// Maximum age of a pending login state before it expires.
const LOGIN_STATE_EXPIRY_SECS: u64 = 600; // 10 minutes

/// In-flight login handshakes, keyed by CSRF state.
///
/// Created by the login redirect and consumed exactly once by the callback.
/// Expired entries are cleaned up lazily while the lock is held.
#[derive(Clone, Default)]
pub struct PendingLogins {
    states: Arc<Mutex<HashMap<String, Instant>>>,
}

impl PendingLogins {
    /// Register a fresh state value for an outgoing redirect.
    pub async fn begin(&self) -> String {
        let state = google_auth::generate_state();
        let mut states = self.states.lock().await;
        states.retain(|_, created| created.elapsed().as_secs() < LOGIN_STATE_EXPIRY_SECS);
        states.insert(state.clone(), Instant::now());
        state
    }

    /// Consume a state returned by the provider. False means unknown,
    /// already used, or expired.
    pub async fn consume(&self, state: &str) -> bool {
        let mut states = self.states.lock().await;
        states.retain(|_, created| created.elapsed().as_secs() < LOGIN_STATE_EXPIRY_SECS);
        states.remove(state).is_some()
    }
}

/// GET /auth/login — send the client to the provider's consent screen.
pub async fn login(State(state): State<AppState>) -> Redirect {
    let csrf = state.pending_logins.begin().await;
    let url = google_auth::build_authorization_url(&state.google, &csrf);
    Redirect::temporary(&url)
}

/// Query parameters the provider may send to the callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// GET /auth/callback — complete (or abort) the handshake.
///
/// An explicit `error=access_denied` is the user declining consent: it gets
/// its own redirect target so the client can show a remediation path, and is
/// never folded into the generic failure branch.
pub async fn callback(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if let Some(error) = query.error {
        if error == "access_denied" {
            warn!("login denied at consent screen");
            metrics::record_login("consent_denied");
            return Redirect::to("/auth/consent-error").into_response();
        }
        warn!(error, "provider returned an error on callback");
        metrics::record_login("failure");
        return Redirect::to(&failure_target(Some(error.as_str()))).into_response();
    }

    let (Some(code), Some(csrf)) = (query.code, query.state) else {
        warn!("callback missing code or state");
        metrics::record_login("failure");
        return Redirect::to("/auth/failure").into_response();
    };

    if !state.pending_logins.consume(&csrf).await {
        warn!("callback state unknown or expired");
        metrics::record_login("failure");
        return Redirect::to("/auth/failure").into_response();
    }

    match complete_login(&state, &code).await {
        Ok(session_id) => {
            metrics::record_login("success");
            let jar = jar.add(session_cookie(session_id));
            (jar, Redirect::to("/auth/success")).into_response()
        }
        Err(e) => {
            warn!(error = %e, "login handshake failed");
            metrics::record_login("failure");
            Redirect::to("/auth/failure").into_response()
        }
    }
}

/// Exchange the code, resolve the profile, persist the user, open a session.
///
/// The ordering matters: the record is persisted before the session is
/// created, so a session can never reference a user that was never written.
async fn complete_login(state: &AppState, code: &str) -> ApiResult<String> {
    let tokens = google_auth::exchange_code(&state.http, &state.google, code).await?;
    let profile = google_auth::fetch_profile(&state.http, &state.google, &tokens.access_token).await?;

    let bundle = CredentialBundle {
        access_token: tokens.access_token.clone(),
        refresh_token: tokens.refresh_token.clone().unwrap_or_default(),
        scope: tokens.scope.clone(),
        token_type: "Bearer".into(),
        // Fixed one-hour estimate: the provider may omit a lifetime on
        // repeat consent, so we never trust expires_in
        expiry: Utc::now() + chrono::Duration::hours(1),
    };

    let record = upsert_user(&state.users, &profile, bundle).await?;
    let session_id = state.sessions.create(&record.google_id).await?;

    info!(google_id = %record.google_id, "login complete");
    Ok(session_id)
}

/// Create-or-update a user record for a verified profile.
///
/// Two racing first-time logins both reach `insert_new`; the storage layer's
/// unique constraint rejects the loser, which retries as an update. An email
/// already claimed by a different identity stays a hard failure.
pub(crate) async fn upsert_user(
    users: &UserStore,
    profile: &Profile,
    bundle: CredentialBundle,
) -> ApiResult<UserRecord> {
    if users.find_by_google_id(&profile.id).await?.is_some() {
        return Ok(users.update_credentials(&profile.id, bundle).await?);
    }

    let record = UserRecord::new(
        profile.id.clone(),
        profile.email.clone(),
        profile.name.clone(),
        bundle.clone(),
    );
    match users.insert_new(&record).await {
        Ok(()) => Ok(record),
        Err(StoreError::Duplicate(_)) => Ok(users.update_credentials(&profile.id, bundle).await?),
        Err(e) => Err(e.into()),
    }
}

/// GET /auth/success — summary for a freshly established session.
pub async fn success(State(state): State<AppState>, jar: SignedCookieJar) -> Response {
    let Some(user) = session_user(&state, &jar).await else {
        return Redirect::to("/auth/failure").into_response();
    };

    match user_summary(&state, &user, "Successfully authenticated with Google") {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct FailureQuery {
    pub error: Option<String>,
}

/// GET /auth/failure — generic login failure.
pub async fn failure(Query(query): Query<FailureQuery>) -> impl IntoResponse {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "message": "Failed to authenticate with Google",
            "error": query.error,
        })),
    )
}

/// GET /auth/consent-error — the user declined consent.
pub async fn consent_error() -> impl IntoResponse {
    (
        StatusCode::FORBIDDEN,
        Json(serde_json::json!({
            "message": "OAuth Consent Screen Error",
            "error": "access_denied",
            "solution": "This application is in testing mode. Ask the developer to add \
                your Google account to the application's test-user allow list.",
        })),
    )
}

/// GET /auth/status — guarded authentication check.
pub async fn status(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let auth = guard::authenticate(&state, &headers, &jar).await?;
    let mut body = user_summary(&state, &auth.user, "Authenticated")?;
    body["authenticated"] = serde_json::json!(true);
    Ok(Json(body))
}

/// GET /auth/logout — revoke the delegated credential, then tear down.
///
/// Revocation strictly precedes teardown: when a denylist write fails the
/// session is left intact and the caller sees the failure, so "session
/// cleared but token still live" cannot happen.
pub async fn logout(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    headers: HeaderMap,
) -> ApiResult<(SignedCookieJar, Json<serde_json::Value>)> {
    let auth = guard::authenticate(&state, &headers, &jar).await?;
    let access_token = guard::require_delegated_access(&auth)?.to_owned();

    revoke_idempotent(&state, &access_token, &auth.user.google_id).await?;
    if let Some(token) = &auth.bearer {
        if *token != access_token {
            revoke_idempotent(&state, token, &auth.user.google_id).await?;
        }
    }

    if let Some(session_id) = &auth.session_id {
        state.sessions.destroy(session_id).await?;
    }
    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build());

    info!(google_id = %auth.user.google_id, "logged out");
    Ok((
        jar,
        Json(serde_json::json!({
            "message": "Successfully logged out and invalidated tokens",
            "success": true,
        })),
    ))
}

/// A credential already in the denylist is already logged out.
async fn revoke_idempotent(state: &AppState, token: &str, user_id: &str) -> ApiResult<()> {
    match state.revocations.revoke(token, user_id).await {
        Ok(()) | Err(StoreError::Duplicate(_)) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Resolve the session cookie to a live user record, if any.
async fn session_user(state: &AppState, jar: &SignedCookieJar) -> Option<UserRecord> {
    let session_id = jar.get(SESSION_COOKIE)?;
    let user_ref = state
        .sessions
        .resolve(session_id.value())
        .await
        .ok()
        .flatten()?;
    state.users.find_by_google_id(&user_ref).await.ok().flatten()
}

/// The id/email/name + credential bundle summary shared by success/status,
/// plus a freshly issued bearer token for subsequent guarded calls.
fn user_summary(
    state: &AppState,
    user: &UserRecord,
    message: &str,
) -> ApiResult<serde_json::Value> {
    let token = bearer::issue(
        state.config.secrets.token_secret.expose().as_bytes(),
        &user.google_id,
    )
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(serde_json::json!({
        "message": message,
        "user": {
            "id": user.google_id,
            "email": user.email,
            "name": user.name,
        },
        "tokens": {
            "accessToken": user.access_token,
            "refreshToken": user.refresh_token,
        },
        "token": token,
    }))
}

fn session_cookie(session_id: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_id))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

/// Only well-formed provider error codes are reflected into the failure URL.
fn failure_target(error: Option<&str>) -> String {
    match error {
        Some(e) if e.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') => {
            format!("/auth/failure?error={e}")
        }
        _ => "/auth/failure".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_router;
    use crate::testutil::{
        issue_bearer, mock_google, seed_user, signed_cookie_header, test_bundle, test_state,
        test_state_with_google,
    };
    use axum::body::Body;
    use axum::http::{Request, header};
    use tower::ServiceExt;

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn test_profile(id: &str, email: &str) -> Profile {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "email": email,
            "name": "Creator Example",
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn login_redirects_to_provider_with_state() {
        let state = test_state().await;
        let app = build_router(state.clone());

        let response = app.oneshot(get("/auth/login")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

        let location = response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(location.starts_with(&state.google.authorize_endpoint));
        assert!(location.contains("state="));
        assert!(location.contains("access_type=offline"));
        assert!(location.contains("prompt=consent"));
    }

    #[tokio::test]
    async fn callback_denial_redirects_to_consent_error() {
        let state = test_state().await;
        let app = build_router(state);

        let response = app
            .oneshot(get("/auth/callback?error=access_denied&state=whatever"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/auth/consent-error"
        );
    }

    #[tokio::test]
    async fn consent_error_returns_403_with_remediation() {
        let state = test_state().await;
        let app = build_router(state);

        let response = app.oneshot(get("/auth/consent-error")).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let json = body_json(response).await;
        assert_eq!(json["error"], "access_denied");
        assert!(
            json["solution"].as_str().unwrap().contains("allow list"),
            "remediation must name the allow-listing requirement: {json}"
        );
    }

    #[tokio::test]
    async fn callback_generic_error_redirects_to_failure() {
        let state = test_state().await;
        let app = build_router(state);

        let response = app
            .oneshot(get("/auth/callback?error=server_error"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/auth/failure?error=server_error"
        );
    }

    #[tokio::test]
    async fn callback_unknown_state_redirects_to_failure() {
        let state = test_state().await;
        let app = build_router(state);

        let response = app
            .oneshot(get("/auth/callback?code=abc&state=never-issued"))
            .await
            .unwrap();
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/auth/failure"
        );
    }

    #[tokio::test]
    async fn full_login_flow_persists_user_and_establishes_session() {
        let google = mock_google("g-777", "creator@example.com").await;
        let state = test_state_with_google(&google).await;

        // Step 1: login redirect carries the state parameter
        let response = build_router(state.clone())
            .oneshot(get("/auth/login"))
            .await
            .unwrap();
        let location = response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_owned();
        let csrf = location.rsplit("state=").next().unwrap().to_owned();

        // Step 2: provider redirects back with a code
        let response = build_router(state.clone())
            .oneshot(get(&format!("/auth/callback?code=mock-code&state={csrf}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/auth/success"
        );
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("callback must set the session cookie")
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_owned();

        // The record was persisted with the granted bundle
        let record = state
            .users
            .find_by_google_id("g-777")
            .await
            .unwrap()
            .expect("user record must exist after login");
        assert_eq!(record.email, "creator@example.com");
        assert_eq!(record.access_token, "ya29.mock-access");
        assert_eq!(record.refresh_token, "1//mock-refresh");
        assert_eq!(record.tokens.token_type, "Bearer");

        // Step 3: the session cookie authenticates /auth/success
        let response = build_router(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/auth/success")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["user"]["id"], "g-777");
        assert_eq!(json["user"]["email"], "creator@example.com");
        assert_eq!(json["tokens"]["accessToken"], "ya29.mock-access");
        assert_eq!(json["tokens"]["refreshToken"], "1//mock-refresh");
        assert!(json["token"].is_string(), "a bearer token must be issued");
    }

    #[tokio::test]
    async fn success_without_session_redirects_to_failure() {
        let state = test_state().await;
        let response = build_router(state)
            .oneshot(get("/auth/success"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/auth/failure"
        );
    }

    #[tokio::test]
    async fn second_login_updates_record_in_place() {
        let state = test_state().await;
        let profile = test_profile("g-1", "a@example.com");

        let first = upsert_user(&state.users, &profile, test_bundle("first"))
            .await
            .unwrap();
        let second = upsert_user(&state.users, &profile, test_bundle("second"))
            .await
            .unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.email, "a@example.com");
        assert_eq!(second.access_token, "ya29.second");
    }

    #[tokio::test]
    async fn concurrent_first_logins_collapse_to_one_record() {
        let state = test_state().await;
        let profile = test_profile("g-1", "a@example.com");

        let a = upsert_user(&state.users, &profile, test_bundle("a"));
        let b = upsert_user(&state.users, &profile, test_bundle("b"));
        let (ra, rb) = tokio::join!(a, b);

        assert!(ra.is_ok() && rb.is_ok(), "both logins must succeed: {ra:?} {rb:?}");
        let record = state.users.find_by_google_id("g-1").await.unwrap().unwrap();
        assert!(
            record.access_token == "ya29.a" || record.access_token == "ya29.b",
            "exactly one bundle must win: {}",
            record.access_token
        );
    }

    #[tokio::test]
    async fn status_with_bearer_returns_summary() {
        let state = test_state().await;
        seed_user(&state, "g-1", "a@example.com").await;
        let token = issue_bearer("g-1");

        let response = build_router(state)
            .oneshot(
                Request::builder()
                    .uri("/auth/status")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["authenticated"], true);
        assert_eq!(json["user"]["id"], "g-1");
    }

    #[tokio::test]
    async fn logout_then_status_yields_token_invalidated() {
        let state = test_state().await;
        seed_user(&state, "g-1", "a@example.com").await;
        let token = issue_bearer("g-1");

        let response = build_router(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/auth/logout")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);

        // The just-revoked bearer must be rejected as invalidated, not as
        // merely unauthenticated
        let response = build_router(state)
            .oneshot(
                Request::builder()
                    .uri("/auth/status")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"], "token_invalidated");
    }

    #[tokio::test]
    async fn logout_revokes_stored_delegated_credential() {
        let state = test_state().await;
        let user = seed_user(&state, "g-1", "a@example.com").await;
        let token = issue_bearer("g-1");

        build_router(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/auth/logout")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(
            state.revocations.is_revoked(&user.access_token).await.unwrap(),
            "the stored delegated access credential must be denylisted"
        );
        assert!(
            state.revocations.is_revoked(&token).await.unwrap(),
            "the presented bearer must be denylisted"
        );
    }

    #[tokio::test]
    async fn logout_with_session_destroys_it() {
        let state = test_state().await;
        seed_user(&state, "g-1", "a@example.com").await;
        let sid = state.sessions.create("g-1").await.unwrap();
        let cookie = signed_cookie_header(&state, &sid);

        let response = build_router(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/auth/logout")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            state.sessions.resolve(&sid).await.unwrap(),
            None,
            "the session must be torn down"
        );
    }

    #[tokio::test]
    async fn logout_without_delegated_credential_is_rejected() {
        let state = test_state().await;
        let user = seed_user(&state, "g-1", "a@example.com").await;
        // Strip the delegated credential
        let mut bundle = user.tokens.clone();
        bundle.access_token = String::new();
        state.users.update_credentials("g-1", bundle).await.unwrap();
        let token = issue_bearer("g-1");

        let response = build_router(state)
            .oneshot(
                Request::builder()
                    .uri("/auth/logout")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"], "missing_delegated_access");
    }

    #[tokio::test]
    async fn failure_endpoint_describes_the_error() {
        let state = test_state().await;
        let response = build_router(state)
            .oneshot(get("/auth/failure?error=temporarily_unavailable"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let json = body_json(response).await;
        assert_eq!(json["message"], "Failed to authenticate with Google");
        assert_eq!(json["error"], "temporarily_unavailable");
    }

    #[tokio::test]
    async fn pending_state_is_single_use() {
        let pending = PendingLogins::default();
        let state = pending.begin().await;
        assert!(pending.consume(&state).await);
        assert!(!pending.consume(&state).await, "state must not be reusable");
    }

    #[test]
    fn failure_target_drops_suspicious_error_codes() {
        assert_eq!(
            failure_target(Some("server_error")),
            "/auth/failure?error=server_error"
        );
        assert_eq!(
            failure_target(Some("bad value <script>")),
            "/auth/failure",
            "unexpected characters must not be reflected"
        );
    }
}
