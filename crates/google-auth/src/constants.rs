//! Google OAuth2 constants
//!
//! Public endpoint and scope configuration. These values are not secrets —
//! the client secret and granted tokens are handled elsewhere.

/// Authorization endpoint the client's browser is sent to
pub const AUTHORIZE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Token endpoint for authorization-code exchange
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Userinfo endpoint for fetching the verified profile
pub const USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Scopes requested on every login: profile + email for the user record,
/// `youtube.upload` for the delegated upload action, `openid` for the
/// identity assertion.
pub const SCOPES: &str = "https://www.googleapis.com/auth/userinfo.profile \
    https://www.googleapis.com/auth/userinfo.email \
    https://www.googleapis.com/auth/youtube.upload \
    openid";
