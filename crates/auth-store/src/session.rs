//! Server-side sessions
//!
//! A session is an opaque random id the client carries in a signed cookie;
//! the server-side value is just the user's Google id. Resolution hands back
//! that reference — the caller re-fetches the user record, and a session
//! whose record has vanished is treated as no session at all.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use tracing::debug;

use crate::error::Result;
use crate::kv::Kv;

/// Seconds an untouched session survives before the storage layer drops it.
pub const SESSION_TTL_SECS: u64 = 86_400;

fn session_key(session_id: &str) -> String {
    format!("session:{session_id}")
}

/// 256-bit random session id, URL-safe base64 without padding.
fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Store of live sessions.
#[derive(Clone)]
pub struct SessionStore {
    kv: Kv,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(kv: Kv) -> Self {
        Self::with_ttl(kv, Duration::from_secs(SESSION_TTL_SECS))
    }

    /// Custom session lifetime (tests, tuning).
    pub fn with_ttl(kv: Kv, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    /// Create a session bound to the given user reference and return its id.
    pub async fn create(&self, user_ref: &str) -> Result<String> {
        let session_id = generate_session_id();
        self.kv
            .set_ex(&session_key(&session_id), user_ref, self.ttl)
            .await?;
        debug!(user_ref, "session created");
        Ok(session_id)
    }

    /// Resolve a session id to the user reference it was bound to.
    pub async fn resolve(&self, session_id: &str) -> Result<Option<String>> {
        self.kv.get(&session_key(session_id)).await
    }

    /// Tear down a session. Destroying an unknown id is a no-op.
    pub async fn destroy(&self, session_id: &str) -> Result<()> {
        self.kv.del(&session_key(session_id)).await?;
        debug!("session destroyed");
        Ok(())
    }
}
