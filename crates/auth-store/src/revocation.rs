//! Credential denylist
//!
//! Bearer credentials are stateless, so logout cannot destroy them — it
//! records them here instead, and the access guard refuses any credential
//! with a live entry. Entries carry a TTL equal to the credential lifetime:
//! once the token would have expired on its own there is nothing left to
//! deny, so the storage layer purges the entry without any application-side
//! sweep.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, StoreError};
use crate::kv::Kv;

/// Seconds a revocation entry is retained — the credential's own lifetime.
pub const REVOCATION_RETENTION_SECS: u64 = 3600;

fn revoked_key(token: &str) -> String {
    format!("revoked:{token}")
}

/// What a denylist entry records about the revocation.
#[derive(Debug, Serialize, Deserialize)]
struct RevokedCredential {
    /// Owning user's Google id — a lookup key, nothing hangs off it
    user_id: String,
    created_at: DateTime<Utc>,
}

/// Denylist of explicitly invalidated credentials.
#[derive(Clone)]
pub struct RevocationStore {
    kv: Kv,
    retention: Duration,
}

impl RevocationStore {
    pub fn new(kv: Kv) -> Self {
        Self::with_retention(kv, Duration::from_secs(REVOCATION_RETENTION_SECS))
    }

    /// Custom retention window (tests, tuning).
    pub fn with_retention(kv: Kv, retention: Duration) -> Self {
        Self { kv, retention }
    }

    /// Insert a credential into the denylist.
    ///
    /// A credential appears at most once; a second insert fails with
    /// `Duplicate`. Callers that want idempotent logout treat that as
    /// already-revoked.
    pub async fn revoke(&self, token: &str, user_id: &str) -> Result<()> {
        let entry = serde_json::to_string(&RevokedCredential {
            user_id: user_id.to_owned(),
            created_at: Utc::now(),
        })
        .map_err(|e| StoreError::Corrupt(format!("serializing revocation: {e}")))?;

        let inserted = self
            .kv
            .set_nx_ex(&revoked_key(token), &entry, Some(self.retention))
            .await?;
        if !inserted {
            return Err(StoreError::Duplicate("credential already revoked".into()));
        }

        info!(user_id, "credential revoked");
        Ok(())
    }

    /// Membership test for the guard's revocation check.
    pub async fn is_revoked(&self, token: &str) -> Result<bool> {
        self.kv.exists(&revoked_key(token)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn membership_flips_on_insert() {
        let store = RevocationStore::new(Kv::memory());
        assert!(!store.is_revoked("ya29.token").await.unwrap());

        store.revoke("ya29.token", "g-1").await.unwrap();
        assert!(store.is_revoked("ya29.token").await.unwrap());
    }

    #[tokio::test]
    async fn other_credentials_stay_unrevoked() {
        let store = RevocationStore::new(Kv::memory());
        store.revoke("ya29.mine", "g-1").await.unwrap();
        assert!(!store.is_revoked("ya29.other").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_insert_fails() {
        let store = RevocationStore::new(Kv::memory());
        store.revoke("ya29.token", "g-1").await.unwrap();

        let err = store.revoke("ya29.token", "g-1").await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn entries_expire_after_retention_window() {
        let store =
            RevocationStore::with_retention(Kv::memory(), Duration::from_millis(40));
        store.revoke("ya29.token", "g-1").await.unwrap();
        assert!(store.is_revoked("ya29.token").await.unwrap());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(
            !store.is_revoked("ya29.token").await.unwrap(),
            "entry must be gone once the retention window elapses"
        );
    }

    #[tokio::test]
    async fn default_retention_matches_credential_lifetime() {
        // The denylist only needs to outlive the credential itself
        assert_eq!(REVOCATION_RETENTION_SECS, 3600);
    }
}
