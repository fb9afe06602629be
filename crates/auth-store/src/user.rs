//! User records
//!
//! One JSON document per user, keyed by the provider-assigned Google id,
//! plus a secondary index enforcing email uniqueness. Records are created on
//! first login, have their credential bundle and last-login overwritten on
//! every later login, and are never deleted by the gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::kv::Kv;

fn user_key(google_id: &str) -> String {
    format!("user:{google_id}")
}

fn email_index_key(email: &str) -> String {
    format!("user:email:{email}")
}

/// The delegated credentials granted at the most recent login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialBundle {
    pub access_token: String,
    pub refresh_token: String,
    /// Space-separated scopes the provider reported as granted
    pub scope: Option<String>,
    /// Always "Bearer" for this provider
    pub token_type: String,
    /// Absolute expiry instant. A fixed one-hour estimate from grant time,
    /// not the provider's stated lifetime — the provider may omit one on
    /// repeat consent.
    pub expiry: DateTime<Utc>,
}

/// A persisted user.
///
/// `google_id` and `email` are each unique across all records. The top-level
/// token fields mirror the bundle's current values — they are what the
/// delegated upload action reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub google_id: String,
    pub email: String,
    pub name: String,
    pub access_token: String,
    pub refresh_token: String,
    pub tokens: CredentialBundle,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

impl UserRecord {
    /// Build a record for a first-time login.
    pub fn new(google_id: String, email: String, name: String, bundle: CredentialBundle) -> Self {
        let now = Utc::now();
        Self {
            google_id,
            email,
            name,
            access_token: bundle.access_token.clone(),
            refresh_token: bundle.refresh_token.clone(),
            tokens: bundle,
            created_at: now,
            last_login: now,
        }
    }
}

/// Store of user records over the key/value seam.
#[derive(Clone)]
pub struct UserStore {
    kv: Kv,
}

impl UserStore {
    pub fn new(kv: Kv) -> Self {
        Self { kv }
    }

    pub async fn find_by_google_id(&self, google_id: &str) -> Result<Option<UserRecord>> {
        match self.kv.get(&user_key(google_id)).await? {
            Some(json) => {
                let record = serde_json::from_str(&json)
                    .map_err(|e| StoreError::Corrupt(format!("user {google_id}: {e}")))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Persist a first-time login.
    ///
    /// Both unique constraints are NX inserts; a racing duplicate create for
    /// the same identity loses here and is retried as an update by the
    /// caller. An email claimed by a different identity rolls the record
    /// back and fails.
    pub async fn insert_new(&self, record: &UserRecord) -> Result<()> {
        let json = serde_json::to_string(record)
            .map_err(|e| StoreError::Corrupt(format!("serializing user: {e}")))?;

        let created = self
            .kv
            .set_nx_ex(&user_key(&record.google_id), &json, None)
            .await?;
        if !created {
            return Err(StoreError::Duplicate(format!(
                "user {} already exists",
                record.google_id
            )));
        }

        let email_claimed = self
            .kv
            .set_nx_ex(&email_index_key(&record.email), &record.google_id, None)
            .await?;
        if !email_claimed {
            // The email belongs to another identity — undo the record insert
            self.kv.del(&user_key(&record.google_id)).await?;
            return Err(StoreError::Duplicate(format!(
                "email {} already registered",
                record.email
            )));
        }

        debug!(google_id = %record.google_id, "created user record");
        Ok(())
    }

    /// Overwrite the credential bundle and last-login of an existing record.
    ///
    /// Identity, email, and creation instant are left untouched. Returns the
    /// updated record.
    pub async fn update_credentials(
        &self,
        google_id: &str,
        bundle: CredentialBundle,
    ) -> Result<UserRecord> {
        let mut record = self
            .find_by_google_id(google_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("user {google_id}")))?;

        record.access_token = bundle.access_token.clone();
        record.refresh_token = bundle.refresh_token.clone();
        record.tokens = bundle;
        record.last_login = Utc::now();

        let json = serde_json::to_string(&record)
            .map_err(|e| StoreError::Corrupt(format!("serializing user: {e}")))?;
        self.kv.set(&user_key(google_id), &json).await?;

        debug!(google_id, "updated user credentials");
        Ok(record)
    }
}
