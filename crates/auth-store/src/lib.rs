//! Persistent stores for the upload gateway
//!
//! Three stores share one small async key/value seam ([`Kv`]):
//!
//! - [`UserStore`] — user records keyed by Google id, with a unique-email
//!   index. Uniqueness is enforced by the storage layer's NX insert, which is
//!   the only concurrency-correctness mechanism the gateway relies on.
//! - [`RevocationStore`] — denylisted credentials. Every entry is inserted
//!   with a TTL equal to the credential lifetime, so the storage layer (not
//!   application code) purges it when the credential would have expired
//!   anyway.
//! - [`SessionStore`] — opaque session id → user reference, TTL-bounded.
//!
//! The Redis backend is the production path; the memory backend mirrors its
//! semantics (NX inserts, lazy expiry) for tests and local development.

mod error;
mod kv;
mod revocation;
mod session;
mod user;

pub use error::{Result, StoreError};
pub use kv::Kv;
pub use revocation::{REVOCATION_RETENTION_SECS, RevocationStore};
pub use session::{SESSION_TTL_SECS, SessionStore};
pub use user::{CredentialBundle, UserRecord, UserStore};
