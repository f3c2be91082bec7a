//! Verbena Store
//!
//! This crate provides the storage trait and SQLite implementation for
//! verbena's durable state: the case-id counter, case records created by the
//! intake workflow, customer-service claim records, the per-review audit
//! trail, and suspended workflow runs awaiting an external resume.
//!
//! The [`Store`] trait defines operations for:
//! - Issuing unique, strictly increasing case ids
//! - Creating and reading case and claim records
//! - Appending and range-scanning audit records per review
//! - Persisting and atomically consuming suspended runs

mod sqlite;
mod types;

pub use sqlite::SqliteStore;
pub use types::{AuditRecord, CaseRecord, ClaimRecord, SuspendedRun};

// Re-exported so callers can build records without depending on sqlx.
pub use sqlx::types::Json;

use async_trait::async_trait;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested record was not found.
  #[error("not found: {0}")]
  NotFound(String),

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),
}

/// Storage trait for verbena's durable state.
#[async_trait]
pub trait Store: Send + Sync {
  /// Issue the next case id.
  ///
  /// Ids are strictly increasing and unique across concurrent callers: the
  /// increment and the read of the new value are a single atomic update, so
  /// an issued value is durable and never reissued.
  async fn next_case_id(&self) -> Result<i64, Error>;

  /// Store a case record.
  async fn put_case(&self, case: &CaseRecord) -> Result<(), Error>;

  /// Get a case record by id.
  async fn get_case(&self, case_id: i64) -> Result<CaseRecord, Error>;

  /// Store a claim record. At most one claim exists per review id; a second
  /// write replaces the first (last write wins).
  async fn put_claim(&self, claim: &ClaimRecord) -> Result<(), Error>;

  /// Get the claim record for a review.
  async fn get_claim(&self, review_id: &str) -> Result<ClaimRecord, Error>;

  /// Append an audit record. Re-appending the same (review, sort key) pair
  /// is a no-op overwrite, so duplicate event delivery is tolerated.
  async fn append_audit(&self, record: &AuditRecord) -> Result<(), Error>;

  /// List a review's audit records ordered by sort key (i.e. by time).
  async fn list_audit(&self, review_id: &str) -> Result<Vec<AuditRecord>, Error>;

  /// Persist a suspended run under its correlation token.
  async fn persist_suspension(&self, run: &SuspendedRun) -> Result<(), Error>;

  /// Atomically consume a pending suspension.
  ///
  /// Returns the persisted run the first time the token is consumed and
  /// `None` for an unknown or already-consumed token, making resumption
  /// idempotent per token.
  async fn consume_suspension(&self, token: &str) -> Result<Option<SuspendedRun>, Error>;
}
