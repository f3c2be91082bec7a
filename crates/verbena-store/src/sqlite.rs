use std::path::Path;

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::{AuditRecord, CaseRecord, ClaimRecord, Error, Store, SuspendedRun};

const CASE_ID_COUNTER: &str = "case-id";

/// SQLite-based store implementation.
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Open (creating if necessary) a file-backed store.
  pub async fn open(path: &Path) -> Result<Self, Error> {
    let options = SqliteConnectOptions::new()
      .filename(path)
      .create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    Ok(Self::new(pool))
  }

  /// Open an in-memory store.
  ///
  /// The pool is pinned to a single connection: every new in-memory SQLite
  /// connection is a fresh empty database.
  pub async fn in_memory() -> Result<Self, Error> {
    let options = SqliteConnectOptions::new().in_memory(true);
    let pool = SqlitePoolOptions::new()
      .max_connections(1)
      .connect_with(options)
      .await?;
    Ok(Self::new(pool))
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(&self.pool).await
  }
}

#[async_trait]
impl Store for SqliteStore {
  async fn next_case_id(&self) -> Result<i64, Error> {
    // Increment-and-read is one statement, so concurrent callers can never
    // observe the same value and a returned value is already committed.
    sqlx::query_scalar(
      r#"
            UPDATE counters SET value = value + 1
            WHERE name = ?
            RETURNING value
            "#,
    )
    .bind(CASE_ID_COUNTER)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("counter '{}'", CASE_ID_COUNTER)))
  }

  async fn put_case(&self, case: &CaseRecord) -> Result<(), Error> {
    sqlx::query(
      r#"
            INSERT OR REPLACE INTO cases (case_id, review_identifier, email_address, contents, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
    )
    .bind(case.case_id)
    .bind(&case.review_identifier)
    .bind(&case.email_address)
    .bind(&case.contents)
    .bind(case.created_at)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn get_case(&self, case_id: i64) -> Result<CaseRecord, Error> {
    sqlx::query_as(
      r#"
            SELECT case_id, review_identifier, email_address, contents, created_at
            FROM cases
            WHERE case_id = ?
            "#,
    )
    .bind(case_id)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("case {}", case_id)))
  }

  async fn put_claim(&self, claim: &ClaimRecord) -> Result<(), Error> {
    sqlx::query(
      r#"
            INSERT OR REPLACE INTO claims (review_id, claimed_by, token, email_address, review_contents, claimed_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
    )
    .bind(&claim.review_id)
    .bind(&claim.claimed_by)
    .bind(&claim.token)
    .bind(&claim.email_address)
    .bind(&claim.review_contents)
    .bind(claim.claimed_at)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn get_claim(&self, review_id: &str) -> Result<ClaimRecord, Error> {
    sqlx::query_as(
      r#"
            SELECT review_id, claimed_by, token, email_address, review_contents, claimed_at
            FROM claims
            WHERE review_id = ?
            "#,
    )
    .bind(review_id)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("claim for review {}", review_id)))
  }

  async fn append_audit(&self, record: &AuditRecord) -> Result<(), Error> {
    sqlx::query(
      r#"
            INSERT OR REPLACE INTO audit_events (review_id, sort_key, detail, recorded_at)
            VALUES (?, ?, ?, ?)
            "#,
    )
    .bind(&record.review_id)
    .bind(&record.sort_key)
    .bind(&record.detail)
    .bind(record.recorded_at)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn list_audit(&self, review_id: &str) -> Result<Vec<AuditRecord>, Error> {
    sqlx::query_as(
      r#"
            SELECT review_id, sort_key, detail, recorded_at
            FROM audit_events
            WHERE review_id = ?
            ORDER BY sort_key ASC
            "#,
    )
    .bind(review_id)
    .fetch_all(&self.pool)
    .await
    .map_err(Into::into)
  }

  async fn persist_suspension(&self, run: &SuspendedRun) -> Result<(), Error> {
    sqlx::query(
      r#"
            INSERT INTO suspensions (token, workflow_id, resume_step, resume_key, context, status, created_at)
            VALUES (?, ?, ?, ?, ?, 'pending', ?)
            "#,
    )
    .bind(&run.token)
    .bind(&run.workflow_id)
    .bind(&run.resume_step)
    .bind(&run.resume_key)
    .bind(&run.context)
    .bind(run.created_at)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn consume_suspension(&self, token: &str) -> Result<Option<SuspendedRun>, Error> {
    // Conditional flip from pending to consumed in one statement: exactly
    // one caller can ever receive the run back for a given token.
    sqlx::query_as(
      r#"
            UPDATE suspensions SET status = 'consumed'
            WHERE token = ? AND status = 'pending'
            RETURNING token, workflow_id, resume_step, resume_key, context, created_at
            "#,
    )
    .bind(token)
    .fetch_optional(&self.pool)
    .await
    .map_err(Into::into)
  }
}
