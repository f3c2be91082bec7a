use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

/// A review case created by the intake workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CaseRecord {
  pub case_id: i64,
  pub review_identifier: String,
  pub email_address: String,
  pub contents: String,
  pub created_at: DateTime<Utc>,
}

/// A customer-service claim on a review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ClaimRecord {
  pub review_id: String,
  pub claimed_by: String,
  /// The correlation token the claim resumed.
  pub token: String,
  pub email_address: String,
  pub review_contents: String,
  pub claimed_at: DateTime<Utc>,
}

/// One audited event, keyed for range scans per review ordered by time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AuditRecord {
  pub review_id: String,
  /// `"<time>#<eventType>"`.
  pub sort_key: String,
  pub detail: Json<serde_json::Value>,
  pub recorded_at: DateTime<Utc>,
}

/// A workflow run parked on an external correlation token.
///
/// Everything a resume needs is here; no in-memory state survives the
/// suspension boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SuspendedRun {
  pub token: String,
  pub workflow_id: String,
  /// Step to continue at; `None` means the suspend step was terminal.
  pub resume_step: Option<String>,
  /// Context key the resume payload is merged under.
  pub resume_key: String,
  pub context: Json<serde_json::Value>,
  pub created_at: DateTime<Utc>,
}
