//! The intake request/response boundary.
//!
//! HTTP framing is external; this is the transport-free contract behind it.
//! `submit` validates the body, runs the intake workflow synchronously, and
//! returns the formatted response. Errors carry the status the transport
//! should answer with: 400 for a rejected body, 500 for anything else.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use verbena_runtime::{ExecutionError, RunOutcome, WorkflowRunner};

/// `POST /` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeRequest {
  pub email_address: String,
  pub review_contents: String,
}

/// `200` response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeResponse {
  pub review_id: i64,
  pub review_identifier: String,
  pub email_address: String,
  pub review_contents: String,
  #[serde(rename = "type")]
  pub event_type: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
  /// The request body was rejected before the workflow started.
  #[error("invalid request: {message}")]
  Invalid { message: String },

  /// The intake run failed.
  #[error("intake workflow failed")]
  Workflow(#[from] ExecutionError),

  /// The run finished but its output is not a valid response.
  #[error("intake produced an unusable response")]
  Response(#[from] serde_json::Error),

  /// Intake has no suspend step; a suspension here is a definition bug.
  #[error("intake run suspended unexpectedly")]
  UnexpectedSuspension,
}

impl ApiError {
  /// HTTP status the transport should answer with.
  pub fn status_code(&self) -> u16 {
    match self {
      Self::Invalid { .. } => 400,
      _ => 500,
    }
  }
}

/// Synchronous entry point for review submission.
pub struct IntakeApi {
  runner: Arc<WorkflowRunner>,
}

impl IntakeApi {
  pub(crate) fn new(runner: Arc<WorkflowRunner>) -> Self {
    Self { runner }
  }

  /// Validate and submit a review; every workflow step has committed by the
  /// time the response is returned.
  pub async fn submit(
    &self,
    body: Value,
    cancel: CancellationToken,
  ) -> Result<IntakeResponse, ApiError> {
    let request: IntakeRequest = serde_json::from_value(body).map_err(|e| ApiError::Invalid {
      message: e.to_string(),
    })?;
    if request.email_address.trim().is_empty() {
      return Err(ApiError::Invalid {
        message: "emailAddress must not be empty".to_string(),
      });
    }
    if request.review_contents.trim().is_empty() {
      return Err(ApiError::Invalid {
        message: "reviewContents must not be empty".to_string(),
      });
    }

    let seed = serde_json::to_value(&request)?;
    match self.runner.run(seed, cancel).await? {
      RunOutcome::Succeeded { output } => Ok(serde_json::from_value(output)?),
      RunOutcome::Suspended { .. } => Err(ApiError::UnexpectedSuspension),
    }
  }
}
