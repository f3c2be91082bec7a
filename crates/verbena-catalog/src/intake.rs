//! Review intake: storage-first request handling.
//!
//! The one synchronous workflow. A case id is issued and the record stored
//! before anything is published, and every step commits before the caller
//! sees a response.

use chrono::Utc;
use futures::FutureExt;
use serde_json::{Value, json};

use verbena_event::EventEnvelope;
use verbena_store::CaseRecord;
use verbena_workflow::{ExecutionContext, Step, StepError, Workflow};

use crate::Services;
use crate::events::{event_type, source};
use crate::support::store_error;

pub const WORKFLOW_ID: &str = "review-intake";

/// `{reviewId, reviewIdentifier, emailAddress, reviewContents, type}`: the
/// published detail and the HTTP response are the same shape.
fn case_detail(ctx: &ExecutionContext) -> Result<Value, StepError> {
  Ok(json!({
    "reviewId": ctx.i64_at("next-case-id.caseId")?,
    "reviewIdentifier": ctx.str_at("next-case-id.reviewIdentifier")?,
    "emailAddress": ctx.str_at("trigger.emailAddress")?,
    "reviewContents": ctx.str_at("trigger.reviewContents")?,
    "type": event_type::NEW_REVIEW,
  }))
}

pub fn build(services: &Services) -> Workflow {
  let id_store = services.store.clone();
  let case_store = services.store.clone();

  Workflow::new(WORKFLOW_ID, "Review intake", "next-case-id")
    .with_step(Step::service_call(
      "next-case-id",
      Some("store-record"),
      move |_ctx| {
        let store = id_store.clone();
        async move {
          let case_id = store.next_case_id().await.map_err(|e| StepError::Generation {
            message: e.to_string(),
          })?;
          Ok(json!({
            "caseId": case_id,
            "reviewIdentifier": uuid::Uuid::new_v4().to_string(),
          }))
        }
        .boxed()
      },
    ))
    .with_step(Step::service_call(
      "store-record",
      Some("publish-new-review"),
      move |ctx| {
        let store = case_store.clone();
        let case = (|| -> Result<CaseRecord, StepError> {
          Ok(CaseRecord {
            case_id: ctx.i64_at("next-case-id.caseId")?,
            review_identifier: ctx.str_at("next-case-id.reviewIdentifier")?,
            email_address: ctx.str_at("trigger.emailAddress")?,
            contents: ctx.str_at("trigger.reviewContents")?,
            created_at: Utc::now(),
          })
        })();
        async move {
          let case = case?;
          store.put_case(&case).await.map_err(store_error)?;
          serde_json::to_value(&case).map_err(|e| StepError::Service {
            message: e.to_string(),
          })
        }
        .boxed()
      },
    ))
    .with_step(Step::publish_event(
      "publish-new-review",
      Some("format-response"),
      |ctx| {
        Ok(EventEnvelope::new(
          source::API,
          event_type::NEW_REVIEW,
          case_detail(ctx)?,
        ))
      },
    ))
    .with_step(Step::pass("format-response", None, case_detail))
}
