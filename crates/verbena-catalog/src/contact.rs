//! Customer contact for negative reviews.
//!
//! Operators are told about the bad review, then the run parks on a
//! correlation token until a customer-service agent claims the case. The
//! resume message records who claimed it, the claim is stored, and the
//! claim is announced for the notification workflow to pick up.

use chrono::Utc;
use futures::FutureExt;
use serde_json::json;

use verbena_capability::{ClaimPayload, ClaimRequest};
use verbena_event::EventEnvelope;
use verbena_store::ClaimRecord;
use verbena_workflow::{Step, StepError, Workflow};

use crate::Services;
use crate::events::{event_type, source};
use crate::support::{capability_error, review_id_string, store_error};

pub const WORKFLOW_ID: &str = "customer-contact";

/// Context key the `{token, claimedBy}` resume message is merged under.
pub const CLAIM_KEY: &str = "claim";

const OPERATOR_NOTICE: &str = "There has been a new negative review";

pub fn build(services: &Services) -> Workflow {
  let notifier = services.notifier.clone();
  let claim_queue = services.claim_queue.clone();
  let claim_store = services.store.clone();

  Workflow::new(WORKFLOW_ID, "Customer contact", "notify-operators")
    .with_step(Step::service_call(
      "notify-operators",
      Some("await-claim"),
      move |_ctx| {
        let notifier = notifier.clone();
        async move {
          notifier.notify(OPERATOR_NOTICE).await.map_err(capability_error)?;
          Ok(json!({ "notified": true }))
        }
        .boxed()
      },
    ))
    .with_step(Step::suspend_for_token(
      "await-claim",
      Some("store-claim"),
      CLAIM_KEY,
      move |token, ctx| {
        let claim_queue = claim_queue.clone();
        let token = token.to_string();
        let payload = (|| -> Result<ClaimPayload, StepError> {
          Ok(ClaimPayload {
            email_address: ctx.str_at("trigger.detail.emailAddress")?,
            review_content: ctx.str_at("trigger.detail.reviewContents")?,
            original_review_contents: ctx.str_at("trigger.detail.originalReviewContents")?,
            review_id: ctx.i64_at("trigger.detail.reviewId")?,
          })
        })();
        async move {
          claim_queue
            .enqueue(ClaimRequest {
              token,
              payload: payload?,
            })
            .await
            .map_err(capability_error)
        }
        .boxed()
      },
    ))
    .with_step(Step::service_call(
      "store-claim",
      Some("publish-claimed"),
      move |ctx| {
        let store = claim_store.clone();
        let claim = (|| -> Result<ClaimRecord, StepError> {
          Ok(ClaimRecord {
            review_id: review_id_string(
              "trigger.detail.reviewId",
              &ctx.value_at("trigger.detail.reviewId")?,
            )?,
            claimed_by: ctx.str_at("claim.claimedBy")?,
            token: ctx.str_at("claim.token")?,
            email_address: ctx.str_at("trigger.detail.emailAddress")?,
            review_contents: ctx.str_at("trigger.detail.reviewContents")?,
            claimed_at: Utc::now(),
          })
        })();
        async move {
          let claim = claim?;
          store.put_claim(&claim).await.map_err(store_error)?;
          serde_json::to_value(&claim).map_err(|e| StepError::Service {
            message: e.to_string(),
          })
        }
        .boxed()
      },
    ))
    .with_step(Step::publish_event("publish-claimed", None, |ctx| {
      Ok(EventEnvelope::new(
        source::CUSTOMER_SERVICE,
        event_type::CASE_CLAIMED,
        json!({
          "reviewId": ctx.value_at("trigger.detail.reviewId")?,
          "claimedBy": ctx.str_at("claim.claimedBy")?,
          "emailAddress": ctx.str_at("trigger.detail.emailAddress")?,
          "type": event_type::CASE_CLAIMED,
        }),
      ))
    }))
}
