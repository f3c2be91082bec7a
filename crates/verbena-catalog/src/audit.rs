//! Event audit: fan-in sink for every event from every source.
//!
//! Appends `(partition=reviewId, sort="<time>#<type>") → detail`, which
//! makes the store's per-review range scan an ordered history of everything
//! that happened to a review.

use chrono::Utc;
use futures::FutureExt;
use serde_json::json;

use verbena_store::{AuditRecord, Json};
use verbena_workflow::{Step, StepError, Workflow};

use crate::Services;
use crate::support::{review_id_string, store_error};

pub const WORKFLOW_ID: &str = "event-audit";

pub fn build(services: &Services) -> Workflow {
  let store = services.store.clone();

  Workflow::new(WORKFLOW_ID, "Event audit", "record-event").with_step(Step::service_call(
    "record-event",
    None,
    move |ctx| {
      let store = store.clone();
      let record = (|| -> Result<AuditRecord, StepError> {
        let time = ctx.str_at("trigger.time")?;
        let event_type = ctx.str_at("trigger.detail-type")?;
        Ok(AuditRecord {
          review_id: review_id_string(
            "trigger.detail.reviewId",
            &ctx.value_at("trigger.detail.reviewId")?,
          )?,
          sort_key: format!("{}#{}", time, event_type),
          detail: Json(ctx.value_at("trigger.detail")?),
          recorded_at: Utc::now(),
        })
      })();
      async move {
        let record = record?;
        store.append_audit(&record).await.map_err(store_error)?;
        Ok(json!({ "sortKey": record.sort_key }))
      }
      .boxed()
    },
  ))
}
