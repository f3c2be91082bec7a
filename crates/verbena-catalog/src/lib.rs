//! Verbena Catalog
//!
//! The concrete orchestrations: review intake, sentiment analysis, customer
//! notification, customer contact, and the event audit sink, plus the rules
//! that bind them to the event bus. Workflows chain through published events
//! only (intake publishes `newReview`, sentiment analysis publishes
//! `positiveReview`/`negativeReview`, and so on), never through direct
//! calls.
//!
//! [`Catalog::new`] wires everything against a [`Services`] bundle (store,
//! capabilities, bus handle) and returns the router for the caller to drive
//! with `verbena_event::run_dispatcher`, the synchronous [`IntakeApi`], and
//! the claim-resume entry point.

mod api;
mod audit;
mod contact;
mod events;
mod intake;
mod notification;
mod sentiment;
mod support;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use verbena_capability::{ClaimQueue, LanguageAnalyzer, Mailer, OperatorNotifier, Translator};
use verbena_event::{EventBus, EventRouter, Rule, TypePattern};
use verbena_runtime::{ExecutionError, ResumeOutcome, RunnerConfig, WorkflowRunner};
use verbena_store::Store;
use verbena_workflow::Workflow;

pub use api::{ApiError, IntakeApi, IntakeRequest, IntakeResponse};
pub use events::{event_type, source};

/// Everything the catalog's workflows depend on, injected explicitly.
#[derive(Clone)]
pub struct Services {
  pub store: Arc<dyn Store>,
  pub analyzer: Arc<dyn LanguageAnalyzer>,
  pub translator: Arc<dyn Translator>,
  pub mailer: Arc<dyn Mailer>,
  pub notifier: Arc<dyn OperatorNotifier>,
  pub claim_queue: Arc<dyn ClaimQueue>,
  pub bus: EventBus,
}

/// Message from the external claim worker resuming a parked contact run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResumeMessage {
  pub token: String,
  pub claimed_by: String,
}

#[derive(Debug, Error)]
pub enum CatalogError {
  #[error(transparent)]
  Execution(#[from] ExecutionError),

  #[error(transparent)]
  Router(#[from] verbena_event::RouterError),
}

/// The wired catalog: router, intake surface, and resume entry point.
pub struct Catalog {
  router: Arc<EventRouter>,
  intake: IntakeApi,
  contact: Arc<WorkflowRunner>,
}

impl Catalog {
  pub fn new(services: &Services, config: RunnerConfig) -> Result<Self, CatalogError> {
    let runner = |workflow: Workflow| -> Result<Arc<WorkflowRunner>, ExecutionError> {
      Ok(Arc::new(WorkflowRunner::new(
        workflow,
        services.bus.clone(),
        services.store.clone(),
        config.clone(),
      )?))
    };

    let intake = runner(intake::build(services))?;
    let sentiment = runner(sentiment::build(services))?;
    let notification = runner(notification::build(services))?;
    let contact = runner(contact::build(services))?;
    let audit = runner(audit::build(services))?;

    let mut router = EventRouter::new();
    router.register_target(sentiment::WORKFLOW_ID, sentiment);
    router.register_target(notification::WORKFLOW_ID, notification);
    router.register_target(contact::WORKFLOW_ID, contact.clone());
    router.register_target(audit::WORKFLOW_ID, audit);

    router.register_rule(Rule::new(
      "sentiment-on-new-review",
      [source::API],
      TypePattern::one_of([event_type::NEW_REVIEW]),
      sentiment::WORKFLOW_ID,
    ))?;
    router.register_rule(Rule::new(
      "notification-on-review-outcome",
      [source::SENTIMENT, source::CUSTOMER_SERVICE],
      TypePattern::one_of([
        event_type::POSITIVE_REVIEW,
        event_type::NEGATIVE_REVIEW,
        event_type::CASE_CLAIMED,
      ]),
      notification::WORKFLOW_ID,
    ))?;
    router.register_rule(Rule::new(
      "contact-on-negative-review",
      [source::SENTIMENT],
      TypePattern::one_of([event_type::NEGATIVE_REVIEW]),
      contact::WORKFLOW_ID,
    ))?;
    router.register_rule(Rule::new(
      "audit-all-events",
      source::ALL,
      TypePattern::Any,
      audit::WORKFLOW_ID,
    ))?;

    Ok(Self {
      router: Arc::new(router),
      intake: IntakeApi::new(intake),
      contact,
    })
  }

  /// The router, ready for `verbena_event::run_dispatcher`.
  pub fn router(&self) -> Arc<EventRouter> {
    self.router.clone()
  }

  /// The synchronous intake surface.
  pub fn intake(&self) -> &IntakeApi {
    &self.intake
  }

  /// Resume a contact run parked on a claim token. Duplicate messages for
  /// the same token are no-ops.
  pub async fn resume_claim(
    &self,
    message: ClaimResumeMessage,
    cancel: CancellationToken,
  ) -> Result<ResumeOutcome, ExecutionError> {
    let payload = json!({
      "token": message.token,
      "claimedBy": message.claimed_by,
    });
    self.contact.resume(&message.token, payload, cancel).await
  }
}
