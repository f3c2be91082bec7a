//! Customer notification emails.
//!
//! One choice keyed on the triggering event type; each branch sends that
//! type's template and announces the send. No fallback: a type this workflow
//! is subscribed to but cannot handle is a definition gap and must fail
//! loudly.

use futures::FutureExt;
use serde_json::json;

use verbena_capability::EmailMessage;
use verbena_event::EventEnvelope;
use verbena_workflow::{Branch, ExecutionContext, Step, StepError, Workflow};

use crate::Services;
use crate::events::{event_type, source};
use crate::support::capability_error;

pub const WORKFLOW_ID: &str = "review-notification";

struct Template {
  subject: &'static str,
  body: &'static str,
}

const CASE_CLAIMED_TEMPLATE: Template = Template {
  subject: "Your case is being worked on",
  body: "Your case is being worked on",
};

const POSITIVE_TEMPLATE: Template = Template {
  subject: "Thank you for your review",
  body: "Thank you for your positive review",
};

const NEGATIVE_TEMPLATE: Template = Template {
  subject: "Sorry",
  body: "I'm sorry our product didn't meet your satisfaction. One of our \
         customer service agents will be in touch shortly",
};

fn type_equals(ctx: &ExecutionContext, expected: &str) -> Result<bool, StepError> {
  Ok(ctx.str_at("trigger.detail.type")? == expected)
}

fn send_step(services: &Services, id: &str, next: &str, template: &Template) -> Step {
  let mailer = services.mailer.clone();
  let (subject, body) = (template.subject, template.body);

  Step::service_call(id, Some(next), move |ctx| {
    let mailer = mailer.clone();
    let to = ctx.str_at("trigger.detail.emailAddress");
    async move {
      let message = EmailMessage::new(to?, subject, body);
      mailer.send(message.clone()).await.map_err(capability_error)?;
      serde_json::to_value(&message).map_err(|e| StepError::Service {
        message: e.to_string(),
      })
    }
    .boxed()
  })
}

fn sent_event_step(id: &str, event_name: &'static str) -> Step {
  Step::publish_event(id, None, move |ctx| {
    Ok(EventEnvelope::new(
      source::NOTIFICATIONS,
      event_name,
      json!({
        "reviewId": ctx.value_at("trigger.detail.reviewId")?,
        "emailAddress": ctx.str_at("trigger.detail.emailAddress")?,
        "type": event_name,
      }),
    ))
  })
}

pub fn build(services: &Services) -> Workflow {
  Workflow::new(WORKFLOW_ID, "Review notification", "type-branch")
    .with_step(Step::choice(
      "type-branch",
      vec![
        Branch::new(
          event_type::CASE_CLAIMED,
          |ctx| type_equals(ctx, event_type::CASE_CLAIMED),
          "send-claimed-email",
        ),
        Branch::new(
          event_type::POSITIVE_REVIEW,
          |ctx| type_equals(ctx, event_type::POSITIVE_REVIEW),
          "send-positive-email",
        ),
        Branch::new(
          event_type::NEGATIVE_REVIEW,
          |ctx| type_equals(ctx, event_type::NEGATIVE_REVIEW),
          "send-negative-email",
        ),
      ],
      None,
    ))
    .with_step(send_step(
      services,
      "send-claimed-email",
      "publish-claimed-email-sent",
      &CASE_CLAIMED_TEMPLATE,
    ))
    .with_step(sent_event_step(
      "publish-claimed-email-sent",
      event_type::CASE_CLAIMED_EMAIL_SENT,
    ))
    .with_step(send_step(
      services,
      "send-positive-email",
      "publish-positive-email-sent",
      &POSITIVE_TEMPLATE,
    ))
    .with_step(sent_event_step(
      "publish-positive-email-sent",
      event_type::POSITIVE_EMAIL_SENT,
    ))
    .with_step(send_step(
      services,
      "send-negative-email",
      "publish-negative-email-sent",
      &NEGATIVE_TEMPLATE,
    ))
    .with_step(sent_event_step(
      "publish-negative-email-sent",
      event_type::NEGATIVE_EMAIL_SENT,
    ))
}
