//! Sentiment analysis of newly submitted reviews.
//!
//! Detects the review's language, translates non-English text to English
//! before classification (preserving the original text), classifies, and
//! publishes `positiveReview`/`negativeReview` only past the 0.95 confidence
//! threshold. A tie at exactly 0.95 publishes nothing: the comparison is
//! strictly greater-than.

use futures::FutureExt;
use serde_json::{Value, json};

use verbena_capability::{ClassifyRequest, TranslateRequest};
use verbena_event::EventEnvelope;
use verbena_workflow::{Branch, ExecutionContext, Step, StepError, Workflow};

use crate::Services;
use crate::events::{event_type, source};
use crate::support::capability_error;

pub const WORKFLOW_ID: &str = "sentiment-analysis";

/// Confidence a class must exceed before its event is published.
const PUBLISH_THRESHOLD: f64 = 0.95;

/// The working record for the review under analysis.
///
/// Exactly one of the two branches has run, so the first resolving key is
/// the record to use: `merge-translation` when the text was translated,
/// `format-language` otherwise.
fn working_record(ctx: &ExecutionContext) -> Result<Value, StepError> {
  ctx
    .first(&["merge-translation", "format-language"])
    .cloned()
    .ok_or_else(|| StepError::MissingValue {
      path: "format-language".to_string(),
    })
}

fn review_event(ctx: &ExecutionContext, name: &str) -> Result<EventEnvelope, StepError> {
  let Value::Object(mut detail) = working_record(ctx)? else {
    return Err(StepError::InvalidValue {
      path: "format-language".to_string(),
      message: "working record is not an object".to_string(),
    });
  };
  detail.insert("type".to_string(), json!(name));
  Ok(EventEnvelope::new(
    source::SENTIMENT,
    name,
    Value::Object(detail),
  ))
}

pub fn build(services: &Services) -> Workflow {
  let detector = services.analyzer.clone();
  let classifier = services.analyzer.clone();
  let translator = services.translator.clone();

  Workflow::new(WORKFLOW_ID, "Sentiment analysis", "detect-language")
    .with_step(Step::service_call(
      "detect-language",
      Some("format-language"),
      move |ctx| {
        let detector = detector.clone();
        let text = ctx.str_at("trigger.detail.reviewContents");
        async move {
          let languages = detector
            .detect_dominant_language(&text?)
            .await
            .map_err(capability_error)?;
          Ok(json!({ "languages": languages }))
        }
        .boxed()
      },
    ))
    .with_step(Step::pass("format-language", Some("language-branch"), |ctx| {
      Ok(json!({
        "dominantLanguage": ctx.str_at("detect-language.languages.0.languageCode")?,
        "reviewIdentifier": ctx.str_at("trigger.detail.reviewIdentifier")?,
        "reviewId": ctx.value_at("trigger.detail.reviewId")?,
        "emailAddress": ctx.str_at("trigger.detail.emailAddress")?,
        "reviewContents": ctx.str_at("trigger.detail.reviewContents")?,
        "originalReviewContents": ctx.str_at("trigger.detail.reviewContents")?,
      }))
    }))
    .with_step(Step::choice(
      "language-branch",
      vec![Branch::new(
        "non-english",
        |ctx| Ok(ctx.str_at("format-language.dominantLanguage")? != "en"),
        "translate",
      )],
      Some("classify-sentiment"),
    ))
    .with_step(Step::service_call(
      "translate",
      Some("merge-translation"),
      move |ctx| {
        let translator = translator.clone();
        let request = (|| -> Result<TranslateRequest, StepError> {
          Ok(TranslateRequest {
            text: ctx.str_at("format-language.reviewContents")?,
            source_language: ctx.str_at("format-language.dominantLanguage")?,
            target_language: "en".to_string(),
          })
        })();
        async move {
          let translation = translator
            .translate(request?)
            .await
            .map_err(capability_error)?;
          Ok(json!({ "translatedText": translation.translated_text }))
        }
        .boxed()
      },
    ))
    .with_step(Step::pass(
      "merge-translation",
      Some("classify-sentiment"),
      |ctx| {
        // The translated text becomes the working review contents; the
        // submitted text is carried unchanged alongside it.
        Ok(json!({
          "dominantLanguage": ctx.str_at("format-language.dominantLanguage")?,
          "reviewIdentifier": ctx.str_at("format-language.reviewIdentifier")?,
          "reviewId": ctx.value_at("format-language.reviewId")?,
          "emailAddress": ctx.str_at("format-language.emailAddress")?,
          "reviewContents": ctx.str_at("translate.translatedText")?,
          "originalReviewContents": ctx.str_at("format-language.originalReviewContents")?,
        }))
      },
    ))
    .with_step(Step::service_call(
      "classify-sentiment",
      Some("sentiment-branch"),
      move |ctx| {
        let classifier = classifier.clone();
        let text = working_record(ctx).and_then(|record| match &record["reviewContents"] {
          Value::String(s) => Ok(s.clone()),
          other => Err(StepError::InvalidValue {
            path: "reviewContents".to_string(),
            message: format!("expected string, found {}", other),
          }),
        });
        async move {
          let scores = classifier
            .classify_sentiment(ClassifyRequest {
              text: text?,
              language_hint: Some("en".to_string()),
            })
            .await
            .map_err(capability_error)?;
          Ok(json!({ "scores": scores }))
        }
        .boxed()
      },
    ))
    .with_step(Step::choice(
      "sentiment-branch",
      vec![
        Branch::new(
          "positive",
          |ctx| Ok(ctx.f64_at("classify-sentiment.scores.positive")? > PUBLISH_THRESHOLD),
          "publish-positive",
        ),
        Branch::new(
          "negative",
          |ctx| Ok(ctx.f64_at("classify-sentiment.scores.negative")? > PUBLISH_THRESHOLD),
          "publish-negative",
        ),
      ],
      Some("skip-publication"),
    ))
    .with_step(Step::publish_event("publish-positive", None, |ctx| {
      review_event(ctx, event_type::POSITIVE_REVIEW)
    }))
    .with_step(Step::publish_event("publish-negative", None, |ctx| {
      review_event(ctx, event_type::NEGATIVE_REVIEW)
    }))
    .with_step(Step::noop("skip-publication"))
}
