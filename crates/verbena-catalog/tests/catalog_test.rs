//! End-to-end catalog behavior over a live bus, in-memory SQLite, and
//! scripted capabilities.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use verbena_capability::{ClaimRequest, EmailMessage, SentimentScores};
use verbena_catalog::{Catalog, ClaimResumeMessage, IntakeResponse, Services};
use verbena_event::{event_channel, run_dispatcher};
use verbena_runtime::{ResumeOutcome, RunnerConfig};
use verbena_store::{SqliteStore, Store};

use verbena_capability::memory::{
  ChannelClaimQueue, RecordingMailer, RecordingNotifier, ScriptedLanguageAnalyzer,
  ScriptedTranslator,
};

struct Harness {
  catalog: Catalog,
  store: Arc<SqliteStore>,
  mailer: Arc<RecordingMailer>,
  notifier: Arc<RecordingNotifier>,
  claim_requests: mpsc::UnboundedReceiver<ClaimRequest>,
  cancel: CancellationToken,
  _dispatcher: JoinHandle<()>,
}

async fn harness(analyzer: ScriptedLanguageAnalyzer, translator: ScriptedTranslator) -> Harness {
  let store = Arc::new(SqliteStore::in_memory().await.expect("open store"));
  store.migrate().await.expect("migrate");

  let mailer = Arc::new(RecordingMailer::new());
  let notifier = Arc::new(RecordingNotifier::new());
  let (claim_queue, claim_requests) = ChannelClaimQueue::new();
  let (bus, receiver) = event_channel();

  let services = Services {
    store: store.clone() as Arc<dyn Store>,
    analyzer: Arc::new(analyzer),
    translator: Arc::new(translator),
    mailer: mailer.clone() as Arc<dyn verbena_capability::Mailer>,
    notifier: notifier.clone() as Arc<dyn verbena_capability::OperatorNotifier>,
    claim_queue: Arc::new(claim_queue),
    bus,
  };

  let catalog = Catalog::new(&services, RunnerConfig::default()).expect("wire catalog");
  let cancel = CancellationToken::new();
  let dispatcher = tokio::spawn(run_dispatcher(catalog.router(), receiver, cancel.clone()));

  Harness {
    catalog,
    store,
    mailer,
    notifier,
    claim_requests,
    cancel,
    _dispatcher: dispatcher,
  }
}

fn negative_scores() -> SentimentScores {
  SentimentScores {
    positive: 0.01,
    negative: 0.96,
    neutral: 0.02,
    mixed: 0.01,
  }
}

fn positive_scores() -> SentimentScores {
  SentimentScores {
    positive: 0.96,
    negative: 0.02,
    neutral: 0.01,
    mixed: 0.01,
  }
}

async fn submit(harness: &Harness, email: &str, contents: &str) -> IntakeResponse {
  harness
    .catalog
    .intake()
    .submit(
      serde_json::json!({ "emailAddress": email, "reviewContents": contents }),
      CancellationToken::new(),
    )
    .await
    .expect("intake submit")
}

/// Poll the audit trail until an entry of the given type appears.
async fn wait_for_audit(harness: &Harness, review_id: &str, event_type: &str) -> Value {
  for _ in 0..500 {
    let trail = harness.store.list_audit(review_id).await.expect("list audit");
    if let Some(record) = trail.iter().find(|r| r.detail.0["type"] == event_type) {
      return record.detail.0.clone();
    }
    sleep(Duration::from_millis(5)).await;
  }
  panic!("no '{}' audit entry appeared for review {}", event_type, review_id);
}

async fn audit_count(harness: &Harness, review_id: &str, event_type: &str) -> usize {
  harness
    .store
    .list_audit(review_id)
    .await
    .expect("list audit")
    .iter()
    .filter(|r| r.detail.0["type"] == event_type)
    .count()
}

/// Poll the mailer until an email with the given subject shows up.
async fn wait_for_email(harness: &Harness, subject: &str) -> EmailMessage {
  for _ in 0..500 {
    if let Some(message) = harness.mailer.sent().into_iter().find(|m| m.subject == subject) {
      return message;
    }
    sleep(Duration::from_millis(5)).await;
  }
  panic!("no email with subject '{}' was sent", subject);
}

async fn next_claim(harness: &mut Harness) -> ClaimRequest {
  timeout(Duration::from_secs(5), harness.claim_requests.recv())
    .await
    .expect("claim request in time")
    .expect("claim queue open")
}

#[tokio::test]
async fn intake_assigns_sequential_ids_and_audits_the_event() {
  let harness = harness(ScriptedLanguageAnalyzer::new(), ScriptedTranslator::new()).await;

  let first = submit(&harness, "a@b.com", "fine I suppose").await;
  assert_eq!(first.review_id, 1);
  assert_eq!(first.event_type, "newReview");
  assert_eq!(first.email_address, "a@b.com");
  assert_eq!(first.review_contents, "fine I suppose");
  assert!(!first.review_identifier.is_empty());

  let second = submit(&harness, "c@d.com", "also fine").await;
  assert_eq!(second.review_id, 2);
  assert_ne!(second.review_identifier, first.review_identifier);

  // The case record committed before the response was produced.
  let case = harness.store.get_case(1).await.expect("stored case");
  assert_eq!(case.email_address, "a@b.com");
  assert_eq!(case.contents, "fine I suppose");
  assert_eq!(case.review_identifier, first.review_identifier);

  let detail = wait_for_audit(&harness, "1", "newReview").await;
  assert_eq!(detail["emailAddress"], "a@b.com");

  harness.cancel.cancel();
}

#[tokio::test]
async fn intake_rejects_malformed_bodies_without_consuming_ids() {
  let harness = harness(ScriptedLanguageAnalyzer::new(), ScriptedTranslator::new()).await;
  let intake = harness.catalog.intake();

  let missing_field = intake
    .submit(serde_json::json!({ "emailAddress": "a@b.com" }), CancellationToken::new())
    .await
    .unwrap_err();
  assert_eq!(missing_field.status_code(), 400);

  let empty_email = intake
    .submit(
      serde_json::json!({ "emailAddress": "  ", "reviewContents": "hi" }),
      CancellationToken::new(),
    )
    .await
    .unwrap_err();
  assert_eq!(empty_email.status_code(), 400);

  // Nothing ran, so the first real submission still gets id 1.
  let response = submit(&harness, "a@b.com", "hi").await;
  assert_eq!(response.review_id, 1);
}

#[tokio::test]
async fn english_review_skips_translation_and_keeps_contents_unchanged() {
  let analyzer = ScriptedLanguageAnalyzer::new().scores("absolutely wonderful", positive_scores());
  let harness = harness(analyzer, ScriptedTranslator::new()).await;

  submit(&harness, "a@b.com", "absolutely wonderful").await;

  let detail = wait_for_audit(&harness, "1", "positiveReview").await;
  assert_eq!(detail["dominantLanguage"], "en");
  assert_eq!(detail["reviewContents"], "absolutely wonderful");
  assert_eq!(detail["originalReviewContents"], "absolutely wonderful");

  let email = wait_for_email(&harness, "Thank you for your review").await;
  assert_eq!(email.to, "a@b.com");
  assert_eq!(email.body, "Thank you for your positive review");
  wait_for_audit(&harness, "1", "positiveEmailSent").await;
}

#[tokio::test]
async fn non_english_review_is_classified_on_the_translation() {
  // The scripted scores are keyed on the *translated* text: classification
  // can only find them if the translation was substituted in.
  let analyzer = ScriptedLanguageAnalyzer::new()
    .language("C'est nul", "fr", 0.99)
    .scores("It's bad", negative_scores());
  let translator = ScriptedTranslator::new().translation("C'est nul", "It's bad");
  let harness = harness(analyzer, translator).await;

  submit(&harness, "a@b.com", "C'est nul").await;

  let detail = wait_for_audit(&harness, "1", "negativeReview").await;
  assert_eq!(detail["dominantLanguage"], "fr");
  assert_eq!(detail["reviewContents"], "It's bad");
  assert_eq!(detail["originalReviewContents"], "C'est nul");
}

#[tokio::test]
async fn clear_positive_review_publishes_exactly_one_event() {
  let analyzer = ScriptedLanguageAnalyzer::new().scores("lovely", positive_scores());
  let harness = harness(analyzer, ScriptedTranslator::new()).await;

  submit(&harness, "a@b.com", "lovely").await;

  wait_for_audit(&harness, "1", "positiveReview").await;
  // Let any stray negative branch surface before counting.
  sleep(Duration::from_millis(100)).await;

  assert_eq!(audit_count(&harness, "1", "positiveReview").await, 1);
  assert_eq!(audit_count(&harness, "1", "negativeReview").await, 0);
  assert!(harness.notifier.messages().is_empty());
}

#[tokio::test]
async fn threshold_tie_publishes_nothing() {
  let tie = SentimentScores {
    positive: 0.95,
    negative: 0.95,
    neutral: 0.0,
    mixed: 0.0,
  };
  let analyzer = ScriptedLanguageAnalyzer::new().scores("meh", tie);
  let harness = harness(analyzer, ScriptedTranslator::new()).await;

  submit(&harness, "a@b.com", "meh").await;

  wait_for_audit(&harness, "1", "newReview").await;
  sleep(Duration::from_millis(200)).await;

  assert_eq!(audit_count(&harness, "1", "positiveReview").await, 0);
  assert_eq!(audit_count(&harness, "1", "negativeReview").await, 0);
  assert!(harness.mailer.sent().is_empty());
}

#[tokio::test]
async fn negative_review_runs_the_full_contact_chain() {
  let analyzer = ScriptedLanguageAnalyzer::new().scores("Terrible service", negative_scores());
  let mut harness = harness(analyzer, ScriptedTranslator::new()).await;

  let response = submit(&harness, "a@b.com", "Terrible service").await;
  assert_eq!(response.review_id, 1);

  // Customer contact: operators notified, then the run parks on a token.
  let claim = next_claim(&mut harness).await;
  assert_eq!(claim.payload.email_address, "a@b.com");
  assert_eq!(claim.payload.review_content, "Terrible service");
  assert_eq!(claim.payload.original_review_contents, "Terrible service");
  assert_eq!(claim.payload.review_id, 1);
  assert!(!claim.token.is_empty());
  assert_eq!(
    harness.notifier.messages(),
    vec!["There has been a new negative review".to_string()]
  );

  // Notification: the "sorry" template goes out and is announced.
  let email = wait_for_email(&harness, "Sorry").await;
  assert_eq!(email.to, "a@b.com");
  assert!(email.body.starts_with("I'm sorry our product didn't meet your satisfaction"));
  wait_for_audit(&harness, "1", "negativeEmailSent").await;

  // A human claims the case; the parked run continues.
  let resumed = harness
    .catalog
    .resume_claim(
      ClaimResumeMessage {
        token: claim.token.clone(),
        claimed_by: "agent-7".to_string(),
      },
      CancellationToken::new(),
    )
    .await
    .expect("resume");
  assert!(matches!(resumed, ResumeOutcome::Completed(_)));

  let stored = harness.store.get_claim("1").await.expect("claim record");
  assert_eq!(stored.claimed_by, "agent-7");
  assert_eq!(stored.token, claim.token);

  wait_for_audit(&harness, "1", "customerServiceCaseClaimed").await;
  let claimed_email = wait_for_email(&harness, "Your case is being worked on").await;
  assert_eq!(claimed_email.to, "a@b.com");
  wait_for_audit(&harness, "1", "caseClaimedEmailSent").await;
}

#[tokio::test]
async fn resuming_a_claim_twice_is_a_no_op() {
  let analyzer = ScriptedLanguageAnalyzer::new().scores("Terrible service", negative_scores());
  let mut harness = harness(analyzer, ScriptedTranslator::new()).await;

  submit(&harness, "a@b.com", "Terrible service").await;
  let claim = next_claim(&mut harness).await;

  let message = ClaimResumeMessage {
    token: claim.token.clone(),
    claimed_by: "agent-7".to_string(),
  };

  let first = harness
    .catalog
    .resume_claim(message.clone(), CancellationToken::new())
    .await
    .expect("first resume");
  assert!(matches!(first, ResumeOutcome::Completed(_)));

  let second = harness
    .catalog
    .resume_claim(message, CancellationToken::new())
    .await
    .expect("second resume");
  assert_eq!(second, ResumeOutcome::Duplicate);

  // Exactly one claim record, one claimed event, one claimed email.
  wait_for_audit(&harness, "1", "customerServiceCaseClaimed").await;
  sleep(Duration::from_millis(100)).await;

  assert_eq!(audit_count(&harness, "1", "customerServiceCaseClaimed").await, 1);
  assert_eq!(harness.store.get_claim("1").await.unwrap().claimed_by, "agent-7");
  let claimed_emails = harness
    .mailer
    .sent()
    .iter()
    .filter(|m| m.subject == "Your case is being worked on")
    .count();
  assert_eq!(claimed_emails, 1);
}
