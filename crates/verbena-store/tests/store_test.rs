//! Store behavior against in-memory SQLite.

use chrono::Utc;
use serde_json::json;

use verbena_store::{
  AuditRecord, CaseRecord, ClaimRecord, Error, Json, SqliteStore, Store, SuspendedRun,
};

async fn store() -> SqliteStore {
  let store = SqliteStore::in_memory().await.expect("open in-memory store");
  store.migrate().await.expect("run migrations");
  store
}

#[tokio::test]
async fn case_ids_are_distinct_and_strictly_increasing_under_concurrency() {
  let store = std::sync::Arc::new(store().await);

  let mut handles = Vec::new();
  for _ in 0..20 {
    let store = store.clone();
    handles.push(tokio::spawn(async move { store.next_case_id().await }));
  }

  let mut ids = Vec::new();
  for handle in handles {
    ids.push(handle.await.unwrap().expect("next_case_id"));
  }

  ids.sort_unstable();
  let expected: Vec<i64> = (1..=20).collect();
  assert_eq!(ids, expected);
}

#[tokio::test]
async fn first_issued_case_id_is_one() {
  let store = store().await;
  assert_eq!(store.next_case_id().await.unwrap(), 1);
  assert_eq!(store.next_case_id().await.unwrap(), 2);
}

#[tokio::test]
async fn case_records_round_trip() {
  let store = store().await;

  let case = CaseRecord {
    case_id: 1,
    review_identifier: "rev-abc".to_string(),
    email_address: "a@b.com".to_string(),
    contents: "Terrible service".to_string(),
    created_at: Utc::now(),
  };
  store.put_case(&case).await.unwrap();

  let loaded = store.get_case(1).await.unwrap();
  assert_eq!(loaded.case_id, 1);
  assert_eq!(loaded.review_identifier, "rev-abc");
  assert_eq!(loaded.email_address, "a@b.com");
  assert_eq!(loaded.contents, "Terrible service");

  assert!(matches!(store.get_case(99).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn second_claim_for_a_review_replaces_the_first() {
  let store = store().await;

  let claim = |agent: &str, token: &str| ClaimRecord {
    review_id: "1".to_string(),
    claimed_by: agent.to_string(),
    token: token.to_string(),
    email_address: "a@b.com".to_string(),
    review_contents: "Terrible service".to_string(),
    claimed_at: Utc::now(),
  };

  store.put_claim(&claim("agent-a", "t-1")).await.unwrap();
  store.put_claim(&claim("agent-b", "t-2")).await.unwrap();

  let loaded = store.get_claim("1").await.unwrap();
  assert_eq!(loaded.claimed_by, "agent-b");
  assert_eq!(loaded.token, "t-2");
}

#[tokio::test]
async fn audit_scan_is_ordered_by_sort_key_and_tolerates_duplicates() {
  let store = store().await;

  let record = |sort_key: &str, event_type: &str| AuditRecord {
    review_id: "1".to_string(),
    sort_key: sort_key.to_string(),
    detail: Json(json!({ "type": event_type })),
    recorded_at: Utc::now(),
  };

  store
    .append_audit(&record("2026-01-01T10:00:02Z#negativeReview", "negativeReview"))
    .await
    .unwrap();
  store
    .append_audit(&record("2026-01-01T10:00:01Z#newReview", "newReview"))
    .await
    .unwrap();
  // Duplicate delivery of the same event.
  store
    .append_audit(&record("2026-01-01T10:00:01Z#newReview", "newReview"))
    .await
    .unwrap();

  let trail = store.list_audit("1").await.unwrap();
  let types: Vec<&str> = trail
    .iter()
    .map(|r| r.detail.0["type"].as_str().unwrap())
    .collect();
  assert_eq!(types, ["newReview", "negativeReview"]);

  assert!(store.list_audit("2").await.unwrap().is_empty());
}

#[tokio::test]
async fn suspension_is_consumed_exactly_once() {
  let store = store().await;

  let run = SuspendedRun {
    token: "token-1".to_string(),
    workflow_id: "customer-contact".to_string(),
    resume_step: Some("store-claim".to_string()),
    resume_key: "claim".to_string(),
    context: Json(json!({ "trigger": { "detail": { "reviewId": 1 } } })),
    created_at: Utc::now(),
  };
  store.persist_suspension(&run).await.unwrap();

  let first = store
    .consume_suspension("token-1")
    .await
    .unwrap()
    .expect("first consume returns the run");
  assert_eq!(first.token, run.token);
  assert_eq!(first.workflow_id, run.workflow_id);
  assert_eq!(first.resume_step, run.resume_step);
  assert_eq!(first.resume_key, run.resume_key);
  assert_eq!(first.context, run.context);

  // Second consume of the same token and consume of an unknown token are
  // both identical no-ops.
  assert_eq!(store.consume_suspension("token-1").await.unwrap(), None);
  assert_eq!(store.consume_suspension("token-9").await.unwrap(), None);
}
