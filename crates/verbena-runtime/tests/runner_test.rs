//! Runner behavior: sequential stepping, branching, retries, suspend/resume.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use futures::FutureExt;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use verbena_event::{EventEnvelope, event_channel};
use verbena_runtime::{ExecutionError, ResumeOutcome, RunOutcome, RunnerConfig, WorkflowRunner};
use verbena_store::{SqliteStore, Store};
use verbena_workflow::{Branch, Step, StepError, Workflow};

async fn store() -> Arc<SqliteStore> {
  let store = SqliteStore::in_memory().await.expect("open store");
  store.migrate().await.expect("migrate");
  Arc::new(store)
}

fn fast_retries() -> RunnerConfig {
  RunnerConfig {
    max_retry_attempts: 2,
    retry_base_delay: Duration::from_millis(1),
    retry_max_delay: Duration::from_millis(4),
  }
}

async fn runner(workflow: Workflow) -> WorkflowRunner {
  let (bus, _receiver) = event_channel();
  WorkflowRunner::new(workflow, bus, store().await, fast_retries()).expect("valid workflow")
}

#[tokio::test]
async fn pass_chain_runs_sequentially_and_returns_the_last_output() {
  let workflow = Workflow::new("chain", "Chain", "double")
    .with_step(Step::pass("double", Some("describe"), |ctx| {
      let n = ctx.i64_at("trigger.n")?;
      Ok(json!({ "doubled": n * 2 }))
    }))
    .with_step(Step::pass("describe", None, |ctx| {
      let doubled = ctx.i64_at("double.doubled")?;
      Ok(json!({ "text": format!("result is {}", doubled) }))
    }));

  let outcome = runner(workflow)
    .await
    .run(json!({ "n": 21 }), CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(
    outcome,
    RunOutcome::Succeeded {
      output: json!({ "text": "result is 42" })
    }
  );
}

#[tokio::test]
async fn invalid_definitions_are_rejected_at_construction() {
  let workflow =
    Workflow::new("broken", "Broken", "only").with_step(Step::pass("only", Some("gone"), |_| {
      Ok(Value::Null)
    }));

  let (bus, _receiver) = event_channel();
  let result = WorkflowRunner::new(workflow, bus, store().await, RunnerConfig::default());
  assert!(matches!(result, Err(ExecutionError::Definition(_))));
}

#[tokio::test]
async fn choice_takes_the_first_matching_branch_in_order() {
  let workflow = Workflow::new("branchy", "Branchy", "pick")
    .with_step(Step::choice(
      "pick",
      vec![
        Branch::new("big", |ctx| Ok(ctx.i64_at("trigger.n")? > 10), "as-big"),
        Branch::new("positive", |ctx| Ok(ctx.i64_at("trigger.n")? > 0), "as-positive"),
      ],
      Some("as-other"),
    ))
    .with_step(Step::pass("as-big", None, |_| Ok(json!("big"))))
    .with_step(Step::pass("as-positive", None, |_| Ok(json!("positive"))))
    .with_step(Step::pass("as-other", None, |_| Ok(json!("other"))));

  let runner = runner(workflow).await;

  // 50 matches both predicates; the first declared branch wins.
  let big = runner.run(json!({ "n": 50 }), CancellationToken::new()).await.unwrap();
  assert_eq!(big, RunOutcome::Succeeded { output: json!("big") });

  let positive = runner.run(json!({ "n": 3 }), CancellationToken::new()).await.unwrap();
  assert_eq!(positive, RunOutcome::Succeeded { output: json!("positive") });

  let other = runner.run(json!({ "n": -1 }), CancellationToken::new()).await.unwrap();
  assert_eq!(other, RunOutcome::Succeeded { output: json!("other") });
}

#[tokio::test]
async fn choice_without_match_or_fallback_is_fatal() {
  let workflow = Workflow::new("gap", "Gap", "pick")
    .with_step(Step::choice(
      "pick",
      vec![Branch::new("never", |_| Ok(false), "target")],
      None,
    ))
    .with_step(Step::noop("target"));

  let result = runner(workflow)
    .await
    .run(json!({}), CancellationToken::new())
    .await;

  assert!(matches!(
    result,
    Err(ExecutionError::NoMatchingBranch { step_id }) if step_id == "pick"
  ));
}

#[tokio::test]
async fn transient_failures_are_retried_until_success() {
  let calls = Arc::new(AtomicU32::new(0));
  let call_counter = calls.clone();

  let workflow = Workflow::new("flaky", "Flaky", "call").with_step(Step::service_call(
    "call",
    None,
    move |_| {
      let calls = call_counter.clone();
      async move {
        if calls.fetch_add(1, Ordering::SeqCst) < 2 {
          Err(StepError::Transient {
            message: "throttled".to_string(),
          })
        } else {
          Ok(json!({ "ok": true }))
        }
      }
      .boxed()
    },
  ));

  let outcome = runner(workflow)
    .await
    .run(json!({}), CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(outcome, RunOutcome::Succeeded { output: json!({ "ok": true }) });
  assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn exhausted_retries_fail_the_run() {
  let calls = Arc::new(AtomicU32::new(0));
  let call_counter = calls.clone();

  let workflow = Workflow::new("down", "Down", "call").with_step(Step::service_call(
    "call",
    None,
    move |_| {
      let calls = call_counter.clone();
      async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(StepError::Transient {
          message: "timeout".to_string(),
        })
      }
      .boxed()
    },
  ));

  let result = runner(workflow)
    .await
    .run(json!({}), CancellationToken::new())
    .await;

  assert!(matches!(
    result,
    Err(ExecutionError::Step { step_id, source: StepError::Transient { .. } }) if step_id == "call"
  ));
  // Initial attempt plus max_retry_attempts.
  assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn permanent_failures_are_not_retried() {
  let calls = Arc::new(AtomicU32::new(0));
  let call_counter = calls.clone();

  let workflow = Workflow::new("broken-dep", "BrokenDep", "call").with_step(Step::service_call(
    "call",
    None,
    move |_| {
      let calls = call_counter.clone();
      async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(StepError::Service {
          message: "bad request".to_string(),
        })
      }
      .boxed()
    },
  ));

  let result = runner(workflow)
    .await
    .run(json!({}), CancellationToken::new())
    .await;

  assert!(matches!(result, Err(ExecutionError::Step { .. })));
  assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn published_envelopes_reach_the_bus() {
  let (bus, mut receiver) = event_channel();
  let workflow = Workflow::new("announce", "Announce", "publish").with_step(Step::publish_event(
    "publish",
    None,
    |ctx| {
      Ok(EventEnvelope::new(
        "tests",
        "pinged",
        json!({ "n": ctx.i64_at("trigger.n")? }),
      ))
    },
  ));

  let runner = WorkflowRunner::new(workflow, bus, store().await, RunnerConfig::default()).unwrap();
  runner.run(json!({ "n": 7 }), CancellationToken::new()).await.unwrap();

  let envelope = receiver.recv().await.expect("published envelope");
  assert_eq!(envelope.source, "tests");
  assert_eq!(envelope.detail_type, "pinged");
  assert_eq!(envelope.detail, json!({ "n": 7 }));
}

fn suspending_workflow(
  handed_off: Arc<Mutex<Option<String>>>,
  resumed_runs: Arc<AtomicU32>,
  fail_handoff: bool,
) -> Workflow {
  Workflow::new("parking", "Parking", "await-actor")
    .with_step(Step::suspend_for_token(
      "await-actor",
      Some("after-resume"),
      "actor",
      move |token, _ctx| {
        let handed_off = handed_off.clone();
        let token = token.to_string();
        async move {
          *handed_off.lock().unwrap() = Some(token);
          if fail_handoff {
            return Err(StepError::Service {
              message: "queue unavailable".to_string(),
            });
          }
          Ok(())
        }
        .boxed()
      },
    ))
    .with_step(Step::pass("after-resume", None, move |ctx| {
      resumed_runs.fetch_add(1, Ordering::SeqCst);
      Ok(json!({ "resumedBy": ctx.str_at("actor.name")? }))
    }))
}

#[tokio::test]
async fn suspend_persists_durably_and_resume_continues_once() {
  let handed_off = Arc::new(Mutex::new(None));
  let resumed_runs = Arc::new(AtomicU32::new(0));
  let workflow = suspending_workflow(handed_off.clone(), resumed_runs.clone(), false);

  let (bus, _receiver) = event_channel();
  let store = store().await;
  let runner = WorkflowRunner::new(workflow, bus, store.clone(), fast_retries()).unwrap();

  let outcome = runner
    .run(json!({ "reviewId": 1 }), CancellationToken::new())
    .await
    .unwrap();
  let RunOutcome::Suspended { token } = outcome else {
    panic!("expected suspension, got {:?}", outcome);
  };

  // The external actor received exactly the persisted token.
  assert_eq!(handed_off.lock().unwrap().as_deref(), Some(token.as_str()));
  assert_eq!(resumed_runs.load(Ordering::SeqCst), 0);

  let resumed = runner
    .resume(&token, json!({ "name": "agent-a" }), CancellationToken::new())
    .await
    .unwrap();
  assert_eq!(
    resumed,
    ResumeOutcome::Completed(RunOutcome::Succeeded {
      output: json!({ "resumedBy": "agent-a" })
    })
  );
  assert_eq!(resumed_runs.load(Ordering::SeqCst), 1);

  // A duplicate resume is a no-op: nothing re-executes.
  let duplicate = runner
    .resume(&token, json!({ "name": "agent-b" }), CancellationToken::new())
    .await
    .unwrap();
  assert_eq!(duplicate, ResumeOutcome::Duplicate);
  assert_eq!(resumed_runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_handoff_fails_the_run_and_invalidates_the_token() {
  let handed_off = Arc::new(Mutex::new(None));
  let resumed_runs = Arc::new(AtomicU32::new(0));
  let workflow = suspending_workflow(handed_off.clone(), resumed_runs.clone(), true);

  let (bus, _receiver) = event_channel();
  let store = store().await;
  let runner = WorkflowRunner::new(workflow, bus, store.clone(), fast_retries()).unwrap();

  let result = runner
    .run(json!({ "reviewId": 1 }), CancellationToken::new())
    .await;
  assert!(matches!(
    result,
    Err(ExecutionError::Step { step_id, .. }) if step_id == "await-actor"
  ));

  // No pending suspension survives a failed handoff: the minted token was
  // invalidated, so a later resume finds nothing.
  let token = handed_off.lock().unwrap().clone().expect("handoff saw the token");
  assert_eq!(store.consume_suspension(&token).await.unwrap(), None);
  assert_eq!(resumed_runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancelled_runs_stop_before_the_next_step() {
  let calls = Arc::new(AtomicU32::new(0));
  let call_counter = calls.clone();

  let workflow = Workflow::new("halted", "Halted", "call").with_step(Step::service_call(
    "call",
    None,
    move |_| {
      let calls = call_counter.clone();
      async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Null)
      }
      .boxed()
    },
  ));

  let runner = runner(workflow).await;
  let cancel = CancellationToken::new();
  cancel.cancel();

  let result = runner.run(json!({}), cancel).await;
  assert!(matches!(result, Err(ExecutionError::Cancelled)));
  assert_eq!(calls.load(Ordering::SeqCst), 0);
}
