use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::BoxFuture;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use verbena_event::{EventBus, EventEnvelope, EventHandler, HandlerError};
use verbena_store::{Json, Store, SuspendedRun};
use verbena_workflow::{Branch, ExecutionContext, StepError, StepKind, Workflow};

use crate::error::ExecutionError;

/// Context key the triggering payload is seeded under.
const TRIGGER_KEY: &str = "trigger";

/// Result of a run that reached a terminal or parked state.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
  /// The run walked off the end of its step chain. `output` is the last
  /// executed step's output.
  Succeeded { output: Value },
  /// The run is parked awaiting an external resume with this token.
  Suspended { token: String },
}

/// Result of a resume attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeOutcome {
  Completed(RunOutcome),
  /// The token is unknown or already consumed; the duplicate is a no-op.
  Duplicate,
}

/// Retry policy for service calls and suspension handoffs.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
  /// Retries after the initial attempt, applied to transient failures only.
  pub max_retry_attempts: u32,
  pub retry_base_delay: Duration,
  pub retry_max_delay: Duration,
}

impl Default for RunnerConfig {
  fn default() -> Self {
    Self {
      max_retry_attempts: 3,
      retry_base_delay: Duration::from_millis(100),
      retry_max_delay: Duration::from_secs(2),
    }
  }
}

/// Executes one workflow definition, one independent run per trigger.
///
/// The bus and store are explicit dependencies: published events go through
/// the injected [`EventBus`], suspended state goes through the injected
/// [`Store`]. Nothing is shared between concurrent runs.
pub struct WorkflowRunner {
  workflow: Workflow,
  bus: EventBus,
  store: Arc<dyn Store>,
  config: RunnerConfig,
}

impl WorkflowRunner {
  /// Create a runner, validating the definition up front.
  pub fn new(
    workflow: Workflow,
    bus: EventBus,
    store: Arc<dyn Store>,
    config: RunnerConfig,
  ) -> Result<Self, ExecutionError> {
    workflow.validate()?;
    Ok(Self {
      workflow,
      bus,
      store,
      config,
    })
  }

  pub fn workflow_id(&self) -> &str {
    &self.workflow.workflow_id
  }

  /// Run the workflow against a triggering payload.
  ///
  /// The payload is seeded into the context under `"trigger"`; for
  /// event-triggered runs it is the serialized envelope, for
  /// request-triggered runs the raw request body.
  #[instrument(
    name = "workflow_run",
    skip(self, seed, cancel),
    fields(workflow_id = %self.workflow.workflow_id)
  )]
  pub async fn run(
    &self,
    seed: Value,
    cancel: CancellationToken,
  ) -> Result<RunOutcome, ExecutionError> {
    let execution_id = uuid::Uuid::new_v4().to_string();
    let mut ctx = ExecutionContext::seeded(TRIGGER_KEY, seed);

    info!(execution_id = %execution_id, "workflow run started");
    let result = self
      .drive(&execution_id, &mut ctx, self.workflow.start.clone(), &cancel)
      .await;
    self.log_outcome(&execution_id, &result);
    result
  }

  /// Resume a suspended run.
  ///
  /// The pending suspension is consumed atomically; a second resume for the
  /// same token (or a resume for a token this store never issued) is a
  /// logged no-op. The resume payload is merged into the reloaded context
  /// under the resume key recorded at suspension time.
  #[instrument(
    name = "workflow_resume",
    skip(self, payload, cancel),
    fields(workflow_id = %self.workflow.workflow_id, token = %token)
  )]
  pub async fn resume(
    &self,
    token: &str,
    payload: Value,
    cancel: CancellationToken,
  ) -> Result<ResumeOutcome, ExecutionError> {
    let Some(suspended) = self.store.consume_suspension(token).await? else {
      warn!("resume for unknown or already-consumed token; ignoring");
      return Ok(ResumeOutcome::Duplicate);
    };

    if suspended.workflow_id != self.workflow.workflow_id {
      return Err(ExecutionError::WrongWorkflow {
        token: token.to_string(),
        expected: self.workflow.workflow_id.clone(),
        actual: suspended.workflow_id,
      });
    }

    let mut ctx =
      ExecutionContext::from_value(suspended.context.0).map_err(|e| {
        ExecutionError::CorruptSuspension {
          token: token.to_string(),
          message: e.to_string(),
        }
      })?;
    ctx
      .record(&suspended.resume_key, payload)
      .map_err(|e| ExecutionError::CorruptSuspension {
        token: token.to_string(),
        message: e.to_string(),
      })?;

    let Some(resume_step) = suspended.resume_step else {
      // The suspend step was terminal; merging the payload is all there is.
      info!("resumed run had no further steps");
      return Ok(ResumeOutcome::Completed(RunOutcome::Succeeded {
        output: Value::Null,
      }));
    };

    let execution_id = uuid::Uuid::new_v4().to_string();
    info!(execution_id = %execution_id, resume_step = %resume_step, "workflow run resumed");
    let result = self.drive(&execution_id, &mut ctx, resume_step, &cancel).await;
    self.log_outcome(&execution_id, &result);
    result.map(ResumeOutcome::Completed)
  }

  fn log_outcome(&self, execution_id: &str, result: &Result<RunOutcome, ExecutionError>) {
    match result {
      Ok(RunOutcome::Succeeded { .. }) => {
        info!(execution_id = %execution_id, "workflow run succeeded");
      }
      Ok(RunOutcome::Suspended { token }) => {
        info!(execution_id = %execution_id, token = %token, "workflow run suspended");
      }
      Err(e) => {
        error!(execution_id = %execution_id, error = %e, "workflow run failed");
      }
    }
  }

  /// Walk steps from `start` until the chain ends, suspends, or fails.
  async fn drive(
    &self,
    execution_id: &str,
    ctx: &mut ExecutionContext,
    start: String,
    cancel: &CancellationToken,
  ) -> Result<RunOutcome, ExecutionError> {
    let mut current = Some(start);
    let mut last_output = Value::Null;

    while let Some(step_id) = current {
      if cancel.is_cancelled() {
        return Err(ExecutionError::Cancelled);
      }

      let step = self
        .workflow
        .get_step(&step_id)
        .ok_or_else(|| ExecutionError::StepNotFound {
          workflow_id: self.workflow.workflow_id.clone(),
          step_id: step_id.clone(),
        })?;
      debug!(execution_id = %execution_id, step_id = %step_id, "step started");

      match &step.kind {
        StepKind::Pass(transform) => {
          let output = transform(ctx).map_err(|source| ExecutionError::Step {
            step_id: step_id.clone(),
            source,
          })?;
          self.record(ctx, &step_id, output.clone())?;
          last_output = output;
          current = step.next.clone();
        }

        StepKind::ServiceCall(call) => {
          let output = self.with_retry(&step_id, cancel, || call(ctx)).await?;
          self.record(ctx, &step_id, output.clone())?;
          last_output = output;
          current = step.next.clone();
        }

        StepKind::PublishEvent(envelope_fn) => {
          let envelope = envelope_fn(ctx).map_err(|source| ExecutionError::Step {
            step_id: step_id.clone(),
            source,
          })?;
          info!(
            execution_id = %execution_id,
            source = %envelope.source,
            detail_type = %envelope.detail_type,
            "publishing event"
          );
          let output = serde_json::to_value(&envelope).unwrap_or(Value::Null);
          self.bus.publish(envelope);
          self.record(ctx, &step_id, output.clone())?;
          last_output = output;
          current = step.next.clone();
        }

        StepKind::Choice { branches, otherwise } => {
          current = Some(self.choose(execution_id, &step_id, branches, otherwise.as_deref(), ctx)?);
        }

        StepKind::SuspendForToken { handoff, resume_key } => {
          let token = uuid::Uuid::new_v4().to_string();
          let suspended = SuspendedRun {
            token: token.clone(),
            workflow_id: self.workflow.workflow_id.clone(),
            resume_step: step.next.clone(),
            resume_key: resume_key.clone(),
            context: Json(ctx.as_value()),
            created_at: Utc::now(),
          };
          // State is durable before the external actor ever sees the token.
          self.store.persist_suspension(&suspended).await?;

          if let Err(e) = self
            .with_retry(&step_id, cancel, || handoff(&token, ctx))
            .await
          {
            // The handoff never reached the external actor; a resume for
            // this token must not find a pending run.
            if let Err(cleanup) = self.store.consume_suspension(&token).await {
              warn!(token = %token, error = %cleanup, "failed to invalidate token after handoff failure");
            }
            return Err(e);
          }

          return Ok(RunOutcome::Suspended { token });
        }
      }
    }

    Ok(RunOutcome::Succeeded { output: last_output })
  }

  fn record(
    &self,
    ctx: &mut ExecutionContext,
    step_id: &str,
    output: Value,
  ) -> Result<(), ExecutionError> {
    ctx.record(step_id, output).map_err(|source| ExecutionError::Step {
      step_id: step_id.to_string(),
      source,
    })
  }

  fn choose(
    &self,
    execution_id: &str,
    step_id: &str,
    branches: &[Branch],
    otherwise: Option<&str>,
    ctx: &ExecutionContext,
  ) -> Result<String, ExecutionError> {
    for branch in branches {
      let matched = (branch.when)(ctx).map_err(|source| ExecutionError::Step {
        step_id: step_id.to_string(),
        source,
      })?;
      if matched {
        debug!(execution_id = %execution_id, step_id = %step_id, branch = %branch.label, "branch taken");
        return Ok(branch.then.clone());
      }
    }

    match otherwise {
      Some(target) => {
        debug!(execution_id = %execution_id, step_id = %step_id, "fallback branch taken");
        Ok(target.to_string())
      }
      None => Err(ExecutionError::NoMatchingBranch {
        step_id: step_id.to_string(),
      }),
    }
  }

  /// Run an operation, retrying transient failures with bounded exponential
  /// backoff.
  async fn with_retry<T>(
    &self,
    step_id: &str,
    cancel: &CancellationToken,
    op: impl Fn() -> BoxFuture<'static, Result<T, StepError>>,
  ) -> Result<T, ExecutionError> {
    let mut attempt = 0u32;
    loop {
      match op().await {
        Ok(value) => return Ok(value),
        Err(source) if source.is_transient() && attempt < self.config.max_retry_attempts => {
          attempt += 1;
          let delay = self.backoff_delay(attempt);
          warn!(
            step_id = %step_id,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %source,
            "transient step failure; retrying"
          );
          tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => return Err(ExecutionError::Cancelled),
          }
        }
        Err(source) => {
          return Err(ExecutionError::Step {
            step_id: step_id.to_string(),
            source,
          });
        }
      }
    }
  }

  fn backoff_delay(&self, attempt: u32) -> Duration {
    let factor = 1u32 << (attempt - 1).min(16);
    self
      .config
      .retry_base_delay
      .saturating_mul(factor)
      .min(self.config.retry_max_delay)
  }
}

#[async_trait]
impl EventHandler for WorkflowRunner {
  async fn handle(
    &self,
    envelope: EventEnvelope,
    cancel: CancellationToken,
  ) -> Result<(), HandlerError> {
    let seed = serde_json::to_value(&envelope)?;
    self.run(seed, cancel).await?;
    Ok(())
  }
}
