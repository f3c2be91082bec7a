use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use verbena_event::EventEnvelope;

use crate::context::ExecutionContext;
use crate::error::StepError;

/// Pure transform of the execution context into a step output.
pub type TransformFn = Arc<dyn Fn(&ExecutionContext) -> Result<Value, StepError> + Send + Sync>;

/// Branch predicate evaluated against the execution context.
pub type PredicateFn = Arc<dyn Fn(&ExecutionContext) -> Result<bool, StepError> + Send + Sync>;

/// External capability call. The closure reads what it needs from the
/// context synchronously and returns an owned future performing the call.
pub type ServiceFn =
  Arc<dyn Fn(&ExecutionContext) -> BoxFuture<'static, Result<Value, StepError>> + Send + Sync>;

/// Derives the envelope a `PublishEvent` step emits.
pub type EnvelopeFn =
  Arc<dyn Fn(&ExecutionContext) -> Result<EventEnvelope, StepError> + Send + Sync>;

/// Hands a suspended run off to an external actor. Receives the minted
/// correlation token alongside the context.
pub type HandoffFn = Arc<
  dyn Fn(&str, &ExecutionContext) -> BoxFuture<'static, Result<(), StepError>> + Send + Sync,
>;

/// One arm of a `Choice` step.
#[derive(Clone)]
pub struct Branch {
  pub label: String,
  pub when: PredicateFn,
  /// Step id to advance to when the predicate holds.
  pub then: String,
}

impl Branch {
  pub fn new(
    label: impl Into<String>,
    when: impl Fn(&ExecutionContext) -> Result<bool, StepError> + Send + Sync + 'static,
    then: impl Into<String>,
  ) -> Self {
    Self {
      label: label.into(),
      when: Arc::new(when),
      then: then.into(),
    }
  }
}

impl fmt::Debug for Branch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Branch")
      .field("label", &self.label)
      .field("then", &self.then)
      .finish_non_exhaustive()
  }
}

/// The behavior of a single step.
#[derive(Clone)]
pub enum StepKind {
  /// Pure transform of accumulated state.
  Pass(TransformFn),
  /// Invoke an external capability; the response becomes the step output.
  ServiceCall(ServiceFn),
  /// Emit a new envelope onto the bus, fire-and-forget.
  PublishEvent(EnvelopeFn),
  /// Ordered predicates, first match wins; `otherwise` is the fallback.
  /// No match and no fallback fails the run.
  Choice {
    branches: Vec<Branch>,
    otherwise: Option<String>,
  },
  /// Persist the run and halt until an external actor resumes it with the
  /// correlation token. The resume payload is merged under `resume_key`.
  SuspendForToken {
    handoff: HandoffFn,
    resume_key: String,
  },
}

impl fmt::Debug for StepKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Pass(_) => f.write_str("Pass"),
      Self::ServiceCall(_) => f.write_str("ServiceCall"),
      Self::PublishEvent(_) => f.write_str("PublishEvent"),
      Self::Choice { branches, otherwise } => f
        .debug_struct("Choice")
        .field("branches", branches)
        .field("otherwise", otherwise)
        .finish(),
      Self::SuspendForToken { resume_key, .. } => f
        .debug_struct("SuspendForToken")
        .field("resume_key", resume_key)
        .finish_non_exhaustive(),
    }
  }
}

/// A single unit of work in a workflow.
#[derive(Debug, Clone)]
pub struct Step {
  pub id: String,
  pub kind: StepKind,
  /// Step to advance to afterwards; `None` terminates the run. Unused by
  /// `Choice`, whose branches carry their own targets.
  pub next: Option<String>,
}

impl Step {
  pub fn pass(
    id: impl Into<String>,
    next: Option<&str>,
    transform: impl Fn(&ExecutionContext) -> Result<Value, StepError> + Send + Sync + 'static,
  ) -> Self {
    Self {
      id: id.into(),
      kind: StepKind::Pass(Arc::new(transform)),
      next: next.map(str::to_string),
    }
  }

  /// A terminal do-nothing step, used as an explicit "no publication" arm.
  pub fn noop(id: impl Into<String>) -> Self {
    Self::pass(id, None, |_| Ok(Value::Null))
  }

  pub fn service_call(
    id: impl Into<String>,
    next: Option<&str>,
    call: impl Fn(&ExecutionContext) -> BoxFuture<'static, Result<Value, StepError>>
    + Send
    + Sync
    + 'static,
  ) -> Self {
    Self {
      id: id.into(),
      kind: StepKind::ServiceCall(Arc::new(call)),
      next: next.map(str::to_string),
    }
  }

  pub fn publish_event(
    id: impl Into<String>,
    next: Option<&str>,
    envelope: impl Fn(&ExecutionContext) -> Result<EventEnvelope, StepError> + Send + Sync + 'static,
  ) -> Self {
    Self {
      id: id.into(),
      kind: StepKind::PublishEvent(Arc::new(envelope)),
      next: next.map(str::to_string),
    }
  }

  pub fn choice(id: impl Into<String>, branches: Vec<Branch>, otherwise: Option<&str>) -> Self {
    Self {
      id: id.into(),
      kind: StepKind::Choice {
        branches,
        otherwise: otherwise.map(str::to_string),
      },
      next: None,
    }
  }

  pub fn suspend_for_token(
    id: impl Into<String>,
    next: Option<&str>,
    resume_key: impl Into<String>,
    handoff: impl Fn(&str, &ExecutionContext) -> BoxFuture<'static, Result<(), StepError>>
    + Send
    + Sync
    + 'static,
  ) -> Self {
    Self {
      id: id.into(),
      kind: StepKind::SuspendForToken {
        handoff: Arc::new(handoff),
        resume_key: resume_key.into(),
      },
      next: next.map(str::to_string),
    }
  }
}
