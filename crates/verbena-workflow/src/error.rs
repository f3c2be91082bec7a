use thiserror::Error;

/// Errors produced while evaluating a single step.
#[derive(Debug, Error)]
pub enum StepError {
  /// A path lookup into the execution context found nothing.
  #[error("missing context value at '{path}'")]
  MissingValue { path: String },

  /// A context value exists but has the wrong shape.
  #[error("invalid context value at '{path}': {message}")]
  InvalidValue { path: String, message: String },

  /// A step tried to record output under a key that is already taken.
  #[error("context key '{key}' already recorded")]
  KeyConflict { key: String },

  /// An external capability failed in a retryable way (timeout, throttle).
  #[error("transient service failure: {message}")]
  Transient { message: String },

  /// An external capability failed permanently.
  #[error("service call failed: {message}")]
  Service { message: String },

  /// The case-id counter store is unavailable.
  #[error("case id generation failed: {message}")]
  Generation { message: String },
}

impl StepError {
  /// Whether the executor's retry policy applies to this error.
  pub fn is_transient(&self) -> bool {
    matches!(self, Self::Transient { .. })
  }
}

/// Errors in a workflow definition itself.
#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("workflow '{workflow_id}' references unknown step '{step_id}'")]
  UnknownStep {
    workflow_id: String,
    step_id: String,
  },

  #[error("invalid workflow definition: {message}")]
  InvalidDefinition { message: String },
}
