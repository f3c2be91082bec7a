use thiserror::Error;
use verbena_workflow::{StepError, WorkflowError};

/// Errors that can terminate a workflow run.
#[derive(Debug, Error)]
pub enum ExecutionError {
  /// The workflow definition is unusable.
  #[error(transparent)]
  Definition(#[from] WorkflowError),

  /// A step advanced to an id the definition does not contain.
  #[error("step '{step_id}' not found in workflow '{workflow_id}'")]
  StepNotFound {
    workflow_id: String,
    step_id: String,
  },

  /// A step failed (after retries, where the retry policy applies).
  #[error("step '{step_id}' failed")]
  Step {
    step_id: String,
    #[source]
    source: StepError,
  },

  /// A choice step matched no branch and declared no fallback. Always a
  /// workflow-definition gap, never silently ignored.
  #[error("choice step '{step_id}' matched no branch and has no fallback")]
  NoMatchingBranch { step_id: String },

  /// Suspension storage failed.
  #[error("suspension storage failed")]
  Suspension(#[from] verbena_store::Error),

  /// A resume token resolved to a different workflow's run.
  #[error("token '{token}' belongs to workflow '{actual}', not '{expected}'")]
  WrongWorkflow {
    token: String,
    expected: String,
    actual: String,
  },

  /// The persisted state behind a token cannot be loaded.
  #[error("suspended state for token '{token}' is unusable: {message}")]
  CorruptSuspension { token: String, message: String },

  /// Execution was cancelled.
  #[error("execution cancelled")]
  Cancelled,
}
