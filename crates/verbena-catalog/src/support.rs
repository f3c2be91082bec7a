//! Small shared helpers for catalog step closures.

use serde_json::Value;
use verbena_capability::CapabilityError;
use verbena_workflow::StepError;

/// Map a capability failure into the step taxonomy, preserving whether the
/// executor's retry policy applies.
pub(crate) fn capability_error(err: CapabilityError) -> StepError {
  match err {
    CapabilityError::Transient { message } => StepError::Transient { message },
    CapabilityError::Service { message } => StepError::Service { message },
  }
}

/// Map a storage failure into a permanent step failure.
pub(crate) fn store_error(err: verbena_store::Error) -> StepError {
  StepError::Service {
    message: err.to_string(),
  }
}

/// Render a review id (a JSON number on the wire) as the string partition
/// key used by claim and audit records.
pub(crate) fn review_id_string(path: &str, value: &Value) -> Result<String, StepError> {
  match value {
    Value::Number(n) => Ok(n.to_string()),
    Value::String(s) => Ok(s.clone()),
    other => Err(StepError::InvalidValue {
      path: path.to_string(),
      message: format!("expected review id, found {}", other),
    }),
  }
}
