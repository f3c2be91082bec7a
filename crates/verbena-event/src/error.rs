use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
  /// A rule names a workflow that was never registered as a target.
  #[error("rule '{rule}' targets unknown workflow '{target}'")]
  UnknownTarget { rule: String, target: String },
}
