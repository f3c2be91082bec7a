use thiserror::Error;

/// Errors from external capability calls.
#[derive(Debug, Error)]
pub enum CapabilityError {
  /// Timeout, throttling, or connection failure; worth retrying.
  #[error("transient capability failure: {message}")]
  Transient { message: String },

  /// Permanent failure; retrying will not help.
  #[error("capability failure: {message}")]
  Service { message: String },
}

impl CapabilityError {
  pub fn transient(message: impl Into<String>) -> Self {
    Self::Transient {
      message: message.into(),
    }
  }

  pub fn service(message: impl Into<String>) -> Self {
    Self::Service {
      message: message.into(),
    }
  }

  pub fn is_transient(&self) -> bool {
    matches!(self, Self::Transient { .. })
  }
}

impl From<reqwest::Error> for CapabilityError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_timeout() || err.is_connect() {
      return Self::transient(err.to_string());
    }
    if let Some(status) = err.status() {
      if status.as_u16() == 429 || status.is_server_error() {
        return Self::transient(err.to_string());
      }
    }
    Self::service(err.to_string())
  }
}
