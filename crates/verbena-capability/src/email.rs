use serde::{Deserialize, Serialize};

use crate::error::CapabilityError;

/// Body paragraphs are wrapped in this fixed HTML shell; the plain-text body
/// goes out unchanged alongside it.
const HTML_TEMPLATE: &str = "<html><head></head><body><p>{{ body }}</p></body></html>";

/// An outbound email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
  pub to: String,
  pub subject: String,
  pub body: String,
}

impl EmailMessage {
  pub fn new(
    to: impl Into<String>,
    subject: impl Into<String>,
    body: impl Into<String>,
  ) -> Self {
    Self {
      to: to.into(),
      subject: subject.into(),
      body: body.into(),
    }
  }

  /// Render the HTML variant of the body.
  pub fn html_body(&self) -> Result<String, CapabilityError> {
    let mut env = minijinja::Environment::new();
    // Named .html so the body is escaped on the way in.
    env
      .add_template("email.html", HTML_TEMPLATE)
      .and_then(|_| env.get_template("email.html"))
      .and_then(|t| t.render(minijinja::context! { body => self.body }))
      .map_err(|e| CapabilityError::service(format!("email template render failed: {}", e)))
  }
}
