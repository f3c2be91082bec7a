//! Event sources and detail-types shared across the catalog.

/// Envelope sources, one per publishing service.
pub mod source {
  pub const API: &str = "reviews.api";
  pub const SENTIMENT: &str = "reviews.sentiment-analysis";
  pub const NOTIFICATIONS: &str = "reviews.notifications";
  pub const CUSTOMER_SERVICE: &str = "reviews.customer-service";

  /// Every source, for fan-in consumers.
  pub const ALL: [&str; 4] = [API, SENTIMENT, NOTIFICATIONS, CUSTOMER_SERVICE];
}

/// Envelope detail-types.
pub mod event_type {
  pub const NEW_REVIEW: &str = "newReview";
  pub const POSITIVE_REVIEW: &str = "positiveReview";
  pub const NEGATIVE_REVIEW: &str = "negativeReview";
  pub const CASE_CLAIMED: &str = "customerServiceCaseClaimed";
  pub const POSITIVE_EMAIL_SENT: &str = "positiveEmailSent";
  pub const NEGATIVE_EMAIL_SENT: &str = "negativeEmailSent";
  pub const CASE_CLAIMED_EMAIL_SENT: &str = "caseClaimedEmailSent";
}
