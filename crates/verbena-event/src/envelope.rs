use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A domain event envelope.
///
/// Envelopes are immutable once published. `detail` is a free-form record
/// whose shape is workflow-specific; the envelope itself only carries the
/// routing metadata (`source`, `detail-type`) and the publication time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
  pub source: String,
  #[serde(rename = "detail-type")]
  pub detail_type: String,
  pub detail: serde_json::Value,
  pub time: DateTime<Utc>,
}

impl EventEnvelope {
  /// Create an envelope stamped with the current time.
  pub fn new(
    source: impl Into<String>,
    detail_type: impl Into<String>,
    detail: serde_json::Value,
  ) -> Self {
    Self {
      source: source.into(),
      detail_type: detail_type.into(),
      detail,
      time: Utc::now(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn detail_type_uses_wire_name() {
    let envelope = EventEnvelope::new("reviews.api", "newReview", json!({ "reviewId": 1 }));
    let wire = serde_json::to_value(&envelope).unwrap();

    assert_eq!(wire["source"], "reviews.api");
    assert_eq!(wire["detail-type"], "newReview");
    assert_eq!(wire["detail"]["reviewId"], 1);
    assert!(wire.get("detail_type").is_none());
  }
}
