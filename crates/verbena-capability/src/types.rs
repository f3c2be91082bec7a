use serde::{Deserialize, Serialize};

/// One detected language with its confidence score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedLanguage {
  pub language_code: String,
  pub score: f64,
}

/// Sentiment scores across the four classes. Scores are confidences in
/// `[0, 1]`, not a distribution, so they need not sum to one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentScores {
  pub positive: f64,
  pub negative: f64,
  pub neutral: f64,
  pub mixed: f64,
}

impl SentimentScores {
  pub fn neutral() -> Self {
    Self {
      positive: 0.0,
      negative: 0.0,
      neutral: 1.0,
      mixed: 0.0,
    }
  }
}

/// Request to the sentiment classification capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyRequest {
  pub text: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub language_hint: Option<String>,
}

/// Request to the translation capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
  pub text: String,
  pub source_language: String,
  pub target_language: String,
}

/// Response from the translation capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Translation {
  pub translated_text: String,
}

/// What the external claim worker needs to present a case to a human.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimPayload {
  pub email_address: String,
  pub review_content: String,
  pub original_review_contents: String,
  pub review_id: i64,
}

/// Message enqueued for the external claim worker. The token correlates the
/// worker's eventual resume message back to the suspended run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRequest {
  pub token: String,
  pub payload: ClaimPayload,
}
