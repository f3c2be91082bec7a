//! HTTP-backed capability clients.
//!
//! The language and translation services are plain JSON request/response
//! endpoints. Non-2xx statuses and transport failures are classified into
//! transient vs. permanent by [`CapabilityError`]'s `reqwest` conversion.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::error::CapabilityError;
use crate::types::{
  ClassifyRequest, DetectedLanguage, SentimentScores, TranslateRequest, Translation,
};
use crate::{LanguageAnalyzer, Translator};

fn endpoint(base: &Url, path: &str) -> String {
  format!("{}/{}", base.as_str().trim_end_matches('/'), path)
}

/// Language analysis over HTTP: `POST <base>/detect-language` and
/// `POST <base>/classify-sentiment`.
pub struct HttpLanguageAnalyzer {
  client: Client,
  base_url: Url,
}

impl HttpLanguageAnalyzer {
  pub fn new(client: Client, base_url: Url) -> Self {
    Self { client, base_url }
  }
}

#[derive(Debug, Deserialize)]
struct DetectLanguageResponse {
  languages: Vec<DetectedLanguage>,
}

#[derive(Debug, Deserialize)]
struct ClassifySentimentResponse {
  scores: SentimentScores,
}

#[async_trait]
impl LanguageAnalyzer for HttpLanguageAnalyzer {
  async fn detect_dominant_language(
    &self,
    text: &str,
  ) -> Result<Vec<DetectedLanguage>, CapabilityError> {
    let response: DetectLanguageResponse = self
      .client
      .post(endpoint(&self.base_url, "detect-language"))
      .json(&serde_json::json!({ "text": text }))
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    Ok(response.languages)
  }

  async fn classify_sentiment(
    &self,
    request: ClassifyRequest,
  ) -> Result<SentimentScores, CapabilityError> {
    let response: ClassifySentimentResponse = self
      .client
      .post(endpoint(&self.base_url, "classify-sentiment"))
      .json(&request)
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    Ok(response.scores)
  }
}

/// Translation over HTTP: `POST <base>/translate`.
pub struct HttpTranslator {
  client: Client,
  base_url: Url,
}

impl HttpTranslator {
  pub fn new(client: Client, base_url: Url) -> Self {
    Self { client, base_url }
  }
}

#[async_trait]
impl Translator for HttpTranslator {
  async fn translate(&self, request: TranslateRequest) -> Result<Translation, CapabilityError> {
    let translation: Translation = self
      .client
      .post(endpoint(&self.base_url, "translate"))
      .json(&request)
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    Ok(translation)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn endpoint_handles_trailing_slashes() {
    let base = Url::parse("http://nlp.internal/v1/").unwrap();
    assert_eq!(endpoint(&base, "translate"), "http://nlp.internal/v1/translate");

    let bare = Url::parse("http://nlp.internal").unwrap();
    assert_eq!(endpoint(&bare, "classify-sentiment"), "http://nlp.internal/classify-sentiment");
  }
}
