//! In-memory capability implementations.
//!
//! Scripted variants return pre-arranged responses keyed by input text;
//! recording variants capture what was sent for assertions; logging variants
//! let the binary run without any external service wired up.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::info;

use crate::email::EmailMessage;
use crate::error::CapabilityError;
use crate::types::{
  ClaimRequest, ClassifyRequest, DetectedLanguage, SentimentScores, TranslateRequest, Translation,
};
use crate::{ClaimQueue, LanguageAnalyzer, Mailer, OperatorNotifier, Translator};

/// Language analyzer returning scripted detections and scores.
///
/// Defaults to "everything is English and neutral"; per-text overrides are
/// added with [`language`](Self::language) and [`scores`](Self::scores).
pub struct ScriptedLanguageAnalyzer {
  default_languages: Vec<DetectedLanguage>,
  languages_by_text: HashMap<String, Vec<DetectedLanguage>>,
  default_scores: SentimentScores,
  scores_by_text: HashMap<String, SentimentScores>,
}

impl Default for ScriptedLanguageAnalyzer {
  fn default() -> Self {
    Self::new()
  }
}

impl ScriptedLanguageAnalyzer {
  pub fn new() -> Self {
    Self {
      default_languages: vec![DetectedLanguage {
        language_code: "en".to_string(),
        score: 1.0,
      }],
      languages_by_text: HashMap::new(),
      default_scores: SentimentScores::neutral(),
      scores_by_text: HashMap::new(),
    }
  }

  /// Script the dominant language for one exact text.
  pub fn language(mut self, text: impl Into<String>, code: impl Into<String>, score: f64) -> Self {
    self.languages_by_text.insert(
      text.into(),
      vec![DetectedLanguage {
        language_code: code.into(),
        score,
      }],
    );
    self
  }

  /// Script the sentiment scores for one exact text.
  pub fn scores(mut self, text: impl Into<String>, scores: SentimentScores) -> Self {
    self.scores_by_text.insert(text.into(), scores);
    self
  }

  /// Override the fallback scores used for unscripted texts.
  pub fn default_scores(mut self, scores: SentimentScores) -> Self {
    self.default_scores = scores;
    self
  }
}

#[async_trait]
impl LanguageAnalyzer for ScriptedLanguageAnalyzer {
  async fn detect_dominant_language(
    &self,
    text: &str,
  ) -> Result<Vec<DetectedLanguage>, CapabilityError> {
    Ok(
      self
        .languages_by_text
        .get(text)
        .unwrap_or(&self.default_languages)
        .clone(),
    )
  }

  async fn classify_sentiment(
    &self,
    request: ClassifyRequest,
  ) -> Result<SentimentScores, CapabilityError> {
    Ok(
      self
        .scores_by_text
        .get(&request.text)
        .copied()
        .unwrap_or(self.default_scores),
    )
  }
}

/// Translator returning scripted translations keyed by source text.
///
/// An unscripted text is an error rather than a passthrough, so a test can
/// never silently classify untranslated text.
#[derive(Default)]
pub struct ScriptedTranslator {
  translations: HashMap<String, String>,
}

impl ScriptedTranslator {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn translation(mut self, text: impl Into<String>, translated: impl Into<String>) -> Self {
    self.translations.insert(text.into(), translated.into());
    self
  }
}

#[async_trait]
impl Translator for ScriptedTranslator {
  async fn translate(&self, request: TranslateRequest) -> Result<Translation, CapabilityError> {
    match self.translations.get(&request.text) {
      Some(translated) => Ok(Translation {
        translated_text: translated.clone(),
      }),
      None => Err(CapabilityError::service(format!(
        "no scripted translation for '{}'",
        request.text
      ))),
    }
  }
}

/// Mailer that records every message.
#[derive(Default)]
pub struct RecordingMailer {
  sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn sent(&self) -> Vec<EmailMessage> {
    self.sent.lock().unwrap().clone()
  }
}

#[async_trait]
impl Mailer for RecordingMailer {
  async fn send(&self, message: EmailMessage) -> Result<(), CapabilityError> {
    // Render up front so a broken template fails here, like a real send.
    message.html_body()?;
    self.sent.lock().unwrap().push(message);
    Ok(())
  }
}

/// Mailer that only logs; the default when no transport is wired up.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
  async fn send(&self, message: EmailMessage) -> Result<(), CapabilityError> {
    let _ = message.html_body()?;
    info!(to = %message.to, subject = %message.subject, "email sent");
    Ok(())
  }
}

/// Operator notifier that records every message.
#[derive(Default)]
pub struct RecordingNotifier {
  messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn messages(&self) -> Vec<String> {
    self.messages.lock().unwrap().clone()
  }
}

#[async_trait]
impl OperatorNotifier for RecordingNotifier {
  async fn notify(&self, message: &str) -> Result<(), CapabilityError> {
    self.messages.lock().unwrap().push(message.to_string());
    Ok(())
  }
}

/// Operator notifier that only logs.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl OperatorNotifier for LogNotifier {
  async fn notify(&self, message: &str) -> Result<(), CapabilityError> {
    info!(message, "operator notification");
    Ok(())
  }
}

/// Claim queue backed by an in-process channel; the receiver side plays the
/// external claim worker.
pub struct ChannelClaimQueue {
  sender: mpsc::UnboundedSender<ClaimRequest>,
}

impl ChannelClaimQueue {
  pub fn new() -> (Self, mpsc::UnboundedReceiver<ClaimRequest>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self { sender }, receiver)
  }
}

#[async_trait]
impl ClaimQueue for ChannelClaimQueue {
  async fn enqueue(&self, request: ClaimRequest) -> Result<(), CapabilityError> {
    self
      .sender
      .send(request)
      .map_err(|_| CapabilityError::service("claim queue receiver is gone"))
  }
}

/// Claim queue that only logs the token, for driving claims by hand.
#[derive(Debug, Default)]
pub struct LogClaimQueue;

#[async_trait]
impl ClaimQueue for LogClaimQueue {
  async fn enqueue(&self, request: ClaimRequest) -> Result<(), CapabilityError> {
    info!(
      token = %request.token,
      review_id = request.payload.review_id,
      "case queued for claim"
    );
    Ok(())
  }
}
