//! Verbena Capability
//!
//! External capabilities consumed by verbena's workflows, specified at their
//! interface boundary only: natural-language analysis and translation are
//! black-box request/response services, email and operator notification are
//! transport-level concerns, and the claim queue hands suspended runs to an
//! external claim worker.
//!
//! Each capability is an object-safe trait. HTTP-backed implementations live
//! in [`http`]; in-memory doubles for wiring and tests live in [`memory`].

mod email;
mod error;
pub mod http;
pub mod memory;
mod types;

use async_trait::async_trait;

pub use email::EmailMessage;
pub use error::CapabilityError;
pub use types::{
  ClaimPayload, ClaimRequest, ClassifyRequest, DetectedLanguage, SentimentScores,
  TranslateRequest, Translation,
};

/// Natural-language analysis: language detection and sentiment classification.
#[async_trait]
pub trait LanguageAnalyzer: Send + Sync {
  /// Detect the languages of a text, dominant language first.
  async fn detect_dominant_language(
    &self,
    text: &str,
  ) -> Result<Vec<DetectedLanguage>, CapabilityError>;

  /// Classify the sentiment of a text.
  async fn classify_sentiment(
    &self,
    request: ClassifyRequest,
  ) -> Result<SentimentScores, CapabilityError>;
}

/// Text translation.
#[async_trait]
pub trait Translator: Send + Sync {
  async fn translate(&self, request: TranslateRequest) -> Result<Translation, CapabilityError>;
}

/// Outbound email.
#[async_trait]
pub trait Mailer: Send + Sync {
  async fn send(&self, message: EmailMessage) -> Result<(), CapabilityError>;
}

/// Notifies customer-service operators that something needs attention.
#[async_trait]
pub trait OperatorNotifier: Send + Sync {
  async fn notify(&self, message: &str) -> Result<(), CapabilityError>;
}

/// Queue handing suspended runs to the external claim worker.
#[async_trait]
pub trait ClaimQueue: Send + Sync {
  async fn enqueue(&self, request: ClaimRequest) -> Result<(), CapabilityError>;
}
