use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::envelope::EventEnvelope;
use crate::error::RouterError;
use crate::rule::Rule;

/// Error type returned by event handlers.
///
/// Handlers live in downstream crates with their own error enums; the router
/// only ever logs handler failures, so a boxed error is enough here.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A routing target: something that can run in response to an envelope.
#[async_trait]
pub trait EventHandler: Send + Sync {
  async fn handle(
    &self,
    envelope: EventEnvelope,
    cancel: CancellationToken,
  ) -> Result<(), HandlerError>;
}

/// Content-based event dispatcher.
///
/// Rules are evaluated against every published envelope; each match starts
/// one independent invocation of the bound handler. Invocations are
/// fire-and-forget from the publisher's perspective: a failure in one matched
/// workflow never affects the others, it is only logged.
#[derive(Default)]
pub struct EventRouter {
  rules: Vec<Rule>,
  targets: HashMap<String, Arc<dyn EventHandler>>,
}

impl EventRouter {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a workflow handler under its workflow id.
  pub fn register_target(&mut self, workflow_id: impl Into<String>, handler: Arc<dyn EventHandler>) {
    self.targets.insert(workflow_id.into(), handler);
  }

  /// Register a routing rule.
  ///
  /// # Errors
  /// Returns an error if the rule targets a workflow id with no registered
  /// handler.
  pub fn register_rule(&mut self, rule: Rule) -> Result<(), RouterError> {
    if !self.targets.contains_key(&rule.target) {
      return Err(RouterError::UnknownTarget {
        rule: rule.name,
        target: rule.target,
      });
    }
    self.rules.push(rule);
    Ok(())
  }

  /// Evaluate all rules against an envelope.
  pub fn matches(&self, envelope: &EventEnvelope) -> Vec<&Rule> {
    self.rules.iter().filter(|r| r.matches(envelope)).collect()
  }

  /// Dispatch an envelope to every matching workflow.
  ///
  /// One task is spawned per match; the caller does not observe outcomes.
  pub fn dispatch(&self, envelope: &EventEnvelope, cancel: &CancellationToken) {
    let matched = self.matches(envelope);
    if matched.is_empty() {
      debug!(
        source = %envelope.source,
        detail_type = %envelope.detail_type,
        "no rule matched envelope"
      );
      return;
    }

    info!(
      source = %envelope.source,
      detail_type = %envelope.detail_type,
      matched = matched.len(),
      "dispatching envelope"
    );

    for rule in matched {
      // register_rule guarantees the target exists
      let handler = self.targets[&rule.target].clone();
      let rule_name = rule.name.clone();
      let workflow_id = rule.target.clone();
      let envelope = envelope.clone();
      let cancel = cancel.clone();

      tokio::spawn(async move {
        if let Err(e) = handler.handle(envelope, cancel).await {
          error!(
            rule = %rule_name,
            workflow_id = %workflow_id,
            error = %e,
            "triggered workflow failed"
          );
        }
      });
    }
  }
}
