use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::envelope::EventEnvelope;
use crate::router::EventRouter;

/// A cloneable publish handle for the in-process event bus.
///
/// Workflows chain through published events, not direct calls, so every
/// component that publishes takes one of these as an explicit dependency.
#[derive(Debug, Clone)]
pub struct EventBus {
  // NOTE: unbounded so publishing never blocks a running workflow step. The
  // event volume is a handful per review, so buffering is not a concern.
  sender: mpsc::UnboundedSender<EventEnvelope>,
}

impl EventBus {
  /// Publish an envelope. Fire-and-forget: the publisher does not observe
  /// the outcome of any workflow the envelope triggers.
  pub fn publish(&self, envelope: EventEnvelope) {
    if self.sender.send(envelope).is_err() {
      // Receiver dropped; the dispatcher has shut down.
      warn!("event bus dispatcher is gone; envelope discarded");
    }
  }
}

/// Create a connected bus handle and receiver pair.
pub fn event_channel() -> (EventBus, mpsc::UnboundedReceiver<EventEnvelope>) {
  let (sender, receiver) = mpsc::unbounded_channel();
  (EventBus { sender }, receiver)
}

/// Drain the bus into the router until cancelled or all senders are dropped.
pub async fn run_dispatcher(
  router: Arc<EventRouter>,
  mut receiver: mpsc::UnboundedReceiver<EventEnvelope>,
  cancel: CancellationToken,
) {
  loop {
    tokio::select! {
      _ = cancel.cancelled() => {
        info!("event dispatcher cancelled");
        break;
      }
      envelope = receiver.recv() => {
        match envelope {
          Some(envelope) => router.dispatch(&envelope, &cancel),
          None => {
            info!("event bus closed; dispatcher stopping");
            break;
          }
        }
      }
    }
  }
}
