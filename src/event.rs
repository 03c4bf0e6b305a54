//! Model change events and operator-facing console output.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::runstate::RunState;

/// What changed in the deployment model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    RunStateChanged { app: String, run_state: RunState },
    PropertiesChanged { app: String },
    Removed { app: String },
}

/// A model event with the time it was observed.
#[derive(Debug, Clone)]
pub struct ModelChange {
    pub event: ModelEvent,
    pub at: DateTime<Utc>,
}

/// Sink for per-application progress lines shown to the operator.
///
/// Deployment operations narrate what they do through this trait so that an
/// embedding UI can route lines to the right application's console. The
/// default [`LogConsole`] forwards everything to the tracing subscriber.
pub trait ConsoleSink: Send + Sync {
    fn info(&self, app: &str, line: &str);
    fn warn(&self, app: &str, line: &str);
    fn error(&self, app: &str, line: &str);
}

/// Console sink backed by the tracing subscriber.
#[derive(Debug, Default, Clone)]
pub struct LogConsole;

impl ConsoleSink for LogConsole {
    fn info(&self, app: &str, line: &str) {
        tracing::info!(app = %app, "{}", line);
    }

    fn warn(&self, app: &str, line: &str) {
        tracing::warn!(app = %app, "{}", line);
    }

    fn error(&self, app: &str, line: &str) {
        tracing::error!(app = %app, "{}", line);
    }
}

/// Broadcast fan-out of model changes to any number of subscribers.
///
/// Publishing never fails; with no subscribers the event is dropped.
#[derive(Debug, Clone)]
pub struct ModelNotifier {
    tx: broadcast::Sender<ModelChange>,
}

impl ModelNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ModelChange> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: ModelEvent) {
        let change = ModelChange {
            event,
            at: Utc::now(),
        };
        let _ = self.tx.send(change);
    }
}

impl Default for ModelNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}
