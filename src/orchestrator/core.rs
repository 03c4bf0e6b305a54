//! Orchestrator state and configuration.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::event::{ConsoleSink, LogConsole, ModelChange, ModelNotifier};
use crate::orchestrator::cache::AppCacheStore;
use crate::platform::{CloudTarget, PlatformClient, PlatformError};
use crate::scheduler::OperationScheduler;

pub(crate) const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(120);
pub(crate) const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Interactive decisions a deployment may need mid-flight.
///
/// An embedding UI implements this to prompt the operator; unattended runs
/// use [`AutoConfirm`].
#[async_trait]
pub trait DeployDecisions: Send + Sync {
    /// The application already exists; may the push overwrite it?
    async fn confirm_overwrite(&self, app: &str) -> bool;

    /// One application in a batch failed; should the rest proceed?
    async fn continue_after_failure(&self, app: &str, error: &Error) -> bool;
}

/// Answers yes to everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoConfirm;

#[async_trait]
impl DeployDecisions for AutoConfirm {
    async fn confirm_overwrite(&self, _app: &str) -> bool {
        true
    }

    async fn continue_after_failure(&self, _app: &str, _error: &Error) -> bool {
        true
    }
}

/// Drives deployment operations against one target.
///
/// All operations acquire a scheduling rule before touching the platform and
/// publish model changes through the notifier as they complete.
pub struct DeploymentOrchestrator {
    pub(crate) target: CloudTarget,
    pub(crate) client: Arc<dyn PlatformClient>,
    pub(crate) scheduler: Arc<OperationScheduler>,
    pub(crate) cache: AppCacheStore,
    pub(crate) notifier: ModelNotifier,
    pub(crate) console: Arc<dyn ConsoleSink>,
    cancellation: Mutex<CancellationToken>,
    pub(crate) start_timeout: Duration,
    pub(crate) poll_interval: Duration,
}

impl DeploymentOrchestrator {
    pub fn new(target: CloudTarget, client: Arc<dyn PlatformClient>) -> Self {
        Self {
            target,
            client,
            scheduler: Arc::new(OperationScheduler::new()),
            cache: AppCacheStore::new(),
            notifier: ModelNotifier::default(),
            console: Arc::new(LogConsole),
            cancellation: Mutex::new(CancellationToken::new()),
            start_timeout: DEFAULT_START_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_console(mut self, console: Arc<dyn ConsoleSink>) -> Self {
        self.console = console;
        self
    }

    pub fn with_start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn target(&self) -> &CloudTarget {
        &self.target
    }

    pub fn cache(&self) -> &AppCacheStore {
        &self.cache
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ModelChange> {
        self.notifier.subscribe()
    }

    fn token_slot(&self) -> MutexGuard<'_, CancellationToken> {
        self.cancellation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancel every operation currently in flight. Operations started after
    /// this call run normally.
    pub fn cancel_operations(&self) {
        let mut slot = self.token_slot();
        slot.cancel();
        *slot = CancellationToken::new();
        tracing::info!(target = %self.target.id, "cancelled in-flight operations");
    }

    /// Token an individual operation should observe.
    pub(crate) fn operation_token(&self) -> CancellationToken {
        self.token_slot().child_token()
    }

    pub(crate) fn ensure_not_cancelled(
        &self,
        token: &CancellationToken,
        app: &str,
    ) -> Result<()> {
        if token.is_cancelled() {
            return Err(Error::Cancelled(app.to_string()));
        }
        Ok(())
    }

    /// Map a platform failure, letting a concurrent cancellation supersede
    /// whatever error the interrupted request produced.
    pub(crate) fn map_platform(
        &self,
        token: &CancellationToken,
        app: &str,
        err: PlatformError,
    ) -> Error {
        if token.is_cancelled() {
            Error::Cancelled(app.to_string())
        } else {
            Error::Platform(err)
        }
    }
}
