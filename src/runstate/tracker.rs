//! Polling tracker for application start-up.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::event::ConsoleSink;
use crate::platform::PlatformClient;
use crate::runstate::RunState;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Polls instance states until the application reaches a terminal run state,
/// the timeout expires, or the operation is cancelled.
pub struct RunStateTracker {
    client: Arc<dyn PlatformClient>,
    console: Arc<dyn ConsoleSink>,
    poll_interval: Duration,
}

impl RunStateTracker {
    pub fn new(client: Arc<dyn PlatformClient>, console: Arc<dyn ConsoleSink>) -> Self {
        Self {
            client,
            console,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Fetch the current aggregated run state once.
    ///
    /// An application that no longer exists surfaces as
    /// [`Error::ApplicationVanished`], distinct from transient fetch errors.
    pub async fn fetch_state(&self, app_name: &str) -> Result<RunState> {
        let app = self
            .client
            .get_application(app_name)
            .await
            .map_err(|e| vanished_or(app_name, e))?;
        if app.is_none() {
            return Err(Error::ApplicationVanished(app_name.to_string()));
        }

        let instances = self
            .client
            .get_instances(app_name)
            .await
            .map_err(|e| vanished_or(app_name, e))?;

        Ok(RunState::aggregate(
            instances
                .iter()
                .map(|i| RunState::from_instance_state(&i.state)),
        ))
    }

    /// Track the application until it settles.
    ///
    /// Cancellation takes precedence over any error raised by a poll that was
    /// in flight when the token fired.
    pub async fn track(
        &self,
        app_name: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<RunState> {
        let started = Instant::now();
        tracing::debug!(app = %app_name, ?timeout, "tracking run state");

        let mut state = self.poll(app_name, cancel).await?;
        while !state.is_terminal() && started.elapsed() < timeout {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(Error::Cancelled(app_name.to_string()));
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
            state = self.poll(app_name, cancel).await?;
        }

        if !state.is_terminal() {
            let elapsed_secs = started.elapsed().as_secs();
            self.console.warn(
                app_name,
                &format!("did not reach a stable state within {}s", elapsed_secs),
            );
            return Err(Error::StartTimeout {
                app: app_name.to_string(),
                elapsed_secs,
            });
        }

        self.console
            .info(app_name, &format!("application is {}", state));
        Ok(state)
    }

    async fn poll(&self, app_name: &str, cancel: &CancellationToken) -> Result<RunState> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled(app_name.to_string()));
        }
        match self.fetch_state(app_name).await {
            Ok(state) => Ok(state),
            Err(_) if cancel.is_cancelled() => Err(Error::Cancelled(app_name.to_string())),
            Err(e) => Err(e),
        }
    }
}

fn vanished_or(app_name: &str, err: crate::platform::PlatformError) -> Error {
    if err.is_not_found() {
        Error::ApplicationVanished(app_name.to_string())
    } else {
        Error::Platform(err)
    }
}
