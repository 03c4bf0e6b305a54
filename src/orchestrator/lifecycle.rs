//! Deployment operations.
//!
//! Each public operation acquires its scheduling rule, performs the platform
//! calls, updates the snapshot cache, and publishes the resulting model
//! change. Cancellation is checked at operation boundaries and takes
//! precedence over errors raised by requests it interrupts.

use crate::deploy::DeploymentProperties;
use crate::error::{Error, Result};
use crate::event::ModelEvent;
use crate::orchestrator::core::{DeployDecisions, DeploymentOrchestrator};
use crate::platform::CloudApp;
use crate::runstate::{RunState, RunStateTracker};
use crate::scheduler::{OpKind, SchedulingRule};
use tokio_util::sync::CancellationToken;

impl DeploymentOrchestrator {
    /// Create or update one application from resolved properties, returning
    /// the application as observed on the platform afterwards.
    ///
    /// The archive upload is not transactional: when it fails, the created
    /// or updated application remains on the platform and a retry will take
    /// the overwrite path.
    pub async fn push(
        &self,
        props: &DeploymentProperties,
        project: Option<String>,
        decisions: &dyn DeployDecisions,
    ) -> Result<CloudApp> {
        props.validate()?;
        let app_name = props.app_name.clone();
        let rule = self.push_rule(&app_name);
        let _permit = self.scheduler.acquire(rule).await;
        let token = self.operation_token();
        self.ensure_not_cancelled(&token, &app_name)?;

        tracing::info!(app = %app_name, target = %self.target.id, "pushing application");

        let existing = self
            .client
            .get_application(&app_name)
            .await
            .map_err(|e| self.map_platform(&token, &app_name, e))?;

        match existing {
            Some(_) => {
                if !decisions.confirm_overwrite(&app_name).await {
                    self.console.info(&app_name, "push declined by operator");
                    return Err(Error::Cancelled(app_name));
                }
                self.console.info(&app_name, "updating existing application");
            }
            None => {
                self.console.info(&app_name, "creating application");
                self.client
                    .create_application(props)
                    .await
                    .map_err(|e| self.map_platform(&token, &app_name, e))?;
            }
        }

        if let Some(archive) = &props.archive {
            self.ensure_not_cancelled(&token, &app_name)?;
            self.console
                .info(&app_name, &format!("uploading {}", archive.display()));
            self.client
                .upload_application(&app_name, archive)
                .await
                .map_err(|e| self.map_platform(&token, &app_name, e))?;
        }

        let (app, run_state) = self.observe(&token, &app_name).await?;
        self.cache.update(app.clone(), run_state, project).await;
        self.notifier
            .publish(ModelEvent::PropertiesChanged { app: app_name });
        Ok(app)
    }

    /// Push, then start and track the application.
    pub async fn push_and_start(
        &self,
        props: &DeploymentProperties,
        project: Option<String>,
        decisions: &dyn DeployDecisions,
    ) -> Result<RunState> {
        self.push(props, project, decisions).await?;
        self.start(&props.app_name).await
    }

    /// Push a batch of applications.
    ///
    /// A cancellation aborts the whole batch. Any other failure is reported
    /// to the console and the decision callback chooses whether the
    /// remaining applications still deploy.
    pub async fn push_all(
        &self,
        batch: &[(Option<String>, DeploymentProperties)],
        decisions: &dyn DeployDecisions,
    ) -> Result<()> {
        for (project, props) in batch {
            match self.push(props, project.clone(), decisions).await {
                Ok(_) => {}
                Err(err) if err.is_cancellation() => return Err(err),
                Err(err) => {
                    self.console
                        .error(&props.app_name, &format!("push failed: {}", err));
                    if !decisions.continue_after_failure(&props.app_name, &err).await {
                        return Err(err);
                    }
                }
            }
        }
        Ok(())
    }

    /// Start the application and track it to a terminal run state.
    pub async fn start(&self, app_name: &str) -> Result<RunState> {
        let rule = SchedulingRule::app(&self.target.id, app_name, OpKind::Start);
        let _permit = self.scheduler.acquire(rule).await;
        let token = self.operation_token();
        self.ensure_not_cancelled(&token, app_name)?;
        self.start_inner(&token, app_name).await
    }

    /// Stop the application.
    pub async fn stop(&self, app_name: &str) -> Result<()> {
        let rule = SchedulingRule::app(&self.target.id, app_name, OpKind::Stop);
        let _permit = self.scheduler.acquire(rule).await;
        let token = self.operation_token();
        self.ensure_not_cancelled(&token, app_name)?;
        self.stop_inner(&token, app_name).await
    }

    /// Stop then start under a single scheduling rule, so no other operation
    /// on the application can interleave between the two phases.
    pub async fn restart(&self, app_name: &str) -> Result<RunState> {
        let rule = SchedulingRule::app(&self.target.id, app_name, OpKind::Restart);
        let _permit = self.scheduler.acquire(rule).await;
        let token = self.operation_token();
        self.ensure_not_cancelled(&token, app_name)?;

        self.stop_inner(&token, app_name).await?;
        self.start_inner(&token, app_name).await
    }

    /// Delete the application and drop it from the model.
    pub async fn delete(&self, app_name: &str) -> Result<()> {
        let rule = SchedulingRule::app(&self.target.id, app_name, OpKind::Delete);
        let _permit = self.scheduler.acquire(rule).await;
        let token = self.operation_token();
        self.ensure_not_cancelled(&token, app_name)?;

        tracing::info!(app = %app_name, target = %self.target.id, "deleting application");
        self.client
            .delete_application(app_name)
            .await
            .map_err(|e| self.map_platform(&token, app_name, e))?;

        self.cache.remove(app_name).await;
        self.notifier.publish(ModelEvent::Removed {
            app: app_name.to_string(),
        });
        Ok(())
    }

    /// Re-list every application on the target and replace the cached model.
    ///
    /// Returns the names whose snapshots actually changed; a change event is
    /// published for each.
    pub async fn refresh(&self) -> Result<Vec<String>> {
        let rule = SchedulingRule::refresh(&self.target.id);
        let _permit = self.scheduler.acquire(rule).await;
        let token = self.operation_token();
        self.ensure_not_cancelled(&token, "")?;

        tracing::debug!(target = %self.target.id, "refreshing application model");
        let apps = self
            .client
            .list_applications()
            .await
            .map_err(|e| self.map_platform(&token, "", e))?;

        let mut snapshots = Vec::with_capacity(apps.len());
        for app in apps {
            let run_state = match self.client.get_instances(&app.name).await {
                Ok(instances) => RunState::aggregate(
                    instances
                        .iter()
                        .map(|i| RunState::from_instance_state(&i.state)),
                ),
                // the app can disappear between the listing and this call
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(self.map_platform(&token, &app.name, e)),
            };
            snapshots.push((app, run_state));
        }

        let changed = self.cache.replace_all(snapshots).await;
        for app in &changed {
            self.notifier
                .publish(ModelEvent::PropertiesChanged { app: app.clone() });
        }
        Ok(changed)
    }

    fn push_rule(&self, app_name: &str) -> SchedulingRule {
        SchedulingRule::app(&self.target.id, app_name, OpKind::Push)
    }

    async fn start_inner(
        &self,
        token: &CancellationToken,
        app_name: &str,
    ) -> Result<RunState> {
        tracing::info!(app = %app_name, target = %self.target.id, "starting application");
        self.console.info(app_name, "starting");
        self.client
            .start_application(app_name)
            .await
            .map_err(|e| self.map_platform(token, app_name, e))?;

        let tracker = RunStateTracker::new(self.client.clone(), self.console.clone())
            .with_poll_interval(self.poll_interval);

        let run_state = match tracker.track(app_name, self.start_timeout, token).await {
            Ok(state) => state,
            // a concurrent delete removed the app; treat it as this
            // operation having been superseded, not as a failure
            Err(Error::ApplicationVanished(_)) => {
                return Err(Error::Cancelled(app_name.to_string()))
            }
            Err(err) => return Err(err),
        };

        self.cache.update_run_state(app_name, run_state).await;
        self.notifier.publish(ModelEvent::RunStateChanged {
            app: app_name.to_string(),
            run_state,
        });
        Ok(run_state)
    }

    async fn stop_inner(&self, token: &CancellationToken, app_name: &str) -> Result<()> {
        tracing::info!(app = %app_name, target = %self.target.id, "stopping application");
        self.console.info(app_name, "stopping");
        self.client
            .stop_application(app_name)
            .await
            .map_err(|e| self.map_platform(token, app_name, e))?;

        let (app, run_state) = self.observe(token, app_name).await?;
        self.cache.update(app, run_state, None).await;
        self.notifier.publish(ModelEvent::RunStateChanged {
            app: app_name.to_string(),
            run_state,
        });
        Ok(())
    }

    /// Fetch the application and its aggregated run state after a mutation.
    async fn observe(
        &self,
        token: &CancellationToken,
        app_name: &str,
    ) -> Result<(CloudApp, RunState)> {
        let app = self
            .client
            .get_application(app_name)
            .await
            .map_err(|e| self.map_platform(token, app_name, e))?
            .ok_or_else(|| Error::ApplicationVanished(app_name.to_string()))?;

        let run_state = match self.client.get_instances(app_name).await {
            Ok(instances) => RunState::aggregate(
                instances
                    .iter()
                    .map(|i| RunState::from_instance_state(&i.state)),
            ),
            Err(e) if e.is_not_found() => RunState::Unknown,
            Err(e) => return Err(self.map_platform(token, app_name, e)),
        };
        Ok((app, run_state))
    }
}
