//! Cached snapshots of deployed applications.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::platform::CloudApp;
use crate::runstate::RunState;

/// One application's last observed platform state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSnapshot {
    pub app: CloudApp,
    pub run_state: RunState,
    /// Local project associated with the application, when known.
    pub project: Option<String>,
    pub updated_at: DateTime<Utc>,
}

type SnapshotMap = Arc<RwLock<HashMap<String, AppSnapshot>>>;

/// Keyed by application name; shared between the orchestrator and readers.
#[derive(Debug, Clone, Default)]
pub struct AppCacheStore {
    inner: SnapshotMap,
}

impl AppCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, app_name: &str) -> Option<AppSnapshot> {
        self.inner.read().await.get(app_name).cloned()
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Insert or update one snapshot, keeping an existing project association
    /// when the caller does not supply one.
    pub async fn update(&self, app: CloudApp, run_state: RunState, project: Option<String>) {
        let mut map = self.inner.write().await;
        let project = project.or_else(|| {
            map.get(&app.name).and_then(|existing| existing.project.clone())
        });
        map.insert(
            app.name.clone(),
            AppSnapshot {
                app,
                run_state,
                project,
                updated_at: Utc::now(),
            },
        );
    }

    /// Update just the run state. Returns false when the app is not cached.
    pub async fn update_run_state(&self, app_name: &str, run_state: RunState) -> bool {
        let mut map = self.inner.write().await;
        match map.get_mut(app_name) {
            Some(snapshot) => {
                snapshot.run_state = run_state;
                snapshot.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub async fn remove(&self, app_name: &str) -> Option<AppSnapshot> {
        self.inner.write().await.remove(app_name)
    }

    /// Replace the whole cache with a fresh platform listing.
    ///
    /// Returns the names whose entries were added, removed, or materially
    /// changed, so callers can notify only about real differences. Project
    /// associations survive the replacement.
    pub async fn replace_all(&self, snapshots: Vec<(CloudApp, RunState)>) -> Vec<String> {
        let mut map = self.inner.write().await;
        let mut changed = Vec::new();
        let now = Utc::now();

        let mut fresh: HashMap<String, AppSnapshot> = HashMap::with_capacity(snapshots.len());
        for (app, run_state) in snapshots {
            let name = app.name.clone();
            let project = map.get(&name).and_then(|old| old.project.clone());
            match map.get(&name) {
                Some(old) if old.app == app && old.run_state == run_state => {}
                _ => changed.push(name.clone()),
            }
            fresh.insert(
                name,
                AppSnapshot {
                    app,
                    run_state,
                    project,
                    updated_at: now,
                },
            );
        }

        for name in map.keys() {
            if !fresh.contains_key(name) {
                changed.push(name.clone());
            }
        }

        *map = fresh;
        changed.sort();
        changed
    }
}
