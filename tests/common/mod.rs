//! Shared fake platform client for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

use canopy::deploy::DeploymentProperties;
use canopy::platform::{
    CloudApp, CloudDomain, CloudSpace, CloudStack, InstanceStats, PlatformClient, PlatformError,
    PlatformResult,
};

#[derive(Default)]
struct State {
    apps: HashMap<String, CloudApp>,
    /// Scripted instance snapshots per app; the last entry repeats.
    instances: HashMap<String, VecDeque<Vec<InstanceStats>>>,
    domains: Vec<CloudDomain>,
    stacks: Vec<CloudStack>,
    log: Vec<String>,
    upload_error: Option<PlatformError>,
}

/// In-memory platform used by the integration tests. Every mutation is
/// recorded in an operation log so tests can assert on call order.
#[derive(Default)]
pub struct FakePlatform {
    state: Mutex<State>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_domains(self, names: &[&str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.domains = names.iter().map(|n| CloudDomain::new(*n)).collect();
        }
        self
    }

    pub fn with_stacks(self, names: &[&str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.stacks = names.iter().map(|n| CloudStack::new(*n)).collect();
        }
        self
    }

    pub fn seed_app(&self, app: CloudApp) {
        self.state.lock().unwrap().apps.insert(app.name.clone(), app);
    }

    /// Script the instance snapshots served for an app, in order; the final
    /// snapshot keeps being served once the script runs out.
    pub fn script_instances(&self, app: &str, snapshots: Vec<Vec<InstanceStats>>) {
        self.state
            .lock()
            .unwrap()
            .instances
            .insert(app.to_string(), snapshots.into());
    }

    pub fn fail_uploads_with(&self, err: PlatformError) {
        self.state.lock().unwrap().upload_error = Some(err);
    }

    pub fn log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn has_app(&self, name: &str) -> bool {
        self.state.lock().unwrap().apps.contains_key(name)
    }

    pub fn app(name: &str) -> CloudApp {
        CloudApp {
            name: name.to_string(),
            guid: format!("guid-{}", name),
            instances: 1,
            running_instances: 1,
            memory_mb: 1024,
            disk_mb: 1024,
            uris: Vec::new(),
            services: Vec::new(),
            env: Default::default(),
            buildpack: None,
            stack: None,
            state: "STARTED".to_string(),
        }
    }

    fn record(&self, line: String) {
        self.state.lock().unwrap().log.push(line);
    }
}

#[async_trait]
impl PlatformClient for FakePlatform {
    async fn list_applications(&self) -> PlatformResult<Vec<CloudApp>> {
        let state = self.state.lock().unwrap();
        let mut apps: Vec<CloudApp> = state.apps.values().cloned().collect();
        apps.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(apps)
    }

    async fn get_application(&self, name: &str) -> PlatformResult<Option<CloudApp>> {
        Ok(self.state.lock().unwrap().apps.get(name).cloned())
    }

    async fn create_application(&self, props: &DeploymentProperties) -> PlatformResult<CloudApp> {
        self.record(format!("create {}", props.app_name));
        let mut app = Self::app(&props.app_name);
        app.memory_mb = props.memory_mb;
        app.disk_mb = props.disk_mb;
        app.instances = props.instances;
        app.uris = props.routes.clone();
        app.services = props.bound_services.clone();
        app.env = props.env_vars.clone();
        app.buildpack = props.buildpack.clone();
        app.stack = props.stack.clone();
        app.state = "STOPPED".to_string();
        self.state
            .lock()
            .unwrap()
            .apps
            .insert(app.name.clone(), app.clone());
        Ok(app)
    }

    async fn upload_application(&self, name: &str, archive: &Path) -> PlatformResult<()> {
        self.record(format!("upload {} {}", name, archive.display()));
        let err = self.state.lock().unwrap().upload_error.clone();
        match err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn start_application(&self, name: &str) -> PlatformResult<()> {
        self.record(format!("start {}", name));
        let mut state = self.state.lock().unwrap();
        match state.apps.get_mut(name) {
            Some(app) => {
                app.state = "STARTED".to_string();
                Ok(())
            }
            None => Err(PlatformError::not_found(format!("no such app: {}", name))),
        }
    }

    async fn stop_application(&self, name: &str) -> PlatformResult<()> {
        self.record(format!("stop {}", name));
        let mut state = self.state.lock().unwrap();
        match state.apps.get_mut(name) {
            Some(app) => {
                app.state = "STOPPED".to_string();
                Ok(())
            }
            None => Err(PlatformError::not_found(format!("no such app: {}", name))),
        }
    }

    async fn delete_application(&self, name: &str) -> PlatformResult<()> {
        self.record(format!("delete {}", name));
        let mut state = self.state.lock().unwrap();
        match state.apps.remove(name) {
            Some(_) => Ok(()),
            None => Err(PlatformError::not_found(format!("no such app: {}", name))),
        }
    }

    async fn get_instances(&self, name: &str) -> PlatformResult<Vec<InstanceStats>> {
        let mut state = self.state.lock().unwrap();
        if !state.apps.contains_key(name) {
            return Err(PlatformError::not_found(format!("no such app: {}", name)));
        }
        let script = state.instances.entry(name.to_string()).or_default();
        if script.len() > 1 {
            Ok(script.pop_front().unwrap_or_default())
        } else {
            Ok(script.front().cloned().unwrap_or_default())
        }
    }

    async fn get_domains(&self) -> PlatformResult<Vec<CloudDomain>> {
        Ok(self.state.lock().unwrap().domains.clone())
    }

    async fn get_stacks(&self) -> PlatformResult<Vec<CloudStack>> {
        Ok(self.state.lock().unwrap().stacks.clone())
    }

    async fn get_spaces(&self) -> PlatformResult<Vec<CloudSpace>> {
        Ok(Vec::new())
    }
}
