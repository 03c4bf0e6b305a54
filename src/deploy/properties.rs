//! Resolved deployment properties.
//!
//! This is the flat, fully-defaulted description of one application that the
//! orchestrator acts on. Everything manifest-shaped (two-level defaults,
//! host/domain directives, memory suffixes) has already been folded away by
//! the resolver.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{Error, Result};

pub const DEFAULT_MEMORY_MB: i64 = 1024;
pub const DEFAULT_DISK_MB: i64 = 1024;
pub const DEFAULT_INSTANCES: i64 = 1;

/// Everything needed to create or update one application on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentProperties {
    pub app_name: String,
    pub memory_mb: i64,
    pub disk_mb: i64,
    pub instances: i64,
    /// Final route URIs, already resolved against the platform's domains.
    pub routes: Vec<String>,
    pub bound_services: Vec<String>,
    pub env_vars: BTreeMap<String, String>,
    pub buildpack: Option<String>,
    pub stack: Option<String>,
    pub command: Option<String>,
    pub health_check_type: Option<String>,
    pub timeout_seconds: Option<i64>,
    /// Application archive to upload; absent for metadata-only pushes.
    pub archive: Option<PathBuf>,
}

impl DeploymentProperties {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            memory_mb: DEFAULT_MEMORY_MB,
            disk_mb: DEFAULT_DISK_MB,
            instances: DEFAULT_INSTANCES,
            routes: Vec::new(),
            bound_services: Vec::new(),
            env_vars: BTreeMap::new(),
            buildpack: None,
            stack: None,
            command: None,
            health_check_type: None,
            timeout_seconds: None,
            archive: None,
        }
    }

    /// Validate the invariants the platform would reject anyway.
    pub fn validate(&self) -> Result<()> {
        if self.app_name.trim().is_empty() {
            return Err(Error::Validation("application name must not be empty".into()));
        }
        if self.memory_mb <= 0 {
            return Err(Error::Validation(format!(
                "memory for '{}' must be positive, got {}",
                self.app_name, self.memory_mb
            )));
        }
        if self.instances < 1 {
            return Err(Error::Validation(format!(
                "instance count for '{}' must be at least 1, got {}",
                self.app_name, self.instances
            )));
        }
        Ok(())
    }

    /// Overlay these properties onto `target`.
    ///
    /// Scalars replace; routes are unioned preserving the target's order
    /// first. Used when manifest-derived properties are layered over values
    /// recovered from a live application.
    pub fn merge_into(&self, target: &mut DeploymentProperties) {
        target.app_name = self.app_name.clone();
        target.memory_mb = self.memory_mb;
        target.disk_mb = self.disk_mb;
        target.instances = self.instances;
        for route in &self.routes {
            if !target.routes.contains(route) {
                target.routes.push(route.clone());
            }
        }
        target.bound_services = self.bound_services.clone();
        target.env_vars = self.env_vars.clone();
        target.buildpack = self.buildpack.clone();
        target.stack = self.stack.clone();
        target.command = self.command.clone();
        target.health_check_type = self.health_check_type.clone();
        target.timeout_seconds = self.timeout_seconds;
        if self.archive.is_some() {
            target.archive = self.archive.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_platform_defaults() {
        let props = DeploymentProperties::new("app");
        assert_eq!(props.memory_mb, 1024);
        assert_eq!(props.disk_mb, 1024);
        assert_eq!(props.instances, 1);
        assert!(props.validate().is_ok());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut props = DeploymentProperties::new("  ");
        assert!(matches!(props.validate(), Err(Error::Validation(_))));

        props.app_name = "app".into();
        props.memory_mb = 0;
        assert!(matches!(props.validate(), Err(Error::Validation(_))));

        props.memory_mb = 512;
        props.instances = 0;
        assert!(matches!(props.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn merge_unions_routes_in_order() {
        let mut live = DeploymentProperties::new("app");
        live.routes = vec!["a.x.io".to_string(), "b.x.io".to_string()];

        let mut incoming = DeploymentProperties::new("app");
        incoming.routes = vec!["b.x.io".to_string(), "c.x.io".to_string()];
        incoming.memory_mb = 2048;

        incoming.merge_into(&mut live);
        assert_eq!(live.routes, vec!["a.x.io", "b.x.io", "c.x.io"]);
        assert_eq!(live.memory_mb, 2048);
    }

    #[test]
    fn merge_keeps_existing_archive_when_incoming_has_none() {
        let mut live = DeploymentProperties::new("app");
        live.archive = Some(PathBuf::from("/tmp/app.jar"));

        let incoming = DeploymentProperties::new("app");
        incoming.merge_into(&mut live);
        assert_eq!(live.archive, Some(PathBuf::from("/tmp/app.jar")));
    }
}
