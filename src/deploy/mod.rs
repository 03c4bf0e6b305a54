//! Deployment property model and manifest resolution.

mod properties;
mod resolver;

pub use properties::{
    DeploymentProperties, DEFAULT_DISK_MB, DEFAULT_INSTANCES, DEFAULT_MEMORY_MB,
};
pub use resolver::{properties_from_app, resolve, resolve_manifest};
