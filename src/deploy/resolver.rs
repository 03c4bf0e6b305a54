//! Manifest-to-properties resolution.
//!
//! Turns permissive manifest entries into validated [`DeploymentProperties`]
//! using the platform's domain and stack lists as reference data.

use crate::deploy::DeploymentProperties;
use crate::error::{Error, Result};
use crate::manifest::document::{keys, AppEntry, ManifestDocument};
use crate::manifest::memory::parse_memory;
use crate::manifest::routes::resolve_routes;
use crate::platform::{CloudApp, CloudDomain, CloudStack};

/// Resolve one application entry.
pub fn resolve(
    entry: &AppEntry<'_>,
    domains: &[CloudDomain],
    stacks: &[CloudStack],
) -> Result<DeploymentProperties> {
    let app_name = entry
        .string(keys::NAME)
        .ok_or(Error::MissingApplicationName)?;

    let mut props = DeploymentProperties::new(&app_name);

    if let Some(value) = entry.value(keys::MEMORY) {
        props.memory_mb = parse_memory(value)?;
    }
    if let Some(value) = entry.value(keys::DISK_QUOTA) {
        props.disk_mb = parse_memory(value)?;
    }
    if let Some(instances) = entry.integer(keys::INSTANCES) {
        props.instances = instances;
    }

    props.routes = resolve_routes(entry, &app_name, domains);
    props.env_vars = entry.env_map();
    props.bound_services = entry.service_list();
    props.buildpack = entry.string(keys::BUILDPACK);
    props.command = entry.string(keys::COMMAND);
    props.health_check_type = entry.string(keys::HEALTH_CHECK_TYPE);
    props.timeout_seconds = entry.integer(keys::TIMEOUT);
    props.archive = entry.string(keys::PATH).map(Into::into);

    // An unknown stack is dropped rather than failing the whole deployment;
    // the platform will assign its default.
    if let Some(stack) = entry.string(keys::STACK) {
        if stacks.iter().any(|s| s.name == stack) {
            props.stack = Some(stack);
        } else {
            tracing::debug!(app = %app_name, stack = %stack, "dropping unknown stack");
        }
    }

    props.validate()?;
    Ok(props)
}

/// Resolve every application entry in a manifest document.
pub fn resolve_manifest(
    doc: &ManifestDocument,
    domains: &[CloudDomain],
    stacks: &[CloudStack],
) -> Result<Vec<DeploymentProperties>> {
    let shared = doc.shared_defaults();
    doc.application_entries()
        .into_iter()
        .map(|entry| resolve(&AppEntry::new(entry, shared), domains, stacks))
        .collect()
}

/// Recover deployment properties from a live application snapshot.
///
/// The result round-trips through [`ManifestDocument::from_properties`] when
/// reconciling a manifest against what is actually deployed.
pub fn properties_from_app(app: &CloudApp) -> DeploymentProperties {
    let mut props = DeploymentProperties::new(&app.name);
    props.memory_mb = app.memory_mb;
    props.disk_mb = app.disk_mb;
    props.instances = app.instances;
    props.routes = app.uris.clone();
    props.bound_services = app.services.clone();
    props.env_vars = app.env.clone();
    props.buildpack = app.buildpack.clone();
    props.stack = app.stack.clone();
    props
}
