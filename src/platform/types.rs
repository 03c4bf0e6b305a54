//! Platform-supplied reference data and application snapshots.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A shared or private domain registered on the platform.
///
/// Used as a validation/lookup table during route resolution; canopy never
/// creates or deletes domains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudDomain {
    pub name: String,
}

impl CloudDomain {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A root filesystem stack offered by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudStack {
    pub name: String,
}

impl CloudStack {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// An org/space pair an authenticated user can deploy into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudSpace {
    pub name: String,
    pub org: String,
}

/// Live snapshot of a deployed application as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudApp {
    pub name: String,
    pub guid: String,
    pub instances: i64,
    pub running_instances: i64,
    pub memory_mb: i64,
    pub disk_mb: i64,
    pub uris: Vec<String>,
    pub services: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub buildpack: Option<String>,
    pub stack: Option<String>,
    /// Platform lifecycle state string (`STARTED` / `STOPPED`).
    pub state: String,
}

/// Raw per-instance status line from the platform's instance statistics.
///
/// The `state` string is mapped onto [`crate::runstate::RunState`] by a fixed
/// table; unknown values degrade to `Unknown` rather than failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceStats {
    pub index: u32,
    pub state: String,
}

impl InstanceStats {
    pub fn new(index: u32, state: impl Into<String>) -> Self {
        Self {
            index,
            state: state.into(),
        }
    }
}
