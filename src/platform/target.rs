//! Deployment target descriptors.
//!
//! A target identifies one platform endpoint plus the org/space to deploy
//! into. Targets are declared in a `canopy-targets.yaml` file which is looked
//! up from the working directory upwards, the same way the deployment
//! manifest itself is discovered.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// One platform endpoint and the org/space canopy deploys into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudTarget {
    /// Stable identifier used to key scheduling rules and caches.
    pub id: String,
    pub api_url: String,
    pub org: String,
    pub space: String,
}

impl CloudTarget {
    pub fn new(
        id: impl Into<String>,
        api_url: impl Into<String>,
        org: impl Into<String>,
        space: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            api_url: api_url.into(),
            org: org.into(),
            space: space.into(),
        }
    }
}

/// Root structure of `canopy-targets.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetsFile {
    #[serde(default)]
    pub targets: Vec<CloudTarget>,
}

/// Find a targets file starting from `dir`, walking up parent directories.
pub fn find_targets_file(dir: &Path) -> Result<PathBuf> {
    let path = dir.join("canopy-targets.yaml");
    if path.exists() {
        return Ok(path);
    }

    // Try alternate extension
    let alt = dir.join("canopy-targets.yml");
    if alt.exists() {
        return Ok(alt);
    }

    if let Some(parent) = dir.parent() {
        return find_targets_file(parent);
    }

    Err(Error::Manifest(
        "Could not find canopy-targets.yaml in current directory or any parent".to_string(),
    ))
}

/// Load and parse a targets file.
pub fn load_targets<P: AsRef<Path>>(path: P) -> Result<Vec<CloudTarget>> {
    let content = fs::read_to_string(path.as_ref()).map_err(|e| {
        Error::Manifest(format!(
            "Failed to read targets file '{}': {}",
            path.as_ref().display(),
            e
        ))
    })?;

    let file: TargetsFile = serde_yaml::from_str(&content)?;
    Ok(file.targets)
}
