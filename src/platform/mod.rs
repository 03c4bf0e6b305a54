//! The platform client abstraction and its error classification.
//!
//! canopy does not implement the platform's REST protocol. It consumes a
//! [`PlatformClient`] supplied by the embedding application and only decides
//! *what* to call and *how* to react to failures. The error classification
//! here drives those retry/abort decisions: auth failures, bad requests
//! (including the "host taken" case), and not-found responses each get a
//! distinct remediation path.

mod target;
mod types;

pub use target::{find_targets_file, load_targets, CloudTarget, TargetsFile};
pub use types::{CloudApp, CloudDomain, CloudSpace, CloudStack, InstanceStats};

use async_trait::async_trait;
use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

use crate::deploy::DeploymentProperties;

/// Broad category of a platform request failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformErrorKind {
    /// Access token missing, expired or rejected (401/403).
    AccessToken,
    /// The platform rejected the request as invalid (400).
    BadRequest {
        /// True when the rejection is specifically a route host collision.
        host_taken: bool,
    },
    /// The referenced resource does not exist (404).
    NotFound,
    /// Anything else: network failures, 5xx, unclassified causes.
    Other,
}

/// A failure reported by (or on behalf of) the platform client.
#[derive(Debug, Clone, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(canopy::platform::error))]
pub struct PlatformError {
    kind: PlatformErrorKind,
    message: String,
}

impl PlatformError {
    pub fn new(kind: PlatformErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classify a raw platform failure from its HTTP status (when known) and
    /// message text. Classification is best-effort: anything unrecognized
    /// lands in [`PlatformErrorKind::Other`].
    pub fn classify(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();

        let kind = match status {
            Some(401) | Some(403) => PlatformErrorKind::AccessToken,
            Some(404) => PlatformErrorKind::NotFound,
            Some(400) => PlatformErrorKind::BadRequest {
                host_taken: lower.contains("host") && lower.contains("taken"),
            },
            _ => {
                if lower.contains("access token") || lower.contains("unauthorized") {
                    PlatformErrorKind::AccessToken
                } else if lower.contains("not found") {
                    PlatformErrorKind::NotFound
                } else {
                    PlatformErrorKind::Other
                }
            }
        };

        Self { kind, message }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(PlatformErrorKind::NotFound, message)
    }

    pub fn kind(&self) -> PlatformErrorKind {
        self.kind
    }

    pub fn is_auth(&self) -> bool {
        self.kind == PlatformErrorKind::AccessToken
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == PlatformErrorKind::NotFound
    }

    pub fn is_host_taken(&self) -> bool {
        matches!(self.kind, PlatformErrorKind::BadRequest { host_taken: true })
    }
}

pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// The narrow interface canopy requires from a platform client.
///
/// Implementations wrap the real REST/auth machinery; the fake used by the
/// test suite scripts responses instead. All calls are fallible and may
/// return a classified [`PlatformError`].
#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn list_applications(&self) -> PlatformResult<Vec<CloudApp>>;

    /// Fetch one application by name. `Ok(None)` means "does not exist",
    /// which is not an error for callers deciding between create and update.
    async fn get_application(&self, name: &str) -> PlatformResult<Option<CloudApp>>;

    async fn create_application(&self, props: &DeploymentProperties) -> PlatformResult<CloudApp>;

    async fn upload_application(&self, name: &str, archive: &Path) -> PlatformResult<()>;

    async fn start_application(&self, name: &str) -> PlatformResult<()>;

    async fn stop_application(&self, name: &str) -> PlatformResult<()>;

    async fn delete_application(&self, name: &str) -> PlatformResult<()>;

    /// Per-instance status lines for a deployed application.
    async fn get_instances(&self, name: &str) -> PlatformResult<Vec<InstanceStats>>;

    async fn get_domains(&self) -> PlatformResult<Vec<CloudDomain>>;

    async fn get_stacks(&self) -> PlatformResult<Vec<CloudStack>>;

    async fn get_spaces(&self) -> PlatformResult<Vec<CloudSpace>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_auth_by_status() {
        assert!(PlatformError::classify(Some(401), "nope").is_auth());
        assert!(PlatformError::classify(Some(403), "nope").is_auth());
    }

    #[test]
    fn classifies_auth_by_message() {
        assert!(PlatformError::classify(None, "Invalid access token").is_auth());
    }

    #[test]
    fn classifies_host_taken() {
        let err = PlatformError::classify(Some(400), "The host is taken: myapp");
        assert!(err.is_host_taken());

        let err = PlatformError::classify(Some(400), "Invalid buildpack");
        assert!(!err.is_host_taken());
        assert!(matches!(
            err.kind(),
            PlatformErrorKind::BadRequest { host_taken: false }
        ));
    }

    #[test]
    fn classifies_not_found() {
        assert!(PlatformError::classify(Some(404), "gone").is_not_found());
        assert!(PlatformError::classify(None, "app not found").is_not_found());
    }

    #[test]
    fn unknown_causes_are_other() {
        let err = PlatformError::classify(Some(502), "bad gateway");
        assert_eq!(err.kind(), PlatformErrorKind::Other);
    }
}
