use miette::Diagnostic;
use std::io;
use thiserror::Error;

use crate::platform::PlatformError;

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("Malformed manifest: {0}")]
    #[diagnostic(
        code(canopy::manifest::malformed),
        help("The manifest must be a YAML mapping; `applications` (when present) must be a list of application entries")
    )]
    MalformedManifest(String),

    #[error("Invalid memory value '{0}'")]
    #[diagnostic(
        code(canopy::manifest::invalid_memory),
        help("Use an integer number of megabytes, or a number followed by M/MB/G/GB (e.g. `512M`, `2G`)")
    )]
    InvalidMemorySpec(String),

    #[error("Application entry has no name")]
    #[diagnostic(
        code(canopy::manifest::missing_name),
        help("Every application entry needs a `name` key (or a shared top-level `name`)")
    )]
    MissingApplicationName,

    #[error("Manifest error: {0}")]
    #[diagnostic(code(canopy::manifest::error))]
    Manifest(String),

    #[error("Merge failed: {0}")]
    #[diagnostic(
        code(canopy::reconcile::merge),
        help("The local manifest could not be structurally merged; the full document will be replaced instead")
    )]
    Merge(String),

    #[error("Application '{0}' no longer exists on the platform")]
    #[diagnostic(
        code(canopy::runstate::vanished),
        help("The application was deleted while an operation was in flight. Refresh the target to update the view")
    )]
    ApplicationVanished(String),

    #[error("Application '{app}' did not start within {elapsed_secs} seconds")]
    #[diagnostic(
        code(canopy::runstate::start_timeout),
        help("The application may still be staging. Check its logs on the platform, or increase the start timeout")
    )]
    StartTimeout { app: String, elapsed_secs: u64 },

    #[error("Operation cancelled for application '{0}'")]
    Cancelled(String),

    #[error("Platform error: {0}")]
    #[diagnostic(code(canopy::platform::request))]
    Platform(#[from] PlatformError),

    #[error("Invalid deployment properties: {0}")]
    #[diagnostic(code(canopy::deploy::validation))]
    Validation(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for errors that represent a user- or system-initiated cancellation
    /// rather than a failure. Cancellations must never be reported as failures
    /// in outward-facing channels.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }

    /// Returns a helpful suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Error::Platform(e) if e.is_host_taken() => Some(
                "The route host is already taken by another application. Pick a different \
                 `host` in the manifest, or add `random-route: true` to generate a unique one."
                    .to_string(),
            ),
            Error::Platform(e) if e.is_auth() => Some(
                "The access token was rejected. Re-authenticate against the target and retry."
                    .to_string(),
            ),
            Error::Platform(e) if e.is_not_found() => Some(
                "The resource does not exist on the platform. Refresh the target to reconcile \
                 the local view with live state."
                    .to_string(),
            ),
            Error::StartTimeout { app, .. } => Some(format!(
                "Check the logs for '{}' on the platform; slow buildpacks or failing health \
                 checks are the usual cause. The application keeps starting in the background.",
                app
            )),
            Error::MissingApplicationName => {
                Some("Add a `name:` entry to the application in the manifest.".to_string())
            }
            Error::InvalidMemorySpec(_) => {
                Some("A unit suffix needs a number in front of it: `512M`, not `M`.".to_string())
            }
            _ => None,
        }
    }

    /// Formats the error with its suggestion (if any) for user-friendly display.
    pub fn with_suggestion(&self) -> String {
        match self.suggestion() {
            Some(suggestion) => format!("{}\n\nHint: {}", self, suggestion),
            None => self.to_string(),
        }
    }
}
