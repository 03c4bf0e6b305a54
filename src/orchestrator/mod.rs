//! The deployment orchestrator.

mod cache;
mod core;
mod lifecycle;

pub use cache::{AppCacheStore, AppSnapshot};
pub use core::{AutoConfirm, DeployDecisions, DeploymentOrchestrator};
