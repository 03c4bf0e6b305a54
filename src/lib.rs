//! canopy is a deployment engine for manifest-driven cloud application
//! platforms.
//!
//! It turns YAML deployment manifests into validated deployment properties,
//! reconciles manifest files against what is actually deployed, and drives
//! push/start/stop/restart/delete/refresh operations against a platform
//! client while tracking each application's aggregated run state. Operations
//! are serialized through a FIFO scheduler so concurrent work on the same
//! application or target cannot interleave destructively.
//!
//! The platform protocol itself is out of scope; embedders supply a
//! [`platform::PlatformClient`] implementation.

pub mod deploy;
pub mod error;
pub mod event;
pub mod manifest;
pub mod orchestrator;
pub mod platform;
pub mod runstate;
pub mod scheduler;

pub use error::{Error, Result};
