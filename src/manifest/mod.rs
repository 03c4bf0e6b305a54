//! Manifest document model, memory parsing, route handling and
//! reconciliation.

pub mod document;
pub mod memory;
pub mod reconcile;
pub mod routes;

pub use document::{AppEntry, ManifestDocument};
pub use memory::{parse_memory, parse_memory_str};
pub use reconcile::{EditScript, Reconciler, TextEdit};
pub use routes::{
    decompose_routes, resolve_routes, RouteDirectives, RouteSpec, RANDOM_TOKEN_LEN,
};
