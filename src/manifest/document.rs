//! Deployment manifest document model.
//!
//! The manifest is kept as raw YAML rather than a typed struct. Reads are
//! permissive: a key that is absent or carries the wrong type simply reads as
//! absent, and each application entry falls back to the document's top-level
//! defaults. This mirrors how the platform CLI treats manifests and keeps
//! hand-edited files usable even when partially wrong.

use serde_yaml::{Mapping, Value};
use std::path::Path;

use crate::deploy::{DeploymentProperties, DEFAULT_DISK_MB, DEFAULT_INSTANCES};
use crate::error::{Error, Result};
use crate::manifest::routes::decompose_routes;
use crate::platform::CloudDomain;

/// Manifest key names.
pub mod keys {
    pub const APPLICATIONS: &str = "applications";
    pub const NAME: &str = "name";
    pub const MEMORY: &str = "memory";
    pub const DISK_QUOTA: &str = "disk_quota";
    pub const INSTANCES: &str = "instances";
    pub const BUILDPACK: &str = "buildpack";
    pub const STACK: &str = "stack";
    pub const COMMAND: &str = "command";
    pub const HEALTH_CHECK_TYPE: &str = "health-check-type";
    pub const TIMEOUT: &str = "timeout";
    pub const ENV: &str = "env";
    pub const SERVICES: &str = "services";
    pub const PATH: &str = "path";
    pub const ROUTES: &str = "routes";
    pub const ROUTE: &str = "route";
    pub const HOST: &str = "host";
    pub const HOSTS: &str = "hosts";
    pub const DOMAIN: &str = "domain";
    pub const DOMAINS: &str = "domains";
    pub const NO_ROUTE: &str = "no-route";
    pub const NO_HOSTNAME: &str = "no-hostname";
    pub const RANDOM_ROUTE: &str = "random-route";
    pub const INHERIT: &str = "inherit";
}

/// A parsed manifest document.
#[derive(Debug, Clone)]
pub struct ManifestDocument {
    root: Mapping,
    /// Top-level defaults, i.e. the root minus the `applications` key.
    shared: Mapping,
}

impl ManifestDocument {
    /// Parse manifest text.
    ///
    /// The document root must be a mapping and `applications`, when present,
    /// must be a sequence. Everything below that is validated lazily by the
    /// permissive accessors.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(text)?;
        let root = match value {
            Value::Mapping(m) => m,
            other => {
                return Err(Error::MalformedManifest(format!(
                    "manifest root must be a mapping, got {}",
                    value_kind(&other)
                )))
            }
        };

        if let Some(apps) = root.get(keys::APPLICATIONS) {
            if !apps.is_sequence() {
                return Err(Error::MalformedManifest(format!(
                    "'{}' must be a sequence, got {}",
                    keys::APPLICATIONS,
                    value_kind(apps)
                )));
            }
        }

        let mut shared = root.clone();
        shared.remove(keys::APPLICATIONS);
        Ok(Self { root, shared })
    }

    /// Read and parse a manifest file, qualifying errors with the path.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Manifest(format!("Failed to read manifest '{}': {}", path.display(), e))
        })?;
        Self::parse(&text)
            .map_err(|e| Error::Manifest(format!("In manifest '{}': {}", path.display(), e)))
    }

    /// The application entries of this manifest.
    ///
    /// A document without an `applications` key describes a single
    /// application at the top level, so the root itself is the one entry.
    pub fn application_entries(&self) -> Vec<&Mapping> {
        match self.root.get(keys::APPLICATIONS).and_then(Value::as_sequence) {
            Some(seq) => seq.iter().filter_map(Value::as_mapping).collect(),
            None => vec![&self.root],
        }
    }

    /// Top-level keys shared by all application entries.
    pub fn shared_defaults(&self) -> &Mapping {
        &self.shared
    }

    /// True when the document carries an `inherit` directive. Inherited
    /// parent manifests are not resolved; callers surface a warning instead.
    pub fn has_inherit(&self) -> bool {
        self.root.contains_key(keys::INHERIT)
    }

    /// Render the document back to YAML text.
    pub fn serialize(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&Value::Mapping(self.root.clone()))?)
    }

    /// Build a manifest equivalent to a set of resolved deployment
    /// properties. Route URIs are decomposed back into the most compact
    /// host/domain directives the platform's domain list allows.
    pub fn from_properties(props: &DeploymentProperties, domains: &[CloudDomain]) -> Self {
        let mut entry = Mapping::new();
        insert(&mut entry, keys::NAME, Value::String(props.app_name.clone()));
        insert(
            &mut entry,
            keys::MEMORY,
            Value::String(format!("{}M", props.memory_mb)),
        );
        if props.disk_mb != DEFAULT_DISK_MB {
            insert(
                &mut entry,
                keys::DISK_QUOTA,
                Value::String(format!("{}M", props.disk_mb)),
            );
        }
        if props.instances != DEFAULT_INSTANCES {
            insert(&mut entry, keys::INSTANCES, Value::from(props.instances));
        }
        if let Some(buildpack) = &props.buildpack {
            insert(&mut entry, keys::BUILDPACK, Value::String(buildpack.clone()));
        }
        if let Some(stack) = &props.stack {
            insert(&mut entry, keys::STACK, Value::String(stack.clone()));
        }
        if let Some(command) = &props.command {
            insert(&mut entry, keys::COMMAND, Value::String(command.clone()));
        }
        if let Some(kind) = &props.health_check_type {
            insert(&mut entry, keys::HEALTH_CHECK_TYPE, Value::String(kind.clone()));
        }
        if let Some(timeout) = props.timeout_seconds {
            insert(&mut entry, keys::TIMEOUT, Value::from(timeout));
        }
        if !props.env_vars.is_empty() {
            let mut env = Mapping::new();
            for (k, v) in &props.env_vars {
                env.insert(Value::String(k.clone()), Value::String(v.clone()));
            }
            insert(&mut entry, keys::ENV, Value::Mapping(env));
        }
        if !props.bound_services.is_empty() {
            let services = props
                .bound_services
                .iter()
                .map(|s| Value::String(s.clone()))
                .collect();
            insert(&mut entry, keys::SERVICES, Value::Sequence(services));
        }

        let directives = decompose_routes(&props.routes, domains);
        if directives.no_route {
            insert(&mut entry, keys::NO_ROUTE, Value::Bool(true));
        } else {
            match directives.hosts.as_slice() {
                [] => {
                    if directives.no_hostname {
                        insert(&mut entry, keys::NO_HOSTNAME, Value::Bool(true));
                    }
                }
                [only] if *only == props.app_name => {
                    // default host, omit
                }
                [only] => {
                    insert(&mut entry, keys::HOST, Value::String(only.clone()));
                }
                many => {
                    let hosts = many.iter().map(|h| Value::String(h.clone())).collect();
                    insert(&mut entry, keys::HOSTS, Value::Sequence(hosts));
                }
            }
            match directives.domains.as_slice() {
                [] => {}
                [only] => {
                    insert(&mut entry, keys::DOMAIN, Value::String(only.clone()));
                }
                many => {
                    let ds = many.iter().map(|d| Value::String(d.clone())).collect();
                    insert(&mut entry, keys::DOMAINS, Value::Sequence(ds));
                }
            }
        }

        let mut root = Mapping::new();
        root.insert(
            Value::String(keys::APPLICATIONS.to_string()),
            Value::Sequence(vec![Value::Mapping(entry)]),
        );
        Self {
            root,
            shared: Mapping::new(),
        }
    }
}

fn insert(map: &mut Mapping, key: &str, value: Value) {
    map.insert(Value::String(key.to_string()), value);
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// Two-level view over one application entry plus the document's shared
/// defaults. The entry wins on every key; wrong-typed values read as absent.
#[derive(Debug, Clone, Copy)]
pub struct AppEntry<'a> {
    entry: &'a Mapping,
    shared: &'a Mapping,
}

impl<'a> AppEntry<'a> {
    pub fn new(entry: &'a Mapping, shared: &'a Mapping) -> Self {
        Self { entry, shared }
    }

    /// Raw value lookup, entry first.
    pub fn value(&self, key: &str) -> Option<&'a Value> {
        self.entry.get(key).or_else(|| self.shared.get(key))
    }

    pub fn string(&self, key: &str) -> Option<String> {
        string_at(self.entry, key).or_else(|| string_at(self.shared, key))
    }

    pub fn integer(&self, key: &str) -> Option<i64> {
        integer_at(self.entry, key).or_else(|| integer_at(self.shared, key))
    }

    /// Boolean directive, defaulting to false when absent on both levels.
    pub fn boolean(&self, key: &str) -> bool {
        bool_at(self.entry, key)
            .or_else(|| bool_at(self.shared, key))
            .unwrap_or(false)
    }

    /// Collect string values from a scalar key and its list-valued plural,
    /// entry level before shared level. Duplicates are kept; callers dedup
    /// where order-preserving uniqueness matters.
    pub fn string_values(&self, singular: &str, plural: &str) -> Vec<String> {
        let mut out = Vec::new();
        for level in [self.entry, self.shared] {
            if let Some(s) = string_at(level, singular) {
                out.push(s);
            }
            if let Some(seq) = level.get(plural).and_then(Value::as_sequence) {
                out.extend(seq.iter().filter_map(Value::as_str).map(str::to_string));
            }
        }
        out
    }

    /// Verbatim `routes:` URIs, entry level before shared level. Items are
    /// either `{route: <uri>}` mappings or bare strings.
    pub fn route_list(&self) -> Vec<String> {
        let mut out = Vec::new();
        for level in [self.entry, self.shared] {
            let Some(seq) = level.get(keys::ROUTES).and_then(Value::as_sequence) else {
                continue;
            };
            for item in seq {
                let uri = match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Mapping(m) => string_at(m, keys::ROUTE),
                    _ => None,
                };
                if let Some(uri) = uri {
                    out.push(uri);
                }
            }
        }
        out
    }

    /// Environment variables with shared values overridden by entry values.
    pub fn env_map(&self) -> std::collections::BTreeMap<String, String> {
        let mut out = std::collections::BTreeMap::new();
        for level in [self.shared, self.entry] {
            let Some(env) = level.get(keys::ENV).and_then(Value::as_mapping) else {
                continue;
            };
            for (k, v) in env {
                let (Some(key), Some(value)) = (k.as_str(), scalar_to_string(v)) else {
                    continue;
                };
                out.insert(key.to_string(), value);
            }
        }
        out
    }

    /// Bound service names, shared first, deduplicated in order.
    pub fn service_list(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for level in [self.shared, self.entry] {
            let Some(seq) = level.get(keys::SERVICES).and_then(Value::as_sequence) else {
                continue;
            };
            for name in seq.iter().filter_map(Value::as_str) {
                if !out.iter().any(|n| n == name) {
                    out.push(name.to_string());
                }
            }
        }
        out
    }
}

fn string_at(map: &Mapping, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

fn integer_at(map: &Mapping, key: &str) -> Option<i64> {
    map.get(key).and_then(Value::as_i64)
}

fn bool_at(map: &Mapping, key: &str) -> Option<bool> {
    map.get(key).and_then(Value::as_bool)
}

/// Render scalar env values the way they would appear on the command line.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
