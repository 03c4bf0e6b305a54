//! Route derivation and decomposition.
//!
//! Resolution turns the manifest's host/domain/route directives into the
//! final set of route URIs bound to an application. Decomposition is the
//! inverse: given live route URIs and the platform's domain list, it picks
//! the most compact set of manifest directives that reproduces them.

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::manifest::document::{keys, AppEntry};
use crate::platform::CloudDomain;

/// Placeholder expanded into a random token inside `host` values.
pub const RANDOM_PLACEHOLDER: &str = "${random}";

/// Length of the generated random host token.
pub const RANDOM_TOKEN_LEN: usize = 10;

/// One route split into its subdomain/domain parts.
///
/// Equality and hashing are over the pair; `url()` is derived. A spec with
/// both parts absent has no URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteSpec {
    pub subdomain: Option<String>,
    pub domain: Option<String>,
}

impl RouteSpec {
    pub fn new(subdomain: Option<String>, domain: Option<String>) -> Self {
        Self { subdomain, domain }
    }

    pub fn url(&self) -> Option<String> {
        match (&self.subdomain, &self.domain) {
            (Some(s), Some(d)) => Some(format!("{}.{}", s, d)),
            (None, Some(d)) => Some(d.clone()),
            (Some(s), None) => Some(s.clone()),
            (None, None) => None,
        }
    }
}

/// Manifest directives equivalent to a set of live route URIs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteDirectives {
    pub hosts: Vec<String>,
    pub domains: Vec<String>,
    pub no_route: bool,
    pub no_hostname: bool,
}

fn random_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Expand every `${random}` placeholder in a host value.
pub fn expand_random(host: &str) -> String {
    let mut out = host.to_string();
    while out.contains(RANDOM_PLACEHOLDER) {
        out = out.replacen(RANDOM_PLACEHOLDER, &random_token(), 1);
    }
    out
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

/// Derive the final ordered set of route URIs for one application entry.
///
/// Order is deterministic: hosts iterate in the outer loop, domains in the
/// inner loop, both in directive order. Repeated calls with identical input
/// yield identical output except for `${random}` expansion.
pub fn resolve_routes(entry: &AppEntry<'_>, app_name: &str, domains: &[CloudDomain]) -> Vec<String> {
    // no-route wins over everything else
    if entry.boolean(keys::NO_ROUTE) {
        return Vec::new();
    }

    // Explicit `routes:` entries are used verbatim and suppress all
    // host/domain construction.
    let verbatim = entry.route_list();
    if !verbatim.is_empty() {
        let mut uris = Vec::new();
        for uri in verbatim {
            push_unique(&mut uris, uri);
        }
        return uris;
    }

    let mut candidate_domains: Vec<String> = Vec::new();
    for name in entry.string_values(keys::DOMAIN, keys::DOMAINS) {
        if domains.iter().any(|d| d.name == name) {
            push_unique(&mut candidate_domains, name);
        } else {
            tracing::debug!(domain = %name, "dropping unknown domain from manifest");
        }
    }

    let mut hosts: Vec<String> = Vec::new();
    for host in entry.string_values(keys::HOST, keys::HOSTS) {
        push_unique(&mut hosts, expand_random(&host));
    }

    if hosts.is_empty() {
        if entry.boolean(keys::RANDOM_ROUTE) {
            hosts.push(expand_random(RANDOM_PLACEHOLDER));
            // random-route pins the route to the platform's first domain
            candidate_domains = domains.first().map(|d| vec![d.name.clone()]).unwrap_or_default();
        } else if entry.boolean(keys::NO_HOSTNAME) {
            // domain-only routes
        } else {
            hosts.push(app_name.to_string());
        }
    }

    if candidate_domains.is_empty() {
        if let Some(first) = domains.first() {
            candidate_domains.push(first.name.clone());
        }
    }

    let mut uris = Vec::new();
    if hosts.is_empty() {
        for domain in &candidate_domains {
            push_unique(&mut uris, domain.clone());
        }
    } else {
        for host in &hosts {
            for domain in &candidate_domains {
                push_unique(&mut uris, format!("{}.{}", host, domain));
            }
        }
    }
    uris
}

/// Split one URI into subdomain/domain against the platform's domain list.
///
/// Prefers the longest matching known domain; URIs using an unknown domain
/// fall back to splitting at the first dot.
pub fn split_uri(uri: &str, domains: &[CloudDomain]) -> RouteSpec {
    let mut best: Option<&str> = None;
    for domain in domains {
        let matches =
            uri == domain.name || uri.ends_with(&format!(".{}", domain.name));
        if matches && best.map_or(true, |b| domain.name.len() > b.len()) {
            best = Some(&domain.name);
        }
    }

    if let Some(domain) = best {
        if uri == domain {
            return RouteSpec::new(None, Some(domain.to_string()));
        }
        let host = &uri[..uri.len() - domain.len() - 1];
        return RouteSpec::new(Some(host.to_string()), Some(domain.to_string()));
    }

    match uri.split_once('.') {
        Some((host, rest)) => RouteSpec::new(Some(host.to_string()), Some(rest.to_string())),
        None => RouteSpec::new(None, Some(uri.to_string())),
    }
}

/// Decompose live route URIs into minimal manifest directives.
pub fn decompose_routes(uris: &[String], domains: &[CloudDomain]) -> RouteDirectives {
    if uris.is_empty() {
        return RouteDirectives {
            no_route: true,
            ..Default::default()
        };
    }

    let mut hosts = Vec::new();
    let mut route_domains = Vec::new();
    let mut saw_host = false;

    for uri in uris {
        let spec = split_uri(uri, domains);
        if let Some(host) = spec.subdomain {
            saw_host = true;
            push_unique(&mut hosts, host);
        }
        if let Some(domain) = spec.domain {
            push_unique(&mut route_domains, domain);
        }
    }

    RouteDirectives {
        hosts,
        domains: route_domains,
        no_route: false,
        no_hostname: !saw_host,
    }
}
