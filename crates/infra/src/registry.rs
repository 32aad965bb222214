use std::collections::HashMap;
use std::sync::Arc;

use loginflow_flow::IdentityService;

/// Picks the identity service for a request host.
///
/// Hosts are compared lowercased with any port removed; unknown hosts use
/// the default service.
#[derive(Clone)]
pub struct ServiceRegistry {
    default: Arc<dyn IdentityService>,
    by_host: HashMap<String, Arc<dyn IdentityService>>,
}

impl core::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("hosts", &self.hosts())
            .finish_non_exhaustive()
    }
}

fn normalize(host: &str) -> String {
    let host = host.trim();
    // Bracketed IPv6 keeps its colons.
    let host = match host.strip_prefix('[') {
        Some(rest) => rest.split(']').next().unwrap_or(rest),
        None => host.split(':').next().unwrap_or(host),
    };
    host.trim_end_matches('.').to_ascii_lowercase()
}

impl ServiceRegistry {
    pub fn new(default: Arc<dyn IdentityService>) -> Self {
        Self {
            default,
            by_host: HashMap::new(),
        }
    }

    pub fn register(&mut self, host: &str, service: Arc<dyn IdentityService>) {
        self.by_host.insert(normalize(host), service);
    }

    pub fn with(mut self, host: &str, service: Arc<dyn IdentityService>) -> Self {
        self.register(host, service);
        self
    }

    pub fn resolve(&self, host: Option<&str>) -> Arc<dyn IdentityService> {
        host.map(normalize)
            .and_then(|h| self.by_host.get(&h))
            .unwrap_or(&self.default)
            .clone()
    }

    pub fn hosts(&self) -> Vec<&str> {
        let mut hosts: Vec<&str> = self.by_host.keys().map(String::as_str).collect();
        hosts.sort_unstable();
        hosts
    }
}
