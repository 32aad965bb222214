use std::sync::Arc;

use loginflow_flow::IdentityService;

/// Identity service selected for a request (by its `Host` header).
///
/// Inserted by [`crate::middleware::service_middleware`]; every page and API
/// handler reads it instead of a process-wide client.
#[derive(Clone)]
pub struct ServiceContext {
    service: Arc<dyn IdentityService>,
    host: Option<String>,
}

impl ServiceContext {
    pub fn new(service: Arc<dyn IdentityService>, host: Option<String>) -> Self {
        Self { service, host }
    }

    pub fn service(&self) -> Arc<dyn IdentityService> {
        self.service.clone()
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }
}

impl core::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ServiceContext").field("host", &self.host).finish_non_exhaustive()
    }
}
