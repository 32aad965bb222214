//! Application state: the service registry and the flow components built on it.

use std::sync::Arc;

use thiserror::Error;

use loginflow_auth::RedirectPolicy;
use loginflow_core::{
    IdentityProvider, IdentityProviderType, IdpId, LoginSettings, Organization, OrganizationId,
    PasswordComplexitySettings, PasskeysType,
};
use loginflow_flow::{
    FormSubmissionAdapter, IdentityError, IdentityService, InMemoryIdentityService, LinkBuilder, LoginNameRouter,
    SeedUser, SettingsFetcher, StepResolver,
};
use loginflow_infra::{Config, ConfigError, HttpIdentityService, ServiceRegistry};

use crate::context::ServiceContext;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("identity service client: {0}")]
    Client(#[from] IdentityError),
}

/// Shared, read-only state of the server.
#[derive(Debug)]
pub struct AppState {
    registry: ServiceRegistry,
    links: LinkBuilder,
    redirect_policy: RedirectPolicy,
    email_verification: bool,
    default_org: Option<OrganizationId>,
    /// Identifies this process on `/healthy`.
    instance_token: String,
}

impl AppState {
    pub fn new(registry: ServiceRegistry) -> Self {
        Self {
            registry,
            links: LinkBuilder::new(""),
            redirect_policy: RedirectPolicy::default(),
            email_verification: false,
            default_org: None,
            instance_token: uuid::Uuid::now_v7().to_string(),
        }
    }

    /// One service for every host.
    pub fn with_service(service: Arc<dyn IdentityService>) -> Self {
        Self::new(ServiceRegistry::new(service))
    }

    pub fn from_config(config: &Config) -> Result<Self, StartupError> {
        let http = |url: &url::Url, token: &str| -> Result<Arc<dyn IdentityService>, StartupError> {
            Ok(Arc::new(HttpIdentityService::new(url.clone(), token, config.rpc_timeout)?))
        };

        let (default, token): (Arc<dyn IdentityService>, Option<&str>) = match &config.service {
            _ if config.use_in_memory => (Arc::new(demo_service()), config.service.as_ref().map(|s| s.token.as_str())),
            Some(endpoint) => (http(&endpoint.url, &endpoint.token)?, Some(endpoint.token.as_str())),
            None => return Err(ConfigError::Missing(loginflow_infra::config::SERVICE_URL).into()),
        };

        let mut registry = ServiceRegistry::new(default);
        if let Some(token) = token {
            for (host, url) in &config.instances {
                registry.register(host, http(url, token)?);
            }
        }
        tracing::info!(hosts = ?registry.hosts(), in_memory = config.use_in_memory, "identity services configured");

        Ok(Self::new(registry)
            .with_base_path(&config.base_path)
            .with_redirect_policy(RedirectPolicy {
                enforce_https: config.enforce_https,
                production: config.production,
                trusted_domains: config.trusted_domains.clone(),
            })
            .with_email_verification(config.email_verification)
            .with_default_org(config.default_org_id.clone()))
    }

    pub fn with_base_path(mut self, base_path: &str) -> Self {
        self.links = LinkBuilder::new(base_path);
        self
    }

    pub fn with_redirect_policy(mut self, policy: RedirectPolicy) -> Self {
        self.redirect_policy = policy;
        self
    }

    pub fn with_email_verification(mut self, required: bool) -> Self {
        self.email_verification = required;
        self
    }

    pub fn with_default_org(mut self, organization: Option<OrganizationId>) -> Self {
        self.default_org = organization;
        self
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn links(&self) -> &LinkBuilder {
        &self.links
    }

    pub fn default_org(&self) -> Option<&OrganizationId> {
        self.default_org.as_ref()
    }

    pub fn instance_token(&self) -> &str {
        &self.instance_token
    }

    pub fn resolver(&self, ctx: &ServiceContext) -> StepResolver {
        StepResolver::new(ctx.service()).with_email_verification(self.email_verification)
    }

    pub fn adapter(&self, ctx: &ServiceContext) -> FormSubmissionAdapter {
        FormSubmissionAdapter::new(ctx.service(), self.redirect_policy.clone())
    }

    pub fn login_router(&self, ctx: &ServiceContext) -> LoginNameRouter {
        LoginNameRouter::new(ctx.service())
    }

    pub fn settings(&self, ctx: &ServiceContext) -> SettingsFetcher {
        SettingsFetcher::new(ctx.service())
    }
}

pub const DEMO_ORG_ID: &str = "org-demo";

/// Development identity service: one organization owning `example.com` and
/// an `admin@example.com` user with password `Password1!`.
pub fn demo_service() -> InMemoryIdentityService {
    let service = InMemoryIdentityService::new()
        .with_login_settings(LoginSettings {
            allow_username_password: true,
            allow_register: true,
            allow_external_idp: true,
            allow_domain_discovery: true,
            passkeys_type: PasskeysType::Allowed,
            ..Default::default()
        })
        .with_password_complexity(PasswordComplexitySettings {
            min_length: 8,
            requires_uppercase: true,
            requires_lowercase: true,
            requires_number: true,
            requires_symbol: true,
        });

    let Ok(org) = OrganizationId::new(DEMO_ORG_ID) else {
        return service;
    };
    let service = service
        .with_organization(Organization {
            id: org.clone(),
            name: "Demo".to_string(),
            primary_domain: "example.com".to_string(),
        })
        .with_user(
            SeedUser::new("admin@example.com")
                .with_password("Password1!")
                .with_organization(org),
        );

    match IdpId::new("google") {
        Ok(id) => service.with_identity_provider(IdentityProvider {
            id,
            name: "Google".to_string(),
            kind: IdentityProviderType::Google,
        }),
        Err(_) => service,
    }
}
