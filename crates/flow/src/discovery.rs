//! Login-name routing around the single `CreateSession` call: which
//! identifiers the policy accepts, and where unknown users go.

use std::sync::Arc;

use tracing::instrument;

use loginflow_auth::{domain_suffix, matches_login_policy};
use loginflow_core::{AuthContext, LoginError, LoginSettings, OrganizationId};

use crate::port::IdentityService;
use crate::step::Step;
use crate::submit::{RedisplayReason, StepResult, Transition, USER_NOT_FOUND};

#[derive(Clone)]
pub struct LoginNameRouter {
    service: Arc<dyn IdentityService>,
}

impl LoginNameRouter {
    pub fn new(service: Arc<dyn IdentityService>) -> Self {
        Self { service }
    }

    /// Reject identifiers the user's login settings disable (email or phone
    /// login). `None` means the login name may be submitted.
    #[instrument(skip_all, err)]
    pub async fn check_login_policy(&self, ctx: &AuthContext, login_name: &str) -> Result<Option<StepResult>, LoginError> {
        let users = self.service.list_users(login_name, ctx.organization()).await?;
        let [user] = users.as_slice() else {
            return Ok(None);
        };

        let organization = ctx.organization().or(user.organization_id.as_ref());
        let settings = self.login_settings(organization).await?;

        if matches_login_policy(login_name, user, &settings) {
            Ok(None)
        } else {
            tracing::info!(user_id = %user.user_id, "login name kind disabled by policy");
            Ok(Some(StepResult::redisplay(USER_NOT_FOUND, RedisplayReason::NotFound)))
        }
    }

    /// Where a login name the service does not know leads.
    ///
    /// - registration allowed (with password login and a known organization): register
    /// - unknown names ignored: the password page, so existence is not revealed
    /// - otherwise: not found
    #[instrument(skip_all, err)]
    pub async fn route_unknown(&self, ctx: &AuthContext, login_name: &str) -> Result<StepResult, LoginError> {
        let organization = match ctx.organization() {
            Some(org) => Some(org.clone()),
            None => self.discover_organization(login_name).await,
        };
        let settings = self.login_settings(organization.as_ref()).await?;

        let next = ctx.clone().with_session_id(None).without_code().with_submit(false);

        if settings.allow_register
            && settings.allow_username_password
            && organization.is_some()
            && !settings.ignore_unknown_usernames
        {
            let next = next.with_login_name(login_name).with_organization(organization);
            return Ok(StepResult::Advance(Transition::Step {
                step: Step::Register,
                context: next,
            }));
        }

        if settings.ignore_unknown_usernames {
            return Ok(StepResult::Advance(Transition::Step {
                step: Step::EnterPassword,
                context: next.with_login_name(login_name),
            }));
        }

        Ok(StepResult::redisplay(USER_NOT_FOUND, RedisplayReason::NotFound))
    }

    /// The organization owning the login name's `@domain`, when exactly one
    /// does and it allows domain discovery.
    pub async fn discover_organization(&self, login_name: &str) -> Option<OrganizationId> {
        let domain = domain_suffix(login_name)?;

        let orgs = match self.service.get_orgs_by_domain(domain).await {
            Ok(orgs) => orgs,
            Err(err) => {
                tracing::warn!(domain, error = %err, "organization discovery failed");
                return None;
            }
        };
        let [org] = orgs.as_slice() else {
            return None;
        };

        match self.service.get_login_settings(Some(&org.id)).await {
            Ok(settings) if settings.allow_domain_discovery => {
                tracing::debug!(organization = %org.id, "organization discovered");
                Some(org.id.clone())
            }
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(organization = %org.id, error = %err, "organization settings unavailable");
                None
            }
        }
    }

    async fn login_settings(&self, organization: Option<&OrganizationId>) -> Result<LoginSettings, LoginError> {
        self.service.get_login_settings(organization).await.map_err(|err| {
            tracing::error!(error = %err, "failed to load login settings");
            LoginError::configuration("could not load login settings")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::{InMemoryIdentityService, SeedUser};
    use loginflow_core::Organization;

    fn acme() -> OrganizationId {
        OrganizationId::new("org-acme").unwrap()
    }

    fn registering() -> LoginSettings {
        LoginSettings {
            allow_register: true,
            allow_username_password: true,
            allow_domain_discovery: true,
            ..Default::default()
        }
    }

    fn with_acme(settings: LoginSettings) -> InMemoryIdentityService {
        InMemoryIdentityService::new()
            .with_organization(Organization {
                id: acme(),
                name: "ACME".into(),
                primary_domain: "acme.example".into(),
            })
            .with_org_login_settings(acme(), settings)
    }

    fn advanced(result: StepResult) -> (Step, AuthContext) {
        match result {
            StepResult::Advance(Transition::Step { step, context }) => (step, context),
            other => panic!("expected advance, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn discovered_org_with_registration_goes_to_register() {
        let router = LoginNameRouter::new(Arc::new(with_acme(registering())));
        let result = router
            .route_unknown(&AuthContext::new(), "new@acme.example")
            .await
            .unwrap();

        let (step, ctx) = advanced(result);
        assert_eq!(step, Step::Register);
        assert_eq!(ctx.organization(), Some(&acme()));
        assert_eq!(ctx.login_name(), Some("new@acme.example"));
    }

    #[tokio::test]
    async fn discovery_requires_opt_in() {
        let router = LoginNameRouter::new(Arc::new(with_acme(LoginSettings {
            allow_domain_discovery: false,
            ..registering()
        })));
        assert_eq!(router.discover_organization("new@acme.example").await, None);
        assert_eq!(router.discover_organization("no-suffix").await, None);
    }

    #[tokio::test]
    async fn ambiguous_domains_are_not_discovered() {
        let svc = with_acme(registering()).with_organization(Organization {
            id: OrganizationId::new("org-other").unwrap(),
            name: "Other".into(),
            primary_domain: "acme.example".into(),
        });
        let router = LoginNameRouter::new(Arc::new(svc));
        assert_eq!(router.discover_organization("new@acme.example").await, None);
    }

    #[tokio::test]
    async fn ignored_unknown_usernames_go_to_password() {
        let svc = InMemoryIdentityService::new().with_login_settings(LoginSettings {
            ignore_unknown_usernames: true,
            allow_username_password: true,
            ..Default::default()
        });
        let result = LoginNameRouter::new(Arc::new(svc))
            .route_unknown(&AuthContext::new(), "ghost@example.com")
            .await
            .unwrap();

        let (step, ctx) = advanced(result);
        assert_eq!(step, Step::EnterPassword);
        assert_eq!(ctx.session_id(), None);
    }

    #[tokio::test]
    async fn otherwise_user_not_found() {
        let router = LoginNameRouter::new(Arc::new(InMemoryIdentityService::new()));
        let result = router
            .route_unknown(&AuthContext::new(), "ghost@example.com")
            .await
            .unwrap();
        assert_eq!(result, StepResult::redisplay(USER_NOT_FOUND, RedisplayReason::NotFound));
    }

    #[tokio::test]
    async fn disabled_email_login_is_rejected() {
        let svc = InMemoryIdentityService::new()
            .with_login_settings(LoginSettings {
                disable_login_with_email: true,
                ..Default::default()
            })
            .with_user(SeedUser::new("admin").with_email("admin@example.com"));
        let router = LoginNameRouter::new(Arc::new(svc));

        assert_eq!(
            router
                .check_login_policy(&AuthContext::new(), "admin@example.com")
                .await
                .unwrap(),
            Some(StepResult::redisplay(USER_NOT_FOUND, RedisplayReason::NotFound))
        );
        // The preferred login name is always accepted.
        assert_eq!(
            router.check_login_policy(&AuthContext::new(), "admin").await.unwrap(),
            None
        );
        assert_eq!(
            router
                .check_login_policy(&AuthContext::new(), "nobody@example.com")
                .await
                .unwrap(),
            None
        );
    }
}
