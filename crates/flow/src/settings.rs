//! Settings Fetcher.
//!
//! Read-only policy snapshots, fetched per request and never cached. Any
//! failure is a configuration error: the page cannot render without them.

use std::sync::Arc;

use serde::Serialize;

use loginflow_core::{
    BrandingSettings, LegalAndSupportSettings, LoginError, LoginSettings, OrganizationId,
    PasswordComplexitySettings, PrivacyPolicy, Settings, SettingsKind,
};

use crate::port::{IdentityError, IdentityService};

/// Everything the registration page needs, fetched concurrently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationSettings {
    pub password_complexity: PasswordComplexitySettings,
    pub privacy_policy: PrivacyPolicy,
    pub legal_and_support: LegalAndSupportSettings,
    pub login: LoginSettings,
}

#[derive(Clone)]
pub struct SettingsFetcher {
    service: Arc<dyn IdentityService>,
}

fn configuration(kind: SettingsKind) -> impl FnOnce(IdentityError) -> LoginError {
    move |err| {
        tracing::error!(settings = %kind, error = %err, "failed to load settings");
        LoginError::configuration(format!("could not load {kind} settings"))
    }
}

impl SettingsFetcher {
    pub fn new(service: Arc<dyn IdentityService>) -> Self {
        Self { service }
    }

    /// Fetch one settings document by kind.
    pub async fn get(&self, kind: SettingsKind, organization: Option<&OrganizationId>) -> Result<Settings, LoginError> {
        let svc = &self.service;
        let settings = match kind {
            SettingsKind::Login => svc.get_login_settings(organization).await.map(Settings::Login),
            SettingsKind::Branding => svc.get_branding_settings(organization).await.map(Settings::Branding),
            SettingsKind::PasswordComplexity => svc
                .get_password_complexity_settings(organization)
                .await
                .map(Settings::PasswordComplexity),
            SettingsKind::Privacy => svc.get_privacy_policy(organization).await.map(Settings::Privacy),
            SettingsKind::Legal => svc.get_legal_and_support_settings(organization).await.map(Settings::Legal),
        };
        settings.map_err(configuration(kind))
    }

    pub async fn login(&self, organization: Option<&OrganizationId>) -> Result<LoginSettings, LoginError> {
        self.service
            .get_login_settings(organization)
            .await
            .map_err(configuration(SettingsKind::Login))
    }

    pub async fn branding(&self, organization: Option<&OrganizationId>) -> Result<BrandingSettings, LoginError> {
        self.service
            .get_branding_settings(organization)
            .await
            .map_err(configuration(SettingsKind::Branding))
    }

    pub async fn password_complexity(
        &self,
        organization: Option<&OrganizationId>,
    ) -> Result<PasswordComplexitySettings, LoginError> {
        self.service
            .get_password_complexity_settings(organization)
            .await
            .map_err(configuration(SettingsKind::PasswordComplexity))
    }

    /// Join the four documents of the registration page; any failure fails the render.
    pub async fn registration(&self, organization: Option<&OrganizationId>) -> Result<RegistrationSettings, LoginError> {
        let svc = &self.service;
        let (password_complexity, privacy_policy, legal_and_support, login) = tokio::try_join!(
            async {
                svc.get_password_complexity_settings(organization)
                    .await
                    .map_err(configuration(SettingsKind::PasswordComplexity))
            },
            async {
                svc.get_privacy_policy(organization)
                    .await
                    .map_err(configuration(SettingsKind::Privacy))
            },
            async {
                svc.get_legal_and_support_settings(organization)
                    .await
                    .map_err(configuration(SettingsKind::Legal))
            },
            async {
                svc.get_login_settings(organization)
                    .await
                    .map_err(configuration(SettingsKind::Login))
            },
        )?;

        Ok(RegistrationSettings {
            password_complexity,
            privacy_policy,
            legal_and_support,
            login,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryIdentityService;

    #[tokio::test]
    async fn get_returns_the_requested_kind() {
        let svc = InMemoryIdentityService::new().with_password_complexity(PasswordComplexitySettings {
            min_length: 12,
            ..Default::default()
        });
        let fetcher = SettingsFetcher::new(Arc::new(svc));

        let settings = fetcher.get(SettingsKind::PasswordComplexity, None).await.unwrap();
        assert_eq!(settings.kind(), SettingsKind::PasswordComplexity);
        match settings {
            Settings::PasswordComplexity(p) => assert_eq!(p.min_length, 12),
            other => panic!("unexpected settings: {other:?}"),
        }
    }

    #[tokio::test]
    async fn repeated_fetches_are_idempotent() {
        let fetcher = SettingsFetcher::new(Arc::new(InMemoryIdentityService::new()));
        let a = fetcher.login(None).await.unwrap();
        let b = fetcher.login(None).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn registration_fails_when_any_document_fails() {
        let svc = InMemoryIdentityService::new().with_unavailable_settings(SettingsKind::Privacy);
        let fetcher = SettingsFetcher::new(Arc::new(svc));

        let err = fetcher.registration(None).await.unwrap_err();
        assert!(matches!(err, LoginError::Configuration(_)));
        assert!(err.to_string().contains("privacy"));

        assert!(fetcher.get(SettingsKind::Privacy, None).await.is_err());
        assert!(fetcher.get(SettingsKind::Legal, None).await.is_ok());
    }
}
