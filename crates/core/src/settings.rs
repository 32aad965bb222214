//! Read-only policy snapshots fetched from the identity service.
//!
//! These are cached for at most one render and never persisted. Field names
//! follow the service's JSON gateway (camelCase); unknown fields are ignored
//! and missing fields take their defaults.

use serde::{Deserialize, Serialize};

use crate::id::IdpId;

/// Which policy document to fetch.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsKind {
    Login,
    Branding,
    PasswordComplexity,
    Privacy,
    Legal,
}

impl SettingsKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingsKind::Login => "login",
            SettingsKind::Branding => "branding",
            SettingsKind::PasswordComplexity => "password_complexity",
            SettingsKind::Privacy => "privacy",
            SettingsKind::Legal => "legal",
        }
    }
}

impl core::fmt::Display for SettingsKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PasskeysType {
    #[default]
    #[serde(alias = "PASSKEYS_TYPE_NOT_ALLOWED")]
    NotAllowed,
    #[serde(alias = "PASSKEYS_TYPE_ALLOWED")]
    Allowed,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecondFactorType {
    #[serde(alias = "SECOND_FACTOR_TYPE_UNSPECIFIED")]
    Unspecified,
    /// Time-based one-time password.
    #[serde(alias = "SECOND_FACTOR_TYPE_OTP")]
    Otp,
    #[serde(alias = "SECOND_FACTOR_TYPE_U2F")]
    U2f,
    #[serde(alias = "SECOND_FACTOR_TYPE_OTP_EMAIL")]
    OtpEmail,
    #[serde(alias = "SECOND_FACTOR_TYPE_OTP_SMS")]
    OtpSms,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MultiFactorType {
    #[serde(alias = "MULTI_FACTOR_TYPE_UNSPECIFIED")]
    Unspecified,
    #[serde(alias = "MULTI_FACTOR_TYPE_U2F_WITH_VERIFICATION")]
    U2fWithVerification,
}

/// Login policy of an instance or organization.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoginSettings {
    pub allow_username_password: bool,
    pub allow_register: bool,
    pub allow_external_idp: bool,
    pub force_mfa: bool,
    pub force_mfa_local_only: bool,
    pub passkeys_type: PasskeysType,
    pub hide_password_reset: bool,
    pub ignore_unknown_usernames: bool,
    pub default_redirect_uri: String,
    pub second_factors: Vec<SecondFactorType>,
    pub multi_factors: Vec<MultiFactorType>,
    /// Match the `@domain` suffix of unknown login names against organization domains.
    pub allow_domain_discovery: bool,
    pub disable_login_with_email: bool,
    pub disable_login_with_phone: bool,
}

impl LoginSettings {
    pub fn passkeys_allowed(&self) -> bool {
        self.passkeys_type == PasskeysType::Allowed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrandingSettings {
    pub primary_color: String,
    pub background_color: String,
    pub warn_color: String,
    pub font_color: String,
    pub logo_url: String,
    pub icon_url: String,
    pub hide_login_name_suffix: bool,
    pub disable_watermark: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PasswordComplexitySettings {
    pub min_length: u32,
    pub requires_uppercase: bool,
    pub requires_lowercase: bool,
    pub requires_number: bool,
    pub requires_symbol: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrivacyPolicy {
    pub tos_link: String,
    pub privacy_link: String,
    pub help_link: String,
    pub support_email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegalAndSupportSettings {
    pub tos_link: String,
    pub privacy_policy_link: String,
    pub help_link: String,
    pub support_email: String,
    pub docs_link: String,
    pub custom_link: String,
    pub custom_link_text: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentityProviderType {
    #[default]
    #[serde(alias = "IDENTITY_PROVIDER_TYPE_UNSPECIFIED")]
    Unspecified,
    #[serde(alias = "IDENTITY_PROVIDER_TYPE_OIDC")]
    Oidc,
    #[serde(alias = "IDENTITY_PROVIDER_TYPE_JWT")]
    Jwt,
    #[serde(alias = "IDENTITY_PROVIDER_TYPE_LDAP")]
    Ldap,
    #[serde(alias = "IDENTITY_PROVIDER_TYPE_OAUTH")]
    Oauth,
    #[serde(alias = "IDENTITY_PROVIDER_TYPE_AZURE_AD")]
    AzureAd,
    #[serde(alias = "IDENTITY_PROVIDER_TYPE_GITHUB")]
    Github,
    #[serde(alias = "IDENTITY_PROVIDER_TYPE_GITHUB_ES")]
    GithubEs,
    #[serde(alias = "IDENTITY_PROVIDER_TYPE_GITLAB")]
    Gitlab,
    #[serde(alias = "IDENTITY_PROVIDER_TYPE_GITLAB_SELF_HOSTED")]
    GitlabSelfHosted,
    #[serde(alias = "IDENTITY_PROVIDER_TYPE_GOOGLE")]
    Google,
    #[serde(alias = "IDENTITY_PROVIDER_TYPE_APPLE")]
    Apple,
    #[serde(alias = "IDENTITY_PROVIDER_TYPE_SAML")]
    Saml,
}

impl IdentityProviderType {
    /// Path segment used in the IdP callback URLs.
    pub fn slug(&self) -> &'static str {
        match self {
            IdentityProviderType::Github | IdentityProviderType::GithubEs => "github",
            IdentityProviderType::Gitlab | IdentityProviderType::GitlabSelfHosted => "gitlab",
            IdentityProviderType::Google => "google",
            IdentityProviderType::AzureAd => "azure",
            IdentityProviderType::Apple => "apple",
            IdentityProviderType::Saml => "saml",
            IdentityProviderType::Ldap => "ldap",
            IdentityProviderType::Oidc | IdentityProviderType::Jwt => "oidc",
            IdentityProviderType::Oauth | IdentityProviderType::Unspecified => "oauth",
        }
    }
}

/// An identity provider active for an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProvider {
    pub id: IdpId,
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: IdentityProviderType,
}

/// A fetched settings document, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "settings", rename_all = "snake_case")]
pub enum Settings {
    Login(LoginSettings),
    Branding(BrandingSettings),
    PasswordComplexity(PasswordComplexitySettings),
    Privacy(PrivacyPolicy),
    Legal(LegalAndSupportSettings),
}

impl Settings {
    pub fn kind(&self) -> SettingsKind {
        match self {
            Settings::Login(_) => SettingsKind::Login,
            Settings::Branding(_) => SettingsKind::Branding,
            Settings::PasswordComplexity(_) => SettingsKind::PasswordComplexity,
            Settings::Privacy(_) => SettingsKind::Privacy,
            Settings::Legal(_) => SettingsKind::Legal,
        }
    }
}
