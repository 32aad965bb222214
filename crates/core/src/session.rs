//! Sessions as reported by the identity service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{OrganizationId, SessionId, UserId};

/// A factor the service has verified at some point in time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifiedFactor {
    pub verified_at: Option<DateTime<Utc>>,
}

impl VerifiedFactor {
    pub fn at(verified_at: DateTime<Utc>) -> Self {
        Self {
            verified_at: Some(verified_at),
        }
    }

    pub fn is_verified(&self) -> bool {
        self.verified_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebAuthnFactor {
    pub verified_at: Option<DateTime<Utc>>,
    /// Set for passkeys (user verification performed by the authenticator).
    pub user_verified: bool,
}

impl WebAuthnFactor {
    pub fn is_verified(&self) -> bool {
        self.verified_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFactor {
    pub id: UserId,
    #[serde(default)]
    pub login_name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub organization_id: Option<OrganizationId>,
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
}

/// Factors checked on a session so far.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Factors {
    pub user: Option<UserFactor>,
    pub password: Option<VerifiedFactor>,
    #[serde(rename = "webAuthN")]
    pub web_authn: Option<WebAuthnFactor>,
    /// Federated login through an external identity provider.
    pub intent: Option<VerifiedFactor>,
    pub totp: Option<VerifiedFactor>,
    pub otp_sms: Option<VerifiedFactor>,
    pub otp_email: Option<VerifiedFactor>,
}

fn verified(f: &Option<VerifiedFactor>) -> bool {
    f.as_ref().is_some_and(VerifiedFactor::is_verified)
}

impl Factors {
    pub fn password_verified(&self) -> bool {
        verified(&self.password)
    }

    pub fn intent_verified(&self) -> bool {
        verified(&self.intent)
    }

    pub fn webauthn_verified(&self) -> bool {
        self.web_authn.as_ref().is_some_and(WebAuthnFactor::is_verified)
    }

    /// A WebAuthn check performed with user verification.
    pub fn passkey_verified(&self) -> bool {
        self.web_authn
            .as_ref()
            .is_some_and(|w| w.is_verified() && w.user_verified)
    }

    pub fn totp_verified(&self) -> bool {
        verified(&self.totp)
    }

    pub fn otp_sms_verified(&self) -> bool {
        verified(&self.otp_sms)
    }

    pub fn otp_email_verified(&self) -> bool {
        verified(&self.otp_email)
    }
}

/// Full session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    #[serde(default)]
    pub expiration_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub factors: Option<Factors>,
}

impl Session {
    pub fn user(&self) -> Option<&UserFactor> {
        self.factors.as_ref().and_then(|f| f.user.as_ref())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date.is_some_and(|exp| exp <= now)
    }
}

/// What `CreateSession` / `SetSession` return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHandle {
    pub session_id: SessionId,
    #[serde(default)]
    pub session_token: String,
}

/// How the user of a session is identified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UserCheck {
    LoginName(String),
    UserId(UserId),
}

/// Checks submitted with `CreateSession` / `SetSession`.
///
/// Secrets live here only for the duration of one call and are never logged;
/// `Debug` redacts them.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checks {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_sms: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_email: Option<String>,
}

impl Checks {
    pub fn login_name(login_name: impl Into<String>) -> Self {
        Self {
            user: Some(UserCheck::LoginName(login_name.into())),
            ..Default::default()
        }
    }

    pub fn password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
            ..Default::default()
        }
    }
}

impl core::fmt::Debug for Checks {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("Checks")
            .field("user", &self.user)
            .field("password", &redact(&self.password))
            .field("totp", &redact(&self.totp))
            .field("otp_sms", &redact(&self.otp_sms))
            .field("otp_email", &redact(&self.otp_email))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn checks_debug_never_prints_secrets() {
        let checks = Checks {
            password: Some("hunter2".to_string()),
            ..Checks::login_name("alice")
        };
        let rendered = format!("{checks:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("alice"));
    }

    #[test]
    fn session_without_expiration_never_expires() {
        let session = Session {
            id: SessionId::new("s1").unwrap(),
            expiration_date: None,
            factors: None,
        };
        assert!(!session.is_expired(Utc::now() + Duration::days(365)));
    }

    #[test]
    fn passkey_requires_user_verification() {
        let factors = Factors {
            web_authn: Some(WebAuthnFactor {
                verified_at: Some(Utc::now()),
                user_verified: false,
            }),
            ..Default::default()
        };
        assert!(factors.webauthn_verified());
        assert!(!factors.passkey_verified());
    }
}
