//! Session validity, as required before the flow may finish.

use chrono::{DateTime, Utc};
use serde::Serialize;

use loginflow_core::{LoginSettings, Session};

/// Inputs besides the session itself.
#[derive(Debug, Clone, Default)]
pub struct SessionPolicy {
    /// Login settings of the user's organization.
    pub login_settings: LoginSettings,
    /// Require a verified email address.
    pub email_verification: bool,
    /// Whether the user's email is verified (only consulted when required).
    pub email_verified: bool,
}

/// Why a session is (not) usable.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionCheck {
    Valid,
    NoUser,
    Expired,
    /// No password, passkey or federated login verified.
    MissingPrimaryFactor,
    /// The policy forces MFA and no second factor is verified.
    MissingMultiFactor,
    EmailNotVerified,
}

impl SessionCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, SessionCheck::Valid)
    }
}

/// Decide whether `session` may complete the login.
///
/// - No IO
/// - Federated (IdP intent) logins skip the MFA policy
/// - A passkey login counts as multi-factor
pub fn check_session(session: &Session, policy: &SessionPolicy, now: DateTime<Utc>) -> SessionCheck {
    let Some(factors) = session.factors.as_ref().filter(|f| f.user.is_some()) else {
        tracing::warn!(session_id = %session.id, "session has no user");
        return SessionCheck::NoUser;
    };

    if session.is_expired(now) {
        tracing::warn!(session_id = %session.id, "session is expired");
        return SessionCheck::Expired;
    }

    let idp = factors.intent_verified();
    let passkey = factors.passkey_verified();
    let password = factors.password_verified();

    if !(idp || passkey || password) {
        return SessionCheck::MissingPrimaryFactor;
    }

    if !idp && !passkey {
        let settings = &policy.login_settings;
        let mfa_required = settings.force_mfa || settings.force_mfa_local_only;
        let second_factor = factors.totp_verified()
            || factors.otp_email_verified()
            || factors.otp_sms_verified()
            || factors.webauthn_verified();

        if mfa_required && !second_factor {
            tracing::warn!(session_id = %session.id, "session has no valid multifactor");
            return SessionCheck::MissingMultiFactor;
        }
    }

    if policy.email_verification && !policy.email_verified {
        tracing::warn!(session_id = %session.id, "email not verified");
        return SessionCheck::EmailNotVerified;
    }

    SessionCheck::Valid
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use loginflow_core::{Factors, SessionId, UserFactor, UserId, VerifiedFactor, WebAuthnFactor};

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn user() -> UserFactor {
        UserFactor {
            id: UserId::new("test-user-id").unwrap(),
            login_name: "test@example.com".to_string(),
            display_name: "Test User".to_string(),
            organization_id: None,
            verified_at: Some(now()),
        }
    }

    fn session(factors: Option<Factors>) -> Session {
        Session {
            id: SessionId::new("session-id").unwrap(),
            expiration_date: Some(now() + Duration::hours(1)),
            factors,
        }
    }

    fn password_only() -> Factors {
        Factors {
            user: Some(user()),
            password: Some(VerifiedFactor::at(now())),
            ..Default::default()
        }
    }

    fn forced_mfa() -> SessionPolicy {
        SessionPolicy {
            login_settings: LoginSettings {
                force_mfa: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn session_without_user_is_invalid() {
        let check = check_session(&session(None), &SessionPolicy::default(), now());
        assert_eq!(check, SessionCheck::NoUser);
    }

    #[test]
    fn expired_session_is_invalid() {
        let mut s = session(Some(password_only()));
        s.expiration_date = Some(now() - Duration::hours(1));
        assert_eq!(check_session(&s, &SessionPolicy::default(), now()), SessionCheck::Expired);
    }

    #[test]
    fn user_without_credential_is_missing_primary_factor() {
        let s = session(Some(Factors {
            user: Some(user()),
            ..Default::default()
        }));
        assert_eq!(
            check_session(&s, &SessionPolicy::default(), now()),
            SessionCheck::MissingPrimaryFactor
        );
    }

    #[test]
    fn password_only_is_valid_when_mfa_not_forced() {
        let s = session(Some(password_only()));
        assert!(check_session(&s, &SessionPolicy::default(), now()).is_valid());
    }

    #[test]
    fn password_only_is_rejected_when_mfa_forced() {
        let s = session(Some(password_only()));
        assert_eq!(check_session(&s, &forced_mfa(), now()), SessionCheck::MissingMultiFactor);
    }

    #[test]
    fn totp_satisfies_forced_mfa() {
        let s = session(Some(Factors {
            totp: Some(VerifiedFactor::at(now())),
            ..password_only()
        }));
        assert!(check_session(&s, &forced_mfa(), now()).is_valid());
    }

    #[test]
    fn webauthn_satisfies_local_only_mfa() {
        let policy = SessionPolicy {
            login_settings: LoginSettings {
                force_mfa_local_only: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let s = session(Some(Factors {
            web_authn: Some(WebAuthnFactor {
                verified_at: Some(now()),
                user_verified: false,
            }),
            ..password_only()
        }));
        assert!(check_session(&s, &policy, now()).is_valid());
    }

    #[test]
    fn idp_login_skips_forced_mfa() {
        let s = session(Some(Factors {
            user: Some(user()),
            intent: Some(VerifiedFactor::at(now())),
            ..Default::default()
        }));
        assert!(check_session(&s, &forced_mfa(), now()).is_valid());
    }

    #[test]
    fn passkey_login_counts_as_multifactor() {
        let s = session(Some(Factors {
            user: Some(user()),
            web_authn: Some(WebAuthnFactor {
                verified_at: Some(now()),
                user_verified: true,
            }),
            ..Default::default()
        }));
        assert!(check_session(&s, &forced_mfa(), now()).is_valid());
    }

    #[test]
    fn unverified_email_blocks_when_required() {
        let s = session(Some(password_only()));
        let mut policy = SessionPolicy {
            email_verification: true,
            email_verified: false,
            ..Default::default()
        };
        assert_eq!(check_session(&s, &policy, now()), SessionCheck::EmailNotVerified);

        policy.email_verified = true;
        assert!(check_session(&s, &policy, now()).is_valid());
    }
}
