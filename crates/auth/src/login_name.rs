//! Login-name and email checks.

use thiserror::Error;

use loginflow_core::{LoginSettings, User};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoginNameError {
    #[error("email must not be empty")]
    Empty,

    #[error("email is malformed")]
    Malformed,
}

/// Shallow syntactic email check: one `@`, non-empty local part, dotted domain.
pub fn validate_email(email: &str) -> Result<(), LoginNameError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(LoginNameError::Empty);
    }

    let (local, domain) = email.split_once('@').ok_or(LoginNameError::Malformed)?;
    let well_formed = !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split('.')
            .all(|label| !label.is_empty())
        && domain.contains('.');

    if well_formed { Ok(()) } else { Err(LoginNameError::Malformed) }
}

/// The part after the first `@`, used for organization discovery.
pub fn domain_suffix(login_name: &str) -> Option<&str> {
    login_name
        .split_once('@')
        .map(|(_, suffix)| suffix)
        .filter(|s| !s.is_empty())
}

/// Whether `entered` may log in as `user` under the user's login settings.
///
/// With email and/or phone login disabled, only the preferred login name (or
/// the remaining allowed identifier) is accepted.
pub fn matches_login_policy(entered: &str, user: &User, settings: &LoginSettings) -> bool {
    let preferred = user.preferred_login_name == entered;
    let human = user.human.as_ref();
    let by_email = human
        .and_then(|h| h.email.as_ref())
        .is_some_and(|e| e.email.eq_ignore_ascii_case(entered));
    let by_phone = human
        .and_then(|h| h.phone.as_ref())
        .is_some_and(|p| p.phone == entered);

    match (settings.disable_login_with_email, settings.disable_login_with_phone) {
        (true, true) => preferred,
        (true, false) => preferred || by_phone,
        (false, true) => preferred || by_email,
        (false, false) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loginflow_core::{Email, HumanProfile, Phone, UserId};

    fn user() -> User {
        User {
            user_id: UserId::new("1").unwrap(),
            state: Default::default(),
            username: "alice".to_string(),
            login_names: vec!["alice@acme.example".to_string()],
            preferred_login_name: "alice@acme.example".to_string(),
            organization_id: None,
            human: Some(HumanProfile {
                email: Some(Email {
                    email: "alice@mail.example".to_string(),
                    is_verified: true,
                }),
                phone: Some(Phone {
                    phone: "+41790000000".to_string(),
                    is_verified: true,
                }),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn email_validation() {
        assert!(validate_email("admin@example.com").is_ok());
        assert_eq!(validate_email("  "), Err(LoginNameError::Empty));
        assert_eq!(validate_email("admin"), Err(LoginNameError::Malformed));
        assert_eq!(validate_email("@example.com"), Err(LoginNameError::Malformed));
        assert_eq!(validate_email("a@b@example.com"), Err(LoginNameError::Malformed));
        assert_eq!(validate_email("a@localhost"), Err(LoginNameError::Malformed));
        assert_eq!(validate_email("a b@example.com"), Err(LoginNameError::Malformed));
    }

    #[test]
    fn suffix_extraction() {
        assert_eq!(domain_suffix("alice@acme.example"), Some("acme.example"));
        assert_eq!(domain_suffix("alice"), None);
        assert_eq!(domain_suffix("alice@"), None);
    }

    #[test]
    fn login_policy_restricts_identifiers() {
        let u = user();
        let open = LoginSettings::default();
        assert!(matches_login_policy("alice@mail.example", &u, &open));

        let no_email = LoginSettings {
            disable_login_with_email: true,
            ..Default::default()
        };
        assert!(!matches_login_policy("alice@mail.example", &u, &no_email));
        assert!(matches_login_policy("+41790000000", &u, &no_email));

        let neither = LoginSettings {
            disable_login_with_email: true,
            disable_login_with_phone: true,
            ..Default::default()
        };
        assert!(matches_login_policy("alice@acme.example", &u, &neither));
        assert!(!matches_login_policy("+41790000000", &u, &neither));
    }
}
