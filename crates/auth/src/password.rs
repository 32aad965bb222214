//! Password complexity checks, run before anything is sent to the service.

use serde::Serialize;

use loginflow_core::PasswordComplexitySettings;

/// A complexity rule the password failed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordRule {
    MinLength,
    Uppercase,
    Lowercase,
    Number,
    Symbol,
}

impl PasswordRule {
    pub fn describe(&self, settings: &PasswordComplexitySettings) -> String {
        match self {
            PasswordRule::MinLength => format!("at least {} characters", settings.min_length),
            PasswordRule::Uppercase => "an uppercase letter".to_string(),
            PasswordRule::Lowercase => "a lowercase letter".to_string(),
            PasswordRule::Number => "a number".to_string(),
            PasswordRule::Symbol => "a symbol".to_string(),
        }
    }
}

/// Returns every rule the password violates (empty `Err` never happens).
pub fn check_password(password: &str, settings: &PasswordComplexitySettings) -> Result<(), Vec<PasswordRule>> {
    let mut failed = Vec::new();

    if (password.chars().count() as u64) < u64::from(settings.min_length) {
        failed.push(PasswordRule::MinLength);
    }
    if settings.requires_uppercase && !password.chars().any(char::is_uppercase) {
        failed.push(PasswordRule::Uppercase);
    }
    if settings.requires_lowercase && !password.chars().any(char::is_lowercase) {
        failed.push(PasswordRule::Lowercase);
    }
    if settings.requires_number && !password.chars().any(|c| c.is_ascii_digit()) {
        failed.push(PasswordRule::Number);
    }
    if settings.requires_symbol && !password.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace()) {
        failed.push(PasswordRule::Symbol);
    }

    if failed.is_empty() { Ok(()) } else { Err(failed) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strict() -> PasswordComplexitySettings {
        PasswordComplexitySettings {
            min_length: 8,
            requires_uppercase: true,
            requires_lowercase: true,
            requires_number: true,
            requires_symbol: true,
        }
    }

    #[test]
    fn strong_password_passes() {
        assert_eq!(check_password("Passw0rd!", &strict()), Ok(()));
    }

    #[test]
    fn reports_every_failed_rule() {
        let failed = check_password("abc", &strict()).unwrap_err();
        assert_eq!(
            failed,
            vec![
                PasswordRule::MinLength,
                PasswordRule::Uppercase,
                PasswordRule::Number,
                PasswordRule::Symbol
            ]
        );
    }

    #[test]
    fn empty_policy_accepts_anything() {
        assert!(check_password("", &PasswordComplexitySettings::default()).is_ok());
    }

    #[test]
    fn min_length_counts_characters_not_bytes() {
        let settings = PasswordComplexitySettings {
            min_length: 4,
            ..Default::default()
        };
        assert!(check_password("äöüß", &settings).is_ok());
        assert!(check_password("äöü", &settings).is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 64,
                ..ProptestConfig::default()
            })]

            #[test]
            fn passwords_built_from_every_class_pass(
                upper in "[A-Z]{1,4}",
                lower in "[a-z]{1,4}",
                digits in "[0-9]{1,4}",
                symbols in "[!#$%&*+?@]{1,4}",
            ) {
                let password = format!("{upper}{lower}{digits}{symbols}");
                let settings = PasswordComplexitySettings {
                    min_length: password.chars().count() as u32,
                    ..strict()
                };
                prop_assert_eq!(check_password(&password, &settings), Ok(()));
            }

            #[test]
            fn lowercase_only_never_satisfies_strict(password in "[a-z]{0,16}") {
                let failed = check_password(&password, &strict()).unwrap_err();
                prop_assert!(failed.contains(&PasswordRule::Uppercase));
                prop_assert!(failed.contains(&PasswordRule::Number));
                prop_assert!(failed.contains(&PasswordRule::Symbol));
                prop_assert!(!failed.contains(&PasswordRule::Lowercase) || password.is_empty());
            }
        }
    }
}
