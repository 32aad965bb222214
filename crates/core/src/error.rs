//! Login error taxonomy.

use thiserror::Error;

/// Result type used across the login-flow crates.
pub type LoginResult<T> = Result<T, LoginError>;

/// Login-flow error.
///
/// `Validation` and `Credential` are user-recoverable: the current step is
/// redisplayed with an inline message. `Configuration` and `Transport` go to the
/// page-level error boundary. `NotFound` is a lookup that matched zero or several
/// users.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoginError {
    /// Required settings could not be loaded; the page cannot render.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// User input rejected before any remote call.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The identity service rejected a credential, code or token.
    #[error("{0}")]
    Credential(String),

    /// The identity service was unreachable or failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// A lookup returned zero or multiple matches.
    #[error("not found: {0}")]
    NotFound(String),
}

impl LoginError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn credential(msg: impl Into<String>) -> Self {
        Self::Credential(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Whether the current step can be redisplayed with an inline message.
    pub fn is_user_recoverable(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Credential(_))
    }

    /// Stable machine-readable code, used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::Validation(_) => "validation_error",
            Self::Credential(_) => "credential_error",
            Self::Transport(_) => "transport_error",
            Self::NotFound(_) => "not_found",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_errors_are_validation_and_credential() {
        assert!(LoginError::validation("bad email").is_user_recoverable());
        assert!(LoginError::credential("bad password").is_user_recoverable());
        assert!(!LoginError::configuration("no settings").is_user_recoverable());
        assert!(!LoginError::transport("timeout").is_user_recoverable());
        assert!(!LoginError::not_found("user").is_user_recoverable());
    }

    #[test]
    fn credential_message_is_shown_verbatim() {
        let err = LoginError::credential("Could not verify email");
        assert_eq!(err.to_string(), "Could not verify email");
        assert_eq!(err.code(), "credential_error");
    }
}
