//! The identity-service port.
//!
//! One method per consumed RPC. Implementations live in `loginflow-infra`
//! (HTTP) and in [`crate::in_memory`] (tests/dev). Callers hold an
//! `Arc<dyn IdentityService>`; nothing here caches or retries.

use thiserror::Error;

use loginflow_core::{
    AuthenticationMethodType, BrandingSettings, Checks, IdentityProvider, IdpId, IdpIntent,
    LegalAndSupportSettings, LoginError, LoginSettings, NewHumanUser, Organization, OrganizationId,
    PasswordComplexitySettings, PrivacyPolicy, Session, SessionHandle, SessionId, User, UserId,
};

/// Status code reported by the service (gRPC numbering).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RpcCode {
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl RpcCode {
    pub fn from_grpc(code: i64) -> Self {
        match code {
            1 => RpcCode::Cancelled,
            3 => RpcCode::InvalidArgument,
            4 => RpcCode::DeadlineExceeded,
            5 => RpcCode::NotFound,
            6 => RpcCode::AlreadyExists,
            7 => RpcCode::PermissionDenied,
            8 => RpcCode::ResourceExhausted,
            9 => RpcCode::FailedPrecondition,
            10 => RpcCode::Aborted,
            11 => RpcCode::OutOfRange,
            12 => RpcCode::Unimplemented,
            13 => RpcCode::Internal,
            14 => RpcCode::Unavailable,
            15 => RpcCode::DataLoss,
            16 => RpcCode::Unauthenticated,
            _ => RpcCode::Unknown,
        }
    }

    /// Best-effort mapping when the body carries no code.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 => RpcCode::InvalidArgument,
            401 => RpcCode::Unauthenticated,
            403 => RpcCode::PermissionDenied,
            404 => RpcCode::NotFound,
            409 => RpcCode::AlreadyExists,
            412 => RpcCode::FailedPrecondition,
            429 => RpcCode::ResourceExhausted,
            501 => RpcCode::Unimplemented,
            503 => RpcCode::Unavailable,
            504 => RpcCode::DeadlineExceeded,
            500 => RpcCode::Internal,
            _ => RpcCode::Unknown,
        }
    }

    pub fn as_grpc(&self) -> i64 {
        match self {
            RpcCode::Cancelled => 1,
            RpcCode::Unknown => 2,
            RpcCode::InvalidArgument => 3,
            RpcCode::DeadlineExceeded => 4,
            RpcCode::NotFound => 5,
            RpcCode::AlreadyExists => 6,
            RpcCode::PermissionDenied => 7,
            RpcCode::ResourceExhausted => 8,
            RpcCode::FailedPrecondition => 9,
            RpcCode::Aborted => 10,
            RpcCode::OutOfRange => 11,
            RpcCode::Unimplemented => 12,
            RpcCode::Internal => 13,
            RpcCode::Unavailable => 14,
            RpcCode::DataLoss => 15,
            RpcCode::Unauthenticated => 16,
        }
    }

    /// The request was understood and rejected (bad credential, used code,
    /// unknown user). Anything else is a service or transport fault.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            RpcCode::InvalidArgument
                | RpcCode::NotFound
                | RpcCode::AlreadyExists
                | RpcCode::PermissionDenied
                | RpcCode::FailedPrecondition
                | RpcCode::OutOfRange
        )
    }
}

impl core::fmt::Display for RpcCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Failure talking to the identity service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("rpc error ({code}): {message}")]
    Rpc { code: RpcCode, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),
}

impl IdentityError {
    pub fn rpc(code: RpcCode, message: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> RpcCode {
        match self {
            IdentityError::Rpc { code, .. } => *code,
            IdentityError::Transport(_) => RpcCode::Unavailable,
            IdentityError::Decode(_) => RpcCode::Internal,
        }
    }

    pub fn message(&self) -> String {
        match self {
            IdentityError::Rpc { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_rejection(&self) -> bool {
        self.code().is_rejection()
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == RpcCode::NotFound
    }

    /// The gateway error body: `{ "code": <grpc>, "message": <text> }`.
    pub fn to_body(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code().as_grpc(),
            "message": self.message(),
        })
    }
}

impl From<IdentityError> for LoginError {
    fn from(err: IdentityError) -> Self {
        match &err {
            IdentityError::Rpc { code: RpcCode::NotFound, message } => LoginError::not_found(message.clone()),
            IdentityError::Rpc { message, .. } if err.is_rejection() => LoginError::credential(message.clone()),
            _ => LoginError::transport(err.to_string()),
        }
    }
}

#[async_trait::async_trait]
pub trait IdentityService: Send + Sync {
    /// `CreateSession`; `checks.user` identifies the user.
    async fn create_session(&self, checks: Checks) -> Result<SessionHandle, IdentityError>;

    /// `SetSession`: run further checks against an existing session.
    async fn set_session(&self, session_id: &SessionId, checks: Checks) -> Result<SessionHandle, IdentityError>;

    async fn get_session(&self, session_id: &SessionId) -> Result<Session, IdentityError>;

    /// `AddHumanUser`; returns the new user's id.
    async fn add_human_user(&self, user: NewHumanUser) -> Result<UserId, IdentityError>;

    async fn verify_email(&self, user_id: &UserId, code: &str) -> Result<(), IdentityError>;

    async fn resend_email_code(&self, user_id: &UserId) -> Result<(), IdentityError>;

    async fn start_identity_provider_flow(
        &self,
        idp_id: &IdpId,
        success_url: &str,
        failure_url: &str,
    ) -> Result<IdpIntent, IdentityError>;

    /// `ListUsers` by login name (or email), optionally scoped to an organization.
    async fn list_users(
        &self,
        login_name: &str,
        organization: Option<&OrganizationId>,
    ) -> Result<Vec<User>, IdentityError>;

    async fn get_user(&self, user_id: &UserId) -> Result<User, IdentityError>;

    /// `PasswordReset`: the service sends the reset link.
    async fn password_reset(&self, user_id: &UserId) -> Result<(), IdentityError>;

    async fn list_authentication_method_types(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<AuthenticationMethodType>, IdentityError>;

    /// Organizations whose primary domain equals `domain`.
    async fn get_orgs_by_domain(&self, domain: &str) -> Result<Vec<Organization>, IdentityError>;

    async fn get_active_identity_providers(
        &self,
        organization: Option<&OrganizationId>,
    ) -> Result<Vec<IdentityProvider>, IdentityError>;

    async fn get_login_settings(&self, organization: Option<&OrganizationId>) -> Result<LoginSettings, IdentityError>;

    async fn get_branding_settings(
        &self,
        organization: Option<&OrganizationId>,
    ) -> Result<BrandingSettings, IdentityError>;

    async fn get_password_complexity_settings(
        &self,
        organization: Option<&OrganizationId>,
    ) -> Result<PasswordComplexitySettings, IdentityError>;

    async fn get_privacy_policy(&self, organization: Option<&OrganizationId>) -> Result<PrivacyPolicy, IdentityError>;

    async fn get_legal_and_support_settings(
        &self,
        organization: Option<&OrganizationId>,
    ) -> Result<LegalAndSupportSettings, IdentityError>;
}
