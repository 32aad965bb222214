//! Form Submission Adapter.
//!
//! One operation per step form, each making exactly one identity-service call.
//! Results are classified into [`StepResult`]; nothing is retried.

use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;

use loginflow_auth::{RedirectPolicy, check_password, validate_email, validate_redirect_uri};
use loginflow_core::{
    AuthContext, Checks, IdpId, IdpIntent, LoginError, NewHumanUser, PasswordComplexitySettings, UserCheck, UserId,
};

use crate::port::{IdentityError, IdentityService, RpcCode};
use crate::step::Step;

pub const USER_NOT_FOUND: &str = "User not found in the system";
pub const USER_NOT_ACTIVE: &str = "User is not active";
pub const PASSWORD_INVALID: &str = "Failed to authenticate. Password invalid.";
pub const CODE_INVALID: &str = "Could not verify code";
pub const EMAIL_NOT_VERIFIED: &str = "Could not verify email";
const GENERIC_FAILURE: &str = "An internal error occurred. Please try again.";

/// Where a successful submission leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Step { step: Step, context: AuthContext },
    /// Leave the login UI for an external identity provider.
    External(IdpIntent),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedisplayReason {
    Validation,
    Credential,
    NotFound,
}

/// Outcome of one form submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    Advance(Transition),
    /// Show the same step again with an inline message.
    Redisplay { message: String, reason: RedisplayReason },
    /// Not recoverable by the user; rendered by the error boundary.
    Fatal(String),
}

impl StepResult {
    fn advance(step: Step, context: AuthContext) -> Self {
        StepResult::Advance(Transition::Step { step, context })
    }

    pub fn redisplay(message: impl Into<String>, reason: RedisplayReason) -> Self {
        StepResult::Redisplay {
            message: message.into(),
            reason,
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self::redisplay(message, RedisplayReason::Validation)
    }

    /// Classify a failed call; rejections show `message`, faults go fatal.
    fn from_rpc(err: IdentityError, message: &str) -> Self {
        if err.is_not_found() {
            return Self::redisplay(message, RedisplayReason::NotFound);
        }
        if err.is_rejection() {
            tracing::info!(code = %err.code(), "submission rejected");
            return Self::redisplay(message, RedisplayReason::Credential);
        }
        tracing::error!(error = %err, "identity service failure");
        StepResult::Fatal(GENERIC_FAILURE.to_string())
    }

    /// The same result expressed in the error taxonomy, if it is not an advance.
    pub fn error(&self) -> Option<LoginError> {
        match self {
            StepResult::Advance(_) => None,
            StepResult::Redisplay {
                message,
                reason: RedisplayReason::Validation,
            } => Some(LoginError::validation(message.clone())),
            StepResult::Redisplay {
                message,
                reason: RedisplayReason::Credential,
            } => Some(LoginError::credential(message.clone())),
            StepResult::Redisplay {
                message,
                reason: RedisplayReason::NotFound,
            } => Some(LoginError::not_found(message.clone())),
            StepResult::Fatal(message) => Some(LoginError::transport(message.clone())),
        }
    }
}

/// One-time password channel of the MFA code step.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpMethod {
    Totp,
    Sms,
    Email,
}

impl OtpMethod {
    fn checks(&self, code: String) -> Checks {
        match self {
            OtpMethod::Totp => Checks {
                totp: Some(code),
                ..Default::default()
            },
            OtpMethod::Sms => Checks {
                otp_sms: Some(code),
                ..Default::default()
            },
            OtpMethod::Email => Checks {
                otp_email: Some(code),
                ..Default::default()
            },
        }
    }
}

/// Registration input checks, run before `AddHumanUser`.
pub fn validate_registration(user: &NewHumanUser, complexity: &PasswordComplexitySettings) -> Result<(), LoginError> {
    validate_email(&user.email).map_err(|e| LoginError::validation(format!("Invalid email address: {e}")))?;

    if user.first_name.trim().is_empty() || user.last_name.trim().is_empty() {
        return Err(LoginError::validation("First name and last name are required"));
    }

    if let Some(password) = &user.password {
        if let Err(rules) = check_password(password, complexity) {
            let missing: Vec<String> = rules.iter().map(|r| r.describe(complexity)).collect();
            return Err(LoginError::validation(format!(
                "Password must contain {}",
                missing.join(", ")
            )));
        }
    }

    Ok(())
}

#[derive(Clone)]
pub struct FormSubmissionAdapter {
    service: Arc<dyn IdentityService>,
    redirect_policy: RedirectPolicy,
}

impl FormSubmissionAdapter {
    pub fn new(service: Arc<dyn IdentityService>, redirect_policy: RedirectPolicy) -> Self {
        Self {
            service,
            redirect_policy,
        }
    }

    /// `CreateSession` for the entered login name.
    #[instrument(skip_all, fields(auth_request_id = ?ctx.auth_request_id()))]
    pub async fn submit_login_name(&self, ctx: &AuthContext, login_name: &str) -> StepResult {
        let login_name = login_name.trim();
        if login_name.is_empty() {
            return StepResult::invalid("Please enter a login name");
        }

        match self
            .service
            .create_session(Checks::login_name(login_name))
            .await
        {
            Ok(handle) => {
                tracing::info!(session_id = %handle.session_id, "session created");
                let next = ctx
                    .clone()
                    .with_login_name(login_name)
                    .with_session_id(Some(handle.session_id))
                    .without_code()
                    .with_submit(false);
                StepResult::advance(Step::EnterPassword, next)
            }
            Err(err) if err.code() == RpcCode::FailedPrecondition => {
                StepResult::redisplay(USER_NOT_ACTIVE, RedisplayReason::Credential)
            }
            Err(err) => StepResult::from_rpc(err, USER_NOT_FOUND),
        }
    }

    /// Password check on the existing session, or a new session when none exists.
    #[instrument(skip_all, fields(session_id = ?ctx.session_id()))]
    pub async fn submit_password(&self, ctx: &AuthContext, password: &str) -> StepResult {
        if password.is_empty() {
            return StepResult::invalid("Please enter your password");
        }

        let result = match (ctx.session_id(), ctx.login_name()) {
            (Some(session_id), _) => self.service.set_session(session_id, Checks::password(password)).await,
            (None, Some(login_name)) => {
                let checks = Checks {
                    user: Some(UserCheck::LoginName(login_name.to_string())),
                    ..Checks::password(password)
                };
                self.service.create_session(checks).await
            }
            (None, None) => return StepResult::invalid("Please enter a login name"),
        };

        match result {
            Ok(handle) => {
                let next = ctx
                    .clone()
                    .with_session_id(Some(handle.session_id))
                    .without_code()
                    .with_submit(false);
                StepResult::advance(Step::ChooseMfa, next)
            }
            // Unknown users get the password message too.
            Err(err) if err.is_not_found() => StepResult::redisplay(PASSWORD_INVALID, RedisplayReason::Credential),
            Err(err) => StepResult::from_rpc(err, PASSWORD_INVALID),
        }
    }

    /// Second-factor code against the current session.
    #[instrument(skip_all, fields(session_id = ?ctx.session_id()))]
    pub async fn submit_mfa_code(&self, ctx: &AuthContext, method: OtpMethod, code: &str) -> StepResult {
        let code = code.trim();
        if code.is_empty() {
            return StepResult::invalid("Please enter the code");
        }
        let Some(session_id) = ctx.session_id() else {
            return StepResult::invalid("Session is missing, please start again");
        };

        match self.service.set_session(session_id, method.checks(code.to_string())).await {
            Ok(handle) => {
                let next = ctx
                    .clone()
                    .with_session_id(Some(handle.session_id))
                    .without_code()
                    .with_submit(false);
                StepResult::advance(Step::Done, next)
            }
            Err(err) => StepResult::from_rpc(err, CODE_INVALID),
        }
    }

    /// `VerifyEmail`; afterwards the flow continues where it left off.
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn verify_code(&self, ctx: &AuthContext, user_id: &UserId, code: &str) -> StepResult {
        let code = code.trim();
        if code.is_empty() {
            return StepResult::invalid("Please enter the code");
        }

        match self.service.verify_email(user_id, code).await {
            Ok(()) => {
                let next_step = match (ctx.session_id(), ctx.login_name()) {
                    (Some(_), _) => Step::Done,
                    (None, Some(_)) => Step::EnterPassword,
                    (None, None) => Step::EnterLoginName,
                };
                let next = ctx
                    .clone()
                    .with_user_id(Some(user_id.clone()))
                    .without_code()
                    .with_submit(false);
                StepResult::advance(next_step, next)
            }
            Err(err) => StepResult::from_rpc(err, EMAIL_NOT_VERIFIED),
        }
    }

    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn resend_code(&self, ctx: &AuthContext, user_id: &UserId) -> StepResult {
        match self.service.resend_email_code(user_id).await {
            Ok(()) => {
                let next = ctx
                    .clone()
                    .with_user_id(Some(user_id.clone()))
                    .without_code()
                    .with_submit(false);
                StepResult::advance(Step::VerifyEmail, next)
            }
            Err(err) => StepResult::from_rpc(err, "Could not resend verification email"),
        }
    }

    /// `AddHumanUser` after local validation; continues with email verification.
    #[instrument(skip_all, fields(organization = ?user.organization))]
    pub async fn register(
        &self,
        ctx: &AuthContext,
        user: NewHumanUser,
        complexity: &PasswordComplexitySettings,
    ) -> StepResult {
        if let Err(err) = validate_registration(&user, complexity) {
            return StepResult::invalid(err.to_string());
        }

        let email = user.email.trim().to_string();
        let organization = user.organization.clone().or_else(|| ctx.organization().cloned());
        let user = NewHumanUser {
            email: email.clone(),
            organization: organization.clone(),
            ..user
        };

        match self.service.add_human_user(user).await {
            Ok(user_id) => {
                tracing::info!(user_id = %user_id, "user registered");
                let next = ctx
                    .clone()
                    .with_user_id(Some(user_id))
                    .with_login_name(email)
                    .with_organization(organization)
                    .with_session_id(None)
                    .without_code()
                    .with_submit(false);
                StepResult::advance(Step::VerifyEmail, next)
            }
            Err(err) if err.code() == RpcCode::AlreadyExists => {
                StepResult::redisplay("User already exists", RedisplayReason::Validation)
            }
            Err(err) => StepResult::from_rpc(err, "Could not register user"),
        }
    }

    /// Validate the callback URLs, then ask the service where to send the browser.
    #[instrument(skip_all, fields(idp_id = %idp_id))]
    pub async fn start_identity_provider_flow(&self, idp_id: &IdpId, success_url: &str, failure_url: &str) -> StepResult {
        for url in [success_url, failure_url] {
            if let Err(err) = validate_redirect_uri(url, &self.redirect_policy) {
                tracing::warn!(error = %err, "rejected identity provider callback url");
                return StepResult::invalid(err.to_string());
            }
        }

        match self
            .service
            .start_identity_provider_flow(idp_id, success_url, failure_url)
            .await
        {
            Ok(intent) => StepResult::Advance(Transition::External(intent)),
            Err(err) => StepResult::from_rpc(err, "Could not start identity provider flow"),
        }
    }
}
