//! Step Resolver.
//!
//! [`resolve`] and [`resolve_page`] are pure: they look only at which context
//! fields are present. [`StepResolver`] then asks the identity service whether
//! the chosen step actually fits the session and repairs it when it does not.
//! The remote service remains the authority; this is advisory sequencing.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::instrument;

use loginflow_auth::{SessionCheck, SessionPolicy, check_session};
use loginflow_core::{
    AuthContext, AuthenticationMethodType, BrandingSettings, IdentityProvider, LoginError, LoginSettings,
    OrganizationId, Session, UserFactor, UserId,
};

use crate::port::IdentityService;
use crate::settings::{RegistrationSettings, SettingsFetcher};
use crate::step::Step;

/// Upper bound on repairs per render; each repair moves strictly towards a
/// page that renders, so this is never reached in practice.
const MAX_REPAIRS: usize = 6;

/// Step implied by the context alone.
pub fn resolve(ctx: &AuthContext) -> Step {
    if ctx.login_name().is_none() {
        return Step::EnterLoginName;
    }
    if ctx.session_id().is_none() {
        return Step::EnterPassword;
    }
    if ctx.submit() {
        return if ctx.code().is_some() {
            Step::EnterMfaCode
        } else {
            Step::ChooseMfa
        };
    }
    Step::EnterPassword
}

fn has_required_fields(page: Step, ctx: &AuthContext) -> bool {
    let login = ctx.login_name().is_some();
    let session = ctx.session_id().is_some();
    match page {
        Step::EnterLoginName | Step::Register => true,
        Step::EnterPassword | Step::ChoosePasskey => login,
        Step::ChooseMfa | Step::EnterMfaCode | Step::Done => login && session,
        Step::VerifyEmail => ctx.user_id().is_some() || login,
    }
}

/// Step for a request to `page`.
///
/// With `submit`, a deep link skips forward to a later step of the main chain
/// when the context already carries what that step needs. Otherwise the page is
/// kept if its required fields are present and falls back to [`resolve`].
pub fn resolve_page(page: Step, ctx: &AuthContext) -> Step {
    if ctx.submit() {
        let target = resolve(ctx);
        if let (Some(from), Some(to)) = (page.rank(), target.rank()) {
            if to > from {
                return target;
            }
        }
    }

    if has_required_fields(page, ctx) {
        page
    } else {
        resolve(ctx)
    }
}

/// What a step page renders besides the context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepData {
    LoginName {
        allow_register: bool,
        identity_providers: Vec<IdentityProvider>,
    },
    Password {
        password_allowed: bool,
        passkey_available: bool,
        hide_password_reset: bool,
        identity_providers: Vec<IdentityProvider>,
    },
    Passkey {
        login_name: Option<String>,
    },
    Mfa {
        methods: Vec<AuthenticationMethodType>,
        /// MFA is forced but the user has nothing registered.
        setup_required: bool,
    },
    MfaCode {
        methods: Vec<AuthenticationMethodType>,
    },
    Verify {
        user_id: Option<UserId>,
        code_prefilled: bool,
        already_verified: bool,
    },
    Register {
        register_allowed: bool,
        settings: RegistrationSettings,
    },
    Done {
        login_name: String,
        default_redirect_uri: Option<String>,
    },
}

/// A resolved step, ready to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepView {
    pub step: Step,
    pub context: AuthContext,
    pub branding: BrandingSettings,
    pub data: StepData,
}

enum Refined {
    Show(AuthContext, StepData),
    Repair(Step, AuthContext),
}

fn restart(ctx: AuthContext) -> Refined {
    Refined::Repair(Step::EnterLoginName, ctx.with_session_id(None))
}

struct SessionState {
    session: Session,
    user: UserFactor,
    check: SessionCheck,
    login: LoginSettings,
}

impl SessionState {
    fn second_factor_verified(&self) -> bool {
        self.session.factors.as_ref().is_some_and(|f| {
            f.totp_verified() || f.otp_sms_verified() || f.otp_email_verified() || f.webauthn_verified()
        })
    }
}

#[derive(Clone)]
pub struct StepResolver {
    service: Arc<dyn IdentityService>,
    settings: SettingsFetcher,
    email_verification: bool,
}

impl StepResolver {
    pub fn new(service: Arc<dyn IdentityService>) -> Self {
        Self {
            settings: SettingsFetcher::new(service.clone()),
            service,
            email_verification: false,
        }
    }

    /// Require a verified email before the flow may finish.
    pub fn with_email_verification(mut self, required: bool) -> Self {
        self.email_verification = required;
        self
    }

    /// Resolve the step to render for `page` (or for the context alone).
    #[instrument(skip(self, ctx), fields(page = ?page), err)]
    pub async fn resolve(&self, page: Option<Step>, ctx: AuthContext) -> Result<StepView, LoginError> {
        let branding = self.settings.branding(ctx.organization()).await?;

        let mut step = match page {
            Some(page) => resolve_page(page, &ctx),
            None => resolve(&ctx),
        };
        let mut ctx = ctx;

        for _ in 0..MAX_REPAIRS {
            match self.refine(step, ctx).await? {
                Refined::Show(context, data) => {
                    return Ok(StepView {
                        step,
                        context,
                        branding,
                        data,
                    });
                }
                Refined::Repair(next, next_ctx) => {
                    tracing::debug!(from = %step, to = %next, "step repaired");
                    step = next;
                    ctx = next_ctx;
                }
            }
        }

        Err(LoginError::configuration("login step could not be resolved"))
    }

    async fn refine(&self, step: Step, ctx: AuthContext) -> Result<Refined, LoginError> {
        match step {
            Step::EnterLoginName => self.login_name_page(ctx).await,
            Step::EnterPassword => self.password_page(ctx).await,
            Step::ChoosePasskey => {
                let login_name = ctx.login_name().map(str::to_string);
                Ok(Refined::Show(ctx, StepData::Passkey { login_name }))
            }
            Step::ChooseMfa => self.mfa_page(ctx).await,
            Step::EnterMfaCode => self.mfa_code_page(ctx).await,
            Step::VerifyEmail => self.verify_page(ctx).await,
            Step::Register => {
                let settings = self.settings.registration(ctx.organization()).await?;
                let register_allowed = settings.login.allow_register && settings.login.allow_username_password;
                Ok(Refined::Show(
                    ctx,
                    StepData::Register {
                        register_allowed,
                        settings,
                    },
                ))
            }
            Step::Done => self.done_page(ctx).await,
        }
    }

    async fn identity_providers(
        &self,
        login: &LoginSettings,
        organization: Option<&OrganizationId>,
    ) -> Result<Vec<IdentityProvider>, LoginError> {
        if !login.allow_external_idp {
            return Ok(Vec::new());
        }
        self.service
            .get_active_identity_providers(organization)
            .await
            .map_err(|err| {
                tracing::error!(error = %err, "failed to load identity providers");
                LoginError::configuration("could not load identity providers")
            })
    }

    /// The session's user, or `None` when there is no usable session.
    async fn session_user(&self, ctx: &AuthContext) -> Result<Option<(Session, UserFactor)>, LoginError> {
        let Some(session_id) = ctx.session_id() else {
            return Ok(None);
        };

        match self.service.get_session(session_id).await {
            Ok(session) => Ok(session.user().cloned().map(|user| (session, user))),
            Err(err) if err.is_not_found() => {
                tracing::warn!(session_id = %session_id, "session not found");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn session_state(&self, ctx: &AuthContext) -> Result<Option<SessionState>, LoginError> {
        let Some((session, user)) = self.session_user(ctx).await? else {
            return Ok(None);
        };

        let organization = ctx.organization().or(user.organization_id.as_ref());
        let login = self.settings.login(organization).await?;

        let email_verified = if self.email_verification {
            self.service.get_user(&user.id).await?.email_verified()
        } else {
            true
        };

        let policy = SessionPolicy {
            login_settings: login.clone(),
            email_verification: self.email_verification,
            email_verified,
        };
        let check = check_session(&session, &policy, Utc::now());

        Ok(Some(SessionState {
            session,
            user,
            check,
            login,
        }))
    }

    async fn second_factors(&self, user_id: &UserId) -> Result<Vec<AuthenticationMethodType>, LoginError> {
        let methods = self.service.list_authentication_method_types(user_id).await?;
        Ok(methods.into_iter().filter(|m| m.is_second_factor()).collect())
    }

    async fn login_name_page(&self, ctx: AuthContext) -> Result<Refined, LoginError> {
        let login = self.settings.login(ctx.organization()).await?;
        let identity_providers = self.identity_providers(&login, ctx.organization()).await?;

        Ok(Refined::Show(
            ctx,
            StepData::LoginName {
                allow_register: login.allow_register,
                identity_providers,
            },
        ))
    }

    async fn password_page(&self, ctx: AuthContext) -> Result<Refined, LoginError> {
        let login = self.settings.login(ctx.organization()).await?;
        let identity_providers = self.identity_providers(&login, ctx.organization()).await?;

        let user = match self.session_user(&ctx).await? {
            Some((_, user)) => user,
            None if ctx.session_id().is_some() => return Ok(restart(ctx)),
            // No session: the login name is unknown and the settings hide that.
            None => {
                return Ok(Refined::Show(
                    ctx,
                    StepData::Password {
                        password_allowed: login.allow_username_password,
                        passkey_available: false,
                        hide_password_reset: login.hide_password_reset,
                        identity_providers,
                    },
                ));
            }
        };

        let methods = self.service.list_authentication_method_types(&user.id).await?;
        let has_password = methods.contains(&AuthenticationMethodType::Password);
        let has_passkey = methods.contains(&AuthenticationMethodType::Passkey) && login.passkeys_allowed();

        if methods.is_empty() {
            // Invited user without credentials: verify the email first.
            return Ok(Refined::Repair(Step::VerifyEmail, ctx.with_user_id(Some(user.id))));
        }
        if has_passkey && !has_password {
            return Ok(Refined::Repair(Step::ChoosePasskey, ctx));
        }

        Ok(Refined::Show(
            ctx,
            StepData::Password {
                password_allowed: login.allow_username_password && has_password,
                passkey_available: has_passkey,
                hide_password_reset: login.hide_password_reset,
                identity_providers,
            },
        ))
    }

    async fn mfa_page(&self, ctx: AuthContext) -> Result<Refined, LoginError> {
        let Some(state) = self.session_state(&ctx).await? else {
            return Ok(restart(ctx));
        };
        let methods = self.second_factors(&state.user.id).await?;

        match state.check {
            SessionCheck::NoUser | SessionCheck::Expired => Ok(restart(ctx)),
            SessionCheck::MissingPrimaryFactor => Ok(Refined::Repair(Step::EnterPassword, ctx)),
            SessionCheck::EmailNotVerified => Ok(Refined::Repair(
                Step::VerifyEmail,
                ctx.with_user_id(Some(state.user.id)),
            )),
            SessionCheck::Valid if methods.is_empty() || state.second_factor_verified() => {
                Ok(Refined::Repair(Step::Done, ctx))
            }
            check => {
                let setup_required = methods.is_empty() && check == SessionCheck::MissingMultiFactor;
                Ok(Refined::Show(
                    ctx,
                    StepData::Mfa {
                        methods,
                        setup_required,
                    },
                ))
            }
        }
    }

    async fn mfa_code_page(&self, ctx: AuthContext) -> Result<Refined, LoginError> {
        let Some(state) = self.session_state(&ctx).await? else {
            return Ok(restart(ctx));
        };

        match state.check {
            SessionCheck::NoUser | SessionCheck::Expired => Ok(restart(ctx)),
            SessionCheck::MissingPrimaryFactor => Ok(Refined::Repair(Step::EnterPassword, ctx)),
            SessionCheck::EmailNotVerified => Ok(Refined::Repair(
                Step::VerifyEmail,
                ctx.with_user_id(Some(state.user.id)),
            )),
            SessionCheck::Valid | SessionCheck::MissingMultiFactor => {
                let methods = self.second_factors(&state.user.id).await?;
                Ok(Refined::Show(ctx, StepData::MfaCode { methods }))
            }
        }
    }

    async fn verify_page(&self, ctx: AuthContext) -> Result<Refined, LoginError> {
        let user_id = match ctx.user_id() {
            Some(id) => Some(id.clone()),
            None => self.find_user_id(&ctx).await?,
        };
        let code_prefilled = ctx.code().is_some();

        let Some(user_id) = user_id else {
            return Ok(Refined::Show(
                ctx,
                StepData::Verify {
                    user_id: None,
                    code_prefilled,
                    already_verified: false,
                },
            ));
        };

        let already_verified = self.service.get_user(&user_id).await?.email_verified();
        Ok(Refined::Show(
            ctx.with_user_id(Some(user_id.clone())),
            StepData::Verify {
                user_id: Some(user_id),
                code_prefilled,
                already_verified,
            },
        ))
    }

    /// The user behind the session, or the single user matching the login name.
    async fn find_user_id(&self, ctx: &AuthContext) -> Result<Option<UserId>, LoginError> {
        if let Some((_, user)) = self.session_user(ctx).await? {
            return Ok(Some(user.id));
        }
        let Some(login_name) = ctx.login_name() else {
            return Ok(None);
        };

        let users = self.service.list_users(login_name, ctx.organization()).await?;
        match users.as_slice() {
            [user] => Ok(Some(user.user_id.clone())),
            _ => Ok(None),
        }
    }

    async fn done_page(&self, ctx: AuthContext) -> Result<Refined, LoginError> {
        let Some(state) = self.session_state(&ctx).await? else {
            return Ok(restart(ctx));
        };

        match state.check {
            SessionCheck::Valid => {
                let default_redirect_uri =
                    Some(state.login.default_redirect_uri.clone()).filter(|uri| !uri.is_empty());
                Ok(Refined::Show(
                    ctx,
                    StepData::Done {
                        login_name: state.user.login_name,
                        default_redirect_uri,
                    },
                ))
            }
            SessionCheck::MissingPrimaryFactor => Ok(Refined::Repair(Step::EnterPassword, ctx)),
            SessionCheck::MissingMultiFactor => Ok(Refined::Repair(Step::ChooseMfa, ctx)),
            SessionCheck::EmailNotVerified => Ok(Refined::Repair(
                Step::VerifyEmail,
                ctx.with_user_id(Some(state.user.id)),
            )),
            SessionCheck::NoUser | SessionCheck::Expired => Ok(restart(ctx)),
        }
    }
}
