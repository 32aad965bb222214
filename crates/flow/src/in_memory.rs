//! In-memory identity service for tests/dev.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use url::Url;

use loginflow_core::{
    AuthenticationMethodType, BrandingSettings, Checks, Email, Factors, HumanProfile,
    IdentityProvider, IdpId, IdpIntent, LegalAndSupportSettings, LoginSettings, NewHumanUser, Organization,
    OrganizationId, PasswordComplexitySettings, PrivacyPolicy, Session, SessionHandle, SessionId, SettingsKind,
    User, UserCheck, UserFactor, UserId, UserState, VerifiedFactor,
};

use crate::port::{IdentityError, IdentityService, RpcCode};

const USER_NOT_FOUND: &str = "Errors.User.NotFound";
const SESSION_NOT_FOUND: &str = "Errors.Session.NotFound";

/// A user to seed the service with.
#[derive(Clone)]
pub struct SeedUser {
    login_name: String,
    email: Option<String>,
    first_name: String,
    last_name: String,
    password: Option<String>,
    otp_code: Option<String>,
    organization: Option<OrganizationId>,
    state: UserState,
    email_verified: bool,
    passkey: bool,
}

impl SeedUser {
    /// An active user whose login name is also their (verified) email.
    pub fn new(login_name: impl Into<String>) -> Self {
        Self {
            login_name: login_name.into(),
            email: None,
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            password: None,
            otp_code: None,
            organization: None,
            state: UserState::Active,
            email_verified: true,
            passkey: false,
        }
    }

    /// An email address different from the login name.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Registers TOTP; the same code is accepted for OTP via SMS and email.
    pub fn with_otp_code(mut self, code: impl Into<String>) -> Self {
        self.otp_code = Some(code.into());
        self
    }

    pub fn with_passkey(mut self) -> Self {
        self.passkey = true;
        self
    }

    pub fn with_organization(mut self, organization: OrganizationId) -> Self {
        self.organization = Some(organization);
        self
    }

    pub fn with_state(mut self, state: UserState) -> Self {
        self.state = state;
        self
    }

    pub fn with_unverified_email(mut self) -> Self {
        self.email_verified = false;
        self
    }
}

impl core::fmt::Debug for SeedUser {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SeedUser")
            .field("login_name", &self.login_name)
            .field("organization", &self.organization)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
struct StoredUser {
    user: User,
    password: Option<String>,
    otp_code: Option<String>,
    passkey: bool,
    email_code: Option<String>,
    password_resets: u32,
}

impl StoredUser {
    fn email(&self) -> Option<&str> {
        self.user
            .human
            .as_ref()
            .and_then(|h| h.email.as_ref())
            .map(|e| e.email.as_str())
    }

    fn answers_to(&self, login_name: &str) -> bool {
        self.user.preferred_login_name.eq_ignore_ascii_case(login_name)
            || self.user.login_names.iter().any(|n| n.eq_ignore_ascii_case(login_name))
            || self.email().is_some_and(|e| e.eq_ignore_ascii_case(login_name))
    }

    fn methods(&self) -> Vec<AuthenticationMethodType> {
        let mut methods = Vec::new();
        if self.password.is_some() {
            methods.push(AuthenticationMethodType::Password);
        }
        if self.passkey {
            methods.push(AuthenticationMethodType::Passkey);
        }
        if self.otp_code.is_some() {
            methods.push(AuthenticationMethodType::Totp);
        }
        methods
    }

    fn email_mut(&mut self) -> Option<&mut Email> {
        self.user.human.as_mut().and_then(|h| h.email.as_mut())
    }

    fn factor(&self) -> UserFactor {
        UserFactor {
            id: self.user.user_id.clone(),
            login_name: self.user.preferred_login_name.clone(),
            display_name: self
                .user
                .human
                .as_ref()
                .map(|h| h.display_name.clone())
                .unwrap_or_default(),
            organization_id: self.user.organization_id.clone(),
            verified_at: Some(Utc::now()),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    users: Vec<StoredUser>,
    sessions: HashMap<SessionId, Session>,
    organizations: Vec<Organization>,
    login_settings: LoginSettings,
    org_login_settings: HashMap<OrganizationId, LoginSettings>,
    branding: BrandingSettings,
    password_complexity: PasswordComplexitySettings,
    privacy: PrivacyPolicy,
    legal: LegalAndSupportSettings,
    identity_providers: Vec<IdentityProvider>,
    unavailable: Vec<SettingsKind>,
    next_id: u64,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    /// Codes are never `000000`.
    fn next_code(&mut self) -> String {
        self.next_id += 1;
        format!("{:06}", 100_000 + (self.next_id * 7_919) % 900_000)
    }

    fn settings<T: Clone>(&self, kind: SettingsKind, value: &T) -> Result<T, IdentityError> {
        if self.unavailable.contains(&kind) {
            return Err(IdentityError::rpc(RpcCode::Unavailable, format!("{kind} settings unavailable")));
        }
        Ok(value.clone())
    }

    fn user(&self, user_id: &UserId) -> Result<&StoredUser, IdentityError> {
        self.users
            .iter()
            .find(|u| &u.user.user_id == user_id)
            .ok_or_else(|| IdentityError::rpc(RpcCode::NotFound, USER_NOT_FOUND))
    }

    fn user_mut(&mut self, user_id: &UserId) -> Result<&mut StoredUser, IdentityError> {
        self.users
            .iter_mut()
            .find(|u| &u.user.user_id == user_id)
            .ok_or_else(|| IdentityError::rpc(RpcCode::NotFound, USER_NOT_FOUND))
    }

    fn find_user(&self, check: &UserCheck) -> Result<&StoredUser, IdentityError> {
        match check {
            UserCheck::UserId(id) => self.user(id),
            UserCheck::LoginName(name) => self
                .users
                .iter()
                .find(|u| u.answers_to(name))
                .ok_or_else(|| IdentityError::rpc(RpcCode::NotFound, USER_NOT_FOUND)),
        }
    }
}

/// Verify `checks` against `user` and record what passed on `factors`.
fn apply_checks(factors: &mut Factors, user: &StoredUser, checks: &Checks) -> Result<(), IdentityError> {
    match user.user.state {
        UserState::Inactive | UserState::Deleted => {
            return Err(IdentityError::rpc(RpcCode::FailedPrecondition, "Errors.User.NotActive"));
        }
        UserState::Locked => return Err(IdentityError::rpc(RpcCode::FailedPrecondition, "Errors.User.Locked")),
        _ => {}
    }

    let now = Utc::now();

    if let Some(password) = &checks.password {
        if user.password.as_deref() != Some(password.as_str()) {
            return Err(IdentityError::rpc(RpcCode::InvalidArgument, "Errors.User.Password.Invalid"));
        }
        factors.password = Some(VerifiedFactor::at(now));
    }

    let otp = |code: &String| -> Result<VerifiedFactor, IdentityError> {
        if user.otp_code.as_deref() == Some(code.as_str()) {
            Ok(VerifiedFactor::at(now))
        } else {
            Err(IdentityError::rpc(RpcCode::InvalidArgument, "Errors.User.MFA.OTP.InvalidCode"))
        }
    };

    if let Some(code) = &checks.totp {
        factors.totp = Some(otp(code)?);
    }
    if let Some(code) = &checks.otp_sms {
        factors.otp_sms = Some(otp(code)?);
    }
    if let Some(code) = &checks.otp_email {
        factors.otp_email = Some(otp(code)?);
    }

    Ok(())
}

/// Identity service backed by process memory.
///
/// - No IO
/// - Checks are applied atomically under one write lock
/// - Email codes are generated and exposed through [`InMemoryIdentityService::email_code`]
#[derive(Debug, Default)]
pub struct InMemoryIdentityService {
    state: RwLock<State>,
}

impl InMemoryIdentityService {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, IdentityError> {
        self.state
            .read()
            .map_err(|_| IdentityError::Transport("identity state lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, IdentityError> {
        self.state
            .write()
            .map_err(|_| IdentityError::Transport("identity state lock poisoned".to_string()))
    }

    fn seed(self, f: impl FnOnce(&mut State)) -> Self {
        if let Ok(mut state) = self.state.write() {
            f(&mut state);
        }
        self
    }

    pub fn with_user(self, seed: SeedUser) -> Self {
        self.seed(|state| {
            let Ok(user_id) = UserId::new(state.next_id("user")) else {
                return;
            };
            let mut stored = StoredUser {
                user: User {
                    user_id,
                    state: seed.state,
                    username: seed.login_name.clone(),
                    login_names: vec![seed.login_name.clone()],
                    preferred_login_name: seed.login_name.clone(),
                    organization_id: seed.organization,
                    human: Some(HumanProfile {
                        display_name: format!("{} {}", seed.first_name, seed.last_name),
                        given_name: seed.first_name,
                        family_name: seed.last_name,
                        email: Some(Email {
                            email: seed.email.unwrap_or(seed.login_name),
                            is_verified: seed.email_verified,
                        }),
                        phone: None,
                    }),
                },
                password: seed.password,
                otp_code: seed.otp_code,
                passkey: seed.passkey,
                email_code: None,
                password_resets: 0,
            };
            if !seed.email_verified {
                stored.email_code = Some(state.next_code());
            }
            state.users.push(stored);
        })
    }

    /// Instance-level login settings, used when no organization override exists.
    pub fn with_login_settings(self, settings: LoginSettings) -> Self {
        self.seed(|state| state.login_settings = settings)
    }

    pub fn with_org_login_settings(self, organization: OrganizationId, settings: LoginSettings) -> Self {
        self.seed(|state| {
            state.org_login_settings.insert(organization, settings);
        })
    }

    pub fn with_organization(self, organization: Organization) -> Self {
        self.seed(|state| state.organizations.push(organization))
    }

    pub fn with_identity_provider(self, idp: IdentityProvider) -> Self {
        self.seed(|state| state.identity_providers.push(idp))
    }

    pub fn with_password_complexity(self, settings: PasswordComplexitySettings) -> Self {
        self.seed(|state| state.password_complexity = settings)
    }

    pub fn with_branding(self, settings: BrandingSettings) -> Self {
        self.seed(|state| state.branding = settings)
    }

    /// Make one settings document fail with `Unavailable`.
    pub fn with_unavailable_settings(self, kind: SettingsKind) -> Self {
        self.seed(|state| state.unavailable.push(kind))
    }

    /// The pending email verification code of a user (what the email would contain).
    pub fn email_code(&self, user_id: &UserId) -> Option<String> {
        let state = self.state.read().ok()?;
        state.user(user_id).ok()?.email_code.clone()
    }

    /// Find a seeded or registered user by login name.
    pub fn user_id_of(&self, login_name: &str) -> Option<UserId> {
        let state = self.state.read().ok()?;
        state
            .users
            .iter()
            .find(|u| u.answers_to(login_name))
            .map(|u| u.user.user_id.clone())
    }

    pub fn password_resets(&self, user_id: &UserId) -> u32 {
        self.state
            .read()
            .ok()
            .and_then(|s| s.user(user_id).ok().map(|u| u.password_resets))
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl IdentityService for InMemoryIdentityService {
    async fn create_session(&self, checks: Checks) -> Result<SessionHandle, IdentityError> {
        let mut state = self.write()?;

        let check = checks
            .user
            .as_ref()
            .ok_or_else(|| IdentityError::rpc(RpcCode::InvalidArgument, "Errors.Session.User.Missing"))?;
        let user = state.find_user(check)?;

        let mut factors = Factors {
            user: Some(user.factor()),
            ..Default::default()
        };
        apply_checks(&mut factors, user, &checks)?;

        let raw = state.next_id("session");
        let session_id = SessionId::new(raw).map_err(|e| IdentityError::Decode(e.to_string()))?;
        let token = state.next_id("token");

        state.sessions.insert(
            session_id.clone(),
            Session {
                id: session_id.clone(),
                expiration_date: None,
                factors: Some(factors),
            },
        );

        Ok(SessionHandle {
            session_id,
            session_token: token,
        })
    }

    async fn set_session(&self, session_id: &SessionId, checks: Checks) -> Result<SessionHandle, IdentityError> {
        let mut state = self.write()?;

        let session = state
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| IdentityError::rpc(RpcCode::NotFound, SESSION_NOT_FOUND))?;
        let mut factors = session.factors.clone().unwrap_or_default();

        let user = match (&checks.user, &factors.user) {
            (Some(check), _) => state.find_user(check)?,
            (None, Some(factor)) => state.user(&factor.id)?,
            (None, None) => return Err(IdentityError::rpc(RpcCode::FailedPrecondition, "Errors.Session.User.Missing")),
        };
        if factors.user.is_none() {
            factors.user = Some(user.factor());
        }
        apply_checks(&mut factors, user, &checks)?;

        let token = state.next_id("token");
        state.sessions.insert(
            session_id.clone(),
            Session {
                factors: Some(factors),
                ..session
            },
        );

        Ok(SessionHandle {
            session_id: session_id.clone(),
            session_token: token,
        })
    }

    async fn get_session(&self, session_id: &SessionId) -> Result<Session, IdentityError> {
        self.read()?
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| IdentityError::rpc(RpcCode::NotFound, SESSION_NOT_FOUND))
    }

    async fn add_human_user(&self, new_user: NewHumanUser) -> Result<UserId, IdentityError> {
        let mut state = self.write()?;

        if state.users.iter().any(|u| u.answers_to(&new_user.email)) {
            return Err(IdentityError::rpc(RpcCode::AlreadyExists, "Errors.User.AlreadyExists"));
        }

        let user_id = UserId::new(state.next_id("user")).map_err(|e| IdentityError::Decode(e.to_string()))?;
        let email_code = state.next_code();

        state.users.push(StoredUser {
            user: User {
                user_id: user_id.clone(),
                state: UserState::Active,
                username: new_user.email.clone(),
                login_names: vec![new_user.email.clone()],
                preferred_login_name: new_user.email.clone(),
                organization_id: new_user.organization,
                human: Some(HumanProfile {
                    display_name: format!("{} {}", new_user.first_name, new_user.last_name),
                    given_name: new_user.first_name,
                    family_name: new_user.last_name,
                    email: Some(Email {
                        email: new_user.email,
                        is_verified: false,
                    }),
                    phone: None,
                }),
            },
            password: new_user.password,
            otp_code: None,
            passkey: false,
            email_code: Some(email_code),
            password_resets: 0,
        });

        Ok(user_id)
    }

    async fn verify_email(&self, user_id: &UserId, code: &str) -> Result<(), IdentityError> {
        let mut state = self.write()?;
        let user = state.user_mut(user_id)?;

        if user.email_code.is_none() {
            return Err(IdentityError::rpc(
                RpcCode::FailedPrecondition,
                "Errors.User.Email.AlreadyVerified",
            ));
        }
        if user.email_code.as_deref() != Some(code) {
            return Err(IdentityError::rpc(RpcCode::InvalidArgument, "Errors.User.Code.Invalid"));
        }

        user.email_code = None;
        if let Some(email) = user.email_mut() {
            email.is_verified = true;
        }
        Ok(())
    }

    async fn resend_email_code(&self, user_id: &UserId) -> Result<(), IdentityError> {
        let mut state = self.write()?;
        let code = state.next_code();
        let user = state.user_mut(user_id)?;

        if user.email_code.is_none() {
            return Err(IdentityError::rpc(
                RpcCode::FailedPrecondition,
                "Errors.User.Email.AlreadyVerified",
            ));
        }
        user.email_code = Some(code);
        Ok(())
    }

    async fn start_identity_provider_flow(
        &self,
        idp_id: &IdpId,
        success_url: &str,
        failure_url: &str,
    ) -> Result<IdpIntent, IdentityError> {
        let state = self.read()?;
        let idp = state
            .identity_providers
            .iter()
            .find(|idp| &idp.id == idp_id)
            .ok_or_else(|| IdentityError::rpc(RpcCode::NotFound, "Errors.IDPConfig.NotExisting"))?;

        let mut url = Url::parse("https://idp.example.com/authorize")
            .map_err(|e| IdentityError::Decode(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("provider", idp.kind.slug())
            .append_pair("idp", idp.id.as_str())
            .append_pair("success", success_url)
            .append_pair("failure", failure_url);

        Ok(IdpIntent::AuthUrl(url.into()))
    }

    async fn list_users(
        &self,
        login_name: &str,
        organization: Option<&OrganizationId>,
    ) -> Result<Vec<User>, IdentityError> {
        let state = self.read()?;
        Ok(state
            .users
            .iter()
            .filter(|u| u.answers_to(login_name))
            .filter(|u| organization.is_none_or(|org| u.user.organization_id.as_ref() == Some(org)))
            .map(|u| u.user.clone())
            .collect())
    }

    async fn get_user(&self, user_id: &UserId) -> Result<User, IdentityError> {
        Ok(self.read()?.user(user_id)?.user.clone())
    }

    async fn password_reset(&self, user_id: &UserId) -> Result<(), IdentityError> {
        let mut state = self.write()?;
        state.user_mut(user_id)?.password_resets += 1;
        Ok(())
    }

    async fn list_authentication_method_types(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<AuthenticationMethodType>, IdentityError> {
        Ok(self.read()?.user(user_id)?.methods())
    }

    async fn get_orgs_by_domain(&self, domain: &str) -> Result<Vec<Organization>, IdentityError> {
        let state = self.read()?;
        Ok(state
            .organizations
            .iter()
            .filter(|o| o.primary_domain.eq_ignore_ascii_case(domain))
            .cloned()
            .collect())
    }

    async fn get_active_identity_providers(
        &self,
        _organization: Option<&OrganizationId>,
    ) -> Result<Vec<IdentityProvider>, IdentityError> {
        Ok(self.read()?.identity_providers.clone())
    }

    async fn get_login_settings(&self, organization: Option<&OrganizationId>) -> Result<LoginSettings, IdentityError> {
        let state = self.read()?;
        let settings = organization
            .and_then(|org| state.org_login_settings.get(org))
            .unwrap_or(&state.login_settings);
        state.settings(SettingsKind::Login, settings)
    }

    async fn get_branding_settings(
        &self,
        _organization: Option<&OrganizationId>,
    ) -> Result<BrandingSettings, IdentityError> {
        let state = self.read()?;
        state.settings(SettingsKind::Branding, &state.branding)
    }

    async fn get_password_complexity_settings(
        &self,
        _organization: Option<&OrganizationId>,
    ) -> Result<PasswordComplexitySettings, IdentityError> {
        let state = self.read()?;
        state.settings(SettingsKind::PasswordComplexity, &state.password_complexity)
    }

    async fn get_privacy_policy(&self, _organization: Option<&OrganizationId>) -> Result<PrivacyPolicy, IdentityError> {
        let state = self.read()?;
        state.settings(SettingsKind::Privacy, &state.privacy)
    }

    async fn get_legal_and_support_settings(
        &self,
        _organization: Option<&OrganizationId>,
    ) -> Result<LegalAndSupportSettings, IdentityError> {
        let state = self.read()?;
        state.settings(SettingsKind::Legal, &state.legal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> InMemoryIdentityService {
        InMemoryIdentityService::new()
            .with_user(SeedUser::new("admin@example.com").with_password("Password1!"))
            .with_user(SeedUser::new("gone@example.com").with_state(UserState::Inactive))
    }

    #[tokio::test]
    async fn create_session_for_known_user() {
        let svc = service();
        let handle = svc
            .create_session(Checks::login_name("admin@example.com"))
            .await
            .unwrap();

        let session = svc.get_session(&handle.session_id).await.unwrap();
        assert_eq!(session.user().unwrap().login_name, "admin@example.com");
        assert!(!session.factors.unwrap().password_verified());
    }

    #[tokio::test]
    async fn unknown_and_inactive_users_are_rejected() {
        let svc = service();
        let err = svc
            .create_session(Checks::login_name("nobody@example.com"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = svc
            .create_session(Checks::login_name("gone@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), RpcCode::FailedPrecondition);
        assert_eq!(err.message(), "Errors.User.NotActive");
    }

    #[tokio::test]
    async fn password_check_on_existing_session() {
        let svc = service();
        let handle = svc
            .create_session(Checks::login_name("admin@example.com"))
            .await
            .unwrap();

        let err = svc
            .set_session(&handle.session_id, Checks::password("wrong"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), RpcCode::InvalidArgument);

        svc.set_session(&handle.session_id, Checks::password("Password1!"))
            .await
            .unwrap();
        let session = svc.get_session(&handle.session_id).await.unwrap();
        assert!(session.factors.unwrap().password_verified());
    }

    #[tokio::test]
    async fn email_verification_lifecycle() {
        let svc = InMemoryIdentityService::new();
        let user_id = svc
            .add_human_user(NewHumanUser {
                email: "new@example.com".into(),
                first_name: "New".into(),
                last_name: "User".into(),
                password: None,
                organization: None,
            })
            .await
            .unwrap();

        let err = svc.verify_email(&user_id, "000000").await.unwrap_err();
        assert_eq!(err.code(), RpcCode::InvalidArgument);

        let code = svc.email_code(&user_id).unwrap();
        svc.verify_email(&user_id, &code).await.unwrap();
        assert!(svc.get_user(&user_id).await.unwrap().email_verified());

        let err = svc.resend_email_code(&user_id).await.unwrap_err();
        assert_eq!(err.message(), "Errors.User.Email.AlreadyVerified");
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let svc = service();
        let err = svc
            .add_human_user(NewHumanUser {
                email: "ADMIN@example.com".into(),
                first_name: "A".into(),
                last_name: "B".into(),
                password: None,
                organization: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), RpcCode::AlreadyExists);
    }

    #[tokio::test]
    async fn org_login_settings_override_instance_defaults() {
        let org = OrganizationId::new("org-1").unwrap();
        let svc = InMemoryIdentityService::new().with_org_login_settings(
            org.clone(),
            LoginSettings {
                allow_register: true,
                ..Default::default()
            },
        );

        assert!(svc.get_login_settings(Some(&org)).await.unwrap().allow_register);
        assert!(!svc.get_login_settings(None).await.unwrap().allow_register);
    }
}
