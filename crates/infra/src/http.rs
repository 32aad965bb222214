//! Identity-service client over the REST/JSON gateway.
//!
//! Wire shapes stay private to this module and are mapped onto the
//! `loginflow-core` types at the boundary.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use tracing::instrument;
use url::Url;

use loginflow_core::{
    AuthenticationMethodType, BrandingSettings, Checks, Email, HumanProfile, IdentityProvider,
    IdpId, IdpIntent, LegalAndSupportSettings, LoginSettings, NewHumanUser, Organization, OrganizationId,
    PasswordComplexitySettings, Phone, PrivacyPolicy, Session, SessionHandle, SessionId, User, UserCheck, UserId,
    UserState,
};
use loginflow_flow::{IdentityError, IdentityService, RpcCode};

#[derive(Clone)]
pub struct HttpIdentityService {
    client: reqwest::Client,
    base_url: Url,
    token: String,
}

impl core::fmt::Debug for HttpIdentityService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HttpIdentityService")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

/// Gateway error body.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: String,
}

impl HttpIdentityService {
    /// `base_url` may carry a path prefix; request paths are joined below it.
    pub fn new(mut base_url: Url, token: impl Into<String>, timeout: Duration) -> Result<Self, IdentityError> {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            token: token.into(),
        })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, IdentityError> {
        let url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| IdentityError::Transport(format!("invalid request url: {e}")))?;
        Ok(self.client.request(method, url).bearer_auth(&self.token))
    }

    /// Attach `ctx.orgId` when an organization is given (settings endpoints).
    fn scoped(&self, path: &str, organization: Option<&OrganizationId>) -> Result<RequestBuilder, IdentityError> {
        let req = self.request(Method::GET, path)?;
        Ok(match organization {
            Some(org) => req.query(&[("ctx.orgId", org.as_str())]),
            None => req.query(&[("ctx.instance", "true")]),
        })
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, IdentityError> {
        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                IdentityError::rpc(RpcCode::DeadlineExceeded, e.to_string())
            } else {
                IdentityError::Transport(e.to_string())
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Self::error_from(status, resp.text().await.unwrap_or_default()));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;
        // Empty bodies decode as `{}`.
        let body: &[u8] = if body.is_empty() { b"{}" } else { &body };
        serde_json::from_slice(body).map_err(|e| IdentityError::Decode(e.to_string()))
    }

    fn error_from(status: StatusCode, body: String) -> IdentityError {
        match serde_json::from_str::<ErrorBody>(&body) {
            Ok(ErrorBody { code: Some(code), message }) => IdentityError::rpc(RpcCode::from_grpc(code), message),
            Ok(ErrorBody { code: None, message }) if !message.is_empty() => {
                IdentityError::rpc(RpcCode::from_http_status(status.as_u16()), message)
            }
            _ => IdentityError::rpc(RpcCode::from_http_status(status.as_u16()), format!("http status {status}")),
        }
    }
}

fn checks_body(checks: &Checks) -> serde_json::Value {
    let mut body = serde_json::Map::new();
    match &checks.user {
        Some(UserCheck::LoginName(name)) => {
            body.insert("user".into(), json!({ "loginName": name }));
        }
        Some(UserCheck::UserId(id)) => {
            body.insert("user".into(), json!({ "userId": id }));
        }
        None => {}
    }
    if let Some(password) = &checks.password {
        body.insert("password".into(), json!({ "password": password }));
    }
    if let Some(code) = &checks.totp {
        body.insert("totp".into(), json!({ "code": code }));
    }
    if let Some(code) = &checks.otp_sms {
        body.insert("otpSms".into(), json!({ "code": code }));
    }
    if let Some(code) = &checks.otp_email {
        body.insert("otpEmail".into(), json!({ "code": code }));
    }
    serde_json::Value::Object(body)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionResponse {
    session_id: SessionId,
    #[serde(default)]
    session_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetSessionResponse {
    #[serde(default)]
    session_token: String,
}

#[derive(Deserialize)]
struct GetSessionResponse {
    session: Session,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddHumanUserResponse {
    user_id: UserId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdpIntentResponse {
    #[serde(default)]
    auth_url: Option<String>,
    #[serde(default)]
    post_form: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireProfile {
    given_name: String,
    family_name: String,
    display_name: String,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireHuman {
    profile: WireProfile,
    email: Option<Email>,
    phone: Option<Phone>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireDetails {
    resource_owner: Option<OrganizationId>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUser {
    user_id: UserId,
    #[serde(default)]
    state: UserState,
    #[serde(default)]
    username: String,
    #[serde(default)]
    login_names: Vec<String>,
    #[serde(default)]
    preferred_login_name: String,
    #[serde(default)]
    details: WireDetails,
    #[serde(default)]
    human: Option<WireHuman>,
}

impl From<WireUser> for User {
    fn from(w: WireUser) -> Self {
        User {
            user_id: w.user_id,
            state: w.state,
            username: w.username,
            login_names: w.login_names,
            preferred_login_name: w.preferred_login_name,
            organization_id: w.details.resource_owner,
            human: w.human.map(|h| HumanProfile {
                given_name: h.profile.given_name,
                family_name: h.profile.family_name,
                display_name: h.profile.display_name,
                email: h.email,
                phone: h.phone,
            }),
        }
    }
}

#[derive(Deserialize)]
struct ListUsersResponse {
    #[serde(default)]
    result: Vec<WireUser>,
}

#[derive(Deserialize)]
struct GetUserResponse {
    user: WireUser,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthMethodsResponse {
    #[serde(default)]
    auth_method_types: Vec<AuthenticationMethodType>,
}

#[derive(Deserialize)]
struct ListOrganizationsResponse {
    #[serde(default)]
    result: Vec<Organization>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityProvidersResponse {
    #[serde(default)]
    identity_providers: Vec<IdentityProvider>,
}

#[derive(Deserialize)]
struct SettingsResponse<T> {
    #[serde(default)]
    settings: Option<T>,
}

#[derive(Deserialize)]
struct PolicyResponse<T> {
    #[serde(default)]
    policy: Option<T>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireTheme {
    primary_color: String,
    background_color: String,
    warn_color: String,
    font_color: String,
    logo_url: String,
    icon_url: String,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireBranding {
    light_theme: WireTheme,
    hide_login_name_suffix: bool,
    disable_watermark: bool,
}

impl From<WireBranding> for BrandingSettings {
    fn from(w: WireBranding) -> Self {
        BrandingSettings {
            primary_color: w.light_theme.primary_color,
            background_color: w.light_theme.background_color,
            warn_color: w.light_theme.warn_color,
            font_color: w.light_theme.font_color,
            logo_url: w.light_theme.logo_url,
            icon_url: w.light_theme.icon_url,
            hide_login_name_suffix: w.hide_login_name_suffix,
            disable_watermark: w.disable_watermark,
        }
    }
}

/// 64-bit integers arrive as JSON strings.
fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    let value = match Raw::deserialize(deserializer)? {
        Raw::Number(n) => n,
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom)?,
    };
    u32::try_from(value).map_err(serde::de::Error::custom)
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireComplexity {
    #[serde(deserialize_with = "lenient_u32")]
    min_length: u32,
    requires_uppercase: bool,
    requires_lowercase: bool,
    requires_number: bool,
    requires_symbol: bool,
}

impl From<WireComplexity> for PasswordComplexitySettings {
    fn from(w: WireComplexity) -> Self {
        PasswordComplexitySettings {
            min_length: w.min_length,
            requires_uppercase: w.requires_uppercase,
            requires_lowercase: w.requires_lowercase,
            requires_number: w.requires_number,
            requires_symbol: w.requires_symbol,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddHumanUserRequest {
    email: serde_json::Value,
    profile: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    organization: Option<serde_json::Value>,
}

#[async_trait::async_trait]
impl IdentityService for HttpIdentityService {
    #[instrument(skip_all, err)]
    async fn create_session(&self, checks: Checks) -> Result<SessionHandle, IdentityError> {
        let req = self
            .request(Method::POST, "/v2/sessions")?
            .json(&json!({ "checks": checks_body(&checks) }));
        let resp: CreateSessionResponse = self.send(req).await?;

        Ok(SessionHandle {
            session_id: resp.session_id,
            session_token: resp.session_token,
        })
    }

    #[instrument(skip_all, fields(session_id = %session_id), err)]
    async fn set_session(&self, session_id: &SessionId, checks: Checks) -> Result<SessionHandle, IdentityError> {
        let req = self
            .request(Method::PATCH, &format!("/v2/sessions/{session_id}"))?
            .json(&json!({ "checks": checks_body(&checks) }));
        let resp: SetSessionResponse = self.send(req).await?;

        Ok(SessionHandle {
            session_id: session_id.clone(),
            session_token: resp.session_token,
        })
    }

    async fn get_session(&self, session_id: &SessionId) -> Result<Session, IdentityError> {
        let req = self.request(Method::GET, &format!("/v2/sessions/{session_id}"))?;
        let resp: GetSessionResponse = self.send(req).await?;
        Ok(resp.session)
    }

    #[instrument(skip_all, fields(organization = ?user.organization), err)]
    async fn add_human_user(&self, user: NewHumanUser) -> Result<UserId, IdentityError> {
        let body = AddHumanUserRequest {
            email: json!({ "email": user.email, "sendCode": {} }),
            profile: json!({ "givenName": user.first_name, "familyName": user.last_name }),
            password: user
                .password
                .map(|password| json!({ "password": password, "changeRequired": false })),
            organization: user.organization.map(|org| json!({ "orgId": org })),
        };

        let req = self.request(Method::POST, "/v2/users/human")?.json(&body);
        let resp: AddHumanUserResponse = self.send(req).await?;
        Ok(resp.user_id)
    }

    #[instrument(skip_all, fields(user_id = %user_id), err)]
    async fn verify_email(&self, user_id: &UserId, code: &str) -> Result<(), IdentityError> {
        let req = self
            .request(Method::POST, &format!("/v2/users/{user_id}/email/verify"))?
            .json(&json!({ "verificationCode": code }));
        let _: serde_json::Value = self.send(req).await?;
        Ok(())
    }

    async fn resend_email_code(&self, user_id: &UserId) -> Result<(), IdentityError> {
        let req = self
            .request(Method::POST, &format!("/v2/users/{user_id}/email/resend"))?
            .json(&json!({ "sendCode": {} }));
        let _: serde_json::Value = self.send(req).await?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn start_identity_provider_flow(
        &self,
        idp_id: &IdpId,
        success_url: &str,
        failure_url: &str,
    ) -> Result<IdpIntent, IdentityError> {
        let req = self.request(Method::POST, "/v2/idp_intents")?.json(&json!({
            "idpId": idp_id,
            "urls": { "successUrl": success_url, "failureUrl": failure_url },
        }));
        let resp: IdpIntentResponse = self.send(req).await?;

        match (resp.auth_url, resp.post_form) {
            (Some(url), _) => Ok(IdpIntent::AuthUrl(url)),
            (None, Some(form)) => Ok(IdpIntent::PostForm(form)),
            (None, None) => Err(IdentityError::Decode("idp intent has neither authUrl nor postForm".into())),
        }
    }

    async fn list_users(
        &self,
        login_name: &str,
        organization: Option<&OrganizationId>,
    ) -> Result<Vec<User>, IdentityError> {
        let mut queries = vec![json!({
            "orQuery": { "queries": [
                { "loginNameQuery": { "loginName": login_name, "method": "TEXT_QUERY_METHOD_EQUALS" } },
                { "emailQuery": { "emailAddress": login_name, "method": "TEXT_QUERY_METHOD_EQUALS" } },
            ]}
        })];
        if let Some(org) = organization {
            queries.push(json!({ "organizationIdQuery": { "organizationId": org } }));
        }

        let req = self
            .request(Method::POST, "/v2/users")?
            .json(&json!({ "queries": queries }));
        let resp: ListUsersResponse = self.send(req).await?;
        Ok(resp.result.into_iter().map(User::from).collect())
    }

    async fn get_user(&self, user_id: &UserId) -> Result<User, IdentityError> {
        let req = self.request(Method::GET, &format!("/v2/users/{user_id}"))?;
        let resp: GetUserResponse = self.send(req).await?;
        Ok(resp.user.into())
    }

    #[instrument(skip_all, fields(user_id = %user_id), err)]
    async fn password_reset(&self, user_id: &UserId) -> Result<(), IdentityError> {
        let req = self
            .request(Method::POST, &format!("/v2/users/{user_id}/password_reset"))?
            .json(&json!({ "sendLink": {} }));
        let _: serde_json::Value = self.send(req).await?;
        Ok(())
    }

    async fn list_authentication_method_types(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<AuthenticationMethodType>, IdentityError> {
        let req = self.request(Method::GET, &format!("/v2/users/{user_id}/authentication_methods"))?;
        let resp: AuthMethodsResponse = self.send(req).await?;
        Ok(resp.auth_method_types)
    }

    async fn get_orgs_by_domain(&self, domain: &str) -> Result<Vec<Organization>, IdentityError> {
        let req = self
            .request(Method::POST, "/v2/organizations/_search")?
            .json(&json!({
                "queries": [{ "domainQuery": { "domain": domain, "method": "TEXT_QUERY_METHOD_EQUALS" } }]
            }));
        let resp: ListOrganizationsResponse = self.send(req).await?;
        Ok(resp.result)
    }

    async fn get_active_identity_providers(
        &self,
        organization: Option<&OrganizationId>,
    ) -> Result<Vec<IdentityProvider>, IdentityError> {
        let req = self.scoped("/v2/settings/login/idps", organization)?;
        let resp: IdentityProvidersResponse = self.send(req).await?;
        Ok(resp.identity_providers)
    }

    async fn get_login_settings(&self, organization: Option<&OrganizationId>) -> Result<LoginSettings, IdentityError> {
        let req = self.scoped("/v2/settings/login", organization)?;
        let resp: SettingsResponse<LoginSettings> = self.send(req).await?;
        Ok(resp.settings.unwrap_or_default())
    }

    async fn get_branding_settings(
        &self,
        organization: Option<&OrganizationId>,
    ) -> Result<BrandingSettings, IdentityError> {
        let req = self.scoped("/v2/settings/branding", organization)?;
        let resp: SettingsResponse<WireBranding> = self.send(req).await?;
        Ok(resp.settings.unwrap_or_default().into())
    }

    async fn get_password_complexity_settings(
        &self,
        organization: Option<&OrganizationId>,
    ) -> Result<PasswordComplexitySettings, IdentityError> {
        let req = self.scoped("/v2/settings/password/complexity", organization)?;
        let resp: SettingsResponse<WireComplexity> = self.send(req).await?;
        Ok(resp.settings.unwrap_or_default().into())
    }

    async fn get_privacy_policy(&self, organization: Option<&OrganizationId>) -> Result<PrivacyPolicy, IdentityError> {
        let mut req = self.request(Method::GET, "/management/v1/policies/privacy")?;
        if let Some(org) = organization {
            req = req.header("x-zitadel-orgid", org.as_str());
        }
        let resp: PolicyResponse<PrivacyPolicy> = self.send(req).await?;
        Ok(resp.policy.unwrap_or_default())
    }

    async fn get_legal_and_support_settings(
        &self,
        organization: Option<&OrganizationId>,
    ) -> Result<LegalAndSupportSettings, IdentityError> {
        let req = self.scoped("/v2/settings/legal_support", organization)?;
        let resp: SettingsResponse<LegalAndSupportSettings> = self.send(req).await?;
        Ok(resp.settings.unwrap_or_default())
    }
}
