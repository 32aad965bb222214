//! Request-scoped login context.
//!
//! An [`AuthContext`] is rebuilt from the query string on every page render and
//! is never mutated in place: each `with_*` call consumes the context and
//! returns the next one. No other client-side state survives between pages.

use serde::Serialize;
use url::form_urlencoded;

use crate::id::{AuthRequestId, OrganizationId, SessionId, UserId};

/// Query parameter names of the continuation-link contract.
pub mod params {
    pub const LOGIN_NAME: &str = "loginName";
    pub const AUTH_REQUEST_ID: &str = "authRequestId";
    /// Older links spell the auth request parameter this way.
    pub const REQUEST_ID: &str = "requestId";
    pub const SESSION_ID: &str = "sessionId";
    pub const ORGANIZATION: &str = "organization";
    pub const USER_ID: &str = "userid";
    pub const USER_ID_CAMEL: &str = "userId";
    pub const CODE: &str = "code";
    pub const SUBMIT: &str = "submit";
}

/// Everything the login flow knows about the current attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    login_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    auth_request_id: Option<AuthRequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<SessionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    organization: Option<OrganizationId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    submit: bool,
}

fn non_empty(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    (!value.is_empty()).then_some(value)
}

impl AuthContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn login_name(&self) -> Option<&str> {
        self.login_name.as_deref()
    }

    pub fn auth_request_id(&self) -> Option<&AuthRequestId> {
        self.auth_request_id.as_ref()
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn organization(&self) -> Option<&OrganizationId> {
        self.organization.as_ref()
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn submit(&self) -> bool {
        self.submit
    }

    /// Empty strings leave the field unset.
    pub fn with_login_name(mut self, login_name: impl Into<String>) -> Self {
        self.login_name = non_empty(login_name);
        self
    }

    pub fn with_auth_request_id(mut self, id: Option<AuthRequestId>) -> Self {
        self.auth_request_id = id;
        self
    }

    pub fn with_session_id(mut self, id: Option<SessionId>) -> Self {
        self.session_id = id;
        self
    }

    pub fn with_organization(mut self, organization: Option<OrganizationId>) -> Self {
        self.organization = organization;
        self
    }

    pub fn with_user_id(mut self, user_id: Option<UserId>) -> Self {
        self.user_id = user_id;
        self
    }

    /// Empty strings leave the field unset.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = non_empty(code);
        self
    }

    pub fn without_code(mut self) -> Self {
        self.code = None;
        self
    }

    pub fn with_submit(mut self, submit: bool) -> Self {
        self.submit = submit;
        self
    }

    /// Decode a raw query string (without the leading `?`).
    ///
    /// Unknown parameters are ignored, empty values count as unset, and the
    /// first non-empty occurrence of a parameter wins.
    pub fn from_query(query: &str) -> Self {
        let mut ctx = Self::default();
        let mut submit_seen = false;

        for (key, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            if value.is_empty() {
                continue;
            }
            let value = value.into_owned();
            match key.as_ref() {
                params::LOGIN_NAME if ctx.login_name.is_none() => ctx.login_name = Some(value),
                params::AUTH_REQUEST_ID | params::REQUEST_ID if ctx.auth_request_id.is_none() => {
                    ctx.auth_request_id = AuthRequestId::new(value).ok();
                }
                params::SESSION_ID if ctx.session_id.is_none() => ctx.session_id = SessionId::new(value).ok(),
                params::ORGANIZATION if ctx.organization.is_none() => {
                    ctx.organization = OrganizationId::new(value).ok();
                }
                params::USER_ID | params::USER_ID_CAMEL if ctx.user_id.is_none() => {
                    ctx.user_id = UserId::new(value).ok();
                }
                params::CODE if ctx.code.is_none() => ctx.code = Some(value),
                params::SUBMIT if !submit_seen => {
                    submit_seen = true;
                    ctx.submit = value.eq_ignore_ascii_case("true");
                }
                _ => {}
            }
        }

        ctx
    }

    /// Non-empty fields as query pairs, in a fixed order.
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = Vec::with_capacity(7);
        if let Some(v) = &self.login_name {
            pairs.push((params::LOGIN_NAME, v.as_str()));
        }
        if let Some(v) = &self.auth_request_id {
            pairs.push((params::AUTH_REQUEST_ID, v.as_str()));
        }
        if let Some(v) = &self.session_id {
            pairs.push((params::SESSION_ID, v.as_str()));
        }
        if let Some(v) = &self.organization {
            pairs.push((params::ORGANIZATION, v.as_str()));
        }
        if let Some(v) = &self.user_id {
            pairs.push((params::USER_ID, v.as_str()));
        }
        if let Some(v) = &self.code {
            pairs.push((params::CODE, v.as_str()));
        }
        if self.submit {
            pairs.push((params::SUBMIT, "true"));
        }
        pairs
    }

    /// Encode as an `application/x-www-form-urlencoded` query string.
    pub fn to_query(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query_pairs())
            .finish()
    }
}
