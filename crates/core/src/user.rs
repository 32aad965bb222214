//! Users, organizations and IdP intents as seen through the identity service.

use serde::{Deserialize, Serialize};

use crate::id::{OrganizationId, UserId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserState {
    #[default]
    #[serde(alias = "USER_STATE_UNSPECIFIED")]
    Unspecified,
    #[serde(alias = "USER_STATE_ACTIVE")]
    Active,
    #[serde(alias = "USER_STATE_INACTIVE")]
    Inactive,
    #[serde(alias = "USER_STATE_DELETED")]
    Deleted,
    #[serde(alias = "USER_STATE_LOCKED")]
    Locked,
    /// Created but not yet initialized (no credential set).
    #[serde(alias = "USER_STATE_INITIAL")]
    Initial,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Email {
    pub email: String,
    pub is_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Phone {
    pub phone: String,
    pub is_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HumanProfile {
    pub given_name: String,
    pub family_name: String,
    pub display_name: String,
    pub email: Option<Email>,
    pub phone: Option<Phone>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: UserId,
    #[serde(default)]
    pub state: UserState,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub login_names: Vec<String>,
    #[serde(default)]
    pub preferred_login_name: String,
    #[serde(default)]
    pub organization_id: Option<OrganizationId>,
    #[serde(default)]
    pub human: Option<HumanProfile>,
}

impl User {
    pub fn email_verified(&self) -> bool {
        self.human
            .as_ref()
            .and_then(|h| h.email.as_ref())
            .is_some_and(|e| e.is_verified)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthenticationMethodType {
    #[serde(alias = "AUTHENTICATION_METHOD_TYPE_UNSPECIFIED")]
    Unspecified,
    #[serde(alias = "AUTHENTICATION_METHOD_TYPE_PASSWORD")]
    Password,
    #[serde(alias = "AUTHENTICATION_METHOD_TYPE_PASSKEY")]
    Passkey,
    #[serde(alias = "AUTHENTICATION_METHOD_TYPE_IDP")]
    Idp,
    #[serde(alias = "AUTHENTICATION_METHOD_TYPE_TOTP")]
    Totp,
    #[serde(alias = "AUTHENTICATION_METHOD_TYPE_U2F")]
    U2f,
    #[serde(alias = "AUTHENTICATION_METHOD_TYPE_OTP_SMS")]
    OtpSms,
    #[serde(alias = "AUTHENTICATION_METHOD_TYPE_OTP_EMAIL")]
    OtpEmail,
}

impl AuthenticationMethodType {
    /// Second factors offered on the MFA step.
    pub fn is_second_factor(&self) -> bool {
        matches!(
            self,
            AuthenticationMethodType::Totp
                | AuthenticationMethodType::U2f
                | AuthenticationMethodType::OtpSms
                | AuthenticationMethodType::OtpEmail
        )
    }
}

/// Input of `AddHumanUser`. `Debug` omits the password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHumanUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<OrganizationId>,
}

impl core::fmt::Debug for NewHumanUser {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NewHumanUser")
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("has_password", &self.password.is_some())
            .field("organization", &self.organization)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: OrganizationId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub primary_domain: String,
}

/// Where to send the browser to start a federated login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IdpIntent {
    /// Redirect to the provider's authorization URL.
    AuthUrl(String),
    /// Auto-submitting form (SAML POST binding).
    PostForm(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_decodes_gateway_shape() {
        let user: User = serde_json::from_value(serde_json::json!({
            "userId": "42",
            "state": "USER_STATE_ACTIVE",
            "preferredLoginName": "admin@example.com",
            "human": { "email": { "email": "admin@example.com", "isVerified": true } }
        }))
        .unwrap();

        assert_eq!(user.state, UserState::Active);
        assert!(user.email_verified());
        assert!(user.login_names.is_empty());
    }

    #[test]
    fn new_user_debug_hides_password() {
        let user = NewHumanUser {
            email: "a@example.com".to_string(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            password: Some("Secr3t!pass".to_string()),
            organization: None,
        };
        assert!(!format!("{user:?}").contains("Secr3t"));
    }
}
