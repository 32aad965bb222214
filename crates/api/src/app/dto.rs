use serde::{Deserialize, Serialize};

use loginflow_core::{AuthContext, BrandingSettings, LoginError, NewHumanUser, OrganizationId};
use loginflow_flow::{LinkBuilder, OtpMethod, Step, StepData, StepView};

use crate::app::errors;

// -------------------------
// Page forms
// -------------------------

/// Fields any step form may post (urlencoded). Which ones matter depends on the page.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageForm {
    pub login_name: Option<String>,
    pub password: Option<String>,
    pub code: Option<String>,
    pub method: Option<OtpMethod>,
    #[serde(alias = "userid")]
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// `resend` on the verify page asks for a new code.
    pub action: Option<String>,
}

impl PageForm {
    pub fn wants_resend(&self) -> bool {
        self.action.as_deref() == Some("resend")
    }
}

// -------------------------
// JSON API requests
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserRequest {
    pub email: String,
    #[serde(default)]
    pub password: Option<String>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub organization: Option<OrganizationId>,
}

impl RegisterUserRequest {
    pub fn into_new_user(self, fallback_org: Option<&OrganizationId>) -> NewHumanUser {
        NewHumanUser {
            email: self.email.trim().to_string(),
            first_name: self.first_name,
            last_name: self.last_name,
            password: self.password.filter(|p| !p.is_empty()),
            organization: self.organization.or_else(|| fallback_org.cloned()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub login_name: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub auth_request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSessionRequest {
    pub session_id: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub method: Option<OtpMethod>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartIdpRequest {
    pub idp_id: String,
    pub success_url: String,
    pub failure_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendVerifyEmailRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub login_name: String,
    #[serde(default)]
    pub organization: Option<OrganizationId>,
}

// -------------------------
// Responses
// -------------------------

#[derive(Debug, Serialize)]
pub struct PageError {
    pub code: &'static str,
    pub message: String,
}

impl From<LoginError> for PageError {
    fn from(err: LoginError) -> Self {
        Self {
            code: err.code(),
            message: errors::message_of(&err),
        }
    }
}

/// JSON rendering of a step page.
#[derive(Debug, Serialize)]
pub struct PageView {
    pub step: Step,
    pub path: String,
    pub context: AuthContext,
    pub branding: BrandingSettings,
    pub data: StepData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<PageError>,
}

impl PageView {
    pub fn new(links: &LinkBuilder, view: StepView, error: Option<LoginError>) -> Self {
        Self {
            path: links.path(view.step),
            step: view.step,
            context: view.context,
            branding: view.branding,
            data: view.data,
            error: error.map(PageError::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_form_accepts_lowercase_userid() {
        let form: PageForm = serde_json::from_value(serde_json::json!({ "userid": "u1", "action": "resend" })).unwrap();
        assert_eq!(form.user_id.as_deref(), Some("u1"));
        assert!(form.wants_resend());
    }

    #[test]
    fn registration_falls_back_to_default_org() {
        let req: RegisterUserRequest = serde_json::from_value(serde_json::json!({
            "email": " ada@example.com ",
            "password": "",
            "firstName": "Ada",
            "lastName": "Lovelace"
        }))
        .unwrap();
        let org = OrganizationId::new("org-1").unwrap();

        let user = req.into_new_user(Some(&org));
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.password, None);
        assert_eq!(user.organization, Some(org));
    }
}
