use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use loginflow_core::{AuthRequestId, Checks, SessionHandle, SessionId};
use loginflow_flow::{IdentityService, OtpMethod};

use crate::app::dto::{CreateSessionRequest, UpdateSessionRequest};
use crate::app::errors;
use crate::context::ServiceContext;

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// `POST /session`: start a session for a login name, optionally checking a password.
pub async fn create_session(
    Extension(svc): Extension<ServiceContext>,
    body: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::invalid_request(rejection),
    };

    let login_name = body.login_name.trim();
    if login_name.is_empty() {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_request", "loginName is required");
    }
    let auth_request_id = match non_empty(body.auth_request_id).map(AuthRequestId::new).transpose() {
        Ok(id) => id,
        Err(err) => return errors::login_error_to_response(err),
    };

    let checks = Checks {
        password: non_empty(body.password),
        ..Checks::login_name(login_name)
    };

    // The auth request travels in continuation links, not in CreateSession.
    tracing::debug!(auth_request_id = ?auth_request_id, "creating session");
    let service = svc.service();
    match service.create_session(checks).await {
        Ok(handle) => session_response(service.as_ref(), handle).await,
        Err(err) => errors::rpc_error_to_response(err),
    }
}

/// `PUT /session`: add a password or one-time code to an existing session.
pub async fn update_session(
    Extension(svc): Extension<ServiceContext>,
    body: Result<Json<UpdateSessionRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::invalid_request(rejection),
    };

    let session_id = match SessionId::new(body.session_id.trim()) {
        Ok(id) => id,
        Err(err) => return errors::login_error_to_response(err),
    };

    let mut checks = Checks {
        password: non_empty(body.password),
        ..Default::default()
    };
    if let Some(code) = non_empty(body.code) {
        match body.method.unwrap_or(OtpMethod::Totp) {
            OtpMethod::Totp => checks.totp = Some(code),
            OtpMethod::Sms => checks.otp_sms = Some(code),
            OtpMethod::Email => checks.otp_email = Some(code),
        }
    }
    if checks == Checks::default() {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_request", "password or code is required");
    }

    let service = svc.service();
    match service.set_session(&session_id, checks).await {
        Ok(handle) => session_response(service.as_ref(), handle).await,
        Err(err) => errors::rpc_error_to_response(err),
    }
}

/// The session token stays server-side; the browser gets id and factors.
async fn session_response(service: &dyn IdentityService, handle: SessionHandle) -> Response {
    match service.get_session(&handle.session_id).await {
        Ok(session) => (
            StatusCode::OK,
            Json(json!({
                "sessionId": session.id,
                "expirationDate": session.expiration_date,
                "factors": session.factors,
            })),
        )
            .into_response(),
        Err(err) => errors::rpc_error_to_response(err),
    }
}
