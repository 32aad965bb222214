use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::app::dto::ResetPasswordRequest;
use crate::app::errors;
use crate::context::ServiceContext;

/// `POST /api/resetpassword`: the login name must match exactly one user.
pub async fn reset_password(
    Extension(svc): Extension<ServiceContext>,
    body: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::invalid_request(rejection),
    };
    let login_name = body.login_name.trim();
    if login_name.is_empty() {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_request", "loginName is required");
    }

    let service = svc.service();
    let users = match service.list_users(login_name, body.organization.as_ref()).await {
        Ok(users) => users,
        Err(err) => return errors::rpc_error_to_response(err),
    };

    let [user] = users.as_slice() else {
        tracing::info!(matches = users.len(), "password reset without a unique user");
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "User not found");
    };

    match service.password_reset(&user.user_id).await {
        Ok(()) => Json(json!({})).into_response(),
        Err(err) => errors::rpc_error_to_response(err),
    }
}
