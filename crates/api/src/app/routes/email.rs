use axum::{
    extract::{rejection::JsonRejection, Extension},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use loginflow_core::UserId;

use crate::app::dto::ResendVerifyEmailRequest;
use crate::app::errors;
use crate::context::ServiceContext;

/// `POST /api/resendverifyemail`
pub async fn resend_verify_email(
    Extension(svc): Extension<ServiceContext>,
    body: Result<Json<ResendVerifyEmailRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::invalid_request(rejection),
    };
    let user_id = match UserId::new(body.user_id.trim()) {
        Ok(id) => id,
        Err(err) => return errors::login_error_to_response(err),
    };

    match svc.service().resend_email_code(&user_id).await {
        Ok(()) => Json(json!({})).into_response(),
        Err(err) => errors::rpc_error_to_response(err),
    }
}
