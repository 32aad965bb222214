use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use loginflow_core::{IdpId, LoginError};
use loginflow_flow::{StepResult, Transition};

use crate::app::dto::StartIdpRequest;
use crate::app::errors;
use crate::app::services::AppState;
use crate::context::ServiceContext;

/// `POST /api/idp/start`: returns `{ authUrl }` or `{ postForm }`.
pub async fn start(
    Extension(state): Extension<Arc<AppState>>,
    Extension(svc): Extension<ServiceContext>,
    body: Result<Json<StartIdpRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::invalid_request(rejection),
    };

    let idp_id = match IdpId::new(body.idp_id.trim()) {
        Ok(id) => id,
        Err(err) => return errors::login_error_to_response(err),
    };

    let result = state
        .adapter(&svc)
        .start_identity_provider_flow(&idp_id, &body.success_url, &body.failure_url)
        .await;

    match result {
        StepResult::Advance(Transition::External(intent)) => Json(intent).into_response(),
        other => match other.error() {
            // Callback URLs failed validation before any call was made.
            Some(LoginError::Validation(message)) => {
                errors::json_error(StatusCode::BAD_REQUEST, "invalid_redirect_uri", message)
            }
            Some(err) => {
                errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "rpc_error", errors::message_of(&err))
            }
            None => errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "identity provider flow did not return an intent",
            ),
        },
    }
}
