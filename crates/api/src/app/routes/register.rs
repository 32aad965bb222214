use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use loginflow_core::PasswordComplexitySettings;
use loginflow_flow::validate_registration;

use crate::app::dto::RegisterUserRequest;
use crate::app::errors;
use crate::app::services::AppState;
use crate::context::ServiceContext;

/// `POST /registeruser`: validate locally, then `AddHumanUser`.
pub async fn register_user(
    Extension(state): Extension<Arc<AppState>>,
    Extension(svc): Extension<ServiceContext>,
    body: Result<Json<RegisterUserRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::invalid_request(rejection),
    };
    let user = body.into_new_user(state.default_org());

    let complexity = if user.password.is_some() {
        match state.settings(&svc).password_complexity(user.organization.as_ref()).await {
            Ok(settings) => settings,
            Err(err) => return errors::login_error_to_response(err),
        }
    } else {
        PasswordComplexitySettings::default()
    };

    if let Err(err) = validate_registration(&user, &complexity) {
        return errors::login_error_to_response(err);
    }

    match svc.service().add_human_user(user).await {
        Ok(user_id) => {
            tracing::info!(user_id = %user_id, "user registered");
            Json(json!({ "userId": user_id })).into_response()
        }
        Err(err) => errors::rpc_error_to_response(err),
    }
}
