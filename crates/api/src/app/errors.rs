use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use loginflow_core::LoginError;
use loginflow_flow::IdentityError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Malformed or empty JSON body. The rejection detail is logged, not returned.
pub fn invalid_request(rejection: JsonRejection) -> axum::response::Response {
    tracing::debug!(rejection = %rejection.body_text(), "rejected request body");
    json_error(StatusCode::BAD_REQUEST, "invalid_request", "Could not parse request body")
}

pub fn login_error_status(err: &LoginError) -> StatusCode {
    match err {
        LoginError::Validation(_) => StatusCode::BAD_REQUEST,
        LoginError::Credential(_) => StatusCode::UNAUTHORIZED,
        LoginError::NotFound(_) => StatusCode::NOT_FOUND,
        LoginError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        LoginError::Transport(_) => StatusCode::BAD_GATEWAY,
    }
}

pub fn login_error_to_response(err: LoginError) -> axum::response::Response {
    json_error(login_error_status(&err), err.code(), message_of(&err))
}

/// Page-level error boundary: the step cannot be shown, offer a retry.
pub fn error_boundary(err: LoginError) -> axum::response::Response {
    let status = match err {
        LoginError::Configuration(_) | LoginError::Transport(_) => StatusCode::BAD_GATEWAY,
        _ => login_error_status(&err),
    };
    (
        status,
        axum::Json(json!({
            "error": err.code(),
            "message": message_of(&err),
            "retry": true,
        })),
    )
        .into_response()
}

/// Remote failures on the JSON API are passed through as `500` with the
/// service's error body.
pub fn rpc_error_to_response(err: IdentityError) -> axum::response::Response {
    tracing::warn!(code = %err.code(), error = %err, "identity service call failed");
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(err.to_body())).into_response()
}

pub fn message_of(err: &LoginError) -> String {
    match err {
        LoginError::Configuration(m)
        | LoginError::Validation(m)
        | LoginError::Credential(m)
        | LoginError::Transport(m)
        | LoginError::NotFound(m) => m.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loginflow_flow::RpcCode;

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(login_error_status(&LoginError::validation("x")), StatusCode::BAD_REQUEST);
        assert_eq!(login_error_status(&LoginError::not_found("x")), StatusCode::NOT_FOUND);
        assert_eq!(login_error_status(&LoginError::transport("x")), StatusCode::BAD_GATEWAY);
        assert_eq!(error_boundary(LoginError::configuration("x")).status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn rpc_errors_are_500() {
        let resp = rpc_error_to_response(IdentityError::rpc(RpcCode::AlreadyExists, "Errors.User.AlreadyExists"));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
