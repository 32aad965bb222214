use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, Json};

use crate::app::services::AppState;

/// Liveness; answers without touching the identity service.
pub async fn healthy(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "token": state.instance_token(),
    }))
}
