//! HTTP application wiring (Axum router + shared state).
//!
//! - `services.rs`: service registry and the flow components built per request
//! - `routes/`: step pages and JSON endpoints (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(state: services::AppState) -> Router {
    let state = Arc::new(state);

    let scoped = routes::router()
        .layer(Extension(state.clone()))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::service_middleware,
        ));

    let scoped = match state.links().base_path() {
        "" => scoped,
        base => Router::new().nest(base, scoped),
    };

    Router::new()
        .route("/healthy", get(routes::system::healthy))
        .layer(Extension(state))
        .merge(scoped)
        .layer(ServiceBuilder::new())
}
