use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::HOST, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::app::services::AppState;
use crate::context::ServiceContext;

pub async fn service_middleware(
    State(state): State<Arc<AppState>>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let host = request_host(req.headers());
    let service = state.registry().resolve(host.as_deref());

    req.extensions_mut().insert(ServiceContext::new(service, host));

    next.run(req).await
}

/// `X-Forwarded-Host` wins over `Host` when a proxy sets it.
fn request_host(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-host")
        .or_else(|| headers.get(HOST))
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(',').next().unwrap_or(value).trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_host_takes_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("internal:3000"));
        assert_eq!(request_host(&headers).as_deref(), Some("internal:3000"));

        headers.insert("x-forwarded-host", HeaderValue::from_static("login.acme.example, proxy"));
        assert_eq!(request_host(&headers).as_deref(), Some("login.acme.example"));
    }

    #[test]
    fn missing_host_is_none() {
        assert_eq!(request_host(&HeaderMap::new()), None);
    }
}
