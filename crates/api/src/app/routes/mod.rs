use axum::{routing::post, Router};

pub mod email;
pub mod idp;
pub mod pages;
pub mod password;
pub mod register;
pub mod session;
pub mod system;

/// Router for every endpoint that talks to an identity service.
pub fn router() -> Router {
    pages::router()
        .route("/registeruser", post(register::register_user))
        .route("/session", post(session::create_session).put(session::update_session))
        .route("/api/idp/start", post(idp::start))
        .route("/api/resendverifyemail", post(email::resend_verify_email))
        .route("/api/resetpassword", post(password::reset_password))
}
