use std::sync::Arc;

use loginflow_api::app::services::{demo_service, AppState};
use loginflow_core::UserId;
use loginflow_flow::{IdentityService, InMemoryIdentityService};
use reqwest::{header::LOCATION, redirect, StatusCode};
use serde_json::json;

struct TestServer {
    base_url: String,
    service: Arc<InMemoryIdentityService>,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory identity service, ephemeral port.
        let service = Arc::new(demo_service());
        let app = loginflow_api::app::build_app(AppState::with_service(service.clone()));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Redirects are part of the contract; never follow them.
        let client = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .unwrap();

        Self {
            base_url,
            service,
            client,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> reqwest::Response {
        self.client.post(self.url(path)).form(form).send().await.unwrap()
    }

    async fn post_json(&self, path: &str, body: serde_json::Value) -> reqwest::Response {
        self.client.post(self.url(path)).json(&body).send().await.unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn location(res: &reqwest::Response) -> String {
    res.headers()
        .get(LOCATION)
        .expect("missing Location header")
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn healthy_returns_a_token_without_auth() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/healthy")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(!body["token"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn session_with_empty_body_is_a_generic_400() {
    let srv = TestServer::spawn().await;

    let res = srv.client.post(srv.url("/session")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn session_api_creates_and_updates_sessions() {
    let srv = TestServer::spawn().await;

    let res = srv
        .post_json("/session", json!({ "loginName": "admin@example.com" }))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let created: serde_json::Value = res.json().await.unwrap();
    let session_id = created["sessionId"].as_str().unwrap().to_string();
    assert_eq!(created["factors"]["user"]["loginName"], "admin@example.com");
    assert!(created.get("sessionToken").is_none());

    let res = srv
        .client
        .put(srv.url("/session"))
        .json(&json!({ "sessionId": session_id, "password": "Password1!" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: serde_json::Value = res.json().await.unwrap();
    assert!(updated["factors"]["password"]["verifiedAt"].is_string());

    let res = srv
        .client
        .put(srv.url("/session"))
        .json(&json!({ "sessionId": session_id, "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["code"], 3);
}

#[tokio::test]
async fn login_name_then_password_reaches_signed_in() {
    let srv = TestServer::spawn().await;

    let res = srv
        .post_form("/loginname", &[("loginName", "admin@example.com")])
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    let next = location(&res);
    assert!(next.starts_with("/password?"), "{next}");
    assert!(next.contains("sessionId="), "{next}");
    assert!(next.contains("loginName=admin%40example.com"), "{next}");

    let res = srv.post_form(&next, &[("password", "Password1!")]).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    let next = location(&res);
    assert!(next.starts_with("/mfa?"), "{next}");

    // No second factor registered: the MFA page forwards to the end.
    let res = srv.client.get(srv.url(&next)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    let next = location(&res);
    assert!(next.starts_with("/signedin?"), "{next}");

    let res = srv.client.get(srv.url(&next)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let view: serde_json::Value = res.json().await.unwrap();
    assert_eq!(view["step"], "done");
    assert_eq!(view["data"]["login_name"], "admin@example.com");
}

#[tokio::test]
async fn wrong_password_redisplays_the_page() {
    let srv = TestServer::spawn().await;

    let res = srv
        .post_form("/loginname", &[("loginName", "admin@example.com")])
        .await;
    let next = location(&res);

    let res = srv.post_form(&next, &[("password", "nope")]).await;
    assert_eq!(res.status(), StatusCode::OK);
    let view: serde_json::Value = res.json().await.unwrap();
    assert_eq!(view["step"], "enter_password");
    assert_eq!(view["error"]["message"], "Failed to authenticate. Password invalid.");
}

#[tokio::test]
async fn unknown_login_name_in_a_discoverable_domain_goes_to_register() {
    let srv = TestServer::spawn().await;

    let res = srv
        .post_form("/loginname", &[("loginName", "newbie@example.com")])
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    let next = location(&res);
    assert!(next.starts_with("/register?"), "{next}");
    assert!(next.contains("organization=org-demo"), "{next}");
}

#[tokio::test]
async fn unknown_login_name_elsewhere_is_not_found() {
    let srv = TestServer::spawn().await;

    let res = srv
        .post_form("/loginname", &[("loginName", "someone@elsewhere.example")])
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let view: serde_json::Value = res.json().await.unwrap();
    assert_eq!(view["step"], "enter_login_name");
    assert_eq!(view["error"]["message"], "User not found in the system");
}

#[tokio::test]
async fn pages_without_their_context_redirect_to_login_name() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/password")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&res), "/loginname");

    let res = srv.client.get(srv.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&res), "/loginname");
}

#[tokio::test]
async fn register_then_verify_email() {
    let srv = TestServer::spawn().await;

    let res = srv
        .post_json(
            "/registeruser",
            json!({
                "email": "grace@example.com",
                "password": "Password1!",
                "firstName": "Grace",
                "lastName": "Hopper"
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    let user_id = body["userId"].as_str().unwrap().to_string();

    let verify = format!("/verify?userid={user_id}");
    let res = srv.post_form(&verify, &[("code", "000000")]).await;
    assert_eq!(res.status(), StatusCode::OK);
    let view: serde_json::Value = res.json().await.unwrap();
    assert!(
        view["error"]["message"].as_str().unwrap().contains("Could not verify email"),
        "{view}"
    );

    let code = srv.service.email_code(&UserId::new(user_id.clone()).unwrap()).unwrap();
    let res = srv.post_form(&verify, &[("code", code.as_str())]).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert!(location(&res).starts_with("/loginname"));
}

#[tokio::test]
async fn emailed_verification_link_verifies_on_open() {
    let srv = TestServer::spawn().await;

    let res = srv
        .post_json(
            "/registeruser",
            json!({ "email": "linus@example.com", "firstName": "Linus", "lastName": "T" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    let user_id = UserId::new(body["userId"].as_str().unwrap()).unwrap();

    let res = srv
        .client
        .get(srv.url(&format!("/verify?userid={user_id}&code=000000&submit=true")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let view: serde_json::Value = res.json().await.unwrap();
    assert_eq!(view["step"], "verify_email");
    assert!(
        view["error"]["message"].as_str().unwrap().contains("Could not verify email"),
        "{view}"
    );
    assert!(!srv.service.get_user(&user_id).await.unwrap().email_verified());

    let code = srv.service.email_code(&user_id).unwrap();
    let res = srv
        .client
        .get(srv.url(&format!("/verify?userid={user_id}&code={code}&submit=true")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert!(location(&res).starts_with("/loginname"));
    assert!(srv.service.get_user(&user_id).await.unwrap().email_verified());

    // Without `submit` the link only renders the page.
    let res = srv
        .client
        .get(srv.url(&format!("/verify?userid={user_id}&code={code}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn register_user_validates_before_calling_the_service() {
    let srv = TestServer::spawn().await;

    let res = srv
        .post_json(
            "/registeruser",
            json!({ "email": "not-an-email", "firstName": "A", "lastName": "B" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = srv
        .post_json(
            "/registeruser",
            json!({ "email": "weak@example.com", "password": "short", "firstName": "A", "lastName": "B" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    // Already registered: the service error body is passed through.
    let res = srv
        .post_json(
            "/registeruser",
            json!({ "email": "admin@example.com", "firstName": "A", "lastName": "B" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["code"], 6);
}

#[tokio::test]
async fn reset_password_requires_a_unique_user() {
    let srv = TestServer::spawn().await;

    let res = srv
        .post_json("/api/resetpassword", json!({ "loginName": "nobody@example.com" }))
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "not_found");

    let res = srv
        .post_json("/api/resetpassword", json!({ "loginName": "admin@example.com" }))
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let admin = srv.service.user_id_of("admin@example.com").unwrap();
    assert_eq!(srv.service.password_resets(&admin), 1);

    let res = srv
        .post_json(
            "/api/resetpassword",
            json!({ "loginName": "admin@example.com", "organization": "" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_request");
    assert_eq!(srv.service.password_resets(&admin), 1);
}

#[tokio::test]
async fn idp_start_checks_callback_urls() {
    let srv = TestServer::spawn().await;

    let res = srv
        .post_json(
            "/api/idp/start",
            json!({
                "idpId": "google",
                "successUrl": "javascript:alert(1)",
                "failureUrl": "https://login.example.com/idp/google/failure"
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_redirect_uri");
    assert!(body["message"].as_str().unwrap().contains("Invalid protocol"), "{body}");

    let res = srv
        .post_json(
            "/api/idp/start",
            json!({
                "idpId": "unknown-idp",
                "successUrl": "https://login.example.com/idp/x/success",
                "failureUrl": "https://login.example.com/idp/x/failure"
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "rpc_error");

    let res = srv
        .post_json(
            "/api/idp/start",
            json!({
                "idpId": "google",
                "successUrl": "https://login.example.com/idp/google/success",
                "failureUrl": "https://login.example.com/idp/google/failure"
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["authUrl"].as_str().unwrap().starts_with("https://"));
}

#[tokio::test]
async fn resend_verify_email_for_unknown_user_passes_the_rpc_error() {
    let srv = TestServer::spawn().await;

    let res = srv
        .post_json("/api/resendverifyemail", json!({ "userId": "user-unknown" }))
        .await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["code"], 5);
}
