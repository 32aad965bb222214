//! Step pages: `GET` renders (or redirects to) a step, `POST` submits its form.

use std::sync::Arc;

use axum::{
    extract::{rejection::FormRejection, Extension, RawQuery},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Json, Router,
};

use loginflow_core::{AuthContext, IdpIntent, LoginError, NewHumanUser, UserId};
use loginflow_flow::{OtpMethod, RedisplayReason, Step, StepResult, Transition};

use crate::app::dto::{PageForm, PageView};
use crate::app::errors;
use crate::app::services::AppState;
use crate::context::ServiceContext;

pub fn router() -> Router {
    let mut router = Router::new().route("/", get(root));

    for step in Step::ALL {
        router = router.route(
            step.path(),
            get(
                move |Extension(state): Extension<Arc<AppState>>,
                      Extension(svc): Extension<ServiceContext>,
                      RawQuery(query): RawQuery| async move { show_page(step, &state, &svc, query).await },
            )
            .post(
                move |Extension(state): Extension<Arc<AppState>>,
                      Extension(svc): Extension<ServiceContext>,
                      RawQuery(query): RawQuery,
                      form: Result<Form<PageForm>, FormRejection>| async move {
                    match form {
                        Ok(Form(form)) => submit_page(step, &state, &svc, query, form).await,
                        Err(rejection) => {
                            errors::json_error(StatusCode::BAD_REQUEST, "invalid_request", rejection.body_text())
                        }
                    }
                },
            ),
        );
    }

    router
}

fn context_of(query: Option<String>) -> AuthContext {
    AuthContext::from_query(query.as_deref().unwrap_or_default())
}

/// Continuation link for `step`. `submit` is dropped so the target page
/// renders instead of skipping ahead again.
fn redirect_to(state: &AppState, step: Step, ctx: &AuthContext) -> String {
    let ctx = ctx.clone().with_submit(false);
    state.links().next_url(step, &ctx)
}

/// `GET /`: wherever the context alone leads.
pub async fn root(
    Extension(state): Extension<Arc<AppState>>,
    Extension(svc): Extension<ServiceContext>,
    RawQuery(query): RawQuery,
) -> Response {
    let ctx = context_of(query);
    match state.resolver(&svc).resolve(None, ctx).await {
        Ok(view) => Redirect::temporary(&redirect_to(&state, view.step, &view.context)).into_response(),
        Err(err) => errors::error_boundary(err),
    }
}

async fn show_page(step: Step, state: &AppState, svc: &ServiceContext, query: Option<String>) -> Response {
    let ctx = context_of(query);

    // Emailed verification links carry the code and `submit`: verify right away.
    if step == Step::VerifyEmail && ctx.submit() {
        if let (Some(user_id), Some(code)) = (ctx.user_id(), ctx.code()) {
            let result = state.adapter(svc).verify_code(&ctx, user_id, code).await;
            return respond(step, state, svc, ctx, result).await;
        }
    }

    match state.resolver(svc).resolve(Some(step), ctx).await {
        Ok(view) if view.step != step => {
            tracing::debug!(host = ?svc.host(), page = %step, step = %view.step, "redirecting to resolved step");
            Redirect::temporary(&redirect_to(state, view.step, &view.context)).into_response()
        }
        Ok(view) => Json(PageView::new(state.links(), view, None)).into_response(),
        Err(err) => errors::error_boundary(err),
    }
}

/// Render `step` again with an inline error.
async fn redisplay(step: Step, state: &AppState, svc: &ServiceContext, ctx: AuthContext, err: LoginError) -> Response {
    match state.resolver(svc).resolve(Some(step), ctx.with_submit(false)).await {
        Ok(view) => Json(PageView::new(state.links(), view, Some(err))).into_response(),
        Err(boundary) => errors::error_boundary(boundary),
    }
}

async fn submit_page(step: Step, state: &AppState, svc: &ServiceContext, query: Option<String>, form: PageForm) -> Response {
    let mut ctx = context_of(query);
    if let Some(raw) = form.user_id.as_deref().filter(|id| !id.is_empty()) {
        match UserId::new(raw) {
            Ok(user_id) => ctx = ctx.with_user_id(Some(user_id)),
            Err(err) => return redisplay(step, state, svc, ctx, err).await,
        }
    }

    let result = match step {
        Step::EnterLoginName => submit_login_name(state, svc, &ctx, &form).await,
        Step::EnterPassword => {
            let password = form.password.as_deref().unwrap_or_default();
            Ok(state.adapter(svc).submit_password(&ctx, password).await)
        }
        Step::ChooseMfa | Step::EnterMfaCode => match form.code.as_deref().filter(|c| !c.trim().is_empty()) {
            Some(code) => {
                let method = form.method.unwrap_or(OtpMethod::Totp);
                Ok(state.adapter(svc).submit_mfa_code(&ctx, method, code).await)
            }
            // Choosing a method without a code opens the code page.
            None if step == Step::ChooseMfa => Ok(StepResult::Advance(Transition::Step {
                step: Step::EnterMfaCode,
                context: ctx.clone(),
            })),
            None => Ok(state.adapter(svc).submit_mfa_code(&ctx, OtpMethod::Totp, "").await),
        },
        Step::VerifyEmail => submit_verify(state, svc, &ctx, &form).await,
        Step::Register => submit_register(state, svc, &ctx, form).await,
        Step::ChoosePasskey | Step::Done => {
            return errors::json_error(
                StatusCode::METHOD_NOT_ALLOWED,
                "method_not_allowed",
                format!("{} has no form", step.path()),
            );
        }
    };

    match result {
        Ok(result) => respond(step, state, svc, ctx, result).await,
        Err(err) if err.is_user_recoverable() => redisplay(step, state, svc, ctx, err).await,
        Err(err) => errors::error_boundary(err),
    }
}

async fn respond(step: Step, state: &AppState, svc: &ServiceContext, ctx: AuthContext, result: StepResult) -> Response {
    match result {
        StepResult::Advance(Transition::Step { step: next, context }) => {
            Redirect::to(&redirect_to(state, next, &context)).into_response()
        }
        StepResult::Advance(Transition::External(IdpIntent::AuthUrl(url))) => Redirect::to(&url).into_response(),
        StepResult::Advance(Transition::External(IdpIntent::PostForm(form))) => {
            ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], form).into_response()
        }
        StepResult::Redisplay { message, reason } => {
            let err = match reason {
                RedisplayReason::Validation => LoginError::validation(message),
                RedisplayReason::Credential => LoginError::credential(message),
                RedisplayReason::NotFound => LoginError::not_found(message),
            };
            redisplay(step, state, svc, ctx, err).await
        }
        StepResult::Fatal(message) => errors::error_boundary(LoginError::transport(message)),
    }
}

/// Policy check, then `CreateSession`; unknown users are routed by the login settings.
async fn submit_login_name(
    state: &AppState,
    svc: &ServiceContext,
    ctx: &AuthContext,
    form: &PageForm,
) -> Result<StepResult, LoginError> {
    let login_name = form.login_name.as_deref().unwrap_or_default().trim();
    let router = state.login_router(svc);

    if !login_name.is_empty() {
        if let Some(rejected) = router.check_login_policy(ctx, login_name).await? {
            return Ok(rejected);
        }
    }

    match state.adapter(svc).submit_login_name(ctx, login_name).await {
        StepResult::Redisplay {
            reason: RedisplayReason::NotFound,
            ..
        } => router.route_unknown(ctx, login_name).await,
        other => Ok(other),
    }
}

async fn submit_verify(
    state: &AppState,
    svc: &ServiceContext,
    ctx: &AuthContext,
    form: &PageForm,
) -> Result<StepResult, LoginError> {
    let Some(user_id) = ctx.user_id() else {
        return Err(LoginError::validation("User id is missing"));
    };
    let adapter = state.adapter(svc);

    if form.wants_resend() {
        return Ok(adapter.resend_code(ctx, user_id).await);
    }
    let code = form.code.as_deref().or(ctx.code()).unwrap_or_default();
    Ok(adapter.verify_code(ctx, user_id, code).await)
}

async fn submit_register(
    state: &AppState,
    svc: &ServiceContext,
    ctx: &AuthContext,
    form: PageForm,
) -> Result<StepResult, LoginError> {
    let organization = ctx.organization().or(state.default_org()).cloned();
    let complexity = state.settings(svc).password_complexity(organization.as_ref()).await?;

    let user = NewHumanUser {
        email: form.email.or(form.login_name).unwrap_or_default(),
        first_name: form.first_name.unwrap_or_default(),
        last_name: form.last_name.unwrap_or_default(),
        password: form.password.filter(|p| !p.is_empty()),
        organization,
    };

    Ok(state.adapter(svc).register(ctx, user, &complexity).await)
}
