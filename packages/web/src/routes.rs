//! HTTP routes.
//!
//! | Route | Action |
//! |-------|--------|
//! | `GET /` | Home page |
//! | `GET /login` | Login form |
//! | `POST /session` | Start an OpenID login |
//! | `GET /session` | OpenID server returns here |
//! | `DELETE /session`, `POST /session/destroy`, `GET /logout` | Log out |
//! | `GET /account` | Profile, login required |

use std::collections::HashMap;

use api::auth::{AuthContext, LOGIN_PATH};
use api::error::AuthError;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;

use crate::extract::{auth_failure, redirect, server_error, Auth};
use crate::state::AppState;
use crate::views;

/// Header carrying the anti-forgery token on `DELETE /session`.
const CSRF_HEADER: &str = "x-csrf-token";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/login", get(new_session))
        .route(
            "/session",
            get(complete_session)
                .post(create_session)
                .delete(destroy_session),
        )
        .route("/session/destroy", post(destroy_session_form))
        .route("/logout", get(logout))
        .route("/account", get(account))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct LoginParams {
    #[serde(default)]
    openid_url: String,
    authenticity_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenParams {
    authenticity_token: Option<String>,
}

fn invalid_token() -> Response {
    tracing::warn!("Rejected request with an invalid authenticity token");
    (StatusCode::UNPROCESSABLE_ENTITY, "Invalid authenticity token").into_response()
}

async fn home(State(state): State<AppState>, Auth(ctx): Auth) -> Response {
    let page = async {
        let principal = ctx.current_user().await?.clone();
        let flash = ctx.take_flash().await?;
        let token = ctx.authenticity_token().await?;
        Ok::<_, AuthError>(views::render_home(principal, flash, state.site.clone(), token))
    };

    match page.await {
        Ok(html) => Html(html).into_response(),
        Err(e) => server_error(e),
    }
}

async fn new_session(State(state): State<AppState>, Auth(ctx): Auth) -> Response {
    match state.flow.login_form(&ctx).await {
        Ok(form) => Html(views::render_login(form)).into_response(),
        Err(e) => server_error(e),
    }
}

async fn create_session(
    State(state): State<AppState>,
    Auth(mut ctx): Auth,
    Form(params): Form<LoginParams>,
) -> Response {
    match ctx
        .verify_authenticity_token(params.authenticity_token.as_deref())
        .await
    {
        Ok(true) => {}
        Ok(false) => return invalid_token(),
        Err(e) => return auth_failure(e),
    }

    match state.flow.begin(&mut ctx, &params.openid_url).await {
        Ok(location) => redirect(ctx, &location),
        Err(e) => auth_failure(e),
    }
}

async fn complete_session(
    State(state): State<AppState>,
    Auth(mut ctx): Auth,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !params.contains_key("openid.mode") {
        return Redirect::to(LOGIN_PATH).into_response();
    }

    match state.flow.complete(&mut ctx, &params).await {
        Ok(location) => redirect(ctx, &location),
        Err(e) => auth_failure(e),
    }
}

async fn destroy(state: &AppState, mut ctx: AuthContext) -> Response {
    match state.flow.destroy(&mut ctx).await {
        Ok(location) => redirect(ctx, &location),
        Err(e) => auth_failure(e),
    }
}

async fn destroy_session(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    headers: HeaderMap,
) -> Response {
    let token = headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok());
    match ctx.verify_authenticity_token(token).await {
        Ok(true) => destroy(&state, ctx).await,
        Ok(false) => invalid_token(),
        Err(e) => auth_failure(e),
    }
}

async fn destroy_session_form(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Form(params): Form<TokenParams>,
) -> Response {
    match ctx
        .verify_authenticity_token(params.authenticity_token.as_deref())
        .await
    {
        Ok(true) => destroy(&state, ctx).await,
        Ok(false) => invalid_token(),
        Err(e) => auth_failure(e),
    }
}

async fn logout(State(state): State<AppState>, Auth(ctx): Auth) -> Response {
    destroy(&state, ctx).await
}

async fn account(Auth(ctx): Auth, uri: Uri) -> Response {
    let requested = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    match ctx.require_login(&requested).await {
        Ok(Some(login)) => return Redirect::to(&login).into_response(),
        Ok(None) => {}
        Err(e) => return server_error(e),
    }

    let page = async {
        let user = ctx.current_user().await?.user().cloned();
        let flash = ctx.take_flash().await?;
        Ok::<_, AuthError>(user.map(|user| views::render_account(user, flash)))
    };

    match page.await {
        Ok(Some(html)) => Html(html).into_response(),
        Ok(None) => Redirect::to(LOGIN_PATH).into_response(),
        Err(e) => server_error(e),
    }
}
