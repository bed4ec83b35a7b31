//! Request extractor for the auth gate and response helpers around it.

use api::auth::{AuthContext, LOGIN_PATH};
use api::error::AuthError;
use axum::extract::FromRequestParts;
use axum::http::header::SET_COOKIE;
use axum::http::request::Parts;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use tower_sessions::Session;

use crate::state::AppState;

/// The [`AuthContext`] of the current request.
pub struct Auth(pub AuthContext);

impl FromRequestParts<AppState> for Auth {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        Ok(Auth(AuthContext::new(session, state.store.clone())))
    }
}

/// Redirect to `location`, carrying any cookies the request queued.
pub fn redirect(mut ctx: AuthContext, location: &str) -> Response {
    let mut response = Redirect::to(location).into_response();
    for cookie in ctx.take_cookies() {
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => tracing::error!("Failed to encode cookie {}: {}", cookie.name(), e),
        }
    }
    response
}

/// A session failure on an auth action: back to the login form.
pub fn auth_failure(err: AuthError) -> Response {
    tracing::error!("Failed to update session: {}", err);
    Redirect::to(LOGIN_PATH).into_response()
}

/// A session failure while rendering a page.
pub fn server_error(err: AuthError) -> Response {
    tracing::error!("Failed to render page: {}", err);
    (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong").into_response()
}
