//! Browser-facing HTTP routes.

mod pages;

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;

use crate::auth::{AuthError, AuthService, CallbackParams};
use crate::error::{DeskError, Result};
use crate::inspect;
use crate::status::StatusPresenter;

/// Cookie selecting the session; absent means the default session.
pub const SESSION_COOKIE: &str = "oauth_desk_session";

/// Routes served besides the callback; the redirect URI must not use one.
pub const RESERVED_PATHS: &[&str] = &["/", "/login", "/clear", "/inspect", "/health"];

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AuthService>,
    pub presenter: StatusPresenter,
    pub default_session: String,
}

impl AppState {
    pub fn new(service: Arc<AuthService>, presenter: StatusPresenter) -> Self {
        Self {
            service,
            presenter,
            default_session: "default".to_string(),
        }
    }

    pub fn with_default_session(mut self, session: impl Into<String>) -> Self {
        self.default_session = session.into();
        self
    }

    fn session(&self, headers: &HeaderMap) -> String {
        session_from_cookies(headers).unwrap_or_else(|| self.default_session.clone())
    }
}

fn session_from_cookies(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn status_for(err: &AuthError) -> StatusCode {
    match err {
        AuthError::StateMismatch
        | AuthError::AuthorizationExpired
        | AuthError::MissingCode
        | AuthError::AuthorizationDenied { .. } => StatusCode::BAD_REQUEST,
        AuthError::NotAuthorized => StatusCode::UNAUTHORIZED,
        AuthError::NoRefreshToken => StatusCode::CONFLICT,
        AuthError::MalformedToken { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AuthError::TokenEndpointError { .. }
        | AuthError::InvalidResponse(_)
        | AuthError::Connection(_)
        | AuthError::Timeout(_)
        | AuthError::Network(_) => StatusCode::BAD_GATEWAY,
        AuthError::Io(_) | AuthError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(title: &str, err: &AuthError) -> Response {
    (status_for(err), Html(pages::failure_page(title, err))).into_response()
}

async fn root(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = state.session(&headers);
    match state.service.status(&session, &state.presenter).await {
        Ok(summary) => Html(pages::status_page(&summary)).into_response(),
        Err(err) => {
            tracing::error!(session = %session, error = %err, "status page failed");
            failure("Status unavailable", &err)
        }
    }
}

async fn login(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = state.session(&headers);
    let url = state.service.begin_authorization(&session);
    (StatusCode::FOUND, [(header::LOCATION, url.to_string())]).into_response()
}

async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: std::result::Result<Query<CallbackParams>, QueryRejection>,
) -> Response {
    let session = state.session(&headers);
    let params = match query {
        Ok(Query(params)) => params,
        Err(rejection) => {
            tracing::warn!(session = %session, error = %rejection, "unreadable callback query");
            return failure("Authorization failed", &AuthError::MissingCode);
        }
    };
    match state.service.handle_callback(&session, &params).await {
        Ok(record) => Html(pages::callback_success_page(&record)).into_response(),
        Err(err) => failure("Authorization failed", &err),
    }
}

async fn clear(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = state.session(&headers);
    match state.service.clear(&session) {
        Ok(()) => Redirect::to("/").into_response(),
        Err(err) => {
            tracing::error!(session = %session, error = %err, "clear failed");
            failure("Clear failed", &err)
        }
    }
}

async fn inspect(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = state.session(&headers);
    match state.service.inspect(&session).await {
        Ok(decoded) => {
            inspect::log_decoded(&decoded);
            Html(pages::inspect_page(&decoded)).into_response()
        }
        Err(err) => failure("Token inspection failed", &err),
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Builds the router; `callback_path` is the path of the configured redirect URI.
pub fn build_router(state: AppState, callback_path: &str) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/login", get(login))
        .route(callback_path, get(callback))
        .route("/clear", get(clear).post(clear))
        .route("/inspect", get(inspect))
        .route("/health", get(health))
        .with_state(state)
}

pub async fn serve(listener: TcpListener, router: Router) -> Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, router)
        .await
        .map_err(|e| DeskError::Server(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn session_cookie_is_read_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; oauth_desk_session=work ; lang=en"),
        );
        assert_eq!(session_from_cookies(&headers).as_deref(), Some("work"));
    }

    #[test]
    fn empty_or_missing_cookie_yields_none() {
        let mut headers = HeaderMap::new();
        assert!(session_from_cookies(&headers).is_none());
        headers.insert(header::COOKIE, HeaderValue::from_static("oauth_desk_session="));
        assert!(session_from_cookies(&headers).is_none());
    }

    #[test]
    fn flow_errors_are_client_errors() {
        assert_eq!(status_for(&AuthError::StateMismatch), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&AuthError::MissingCode), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&AuthError::TokenEndpointError {
                status: 400,
                body: String::new()
            }),
            StatusCode::BAD_GATEWAY
        );
    }
}
