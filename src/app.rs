//! ==============================================================================
//! app.rs - http surface
//! ==============================================================================
//!
//! routes:
//!     POST /update_data   device ingestion, no session
//!     GET  /get_data      latest reading as json, session required
//!     GET  /              dashboard page, session required
//!     GET  /login         login form
//!     POST /login         check credentials, set session cookie
//!     GET  /logout        clear session
//!     GET  /health        liveness check
//!
//! unauthenticated requests to gated routes are redirected to /login.
//!
//! ==============================================================================

use crate::domain::{SensorReading, SensorUpdate};
use crate::ingest::{IngestError, Ingestor};
use crate::logging;
use crate::pages;
use crate::session::{self, SessionManager};

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    middleware,
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

// ==============================================================================
// shared state
// ==============================================================================
// cloned into every handler; both members are cheap handles.

#[derive(Clone)]
pub struct AppState {
    pub ingestor: Ingestor,
    pub sessions: Arc<SessionManager>,
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard_handler))
        .route("/update_data", post(update_handler))
        .route("/get_data", get(read_handler))
        .route("/login", get(login_page_handler).post(login_handler))
        .route("/logout", get(logout_handler))
        .route("/health", get(health_handler))
        .layer(middleware::from_fn(logging::request_logging))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ==============================================================================
// device-facing
// ==============================================================================

#[derive(Serialize)]
struct IngestResponse {
    status: &'static str,
    data: SensorReading,
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<SensorReading>,
}

fn error_response(
    status: StatusCode,
    code: &'static str,
    message: String,
    data: Option<SensorReading>,
) -> Response {
    (
        status,
        Json(ErrorBody {
            status: "error",
            code,
            message,
            data,
        }),
    )
        .into_response()
}

/// POST /update_data
///
/// the body is read raw so firmware that omits the content type still works.
async fn update_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let update = match SensorUpdate::from_json(&body) {
        Ok(update) => update,
        Err(e) => {
            tracing::warn!(error = %e, "rejected ingestion payload");
            return error_response(StatusCode::BAD_REQUEST, "invalid_payload", e.to_string(), None);
        }
    };

    match state.ingestor.ingest(update).await {
        Ok(reading) => Json(IngestResponse {
            status: "success",
            data: reading,
        })
        .into_response(),
        Err(IngestError::StoreUnavailable { reading, source }) => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "store_unavailable",
            source.to_string(),
            Some(reading),
        ),
    }
}

// ==============================================================================
// operator-facing
// ==============================================================================

fn to_login() -> Response {
    Redirect::to("/login").into_response()
}

/// GET /get_data
async fn read_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !state.sessions.is_authenticated(&headers) {
        return to_login();
    }
    Json(state.ingestor.snapshot().await).into_response()
}

/// GET /
async fn dashboard_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !state.sessions.is_authenticated(&headers) {
        return to_login();
    }
    Html(pages::dashboard()).into_response()
}

async fn login_page_handler() -> Html<String> {
    Html(pages::login(None))
}

/// a missing field is treated like a wrong one
#[derive(Deserialize)]
struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

/// POST /login
async fn login_handler(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    match state.sessions.login(&form.username, &form.password) {
        Some(token) => {
            tracing::info!("operator logged in");
            (
                [(header::SET_COOKIE, session::session_cookie(&token, state.sessions.ttl()))],
                Redirect::to("/"),
            )
                .into_response()
        }
        None => {
            tracing::warn!("login rejected");
            (
                StatusCode::UNAUTHORIZED,
                Html(pages::login(Some("Invalid credentials"))),
            )
                .into_response()
        }
    }
}

/// GET /logout
async fn logout_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    state.sessions.logout(&headers);
    (
        [(header::SET_COOKIE, session::expired_cookie())],
        Redirect::to("/login"),
    )
        .into_response()
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}
