#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Request, StatusCode};
use serde_json::Value;
use soil_hub::app::{build_app, AppState};
use soil_hub::history::{HistoryStore, MemoryHistory, RetentionPolicy};
use soil_hub::ingest::{Ingestor, LatestReading};
use soil_hub::session::{SessionManager, DEFAULT_SESSION_TTL};
use std::sync::Arc;
use tower::util::ServiceExt;

pub const USERNAME: &str = "user";
pub const PASSWORD: &str = "12345678";

pub struct TestContext {
    pub history: Arc<MemoryHistory>,
    pub ingestor: Ingestor,
    pub app: axum::Router,
}

pub fn build_test_context() -> TestContext {
    let history = Arc::new(MemoryHistory::new());
    let (ingestor, app) = build_app_with_store(history.clone());

    TestContext {
        history,
        ingestor,
        app,
    }
}

/// the full router over any history store
pub fn build_app_with_store(store: Arc<dyn HistoryStore>) -> (Ingestor, axum::Router) {
    let ingestor = Ingestor::new(LatestReading::new(), store, RetentionPolicy::default());
    let sessions = Arc::new(SessionManager::new(USERNAME, PASSWORD, DEFAULT_SESSION_TTL));

    let app = build_app(AppState {
        ingestor: ingestor.clone(),
        sessions,
    });
    (ingestor, app)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response should be json")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }

    /// `name=value` part of the Set-Cookie header
    pub fn cookie(&self) -> Option<String> {
        self.headers
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string)
    }
}

pub async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    content_type: Option<&str>,
    body: impl Into<Body>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    let req = builder.body(body.into()).expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("router should respond");
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read")
        .to_vec();

    TestResponse {
        status,
        headers,
        body,
    }
}

pub async fn get(app: &axum::Router, uri: &str, cookie: Option<&str>) -> TestResponse {
    send(app, "GET", uri, cookie, None, Body::empty()).await
}

pub async fn post_json(app: &axum::Router, uri: &str, body: Value) -> TestResponse {
    send(
        app,
        "POST",
        uri,
        None,
        Some("application/json"),
        body.to_string(),
    )
    .await
}

pub async fn post_form(app: &axum::Router, uri: &str, form: &str) -> TestResponse {
    send(
        app,
        "POST",
        uri,
        None,
        Some("application/x-www-form-urlencoded"),
        form.to_string(),
    )
    .await
}

/// log in with the test credentials and return the session cookie
pub async fn login(app: &axum::Router) -> String {
    let resp = post_form(
        app,
        "/login",
        &format!("username={USERNAME}&password={PASSWORD}"),
    )
    .await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    resp.cookie().expect("login should set a session cookie")
}
