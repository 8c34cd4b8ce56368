mod common;

use axum::body::Body;
use axum::http::StatusCode;
use common::{build_test_context, get, login, post_form, post_json, send};
use serde_json::json;
use soil_hub::history::HistoryStore;

#[tokio::test]
async fn health_is_open() {
    let ctx = build_test_context();
    let resp = get(&ctx.app, "/health", None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"], "ok");
}

#[tokio::test]
async fn ingestion_needs_no_session_and_merges_sticky() {
    let ctx = build_test_context();

    let payload = json!({"temp": 25.5, "soil_moisture": 40});
    let resp = post_json(&ctx.app, "/update_data", payload).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["temperature"].as_f64(), Some(25.5));
    assert_eq!(body["data"]["soil_moisture"].as_f64(), Some(40.0));
    assert!(body["data"]["ph"].is_null());
    assert!(body["data"]["datetime"].is_string());

    let resp = post_json(&ctx.app, "/update_data", json!({"pH": 6.8})).await;
    let data = &resp.json()["data"];
    assert_eq!(data["temperature"].as_f64(), Some(25.5));
    assert_eq!(data["soil_moisture"].as_f64(), Some(40.0));
    assert_eq!(data["ph"].as_f64(), Some(6.8));
}

#[tokio::test]
async fn ingestion_timestamp_is_server_time() {
    let ctx = build_test_context();
    let before = chrono::Local::now().naive_local() - chrono::Duration::seconds(1);

    let resp = post_json(&ctx.app, "/update_data", json!({"nitrogen": 12})).await;
    let stamp = resp.json()["data"]["datetime"].as_str().unwrap().to_string();
    let after = chrono::Local::now().naive_local() + chrono::Duration::seconds(1);

    let parsed = chrono::NaiveDateTime::parse_from_str(&stamp, "%Y-%m-%d %H:%M:%S").unwrap();
    assert!(parsed >= before && parsed <= after, "{stamp} outside call window");
}

#[tokio::test]
async fn ingestion_accepts_body_without_content_type() {
    let ctx = build_test_context();
    let resp = send(&ctx.app, "POST", "/update_data", None, None, r#"{"potassium": 3}"#).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["data"]["potassium"].as_f64(), Some(3.0));
}

#[tokio::test]
async fn malformed_payloads_are_rejected_without_side_effects() {
    let ctx = build_test_context();
    post_json(&ctx.app, "/update_data", json!({"ph": 7.0})).await;
    let before = ctx.ingestor.snapshot().await;

    for body in ["", "not json", "[1,2,3]", r#"{"ph": "high"}"#] {
        let resp = send(
            &ctx.app,
            "POST",
            "/update_data",
            None,
            Some("application/json"),
            body.to_string(),
        )
        .await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST, "body {body:?}");
        let err = resp.json();
        assert_eq!(err["status"], "error");
        assert_eq!(err["code"], "invalid_payload");
    }

    assert_eq!(ctx.ingestor.snapshot().await, before);
    assert_eq!(ctx.history.keys().await.unwrap().len(), 1);
}

#[tokio::test]
async fn history_keeps_ten_most_recent() {
    let ctx = build_test_context();
    for n in 0..13 {
        let resp = post_json(&ctx.app, "/update_data", json!({"nitrogen": n})).await;
        assert_eq!(resp.status, StatusCode::OK);
    }

    let entries = ctx.history.entries();
    assert_eq!(entries.len(), 10);
    let kept: Vec<f64> = entries.iter().filter_map(|(_, r)| r.nitrogen).collect();
    assert_eq!(kept, (3..13).map(f64::from).collect::<Vec<_>>());
}

#[tokio::test]
async fn read_endpoint_is_gated() {
    let ctx = build_test_context();
    post_json(&ctx.app, "/update_data", json!({"ph": 6.1})).await;

    let resp = get(&ctx.app, "/get_data", None).await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), Some("/login"));
    assert!(!resp.text().contains("6.1"));

    let resp = get(&ctx.app, "/get_data", Some("soil_session=forged")).await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn read_endpoint_returns_live_reading() {
    let ctx = build_test_context();
    let cookie = login(&ctx.app).await;

    let resp = get(&ctx.app, "/get_data", Some(&cookie)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let empty = resp.json();
    assert!(empty["temperature"].is_null());
    assert!(empty["datetime"].is_null());

    post_json(&ctx.app, "/update_data", json!({"temperature": 19.5, "phosphorus": 8})).await;
    let resp = get(&ctx.app, "/get_data", Some(&cookie)).await;
    let data = resp.json();
    assert_eq!(
        data,
        serde_json::to_value(ctx.ingestor.snapshot().await).unwrap()
    );
    assert_eq!(data["temperature"].as_f64(), Some(19.5));
}

#[tokio::test]
async fn dashboard_is_gated() {
    let ctx = build_test_context();

    let resp = get(&ctx.app, "/", None).await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), Some("/login"));

    let cookie = login(&ctx.app).await;
    let resp = get(&ctx.app, "/", Some(&cookie)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.text().contains("soil health"));
}

#[tokio::test]
async fn login_success_redirects_to_dashboard() {
    let ctx = build_test_context();
    let resp = post_form(&ctx.app, "/login", "username=user&password=12345678").await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), Some("/"));
    assert!(resp.cookie().unwrap().starts_with("soil_session="));
}

#[tokio::test]
async fn login_failure_shows_error_and_opens_no_session() {
    let ctx = build_test_context();
    let resp = post_form(&ctx.app, "/login", "username=user&password=nope").await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert!(resp.text().contains("Invalid credentials"));
    assert!(resp.cookie().is_none());
}

#[tokio::test]
async fn login_with_missing_field_is_a_failed_login() {
    let ctx = build_test_context();
    for form in ["username=user", "password=12345678", ""] {
        let resp = post_form(&ctx.app, "/login", form).await;
        assert_eq!(resp.status, StatusCode::UNAUTHORIZED, "form {form:?}");
        assert!(resp.text().contains("Invalid credentials"));
        assert!(resp.cookie().is_none());
    }
}

#[tokio::test]
async fn login_page_renders_form() {
    let ctx = build_test_context();
    let resp = get(&ctx.app, "/login", None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.text().contains("<form"));
}

#[tokio::test]
async fn logout_clears_session() {
    let ctx = build_test_context();
    let cookie = login(&ctx.app).await;

    let resp = get(&ctx.app, "/logout", Some(&cookie)).await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), Some("/login"));
    assert_eq!(resp.cookie().as_deref(), Some("soil_session="));

    let resp = get(&ctx.app, "/get_data", Some(&cookie)).await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn responses_carry_trace_id() {
    let ctx = build_test_context();
    let resp = send(&ctx.app, "GET", "/health", None, None, Body::empty()).await;
    let trace = resp.headers.get("x-trace-id").unwrap().to_str().unwrap();
    assert_eq!(trace.len(), 16);
}
