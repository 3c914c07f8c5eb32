use std::sync::Arc;

use attendance_codes::auth::USER_ID_HEADER;
use attendance_codes::clock::ManualClock;
use attendance_codes::config::PollConfig;
use attendance_codes::memory::MemoryStore;
use attendance_codes::{routes, state::AppState};
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

struct Harness {
    app: Router,
    clock: Arc<ManualClock>,
    session_id: Uuid,
    professor: Uuid,
    student: Uuid,
}

fn harness() -> Harness {
    let store = MemoryStore::new();
    let (session_id, class_id) = (Uuid::new_v4(), Uuid::new_v4());
    let (professor, student) = (Uuid::new_v4(), Uuid::new_v4());
    store.add_session(session_id, class_id);
    store.add_instructor(class_id, professor);
    store.enroll_student(class_id, student);

    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 9, 8, 10, 0, 0).unwrap(),
    ));
    let state = AppState::new(Arc::new(store), clock.clone(), PollConfig::default());

    Harness {
        app: routes::create_routes(state),
        clock,
        session_id,
        professor,
        student,
    }
}

async fn send(app: &Router, method: &str, uri: &str, user: Option<Uuid>, body: Value) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user) = user {
        request = request.header(USER_ID_HEADER, user.to_string());
    }

    let response = app
        .clone()
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn professor_opens_poll_and_student_redeems_it() {
    let h = harness();
    let polls_uri = format!("/api/sessions/{}/polls", h.session_id);

    let (status, poll) = send(&h.app, "POST", &polls_uri, Some(h.professor), json!({ "duration_minutes": "10" })).await;
    assert_eq!(status, StatusCode::CREATED);
    let code = poll["code"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 8);

    let (status, record) = send(&h.app, "POST", "/api/attendance", Some(h.student), json!({ "code": code })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(record["student_id"], json!(h.student));
    assert_eq!(record["poll_id"], poll["id"]);

    let (status, body) = send(&h.app, "POST", "/api/attendance", Some(h.student), json!({ "code": code })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");

    let (status, records) = send(
        &h.app,
        "GET",
        &format!("/api/sessions/{}/attendance", h.session_id),
        Some(h.professor),
        Value::Null,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(records.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn expired_and_closed_codes_are_gone() {
    let h = harness();
    let polls_uri = format!("/api/sessions/{}/polls", h.session_id);

    let (_, poll) = send(&h.app, "POST", &polls_uri, Some(h.professor), json!({ "duration_minutes": 1 })).await;
    h.clock.advance(Duration::minutes(2));
    let (status, _) = send(&h.app, "POST", "/api/attendance", Some(h.student), json!({ "code": poll["code"] })).await;
    assert_eq!(status, StatusCode::GONE);

    let (_, fresh) = send(&h.app, "POST", &polls_uri, Some(h.professor), json!({})).await;
    let deactivate_uri = format!("/api/polls/{}/deactivate", fresh["id"].as_str().unwrap());
    let (status, _) = send(&h.app, "POST", &deactivate_uri, Some(h.professor), Value::Null).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&h.app, "POST", "/api/attendance", Some(h.student), json!({ "code": fresh["code"] })).await;
    assert_eq!(status, StatusCode::GONE);

    let (status, view) = send(
        &h.app,
        "GET",
        &format!("/api/polls/{}", poll["id"].as_str().unwrap()),
        Some(h.professor),
        Value::Null,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["expired"], json!(true));
}

#[tokio::test]
async fn boundary_rejections() {
    let h = harness();
    let polls_uri = format!("/api/sessions/{}/polls", h.session_id);

    let (status, _) = send(&h.app, "POST", &polls_uri, None, json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&h.app, "POST", &polls_uri, Some(h.student), json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&h.app, "POST", &polls_uri, Some(h.professor), json!({ "duration_minutes": "soon" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, _) = send(&h.app, "POST", &polls_uri, Some(h.professor), json!({ "duration_minutes": 0 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = format!("/api/sessions/{}/polls", Uuid::new_v4());
    let (status, _) = send(&h.app, "POST", &missing, Some(h.professor), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&h.app, "POST", "/api/attendance", Some(h.student), json!({ "code": "00000000" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn health_needs_no_identity() {
    let h = harness();
    let (status, body) = send(&h.app, "GET", "/health", None, Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn foreign_polls_look_missing() {
    let h = harness();
    let polls_uri = format!("/api/sessions/{}/polls", h.session_id);
    let (_, poll) = send(&h.app, "POST", &polls_uri, Some(h.professor), json!({})).await;
    let poll_id = poll["id"].as_str().unwrap();

    let existing = format!("/api/polls/{poll_id}");
    let missing = format!("/api/polls/{}", Uuid::new_v4());
    for uri in [&existing, &missing] {
        let (status, body) = send(&h.app, "GET", uri, Some(h.student), Value::Null).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body["kind"], "not_found");

        let deactivate = format!("{uri}/deactivate");
        let (status, _) = send(&h.app, "POST", &deactivate, Some(h.student), Value::Null).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{deactivate}");
    }

    // The poll is still open after the rejected close.
    let (status, view) = send(&h.app, "GET", &existing, Some(h.professor), Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["active"], json!(true));
}

#[tokio::test]
async fn typed_code_with_whitespace_is_accepted() {
    let h = harness();
    let polls_uri = format!("/api/sessions/{}/polls", h.session_id);
    let (_, poll) = send(&h.app, "POST", &polls_uri, Some(h.professor), json!({})).await;
    let padded = format!("  {}\n", poll["code"].as_str().unwrap());

    let (status, record) = send(&h.app, "POST", "/api/attendance", Some(h.student), json!({ "code": padded })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(record["poll_id"], poll["id"]);
}
