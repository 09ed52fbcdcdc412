use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use amae_dashboard::{create_router, DashboardState};
use notification_cell::LogChannel;
use shared_models::clock::SystemClock;
use shared_utils::test_utils::{MockClinicResponses, TestConfig, TestUser};

fn dashboard(server: &MockServer, user: &TestUser) -> Arc<DashboardState> {
    let config = TestConfig::for_server(&server.uri(), user).to_app_config();
    Arc::new(DashboardState::build(config, Arc::new(SystemClock), Arc::new(LogChannel)).unwrap())
}

async fn call(state: &Arc<DashboardState>, method: Method, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = create_router(Arc::clone(state)).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

async fn mount_doctor_collection(server: &MockServer, doctor: &TestUser) {
    let now = Utc::now();
    Mock::given(method("GET"))
        .and(path("/api/consultations/my-consultations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockClinicResponses::consultation_response("c-pending", "p-1", None, "pending", now + Duration::hours(2)),
            MockClinicResponses::consultation_response("c-sched", "p-2", Some(doctor.id.as_str()), "scheduled", now),
            MockClinicResponses::consultation_response("c-done", "p-3", Some(doctor.id.as_str()), "completed", now - Duration::days(3)),
        ])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_views_project_the_local_collection() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("Dr. Grey");
    mount_doctor_collection(&mock_server, &doctor).await;

    let state = dashboard(&mock_server, &doctor);
    state.client.refresh_consultations().await.unwrap();

    let (status, body) = call(&state, Method::GET, "/views/pending").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["consultations"][0]["id"], "c-pending");

    let (status, body) = call(&state, Method::GET, "/views/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["completed"], 1);

    let (status, body) = call(&state, Method::GET, "/views/table?status=scheduled&sort=scheduled_at&dir=desc&page=1&page_size=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_items"], 1);
    assert_eq!(body["items"][0]["id"], "c-sched");
}

#[tokio::test]
async fn test_invalid_action_is_conflict_without_backend_call() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("Dr. Grey");
    mount_doctor_collection(&mock_server, &doctor).await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let state = dashboard(&mock_server, &doctor);
    state.client.refresh_consultations().await.unwrap();

    let (status, body) = call(&state, Method::POST, "/consultations/c-done/cancel").await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("completed"));
}

#[tokio::test]
async fn test_unknown_consultation_is_not_found() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("Dr. Grey");
    let state = dashboard(&mock_server, &doctor);

    let (status, _) = call(&state, Method::POST, "/consultations/nope/start").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rejected_token_signs_the_surface_out() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("Dr. Grey");
    mount_doctor_collection(&mock_server, &doctor).await;
    Mock::given(method("PUT"))
        .and(path("/api/consultations/c-sched"))
        .respond_with(ResponseTemplate::new(401).set_body_json(MockClinicResponses::error_response("Token expired")))
        .mount(&mock_server)
        .await;

    let state = dashboard(&mock_server, &doctor);
    state.client.refresh_consultations().await.unwrap();

    let (status, body) = call(&state, Method::POST, "/consultations/c-sched/start").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Token expired");

    for uri in ["/views/pending", "/notifications", "/sync/status"] {
        let (status, _) = call(&state, Method::GET, uri).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} should be closed", uri);
    }
}

#[tokio::test]
async fn test_notifications_and_sync_status() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("Pat");
    let recent = Utc::now() - Duration::seconds(5);

    Mock::given(method("GET"))
        .and(path("/api/notifications/my-notifications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockClinicResponses::notifications_envelope(
            vec![MockClinicResponses::notification_response("n-1", None, recent, false)],
            1,
        )))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/notifications/mark-all-read"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let state = dashboard(&mock_server, &patient);
    state.client.refresh_notifications().await.unwrap();

    let (status, body) = call(&state, Method::GET, "/notifications").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["unread_count"], 1);
    assert_eq!(body["notifications"][0]["id"], "n-1");

    let (status, _) = call(&state, Method::POST, "/notifications/read-all").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&state, Method::GET, "/sync/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["alive"], true);
    assert_eq!(body["unread_count"], 0);
    assert_eq!(body["alerted_ids"], 1);
}

#[tokio::test]
async fn test_audit_trail_passthrough() {
    let mock_server = MockServer::start().await;
    let admin = TestUser::admin("Root");

    Mock::given(method("GET"))
        .and(path("/api/blockchain/audit-trail/p-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockClinicResponses::audit_trail_response("p-9", 2)))
        .mount(&mock_server)
        .await;

    let state = dashboard(&mock_server, &admin);
    let (status, body) = call(&state, Method::GET, "/audit/p-9?limit=2").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subject_id"], "p-9");
    assert_eq!(body["events"].as_array().map(Vec::len), Some(2));
}

async fn accept_and_capture_message(server: &MockServer, state: &Arc<DashboardState>, doctor: &TestUser) -> String {
    Mock::given(method("PUT"))
        .and(path("/api/consultations/c-pending"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockClinicResponses::consultation_response(
            "c-pending",
            "p-1",
            Some(doctor.id.as_str()),
            "scheduled",
            Utc::now() + Duration::hours(2),
        )))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/notifications/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Notification sent successfully"})))
        .expect(1)
        .mount(server)
        .await;

    state.client.refresh_consultations().await.unwrap();
    let (status, _) = call(state, Method::POST, "/consultations/c-pending/accept").await;
    assert_eq!(status, StatusCode::OK);

    let sent = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .find(|request| request.url.path() == "/api/notifications/send")
        .unwrap();
    let body: Value = serde_json::from_slice(&sent.body).unwrap();
    body["message"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_accept_notification_names_the_configured_doctor() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("Dr. Grey");
    mount_doctor_collection(&mock_server, &doctor).await;

    let state = dashboard(&mock_server, &doctor);
    let message = accept_and_capture_message(&mock_server, &state, &doctor).await;

    assert!(message.starts_with("Dr. Grey accepted your"), "{}", message);
}

#[tokio::test]
async fn test_accept_notification_without_configured_name() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("Dr. Grey");
    mount_doctor_collection(&mock_server, &doctor).await;

    let mut config = TestConfig::for_server(&mock_server.uri(), &doctor);
    config.actor_name = None;
    let state = Arc::new(
        DashboardState::build(config.to_app_config(), Arc::new(SystemClock), Arc::new(LogChannel)).unwrap(),
    );
    let message = accept_and_capture_message(&mock_server, &state, &doctor).await;

    assert!(message.starts_with("Your doctor accepted your"), "{}", message);
}
