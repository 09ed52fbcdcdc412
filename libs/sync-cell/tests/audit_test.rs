use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_database::clinic_api::ClinicApiClient;
use shared_models::error::ApiError;
use shared_utils::test_utils::{MockClinicResponses, TestConfig, TestUser};
use sync_cell::AuditTrailService;

fn service(server: &MockServer) -> AuditTrailService {
    let config = TestConfig::for_server(&server.uri(), &TestUser::admin("Root")).to_app_config();
    AuditTrailService::new(Arc::new(ClinicApiClient::new(&config)), config.sync.request_timeout)
}

#[tokio::test]
async fn test_trail_is_returned_as_received() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/blockchain/audit-trail/patient-7"))
        .and(query_param("skip", "0"))
        .and(query_param("limit", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockClinicResponses::audit_trail_response("patient-7", 3)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let trail = service(&mock_server).trail("patient-7", 0, 0).await.unwrap();

    assert_eq!(trail.subject_id, "patient-7");
    assert_eq!(trail.events.len(), 3);
    assert_eq!(trail.total_records, 3);
    // Chain links are passed through untouched.
    assert_eq!(trail.events[1].previous_hash, trail.events[0].hash);
    assert_eq!(trail.events[0].data["action"], "consultation_created");
}

#[tokio::test]
async fn test_stats_accepts_wrapped_envelope() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/blockchain/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "blockchain_stats": {
                "total_blocks": 12,
                "transaction_types": {"consultation_created": 7, "status_changed": 5},
                "recent_activity": 4,
                "blockchain_integrity": true
            }
        })))
        .mount(&mock_server)
        .await;

    let stats = service(&mock_server).stats().await.unwrap();

    assert_eq!(stats.total_blocks, 12);
    assert_eq!(stats.transaction_types.get("status_changed"), Some(&5));
    assert!(stats.blockchain_integrity);
}

#[tokio::test]
async fn test_slow_ledger_times_out_as_transient() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/blockchain/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})).set_delay(Duration::from_secs(2)))
        .mount(&mock_server)
        .await;

    let result = service(&mock_server).stats().await;

    assert_matches!(result, Err(ApiError::Transient(_)));
}

#[tokio::test]
async fn test_unreadable_trail_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/blockchain/audit-trail/patient-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"audit_trail": "nope"})))
        .mount(&mock_server)
        .await;

    let result = service(&mock_server).trail("patient-7", 0, 10).await;

    assert_matches!(result, Err(ApiError::MalformedResponse(_)));
}
