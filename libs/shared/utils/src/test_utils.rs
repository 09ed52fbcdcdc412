use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::{AppConfig, SyncSettings};
use shared_models::auth::{Actor, ActorRole};

pub struct TestConfig {
    pub clinic_api_url: String,
    pub session_token: String,
    pub actor_id: String,
    pub actor_role: String,
    pub actor_name: Option<String>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            clinic_api_url: "http://localhost:8000".to_string(),
            session_token: "test-session-token".to_string(),
            actor_id: Uuid::new_v4().to_string(),
            actor_role: "patient".to_string(),
            actor_name: None,
        }
    }
}

impl TestConfig {
    /// A config pointing at a mock backend, acting as `user`.
    pub fn for_server(base_url: &str, user: &TestUser) -> Self {
        Self {
            clinic_api_url: base_url.to_string(),
            session_token: user.token.clone(),
            actor_id: user.id.clone(),
            actor_role: user.role.to_string(),
            actor_name: Some(user.name.clone()),
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            clinic_api_url: self.clinic_api_url.clone(),
            session_token: self.session_token.clone(),
            actor_id: self.actor_id.clone(),
            actor_role: self.actor_role.clone(),
            actor_display_name: self.actor_name.clone(),
            sync: fast_sync_settings(),
            consultation_fetch_limit: 50,
            history_recent_days: 30,
            display_utc_offset_minutes: 0,
            notify_patient_on_accept: true,
            dashboard_port: 0,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

/// Millisecond-scale intervals so poller tests finish quickly.
pub fn fast_sync_settings() -> SyncSettings {
    SyncSettings {
        consultation_interval: StdDuration::from_millis(200),
        notification_interval: StdDuration::from_millis(50),
        request_timeout: StdDuration::from_millis(500),
        alert_recency_window: StdDuration::from_secs(180),
        alerted_set_capacity: 100,
    }
}

pub struct TestUser {
    pub id: String,
    pub name: String,
    pub role: ActorRole,
    pub token: String,
}

impl TestUser {
    pub fn new(name: &str, role: ActorRole) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            role,
            token: format!("token-{}", Uuid::new_v4()),
        }
    }

    pub fn doctor(name: &str) -> Self {
        Self::new(name, ActorRole::Doctor)
    }

    pub fn patient(name: &str) -> Self {
        Self::new(name, ActorRole::Patient)
    }

    pub fn admin(name: &str) -> Self {
        Self::new(name, ActorRole::Admin)
    }

    pub fn to_actor(&self) -> Actor {
        Actor::new(self.id.clone(), self.role).with_display_name(self.name.clone())
    }
}

fn iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// JSON bodies shaped like the clinic backend's.
pub struct MockClinicResponses;

impl MockClinicResponses {
    pub fn consultation_response(
        id: &str,
        patient_id: &str,
        doctor_id: Option<&str>,
        status: &str,
        scheduled_at: DateTime<Utc>,
    ) -> Value {
        let created_at = scheduled_at - Duration::days(1);
        json!({
            "_id": id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "consultation_type": "initial",
            "priority": "medium",
            "status": status,
            "scheduled_at": iso(scheduled_at),
            "chief_complaint": "Persistent headache",
            "symptoms": [
                {"name": "headache", "severity": 6, "duration": "3 days", "description": null}
            ],
            "created_at": iso(created_at),
            "updated_at": iso(created_at)
        })
    }

    pub fn consultations_envelope(consultations: Vec<Value>) -> Value {
        json!({ "consultations": consultations })
    }

    pub fn notification_response(
        id: &str,
        consultation_id: Option<&str>,
        created_at: DateTime<Utc>,
        read: bool,
    ) -> Value {
        // The backend emits naive timestamps with a trailing Z for notifications.
        json!({
            "_id": id,
            "consultation_id": consultation_id,
            "title": "Consultation Accepted",
            "message": "Your consultation has been accepted",
            "type": "appointment",
            "from_doctor": "Dr. Test",
            "from_doctor_id": "doctor-1",
            "read": read,
            "created_at": format!("{}Z", created_at.naive_utc().format("%Y-%m-%dT%H:%M:%S%.6f"))
        })
    }

    pub fn system_notification_response(id: &str, created_at: DateTime<Utc>) -> Value {
        json!({
            "_id": id,
            "title": "Test Notification",
            "message": "System check",
            "type": "test",
            "from_doctor": "System Test",
            "from_doctor_id": "system",
            "read": false,
            "created_at": iso(created_at)
        })
    }

    pub fn notifications_envelope(notifications: Vec<Value>, unread_count: u32) -> Value {
        json!({
            "notifications": notifications,
            "unread_count": unread_count
        })
    }

    pub fn audit_trail_response(subject_id: &str, events: usize) -> Value {
        let trail: Vec<Value> = (0..events)
            .map(|index| {
                json!({
                    "index": index + 1,
                    "timestamp": "2024-01-01T00:00:00",
                    "data": {"action": "consultation_created", "patient_id": subject_id},
                    "previous_hash": format!("{:064x}", index),
                    "hash": format!("{:064x}", index + 1)
                })
            })
            .collect();

        json!({
            "patient_id": subject_id,
            "audit_trail": trail,
            "total_records": events,
            "returned_records": events
        })
    }

    pub fn error_response(detail: &str) -> Value {
        json!({ "detail": detail })
    }
}
