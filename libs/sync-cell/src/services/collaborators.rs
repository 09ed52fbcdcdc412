// libs/sync-cell/src/services/collaborators.rs
//
// The backend as seen by the sync layer. Every call returns the raw JSON body;
// shape handling happens once, in `normalize`.

use async_trait::async_trait;
use serde_json::{json, Value};

use consultation_cell::{BookConsultationRequest, ConsultationStatus, StatusUpdateRequest};
use notification_cell::SendNotificationRequest;
use shared_database::clinic_api::ClinicApiClient;
use shared_models::error::ApiError;

fn to_body<T: serde::Serialize>(payload: &T) -> Result<Value, ApiError> {
    serde_json::to_value(payload).map_err(|e| ApiError::MalformedResponse(format!("unencodable payload: {}", e)))
}

#[async_trait]
pub trait ConsultationSource: Send + Sync {
    async fn my_consultations(&self, limit: u32) -> Result<Value, ApiError>;

    async fn create(&self, payload: &BookConsultationRequest) -> Result<Value, ApiError>;

    /// `pending -> scheduled` with `doctor_id` assigned, in one update.
    async fn accept(&self, consultation_id: &str, doctor_id: &str) -> Result<Value, ApiError>;

    async fn set_status(&self, consultation_id: &str, status: ConsultationStatus) -> Result<Value, ApiError>;
}

/// Notification query and mutations. Mutations are idempotent server-side.
#[async_trait]
pub trait NotificationFeed: Send + Sync {
    async fn my_notifications(&self, unread_only: bool) -> Result<Value, ApiError>;

    async fn mark_read(&self, notification_id: &str) -> Result<Value, ApiError>;

    async fn mark_all_read(&self) -> Result<Value, ApiError>;

    async fn clear_all(&self) -> Result<Value, ApiError>;

    async fn send(&self, notification: &SendNotificationRequest) -> Result<Value, ApiError>;
}

#[async_trait]
pub trait AuditTrailSource: Send + Sync {
    async fn audit_trail(&self, subject_id: &str, skip: u32, limit: u32) -> Result<Value, ApiError>;

    async fn stats(&self) -> Result<Value, ApiError>;
}

#[async_trait]
impl ConsultationSource for ClinicApiClient {
    async fn my_consultations(&self, limit: u32) -> Result<Value, ApiError> {
        self.get(&format!("/api/consultations/my-consultations?skip=0&limit={}", limit)).await
    }

    async fn create(&self, payload: &BookConsultationRequest) -> Result<Value, ApiError> {
        self.post("/api/consultations/", Some(to_body(payload)?)).await
    }

    async fn accept(&self, consultation_id: &str, doctor_id: &str) -> Result<Value, ApiError> {
        let body = to_body(&StatusUpdateRequest {
            status: ConsultationStatus::Scheduled,
            doctor_id: Some(doctor_id.to_string()),
        })?;
        self.put(&format!("/api/consultations/{}", consultation_id), body).await
    }

    async fn set_status(&self, consultation_id: &str, status: ConsultationStatus) -> Result<Value, ApiError> {
        let body = to_body(&StatusUpdateRequest { status, doctor_id: None })?;
        self.put(&format!("/api/consultations/{}", consultation_id), body).await
    }
}

#[async_trait]
impl NotificationFeed for ClinicApiClient {
    async fn my_notifications(&self, unread_only: bool) -> Result<Value, ApiError> {
        self.get(&format!("/api/notifications/my-notifications?unread_only={}", unread_only)).await
    }

    async fn mark_read(&self, notification_id: &str) -> Result<Value, ApiError> {
        self.patch(&format!("/api/notifications/{}/read", notification_id)).await
    }

    async fn mark_all_read(&self) -> Result<Value, ApiError> {
        self.post("/api/notifications/mark-all-read", Some(json!({}))).await
    }

    async fn clear_all(&self) -> Result<Value, ApiError> {
        self.delete("/api/notifications/clear-all").await
    }

    async fn send(&self, notification: &SendNotificationRequest) -> Result<Value, ApiError> {
        self.post("/api/notifications/send", Some(to_body(notification)?)).await
    }
}

#[async_trait]
impl AuditTrailSource for ClinicApiClient {
    async fn audit_trail(&self, subject_id: &str, skip: u32, limit: u32) -> Result<Value, ApiError> {
        self.get(&format!("/api/blockchain/audit-trail/{}?skip={}&limit={}", subject_id, skip, limit))
            .await
    }

    async fn stats(&self) -> Result<Value, ApiError> {
        self.get("/api/blockchain/stats").await
    }
}
