// libs/notification-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==============================================================================
// NOTIFICATION MODELS
// ==============================================================================

/// Who a notification came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationSource {
    Doctor { id: String, name: String },
    System,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NotificationRecord {
    pub id: String,
    /// `None` for system-level notices.
    pub consultation_id: Option<String>,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub source: NotificationSource,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl NotificationRecord {
    pub fn is_system(&self) -> bool {
        self.source == NotificationSource::System
    }
}

/// One notification fetch, already normalized.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct NotificationBatch {
    pub notifications: Vec<NotificationRecord>,
    /// Server-reported; authoritative over any locally computed count.
    pub unread_count: u32,
}

/// Payload for `POST /api/notifications/send`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendNotificationRequest {
    pub patient_id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consultation_id: Option<String>,
}

// ==============================================================================
// DELIVERY MODELS
// ==============================================================================

/// What one dedup pass decided and did.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct DeliveryReport {
    /// Ids alerted on this tick, in delivery order.
    pub delivered: Vec<String>,
    /// New ids held back until their consultation shows up locally.
    pub deferred: Vec<String>,
    pub tone_played: bool,
    pub badge: u32,
    pub badge_delta: i64,
    pub channel_failures: u32,
}

impl DeliveryReport {
    pub fn delivered_count(&self) -> usize {
        self.delivered.len()
    }
}
