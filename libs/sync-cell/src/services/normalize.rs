// libs/sync-cell/src/services/normalize.rs
//
// The single place where backend response shapes are interpreted. Everything
// past this module sees only `ConsultationRecord` and `NotificationRecord`.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use consultation_cell::ConsultationRecord;
use notification_cell::{NotificationBatch, NotificationRecord, NotificationSource};
use shared_models::error::ApiError;
use shared_models::timestamps;

use crate::models::{AuditStats, AuditTrail};

const SYSTEM_SENDER_ID: &str = "system";

fn malformed(what: &str, body: &Value) -> ApiError {
    let kind = match body {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object without the expected fields",
    };
    ApiError::MalformedResponse(format!("expected {}, got {}", what, kind))
}

/// Accepts a bare list or `{"consultations": [...]}`. Items that do not parse
/// are dropped with a warning; a wrong outer shape fails the whole response.
pub fn consultations(body: Value) -> Result<Vec<ConsultationRecord>, ApiError> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("consultations") {
            Some(Value::Array(items)) => items,
            _ => return Err(malformed("a consultation list", &Value::Object(map))),
        },
        other => return Err(malformed("a consultation list", &other)),
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<ConsultationRecord>(item) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping malformed consultation record: {}", e);
                None
            }
        })
        .collect())
}

/// A single record, bare or wrapped as `{"consultation": {...}}`.
pub fn consultation(body: Value) -> Result<ConsultationRecord, ApiError> {
    let item = match body {
        Value::Object(mut map) if map.contains_key("consultation") => {
            map.remove("consultation").unwrap_or(Value::Null)
        }
        other => other,
    };

    serde_json::from_value(item).map_err(|e| ApiError::MalformedResponse(format!("invalid consultation record: {}", e)))
}

#[derive(Debug, Deserialize)]
struct RawNotification {
    #[serde(alias = "_id")]
    id: String,
    #[serde(default, alias = "appointment_id")]
    consultation_id: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    message: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    from_doctor: Option<String>,
    #[serde(default)]
    from_doctor_id: Option<String>,
    #[serde(default)]
    read: bool,
    #[serde(deserialize_with = "timestamps::deserialize")]
    created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "timestamps::deserialize_option")]
    scheduled_at: Option<DateTime<Utc>>,
}

impl From<RawNotification> for NotificationRecord {
    fn from(raw: RawNotification) -> Self {
        let source = match raw.from_doctor_id {
            Some(id) if !id.is_empty() && id != SYSTEM_SENDER_ID => NotificationSource::Doctor {
                id,
                name: raw.from_doctor.unwrap_or_default(),
            },
            _ => NotificationSource::System,
        };

        NotificationRecord {
            id: raw.id,
            consultation_id: raw.consultation_id.filter(|id| !id.is_empty()),
            title: raw.title,
            message: raw.message,
            kind: raw.kind,
            source,
            read: raw.read,
            created_at: raw.created_at,
            scheduled_at: raw.scheduled_at,
        }
    }
}

/// Accepts `{"notifications": [...], "unread_count": n}` or a bare list. A
/// missing `unread_count` is computed from the items.
pub fn notifications(body: Value) -> Result<NotificationBatch, ApiError> {
    let (items, reported_unread) = match body {
        Value::Array(items) => (items, None),
        Value::Object(mut map) => {
            let unread = map.get("unread_count").and_then(Value::as_u64);
            match map.remove("notifications") {
                Some(Value::Array(items)) => (items, unread),
                _ => return Err(malformed("a notification list", &Value::Object(map))),
            }
        }
        other => return Err(malformed("a notification list", &other)),
    };

    let notifications: Vec<NotificationRecord> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<RawNotification>(item) {
            Ok(raw) => Some(raw.into()),
            Err(e) => {
                warn!("Skipping malformed notification record: {}", e);
                None
            }
        })
        .collect();

    let unread_count = match reported_unread {
        Some(count) => u32::try_from(count).unwrap_or(u32::MAX),
        None => notifications.iter().filter(|n| !n.read).count() as u32,
    };

    Ok(NotificationBatch { notifications, unread_count })
}

pub fn audit_trail(body: Value) -> Result<AuditTrail, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::MalformedResponse(format!("invalid audit trail: {}", e)))
}

/// Accepts the stats object bare or wrapped as `{"blockchain_stats": {...}}`.
pub fn audit_stats(body: Value) -> Result<AuditStats, ApiError> {
    let stats = match body {
        Value::Object(mut map) if map.contains_key("blockchain_stats") => {
            map.remove("blockchain_stats").unwrap_or(Value::Null)
        }
        other => other,
    };

    serde_json::from_value(stats).map_err(|e| ApiError::MalformedResponse(format!("invalid audit stats: {}", e)))
}
