// libs/sync-cell/src/models.rs
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use notification_cell::{DeliveryReport, Watermark};
use shared_models::auth::Actor;

// ==============================================================================
// SYNC MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Consultations,
    Notifications,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collection::Consultations => write!(f, "consultations"),
            Collection::Notifications => write!(f, "notifications"),
        }
    }
}

/// Published on the session's broadcast channel.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    ConsultationsUpdated { count: usize, synced_at: DateTime<Utc> },
    NotificationsUpdated { unread_count: u32, delivered: usize },
    /// The collection kept its previous contents; views should show them as stale.
    SyncDegraded { collection: Collection, reason: String },
    /// A 401 ended the session. Polling has stopped.
    Reauthenticate,
    SessionClosed,
}

/// How one refresh call ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied,
    /// Another request for the same collection was already in flight.
    Skipped,
    /// The result landed after teardown or after a newer result.
    Discarded,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CollectionStatus {
    pub last_synced_at: Option<DateTime<Utc>>,
    pub stale: bool,
    pub last_error: Option<String>,
    pub skipped_ticks: u64,
    pub discarded_results: u64,
}

impl CollectionStatus {
    pub fn mark_fresh(&mut self, at: DateTime<Utc>) {
        self.last_synced_at = Some(at);
        self.stale = false;
        self.last_error = None;
    }

    pub fn mark_degraded(&mut self, reason: impl Into<String>) {
        self.stale = true;
        self.last_error = Some(reason.into());
    }
}

/// Read-only summary of the session for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SyncSnapshot {
    pub actor: Actor,
    pub alive: bool,
    pub consultations: CollectionStatus,
    pub notifications: CollectionStatus,
    pub consultation_count: usize,
    pub pending_local_changes: usize,
    pub unread_count: u32,
    pub alerted_ids: usize,
    pub watermark: Option<Watermark>,
    pub last_delivery: Option<DeliveryReport>,
}

// ==============================================================================
// AUDIT TRAIL MODELS
// ==============================================================================

/// One hash-linked audit block, rendered as received.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEvent {
    pub index: u64,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub previous_hash: String,
    #[serde(default)]
    pub hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditTrail {
    #[serde(alias = "patient_id")]
    pub subject_id: String,
    #[serde(alias = "audit_trail", default)]
    pub events: Vec<AuditEvent>,
    #[serde(default)]
    pub total_records: u64,
    #[serde(default)]
    pub returned_records: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AuditStats {
    #[serde(default)]
    pub total_blocks: u64,
    #[serde(default)]
    pub transaction_types: BTreeMap<String, u64>,
    #[serde(default)]
    pub recent_activity: u64,
    #[serde(default)]
    pub blockchain_integrity: bool,
}
