// libs/sync-cell/src/services/mirror.rs
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use consultation_cell::{ConsultationRecord, ConsultationStatus};

pub const PROVISIONAL_ID_PREFIX: &str = "local-";

/// One entry in the local consultation collection.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackedConsultation {
    /// As last returned by the server.
    Confirmed(ConsultationRecord),
    /// A status change in flight. `previous` is what to restore on failure.
    Optimistic {
        record: ConsultationRecord,
        previous: ConsultationRecord,
        pending_since: DateTime<Utc>,
    },
    /// A booking not yet seen in an authoritative fetch.
    Provisional {
        temp_id: String,
        record: ConsultationRecord,
        server_id: Option<String>,
        pending_since: DateTime<Utc>,
    },
}

impl TrackedConsultation {
    pub fn record(&self) -> &ConsultationRecord {
        match self {
            TrackedConsultation::Confirmed(record) => record,
            TrackedConsultation::Optimistic { record, .. } => record,
            TrackedConsultation::Provisional { record, .. } => record,
        }
    }

    pub fn is_pending(&self) -> bool {
        !matches!(self, TrackedConsultation::Confirmed(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConsultationMirror {
    entries: Vec<TrackedConsultation>,
    last_synced_at: Option<DateTime<Utc>>,
}

impl ConsultationMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a freshly fetched collection as a whole.
    ///
    /// Optimistic entries collapse to whatever the server returned. Provisional
    /// bookings survive only until the fetch contains their server id.
    pub fn replace_authoritative(&mut self, fetched: Vec<ConsultationRecord>, synced_at: DateTime<Utc>) {
        let provisional: Vec<TrackedConsultation> = self
            .entries
            .drain(..)
            .filter(|entry| match entry {
                TrackedConsultation::Provisional { server_id, temp_id, .. } => {
                    let confirmed = server_id
                        .as_deref()
                        .is_some_and(|id| fetched.iter().any(|record| record.id == id));
                    if confirmed {
                        debug!(temp_id = %temp_id, "Provisional booking confirmed by refresh, discarding");
                    }
                    !confirmed
                }
                _ => false,
            })
            .collect();

        self.entries = fetched.into_iter().map(TrackedConsultation::Confirmed).collect();
        self.entries.extend(provisional);
        self.last_synced_at = Some(synced_at);
    }

    /// The collection as views should see it.
    pub fn records(&self) -> Vec<ConsultationRecord> {
        self.entries.iter().map(|entry| entry.record().clone()).collect()
    }

    pub fn entries(&self) -> &[TrackedConsultation] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&ConsultationRecord> {
        self.entries.iter().map(TrackedConsultation::record).find(|record| record.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_pending()).count()
    }

    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.last_synced_at
    }

    /// Apply `status` locally ahead of the server. Returns the optimistic record.
    pub fn mark_optimistic(
        &mut self,
        id: &str,
        status: ConsultationStatus,
        doctor_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<ConsultationRecord> {
        let entry = self.entries.iter_mut().find(|entry| entry.record().id == id)?;

        let previous = match &*entry {
            TrackedConsultation::Confirmed(record) => record.clone(),
            TrackedConsultation::Optimistic { previous, .. } => previous.clone(),
            // Bookings in flight have no authoritative version to fall back to.
            TrackedConsultation::Provisional { .. } => return None,
        };

        let mut record = entry.record().clone();
        record.status = status;
        record.updated_at = now;
        if let Some(doctor_id) = doctor_id {
            record.doctor_id = Some(doctor_id.to_string());
        }

        *entry = TrackedConsultation::Optimistic {
            record: record.clone(),
            previous,
            pending_since: now,
        };
        Some(record)
    }

    /// Restore the last authoritative version of `id`, if it is still optimistic.
    pub fn revert(&mut self, id: &str) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|entry| entry.record().id == id) else {
            return false;
        };

        let restored = match &*entry {
            TrackedConsultation::Optimistic { previous, .. } => previous.clone(),
            _ => return false,
        };

        *entry = TrackedConsultation::Confirmed(restored);
        true
    }

    /// Insert a locally created booking under a temporary id.
    pub fn insert_provisional(&mut self, mut record: ConsultationRecord, now: DateTime<Utc>) -> String {
        let temp_id = format!("{}{}", PROVISIONAL_ID_PREFIX, Uuid::new_v4());
        record.id = temp_id.clone();

        self.entries.push(TrackedConsultation::Provisional {
            temp_id: temp_id.clone(),
            record,
            server_id: None,
            pending_since: now,
        });
        temp_id
    }

    pub fn attach_server_id(&mut self, temp_id: &str, server_id: &str) -> bool {
        for entry in self.entries.iter_mut() {
            if let TrackedConsultation::Provisional { temp_id: current, server_id: slot, .. } = entry {
                if current.as_str() == temp_id {
                    *slot = Some(server_id.to_string());
                    return true;
                }
            }
        }
        false
    }

    pub fn discard_provisional(&mut self, temp_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| {
            !matches!(entry, TrackedConsultation::Provisional { temp_id: current, .. } if current == temp_id)
        });
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_synced_at = None;
    }
}
