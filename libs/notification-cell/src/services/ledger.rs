// libs/notification-cell/src/services/ledger.rs
use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::NotificationRecord;

/// The newest notification observed so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Watermark {
    pub created_at: DateTime<Utc>,
    pub id: String,
}

/// Ids already alerted on (or deliberately passed over) this session.
///
/// Bounded: once `capacity` is exceeded the oldest recorded ids are evicted,
/// but never below the size of the id set passed to the last `retain_only`.
#[derive(Debug, Clone)]
pub struct AlertLedger {
    capacity: usize,
    floor: usize,
    order: VecDeque<String>,
    seen: HashSet<String>,
    watermark: Option<Watermark>,
}

impl AlertLedger {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            floor: 0,
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
            watermark: None,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Returns `false` if the id was already present.
    pub fn record(&mut self, id: &str) -> bool {
        if !self.seen.insert(id.to_string()) {
            return false;
        }

        self.order.push_back(id.to_string());
        let limit = self.capacity.max(self.floor);
        while self.order.len() > limit {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        true
    }

    /// Forget every id outside `current`. Ids in `current` are not evicted
    /// by later `record` calls, even past `capacity`.
    pub fn retain_only(&mut self, current: &HashSet<&str>) {
        self.order.retain(|id| current.contains(id.as_str()));
        self.seen.retain(|id| current.contains(id.as_str()));
        self.floor = current.len();
    }

    pub fn advance_watermark(&mut self, notification: &NotificationRecord) {
        let newer = match &self.watermark {
            None => true,
            Some(mark) => (notification.created_at, notification.id.as_str()) > (mark.created_at, mark.id.as_str()),
        };

        if newer {
            self.watermark = Some(Watermark {
                created_at: notification.created_at,
                id: notification.id.clone(),
            });
        }
    }

    pub fn watermark(&self) -> Option<&Watermark> {
        self.watermark.as_ref()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.seen.clear();
        self.floor = 0;
        self.watermark = None;
    }
}
