// libs/sync-cell/src/services/session.rs
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch, Mutex, MutexGuard, RwLock};
use tracing::{debug, info};

use notification_cell::{AlertLedger, DeliveryReport, NotificationRecord};
use shared_config::SyncSettings;
use shared_models::auth::Actor;
use shared_models::clock::Clock;

use crate::models::{Collection, CollectionStatus, SyncEvent, SyncSnapshot};
use crate::services::mirror::ConsultationMirror;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Everything one dashboard session knows locally.
#[derive(Debug)]
pub struct LocalSyncState {
    pub consultations: ConsultationMirror,
    /// `false` until the first successful consultation refresh.
    pub consultations_synced: bool,
    pub notifications: Vec<NotificationRecord>,
    pub unread_count: u32,
    pub ledger: AlertLedger,
    pub consultation_status: CollectionStatus,
    pub notification_status: CollectionStatus,
    pub last_delivery: Option<DeliveryReport>,
}

impl LocalSyncState {
    fn new(alerted_set_capacity: usize) -> Self {
        Self {
            consultations: ConsultationMirror::new(),
            consultations_synced: false,
            notifications: Vec::new(),
            unread_count: 0,
            ledger: AlertLedger::new(alerted_set_capacity),
            consultation_status: CollectionStatus::default(),
            notification_status: CollectionStatus::default(),
            last_delivery: None,
        }
    }

    pub fn status_mut(&mut self, collection: Collection) -> &mut CollectionStatus {
        match collection {
            Collection::Consultations => &mut self.consultation_status,
            Collection::Notifications => &mut self.notification_status,
        }
    }
}

struct Sequencer {
    issued: AtomicU64,
    applied: AtomicU64,
}

impl Sequencer {
    fn new() -> Self {
        Self {
            issued: AtomicU64::new(0),
            applied: AtomicU64::new(0),
        }
    }
}

/// Session-scoped sync context, created at sign-in and torn down at logout.
///
/// Owns the local sync state, the owner-alive flag, the per-collection
/// in-flight gates and sequence counters, and the event channel. Passed by
/// `Arc` to the sync client, the pollers and the dispatcher.
pub struct SessionContext {
    actor: Actor,
    settings: SyncSettings,
    clock: Arc<dyn Clock>,
    state: RwLock<LocalSyncState>,
    alive: watch::Sender<bool>,
    events: broadcast::Sender<SyncEvent>,
    consultation_gate: Mutex<()>,
    notification_gate: Mutex<()>,
    consultation_seq: Sequencer,
    notification_seq: Sequencer,
}

impl SessionContext {
    pub fn new(actor: Actor, settings: SyncSettings, clock: Arc<dyn Clock>) -> Self {
        let (alive, _) = watch::channel(true);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let state = LocalSyncState::new(settings.alerted_set_capacity);

        info!(actor_id = %actor.id, role = %actor.role, "Sync session started");

        Self {
            actor,
            settings,
            clock,
            state: RwLock::new(state),
            alive,
            events,
            consultation_gate: Mutex::new(()),
            notification_gate: Mutex::new(()),
            consultation_seq: Sequencer::new(),
            notification_seq: Sequencer::new(),
        }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn state(&self) -> &RwLock<LocalSyncState> {
        &self.state
    }

    pub fn is_alive(&self) -> bool {
        *self.alive.borrow()
    }

    pub fn alive_watch(&self) -> watch::Receiver<bool> {
        self.alive.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn publish(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn gate(&self, collection: Collection) -> &Mutex<()> {
        match collection {
            Collection::Consultations => &self.consultation_gate,
            Collection::Notifications => &self.notification_gate,
        }
    }

    /// Claim the collection's in-flight slot, or `None` if a request is already out.
    pub fn try_claim(&self, collection: Collection) -> Option<MutexGuard<'_, ()>> {
        self.gate(collection).try_lock().ok()
    }

    /// Wait for the collection's in-flight slot.
    pub async fn claim(&self, collection: Collection) -> MutexGuard<'_, ()> {
        self.gate(collection).lock().await
    }

    fn sequencer(&self, collection: Collection) -> &Sequencer {
        match collection {
            Collection::Consultations => &self.consultation_seq,
            Collection::Notifications => &self.notification_seq,
        }
    }

    /// Number the next request for `collection`.
    pub fn next_sequence(&self, collection: Collection) -> u64 {
        self.sequencer(collection).issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Record `sequence` as applied. Returns `false` if a newer result already was.
    pub fn accept_sequence(&self, collection: Collection, sequence: u64) -> bool {
        let applied = &self.sequencer(collection).applied;
        let mut current = applied.load(Ordering::SeqCst);
        loop {
            if sequence <= current {
                return false;
            }
            match applied.compare_exchange(current, sequence, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// End the session: stop pollers, drop in-flight results, discard local state.
    pub async fn teardown(&self) {
        if !self.alive.send_replace(false) {
            debug!("Sync session already torn down");
            return;
        }

        {
            let mut state = self.state.write().await;
            *state = LocalSyncState::new(self.settings.alerted_set_capacity);
        }

        info!(actor_id = %self.actor.id, "Sync session torn down");
        self.publish(SyncEvent::SessionClosed);
    }

    pub async fn snapshot(&self) -> SyncSnapshot {
        let state = self.state.read().await;

        SyncSnapshot {
            actor: self.actor.clone(),
            alive: self.is_alive(),
            consultations: state.consultation_status.clone(),
            notifications: state.notification_status.clone(),
            consultation_count: state.consultations.len(),
            pending_local_changes: state.consultations.pending_count(),
            unread_count: state.unread_count,
            alerted_ids: state.ledger.len(),
            watermark: state.ledger.watermark().cloned(),
            last_delivery: state.last_delivery.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_models::auth::ActorRole;
    use shared_models::clock::SystemClock;

    fn session() -> SessionContext {
        SessionContext::new(
            Actor::new("p-1", ActorRole::Patient),
            SyncSettings::default(),
            Arc::new(SystemClock),
        )
    }

    #[test]
    fn test_stale_sequences_are_rejected() {
        let session = session();
        let first = session.next_sequence(Collection::Consultations);
        let second = session.next_sequence(Collection::Consultations);

        assert!(session.accept_sequence(Collection::Consultations, second));
        assert!(!session.accept_sequence(Collection::Consultations, first));
        // Collections are numbered independently.
        let other = session.next_sequence(Collection::Notifications);
        assert!(session.accept_sequence(Collection::Notifications, other));
    }

    #[tokio::test]
    async fn test_gate_admits_one_request_per_collection() {
        let session = session();

        let held = session.try_claim(Collection::Notifications);
        assert!(held.is_some());
        assert!(session.try_claim(Collection::Notifications).is_none());
        assert!(session.try_claim(Collection::Consultations).is_some());

        drop(held);
        assert!(session.try_claim(Collection::Notifications).is_some());
    }

    #[tokio::test]
    async fn test_teardown_flips_flag_and_clears_state() {
        let session = session();
        let mut events = session.subscribe();
        let alive = session.alive_watch();
        session.state().write().await.unread_count = 3;

        session.teardown().await;
        session.teardown().await;

        assert!(!session.is_alive());
        assert!(!*alive.borrow());
        assert_eq!(session.state().read().await.unread_count, 0);
        assert_eq!(events.recv().await.unwrap(), SyncEvent::SessionClosed);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_session_time_comes_from_injected_clock() {
        use chrono::TimeZone;
        use shared_models::clock::FixedClock;

        let instant = Utc.with_ymd_and_hms(2024, 3, 9, 23, 59, 59).unwrap();
        let session = SessionContext::new(
            Actor::new("d-1", ActorRole::Doctor),
            SyncSettings::default(),
            Arc::new(FixedClock(instant)),
        );

        assert_eq!(session.now(), instant);

        let snapshot = session.snapshot().await;
        assert!(snapshot.alive);
        assert_eq!(snapshot.actor.id, "d-1");
        assert_eq!(snapshot.consultation_count, 0);
        assert!(snapshot.watermark.is_none());
    }
}
