// libs/sync-cell/src/services/client.rs
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use notification_cell::{DeliveryChannel, DeliveryEngine, NotificationTick};
use shared_models::error::ApiError;

use crate::models::{Collection, RefreshOutcome, SyncEvent};
use crate::services::collaborators::{ConsultationSource, NotificationFeed};
use crate::services::normalize;
use crate::services::session::SessionContext;

/// Keeps the session's local mirror in step with the two server-owned collections.
pub struct SyncClient {
    session: Arc<SessionContext>,
    consultations: Arc<dyn ConsultationSource>,
    notifications: Arc<dyn NotificationFeed>,
    engine: DeliveryEngine,
    fetch_limit: u32,
}

impl SyncClient {
    pub fn new(
        session: Arc<SessionContext>,
        consultations: Arc<dyn ConsultationSource>,
        notifications: Arc<dyn NotificationFeed>,
        channel: Arc<dyn DeliveryChannel>,
        fetch_limit: u32,
    ) -> Self {
        let engine = DeliveryEngine::new(session.settings(), channel);

        Self {
            session,
            consultations,
            notifications,
            engine,
            fetch_limit,
        }
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    /// Run `call` under the configured request timeout. Timing out is a
    /// transient failure for this attempt only.
    pub(crate) async fn bounded<F>(&self, call: F) -> Result<Value, ApiError>
    where
        F: Future<Output = Result<Value, ApiError>>,
    {
        let limit = self.session.settings().request_timeout;
        match timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Transient(format!("request timed out after {:?}", limit))),
        }
    }

    /// Fatal path for a 401: stop everything and ask for a new sign-in.
    pub async fn handle_unauthorized(&self, err: &ApiError) {
        error!("Session rejected by backend, stopping sync: {}", err);
        self.session.publish(SyncEvent::Reauthenticate);
        self.session.teardown().await;
    }

    async fn degrade(&self, collection: Collection, err: &ApiError) {
        warn!(collection = %collection, "Sync degraded, keeping previous data: {}", err);
        {
            let mut state = self.session.state().write().await;
            state.status_mut(collection).mark_degraded(err.to_string());
        }
        self.session.publish(SyncEvent::SyncDegraded {
            collection,
            reason: err.user_message(),
        });
    }

    async fn discard(&self, collection: Collection, why: &str) -> RefreshOutcome {
        debug!(collection = %collection, "Dropping refresh result: {}", why);
        if self.session.is_alive() {
            let mut state = self.session.state().write().await;
            state.status_mut(collection).discarded_results += 1;
        }
        RefreshOutcome::Discarded
    }

    async fn note_skipped(&self, collection: Collection) -> RefreshOutcome {
        debug!(collection = %collection, "Previous request still in flight, skipping tick");
        let mut state = self.session.state().write().await;
        state.status_mut(collection).skipped_ticks += 1;
        RefreshOutcome::Skipped
    }

    // ==========================================================================
    // CONSULTATIONS
    // ==========================================================================

    /// Out-of-cycle refresh. Waits for any in-flight consultation request.
    #[instrument(skip(self))]
    pub async fn refresh_consultations(&self) -> Result<RefreshOutcome, ApiError> {
        let _slot = self.session.claim(Collection::Consultations).await;
        self.fetch_consultations().await
    }

    /// Timer tick. Skipped if a consultation request is already in flight.
    pub async fn try_refresh_consultations(&self) -> Result<RefreshOutcome, ApiError> {
        match self.session.try_claim(Collection::Consultations) {
            Some(_slot) => self.fetch_consultations().await,
            None => Ok(self.note_skipped(Collection::Consultations).await),
        }
    }

    async fn fetch_consultations(&self) -> Result<RefreshOutcome, ApiError> {
        if !self.session.is_alive() {
            return Ok(RefreshOutcome::Discarded);
        }

        let sequence = self.session.next_sequence(Collection::Consultations);
        let result = self
            .bounded(self.consultations.my_consultations(self.fetch_limit))
            .await
            .and_then(normalize::consultations);

        if !self.session.is_alive() {
            return Ok(self.discard(Collection::Consultations, "session torn down").await);
        }

        match result {
            Ok(records) => {
                if !self.session.accept_sequence(Collection::Consultations, sequence) {
                    return Ok(self.discard(Collection::Consultations, "newer result already applied").await);
                }

                let synced_at = self.session.now();
                let count = records.len();
                {
                    let mut state = self.session.state().write().await;
                    state.consultations.replace_authoritative(records, synced_at);
                    state.consultations_synced = true;
                    state.consultation_status.mark_fresh(synced_at);
                }

                debug!(count, "Consultations refreshed");
                self.session.publish(SyncEvent::ConsultationsUpdated { count, synced_at });
                Ok(RefreshOutcome::Applied)
            }
            Err(e) if e.is_unauthorized() => {
                self.handle_unauthorized(&e).await;
                Err(e)
            }
            Err(e) => {
                self.degrade(Collection::Consultations, &e).await;
                Err(e)
            }
        }
    }

    // ==========================================================================
    // NOTIFICATIONS
    // ==========================================================================

    #[instrument(skip(self))]
    pub async fn refresh_notifications(&self) -> Result<RefreshOutcome, ApiError> {
        let _slot = self.session.claim(Collection::Notifications).await;
        self.fetch_notifications().await
    }

    pub async fn try_refresh_notifications(&self) -> Result<RefreshOutcome, ApiError> {
        match self.session.try_claim(Collection::Notifications) {
            Some(_slot) => self.fetch_notifications().await,
            None => Ok(self.note_skipped(Collection::Notifications).await),
        }
    }

    async fn fetch_notifications(&self) -> Result<RefreshOutcome, ApiError> {
        if !self.session.is_alive() {
            return Ok(RefreshOutcome::Discarded);
        }

        let sequence = self.session.next_sequence(Collection::Notifications);
        let result = self
            .bounded(self.notifications.my_notifications(false))
            .await
            .and_then(normalize::notifications);

        if !self.session.is_alive() {
            return Ok(self.discard(Collection::Notifications, "session torn down").await);
        }

        let mut batch = match result {
            Ok(batch) => batch,
            Err(e) if e.is_unauthorized() => {
                self.handle_unauthorized(&e).await;
                return Err(e);
            }
            Err(e) => {
                self.degrade(Collection::Notifications, &e).await;
                return Err(e);
            }
        };

        if !self.session.accept_sequence(Collection::Notifications, sequence) {
            return Ok(self.discard(Collection::Notifications, "newer result already applied").await);
        }

        let now = self.session.now();
        let report = {
            let mut guard = self.session.state().write().await;
            let state = &mut *guard;

            // Read is sticky: a fetch that raced a mark-read cannot un-read an item.
            for notification in batch.notifications.iter_mut() {
                let read_locally = state
                    .notifications
                    .iter()
                    .any(|known| known.id == notification.id && known.read);
                notification.read |= read_locally;
            }

            let consultations = state.consultations.records();
            let report = self.engine.process(
                &mut state.ledger,
                NotificationTick {
                    fetched: &batch.notifications,
                    server_unread: batch.unread_count,
                    previous_unread: state.unread_count,
                    consultations: state.consultations_synced.then_some(consultations.as_slice()),
                    now,
                },
            );

            state.notifications = batch.notifications;
            state.unread_count = batch.unread_count;
            state.notification_status.mark_fresh(now);
            state.last_delivery = Some(report.clone());
            report
        };

        if !report.delivered.is_empty() {
            info!(delivered = report.delivered.len(), unread = report.badge, "New notifications delivered");
        }
        self.session.publish(SyncEvent::NotificationsUpdated {
            unread_count: report.badge,
            delivered: report.delivered.len(),
        });
        Ok(RefreshOutcome::Applied)
    }

    /// Push the current unread count to the badge after a local mutation.
    pub(crate) async fn sync_badge(&self) {
        let unread = self.session.state().read().await.unread_count;
        self.engine.sync_badge(unread);
    }
}
