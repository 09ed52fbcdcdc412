// libs/sync-cell/src/services/dispatcher.rs
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use consultation_cell::{
    BookConsultationRequest, ConsultationError, ConsultationLifecycleService, ConsultationRecord,
    ConsultationStatus,
};
use notification_cell::SendNotificationRequest;
use shared_models::auth::ActorRole;
use shared_models::error::ApiError;

use crate::services::client::SyncClient;
use crate::services::collaborators::{ConsultationSource, NotificationFeed};
use crate::services::normalize;
use crate::services::session::SessionContext;

fn session_ended() -> ApiError {
    ApiError::Unauthorized("session has ended".to_string())
}

/// Validated, optimistic mutations against the backend.
pub struct ActionDispatcher {
    client: Arc<SyncClient>,
    consultations: Arc<dyn ConsultationSource>,
    notifications: Arc<dyn NotificationFeed>,
    lifecycle: ConsultationLifecycleService,
    notify_patient_on_accept: bool,
}

impl ActionDispatcher {
    pub fn new(
        client: Arc<SyncClient>,
        consultations: Arc<dyn ConsultationSource>,
        notifications: Arc<dyn NotificationFeed>,
        notify_patient_on_accept: bool,
    ) -> Self {
        Self {
            client,
            consultations,
            notifications,
            lifecycle: ConsultationLifecycleService::new(),
            notify_patient_on_accept,
        }
    }

    fn session(&self) -> &Arc<SessionContext> {
        self.client.session()
    }

    async fn current_record(&self, consultation_id: &str) -> Result<ConsultationRecord, ConsultationError> {
        if !self.session().is_alive() {
            return Err(session_ended().into());
        }

        let state = self.session().state().read().await;
        state
            .consultations
            .get(consultation_id)
            .cloned()
            .ok_or_else(|| ConsultationError::NotFound(consultation_id.to_string()))
    }

    async fn converge(&self) {
        if let Err(e) = self.client.refresh_consultations().await {
            debug!("Follow-up refresh failed, next tick will retry: {}", e);
        }
    }

    // ==========================================================================
    // CONSULTATION TRANSITIONS
    // ==========================================================================

    /// Doctor takes a pending consultation: `pending -> scheduled`, assigning themselves.
    pub async fn accept(&self, consultation_id: &str) -> Result<ConsultationRecord, ConsultationError> {
        self.transition(consultation_id, ConsultationStatus::Scheduled).await
    }

    pub async fn start(&self, consultation_id: &str) -> Result<ConsultationRecord, ConsultationError> {
        self.transition(consultation_id, ConsultationStatus::InProgress).await
    }

    pub async fn complete(&self, consultation_id: &str) -> Result<ConsultationRecord, ConsultationError> {
        self.transition(consultation_id, ConsultationStatus::Completed).await
    }

    pub async fn cancel(&self, consultation_id: &str) -> Result<ConsultationRecord, ConsultationError> {
        self.transition(consultation_id, ConsultationStatus::Cancelled).await
    }

    pub async fn set_status(
        &self,
        consultation_id: &str,
        requested: ConsultationStatus,
    ) -> Result<ConsultationRecord, ConsultationError> {
        self.transition(consultation_id, requested).await
    }

    #[instrument(skip(self))]
    async fn transition(
        &self,
        consultation_id: &str,
        requested: ConsultationStatus,
    ) -> Result<ConsultationRecord, ConsultationError> {
        let actor = self.session().actor().clone();
        let record = self.current_record(consultation_id).await?;

        let accepting = record.status == ConsultationStatus::Pending
            && requested == ConsultationStatus::Scheduled
            && actor.is_doctor();
        let assigning_doctor = accepting.then_some(actor.id.as_str());

        self.lifecycle
            .validate_transition(&record, requested, actor.role, assigning_doctor)?;

        let optimistic = {
            let mut state = self.session().state().write().await;
            let now = self.session().now();
            state
                .consultations
                .mark_optimistic(consultation_id, requested, assigning_doctor, now)
                .ok_or_else(|| ConsultationError::NotFound(consultation_id.to_string()))?
        };

        let call = if accepting {
            self.client
                .bounded(self.consultations.accept(consultation_id, &actor.id))
                .await
        } else {
            self.client
                .bounded(self.consultations.set_status(consultation_id, requested))
                .await
        };

        match call {
            Ok(body) => {
                info!(
                    consultation_id = %consultation_id,
                    "Consultation moved from {} to {}",
                    record.status, requested
                );

                if accepting && self.notify_patient_on_accept {
                    self.notify_patient(&optimistic).await;
                }

                self.converge().await;

                let state = self.session().state().read().await;
                let confirmed = state
                    .consultations
                    .get(consultation_id)
                    .cloned()
                    .or_else(|| normalize::consultation(body).ok())
                    .unwrap_or(optimistic);
                Ok(confirmed)
            }
            Err(e) => {
                warn!(
                    consultation_id = %consultation_id,
                    "Transition to {} failed, reverting: {}",
                    requested, e
                );
                {
                    let mut state = self.session().state().write().await;
                    state.consultations.revert(consultation_id);
                }

                if e.is_unauthorized() {
                    self.client.handle_unauthorized(&e).await;
                } else if e.is_conflict() {
                    self.converge().await;
                }
                Err(e.into())
            }
        }
    }

    /// Best-effort heads-up so the patient's poller sees the acceptance quickly.
    async fn notify_patient(&self, record: &ConsultationRecord) {
        let doctor = self
            .session()
            .actor()
            .display_name
            .clone()
            .unwrap_or_else(|| "Your doctor".to_string());

        let request = SendNotificationRequest {
            patient_id: record.patient_id.clone(),
            title: "Consultation Accepted".to_string(),
            message: format!(
                "{} accepted your {} consultation scheduled for {}",
                doctor,
                record.consultation_type.label().to_lowercase(),
                record.scheduled_at.format("%Y-%m-%d %H:%M UTC")
            ),
            kind: "appointment".to_string(),
            consultation_id: Some(record.id.clone()),
        };

        if let Err(e) = self.client.bounded(self.notifications.send(&request)).await {
            warn!(consultation_id = %record.id, "Patient notification not sent: {}", e);
        }
    }

    // ==========================================================================
    // BOOKING
    // ==========================================================================

    /// Create a consultation. Patients book `pending` for themselves; doctors
    /// book `scheduled` with themselves as doctor.
    #[instrument(skip(self, request))]
    pub async fn book(&self, mut request: BookConsultationRequest) -> Result<ConsultationRecord, ConsultationError> {
        if !self.session().is_alive() {
            return Err(session_ended().into());
        }
        request.validate()?;

        let actor = self.session().actor().clone();
        match actor.role {
            ActorRole::Patient => {
                request.patient_id = Some(actor.id.clone());
                request.status = Some(ConsultationStatus::Pending);
            }
            ActorRole::Doctor => {
                if request.patient_id.as_deref().map_or(true, str::is_empty) {
                    return Err(ConsultationError::Validation(
                        "A patient is required when a doctor books a consultation".to_string(),
                    ));
                }
                request.doctor_id = Some(actor.id.clone());
                request.status = Some(ConsultationStatus::Scheduled);
            }
            ActorRole::Admin => {
                return Err(ConsultationError::Validation(
                    "Only patients and doctors can book consultations".to_string(),
                ));
            }
        }

        let now = self.session().now();
        let provisional = ConsultationRecord {
            id: String::new(),
            patient_id: request.patient_id.clone().unwrap_or_default(),
            doctor_id: request.doctor_id.clone(),
            doctor_name: None,
            patient_name: None,
            consultation_type: request.consultation_type,
            priority: request.priority,
            status: request.status.unwrap_or(ConsultationStatus::Pending),
            scheduled_at: request.scheduled_at,
            chief_complaint: request.chief_complaint.clone(),
            symptoms: request.symptoms.clone(),
            created_at: now,
            updated_at: now,
        };

        let (temp_id, provisional) = {
            let mut state = self.session().state().write().await;
            let temp_id = state.consultations.insert_provisional(provisional, now);
            let record = state.consultations.get(&temp_id).cloned();
            (temp_id, record)
        };

        match self.client.bounded(self.consultations.create(&request)).await {
            Ok(body) => {
                let created = normalize::consultation(body);
                {
                    let mut state = self.session().state().write().await;
                    match &created {
                        Ok(record) => {
                            state.consultations.attach_server_id(&temp_id, &record.id);
                        }
                        Err(e) => {
                            warn!("Create response unreadable, relying on refresh: {}", e);
                            state.consultations.discard_provisional(&temp_id);
                        }
                    }
                }

                info!(temp_id = %temp_id, "Consultation booked");
                self.converge().await;

                created
                    .ok()
                    .or(provisional)
                    .ok_or_else(|| ConsultationError::NotFound(temp_id))
            }
            Err(e) => {
                warn!(temp_id = %temp_id, "Booking failed, discarding provisional record: {}", e);
                {
                    let mut state = self.session().state().write().await;
                    state.consultations.discard_provisional(&temp_id);
                }
                if e.is_unauthorized() {
                    self.client.handle_unauthorized(&e).await;
                } else if e.is_conflict() {
                    self.converge().await;
                }
                Err(e.into())
            }
        }
    }

    // ==========================================================================
    // NOTIFICATIONS
    // ==========================================================================

    /// Idempotent: marking an already-read notification changes nothing locally.
    #[instrument(skip(self))]
    pub async fn mark_notification_read(&self, notification_id: &str) -> Result<(), ApiError> {
        self.notification_call(self.notifications.mark_read(notification_id)).await?;

        {
            let mut state = self.session().state().write().await;
            let newly_read = match state.notifications.iter_mut().find(|n| n.id == notification_id) {
                Some(notification) if !notification.read => {
                    notification.read = true;
                    true
                }
                _ => false,
            };
            if newly_read {
                state.unread_count = state.unread_count.saturating_sub(1);
            }
        }

        self.client.sync_badge().await;
        Ok(())
    }

    pub async fn mark_all_read(&self) -> Result<(), ApiError> {
        self.notification_call(self.notifications.mark_all_read()).await?;

        {
            let mut state = self.session().state().write().await;
            for notification in state.notifications.iter_mut() {
                notification.read = true;
            }
            state.unread_count = 0;
        }

        self.client.sync_badge().await;
        Ok(())
    }

    pub async fn clear_all(&self) -> Result<(), ApiError> {
        self.notification_call(self.notifications.clear_all()).await?;

        {
            let mut state = self.session().state().write().await;
            state.notifications.clear();
            state.unread_count = 0;
        }

        self.client.sync_badge().await;
        Ok(())
    }

    async fn notification_call<F>(&self, call: F) -> Result<(), ApiError>
    where
        F: std::future::Future<Output = Result<serde_json::Value, ApiError>>,
    {
        if !self.session().is_alive() {
            return Err(session_ended());
        }

        match self.client.bounded(call).await {
            Ok(_) => Ok(()),
            Err(e) => {
                if e.is_unauthorized() {
                    self.client.handle_unauthorized(&e).await;
                }
                Err(e)
            }
        }
    }
}
