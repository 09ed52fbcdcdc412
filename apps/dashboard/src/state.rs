use std::str::FromStr;
use std::sync::Arc;

use consultation_cell::ProjectionClock;
use notification_cell::DeliveryChannel;
use shared_config::AppConfig;
use shared_database::clinic_api::ClinicApiClient;
use shared_models::auth::{Actor, ActorRole};
use shared_models::clock::Clock;
use shared_models::error::AppError;
use sync_cell::{ActionDispatcher, AuditTrailService, SessionContext, SyncClient};

/// Everything the HTTP surface needs for one signed-in session.
pub struct DashboardState {
    pub config: AppConfig,
    pub session: Arc<SessionContext>,
    pub client: Arc<SyncClient>,
    pub dispatcher: ActionDispatcher,
    pub audit: AuditTrailService,
}

impl DashboardState {
    pub fn build(config: AppConfig, clock: Arc<dyn Clock>, channel: Arc<dyn DeliveryChannel>) -> Result<Self, AppError> {
        let role = ActorRole::from_str(&config.actor_role).map_err(AppError::BadRequest)?;
        let mut actor = Actor::new(config.actor_id.clone(), role);
        if let Some(name) = &config.actor_display_name {
            actor = actor.with_display_name(name.clone());
        }

        let api = Arc::new(ClinicApiClient::new(&config));
        let session = Arc::new(SessionContext::new(actor, config.sync.clone(), clock));

        let client = Arc::new(SyncClient::new(
            Arc::clone(&session),
            api.clone(),
            api.clone(),
            channel,
            config.consultation_fetch_limit,
        ));
        let dispatcher = ActionDispatcher::new(
            Arc::clone(&client),
            api.clone(),
            api.clone(),
            config.notify_patient_on_accept,
        );
        let audit = AuditTrailService::new(api, config.sync.request_timeout);

        Ok(Self {
            config,
            session,
            client,
            dispatcher,
            audit,
        })
    }

    pub fn projection_clock(&self) -> ProjectionClock {
        ProjectionClock::with_offset_minutes(self.session.now(), self.config.display_utc_offset_minutes)
    }

    /// Once the session is torn down every route answers 401.
    pub fn ensure_alive(&self) -> Result<(), AppError> {
        if self.session.is_alive() {
            Ok(())
        } else {
            Err(AppError::Auth("Session has ended, sign in again".to_string()))
        }
    }
}
