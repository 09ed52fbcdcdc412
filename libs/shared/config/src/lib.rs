use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub clinic_api_url: String,
    pub session_token: String,
    pub actor_id: String,
    pub actor_role: String,
    /// Shown to patients in the accept notification.
    pub actor_display_name: Option<String>,
    pub sync: SyncSettings,
    pub consultation_fetch_limit: u32,
    pub history_recent_days: i64,
    pub display_utc_offset_minutes: i32,
    pub notify_patient_on_accept: bool,
    pub dashboard_port: u16,
}

/// Timing knobs shared by the pollers, the dedup engine and the dispatcher.
#[derive(Debug, Clone, Serialize)]
pub struct SyncSettings {
    pub consultation_interval: Duration,
    pub notification_interval: Duration,
    pub request_timeout: Duration,
    pub alert_recency_window: Duration,
    pub alerted_set_capacity: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            consultation_interval: Duration::from_secs(30),
            notification_interval: Duration::from_secs(4),
            request_timeout: Duration::from_secs(10),
            alert_recency_window: Duration::from_secs(180),
            alerted_set_capacity: 500,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = SyncSettings::default();

        let config = Self {
            clinic_api_url: env::var("CLINIC_API_URL")
                .unwrap_or_else(|_| {
                    warn!("CLINIC_API_URL not set, using default");
                    "http://localhost:8000".to_string()
                }),
            session_token: env::var("CLINIC_SESSION_TOKEN")
                .unwrap_or_else(|_| {
                    warn!("CLINIC_SESSION_TOKEN not set, using empty value");
                    String::new()
                }),
            actor_id: env::var("CLINIC_ACTOR_ID")
                .unwrap_or_else(|_| {
                    warn!("CLINIC_ACTOR_ID not set, using empty value");
                    String::new()
                }),
            actor_role: env::var("CLINIC_ACTOR_ROLE")
                .unwrap_or_else(|_| {
                    warn!("CLINIC_ACTOR_ROLE not set, using default");
                    "patient".to_string()
                }),
            actor_display_name: env::var("CLINIC_ACTOR_NAME")
                .ok()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            sync: SyncSettings {
                consultation_interval: Duration::from_secs(
                    env_or("CONSULTATION_POLL_SECONDS", defaults.consultation_interval.as_secs()),
                ),
                notification_interval: Duration::from_secs(
                    env_or("NOTIFICATION_POLL_SECONDS", defaults.notification_interval.as_secs()),
                ),
                request_timeout: Duration::from_secs(
                    env_or("REQUEST_TIMEOUT_SECONDS", defaults.request_timeout.as_secs()),
                ),
                alert_recency_window: Duration::from_secs(
                    env_or("ALERT_RECENCY_SECONDS", defaults.alert_recency_window.as_secs()),
                ),
                alerted_set_capacity: env_or("ALERTED_SET_CAPACITY", defaults.alerted_set_capacity),
            },
            consultation_fetch_limit: env_or("CONSULTATION_FETCH_LIMIT", 50),
            history_recent_days: env_or("HISTORY_RECENT_DAYS", 30),
            display_utc_offset_minutes: env_or("DISPLAY_UTC_OFFSET_MINUTES", 0),
            notify_patient_on_accept: env_or("NOTIFY_PATIENT_ON_ACCEPT", true),
            dashboard_port: env_or("DASHBOARD_PORT", 3000),
        };

        if !config.is_configured() {
            warn!("Dashboard session not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.clinic_api_url.is_empty()
            && !self.session_token.is_empty()
            && !self.actor_id.is_empty()
    }
}

/// Parse an environment variable, falling back to `default` when unset or unparsable.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value {:?}, using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}
