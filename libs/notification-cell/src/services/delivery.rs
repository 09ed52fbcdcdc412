// libs/notification-cell/src/services/delivery.rs
use tracing::{debug, info};

use crate::error::DeliveryError;
use crate::models::NotificationRecord;

/// The local side effects of an alert: a tone, a platform-level alert and the
/// in-app badge. Implementations may fail freely; callers treat every failure
/// as a silent no-op.
#[cfg_attr(test, mockall::automock)]
pub trait DeliveryChannel: Send + Sync {
    fn play_alert_tone(&self) -> Result<(), DeliveryError>;

    fn platform_alert(&self, notification: &NotificationRecord) -> Result<(), DeliveryError>;

    fn set_badge(&self, unread: u32) -> Result<(), DeliveryError>;
}

/// Emits every cue as a structured log line. Used by the headless dashboard.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogChannel;

impl DeliveryChannel for LogChannel {
    fn play_alert_tone(&self) -> Result<(), DeliveryError> {
        info!("Alert tone");
        Ok(())
    }

    fn platform_alert(&self, notification: &NotificationRecord) -> Result<(), DeliveryError> {
        info!(
            notification_id = %notification.id,
            kind = %notification.kind,
            "{}: {}",
            notification.title, notification.message
        );
        Ok(())
    }

    fn set_badge(&self, unread: u32) -> Result<(), DeliveryError> {
        debug!(unread, "Badge updated");
        Ok(())
    }
}

/// A channel with no audio output and no alert permission. Only the badge works.
#[derive(Debug, Default, Clone, Copy)]
pub struct MutedChannel;

impl DeliveryChannel for MutedChannel {
    fn play_alert_tone(&self) -> Result<(), DeliveryError> {
        Err(DeliveryError::Unavailable("audio output".to_string()))
    }

    fn platform_alert(&self, _notification: &NotificationRecord) -> Result<(), DeliveryError> {
        Err(DeliveryError::PermissionDenied("platform alerts".to_string()))
    }

    fn set_badge(&self, _unread: u32) -> Result<(), DeliveryError> {
        Ok(())
    }
}
