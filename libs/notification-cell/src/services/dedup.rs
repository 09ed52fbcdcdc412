// libs/notification-cell/src/services/dedup.rs
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use consultation_cell::ConsultationRecord;
use shared_config::SyncSettings;

use crate::models::{DeliveryReport, NotificationRecord};
use crate::services::delivery::DeliveryChannel;
use crate::services::ledger::AlertLedger;

/// One notification tick as seen by the engine.
#[derive(Debug, Clone, Copy)]
pub struct NotificationTick<'a> {
    pub fetched: &'a [NotificationRecord],
    pub server_unread: u32,
    pub previous_unread: u32,
    /// `None` until the consultation collection has synced at least once.
    pub consultations: Option<&'a [ConsultationRecord]>,
    pub now: DateTime<Utc>,
}

enum Verdict {
    Deliver,
    Pass,
    Defer,
}

/// Turns "notifications as of this tick" into "notifications worth alerting on now".
pub struct DeliveryEngine {
    recency_window: Duration,
    channel: Arc<dyn DeliveryChannel>,
}

impl DeliveryEngine {
    pub fn new(settings: &SyncSettings, channel: Arc<dyn DeliveryChannel>) -> Self {
        let recency_window = Duration::from_std(settings.alert_recency_window).unwrap_or_else(|_| {
            warn!("Alert recency window out of range, falling back to one day");
            Duration::days(1)
        });

        Self { recency_window, channel }
    }

    pub fn recency_window(&self) -> Duration {
        self.recency_window
    }

    /// Set the badge outside a sync tick, e.g. after mark-as-read.
    pub fn sync_badge(&self, unread: u32) {
        if let Err(e) = self.channel.set_badge(unread) {
            debug!("Badge update skipped: {}", e);
        }
    }

    fn is_stale(&self, notification: &NotificationRecord, now: DateTime<Utc>) -> bool {
        now - notification.created_at > self.recency_window
    }

    fn judge(&self, notification: &NotificationRecord, tick: &NotificationTick<'_>) -> Verdict {
        if notification.read {
            return Verdict::Pass;
        }

        if self.is_stale(notification, tick.now) {
            return Verdict::Pass;
        }

        let (Some(consultation_id), Some(consultations)) = (&notification.consultation_id, tick.consultations) else {
            return Verdict::Deliver;
        };

        match consultations.iter().find(|c| &c.id == consultation_id) {
            Some(consultation) if consultation.is_terminal() => Verdict::Pass,
            Some(_) => Verdict::Deliver,
            None => Verdict::Defer,
        }
    }

    /// Run one dedup pass and fire the resulting cues.
    ///
    /// Every fetched id inside the recency window is recorded in the ledger
    /// except deferred ones, which are re-judged next tick until they leave it. At most one
    /// tone plays per call. The badge always ends at the server unread count,
    /// whatever the channel does.
    pub fn process(&self, ledger: &mut AlertLedger, tick: NotificationTick<'_>) -> DeliveryReport {
        let mut ordered: Vec<&NotificationRecord> = tick.fetched.iter().collect();
        ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        let mut report = DeliveryReport {
            badge: tick.server_unread,
            badge_delta: i64::from(tick.server_unread) - i64::from(tick.previous_unread),
            ..DeliveryReport::default()
        };
        let mut qualifying = Vec::new();

        // Only ids still inside the window can ever qualify, so only those are
        // remembered. Anything the ledger drops here is judged stale from now on.
        let recent: HashSet<&str> = tick
            .fetched
            .iter()
            .filter(|n| !self.is_stale(n, tick.now))
            .map(|n| n.id.as_str())
            .collect();
        ledger.retain_only(&recent);

        for notification in ordered {
            ledger.advance_watermark(notification);

            if !recent.contains(notification.id.as_str()) || ledger.contains(&notification.id) {
                continue;
            }

            match self.judge(notification, &tick) {
                Verdict::Deliver => {
                    ledger.record(&notification.id);
                    qualifying.push(notification);
                }
                Verdict::Pass => {
                    ledger.record(&notification.id);
                }
                Verdict::Defer => {
                    debug!(
                        notification_id = %notification.id,
                        "Consultation not yet known locally, deferring alert"
                    );
                    report.deferred.push(notification.id.clone());
                }
            }
        }

        if !qualifying.is_empty() {
            match self.channel.play_alert_tone() {
                Ok(()) => report.tone_played = true,
                Err(e) => {
                    debug!("Alert tone skipped: {}", e);
                    report.channel_failures += 1;
                }
            }

            for notification in &qualifying {
                info!(notification_id = %notification.id, "Delivering notification: {}", notification.title);
                if let Err(e) = self.channel.platform_alert(notification) {
                    debug!(notification_id = %notification.id, "Platform alert skipped: {}", e);
                    report.channel_failures += 1;
                }
                report.delivered.push(notification.id.clone());
            }
        }

        if let Err(e) = self.channel.set_badge(tick.server_unread) {
            debug!("Badge update skipped: {}", e);
            report.channel_failures += 1;
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeliveryError;
    use crate::models::NotificationSource;
    use crate::services::delivery::MockDeliveryChannel;
    use chrono::TimeZone;
    use consultation_cell::{ConsultationStatus, ConsultationType, Priority};
    use mockall::predicate::eq;
    use mockall::Sequence;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn notification(id: &str, seconds_ago: i64) -> NotificationRecord {
        NotificationRecord {
            id: id.to_string(),
            consultation_id: None,
            title: format!("title {}", id),
            message: "Your consultation has been accepted".to_string(),
            kind: "appointment".to_string(),
            source: NotificationSource::Doctor {
                id: "d-1".to_string(),
                name: "Dr. Grace Hopper".to_string(),
            },
            read: false,
            created_at: now() - Duration::seconds(seconds_ago),
            scheduled_at: None,
        }
    }

    fn consultation(id: &str, status: ConsultationStatus) -> ConsultationRecord {
        ConsultationRecord {
            id: id.to_string(),
            patient_id: "p-1".to_string(),
            doctor_id: Some("d-1".to_string()),
            doctor_name: None,
            patient_name: None,
            consultation_type: ConsultationType::Routine,
            priority: Priority::Medium,
            status,
            scheduled_at: now(),
            chief_complaint: "Checkup".to_string(),
            symptoms: vec![],
            created_at: now(),
            updated_at: now(),
        }
    }

    fn tick<'a>(fetched: &'a [NotificationRecord], server_unread: u32, previous_unread: u32) -> NotificationTick<'a> {
        NotificationTick {
            fetched,
            server_unread,
            previous_unread,
            consultations: None,
            now: now(),
        }
    }

    fn engine(channel: MockDeliveryChannel) -> DeliveryEngine {
        DeliveryEngine::new(&SyncSettings::default(), Arc::new(channel))
    }

    #[test]
    fn test_single_tone_and_ascending_alerts() {
        let mut channel = MockDeliveryChannel::new();
        let mut seq = Sequence::new();
        channel.expect_play_alert_tone().times(1).in_sequence(&mut seq).returning(|| Ok(()));
        channel
            .expect_platform_alert()
            .withf(|n| n.id == "older")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        channel
            .expect_platform_alert()
            .withf(|n| n.id == "newer")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        channel.expect_set_badge().with(eq(2)).times(1).returning(|_| Ok(()));

        let fetched = vec![notification("newer", 10), notification("older", 60)];
        let mut ledger = AlertLedger::new(10);

        let report = engine(channel).process(&mut ledger, tick(&fetched, 2, 0));

        assert_eq!(report.delivered, vec!["older".to_string(), "newer".to_string()]);
        assert!(report.tone_played);
        assert_eq!(report.badge_delta, 2);
    }

    #[test]
    fn test_channel_failure_never_blocks_badge() {
        let mut channel = MockDeliveryChannel::new();
        channel
            .expect_play_alert_tone()
            .times(1)
            .returning(|| Err(DeliveryError::Unavailable("audio output".to_string())));
        channel
            .expect_platform_alert()
            .times(1)
            .returning(|_| Err(DeliveryError::PermissionDenied("platform alerts".to_string())));
        channel.expect_set_badge().with(eq(1)).times(1).returning(|_| Ok(()));

        let fetched = vec![notification("n-1", 5)];
        let mut ledger = AlertLedger::new(10);

        let report = engine(channel).process(&mut ledger, tick(&fetched, 1, 0));

        assert_eq!(report.delivered, vec!["n-1".to_string()]);
        assert!(!report.tone_played);
        assert_eq!(report.channel_failures, 2);
        assert_eq!(report.badge, 1);
        assert!(ledger.contains("n-1"));
    }

    #[test]
    fn test_stale_and_read_notifications_are_silent() {
        let mut channel = MockDeliveryChannel::new();
        channel.expect_play_alert_tone().times(0);
        channel.expect_platform_alert().times(0);
        channel.expect_set_badge().returning(|_| Ok(()));

        let mut read = notification("read", 5);
        read.read = true;
        let fetched = vec![read, notification("stale", 3600)];
        let mut ledger = AlertLedger::new(10);

        let report = engine(channel).process(&mut ledger, tick(&fetched, 0, 0));

        assert!(report.delivered.is_empty());
        assert!(ledger.contains("read"));
        // Stale ids can never qualify again, so they are not kept.
        assert!(!ledger.contains("stale"));
    }

    #[test]
    fn test_terminal_consultation_suppresses_alert() {
        let mut channel = MockDeliveryChannel::new();
        channel.expect_play_alert_tone().times(1).returning(|| Ok(()));
        channel
            .expect_platform_alert()
            .withf(|n| n.id == "live")
            .times(1)
            .returning(|_| Ok(()));
        channel.expect_set_badge().returning(|_| Ok(()));

        let mut on_cancelled = notification("dead", 5);
        on_cancelled.consultation_id = Some("c-cancelled".to_string());
        let mut on_scheduled = notification("live", 5);
        on_scheduled.consultation_id = Some("c-scheduled".to_string());
        let fetched = vec![on_cancelled, on_scheduled];
        let consultations = vec![
            consultation("c-cancelled", ConsultationStatus::Cancelled),
            consultation("c-scheduled", ConsultationStatus::Scheduled),
        ];
        let mut ledger = AlertLedger::new(10);

        let report = engine(channel).process(
            &mut ledger,
            NotificationTick {
                consultations: Some(consultations.as_slice()),
                ..tick(&fetched, 2, 0)
            },
        );

        assert_eq!(report.delivered, vec!["live".to_string()]);
        assert!(ledger.contains("dead"));
    }

    #[test]
    fn test_unknown_consultation_is_deferred_until_it_syncs() {
        let mut channel = MockDeliveryChannel::new();
        channel.expect_play_alert_tone().times(1).returning(|| Ok(()));
        channel.expect_platform_alert().times(1).returning(|_| Ok(()));
        channel.expect_set_badge().returning(|_| Ok(()));
        let engine = engine(channel);

        let mut early = notification("early", 5);
        early.consultation_id = Some("c-new".to_string());
        let fetched = vec![early];
        let mut ledger = AlertLedger::new(10);

        let before: Vec<ConsultationRecord> = vec![];
        let first = engine.process(
            &mut ledger,
            NotificationTick {
                consultations: Some(before.as_slice()),
                ..tick(&fetched, 1, 0)
            },
        );
        assert_eq!(first.deferred, vec!["early".to_string()]);
        assert!(!ledger.contains("early"));

        let after = vec![consultation("c-new", ConsultationStatus::Scheduled)];
        let second = engine.process(
            &mut ledger,
            NotificationTick {
                consultations: Some(after.as_slice()),
                ..tick(&fetched, 1, 1)
            },
        );
        assert_eq!(second.delivered, vec!["early".to_string()]);
    }
}
