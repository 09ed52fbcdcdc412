// libs/sync-cell/src/services/poller.rs
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::models::{Collection, RefreshOutcome};
use crate::services::client::SyncClient;
use crate::services::session::SessionContext;

const MIN_PERIOD: Duration = Duration::from_millis(10);

/// Handles to the two repeating refresh tasks of one session.
pub struct PollerHandle {
    session: Arc<SessionContext>,
    tasks: Vec<JoinHandle<()>>,
}

impl PollerHandle {
    /// Tear the session down and wait for both loops to exit. A refresh already
    /// in flight finishes first; its result is dropped.
    pub async fn stop(self) {
        self.session.teardown().await;
        for result in join_all(self.tasks).await {
            if let Err(e) = result {
                error!("Poller task ended abnormally: {}", e);
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(JoinHandle::is_finished)
    }
}

pub struct SyncPoller;

impl SyncPoller {
    /// Spawn the consultation and notification loops. Each fires immediately,
    /// then on its own interval.
    pub fn start(client: Arc<SyncClient>) -> PollerHandle {
        let session = Arc::clone(client.session());
        let settings = session.settings().clone();

        info!(
            consultation_interval = ?settings.consultation_interval,
            notification_interval = ?settings.notification_interval,
            "Starting sync pollers"
        );

        let tasks = vec![
            tokio::spawn(poll_loop(
                Arc::clone(&client),
                Collection::Consultations,
                settings.consultation_interval,
            )),
            tokio::spawn(poll_loop(client, Collection::Notifications, settings.notification_interval)),
        ];

        PollerHandle { session, tasks }
    }
}

async fn poll_loop(client: Arc<SyncClient>, collection: Collection, period: Duration) {
    let session = Arc::clone(client.session());
    let mut alive = session.alive_watch();
    // `interval` panics on a zero period.
    let mut ticker = interval(period.max(MIN_PERIOD));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = alive.changed() => {
                if changed.is_err() || !*alive.borrow() {
                    break;
                }
                continue;
            }
        }

        if !session.is_alive() {
            break;
        }

        let result = match collection {
            Collection::Consultations => client.try_refresh_consultations().await,
            Collection::Notifications => client.try_refresh_notifications().await,
        };

        match result {
            Ok(RefreshOutcome::Applied) => {}
            Ok(outcome) => debug!(collection = %collection, "Tick ended as {:?}", outcome),
            Err(e) if e.is_unauthorized() => break,
            // Already logged and surfaced as degraded; the next tick retries.
            Err(_) => {}
        }
    }

    debug!(collection = %collection, "Poll loop ended");
}
