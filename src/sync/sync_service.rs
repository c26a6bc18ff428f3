use std::time::Duration;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info};

use super::sync_engine::NotificationSync;

/// Handle to the background poll job. Keep it alive for the lifetime of the
/// consuming view and call [`shutdown`](SyncService::shutdown) on
/// unmount/logout.
pub struct SyncService {
    scheduler: JobScheduler,
}

impl SyncService {
    pub async fn shutdown(mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.scheduler.shutdown().await?;
        Ok(())
    }
}

/// Start the periodic delta fetch for `sync`.
///
/// Every `interval` (90 seconds in production, see
/// [`Config`](crate::config::Config)): skip the tick while the panel is open
/// (it was populated on open; the open-triggered full fetch takes precedence
/// over a colliding tick), otherwise run a delta fetch. In-flight fetches
/// make the tick a no-op through the engine's single-flight flag.
pub async fn start_sync_service(
    sync: NotificationSync,
    interval: Duration,
) -> Result<SyncService, Box<dyn std::error::Error + Send + Sync>> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_repeated_async(interval, move |_uuid, _l| {
        let sync = sync.clone();

        Box::pin(async move {
            if sync.is_open() {
                debug!("notification panel open, skipping poll tick");
                return;
            }
            sync.fetch_since().await;
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    info!("notification sync service started");
    Ok(SyncService { scheduler })
}
