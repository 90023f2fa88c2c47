// Periodic removal of expired jobs

use std::time::Duration;

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::store::JobStore;

/// Handle to the background sweep task
pub struct Sweeper {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Start sweeping every `interval`. The first sweep happens one interval
    /// after startup.
    pub fn spawn(store: JobStore, interval: Duration, retention: Duration) -> Self {
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let retention = time::Duration::try_from(retention).unwrap_or(time::Duration::MAX);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = store.sweep_expired(OffsetDateTime::now_utc(), retention);
                        if removed > 0 {
                            info!(removed, remaining = store.len(), "swept expired jobs");
                        } else {
                            debug!("sweep found nothing to remove");
                        }
                    }
                }
            }
            debug!("sweeper stopped");
        });

        Self { shutdown, handle }
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "sweeper task ended abnormally");
        }
    }
}
