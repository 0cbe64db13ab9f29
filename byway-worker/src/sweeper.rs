/// Daily notification purge
///
/// Deletes notifications that were marked read and are older than the
/// retention period. Runs once a day at 00:00 UTC until the shutdown token
/// is cancelled.
///
/// # Example
///
/// ```no_run
/// use byway_worker::sweeper::NotificationSweeper;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> anyhow::Result<()> {
/// let sweeper = NotificationSweeper::new(pool);
/// let token = sweeper.shutdown_token();
///
/// tokio::spawn(async move {
///     tokio::signal::ctrl_c().await.ok();
///     token.cancel();
/// });
///
/// sweeper.run().await?;
/// # Ok(())
/// # }
/// ```

use byway_shared::models::notification::{retention_cutoff, Notification};
use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use sqlx::PgPool;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Next 00:00 UTC strictly after `now`
pub fn next_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = now.date_naive() + ChronoDuration::days(1);
    tomorrow.and_time(NaiveTime::MIN).and_utc()
}

/// Time to wait from `now` until `next`, zero when already past
pub fn wait_until(now: DateTime<Utc>, next: DateTime<Utc>) -> Duration {
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

pub struct NotificationSweeper {
    db: PgPool,
    shutdown_token: CancellationToken,
}

impl NotificationSweeper {
    pub fn new(db: PgPool) -> Self {
        Self {
            db,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Token that stops [`run`](Self::run) when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Deletes read notifications past retention as of `now`
    ///
    /// # Errors
    ///
    /// Returns the database error if the delete fails
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let cutoff = retention_cutoff(now);
        let purged = Notification::purge_read_older_than(&self.db, cutoff).await?;
        tracing::info!(purged, cutoff = %cutoff, "Purged read notifications");
        Ok(purged)
    }

    /// Sleeps until each midnight and sweeps; a failed sweep is logged and
    /// retried the next day
    pub async fn run(&self) -> anyhow::Result<()> {
        tracing::info!("Notification sweeper starting");

        loop {
            let now = Utc::now();
            let next = next_midnight(now);
            tracing::debug!(next_run = %next, "Next notification purge scheduled");

            tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    tracing::info!("Notification sweeper shut down");
                    return Ok(());
                }
                _ = tokio::time::sleep(wait_until(now, next)) => {}
            }

            if let Err(e) = self.sweep_once(Utc::now()).await {
                tracing::error!(error = %e, "Notification purge failed");
            }
        }
    }
}
