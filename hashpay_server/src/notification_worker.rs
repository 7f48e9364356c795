use std::{sync::Arc, time::Duration};

use hashpay_engine::{helpers::spawn_periodic, NotificationApi, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Starts the notification worker. Each run delivers one batch of due notifications.
pub fn start_notification_worker(
    notifications: Arc<NotificationApi<SqliteDatabase>>,
    period: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    spawn_periodic("Notification delivery", period, token, move || {
        let notifications = Arc::clone(&notifications);
        async move {
            match notifications.process_due().await {
                Ok(report) if report.attempted == 0 => trace!("🕰️ No notifications due"),
                Ok(report) => info!(
                    "🕰️ Notification run: {} attempted, {} sent, {} to retry, {} abandoned",
                    report.attempted, report.sent, report.retried, report.dead
                ),
                Err(e) => error!("🕰️ Error running notification job: {e}"),
            }
        }
    })
}
