use std::{sync::Arc, time::Duration};

use hashpay_engine::{helpers::spawn_periodic, OrderFlowApi, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Starts the expiry worker. It moves pending orders past their deadline to `Expired` once per `period`, until `token`
/// is cancelled.
pub fn start_expiry_worker(
    ledger: Arc<OrderFlowApi<SqliteDatabase>>,
    period: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    spawn_periodic("Order expiry", period, token, move || {
        let ledger = Arc::clone(&ledger);
        async move {
            trace!("🕰️ Running order expiry job");
            match ledger.expire_orders().await {
                Ok(0) => trace!("🕰️ No orders expired"),
                Ok(count) => info!("🕰️ {count} orders expired"),
                Err(e) => error!("🕰️ Error running order expiry job: {e}"),
            }
        }
    })
}
