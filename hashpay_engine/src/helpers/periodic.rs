use std::{future::Future, time::Duration};

use log::*;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Spawns a task that runs `job` once per `period`, starting immediately, until `token` is cancelled.
///
/// A run that is in progress when the token is cancelled is allowed to finish, so awaiting the returned handle after
/// cancelling waits for the current run to complete. Runs never overlap: if one overruns the period, the next tick is
/// delayed rather than bunched up.
pub fn spawn_periodic<F, Fut>(name: &'static str, period: Duration, token: CancellationToken, mut job: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let period = period.max(MIN_PERIOD);
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("🕰️ {name} worker started. It runs every {period:?}");
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = timer.tick() => job().await,
            }
        }
        info!("🕰️ {name} worker stopped");
    })
}
