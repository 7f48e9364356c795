use std::{
    collections::{BTreeMap, HashSet},
    fmt::Debug,
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use log::*;
use rust_decimal::Decimal;
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    db_types::{Chain, Order, Transfer},
    helpers::spawn_periodic,
    hpe_api::order_flow_api::OrderFlowApi,
    reconciliation::{
        matcher::{Assignment, MatchPolicy, Matcher},
        poll_report::{GroupOutcome, GroupStatus, PollReport},
    },
    sources::{SourceRegistry, TransferSource},
    traits::{ConfirmOutcome, PaymentGatewayDatabase, PaymentGatewayError},
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_LOOKBACK_HOURS: i64 = 24;
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    /// How far back to ask sources for transfers.
    pub lookback: chrono::Duration,
    /// The bound on each `get_transfers` call.
    pub lookup_timeout: Duration,
    pub matcher: Matcher,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            lookback: chrono::Duration::hours(DEFAULT_LOOKBACK_HOURS),
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            matcher: Matcher::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_lookback(mut self, lookback: chrono::Duration) -> Self {
        self.lookback = lookback;
        self
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Sets the relative tolerance on amounts, as a fraction (0.01 is 1%).
    pub fn with_tolerance(mut self, tolerance: Decimal) -> Self {
        self.matcher.tolerance = tolerance;
        self
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.matcher.policy = policy;
        self
    }

    pub fn with_currency_check(mut self, check: bool) -> Self {
        self.matcher.check_currency = check;
        self
    }
}

struct RunningLoop {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Polls the registered transfer sources and confirms the orders that their transfers pay for.
///
/// Each cycle:
/// 1. fetches the payable orders (pending, unexpired, with a payment method selected);
/// 2. groups them by `(chain, address)`;
/// 3. asks the chain's source once per group for the transfers of the lookback window, bounded by the lookup
///    timeout;
/// 4. discards transfers that are unconfirmed, addressed elsewhere, too old, or already recorded as having settled an
///    order;
/// 5. assigns the remaining transfers to orders with the configured [`Matcher`], and confirms each assignment through
///    the ledger.
///
/// The sources of all groups are queried concurrently. A group whose source is missing, failing or slow is skipped for
/// this cycle and never holds up the others.
pub struct ReconciliationScheduler<B> {
    reconciler: Arc<Reconciler<B>>,
    running: Mutex<Option<RunningLoop>>,
}

impl<B> Debug for ReconciliationScheduler<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationScheduler ({:?})", self.reconciler.config)
    }
}

impl<B> Drop for ReconciliationScheduler<B> {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.token.cancel();
        }
    }
}

impl<B> ReconciliationScheduler<B> {
    /// Creates a stopped scheduler. It shares the ledger's source registry.
    pub fn new(ledger: Arc<OrderFlowApi<B>>, config: SchedulerConfig) -> Self {
        let sources = ledger.sources().clone();
        let reconciler = Reconciler { ledger, sources, config };
        Self { reconciler: Arc::new(reconciler), running: Mutex::new(None) }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.reconciler.config
    }

    pub fn sources(&self) -> &SourceRegistry {
        &self.reconciler.sources
    }

    /// Registers `source` as the one source for `chain`, replacing any previous one. Takes effect from the next cycle,
    /// whether or not the scheduler is running.
    pub async fn register_source(&self, chain: Chain, source: Arc<dyn TransferSource>) {
        self.reconciler.sources.register(chain, source).await;
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }
}

impl<B> ReconciliationScheduler<B>
where B: PaymentGatewayDatabase
{
    /// Starts the background poll loop. Does nothing if it is already running.
    pub async fn start(&self) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            debug!("🔍️ The reconciliation scheduler is already running");
            return;
        }
        let token = CancellationToken::new();
        let reconciler = Arc::clone(&self.reconciler);
        let interval = reconciler.config.poll_interval;
        let handle = spawn_periodic("Reconciliation", interval, token.clone(), move || {
            let reconciler = Arc::clone(&reconciler);
            async move {
                if let Err(e) = reconciler.poll_at(Utc::now()).await {
                    error!("🔍️ Reconciliation cycle failed: {e}");
                }
            }
        });
        *running = Some(RunningLoop { token, handle });
        info!("🔍️ Reconciliation scheduler started");
    }

    /// Stops the background loop, waiting for the cycle in progress, if any, to finish. Does nothing if the scheduler
    /// is not running.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            debug!("🔍️ The reconciliation scheduler is not running");
            return;
        };
        running.token.cancel();
        if let Err(e) = running.handle.await {
            error!("🔍️ The reconciliation loop did not shut down cleanly: {e}");
        }
        info!("🔍️ Reconciliation scheduler stopped");
    }

    /// Runs a single reconciliation cycle now.
    pub async fn poll_once(&self) -> Result<PollReport, PaymentGatewayError> {
        self.reconciler.poll_at(Utc::now()).await
    }

    /// Runs a single reconciliation cycle as if the time were `now`.
    pub async fn poll_at(&self, now: DateTime<Utc>) -> Result<PollReport, PaymentGatewayError> {
        self.reconciler.poll_at(now).await
    }
}

struct Reconciler<B> {
    ledger: Arc<OrderFlowApi<B>>,
    sources: SourceRegistry,
    config: SchedulerConfig,
}

impl<B> Reconciler<B>
where B: PaymentGatewayDatabase
{
    async fn poll_at(&self, now: DateTime<Utc>) -> Result<PollReport, PaymentGatewayError> {
        let orders = self.ledger.db().fetch_payable_orders(now).await?;
        let mut report = PollReport { orders: orders.len(), ..Default::default() };
        if orders.is_empty() {
            trace!("🔍️ No payable orders. Nothing to reconcile.");
            return Ok(report);
        }
        let groups = group_orders(orders);
        let lookups =
            groups.into_iter().map(|((chain, address), orders)| self.match_group(chain, address, orders, now));
        // Sources are queried concurrently. Confirmations are applied one group at a time.
        for (chain, mut outcome, assignments) in join_all(lookups).await {
            self.confirm(&chain, assignments, now, &mut outcome).await;
            report.record(outcome);
        }
        if report.confirmed > 0 || !report.is_clean() {
            info!("🔍️ Reconciliation cycle complete. {report}");
        } else {
            debug!("🔍️ Reconciliation cycle complete. {report}");
        }
        Ok(report)
    }

    /// Fetches the group's transfers from its source and assigns them to the group's orders.
    async fn match_group(
        &self,
        chain: Chain,
        address: String,
        orders: Vec<Order>,
        now: DateTime<Utc>,
    ) -> (Chain, GroupOutcome, Vec<Assignment>) {
        let mut outcome = GroupOutcome::default();
        let Some(source) = self.sources.get(&chain).await else {
            debug!("🔍️ No source is registered for {chain}. Skipping {} orders paying to {address}", orders.len());
            outcome.status = GroupStatus::NoSource;
            return (chain, outcome, Vec::new());
        };
        let since = now - self.config.lookback;
        let lookup = tokio::time::timeout(self.config.lookup_timeout, source.get_transfers(&address, since)).await;
        let transfers = match lookup {
            Ok(Ok(transfers)) => transfers,
            Ok(Err(e)) => {
                warn!("🔍️ {} could not list transfers to {address} on {chain}: {e}", source.name());
                outcome.status = GroupStatus::Failed;
                return (chain, outcome, Vec::new());
            },
            Err(_) => {
                warn!(
                    "🔍️ {} did not list transfers to {address} on {chain} within {:?}",
                    source.name(),
                    self.config.lookup_timeout
                );
                outcome.status = GroupStatus::Failed;
                return (chain, outcome, Vec::new());
            },
        };
        let transfers = match self.unclaimed(&chain, eligible_transfers(transfers, &address, since)).await {
            Ok(transfers) => transfers,
            Err(e) => {
                error!("🔍️ Could not check which transfers to {address} on {chain} are already claimed: {e}");
                outcome.status = GroupStatus::Failed;
                return (chain, outcome, Vec::new());
            },
        };
        outcome.transfers = transfers.len();
        trace!("🔍️ {} candidate transfers for {} orders paying to {address} on {chain}", transfers.len(), orders.len());
        let assignments = self.config.matcher.assign(&orders, &transfers);
        outcome.matched = assignments.len();
        (chain, outcome, assignments)
    }

    async fn confirm(
        &self,
        chain: &Chain,
        assignments: Vec<Assignment>,
        now: DateTime<Utc>,
        outcome: &mut GroupOutcome,
    ) {
        for assignment in assignments {
            let order_id = &assignment.order_id;
            let hash = &assignment.transfer.hash;
            match self.ledger.confirm_payment_at(order_id, &assignment.transfer, now).await {
                Ok(ConfirmOutcome::Confirmed(_)) => {
                    info!("🔍️ Transfer {hash} on {chain} settles order [{order_id}]");
                    outcome.confirmed += 1;
                },
                Ok(ConfirmOutcome::AlreadyPaid(_)) => {
                    debug!("🔍️ Order [{order_id}] was already paid when transfer {hash} matched it");
                    outcome.already_paid += 1;
                },
                Err(e) => {
                    warn!("🔍️ Transfer {hash} matched order [{order_id}], but it could not be confirmed: {e}");
                    outcome.rejected += 1;
                },
            }
        }
    }

    /// Drops the transfers that have already settled an order in an earlier cycle.
    async fn unclaimed(&self, chain: &Chain, transfers: Vec<Transfer>) -> Result<Vec<Transfer>, PaymentGatewayError> {
        if transfers.is_empty() {
            return Ok(transfers);
        }
        let hashes = transfers.iter().map(|t| t.hash.clone()).collect::<Vec<String>>();
        let claimed =
            self.ledger.db().fetch_claimed_transfers(chain, &hashes).await?.into_iter().collect::<HashSet<String>>();
        if !claimed.is_empty() {
            trace!("🔍️ {} transfers on {chain} have already settled orders", claimed.len());
        }
        Ok(transfers.into_iter().filter(|t| !claimed.contains(&t.hash)).collect())
    }
}

/// Groups orders by `(chain, address)`. Within each group, orders keep their original order.
fn group_orders(orders: Vec<Order>) -> BTreeMap<(Chain, String), Vec<Order>> {
    let mut groups = BTreeMap::<(Chain, String), Vec<Order>>::new();
    for order in orders {
        let Some(settlement) = order.settlement.as_ref() else {
            continue;
        };
        let key = (settlement.chain.clone(), settlement.address.clone());
        groups.entry(key).or_default().push(order);
    }
    groups
}

/// Sources are expected to filter, but the results are not trusted: only confirmed transfers to `address` observed at
/// or after `since` are kept.
fn eligible_transfers(transfers: Vec<Transfer>, address: &str, since: DateTime<Utc>) -> Vec<Transfer> {
    let total = transfers.len();
    let eligible = transfers
        .into_iter()
        .filter(|t| t.is_confirmed() && t.is_destined_for(address) && t.timestamp >= since)
        .collect::<Vec<Transfer>>();
    if eligible.len() < total {
        trace!("🔍️ {} of {total} transfers to {address} are not eligible for matching", total - eligible.len());
    }
    eligible
}
