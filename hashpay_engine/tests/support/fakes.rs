use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hashpay_engine::{
    db_types::{SourceKind, Transfer, TransferStatus},
    DeliveryError,
    DeliveryRequest,
    NotificationDispatcher,
    RateSource,
    RateSourceError,
    SourceError,
    TransferSource,
};
use rust_decimal::Decimal;

pub fn transfer(hash: &str, to: &str, amount: Decimal) -> Transfer {
    Transfer {
        hash: hash.to_string(),
        from: "TSenderAddress".to_string(),
        to: to.to_string(),
        amount,
        currency: "USDT".to_string(),
        block_number: Some(1_000),
        timestamp: Utc::now(),
        status: TransferStatus::Confirmed,
    }
}

#[derive(Default)]
struct FakeSourceState {
    transfers: Vec<Transfer>,
    failing: bool,
    delay: Option<Duration>,
}

/// An in-memory chain. Transfers are added by the test; lookups are counted.
#[derive(Clone, Default)]
pub struct FakeSource {
    state: Arc<Mutex<FakeSourceState>>,
    calls: Arc<AtomicUsize>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, transfer: Transfer) {
        self.state.lock().unwrap().transfers.push(transfer);
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.lock().unwrap().failing = failing;
    }

    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransferSource for FakeSource {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Chain
    }

    async fn get_transfers(&self, address: &str, since: DateTime<Utc>) -> Result<Vec<Transfer>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (failing, delay, transfers) = {
            let state = self.state.lock().unwrap();
            (state.failing, state.delay, state.transfers.clone())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if failing {
            return Err(SourceError::SourceUnavailable("HTTP 502".into()));
        }
        Ok(transfers.into_iter().filter(|t| t.to == address && t.timestamp >= since).collect())
    }

    async fn get_transfer(&self, hash: &str) -> Result<Transfer, SourceError> {
        let state = self.state.lock().unwrap();
        state.transfers.iter().find(|t| t.hash == hash).cloned().ok_or_else(|| SourceError::NotFound(hash.to_string()))
    }

    fn validate_address(&self, address: &str) -> bool {
        address.starts_with('T') && address.len() > 1
    }
}

pub struct FixedRate {
    pub name: &'static str,
    pub rate: Option<Decimal>,
}

impl FixedRate {
    pub fn new(name: &'static str, rate: Decimal) -> Self {
        Self { name, rate: Some(rate) }
    }

    pub fn failing(name: &'static str) -> Self {
        Self { name, rate: None }
    }
}

#[async_trait]
impl RateSource for FixedRate {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_rate(&self, _from: &str, _to: &str) -> Result<Decimal, RateSourceError> {
        self.rate.ok_or_else(|| RateSourceError::Unavailable("maintenance".into()))
    }
}

/// Records every delivery request. Targets listed in `failing_targets` are rejected.
#[derive(Clone, Default)]
pub struct RecordingDispatcher {
    pub delivered: Arc<Mutex<Vec<DeliveryRequest>>>,
    pub failing_targets: Arc<Mutex<Vec<String>>>,
}

impl RecordingDispatcher {
    pub fn fail_target(&self, target: &str) {
        self.failing_targets.lock().unwrap().push(target.to_string());
    }

    pub fn heal(&self) {
        self.failing_targets.lock().unwrap().clear();
    }

    pub fn delivered(&self) -> Vec<DeliveryRequest> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn deliver(&self, request: &DeliveryRequest) -> Result<(), DeliveryError> {
        if self.failing_targets.lock().unwrap().contains(&request.target) {
            return Err(DeliveryError::Rejected { status: 500, body: "Internal Server Error".into() });
        }
        self.delivered.lock().unwrap().push(request.clone());
        Ok(())
    }
}
