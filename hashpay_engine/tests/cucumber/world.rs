use std::{collections::HashMap, fmt::Debug};

use cucumber::World;
use hashpay_engine::{
    db_types::{Order, OrderId},
    PaymentGatewayDatabase,
};

use crate::support::{fakes::FakeSource, prepare_env::TestSystem};

#[derive(Default, World)]
pub struct ReconciliationWorld {
    pub system: Option<TestSystem>,
    /// The chain the scenario's transfers are observed on.
    pub source: FakeSource,
    /// Orders by the name the feature file gives them.
    pub orders: HashMap<String, OrderId>,
}

impl Debug for ReconciliationWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let db = self.system.as_ref().map(|s| s.db.url().to_string()).unwrap_or_else(|| "none".into());
        write!(f, "ReconciliationWorld (db: {db}, orders: {:?})", self.orders)
    }
}

impl ReconciliationWorld {
    pub fn system(&self) -> &TestSystem {
        self.system.as_ref().expect("The system has not been initialised. Start with 'Given a fresh install'")
    }

    pub fn order_id(&self, name: &str) -> OrderId {
        self.orders.get(name).cloned().unwrap_or_else(|| panic!("No order named {name} in this scenario"))
    }

    pub async fn order(&self, name: &str) -> Order {
        self.system().ledger.fetch_order(&self.order_id(name)).await.expect("Error fetching order")
    }
}
