use std::{str::FromStr, sync::Arc};

use cucumber::given;
use hashpay_engine::db_types::Chain;
use rust_decimal::Decimal;

use crate::{
    cucumber::ReconciliationWorld,
    support::{fakes::FixedRate, prepare_env::TestSystem},
};

#[given("a fresh install")]
async fn fresh_install(world: &mut ReconciliationWorld) {
    world.system = Some(TestSystem::new().await);
}

#[given(expr = "transfers on {word} are observed by the test source")]
async fn register_test_source(world: &mut ReconciliationWorld, chain: String) {
    let source = Arc::new(world.source.clone());
    world.system().scheduler.register_source(Chain::new(&chain), source).await;
}

#[given(expr = "a rate source '{word}' quoting {word}")]
async fn register_rate_source(world: &mut ReconciliationWorld, name: String, rate: String) {
    let rate = Decimal::from_str(&rate).expect("Not a valid rate");
    // Rate sources are identified by a static name
    let name: &'static str = Box::leak(name.into_boxed_str());
    world.system().rates.register_source(Arc::new(FixedRate::new(name, rate))).await;
}

#[given(expr = "a rate source '{word}' that is down")]
async fn register_failing_rate_source(world: &mut ReconciliationWorld, name: String) {
    let name: &'static str = Box::leak(name.into_boxed_str());
    world.system().rates.register_source(Arc::new(FixedRate::failing(name))).await;
}
