use std::str::FromStr;

use chrono::Duration;
use cucumber::{then, when};
use hashpay_engine::db_types::{Chain, OrderStatusType};
use rust_decimal::Decimal;

use crate::{cucumber::ReconciliationWorld, support::fakes::transfer};

fn decimal(value: &str) -> Decimal {
    Decimal::from_str(value).expect("Not a valid decimal")
}

#[when(expr = "I create order {word} for {word} {word}")]
async fn create_order(world: &mut ReconciliationWorld, name: String, amount: String, currency: String) {
    let order = world.system().ledger.create_order(decimal(&amount), &currency, None).await.expect("Error creating order");
    world.orders.insert(name, order.order_id);
}

#[when(expr = "the customer pays order {word} in {word} on {word} to '{word}'")]
async fn select_method(world: &mut ReconciliationWorld, name: String, currency: String, chain: String, address: String) {
    let order_id = world.order_id(&name);
    world
        .system()
        .ledger
        .select_method(&order_id, &Chain::new(&chain), &currency, &address)
        .await
        .expect("Error selecting payment method");
}

#[when(expr = "a transfer [{word}] of {word} {word} to '{word}' is observed")]
async fn observe_transfer(world: &mut ReconciliationWorld, hash: String, amount: String, currency: String, to: String) {
    let mut t = transfer(&hash, &to, decimal(&amount));
    t.currency = currency;
    world.source.push(t);
}

#[when("the scheduler polls")]
async fn poll(world: &mut ReconciliationWorld) {
    world.system().scheduler.poll_once().await.expect("Error polling");
}

#[when(expr = "the payment window of order {word} closes")]
async fn expire(world: &mut ReconciliationWorld, name: String) {
    let order = world.order(&name).await;
    let after_deadline = order.expires_at + Duration::seconds(1);
    world.system().ledger.expire_orders_at(after_deadline).await.expect("Error expiring orders");
}

#[then(expr = "order {word} expects {word} {word}")]
async fn check_settlement(world: &mut ReconciliationWorld, name: String, amount: String, currency: String) {
    let order = world.order(&name).await;
    let settlement = order.settlement.expect("No payment method has been selected");
    assert_eq!(settlement.amount, decimal(&amount));
    assert_eq!(settlement.currency, currency);
}

#[then(expr = "order {word} is {word}")]
async fn check_status(world: &mut ReconciliationWorld, name: String, status: String) {
    let order = world.order(&name).await;
    let expected = OrderStatusType::from_str(&status).expect("Not a valid order status");
    assert_eq!(order.status, expected);
}

#[then(expr = "order {word} was paid by [{word}]")]
async fn check_paid_by(world: &mut ReconciliationWorld, name: String, hash: String) {
    let order = world.order(&name).await;
    assert_eq!(order.status, OrderStatusType::Paid);
    assert_eq!(order.tx_hash, Some(hash));
    assert!(order.paid_at.is_some());
}

#[then(expr = "the {word} to {word} rate is {word}")]
async fn check_rate(world: &mut ReconciliationWorld, from: String, to: String, rate: String) {
    let value = world.system().rates.get_rate(&from, &to).await;
    assert_eq!(value, decimal(&rate));
}
