use hashpay_engine::events::{EventHandlers, EventHooks, OrderAnnulledEvent, OrderPaidEvent};
use log::*;

const EVENT_BUFFER_SIZE: usize = 25;

/// Event handlers that keep an audit trail of order outcomes in the log.
pub fn create_audit_event_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_order_paid(|ev| {
        Box::pin(async move {
            let OrderPaidEvent { order } = ev;
            let tx = order.tx_hash.as_deref().unwrap_or("none");
            info!("📬️ Order {} paid: {} {} (tx {tx})", order.order_id, order.amount, order.currency);
        })
    });
    hooks.on_order_annulled(|ev| {
        Box::pin(async move {
            let OrderAnnulledEvent { order, status } = ev;
            info!("📬️ Order {} annulled. It is now {status}", order.order_id);
        })
    });
    EventHandlers::new(EVENT_BUFFER_SIZE, hooks)
}
