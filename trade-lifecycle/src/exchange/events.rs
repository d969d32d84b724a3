//! # Order Event Bus
//!
//! Carries the exchange's asynchronous order notifications to whoever listens.
//! A gateway publishes every order update here; subscribers (the order event
//! recorder, mostly) each get their own queue and drain it at their own pace.

use crate::models::ExchangeOrderRecord;
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;

/// A subscription to order events. Yields every event published after the
/// subscription was taken, in publish order, and `None` once the bus is gone.
pub type OrderEventStream = mpsc::UnboundedReceiver<ExchangeOrderRecord>;

/// Fan-out of order events, one unbounded tokio mpsc queue per subscriber.
///
/// Publishing never blocks and never drops: a slow subscriber only grows its
/// own queue. Subscribers whose receiver was dropped are pruned on publish.
#[derive(Default)]
pub struct OrderEventBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ExchangeOrderRecord>>>,
}

impl OrderEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes to all current subscribers. Returns how many received it.
    pub fn publish(&self, event: ExchangeOrderRecord) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // No subscribers is fine: the exchange does not wait for us either.
        subscribers.retain(|sender| sender.send(event.clone()).is_ok());
        subscribers.len()
    }

    pub fn subscribe(&self) -> OrderEventStream {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
        receiver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderType;

    fn event(order_id: i64) -> ExchangeOrderRecord {
        ExchangeOrderRecord {
            order_id,
            group_id: 0,
            cid: order_id,
            symbol: "BTCUSD".into(),
            created: 1,
            updated: 1,
            amount: 1.0,
            amount_at_creation: 1.0,
            order_type: OrderType::ExchangeMarket,
            state: "ACTIVE".into(),
            price: 0.0,
            price_avg: 0.0,
            price_trailing: 0.0,
            price_aux_limit: 0.0,
            notify: false,
            hidden: false,
        }
    }

    #[test]
    fn test_every_subscriber_gets_every_event() {
        let bus = OrderEventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        for id in 0..5_000 {
            assert_eq!(bus.publish(event(id)), 2);
        }

        for stream in [&mut first, &mut second] {
            for id in 0..5_000 {
                assert_eq!(stream.try_recv().unwrap().order_id, id);
            }
            assert!(stream.try_recv().is_err());
        }
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let bus = OrderEventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());

        assert_eq!(bus.publish(event(1)), 1);
        drop(kept);
        assert_eq!(bus.publish(event(2)), 0);
    }
}
