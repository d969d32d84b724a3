use crate::error::StoreError;
use crate::exchange::OrderEventStream;
use crate::models::ExchangeOrderRecord;
use crate::persistence::{with_transaction, UnitOfWork};
use log::{debug, error, info};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Durably records every order notification the exchange sends, whether or
/// not a trade references the order.
///
/// Independent of the lifecycle manager: one transaction per event, so a
/// failed event never takes others down with it. Safe to call from several
/// deliveries at once.
pub struct OrderEventRecorder {
    store: Arc<dyn UnitOfWork>,
    recorded: AtomicU64,
    failed: AtomicU64,
}

impl OrderEventRecorder {
    pub fn new(store: Arc<dyn UnitOfWork>) -> Self {
        Self {
            store,
            recorded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Upserts the record for `event.order_id`. A re-delivered event simply
    /// overwrites the stored record with the latest fields.
    pub fn record(&self, event: &ExchangeOrderRecord) -> Result<(), StoreError> {
        match with_transaction(&*self.store, |tx| tx.upsert_order(event)) {
            Ok(()) => {
                self.recorded.fetch_add(1, Ordering::Relaxed);
                debug!("Recorded {}", event);
                Ok(())
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                error!("Failed to record {}: {}", event, e);
                Err(e)
            }
        }
    }

    pub fn recorded(&self) -> u64 {
        self.recorded.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Drains `stream` on a tokio task until the bus closes.
    ///
    /// Each event is written on the blocking pool and awaited before the next
    /// one, so a single subscription is recorded in delivery order. A failed
    /// write is counted and logged, and the pump moves on to the next event.
    pub fn spawn(self: Arc<Self>, mut stream: OrderEventStream) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Order event recorder started");
            while let Some(event) = stream.recv().await {
                let recorder = self.clone();
                // Failures are already counted and logged by `record`.
                let write = tokio::task::spawn_blocking(move || recorder.record(&event).is_ok());
                if let Err(e) = write.await {
                    error!("Order event write task failed: {}", e);
                }
            }
            info!(
                "Order event recorder stopped: {} recorded, {} failed",
                self.recorded(),
                self.failed()
            );
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::OrderEventBus;
    use crate::models::{ExchangeOrderId, OrderType};
    use crate::persistence::{SnapshotStore, Transaction};
    use std::sync::atomic::AtomicUsize;

    fn event(order_id: i64, cid: i64, state: &str, amount: f64) -> ExchangeOrderRecord {
        ExchangeOrderRecord {
            order_id,
            group_id: 0,
            cid,
            symbol: "BTCUSD".into(),
            created: 1_000,
            updated: 1_000,
            amount,
            amount_at_creation: 0.5,
            order_type: OrderType::ExchangeMarket,
            state: state.into(),
            price: 0.0,
            price_avg: 0.0,
            price_trailing: 0.0,
            price_aux_limit: 0.0,
            notify: false,
            hidden: false,
        }
    }

    fn stored(store: &SnapshotStore) -> Vec<ExchangeOrderRecord> {
        with_transaction(store, |tx| tx.query_orders(&|_| true)).unwrap()
    }

    /// Store that refuses the write for one chosen order id.
    struct FlakyStore {
        inner: SnapshotStore,
        failing_order: ExchangeOrderId,
        begins: AtomicUsize,
    }

    struct FlakyTransaction<'a> {
        inner: Box<dyn Transaction + 'a>,
        failing_order: ExchangeOrderId,
    }

    impl UnitOfWork for FlakyStore {
        fn begin(&self) -> Result<Box<dyn Transaction + '_>, StoreError> {
            self.begins.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FlakyTransaction {
                inner: self.inner.begin()?,
                failing_order: self.failing_order,
            }))
        }
    }

    impl Transaction for FlakyTransaction<'_> {
        fn upsert_trade(
            &mut self,
            trade: &mut crate::models::Trade,
        ) -> Result<crate::models::TradeId, StoreError> {
            self.inner.upsert_trade(trade)
        }

        fn upsert_order(&mut self, order: &ExchangeOrderRecord) -> Result<(), StoreError> {
            if order.order_id == self.failing_order {
                return Err(StoreError::Conflict(format!("order {} refused", order.order_id)));
            }
            self.inner.upsert_order(order)
        }

        fn find_trade(
            &self,
            id: crate::models::TradeId,
        ) -> Result<Option<crate::models::Trade>, StoreError> {
            self.inner.find_trade(id)
        }

        fn find_order(
            &self,
            order_id: ExchangeOrderId,
        ) -> Result<Option<ExchangeOrderRecord>, StoreError> {
            self.inner.find_order(order_id)
        }

        fn query_trades(
            &self,
            predicate: &dyn Fn(&crate::models::Trade) -> bool,
        ) -> Result<Vec<crate::models::Trade>, StoreError> {
            self.inner.query_trades(predicate)
        }

        fn query_orders(
            &self,
            predicate: &dyn Fn(&ExchangeOrderRecord) -> bool,
        ) -> Result<Vec<ExchangeOrderRecord>, StoreError> {
            self.inner.query_orders(predicate)
        }

        fn commit(self: Box<Self>) -> Result<(), StoreError> {
            self.inner.commit()
        }
    }

    fn flaky_store(failing_order: ExchangeOrderId) -> Arc<FlakyStore> {
        Arc::new(FlakyStore {
            inner: SnapshotStore::in_memory(),
            failing_order,
            begins: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_event_without_trade_is_recorded() {
        let store = Arc::new(SnapshotStore::in_memory());
        let recorder = OrderEventRecorder::new(store.clone());

        recorder.record(&event(11, 999, "ACTIVE", 0.5)).unwrap();

        let orders = stored(&store);
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].order_id, 11);
        assert_eq!(recorder.recorded(), 1);
    }

    #[test]
    fn test_redelivery_keeps_one_record_with_latest_fields() {
        let store = Arc::new(SnapshotStore::in_memory());
        let recorder = OrderEventRecorder::new(store.clone());

        recorder.record(&event(5, 1, "ACTIVE", 0.5)).unwrap();
        recorder
            .record(&event(5, 1, "EXECUTED @ 100(0.5)", 0.0))
            .unwrap();
        recorder
            .record(&event(5, 1, "EXECUTED @ 100(0.5)", 0.0))
            .unwrap();

        let orders = stored(&store);
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].state, "EXECUTED @ 100(0.5)");
        assert_eq!(orders[0].amount, 0.0);
    }

    #[test]
    fn test_concurrent_deliveries_all_land() {
        let store = Arc::new(SnapshotStore::in_memory());
        let recorder = Arc::new(OrderEventRecorder::new(store.clone()));

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let recorder = recorder.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        let id = worker * 100 + i;
                        recorder.record(&event(id, id, "ACTIVE", 1.0)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(stored(&store).len(), 200);
        assert_eq!(recorder.recorded(), 200);
        assert_eq!(recorder.failed(), 0);
    }

    #[tokio::test]
    async fn test_spawned_recorder_drains_bus_in_order() {
        let store = Arc::new(SnapshotStore::in_memory());
        let recorder = Arc::new(OrderEventRecorder::new(store.clone()));
        let bus = OrderEventBus::new();

        let handle = recorder.clone().spawn(bus.subscribe());
        bus.publish(event(1, 10, "ACTIVE", 0.5));
        bus.publish(event(1, 10, "EXECUTED @ 100(0.5)", 0.0));
        bus.publish(event(2, 20, "ACTIVE", -0.5));
        drop(bus);

        handle.await.unwrap();

        let mut orders = stored(&store);
        orders.sort_by_key(|o| o.order_id);
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].state, "EXECUTED @ 100(0.5)");
        assert_eq!(orders[1].cid, 20);
        assert_eq!(recorder.recorded(), 3);
    }

    #[tokio::test]
    async fn test_burst_larger_than_any_buffer_is_fully_recorded() {
        let store = Arc::new(SnapshotStore::in_memory());
        let recorder = Arc::new(OrderEventRecorder::new(store.clone()));
        let bus = OrderEventBus::new();
        let stream = bus.subscribe();

        // Everything is published before the pump gets to run.
        for id in 1..=2_000 {
            bus.publish(event(id, id, "ACTIVE", 1.0));
        }
        let handle = recorder.clone().spawn(stream);
        drop(bus);
        handle.await.unwrap();

        assert_eq!(recorder.recorded(), 2_000);
        assert_eq!(stored(&store).len(), 2_000);
    }

    #[test]
    fn test_failed_event_does_not_affect_others() {
        let store = flaky_store(2);
        let recorder = OrderEventRecorder::new(store.clone());

        recorder.record(&event(1, 10, "ACTIVE", 0.5)).unwrap();
        assert!(matches!(
            recorder.record(&event(2, 20, "ACTIVE", 0.5)),
            Err(StoreError::Conflict(_))
        ));
        recorder.record(&event(3, 30, "ACTIVE", 0.5)).unwrap();

        assert_eq!(recorder.recorded(), 2);
        assert_eq!(recorder.failed(), 1);
        assert_eq!(store.begins.load(Ordering::SeqCst), 3, "one unit of work per event");

        let mut ids: Vec<i64> = stored(&store.inner).iter().map(|o| o.order_id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_spawned_recorder_keeps_going_after_a_failed_event() {
        let store = flaky_store(2);
        let recorder = Arc::new(OrderEventRecorder::new(store.clone()));
        let bus = OrderEventBus::new();

        let handle = recorder.clone().spawn(bus.subscribe());
        for id in 1..=4 {
            bus.publish(event(id, id * 10, "ACTIVE", 0.5));
        }
        drop(bus);
        handle.await.unwrap();

        assert_eq!(recorder.recorded(), 3);
        assert_eq!(recorder.failed(), 1);
        let mut ids: Vec<i64> = stored(&store.inner).iter().map(|o| o.order_id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 3, 4]);
    }
}
