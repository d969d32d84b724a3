use crate::error::StoreError;
use crate::models::{ExchangeOrderId, ExchangeOrderRecord, Trade, TradeId};

pub mod snapshot;
pub mod store;

pub use store::SnapshotStore;

/// Process-wide handle to the durable store. Every operation takes its own
/// short-lived transaction from it.
pub trait UnitOfWork: Send + Sync {
    fn begin(&self) -> Result<Box<dyn Transaction + '_>, StoreError>;
}

/// A unit of work over trades and exchange order records.
///
/// Writes are staged until `commit`. Dropping a transaction without
/// committing rolls it back. Reads see committed state plus this
/// transaction's own staged writes.
pub trait Transaction {
    /// Insert or replace `trade`. Assigns its id on first save.
    fn upsert_trade(&mut self, trade: &mut Trade) -> Result<TradeId, StoreError>;

    /// Insert or replace the record with the same `order_id`.
    fn upsert_order(&mut self, order: &ExchangeOrderRecord) -> Result<(), StoreError>;

    fn find_trade(&self, id: TradeId) -> Result<Option<Trade>, StoreError>;

    fn find_order(
        &self,
        order_id: ExchangeOrderId,
    ) -> Result<Option<ExchangeOrderRecord>, StoreError>;

    fn query_trades(&self, predicate: &dyn Fn(&Trade) -> bool) -> Result<Vec<Trade>, StoreError>;

    fn query_orders(
        &self,
        predicate: &dyn Fn(&ExchangeOrderRecord) -> bool,
    ) -> Result<Vec<ExchangeOrderRecord>, StoreError>;

    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Runs `f` inside a fresh transaction.
///
/// Commits when `f` returns `Ok`; rolls back and returns the error otherwise.
/// The transaction is released on every path, panics included.
pub fn with_transaction<R, F>(store: &dyn UnitOfWork, f: F) -> Result<R, StoreError>
where
    F: FnOnce(&mut dyn Transaction) -> Result<R, StoreError>,
{
    let mut tx = store.begin()?;
    let value = f(&mut *tx)?;
    tx.commit()?;
    Ok(value)
}
