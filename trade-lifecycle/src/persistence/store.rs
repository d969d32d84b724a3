use super::snapshot::{load_snapshot, save_snapshot};
use super::{Transaction, UnitOfWork};
use crate::error::StoreError;
use crate::models::{ExchangeOrderId, ExchangeOrderRecord, Trade, TradeId};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard};

#[derive(Debug, Clone, Default)]
struct StoreState {
    trades: BTreeMap<TradeId, Trade>,
    orders: BTreeMap<ExchangeOrderId, ExchangeOrderRecord>,
}

/// On-disk layout.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    trades: Vec<Trade>,
    orders: Vec<ExchangeOrderRecord>,
}

impl From<&StoreState> for Snapshot {
    fn from(state: &StoreState) -> Self {
        Self {
            trades: state.trades.values().cloned().collect(),
            orders: state.orders.values().cloned().collect(),
        }
    }
}

/// Transactional store for trades and exchange order records.
///
/// Keeps the committed state in memory. When opened on a path, every commit
/// also rewrites the JSON snapshot there, and the new state only becomes
/// visible once that write succeeded.
pub struct SnapshotStore {
    path: Option<PathBuf>,
    state: RwLock<StoreState>,
    next_trade_id: AtomicU64,
}

impl SnapshotStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: RwLock::new(StoreState::default()),
            next_trade_id: AtomicU64::new(1),
        }
    }

    /// Opens (or starts) a file-backed store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let snapshot: Snapshot = load_snapshot(&path)?.unwrap_or_default();

        let mut state = StoreState::default();
        for trade in snapshot.trades {
            let id = trade
                .id()
                .ok_or_else(|| StoreError::Corrupt(format!("{} has no id", trade)))?;
            trade
                .validate()
                .map_err(|e| StoreError::Corrupt(format!("trade {}: {}", id, e)))?;
            state.trades.insert(id, trade);
        }
        for order in snapshot.orders {
            state.orders.insert(order.order_id, order);
        }

        let next_id = state
            .trades
            .keys()
            .next_back()
            .map(|id| id.value() + 1)
            .unwrap_or(1);

        info!(
            "Opened store {:?}: {} trades, {} order records",
            path,
            state.trades.len(),
            state.orders.len()
        );

        Ok(Self {
            path: Some(path),
            state: RwLock::new(state),
            next_trade_id: AtomicU64::new(next_id),
        })
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, StoreState>, StoreError> {
        self.state.read().map_err(|_| StoreError::Poisoned)
    }

    fn apply(
        &self,
        trades: BTreeMap<TradeId, Trade>,
        orders: BTreeMap<ExchangeOrderId, ExchangeOrderRecord>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;

        let mut next = state.clone();
        next.trades.extend(trades);
        next.orders.extend(orders);

        if let Some(path) = &self.path {
            save_snapshot(path, &Snapshot::from(&next))?;
        }

        *state = next;
        Ok(())
    }
}

impl UnitOfWork for SnapshotStore {
    fn begin(&self) -> Result<Box<dyn Transaction + '_>, StoreError> {
        Ok(Box::new(SnapshotTransaction {
            store: self,
            trades: BTreeMap::new(),
            orders: BTreeMap::new(),
            committed: false,
        }))
    }
}

struct SnapshotTransaction<'a> {
    store: &'a SnapshotStore,
    trades: BTreeMap<TradeId, Trade>,
    orders: BTreeMap<ExchangeOrderId, ExchangeOrderRecord>,
    committed: bool,
}

impl Transaction for SnapshotTransaction<'_> {
    fn upsert_trade(&mut self, trade: &mut Trade) -> Result<TradeId, StoreError> {
        let id = match trade.id() {
            Some(id) => {
                if id.value() >= self.store.next_trade_id.load(Ordering::SeqCst) {
                    return Err(StoreError::Conflict(format!(
                        "trade id {} was not issued by this store",
                        id
                    )));
                }
                id
            }
            None => {
                let id = TradeId::new(self.store.next_trade_id.fetch_add(1, Ordering::SeqCst));
                trade.assign_id(id);
                id
            }
        };
        self.trades.insert(id, trade.clone());
        Ok(id)
    }

    fn upsert_order(&mut self, order: &ExchangeOrderRecord) -> Result<(), StoreError> {
        self.orders.insert(order.order_id, order.clone());
        Ok(())
    }

    fn find_trade(&self, id: TradeId) -> Result<Option<Trade>, StoreError> {
        if let Some(trade) = self.trades.get(&id) {
            return Ok(Some(trade.clone()));
        }
        Ok(self.store.read_state()?.trades.get(&id).cloned())
    }

    fn find_order(
        &self,
        order_id: ExchangeOrderId,
    ) -> Result<Option<ExchangeOrderRecord>, StoreError> {
        if let Some(order) = self.orders.get(&order_id) {
            return Ok(Some(order.clone()));
        }
        Ok(self.store.read_state()?.orders.get(&order_id).cloned())
    }

    fn query_trades(&self, predicate: &dyn Fn(&Trade) -> bool) -> Result<Vec<Trade>, StoreError> {
        let state = self.store.read_state()?;
        let mut found: Vec<Trade> = state
            .trades
            .iter()
            .filter(|(id, _)| !self.trades.contains_key(*id))
            .map(|(_, trade)| trade)
            .filter(|trade| predicate(trade))
            .cloned()
            .collect();
        found.extend(self.trades.values().filter(|t| predicate(t)).cloned());
        Ok(found)
    }

    fn query_orders(
        &self,
        predicate: &dyn Fn(&ExchangeOrderRecord) -> bool,
    ) -> Result<Vec<ExchangeOrderRecord>, StoreError> {
        let state = self.store.read_state()?;
        let mut found: Vec<ExchangeOrderRecord> = state
            .orders
            .iter()
            .filter(|(id, _)| !self.orders.contains_key(*id))
            .map(|(_, order)| order)
            .filter(|order| predicate(order))
            .cloned()
            .collect();
        found.extend(self.orders.values().filter(|o| predicate(o)).cloned());
        Ok(found)
    }

    fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        let trades = std::mem::take(&mut self.trades);
        let orders = std::mem::take(&mut self.orders);
        // Read-only units of work leave the snapshot alone.
        if !trades.is_empty() || !orders.is_empty() {
            self.store.apply(trades, orders)?;
        }
        self.committed = true;
        Ok(())
    }
}

impl Drop for SnapshotTransaction<'_> {
    fn drop(&mut self) {
        if !self.committed && (!self.trades.is_empty() || !self.orders.is_empty()) {
            debug!(
                "Rolling back transaction with {} trade and {} order writes",
                self.trades.len(),
                self.orders.len()
            );
        }
    }
}
