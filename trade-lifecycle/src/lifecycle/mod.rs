use crate::config::LifecycleSettings;
use crate::error::{LifecycleError, Result};
use crate::exchange::ExchangeGateway;
use crate::models::{ExchangeOrderRecord, Order, Trade, TradeId, TradeState};
use crate::persistence::{with_transaction, UnitOfWork};
use log::{error, info, warn};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

mod locks;

use locks::TradeLocks;

/// Which half of a trade an order belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leg {
    Open,
    Close,
}

impl Leg {
    fn pending(self) -> TradeState {
        match self {
            Leg::Open => TradeState::Opening,
            Leg::Close => TradeState::Closing,
        }
    }

    fn settled(self) -> TradeState {
        match self {
            Leg::Open => TradeState::Open,
            Leg::Close => TradeState::Closed,
        }
    }

    /// Closing reverses the trade's direction.
    fn order_amount(self, trade_amount: f64) -> f64 {
        match self {
            Leg::Open => trade_amount,
            Leg::Close => -trade_amount,
        }
    }

    fn record(self, trade: &mut Trade, order: Order) {
        match self {
            Leg::Open => trade.add_open_order(order),
            Leg::Close => trade.add_close_order(order),
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leg::Open => f.write_str("opening"),
            Leg::Close => f.write_str("closing"),
        }
    }
}

/// Opens and closes trades on the exchange and keeps the durable record in
/// step with every state change.
///
/// Calls for different trades may run concurrently. Calls for the same saved
/// trade are serialized internally for their whole duration.
pub struct TradeLifecycleManager {
    gateway: Arc<dyn ExchangeGateway>,
    store: Arc<dyn UnitOfWork>,
    settings: LifecycleSettings,
    locks: TradeLocks,
}

impl TradeLifecycleManager {
    pub fn new(
        gateway: Arc<dyn ExchangeGateway>,
        store: Arc<dyn UnitOfWork>,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            gateway,
            store,
            settings,
            locks: TradeLocks::default(),
        }
    }

    /// Submits a market order for the trade's amount and moves it
    /// `PRE_OPEN -> OPENING -> OPEN` (or `ERROR` if the exchange refuses).
    ///
    /// # Errors
    ///
    /// * `InvalidStateTransition` - trade is not `PRE_OPEN`. Nothing changed.
    /// * `NotAuthenticated` - gateway not ready. Nothing changed or written.
    /// * `GatewaySubmission` - order refused; the trade is `ERROR` and saved.
    /// * `Persistence` - the outcome could not be saved.
    pub fn open_trade(&self, trade: &mut Trade) -> Result<()> {
        self.execute(trade, Leg::Open)
    }

    /// Submits the reversing market order and moves the trade
    /// `OPEN -> CLOSING -> CLOSED` (or `ERROR`). Same error contract as
    /// [`open_trade`](Self::open_trade), with `OPEN` as the required state.
    pub fn close_trade(&self, trade: &mut Trade) -> Result<()> {
        self.execute(trade, Leg::Close)
    }

    /// Every stored trade whose last committed state is `OPEN`, in no
    /// particular order. Meant for reconciliation at startup.
    pub fn get_all_open_trades(&self) -> Result<Vec<Trade>> {
        let trades = with_transaction(&*self.store, |tx| {
            tx.query_trades(&|t: &Trade| t.state() == TradeState::Open)
        })?;
        Ok(trades)
    }

    pub fn get_trade(&self, id: TradeId) -> Result<Option<Trade>> {
        Ok(with_transaction(&*self.store, |tx| tx.find_trade(id))?)
    }

    /// The exchange's records for the orders in the trade's open and close
    /// trails, oldest first. Orders the exchange never reported are absent.
    pub fn order_records(&self, trade: &Trade) -> Result<Vec<ExchangeOrderRecord>> {
        let cids: HashSet<i64> = trade.client_ids().collect();
        let mut records = with_transaction(&*self.store, |tx| {
            tx.query_orders(&|o: &ExchangeOrderRecord| cids.contains(&o.cid))
        })?;
        records.sort_by_key(|o| (o.created, o.order_id));
        Ok(records)
    }

    fn execute(&self, trade: &mut Trade, leg: Leg) -> Result<()> {
        let pending = leg.pending();

        if let Err(e) = trade.ensure_transition(pending) {
            warn!("Refusing to start {} {}: {}", leg, trade, e);
            return Err(e);
        }

        if !self.gateway.is_authenticated() {
            error!(
                "Unable to execute {} on marketplace, connection is not authenticated",
                trade
            );
            return Err(LifecycleError::NotAuthenticated);
        }

        let mut guard = self.locks.acquire(trade.id());
        self.ensure_current(trade, pending)?;

        let before = trade.clone();
        let order = Order::market(
            trade.symbol(),
            leg.order_amount(trade.amount()),
            self.settings.order_type(),
        );
        trade.transition(pending)?;
        leg.record(trade, order.clone());

        if self.settings.persist_before_submit() {
            if let Err(e) = self.persist(trade) {
                error!(
                    "Could not record {} before submission, nothing was sent: {}",
                    trade, e
                );
                *trade = before;
                return Err(e);
            }
            if let Some(id) = trade.id() {
                guard.adopt(id);
            }
        }

        let outcome = self.gateway.submit_order(&order);
        let settled = match &outcome {
            Ok(()) => {
                info!("Submitted {} for {}", order, trade);
                leg.settled()
            }
            Err(e) => {
                error!("Got an exception while {} trade {}: {}", leg, trade, e);
                TradeState::Error
            }
        };
        trade.transition(settled)?;

        if let Err(e) = self.persist(trade) {
            error!(
                "Failed to persist {} after submitting {}, exchange exposure unknown: {}",
                trade, order, e
            );
            return Err(e);
        }

        outcome.map_err(LifecycleError::GatewaySubmission)
    }

    /// Refuses to act on a stale copy of a saved trade.
    fn ensure_current(&self, trade: &Trade, pending: TradeState) -> Result<()> {
        let Some(id) = trade.id() else {
            return Ok(());
        };
        if !self.settings.verify_durable_state() {
            return Ok(());
        }

        let durable = with_transaction(&*self.store, |tx| tx.find_trade(id))?;
        match durable {
            Some(stored) if stored.state() != trade.state() => {
                warn!(
                    "{} is stale: stored state is {}, refusing {}",
                    trade,
                    stored.state(),
                    pending
                );
                Err(LifecycleError::InvalidStateTransition {
                    from: stored.state(),
                    to: pending,
                })
            }
            _ => Ok(()),
        }
    }

    fn persist(&self, trade: &mut Trade) -> Result<()> {
        let saved = trade.id().is_some();
        if let Err(e) = with_transaction(&*self.store, |tx| tx.upsert_trade(trade).map(|_| ())) {
            // An id handed out by a unit of work that never committed names nothing.
            if !saved {
                trade.clear_id();
            }
            return Err(e.into());
        }
        Ok(())
    }
}
