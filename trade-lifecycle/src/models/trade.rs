use super::ids::TradeId;
use super::order::{Order, Side};
use crate::error::{LifecycleError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a trade.
///
/// ```text
/// PRE_OPEN -> OPENING -> OPEN -> CLOSING -> CLOSED
///                |                  |
///                +-----> ERROR <----+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeState {
    /// Trade exists, no order submitted yet.
    PreOpen,
    /// Open order submitted, awaiting the gateway result.
    Opening,
    /// Position established.
    Open,
    /// Close order submitted, awaiting the gateway result.
    Closing,
    /// Position terminated.
    Closed,
    /// A submission failed. Terminal for the attempt that produced it.
    Error,
}

impl TradeState {
    pub fn can_transition_to(&self, next: TradeState) -> bool {
        use TradeState::*;
        matches!(
            (self, next),
            (PreOpen, Opening)
                | (Opening, Open)
                | (Opening, Error)
                | (Open, Closing)
                | (Closing, Closed)
                | (Closing, Error)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TradeState::Closed | TradeState::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeState::PreOpen => "PRE_OPEN",
            TradeState::Opening => "OPENING",
            TradeState::Open => "OPEN",
            TradeState::Closing => "CLOSING",
            TradeState::Closed => "CLOSED",
            TradeState::Error => "ERROR",
        }
    }
}

impl fmt::Display for TradeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One position under management.
///
/// Built by the decision-maker in `PRE_OPEN`; from then on only the lifecycle
/// manager moves it through its states. Never deleted, `CLOSED` is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    id: Option<TradeId>,
    symbol: String,
    amount: f64,
    state: TradeState,
    open_orders: Vec<Order>,
    close_orders: Vec<Order>,
    created_at: i64,
    updated_at: i64,
}

impl Trade {
    /// New trade in `PRE_OPEN`. The sign of `amount` is the direction.
    pub fn new(symbol: impl Into<String>, amount: f64) -> Result<Self> {
        let symbol = symbol.into();
        check_fields(&symbol, amount)?;

        let now = chrono::Utc::now().timestamp_millis();
        Ok(Self {
            id: None,
            symbol,
            amount,
            state: TradeState::PreOpen,
            open_orders: Vec::new(),
            close_orders: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> Option<TradeId> {
        self.id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn direction(&self) -> Side {
        Side::from_amount(self.amount)
    }

    pub fn state(&self) -> TradeState {
        self.state
    }

    pub fn open_orders(&self) -> &[Order] {
        &self.open_orders
    }

    pub fn close_orders(&self) -> &[Order] {
        &self.close_orders
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    /// Client ids of every order this trade has submitted, opens first.
    pub fn client_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.open_orders
            .iter()
            .chain(self.close_orders.iter())
            .map(Order::client_id)
    }

    /// Re-checks what `new` guarantees, for trades that arrive by deserializing.
    pub(crate) fn validate(&self) -> Result<()> {
        check_fields(&self.symbol, self.amount)
    }

    pub(crate) fn assign_id(&mut self, id: TradeId) {
        self.id = Some(id);
    }

    pub(crate) fn clear_id(&mut self) {
        self.id = None;
    }

    /// Fails without touching the trade if `next` is not reachable in one step.
    pub(crate) fn ensure_transition(&self, next: TradeState) -> Result<()> {
        if self.state.can_transition_to(next) {
            Ok(())
        } else {
            Err(LifecycleError::InvalidStateTransition {
                from: self.state,
                to: next,
            })
        }
    }

    pub(crate) fn transition(&mut self, next: TradeState) -> Result<()> {
        self.ensure_transition(next)?;
        self.state = next;
        self.updated_at = chrono::Utc::now().timestamp_millis();
        Ok(())
    }

    pub(crate) fn add_open_order(&mut self, order: Order) {
        self.open_orders.push(order);
    }

    pub(crate) fn add_close_order(&mut self, order: Order) {
        self.close_orders.push(order);
    }
}

fn check_fields(symbol: &str, amount: f64) -> Result<()> {
    if symbol.trim().is_empty() {
        return Err(LifecycleError::InvalidTrade("symbol is empty".into()));
    }
    if !amount.is_finite() || amount == 0.0 {
        return Err(LifecycleError::InvalidTrade(format!(
            "amount must be finite and non-zero, got {}",
            amount
        )));
    }
    Ok(())
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "Trade#{}", id)?,
            None => write!(f, "Trade#unsaved")?,
        }
        write!(
            f,
            "[{} {} {}, opens={}, closes={}]",
            self.symbol,
            self.amount,
            self.state,
            self.open_orders.len(),
            self.close_orders.len()
        )
    }
}
