use super::ids::ExchangeOrderId;
use super::order::OrderType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse order state parsed from the exchange's free-form status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeOrderState {
    Active,
    PartiallyFilled,
    Executed,
    Canceled,
    Unknown,
}

impl ExchangeOrderState {
    /// `"EXECUTED @ 107.6(-0.2)"` is `Executed`, `"PARTIALLY FILLED @ ..."` is
    /// `PartiallyFilled` and so on. Only the prefix is significant.
    pub fn parse(status: &str) -> Self {
        let status = status.trim_start().to_ascii_uppercase();
        if status.starts_with("ACTIVE") {
            Self::Active
        } else if status.starts_with("PARTIALLY FILLED") {
            Self::PartiallyFilled
        } else if status.starts_with("EXECUTED") {
            Self::Executed
        } else if status.starts_with("CANCELED") || status.starts_with("CANCELLED") {
            Self::Canceled
        } else {
            Self::Unknown
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Self::Executed | Self::Canceled)
    }
}

/// Durable snapshot of one exchange order, keyed by `order_id`.
///
/// Written only by the order event recorder, one upsert per delivered event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeOrderRecord {
    pub order_id: ExchangeOrderId,
    pub group_id: i64,
    /// Client-assigned correlation id, matches `Order::client_id`.
    pub cid: i64,
    pub symbol: String,
    pub created: i64,
    pub updated: i64,
    pub amount: f64,
    pub amount_at_creation: f64,
    pub order_type: OrderType,
    /// Status exactly as reported by the exchange.
    pub state: String,
    pub price: f64,
    pub price_avg: f64,
    pub price_trailing: f64,
    pub price_aux_limit: f64,
    pub notify: bool,
    pub hidden: bool,
}

impl ExchangeOrderRecord {
    pub fn order_state(&self) -> ExchangeOrderState {
        ExchangeOrderState::parse(&self.state)
    }

    /// Amount already filled (`amount_at_creation - amount`), signed.
    pub fn filled_amount(&self) -> f64 {
        self.amount_at_creation - self.amount
    }
}

impl fmt::Display for ExchangeOrderRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ExchangeOrder[id={}, cid={}, {} {} {}/{}, {}]",
            self.order_id,
            self.cid,
            self.order_type,
            self.symbol,
            self.amount,
            self.amount_at_creation,
            self.state
        )
    }
}
