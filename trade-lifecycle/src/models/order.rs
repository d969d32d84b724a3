use super::ids::next_client_id;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Positive amounts buy, negative amounts sell.
    pub fn from_amount(amount: f64) -> Self {
        if amount >= 0.0 {
            Side::Buy
        } else {
            Side::Sell
        }
    }
}

/// Order types as the exchange spells them on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    #[serde(rename = "MARKET")]
    Market,
    #[serde(rename = "EXCHANGE MARKET")]
    ExchangeMarket,
    #[serde(rename = "LIMIT")]
    Limit,
    #[serde(rename = "EXCHANGE LIMIT")]
    ExchangeLimit,
    #[serde(rename = "STOP")]
    Stop,
    #[serde(rename = "EXCHANGE STOP")]
    ExchangeStop,
    #[serde(rename = "TRAILING STOP")]
    TrailingStop,
    #[serde(rename = "EXCHANGE TRAILING STOP")]
    ExchangeTrailingStop,
    #[serde(rename = "FOK")]
    Fok,
    #[serde(rename = "EXCHANGE FOK")]
    ExchangeFok,
    #[serde(rename = "STOP LIMIT")]
    StopLimit,
    #[serde(rename = "EXCHANGE STOP LIMIT")]
    ExchangeStopLimit,
}

impl Default for OrderType {
    fn default() -> Self {
        Self::ExchangeMarket
    }
}

impl OrderType {
    const ALL: [OrderType; 12] = [
        OrderType::Market,
        OrderType::ExchangeMarket,
        OrderType::Limit,
        OrderType::ExchangeLimit,
        OrderType::Stop,
        OrderType::ExchangeStop,
        OrderType::TrailingStop,
        OrderType::ExchangeTrailingStop,
        OrderType::Fok,
        OrderType::ExchangeFok,
        OrderType::StopLimit,
        OrderType::ExchangeStopLimit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "MARKET",
            OrderType::ExchangeMarket => "EXCHANGE MARKET",
            OrderType::Limit => "LIMIT",
            OrderType::ExchangeLimit => "EXCHANGE LIMIT",
            OrderType::Stop => "STOP",
            OrderType::ExchangeStop => "EXCHANGE STOP",
            OrderType::TrailingStop => "TRAILING STOP",
            OrderType::ExchangeTrailingStop => "EXCHANGE TRAILING STOP",
            OrderType::Fok => "FOK",
            OrderType::ExchangeFok => "EXCHANGE FOK",
            OrderType::StopLimit => "STOP LIMIT",
            OrderType::ExchangeStopLimit => "EXCHANGE STOP LIMIT",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown order type '{}'", s))
    }
}

/// A client-side order instruction. This is what a trade keeps in its
/// open/close trails; the exchange's view of it arrives later as an
/// `ExchangeOrderRecord` carrying the same `client_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    client_id: i64,
    symbol: String,
    amount: f64,
    order_type: OrderType,
    created_at: i64,
}

impl Order {
    /// Market order for `amount` (signed) of `symbol`.
    pub fn market(symbol: impl Into<String>, amount: f64, order_type: OrderType) -> Self {
        Self {
            client_id: next_client_id(),
            symbol: symbol.into(),
            amount,
            order_type,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn client_id(&self) -> i64 {
        self.client_id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Order[cid={}, {} {} {}]",
            self.client_id, self.order_type, self.symbol, self.amount
        )
    }
}
