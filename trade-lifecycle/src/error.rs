use crate::models::TradeState;
use thiserror::Error;

/// Failure reported by an exchange gateway when an order is not accepted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// The exchange refused the order.
    #[error("order rejected by exchange: {0}")]
    Rejected(String),

    /// The order could not be delivered to the exchange.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Failure of the durable store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A writer panicked while holding the store.
    #[error("store lock poisoned")]
    Poisoned,

    #[error("write conflict: {0}")]
    Conflict(String),

    /// The stored data breaks an invariant the model enforces.
    #[error("corrupt store: {0}")]
    Corrupt(String),
}

/// Errors surfaced by the trade lifecycle manager.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// Gateway session not ready. Nothing was mutated or written.
    #[error("exchange session is not authenticated")]
    NotAuthenticated,

    /// The exchange did not accept the order. The trade is now `ERROR` and persisted.
    #[error("order submission failed: {0}")]
    GatewaySubmission(#[source] GatewayError),

    /// The operation is not valid for the trade's current state. Nothing was mutated.
    #[error("invalid state transition {from} -> {to}")]
    InvalidStateTransition { from: TradeState, to: TradeState },

    /// The durable write failed. The exchange may hold an order we did not record.
    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),

    #[error("invalid trade: {0}")]
    InvalidTrade(String),
}

pub type Result<T> = std::result::Result<T, LifecycleError>;
