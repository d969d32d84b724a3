//! Trade lifecycle core for an exchange trading bot.
//!
//! * `lifecycle` - opens/closes trades through an [`ExchangeGateway`] and
//!   persists every outcome through a [`UnitOfWork`].
//! * `recorder` - records the exchange's asynchronous order notifications.
//! * `exchange` - gateway contract, order event bus, paper gateway.
//! * `persistence` - unit-of-work contract and the snapshot store.
//! * `models` - trades, their state machine, orders, exchange order records.

pub mod config;
pub mod error;
pub mod exchange;
pub mod lifecycle;
pub mod models;
pub mod persistence;
pub mod recorder;

pub use config::LifecycleSettings;
pub use error::{GatewayError, LifecycleError, StoreError};
pub use exchange::{ExchangeGateway, OrderEventBus, OrderEventStream, PaperGateway};
pub use lifecycle::TradeLifecycleManager;
pub use models::{
    ExchangeOrderRecord, ExchangeOrderState, Order, OrderType, Side, Trade, TradeId, TradeState,
};
pub use persistence::{with_transaction, SnapshotStore, Transaction, UnitOfWork};
pub use recorder::OrderEventRecorder;
