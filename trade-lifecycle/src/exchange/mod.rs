use crate::error::GatewayError;
use crate::models::Order;

pub mod events;
pub mod paper;

pub use events::{OrderEventBus, OrderEventStream};
pub use paper::PaperGateway;

/// Narrow view of the exchange connectivity layer.
///
/// Implementations own authentication, the wire protocol and any timeouts;
/// this crate only sees the outcome.
pub trait ExchangeGateway: Send + Sync {
    /// Whether the session can currently place orders.
    fn is_authenticated(&self) -> bool;

    /// Submit an order. Blocks until the exchange accepted or refused it.
    /// Fills and later updates arrive on the order event stream.
    fn submit_order(&self, order: &Order) -> Result<(), GatewayError>;

    /// Subscribe to the exchange's order notifications. Every update for
    /// every order is delivered, whether or not a trade references it.
    fn subscribe_order_events(&self) -> OrderEventStream;
}
