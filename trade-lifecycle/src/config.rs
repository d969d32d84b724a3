use crate::models::OrderType;
use serde::{Deserialize, Serialize};

fn default_verify_durable_state() -> bool {
    true
}

/// Behaviour switches for the lifecycle manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleSettings {
    /// Also write the `OPENING`/`CLOSING` state before the order is submitted.
    /// Survives a crash between submission and the outcome write, at the cost
    /// of recording attempts that may never have reached the exchange.
    #[serde(default)]
    persist_before_submit: bool,

    /// Order type used for open and close orders.
    #[serde(default)]
    order_type: OrderType,

    /// Re-read a saved trade inside its lock and refuse to act on a stale copy.
    #[serde(default = "default_verify_durable_state")]
    verify_durable_state: bool,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            persist_before_submit: false,
            order_type: OrderType::default(),
            verify_durable_state: true,
        }
    }
}

impl LifecycleSettings {
    pub fn with_persist_before_submit(mut self, enabled: bool) -> Self {
        self.persist_before_submit = enabled;
        self
    }

    pub fn with_order_type(mut self, order_type: OrderType) -> Self {
        self.order_type = order_type;
        self
    }

    pub fn with_verify_durable_state(mut self, enabled: bool) -> Self {
        self.verify_durable_state = enabled;
        self
    }

    pub fn persist_before_submit(&self) -> bool {
        self.persist_before_submit
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn verify_durable_state(&self) -> bool {
        self.verify_durable_state
    }
}
