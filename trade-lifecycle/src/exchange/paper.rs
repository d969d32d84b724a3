use super::events::{OrderEventBus, OrderEventStream};
use super::ExchangeGateway;
use crate::error::GatewayError;
use crate::models::{ExchangeOrderId, ExchangeOrderRecord, Order};
use chrono::Utc;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

const FALLBACK_PRICE: f64 = 100.0;

/// In-process exchange. Accepts every order at the mark price (fills
/// completely, no slippage) unless a rejection was queued with `reject_next`.
///
/// Each accepted order produces two notifications for the same exchange order
/// id: `ACTIVE`, then `EXECUTED @ price(amount)`.
pub struct PaperGateway {
    authenticated: AtomicBool,
    reject_budget: AtomicUsize,
    next_order_id: AtomicI64,
    mark_prices: Mutex<HashMap<String, f64>>,
    submitted: Mutex<Vec<Order>>,
    bus: OrderEventBus,
}

impl PaperGateway {
    pub fn new() -> Self {
        Self {
            authenticated: AtomicBool::new(true),
            reject_budget: AtomicUsize::new(0),
            next_order_id: AtomicI64::new(1),
            mark_prices: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            bus: OrderEventBus::new(),
        }
    }

    pub fn with_mark_price(self, symbol: impl Into<String>, price: f64) -> Self {
        self.set_mark_price(symbol, price);
        self
    }

    pub fn set_mark_price(&self, symbol: impl Into<String>, price: f64) {
        self.mark_prices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(symbol.into(), price);
    }

    pub fn set_authenticated(&self, authenticated: bool) {
        self.authenticated.store(authenticated, Ordering::SeqCst);
    }

    /// The next `count` submissions are rejected.
    pub fn reject_next(&self, count: usize) {
        self.reject_budget.store(count, Ordering::SeqCst);
    }

    /// Every order that reached the gateway, accepted or not.
    pub fn submitted_orders(&self) -> Vec<Order> {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn mark_price(&self, symbol: &str) -> f64 {
        self.mark_prices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(symbol)
            .copied()
            .filter(|p| *p > 0.0)
            .unwrap_or(FALLBACK_PRICE)
    }

    fn take_rejection(&self) -> bool {
        self.reject_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn publish_fill(&self, order_id: ExchangeOrderId, order: &Order, price: f64) {
        let now = Utc::now().timestamp_millis();
        let mut record = ExchangeOrderRecord {
            order_id,
            group_id: 0,
            cid: order.client_id(),
            symbol: order.symbol().to_string(),
            created: now,
            updated: now,
            amount: order.amount(),
            amount_at_creation: order.amount(),
            order_type: order.order_type(),
            state: "ACTIVE".to_string(),
            price: 0.0,
            price_avg: 0.0,
            price_trailing: 0.0,
            price_aux_limit: 0.0,
            notify: false,
            hidden: false,
        };
        self.bus.publish(record.clone());

        record.updated = Utc::now().timestamp_millis();
        record.amount = 0.0;
        record.price_avg = price;
        record.state = format!("EXECUTED @ {}({})", price, order.amount());
        self.bus.publish(record);
    }
}

impl Default for PaperGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl ExchangeGateway for PaperGateway {
    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    fn submit_order(&self, order: &Order) -> Result<(), GatewayError> {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(order.clone());

        if !self.is_authenticated() {
            return Err(GatewayError::Transport("session not authenticated".into()));
        }
        if self.take_rejection() {
            debug!("[PaperGateway] Rejecting {}", order);
            return Err(GatewayError::Rejected(format!(
                "paper rejection of cid {}",
                order.client_id()
            )));
        }

        let order_id = self.next_order_id.fetch_add(1, Ordering::SeqCst);
        let price = self.mark_price(order.symbol());
        info!(
            "[PaperGateway] Filled {} as order {} @ {:.4}",
            order, order_id, price
        );
        self.publish_fill(order_id, order, price);
        Ok(())
    }

    fn subscribe_order_events(&self) -> OrderEventStream {
        self.bus.subscribe()
    }
}
