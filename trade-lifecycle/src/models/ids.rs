use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Persistence identity of a trade, assigned by the store on first save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TradeId(u64);

impl TradeId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Exchange-assigned order identifier. Unique per exchange session.
pub type ExchangeOrderId = i64;

static LAST_CLIENT_ID: AtomicI64 = AtomicI64::new(0);

/// Next client order id (`cid`).
///
/// Seeded from the wall clock in millis like the exchange expects, but bumped
/// so two orders created within the same millisecond never share a cid.
pub fn next_client_id() -> i64 {
    let now = Utc::now().timestamp_millis();
    let mut prev = LAST_CLIENT_ID.load(Ordering::Relaxed);
    loop {
        let next = now.max(prev + 1);
        match LAST_CLIENT_ID.compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => return next,
            Err(actual) => prev = actual,
        }
    }
}
