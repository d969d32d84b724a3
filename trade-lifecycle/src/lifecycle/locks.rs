use crate::models::TradeId;
use std::collections::HashSet;
use std::sync::{Condvar, Mutex, PoisonError};

/// Set of trades with an open/close call in flight.
///
/// `acquire` blocks while another call holds the same trade id. Unsaved
/// trades (no id yet) are not tracked: the caller's `&mut Trade` already
/// makes the call exclusive for that object, and no other copy can exist in
/// the store.
#[derive(Default)]
pub(crate) struct TradeLocks {
    in_flight: Mutex<HashSet<TradeId>>,
    released: Condvar,
}

impl TradeLocks {
    pub(crate) fn acquire(&self, id: Option<TradeId>) -> TradeGuard<'_> {
        if let Some(id) = id {
            // The set stays consistent even if a holder panicked.
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            while in_flight.contains(&id) {
                in_flight = self
                    .released
                    .wait(in_flight)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            in_flight.insert(id);
        }
        TradeGuard { locks: self, id }
    }

    #[cfg(test)]
    pub(crate) fn is_held(&self, id: TradeId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }
}

pub(crate) struct TradeGuard<'a> {
    locks: &'a TradeLocks,
    id: Option<TradeId>,
}

impl TradeGuard<'_> {
    /// A trade saved for the first time during the call gets its id now;
    /// hold it for the rest of the call.
    pub(crate) fn adopt(&mut self, id: TradeId) {
        if self.id.is_some() {
            return;
        }
        let mut in_flight = self
            .locks
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        in_flight.insert(id);
        self.id = Some(id);
    }
}

impl Drop for TradeGuard<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.id {
            self.locks
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id);
            self.locks.released.notify_all();
        }
    }
}
