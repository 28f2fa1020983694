//! Per-symbol listener lists.
//!
//! Dispatch copies the listener list under the lock and calls listeners
//! with the lock released, so a listener may subscribe or unsubscribe
//! while being notified.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::TokenPrice;

pub type PriceListener = Arc<dyn Fn(&TokenPrice) + Send + Sync>;

type ListenerId = u64;

#[derive(Default)]
struct Listeners {
    next_id: ListenerId,
    by_symbol: HashMap<String, Vec<(ListenerId, PriceListener)>>,
}

#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    inner: Arc<Mutex<Listeners>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Listeners> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `listener` for each of `symbols` under one handle.
    pub fn register<I, S>(&self, symbols: I, listener: PriceListener) -> Subscription
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut guard = self.lock();
        let id = guard.next_id;
        guard.next_id += 1;
        let mut entries = Vec::new();
        for symbol in symbols {
            let symbol = symbol.into();
            guard
                .by_symbol
                .entry(symbol.clone())
                .or_default()
                .push((id, listener.clone()));
            entries.push(symbol);
        }
        Subscription {
            registry: Arc::downgrade(&self.inner),
            id,
            symbols: Mutex::new(entries),
        }
    }

    pub fn listener_count(&self, symbol: &str) -> usize {
        self.lock().by_symbol.get(symbol).map_or(0, Vec::len)
    }

    /// Call every listener of `quote.symbol`.
    ///
    /// A panicking listener is logged and does not stop the others.
    pub fn notify(&self, quote: &TokenPrice) -> usize {
        let listeners: Vec<PriceListener> = self
            .lock()
            .by_symbol
            .get(&quote.symbol)
            .map(|list| list.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();

        for listener in &listeners {
            call_listener(&quote.symbol, || listener(quote));
        }
        listeners.len()
    }

    pub fn clear(&self) {
        self.lock().by_symbol.clear();
    }
}

/// Run one listener call. A panic is logged and swallowed.
pub(crate) fn call_listener(symbol: &str, call: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(call)).is_err() {
        log::error!("price feed: listener for {symbol} panicked");
    }
}

fn remove(inner: &Mutex<Listeners>, symbol: &str, id: ListenerId) {
    let mut guard = inner.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(list) = guard.by_symbol.get_mut(symbol) {
        list.retain(|(existing, _)| *existing != id);
        if list.is_empty() {
            guard.by_symbol.remove(symbol);
        }
    }
}

/// Handle returned by `subscribe` / `subscribe_all`.
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`].
#[must_use = "dropping a Subscription keeps the listener registered"]
pub struct Subscription {
    registry: Weak<Mutex<Listeners>>,
    id: ListenerId,
    symbols: Mutex<Vec<String>>,
}

impl Subscription {
    /// A handle with nothing registered behind it.
    pub(crate) fn inactive() -> Self {
        Self {
            registry: Weak::new(),
            id: 0,
            symbols: Mutex::new(Vec::new()),
        }
    }

    /// Remove the listener. Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        let symbols = std::mem::take(
            &mut *self.symbols.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let Some(inner) = self.registry.upgrade() else {
            return;
        };
        for symbol in symbols {
            remove(&inner, &symbol, self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        !self
            .symbols
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    pub fn symbols(&self) -> Vec<String> {
        self.symbols
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
