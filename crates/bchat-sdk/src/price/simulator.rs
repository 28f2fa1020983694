//! `PriceFeedSimulator`: random-walk quotes on a repeating timer.
//!
//! One tokio task owns the timer and drives every tick. A whole tick,
//! compute and dispatch, runs under `tick_gate`, so ticks never overlap.
//! The state lock is held only while quotes are computed and is released
//! before listeners run, so a listener may read the simulator.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::config::{BASELINE_SYMBOLS, DEFAULT_TICK_INTERVAL, PriceFeedConfig};
use super::subscribers::{SubscriberRegistry, Subscription, call_listener};
use super::TokenPrice;

/// Commands sent to the timer task.
#[derive(Debug)]
enum FeedCmd {
    Shutdown,
}

struct FeedState {
    quotes: HashMap<String, TokenPrice>,
    rng: StdRng,
    destroyed: bool,
}

pub struct PriceFeedSimulator {
    config: PriceFeedConfig,
    state: Arc<Mutex<FeedState>>,
    subscribers: SubscriberRegistry,
    tick_gate: Mutex<()>,
    cmd_tx: Mutex<Option<mpsc::UnboundedSender<FeedCmd>>>,
}

impl PriceFeedSimulator {
    pub fn new(config: PriceFeedConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            state: Arc::new(Mutex::new(FeedState {
                quotes: HashMap::new(),
                rng,
                destroyed: false,
            })),
            subscribers: SubscriberRegistry::new(),
            tick_gate: Mutex::new(()),
            cmd_tx: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &PriceFeedConfig {
        &self.config
    }

    fn lock_state(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_cmd(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<FeedCmd>>> {
        self.cmd_tx.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Spawn the timer on the current tokio runtime. The first tick fires
    /// immediately.
    ///
    /// Returns `None` if the timer is already running or the feed has been
    /// destroyed.
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.lock_state().destroyed {
            log::warn!("price feed: start called after destroy");
            return None;
        }
        let mut cmd_slot = self.lock_cmd();
        if cmd_slot.as_ref().is_some_and(|tx| !tx.is_closed()) {
            log::warn!("price feed: timer already running");
            return None;
        }

        let period = if self.config.tick_interval.is_zero() {
            log::warn!("price feed: zero tick interval, using {DEFAULT_TICK_INTERVAL:?}");
            DEFAULT_TICK_INTERVAL
        } else {
            self.config.tick_interval
        };

        let (tx, rx) = mpsc::unbounded_channel();
        *cmd_slot = Some(tx);
        log::info!(
            "price feed: started, {} symbols every {period:?}",
            self.config.symbols.len()
        );
        Some(tokio::spawn(run_timer(Arc::downgrade(self), period, rx)))
    }

    pub fn is_running(&self) -> bool {
        self.lock_cmd().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    pub fn is_destroyed(&self) -> bool {
        self.lock_state().destroyed
    }

    /// Stop the timer and drop every listener. The last snapshot stays
    /// readable; no further updates are applied.
    pub fn destroy(&self) {
        self.lock_state().destroyed = true;
        if let Some(tx) = self.lock_cmd().take() {
            let _ = tx.send(FeedCmd::Shutdown);
        }
        self.subscribers.clear();
        log::info!("price feed: destroyed");
    }

    // ── Updates ─────────────────────────────────────────────────────

    /// Run one tick by hand instead of waiting for the timer.
    ///
    /// Waits for a tick in flight to finish. Must not be called from a
    /// listener.
    #[cfg(any(test, feature = "testing"))]
    pub fn tick(&self) -> usize {
        self.run_tick()
    }

    /// Recompute every tracked symbol once and notify listeners.
    ///
    /// A symbol whose quote cannot be computed is logged and skipped for
    /// this tick. Returns the number of quotes updated.
    fn run_tick(&self) -> usize {
        let _gate = self.tick_gate.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now();
        let updated: Vec<TokenPrice> = {
            let mut guard = self.lock_state();
            if guard.destroyed {
                return 0;
            }
            let FeedState { quotes, rng, .. } = &mut *guard;
            let mut updated = Vec::with_capacity(self.config.symbols.len());
            for spec in &self.config.symbols {
                match spec.next_quote(quotes.get(&spec.symbol), rng, now, self.config.btc_usd) {
                    Ok(quote) => {
                        quotes.insert(spec.symbol.clone(), quote.clone());
                        updated.push(quote);
                    }
                    Err(e) => log::warn!("price feed: skipping {} this tick: {e}", spec.symbol),
                }
            }
            updated
        };

        log::debug!("price feed: tick updated {} quotes", updated.len());
        for quote in &updated {
            self.subscribers.notify(quote);
        }
        updated.len()
    }

    // ── Reads ───────────────────────────────────────────────────────

    pub fn get_price(&self, symbol: &str) -> Option<TokenPrice> {
        self.lock_state().quotes.get(symbol).cloned()
    }

    /// All current quotes, sorted by symbol.
    pub fn get_all_prices(&self) -> Vec<TokenPrice> {
        snapshot(&self.state)
    }

    // ── Subscriptions ───────────────────────────────────────────────

    /// Call `on_update` whenever `symbol`'s quote is replaced, and once
    /// right away with the current quote if there is one.
    ///
    /// After [`destroy`](Self::destroy) nothing is registered and the
    /// returned handle is inactive.
    pub fn subscribe<F>(&self, symbol: &str, on_update: F) -> Subscription
    where
        F: Fn(&TokenPrice) + Send + Sync + 'static,
    {
        if self.is_destroyed() {
            log::warn!("price feed: subscribe to {symbol} after destroy");
            return Subscription::inactive();
        }
        let listener: Arc<dyn Fn(&TokenPrice) + Send + Sync> = Arc::new(on_update);
        // Register before reading the current quote so a concurrent tick
        // cannot fall between the two.
        let subscription = self.subscribers.register([symbol], listener.clone());
        if let Some(current) = self.get_price(symbol) {
            call_listener(&current.symbol, || listener(&current));
        }
        subscription
    }

    /// Call `on_update` with the full snapshot whenever any tracked symbol
    /// (or one of [`BASELINE_SYMBOLS`]) is updated, and once right away if
    /// any quote exists.
    pub fn subscribe_all<F>(&self, on_update: F) -> Subscription
    where
        F: Fn(&[TokenPrice]) + Send + Sync + 'static,
    {
        if self.is_destroyed() {
            log::warn!("price feed: subscribe_all after destroy");
            return Subscription::inactive();
        }
        let mut symbols: BTreeSet<String> = self
            .config
            .symbols
            .iter()
            .map(|s| s.symbol.clone())
            .collect();
        symbols.extend(self.lock_state().quotes.keys().cloned());
        symbols.extend(BASELINE_SYMBOLS.iter().map(|s| s.to_string()));

        let state = Arc::downgrade(&self.state);
        let on_update = Arc::new(on_update);
        let handler = {
            let on_update = on_update.clone();
            move |_: &TokenPrice| {
                if let Some(state) = state.upgrade() {
                    on_update(snapshot(&state).as_slice());
                }
            }
        };
        let subscription = self.subscribers.register(symbols, Arc::new(handler));

        let current = self.get_all_prices();
        if !current.is_empty() {
            call_listener("all", || on_update(current.as_slice()));
        }
        subscription
    }

    pub fn listener_count(&self, symbol: &str) -> usize {
        self.subscribers.listener_count(symbol)
    }
}

impl Drop for PriceFeedSimulator {
    fn drop(&mut self) {
        if let Some(tx) = self.lock_cmd().take() {
            let _ = tx.send(FeedCmd::Shutdown);
        }
    }
}

fn snapshot(state: &Mutex<FeedState>) -> Vec<TokenPrice> {
    let mut quotes: Vec<TokenPrice> = state
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .quotes
        .values()
        .cloned()
        .collect();
    quotes.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    quotes
}

/// Timer task: one tick per period until shutdown or the feed is dropped.
async fn run_timer(
    feed: Weak<PriceFeedSimulator>,
    period: Duration,
    mut cmd_rx: mpsc::UnboundedReceiver<FeedCmd>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => match cmd {
                Some(FeedCmd::Shutdown) | None => break,
            },
            _ = interval.tick() => {
                let Some(feed) = feed.upgrade() else {
                    break;
                };
                feed.run_tick();
            }
        }
    }
    log::info!("price feed: timer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn seeded() -> PriceFeedSimulator {
        PriceFeedSimulator::new(PriceFeedConfig {
            seed: Some(42),
            ..Default::default()
        })
    }

    #[test]
    fn tick_quotes_every_symbol() {
        let feed = seeded();
        assert!(feed.get_all_prices().is_empty());
        assert_eq!(feed.tick(), 8);
        let all = feed.get_all_prices();
        assert_eq!(all.len(), 8);
        assert!(all.windows(2).all(|w| w[0].symbol < w[1].symbol));
        assert!(feed.get_price("BSV").is_some());
        assert!(feed.get_price("DOGE").is_none());
    }

    #[test]
    fn one_quote_per_symbol() {
        let feed = seeded();
        for _ in 0..5 {
            feed.tick();
        }
        assert_eq!(feed.get_all_prices().len(), 8);
    }

    #[test]
    fn faulty_symbol_is_skipped_others_update() {
        let mut config = PriceFeedConfig {
            seed: Some(1),
            ..Default::default()
        };
        config.symbols[0].fluctuation = -1.0;
        let feed = PriceFeedSimulator::new(config);
        assert_eq!(feed.tick(), 7);
        assert!(feed.get_price("BSV").is_none());
        assert!(feed.get_price("BCHAT").is_some());
    }

    #[test]
    fn subscribe_replays_current_quote() {
        let feed = seeded();
        feed.tick();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let sub = feed.subscribe("BSV", move |q| s.lock().unwrap().push(q.price));
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(seen.lock().unwrap()[0], feed.get_price("BSV").unwrap().price);

        feed.tick();
        assert_eq!(seen.lock().unwrap().len(), 2);
        sub.unsubscribe();
        feed.tick();
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn subscribe_without_quote_waits_for_tick() {
        let feed = seeded();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let _sub = feed.subscribe("BCHAT", move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        feed.tick();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscribe_all_covers_baseline_and_tracked() {
        let feed = seeded();
        let sizes = Arc::new(Mutex::new(Vec::new()));
        let s = sizes.clone();
        let sub = feed.subscribe_all(move |all| s.lock().unwrap().push(all.len()));
        assert!(sizes.lock().unwrap().is_empty());
        assert_eq!(feed.listener_count("BSV"), 1);
        assert_eq!(feed.listener_count("GAMES"), 1);

        feed.tick();
        let calls = sizes.lock().unwrap().clone();
        assert_eq!(calls.len(), 8);
        assert!(calls.iter().all(|n| *n == 8));

        sub.unsubscribe();
        sub.unsubscribe();
        assert_eq!(feed.listener_count("BSV"), 0);
    }

    #[test]
    fn destroy_freezes_snapshot() {
        let feed = seeded();
        feed.tick();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let _sub = feed.subscribe("BSV", move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        let before = feed.get_all_prices();

        feed.destroy();
        assert!(feed.is_destroyed());
        assert_eq!(feed.tick(), 0);
        assert_eq!(feed.get_all_prices(), before);
        assert_eq!(feed.listener_count("BSV"), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_replay_is_contained() {
        let feed = seeded();
        feed.tick();
        fn buggy(_: &TokenPrice) {
            panic!("listener bug");
        }
        let sub = feed.subscribe("BSV", buggy);
        assert!(sub.is_active());
        fn buggy_all(_: &[TokenPrice]) {
            panic!("listener bug");
        }
        let all = feed.subscribe_all(buggy_all);
        assert!(all.is_active());
        assert_eq!(feed.tick(), 8);
    }

    #[test]
    fn subscribe_after_destroy_registers_nothing() {
        let feed = seeded();
        feed.tick();
        feed.destroy();

        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let sub = feed.subscribe("BSV", move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert!(!sub.is_active());
        assert!(sub.symbols().is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        let all = feed.subscribe_all(|_| {});
        assert!(!all.is_active());
        assert_eq!(feed.listener_count("BSV"), 0);
        sub.unsubscribe();
    }
}
