//! Simulated token price feed.
//!
//! There is no live market behind this module: quotes follow a random walk
//! driven by a repeating timer. A real feed should keep the same
//! subscribe/unsubscribe surface so consumers are unaffected.

pub mod config;
pub mod simulator;
pub mod subscribers;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use config::{
    BASELINE_SYMBOLS, DEFAULT_TICK_INTERVAL, PriceFeedConfig, SymbolSpec, ValueRange,
    default_symbols,
};
pub use simulator::PriceFeedSimulator;
pub use subscribers::{SubscriberRegistry, Subscription};

/// Latest known quote for one symbol. Each update replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPrice {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub price_usd: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_btc: Option<f64>,
    pub change_24h: f64,
    pub change_percent_24h: f64,
    pub volume_24h: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
    pub last_updated: DateTime<Utc>,
    pub source: String,
}
