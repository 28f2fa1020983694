use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::TokenPrice;
use crate::error::{Error, Result};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(3000);

/// Symbols `subscribe_all` always covers, whether or not they are quoted yet.
pub const BASELINE_SYMBOLS: [&str; 2] = ["BSV", "BCHAT"];

/// Closed interval `[min, max]` to sample uniformly from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// `[-span/2, +span/2]`.
    pub fn centered(span: f64) -> Self {
        Self {
            min: -span / 2.0,
            max: span / 2.0,
        }
    }

    pub fn sample(&self, rng: &mut impl Rng) -> std::result::Result<f64, String> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(format!("non-finite range [{}, {}]", self.min, self.max));
        }
        if self.min > self.max {
            return Err(format!("empty range [{}, {}]", self.min, self.max));
        }
        if self.min == self.max {
            return Ok(self.min);
        }
        Ok(rng.gen_range(self.min..self.max))
    }
}

/// How one token's simulated quote moves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolSpec {
    pub symbol: String,
    pub name: String,
    /// Starting point when the symbol has no quote yet.
    pub base_price: f64,
    /// Width of the per-tick random walk step: `U(-f/2, +f/2)`.
    pub fluctuation: f64,
    pub change_24h: ValueRange,
    pub change_percent_24h: ValueRange,
    pub volume_24h: ValueRange,
    /// Market cap is `price * U(min, max)`; `None` for no market cap.
    #[serde(default)]
    pub market_cap_supply: Option<ValueRange>,
    pub source: String,
}

impl SymbolSpec {
    fn fault(&self, reason: impl Into<String>) -> Error {
        Error::PriceComputation {
            symbol: self.symbol.clone(),
            reason: reason.into(),
        }
    }

    /// Next quote for this symbol given the previous one.
    ///
    /// The 24h change fields are resampled independently of the price walk:
    /// no history is kept to derive them from.
    pub fn next_quote(
        &self,
        previous: Option<&TokenPrice>,
        rng: &mut impl Rng,
        now: DateTime<Utc>,
        btc_usd: Option<f64>,
    ) -> Result<TokenPrice> {
        let last = previous.map_or(self.base_price, |q| q.price);
        let step = ValueRange::centered(self.fluctuation)
            .sample(rng)
            .map_err(|e| self.fault(format!("fluctuation: {e}")))?;
        let price = last + step;
        if !price.is_finite() {
            return Err(self.fault(format!("price is not finite ({last} + {step})")));
        }

        let change_24h = self
            .change_24h
            .sample(rng)
            .map_err(|e| self.fault(format!("change_24h: {e}")))?;
        let change_percent_24h = self
            .change_percent_24h
            .sample(rng)
            .map_err(|e| self.fault(format!("change_percent_24h: {e}")))?;
        let volume_24h = self
            .volume_24h
            .sample(rng)
            .map_err(|e| self.fault(format!("volume_24h: {e}")))?;
        let market_cap = match &self.market_cap_supply {
            Some(supply) => Some(
                price
                    * supply
                        .sample(rng)
                        .map_err(|e| self.fault(format!("market cap: {e}")))?,
            ),
            None => None,
        };

        Ok(TokenPrice {
            symbol: self.symbol.clone(),
            name: self.name.clone(),
            price,
            price_usd: price,
            price_btc: btc_usd.filter(|rate| *rate > 0.0).map(|rate| price / rate),
            change_24h,
            change_percent_24h,
            volume_24h,
            market_cap,
            last_updated: now,
            source: self.source.clone(),
        })
    }
}

fn room_token(symbol: &str, name: &str, base_price: f64) -> SymbolSpec {
    SymbolSpec {
        symbol: symbol.into(),
        name: name.into(),
        base_price,
        fluctuation: 0.0001,
        change_24h: ValueRange::centered(0.0002),
        change_percent_24h: ValueRange::centered(15.0),
        volume_24h: ValueRange::new(0.0, 50_000.0),
        market_cap_supply: Some(ValueRange::new(100_000.0, 600_000.0)),
        source: "bChat Exchange".into(),
    }
}

/// The tracked symbols: base currency, platform token, chat token, and the
/// per-room tokens.
pub fn default_symbols() -> Vec<SymbolSpec> {
    vec![
        SymbolSpec {
            symbol: "BSV".into(),
            name: "Bitcoin SV".into(),
            base_price: 52.34,
            fluctuation: 0.5,
            change_24h: ValueRange::centered(2.0),
            change_percent_24h: ValueRange::centered(5.0),
            volume_24h: ValueRange::new(2_100_000.0, 2_600_000.0),
            market_cap_supply: None,
            source: "CoinGecko".into(),
        },
        SymbolSpec {
            symbol: "BOS".into(),
            name: "Bitcoin OS Token".into(),
            base_price: 0.0125,
            fluctuation: 0.0005,
            change_24h: ValueRange::centered(0.002),
            change_percent_24h: ValueRange::centered(15.0),
            volume_24h: ValueRange::new(125_000.0, 155_000.0),
            market_cap_supply: Some(ValueRange::new(800_000.0, 800_000.0)),
            source: "Bitcoin OS Exchange".into(),
        },
        SymbolSpec {
            symbol: "BCHAT".into(),
            name: "Bitcoin Chat Token".into(),
            base_price: 0.0045,
            fluctuation: 0.0002,
            change_24h: ValueRange::centered(0.001),
            change_percent_24h: ValueRange::centered(30.0),
            volume_24h: ValueRange::new(85_000.0, 105_000.0),
            market_cap_supply: Some(ValueRange::new(1_000_000.0, 1_000_000.0)),
            source: "bChat Exchange".into(),
        },
        room_token("TRADERS", "Bitcoin Traders Chat", 0.0023),
        room_token("DEVS", "BSV Developers", 0.0019),
        room_token("GENERAL", "General Chat", 0.0012),
        room_token("NFTS", "NFT Collectors", 0.0034),
        room_token("GAMES", "Bitcoin Games", 0.0028),
    ]
}

/// Configuration for the `PriceFeedSimulator`.
#[derive(Debug, Clone)]
pub struct PriceFeedConfig {
    /// Timer period (default: 3s).
    pub tick_interval: Duration,
    pub symbols: Vec<SymbolSpec>,
    /// USD per BTC; when set, quotes carry `price_btc`.
    pub btc_usd: Option<f64>,
    /// Fixed RNG seed for reproducible walks.
    pub seed: Option<u64>,
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            symbols: default_symbols(),
            btc_usd: None,
            seed: None,
        }
    }
}

impl PriceFeedConfig {
    pub fn symbol(&self, symbol: &str) -> Option<&SymbolSpec> {
        self.symbols.iter().find(|s| s.symbol == symbol)
    }
}
