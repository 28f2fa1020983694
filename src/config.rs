use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bchat_sdk::price::SymbolSpec;
use bchat_sdk::{PriceFeedConfig, DEFAULT_TICK_INTERVAL};
use serde::{Deserialize, Serialize};

use crate::AppError;

pub const CONFIG_FILE: &str = "bchat_config.json";

const DATA_DIR_ENV: &str = "BCHAT_DATA_DIR";
const DEFAULT_DATA_DIR: &str = ".bchat";

/// Directory holding the config file and the payment ledger.
pub fn data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub tick_interval_ms: u64,
    pub seed_sample_contracts: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub btc_usd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,
    /// Replaces the built-in symbol table when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbols: Option<Vec<SymbolSpec>>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL.as_millis() as u64,
            seed_sample_contracts: true,
            btc_usd: None,
            rng_seed: None,
            symbols: None,
        }
    }
}

impl AppConfig {
    /// Read `<dir>/bchat_config.json`, falling back to defaults when the
    /// file is missing or unreadable.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(CONFIG_FILE);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("ignoring unreadable {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self, dir: &Path) -> Result<(), AppError> {
        fs::create_dir_all(dir)?;
        let json = serde_json::to_string_pretty(self)?;
        fs::write(dir.join(CONFIG_FILE), json)?;
        Ok(())
    }

    pub fn price_feed_config(&self) -> PriceFeedConfig {
        let defaults = PriceFeedConfig::default();
        PriceFeedConfig {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            symbols: self.symbols.clone().unwrap_or(defaults.symbols),
            btc_usd: self.btc_usd,
            seed: self.rng_seed,
        }
    }
}
