mod config;
mod state;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bchat_sdk::{samples, ContractRegistry, PriceFeedSimulator, RegistryEvent};
use chrono::Utc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

pub use config::{data_dir, AppConfig, CONFIG_FILE};
pub use state::{PaymentLedger, PAYMENTS_FILE};

const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Sdk(#[from] bchat_sdk::Error),
}

// ============================================================================
// Services
// ============================================================================

/// Everything a presentation layer needs, constructed once at startup.
pub struct AppServices {
    pub config: AppConfig,
    pub contracts: ContractRegistry,
    pub prices: Arc<PriceFeedSimulator>,
    pub payments: Arc<PaymentLedger>,
}

impl AppServices {
    /// Load config from `app_data_dir` and build the services.
    pub fn new(app_data_dir: PathBuf) -> (Self, broadcast::Receiver<RegistryEvent>) {
        let config = AppConfig::load(&app_data_dir);
        Self::with_config(app_data_dir, config)
    }

    pub fn with_config(
        app_data_dir: PathBuf,
        config: AppConfig,
    ) -> (Self, broadcast::Receiver<RegistryEvent>) {
        let payments = Arc::new(PaymentLedger::open(app_data_dir));
        let (contracts, events) = ContractRegistry::new(payments.clone());
        if config.seed_sample_contracts {
            samples::seed_registry(&contracts, Utc::now());
        }
        let prices = Arc::new(PriceFeedSimulator::new(config.price_feed_config()));
        (
            Self {
                config,
                contracts,
                prices,
                payments,
            },
            events,
        )
    }

    /// Spawn the price timer on the current runtime.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        self.prices.start()
    }

    pub fn shutdown(&self) {
        self.prices.destroy();
    }
}

// ============================================================================
// Entry point
// ============================================================================

/// Install `env_logger`. `RUST_LOG` overrides the defaults below.
pub fn init_logging() {
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .filter_module("mio", log::LevelFilter::Warn)
        .filter_module("tokio", log::LevelFilter::Warn)
        .parse_env("RUST_LOG")
        .try_init();
}

pub async fn run() -> Result<(), AppError> {
    let app_data_dir = data_dir();
    let first_launch = !app_data_dir.join(CONFIG_FILE).exists();
    let (services, events) = AppServices::new(app_data_dir.clone());
    if first_launch {
        log::info!("first launch, writing default config to {}", app_data_dir.display());
        services.config.save(&app_data_dir)?;
    }

    let metrics = services.contracts.get_metrics();
    log::info!(
        "{} contracts ({} active), {:.2} locked, {} payouts on record",
        metrics.total_contracts,
        metrics.active_contracts,
        metrics.total_value_locked,
        services.payments.len()
    );

    let Some(timer) = services.start() else {
        return Ok(());
    };
    let ticker = services.prices.subscribe("BSV", |quote| {
        log::debug!("BSV {:.2} USD ({:+.2}%)", quote.price, quote.change_percent_24h);
    });
    tokio::spawn(log_events(events));

    let mut sweep = tokio::time::interval(EXPIRY_SWEEP_INTERVAL);
    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res?;
                break;
            }
            _ = sweep.tick() => {
                let expired = services.contracts.expire_overdue(Utc::now());
                if !expired.is_empty() {
                    log::info!("expired {} overdue contracts", expired.len());
                }
            }
        }
    }

    log::info!("shutting down");
    ticker.unsubscribe();
    services.shutdown();
    if let Err(e) = timer.await {
        log::error!("price timer ended abnormally: {e}");
    }
    Ok(())
}

async fn log_events(mut events: broadcast::Receiver<RegistryEvent>) {
    loop {
        match events.recv().await {
            Ok(RegistryEvent::Created(contract)) => {
                log::debug!("posted {} \"{}\"", contract.id, contract.title);
            }
            Ok(RegistryEvent::StatusChanged {
                contract_id,
                from,
                to,
            }) => log::debug!("{contract_id}: {from} -> {to}"),
            Ok(RegistryEvent::PaymentFailed {
                contract_id,
                reason,
            }) => log::warn!("{contract_id}: completed without payout: {reason}"),
            Err(RecvError::Lagged(n)) => log::warn!("event log skipped {n} events"),
            Err(RecvError::Closed) => break,
        }
    }
}
