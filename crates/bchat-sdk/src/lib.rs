pub mod clock;
pub mod contract;
pub mod error;
pub mod events;
pub mod payment;
pub mod price;
pub mod registry;
pub mod samples;
pub mod state;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Contracts
pub use clock::{Clock, SystemClock};
pub use contract::{
    Acceptance, Contract, ContractTerms, ContractType, Creator, Currency, DisputeResolution,
    NewContract, Priority, Reward, Submission,
};
pub use error::{Error, Result};
pub use events::RegistryEvent;
pub use registry::{ContractMetrics, ContractRegistry, generate_contract_id};
pub use state::ContractStatus;

// Payments
pub use payment::{MemoryPaymentLedger, PaymentDistributor, PaymentRecord};

// Price feed
pub use price::{
    BASELINE_SYMBOLS, DEFAULT_TICK_INTERVAL, PriceFeedConfig, PriceFeedSimulator, SymbolSpec,
    Subscription, TokenPrice, ValueRange,
};
