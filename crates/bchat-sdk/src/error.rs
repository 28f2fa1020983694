use crate::state::ContractStatus;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("invalid contract: {0}")]
    Validation(String),

    #[error("contract not found: {0}")]
    NotFound(String),

    #[error("contract {id} cannot {operation} from status {status}")]
    InvalidState {
        id: String,
        status: ContractStatus,
        operation: &'static str,
    },

    #[error("payment distribution failed: {0}")]
    Payment(String),

    #[error("price computation for {symbol} failed: {reason}")]
    PriceComputation { symbol: String, reason: String },
}

impl Error {
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Error::InvalidState { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
