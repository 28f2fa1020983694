use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::contract::{Contract, ContractType, Currency};
use crate::error::{Error, Result};

/// One payout attempt for a completed contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub contract_id: String,
    pub recipient: String,
    pub amount: f64,
    pub currency: Currency,
    pub contract_type: ContractType,
    pub timestamp: DateTime<Utc>,
}

impl PaymentRecord {
    /// Payout for `contract` to its assignee.
    pub fn for_contract(contract: &Contract, timestamp: DateTime<Utc>) -> Result<Self> {
        let recipient = contract
            .accepted_by
            .as_ref()
            .map(|a| a.handle.clone())
            .ok_or_else(|| Error::Payment(format!("contract {} has no assignee", contract.id)))?;
        Ok(Self {
            contract_id: contract.id.clone(),
            recipient,
            amount: contract.reward.amount,
            currency: contract.reward.currency,
            contract_type: contract.contract_type,
            timestamp,
        })
    }
}

/// The collaborator that actually moves value once a contract completes.
///
/// The registry calls it after the `completed` transition is committed and
/// never rolls the transition back on failure.
pub trait PaymentDistributor: Send + Sync {
    fn distribute(&self, payment: &PaymentRecord) -> Result<()>;
}

/// Records payouts in memory.
#[derive(Debug, Default)]
pub struct MemoryPaymentLedger {
    records: Mutex<Vec<PaymentRecord>>,
}

impl MemoryPaymentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<PaymentRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PaymentDistributor for MemoryPaymentLedger {
    fn distribute(&self, payment: &PaymentRecord) -> Result<()> {
        log::info!(
            "distributing {} {} to {} for contract {}",
            payment.amount,
            payment.currency,
            payment.recipient,
            payment.contract_id
        );
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(payment.clone());
        Ok(())
    }
}
