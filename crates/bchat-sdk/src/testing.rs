//! Test utilities shared by unit and integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::clock::Clock;
use crate::contract::{ContractType, Creator, Currency, NewContract, Reward};
use crate::error::{Error, Result};
use crate::payment::{PaymentDistributor, PaymentRecord};

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) += by;
    }
}

impl Default for ManualClock {
    /// 2025-01-01T00:00:00Z.
    fn default() -> Self {
        Self::at(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Distributor that rejects every payout, counting attempts.
#[derive(Debug, Default)]
pub struct FailingDistributor {
    attempts: AtomicUsize,
}

impl FailingDistributor {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl PaymentDistributor for FailingDistributor {
    fn distribute(&self, payment: &PaymentRecord) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(Error::Payment(format!(
            "payout service unavailable for {}",
            payment.contract_id
        )))
    }
}

/// A valid posting paying 0.05 BSV.
pub fn new_contract(title: &str) -> NewContract {
    NewContract {
        contract_type: ContractType::ChatCreation,
        title: title.to_string(),
        description: format!("{title} description"),
        requirements: vec!["Experience with community management".into()],
        deliverables: vec!["Configured chat room".into()],
        reward: Some(Reward::new(0.05, Currency::Bsv)),
        estimated_hours: 40,
        duration: 30,
        skills: vec!["Moderation".into()],
        category: "Chat Creation".into(),
        created_by: Creator {
            handle: "$creator".into(),
            rooms_owned: None,
        },
        ..Default::default()
    }
}
