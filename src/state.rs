use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bchat_sdk::{Error as SdkError, PaymentDistributor, PaymentRecord};
use serde::{Deserialize, Serialize};

use crate::AppError;

pub const PAYMENTS_FILE: &str = "chat_contract_payments.json";

// ============================================================================
// Persisted local state (payouts)
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalState {
    #[serde(default)]
    payments: Vec<PaymentRecord>,
}

// ============================================================================
// Payment ledger
// ============================================================================

/// Payout list persisted under the app data dir.
///
/// Every distributed payment is appended and the whole list is rewritten,
/// so a reload sees exactly what was paid.
pub struct PaymentLedger {
    app_data_dir: PathBuf,
    local_state: Mutex<LocalState>,
}

impl PaymentLedger {
    pub fn open(app_data_dir: PathBuf) -> Self {
        let local_state = Self::load_local_state(&app_data_dir).unwrap_or_default();
        log::info!(
            "payment ledger: {} records in {}",
            local_state.payments.len(),
            app_data_dir.display()
        );
        Self {
            app_data_dir,
            local_state: Mutex::new(local_state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LocalState> {
        self.local_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn records(&self) -> Vec<PaymentRecord> {
        self.lock().payments.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().payments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> PathBuf {
        self.app_data_dir.join(PAYMENTS_FILE)
    }

    // --- Persistence helpers ---

    fn load_local_state(dir: &Path) -> Option<LocalState> {
        let path = dir.join(PAYMENTS_FILE);
        let contents = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(state) => Some(state),
            Err(e) => {
                log::warn!("payment ledger: ignoring unreadable {}: {e}", path.display());
                None
            }
        }
    }

    fn save_local_state(&self, state: &LocalState) -> Result<(), AppError> {
        fs::create_dir_all(&self.app_data_dir)?;
        let json = serde_json::to_string_pretty(state)?;
        fs::write(self.path(), json)?;
        Ok(())
    }
}

impl PaymentDistributor for PaymentLedger {
    fn distribute(&self, payment: &PaymentRecord) -> bchat_sdk::Result<()> {
        let mut state = self.lock();
        state.payments.push(payment.clone());
        if let Err(e) = self.save_local_state(&state) {
            // Keep memory and disk in step.
            state.payments.pop();
            return Err(SdkError::Payment(format!(
                "could not record payout for {}: {e}",
                payment.contract_id
            )));
        }
        log::info!(
            "paid {} {} to {} for {}",
            payment.amount,
            payment.currency,
            payment.recipient,
            payment.contract_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bchat_sdk::{ContractType, Currency};
    use chrono::Utc;

    fn record(id: &str) -> PaymentRecord {
        PaymentRecord {
            contract_id: id.into(),
            recipient: "$mod".into(),
            amount: 0.05,
            currency: Currency::Bsv,
            contract_type: ContractType::Moderation,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = PaymentLedger::open(dir.path().to_path_buf());
        assert!(ledger.is_empty());
        ledger.distribute(&record("a")).unwrap();
        ledger.distribute(&record("b")).unwrap();

        let reopened = PaymentLedger::open(dir.path().to_path_buf());
        assert_eq!(reopened.records(), ledger.records());
        assert_eq!(reopened.len(), 2);
    }

    #[test]
    fn file_uses_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = PaymentLedger::open(dir.path().to_path_buf());
        ledger.distribute(&record("a")).unwrap();
        let raw = fs::read_to_string(ledger.path()).unwrap();
        assert!(raw.contains("\"contractId\": \"a\""));
        assert!(raw.contains("\"currency\": \"BSV\""));
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(PAYMENTS_FILE), "[[[").unwrap();
        assert!(PaymentLedger::open(dir.path().to_path_buf()).is_empty());
    }

    #[test]
    fn unwritable_dir_is_a_payment_error() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the data dir should be.
        let blocker = dir.path().join("blocked");
        fs::write(&blocker, "").unwrap();
        let ledger = PaymentLedger::open(blocker);
        let err = ledger.distribute(&record("a")).unwrap_err();
        assert!(matches!(err, SdkError::Payment(_)));
        assert!(ledger.is_empty());
    }
}
