//! `ContractRegistry`: the authoritative in-memory set of contracts.
//!
//! Every mutation runs under a single mutex for the duration of one
//! transition. Events and the payout call happen after the lock is
//! released, so a subscriber or distributor may call back into the
//! registry.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::clock::{Clock, SystemClock};
use crate::contract::{Acceptance, Contract, ContractType, Currency, NewContract, Submission};
use crate::error::{Error, Result};
use crate::events::RegistryEvent;
use crate::payment::{PaymentDistributor, PaymentRecord};
use crate::state::ContractStatus;

const EVENT_CAPACITY: usize = 256;

/// Generate an opaque id of the form `<prefix>_<unix-millis>_<9 hex chars>`.
pub fn generate_contract_id(prefix: &str, now: DateTime<Utc>) -> String {
    let bytes: [u8; 5] = rand::random();
    let suffix = hex::encode(bytes);
    format!("{prefix}_{}_{}", now.timestamp_millis(), &suffix[..9])
}

// ── Metrics ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractMetrics {
    pub total_contracts: usize,
    /// Claimed, in progress or submitted.
    pub active_contracts: usize,
    pub completed_contracts: usize,
    /// Sum of reward amounts over contracts that are neither completed nor
    /// expired. Amounts are added regardless of currency.
    pub total_value_locked: f64,
    pub value_locked_by_currency: BTreeMap<Currency, f64>,
    /// Mean whole days from claim to submission over completed contracts.
    pub average_completion_time_days: f64,
}

impl ContractMetrics {
    pub fn from_contracts<'a>(contracts: impl IntoIterator<Item = &'a Contract>) -> Self {
        let mut metrics = Self::default();
        let mut completion_days_total = 0i64;

        for contract in contracts {
            metrics.total_contracts += 1;
            if contract.status.is_active() {
                metrics.active_contracts += 1;
            }
            if contract.status.locks_value() {
                metrics.total_value_locked += contract.reward.amount;
                *metrics
                    .value_locked_by_currency
                    .entry(contract.reward.currency)
                    .or_default() += contract.reward.amount;
            }
            if contract.status == ContractStatus::Completed {
                metrics.completed_contracts += 1;
                completion_days_total += contract.completion_days().unwrap_or(0);
            }
        }

        if metrics.completed_contracts > 0 {
            metrics.average_completion_time_days =
                completion_days_total as f64 / metrics.completed_contracts as f64;
        }
        metrics
    }
}

// ── Registry ────────────────────────────────────────────────────────

pub struct ContractRegistry {
    contracts: Mutex<HashMap<String, Contract>>,
    distributor: Arc<dyn PaymentDistributor>,
    clock: Arc<dyn Clock>,
    tx: broadcast::Sender<RegistryEvent>,
}

impl ContractRegistry {
    /// Create an empty registry paying out through `distributor`.
    ///
    /// Returns the registry and a receiver for its events.
    pub fn new(
        distributor: Arc<dyn PaymentDistributor>,
    ) -> (Self, broadcast::Receiver<RegistryEvent>) {
        Self::with_clock(distributor, Arc::new(SystemClock))
    }

    pub fn with_clock(
        distributor: Arc<dyn PaymentDistributor>,
        clock: Arc<dyn Clock>,
    ) -> (Self, broadcast::Receiver<RegistryEvent>) {
        let (tx, rx) = broadcast::channel(EVENT_CAPACITY);
        (
            Self {
                contracts: Mutex::new(HashMap::new()),
                distributor,
                clock,
                tx,
            },
            rx,
        )
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.tx.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Contract>> {
        self.contracts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: RegistryEvent) {
        // No receivers is fine.
        let _ = self.tx.send(event);
    }

    // ── Mutations ───────────────────────────────────────────────────

    /// Post a new contract with status `available`.
    pub fn create_contract(&self, fields: NewContract) -> Result<Contract> {
        let now = self.clock.now();
        let contract = {
            let mut contracts = self.lock();
            let mut id = generate_contract_id("contract", now);
            while contracts.contains_key(&id) {
                id = generate_contract_id("contract", now);
            }
            let contract = fields.into_contract(id, now)?;
            contracts.insert(contract.id.clone(), contract.clone());
            contract
        };
        log::info!("contract {} created: {}", contract.id, contract.title);
        self.emit(RegistryEvent::Created(contract.clone()));
        Ok(contract)
    }

    /// Insert a pre-built record as-is, replacing any record with the same id.
    pub fn insert_contract(&self, contract: Contract) {
        log::debug!("contract {} seeded ({})", contract.id, contract.status);
        self.lock().insert(contract.id.clone(), contract);
    }

    /// Run one lifecycle transition under the lock.
    ///
    /// On error the stored record is left untouched; `apply` must fail
    /// before it writes anything.
    fn transition(
        &self,
        id: &str,
        next: ContractStatus,
        operation: &'static str,
        apply: impl FnOnce(&mut Contract, DateTime<Utc>) -> Result<()>,
    ) -> Result<Contract> {
        let now = self.clock.now();
        let (from, contract) = {
            let mut contracts = self.lock();
            let contract = contracts
                .get_mut(id)
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            let from = contract.status;
            if !from.can_transition_to(next) {
                return Err(Error::InvalidState {
                    id: id.to_string(),
                    status: from,
                    operation,
                });
            }
            apply(contract, now)?;
            contract.status = next;
            contract.last_updated = now;
            (from, contract.clone())
        };

        log::info!("contract {id}: {from} -> {next}");
        self.emit(RegistryEvent::StatusChanged {
            contract_id: id.to_string(),
            from,
            to: next,
        });
        Ok(contract)
    }

    /// Accept an available contract and start its deadline clock.
    pub fn claim_contract(
        &self,
        id: &str,
        assignee: &str,
        external_handle: Option<&str>,
        estimated_days: u32,
    ) -> Result<Contract> {
        self.transition(id, ContractStatus::Claimed, "claim", |contract, now| {
            let acceptance = Acceptance::new(
                assignee.to_string(),
                external_handle.map(str::to_string),
                now,
                estimated_days,
            )?;
            contract.accepted_by = Some(acceptance);
            Ok(())
        })
    }

    /// Mark a claimed contract as being worked on.
    pub fn start_work(&self, id: &str) -> Result<Contract> {
        self.transition(id, ContractStatus::InProgress, "start work", |_, _| Ok(()))
    }

    /// Deliver work for a claimed or in-progress contract.
    pub fn submit_work(
        &self,
        id: &str,
        delivery_ref: Option<&str>,
        description: &str,
        evidence: Vec<String>,
    ) -> Result<Contract> {
        self.transition(id, ContractStatus::Submitted, "submit work", |contract, now| {
            contract.submitted_work = Some(Submission {
                submitted_at: now,
                delivery_ref: delivery_ref.map(str::to_string),
                description: description.to_string(),
                evidence,
            });
            Ok(())
        })
    }

    /// Approve a submitted contract and pay the assignee.
    ///
    /// The payout runs after the transition is committed. A failed payout
    /// is logged and published as [`RegistryEvent::PaymentFailed`]; the
    /// contract stays `completed` either way.
    pub fn complete_contract(&self, id: &str) -> Result<Contract> {
        let contract =
            self.transition(id, ContractStatus::Completed, "complete", |_, _| Ok(()))?;

        let outcome = PaymentRecord::for_contract(&contract, self.clock.now())
            .and_then(|payment| self.distributor.distribute(&payment));
        if let Err(e) = outcome {
            log::warn!("contract {id} completed but payout failed: {e}");
            self.emit(RegistryEvent::PaymentFailed {
                contract_id: id.to_string(),
                reason: e.to_string(),
            });
        }
        Ok(contract)
    }

    /// External timeout trigger.
    pub fn expire_contract(&self, id: &str) -> Result<Contract> {
        self.transition(id, ContractStatus::Expired, "expire", |_, _| Ok(()))
    }

    /// External arbitration trigger.
    pub fn dispute_contract(&self, id: &str) -> Result<Contract> {
        self.transition(id, ContractStatus::Disputed, "dispute", |_, _| Ok(()))
    }

    /// Expire every claimed or in-progress contract whose deadline is
    /// before `now`. Returns the expired records.
    pub fn expire_overdue(&self, now: DateTime<Utc>) -> Vec<Contract> {
        let expired: Vec<(ContractStatus, Contract)> = {
            let mut contracts = self.lock();
            contracts
                .values_mut()
                .filter(|c| c.is_overdue(now))
                .map(|contract| {
                    let from = contract.status;
                    contract.status = ContractStatus::Expired;
                    contract.last_updated = now;
                    (from, contract.clone())
                })
                .collect()
        };

        for (from, contract) in &expired {
            log::info!("contract {} expired past deadline", contract.id);
            self.emit(RegistryEvent::StatusChanged {
                contract_id: contract.id.clone(),
                from: *from,
                to: ContractStatus::Expired,
            });
        }
        expired.into_iter().map(|(_, c)| c).collect()
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub fn get(&self, id: &str) -> Option<Contract> {
        self.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All contracts, newest first.
    pub fn get_all(&self) -> Vec<Contract> {
        self.sorted(|_| true)
    }

    pub fn get_by_type(&self, contract_type: ContractType) -> Vec<Contract> {
        self.sorted(|c| c.contract_type == contract_type)
    }

    pub fn get_by_status(&self, status: ContractStatus) -> Vec<Contract> {
        self.sorted(|c| c.status == status)
    }

    fn sorted(&self, keep: impl Fn(&Contract) -> bool) -> Vec<Contract> {
        let mut out: Vec<Contract> = self.lock().values().filter(|c| keep(*c)).cloned().collect();
        out.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        out
    }

    pub fn get_metrics(&self) -> ContractMetrics {
        ContractMetrics::from_contracts(self.lock().values())
    }
}
