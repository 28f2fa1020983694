use std::sync::Arc;

use bchat_sdk::testing::{FailingDistributor, ManualClock, new_contract};
use bchat_sdk::{
    Clock, ContractRegistry, ContractStatus, ContractType, Currency, Error, MemoryPaymentLedger,
    RegistryEvent, Reward,
};
use chrono::Duration;

fn setup() -> (ContractRegistry, Arc<MemoryPaymentLedger>, Arc<ManualClock>) {
    let ledger = Arc::new(MemoryPaymentLedger::new());
    let clock = Arc::new(ManualClock::default());
    let (registry, _rx) = ContractRegistry::with_clock(ledger.clone(), clock.clone());
    (registry, ledger, clock)
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn full_lifecycle_pays_once() {
    let (registry, ledger, clock) = setup();

    let contract = registry.create_contract(new_contract("Ordinals room")).unwrap();
    assert_eq!(contract.status, ContractStatus::Available);
    assert_eq!(contract.reward.amount, 0.05);
    assert_eq!(contract.reward.currency, Currency::Bsv);

    let t = clock.now();
    let claimed = registry
        .claim_contract(&contract.id, "$mod", Some("mod-gh"), 7)
        .unwrap();
    assert_eq!(claimed.status, ContractStatus::Claimed);
    let accepted = claimed.accepted_by.as_ref().unwrap();
    assert_eq!(accepted.claimed_at, t);
    assert_eq!(accepted.deadline, t + Duration::days(7));
    assert_eq!(accepted.external_handle.as_deref(), Some("mod-gh"));

    clock.advance(Duration::days(3));
    let submitted = registry
        .submit_work(
            &contract.id,
            Some("https://example.org/room"),
            "room is live",
            vec!["screenshot.png".into()],
        )
        .unwrap();
    assert_eq!(submitted.status, ContractStatus::Submitted);
    assert_eq!(submitted.submitted_work.as_ref().unwrap().evidence.len(), 1);
    assert!(ledger.is_empty());

    let completed = registry.complete_contract(&contract.id).unwrap();
    assert_eq!(completed.status, ContractStatus::Completed);

    let payments = ledger.records();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].contract_id, contract.id);
    assert_eq!(payments[0].recipient, "$mod");
    assert_eq!(payments[0].amount, 0.05);
    assert_eq!(payments[0].currency, Currency::Bsv);
    assert_eq!(payments[0].contract_type, ContractType::ChatCreation);
}

#[test]
fn second_claim_is_rejected_and_first_kept() {
    let (registry, _, clock) = setup();
    let contract = registry.create_contract(new_contract("a")).unwrap();
    let first = registry.claim_contract(&contract.id, "$first", None, 7).unwrap();

    clock.advance(Duration::hours(1));
    let err = registry
        .claim_contract(&contract.id, "$second", None, 2)
        .unwrap_err();
    assert!(err.is_invalid_state());
    assert_eq!(registry.get(&contract.id).unwrap(), first);
}

#[test]
fn submit_accepts_claimed_and_in_progress_only() {
    let (registry, _, _) = setup();
    for status in ContractStatus::ALL {
        let contract = registry.create_contract(new_contract("x")).unwrap();
        drive_to(&registry, &contract.id, status);

        let result = registry.submit_work(&contract.id, None, "work", vec![]);
        if status.can_submit() {
            assert_eq!(result.unwrap().status, ContractStatus::Submitted, "{status}");
        } else {
            assert!(result.unwrap_err().is_invalid_state(), "{status}");
            assert_eq!(registry.get(&contract.id).unwrap().status, status);
        }
    }
}

#[test]
fn complete_requires_submitted() {
    let (registry, ledger, _) = setup();
    for status in ContractStatus::ALL {
        let contract = registry.create_contract(new_contract("x")).unwrap();
        drive_to(&registry, &contract.id, status);

        let result = registry.complete_contract(&contract.id);
        if status == ContractStatus::Submitted {
            assert_eq!(result.unwrap().status, ContractStatus::Completed);
        } else {
            assert!(result.unwrap_err().is_invalid_state(), "{status}");
        }
    }
    // One payout for the contract completed here, one for the contract
    // completed while being driven to `Completed`.
    assert_eq!(ledger.len(), 2);
}

#[test]
fn out_of_range_estimate_is_rejected_without_claiming() {
    let (registry, _, _) = setup();
    let contract = registry.create_contract(new_contract("a")).unwrap();
    let mut events = registry.subscribe();

    let err = registry
        .claim_contract(&contract.id, "$a", None, u32::MAX)
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(registry.get(&contract.id).unwrap(), contract);
    assert!(events.try_recv().is_err());

    // The lock was released; a sane claim still goes through.
    let claimed = registry.claim_contract(&contract.id, "$a", None, 7).unwrap();
    assert_eq!(claimed.status, ContractStatus::Claimed);
}

#[test]
fn claim_requires_available() {
    let (registry, _, _) = setup();
    for status in ContractStatus::ALL {
        let contract = registry.create_contract(new_contract("x")).unwrap();
        drive_to(&registry, &contract.id, status);
        let result = registry.claim_contract(&contract.id, "$a", None, 1);
        assert_eq!(result.is_ok(), status == ContractStatus::Available, "{status}");
    }
}

/// Walk a fresh contract to `target` through legal transitions.
fn drive_to(registry: &ContractRegistry, id: &str, target: ContractStatus) {
    use ContractStatus::*;
    match target {
        Available => {}
        Claimed => {
            registry.claim_contract(id, "$a", None, 5).unwrap();
        }
        InProgress => {
            drive_to(registry, id, Claimed);
            registry.start_work(id).unwrap();
        }
        Submitted => {
            drive_to(registry, id, InProgress);
            registry.submit_work(id, None, "done", vec![]).unwrap();
        }
        Completed => {
            drive_to(registry, id, Submitted);
            registry.complete_contract(id).unwrap();
        }
        Expired => {
            registry.expire_contract(id).unwrap();
        }
        Disputed => {
            drive_to(registry, id, Claimed);
            registry.dispute_contract(id).unwrap();
        }
    }
}

// ---------------------------------------------------------------------------
// Payment failures
// ---------------------------------------------------------------------------

#[test]
fn payment_failure_does_not_roll_back() {
    let distributor = Arc::new(FailingDistributor::default());
    let (registry, mut rx) = ContractRegistry::new(distributor.clone());

    let contract = registry.create_contract(new_contract("a")).unwrap();
    registry.claim_contract(&contract.id, "$a", None, 1).unwrap();
    registry.submit_work(&contract.id, None, "done", vec![]).unwrap();

    let completed = registry.complete_contract(&contract.id).unwrap();
    assert_eq!(completed.status, ContractStatus::Completed);
    assert_eq!(
        registry.get(&contract.id).unwrap().status,
        ContractStatus::Completed
    );
    assert_eq!(distributor.attempts(), 1);

    let mut saw_warning = false;
    while let Ok(event) = rx.try_recv() {
        if let RegistryEvent::PaymentFailed {
            contract_id,
            reason,
        } = event
        {
            assert_eq!(contract_id, contract.id);
            assert!(reason.contains("unavailable"));
            saw_warning = true;
        }
    }
    assert!(saw_warning, "expected a PaymentFailed event");
}

#[tokio::test]
async fn events_follow_transitions() {
    let (registry, mut rx) = ContractRegistry::new(Arc::new(MemoryPaymentLedger::new()));
    let contract = registry.create_contract(new_contract("a")).unwrap();
    registry.claim_contract(&contract.id, "$a", None, 1).unwrap();

    assert!(matches!(rx.recv().await.unwrap(), RegistryEvent::Created(c) if c.id == contract.id));
    match rx.recv().await.unwrap() {
        RegistryEvent::StatusChanged { contract_id, from, to } => {
            assert_eq!(contract_id, contract.id);
            assert_eq!(from, ContractStatus::Available);
            assert_eq!(to, ContractStatus::Claimed);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Queries & metrics
// ---------------------------------------------------------------------------

#[test]
fn filters_keep_newest_first() {
    let (registry, _, clock) = setup();
    let mut fields = new_contract("mod job");
    fields.contract_type = ContractType::Moderation;
    let old_mod = registry.create_contract(fields.clone()).unwrap();
    clock.advance(Duration::minutes(5));
    registry.create_contract(new_contract("chat")).unwrap();
    clock.advance(Duration::minutes(5));
    let new_mod = registry.create_contract(fields).unwrap();

    let mods = registry.get_by_type(ContractType::Moderation);
    assert_eq!(
        mods.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
        vec![new_mod.id.as_str(), old_mod.id.as_str()]
    );

    registry.claim_contract(&old_mod.id, "$a", None, 3).unwrap();
    let claimed = registry.get_by_status(ContractStatus::Claimed);
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, old_mod.id);
    assert_eq!(registry.get_by_status(ContractStatus::Available).len(), 2);
    assert_eq!(registry.get_all().len(), 3);
}

#[test]
fn metrics_track_activity_and_locked_value() {
    let (registry, _, clock) = setup();

    let mut bchat = new_contract("bchat job");
    bchat.reward = Some(Reward::new(15_000.0, Currency::Bchat));
    let a = registry.create_contract(bchat).unwrap();
    let b = registry.create_contract(new_contract("b")).unwrap();
    let c = registry.create_contract(new_contract("c")).unwrap();
    let d = registry.create_contract(new_contract("d")).unwrap();

    registry.claim_contract(&a.id, "$a", None, 10).unwrap();
    registry.claim_contract(&b.id, "$b", None, 10).unwrap();
    registry.start_work(&b.id).unwrap();

    registry.claim_contract(&c.id, "$c", None, 10).unwrap();
    clock.advance(Duration::hours(36));
    registry.submit_work(&c.id, None, "done", vec![]).unwrap();
    registry.complete_contract(&c.id).unwrap();

    registry.expire_contract(&d.id).unwrap();

    let metrics = registry.get_metrics();
    assert_eq!(metrics.total_contracts, 4);
    assert_eq!(metrics.active_contracts, 2);
    assert_eq!(metrics.completed_contracts, 1);
    assert!((metrics.total_value_locked - 15_000.05).abs() < 1e-9);
    assert_eq!(metrics.value_locked_by_currency[&Currency::Bchat], 15_000.0);
    assert_eq!(metrics.value_locked_by_currency[&Currency::Bsv], 0.05);
    // 36 hours rounds up to 2 days.
    assert_eq!(metrics.average_completion_time_days, 2.0);
}

#[test]
fn disputed_contract_still_locks_value() {
    let (registry, _, _) = setup();
    let contract = registry.create_contract(new_contract("a")).unwrap();
    registry.dispute_contract(&contract.id).unwrap();
    let metrics = registry.get_metrics();
    assert_eq!(metrics.active_contracts, 0);
    assert_eq!(metrics.total_value_locked, 0.05);
}

#[test]
fn missing_fields_are_validation_errors() {
    let (registry, _, _) = setup();
    let mut fields = new_contract("a");
    fields.description = String::new();
    assert!(matches!(
        registry.create_contract(fields),
        Err(Error::Validation(_))
    ));
    assert!(registry.get_all().is_empty());
}
