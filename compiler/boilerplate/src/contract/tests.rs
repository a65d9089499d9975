use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use pretty_assertions::assert_eq;

use super::*;

#[derive(Debug, thiserror::Error)]
#[error("boom")]
struct Boom;

#[test]
fn empty_contract_always_holds() {
    let contract = Contract::new();
    assert!(contract.is_empty());
    contract.check_preconditions().unwrap();
    contract.check_postconditions(&ContractExit::Returned).unwrap();
}

#[test]
fn first_failing_precondition_is_reported() {
    let contract = Contract::new()
        .requires("connected", || true)
        .requires("authenticated", || false)
        .requires("never checked", || false);
    assert_eq!(
        contract.check_preconditions().unwrap_err(),
        ContractViolation {
            kind: ConditionKind::Precondition,
            name: "authenticated".to_owned(),
        }
    );
}

#[test]
fn postconditions_see_how_the_action_exited() {
    let contract = Contract::new().ensures("no exception", |exit| {
        matches!(exit, ContractExit::Returned)
    });
    contract.check_postconditions(&ContractExit::Returned).unwrap();

    let thrown = Thrown::new(Boom);
    let err = contract
        .check_postconditions(&ContractExit::ThrewException(&thrown))
        .unwrap_err();
    assert_eq!(err.to_string(), "postcondition `no exception` violated");
}

#[test]
fn preconditions_run_lazily_each_check() {
    static READY: AtomicBool = AtomicBool::new(false);
    let contract = Contract::new().requires("ready", || READY.load(AtomicOrdering::Relaxed));
    assert!(contract.check_preconditions().is_err());
    READY.store(true, AtomicOrdering::Relaxed);
    assert!(contract.check_preconditions().is_ok());
}
